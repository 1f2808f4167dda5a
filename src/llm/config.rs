//! LLM 配置加载
//!
//! 从环境变量读取模型配置，格式：
//! ```text
//! AGENT_MODEL_<ID>_MODEL=gpt-4o
//! AGENT_MODEL_<ID>_BASEURL=https://api.openai.com/v1/chat/completions
//! AGENT_MODEL_<ID>_APIKEY=sk-...
//! ```
//! `<ID>` 为自定义标识（如 `GPT4O`、`QWEN`），不区分大小写。
//! 加载结果通过构造函数传给客户端，不做进程级全局缓存。

use crate::error::{ConfigError, Result};
use dotenv::dotenv;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;

const PREFIX: &str = "AGENT_MODEL_";

/// 单个模型的连接配置
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ModelConfig {
    /// LLM 接口中使用的模型名（如 `gpt-4o`）
    pub model: String,
    /// Chat Completions 接口完整 URL
    pub baseurl: String,
    pub apikey: String,
}

/// 已加载的模型配置表（key = model 字段值）
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ModelTable {
    pub models: HashMap<String, ModelConfig>,
}

impl ModelTable {
    /// 读取 `.env` 与进程环境变量
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// 从任意键值对解析，忽略不带前缀的变量
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let mut model_configs: HashMap<String, HashMap<String, String>> = HashMap::new();
        for (key, value) in vars {
            let Some(suffix) = key.strip_prefix(PREFIX) else {
                continue;
            };
            let parts: Vec<&str> = suffix.split('_').collect();
            if parts.len() != 2 {
                return Err(ConfigError::EnvFormatError(key).into());
            }
            let model_id = parts[0].to_lowercase();
            let config_key = parts[1].to_lowercase();

            if !matches!(config_key.as_str(), "model" | "baseurl" | "apikey") {
                return Err(ConfigError::EnvFormatError(key).into());
            }
            model_configs
                .entry(model_id)
                .or_default()
                .insert(config_key, value);
        }

        let mut models = HashMap::new();
        for (model_id, mut config_map) in model_configs {
            let mut take = |field: &str| {
                config_map
                    .remove(field)
                    .ok_or_else(|| ConfigError::MissingField(format!("{PREFIX}{}_{}", model_id.to_uppercase(), field.to_uppercase())))
            };
            let model = take("model")?;
            let baseurl = take("baseurl")?;
            let apikey = take("apikey")?;

            models.insert(
                model.clone(),
                ModelConfig {
                    model,
                    baseurl,
                    apikey,
                },
            );
        }

        Ok(Self { models })
    }

    pub fn get(&self, model: &str) -> Result<ModelConfig> {
        self.models
            .get(model)
            .cloned()
            .ok_or_else(|| ConfigError::ModelNotFound(model.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EchoError;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_models_from_vars() {
        let table = ModelTable::from_vars(vars(&[
            ("AGENT_MODEL_GPT4O_MODEL", "gpt-4o"),
            ("AGENT_MODEL_GPT4O_BASEURL", "https://api.openai.com/v1/chat/completions"),
            ("AGENT_MODEL_GPT4O_APIKEY", "sk-test"),
            ("PATH", "/usr/bin"),
        ]))
        .unwrap();
        let model = table.get("gpt-4o").unwrap();
        assert_eq!(model.apikey, "sk-test");
        assert!(matches!(
            table.get("other").unwrap_err(),
            EchoError::Config(ConfigError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_missing_field_reported() {
        let err = ModelTable::from_vars(vars(&[("AGENT_MODEL_QWEN_MODEL", "qwen3-max")])).unwrap_err();
        assert!(matches!(err, EchoError::Config(ConfigError::MissingField(_))));
    }

    #[test]
    fn test_malformed_key_rejected() {
        let err = ModelTable::from_vars(vars(&[("AGENT_MODEL_QWEN_EXTRA_MODEL", "x")])).unwrap_err();
        assert!(matches!(err, EchoError::Config(ConfigError::EnvFormatError(_))));
    }
}
