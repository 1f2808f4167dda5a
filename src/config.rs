//! 应用配置
//!
//! 从 YAML 文件加载，所有字段均有默认值，空文件即合法配置：
//!
//! ```yaml
//! memory:
//!   dedup_interval_hours: 24
//!   dedup_threshold: 0.75
//! storage:
//!   backend: file
//!   root: ~/.echo-memory/blobs
//! embedding:
//!   base_url: https://api.openai.com/v1
//!   model: text-embedding-3-small
//!   api_key_env: OPENAI_API_KEY
//! tools:
//!   timeout_ms: 30000
//! ```

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub memory: MemorySettings,
    pub storage: StorageSettings,
    pub embedding: EmbeddingSettings,
    pub tools: ToolSettings,
    pub agent: AgentSettings,
}

/// 长期记忆行为参数
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MemorySettings {
    /// 两次去重的最小间隔（小时）
    pub dedup_interval_hours: i64,
    /// 余弦相似度严格大于该值视为重复
    pub dedup_threshold: f32,
    /// 去重时每条记录检查的近邻数（含自身）
    pub dedup_neighbors: usize,
    pub default_top_k: usize,
    pub max_top_k: usize,
    /// 相对用户目录的记忆文档路径
    pub memory_file: String,
    /// 相对用户目录的画像文本路径
    pub profile_file: String,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            dedup_interval_hours: 24,
            dedup_threshold: 0.75,
            dedup_neighbors: 10,
            default_top_k: 5,
            max_top_k: 20,
            memory_file: "__long-memories/data.json".to_string(),
            profile_file: "__long-memories/data.txt".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    File,
    Http,
    Memory,
}

/// Blob 存储后端
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: BackendKind,
    /// file 后端的根目录，支持 `~/`
    pub root: String,
    /// http 后端的服务地址
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::File,
            root: "~/.echo-memory/blobs".to_string(),
            endpoint: None,
            timeout_secs: 30,
        }
    }
}

impl StorageSettings {
    pub fn root_path(&self) -> PathBuf {
        expand_tilde(Path::new(&self.root))
    }
}

/// OpenAI 兼容的向量化服务
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub base_url: String,
    pub model: String,
    /// 保存 API Key 的环境变量名
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ToolSettings {
    /// 单次工具执行超时（毫秒），0 = 不限制
    pub timeout_ms: u64,
    /// 并行工具调用的并发上限，None = 不限制
    pub max_concurrency: Option<usize>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_concurrency: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AgentSettings {
    /// 对话所用模型（对应 `AGENT_MODEL_<ID>_MODEL`）
    pub model: String,
    /// 记忆更新所用模型，缺省与 `model` 相同
    pub memory_model: Option<String>,
    pub max_iterations: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            memory_model: None,
            max_iterations: 10,
        }
    }
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self> {
        let file = std::fs::File::open(expand_tilde(Path::new(path)))
            .map_err(|_| ConfigError::FileNotFound(path.to_string()))?;
        let config: AppConfig = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.memory.dedup_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "memory.dedup_threshold".to_string(),
                message: "must be within [0, 1]".to_string(),
            }
            .into());
        }
        if self.memory.max_top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "memory.max_top_k".to_string(),
                message: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.storage.backend == BackendKind::Http && self.storage.endpoint.is_none() {
            return Err(ConfigError::MissingField("storage.endpoint".to_string()).into());
        }
        Ok(())
    }
}

pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s.starts_with("~/")
        && let Some(home) = std::env::var("HOME")
            .ok()
            .or_else(|| std::env::var("USERPROFILE").ok())
    {
        return PathBuf::from(home).join(&s[2..]);
    }
    path.to_path_buf()
}
