//! 文本向量化
//!
//! [`Embedder`] 把字符串映射为定长浮点向量。相同模型权重下结果确定；
//! 失败时调用方的操作随之失败。

use crate::config::EmbeddingSettings;
use crate::error::{ConfigError, EmbeddingError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// 批量向量化，输出与输入一一对应
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// 单条向量化的便捷方法
    async fn encode_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.encode(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| {
            EmbeddingError::CountMismatch {
                expected: 1,
                got: 0,
            }
            .into()
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// OpenAI 兼容的 `/embeddings` 接口
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::RequestFailed(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// 按配置构建，API Key 从 `api_key_env` 指定的环境变量读取
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .map_err(|_| ConfigError::MissingField(settings.api_key_env.clone()))?;
        Self::new(
            settings.base_url.clone(),
            settings.model.clone(),
            api_key,
            Duration::from_secs(settings.timeout_secs),
        )
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::RequestFailed(format!("status {status}: {body}")).into());
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::RequestFailed(e.to_string()))?;
        let vectors = order_by_index(parsed.data, texts.len())?;
        debug!(count = vectors.len(), model = %self.model, "🧮 向量化完成");
        Ok(vectors)
    }
}

/// 接口不保证返回顺序，按 `index` 还原
fn order_by_index(mut items: Vec<EmbeddingItem>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if items.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            got: items.len(),
        }
        .into());
    }
    items.sort_by_key(|item| item.index);
    Ok(items.into_iter().map(|item| item.embedding).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EchoError;

    #[test]
    fn test_response_reordered_by_index() {
        let parsed: EmbeddingResponse = serde_json::from_str(
            r#"{"object":"list","data":[
                {"object":"embedding","index":1,"embedding":[0.0,1.0]},
                {"object":"embedding","index":0,"embedding":[1.0,0.0]}
            ],"model":"m"}"#,
        )
        .unwrap();
        let vectors = order_by_index(parsed.data, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_count_mismatch() {
        let err = order_by_index(Vec::new(), 1).unwrap_err();
        assert!(matches!(
            err,
            EchoError::Embedding(EmbeddingError::CountMismatch { expected: 1, got: 0 })
        ));
    }
}
