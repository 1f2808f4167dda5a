use crate::error::{Result, StorageError};
use crate::storage::BlobBackend;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// 远端文件服务
///
/// - `GET    {endpoint}/v1/{path}`：下载，404 视为不存在
/// - `PUT    {endpoint}/v1/{path}`：上传，请求体为原始字节
/// - `DELETE {endpoint}/v1/{path}`：删除，404 视为不存在
///
/// 设置了 `api_key` 时以 `Api-Key` 头认证。
pub struct HttpBlobBackend {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpBlobBackend {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Network(format!("创建 HTTP 客户端失败: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/v1/{}",
            self.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Api-Key", key),
            None => builder,
        }
    }
}

fn network(e: reqwest::Error) -> StorageError {
    if e.is_timeout() {
        StorageError::Network("请求超时".to_string())
    } else {
        StorageError::Network(e.to_string())
    }
}

async fn status_error(response: reqwest::Response) -> StorageError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    StorageError::Status { status, message }
}

#[async_trait]
impl BlobBackend for HttpBlobBackend {
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let response = self
            .request(self.client.get(self.url(path)))
            .send()
            .await
            .map_err(network)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(response).await.into());
        }
        let bytes = response.bytes().await.map_err(network)?;
        debug!(path = %path, size = bytes.len(), "⬇️ 下载 Blob");
        Ok(Some(bytes.to_vec()))
    }

    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        let size = bytes.len();
        let response = self
            .request(self.client.put(self.url(path)))
            .body(bytes)
            .send()
            .await
            .map_err(network)?;

        if !response.status().is_success() {
            return Err(status_error(response).await.into());
        }
        debug!(path = %path, size = size, "⬆️ 上传 Blob");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let response = self
            .request(self.client.delete(self.url(path)))
            .send()
            .await
            .map_err(network)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            _ => Err(status_error(response).await.into()),
        }
    }
}
