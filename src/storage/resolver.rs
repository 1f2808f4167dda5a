//! 用户身份解析：把不透明的请求凭证映射为稳定的用户目录
//!
//! 目录本身即事实上的用户标识，缓存也以最终路径为键，而不是原始凭证。
//! 实现必须保证同一部署内不同用户得到不同目录。

use crate::error::{Result, StorageError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

#[async_trait]
pub trait UserResolver: Send + Sync {
    /// 返回用户目录前缀，以 `/` 结尾
    async fn home(&self, credential: &str) -> Result<String>;
}

/// 拼接用户目录与相对文件路径
pub fn join_path(home: &str, file: &str) -> String {
    format!(
        "{}/{}",
        home.trim_end_matches('/'),
        file.trim_start_matches('/')
    )
}

/// 以凭证的 SHA-256 作为目录名：`users/<hex>/`
#[derive(Debug, Default, Clone)]
pub struct HashedUserResolver;

#[async_trait]
impl UserResolver for HashedUserResolver {
    async fn home(&self, credential: &str) -> Result<String> {
        let digest = Sha256::digest(credential.as_bytes());
        Ok(format!("users/{}/", hex::encode(digest)))
    }
}

#[derive(Debug, Deserialize)]
struct BucketInfo {
    appdata: String,
}

/// 向文件服务查询当前凭证的应用数据目录：`GET {endpoint}/v1/bucket`
///
/// 返回 `files/<appdata>/`，与 [`HttpBlobBackend`](crate::storage::HttpBlobBackend) 的路径约定一致。
pub struct BucketUserResolver {
    client: Client,
    endpoint: String,
}

impl BucketUserResolver {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Network(format!("创建 HTTP 客户端失败: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl UserResolver for BucketUserResolver {
    async fn home(&self, credential: &str) -> Result<String> {
        let url = format!("{}/v1/bucket", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .header("Api-Key", credential)
            .send()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Status { status, message }.into());
        }

        let info: BucketInfo = response
            .json()
            .await
            .map_err(|e| StorageError::Network(format!("解析 bucket 响应失败: {e}")))?;
        Ok(format!("files/{}/", info.appdata.trim_matches('/')))
    }
}
