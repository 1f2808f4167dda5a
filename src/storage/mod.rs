//! Blob 存储后端
//!
//! 按路径寻址的字节存储，支持 get / put / delete，不提供事务，允许最终一致。
//! "对象不存在" 是预期结果而不是错误：`get` 返回 `Ok(None)`，`delete` 返回 `Ok(false)`。
//!
//! | 实现 | 说明 |
//! |------|------|
//! | [`InMemoryBlobBackend`] | 进程内存，适合测试 |
//! | [`FileBlobBackend`] | 本地目录，一个路径对应一个文件 |
//! | [`HttpBlobBackend`] | 远端文件服务（`/v1/{path}`） |

mod file;
mod http;
pub mod resolver;

pub use file::FileBlobBackend;
pub use http::HttpBlobBackend;
pub use resolver::{BucketUserResolver, HashedUserResolver, UserResolver};

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// 按路径寻址的字节存储接口
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// 读取对象，不存在时返回 `None`
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// 写入（覆盖）对象
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<()>;

    /// 删除对象，返回删除前是否存在
    async fn delete(&self, path: &str) -> Result<bool>;
}

/// 进程内存 Blob 存储，不持久化
#[derive(Default)]
pub struct InMemoryBlobBackend {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前保存的对象数量
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl BlobBackend for InMemoryBlobBackend {
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().await.get(path).cloned())
    }

    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        self.data.write().await.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        Ok(self.data.write().await.remove(path).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_roundtrip() -> Result<()> {
        let backend = InMemoryBlobBackend::new();
        assert!(backend.get("a/b.json").await?.is_none());

        backend.put("a/b.json", b"hello".to_vec()).await?;
        assert_eq!(backend.get("a/b.json").await?, Some(b"hello".to_vec()));
        assert_eq!(backend.len().await, 1);

        assert!(backend.delete("a/b.json").await?);
        assert!(!backend.delete("a/b.json").await?);
        assert!(backend.is_empty().await);
        Ok(())
    }
}
