//! 计数 / 故障注入的 Blob 后端包装
//!
//! 用于验证缓存命中（后端读取次数）以及读写失败时的降级路径。

use crate::error::{Result, StorageError};
use crate::storage::{BlobBackend, InMemoryBlobBackend};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub struct CountingBackend {
    inner: Arc<dyn BlobBackend>,
    gets: AtomicUsize,
    puts: AtomicUsize,
    deletes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl Default for CountingBackend {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryBlobBackend::new()))
    }
}

impl CountingBackend {
    pub fn new(inner: Arc<dyn BlobBackend>) -> Self {
        Self {
            inner,
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// `get` 返回网络错误，模拟后端不可达
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// `put` / `delete` 返回网络错误
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn injected() -> crate::error::EchoError {
        StorageError::Network("injected failure".to_string()).into()
    }
}

#[async_trait]
impl BlobBackend for CountingBackend {
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.get(path).await
    }

    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.put(path, bytes).await
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.delete(path).await
    }
}
