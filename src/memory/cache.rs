//! 进程级记忆缓存
//!
//! 以解析后的存储路径为键，每个路径对应一个 [`Slot`]：
//! 一把读写锁，锁内保存最近一次已知的值。
//!
//! - 同一路径的读改写（加载 / 修改 / 持久化 / 回写缓存）持有写锁，互斥进行；
//! - 不触发去重的检索只持有读锁，可与其他读并发；
//! - 不同路径的锁互不影响。
//!
//! 条目只在显式删除时被清空（值置为 `None`）。Slot 本身不会从表中移除，
//! 否则正在等待旧锁的任务与新建的锁会同时持有同一路径。

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// 单个路径的锁与缓存值
pub type Slot<T> = Arc<RwLock<Option<Arc<T>>>>;

pub struct MemoryCache<T> {
    slots: Mutex<HashMap<String, Slot<T>>>,
}

impl<T> Default for MemoryCache<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> MemoryCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取得（必要时创建）路径对应的 slot
    pub async fn slot(&self, path: &str) -> Slot<T> {
        self.slots
            .lock()
            .await
            .entry(path.to_string())
            .or_default()
            .clone()
    }

    /// 读取缓存值，不加载、不创建 slot
    pub async fn peek(&self, path: &str) -> Option<Arc<T>> {
        let slot = self.slots.lock().await.get(path).cloned()?;
        let value = slot.read().await.clone();
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_path_shares_slot() {
        let cache: MemoryCache<String> = MemoryCache::new();
        let a = cache.slot("users/a").await;
        let b = cache.slot("users/a").await;
        assert!(Arc::ptr_eq(&a, &b));

        *a.write().await = Some(Arc::new("hello".to_string()));
        assert_eq!(cache.peek("users/a").await.as_deref().map(String::as_str), Some("hello"));
        assert!(cache.peek("users/b").await.is_none());
    }

    #[tokio::test]
    async fn test_eviction_keeps_slot_identity() {
        let cache: MemoryCache<u32> = MemoryCache::new();
        let slot = cache.slot("p").await;
        *slot.write().await = Some(Arc::new(1));
        *slot.write().await = None;
        assert!(cache.peek("p").await.is_none());
        assert!(Arc::ptr_eq(&slot, &cache.slot("p").await));
    }

    #[tokio::test]
    async fn test_different_paths_do_not_block() {
        let cache: MemoryCache<u32> = MemoryCache::new();
        let a = cache.slot("a").await;
        let _held = a.write().await;

        let b = cache.slot("b").await;
        let acquired = tokio::time::timeout(Duration::from_millis(100), b.write()).await;
        assert!(acquired.is_ok());

        let blocked = tokio::time::timeout(Duration::from_millis(50), a.read()).await;
        assert!(blocked.is_err());
    }
}
