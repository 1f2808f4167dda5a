//! 长期记忆 Store
//!
//! 每个用户一份 [`MemoryCollection`]，以解析后的存储路径为键缓存在进程内。
//!
//! ## 读写流程
//!
//! - `add`：先向量化，再在该路径的写锁内完成 加载/命中缓存 → 追加 → 持久化 → 回写缓存。
//!   先持久化后更新缓存，写入失败时缓存与后端都保持原样。
//! - `search`：集合为空时直接返回，不调用向量化。去重到期时升级为写锁，
//!   同步执行一次去重并持久化；持久化失败只记录日志，本次检索继续使用未去重的集合。
//! - `delete_all`：删除后端对象并清空缓存，对象不存在同样视为成功。
//!
//! ## 快速上手
//!
//! ```rust,no_run
//! use echo_memory::memory::LongTermMemoryStore;
//! use echo_memory::storage::{FileBlobBackend, HashedUserResolver};
//! use echo_memory::embedding::OpenAiEmbedder;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> echo_memory::error::Result<()> {
//! let store = LongTermMemoryStore::new(
//!     Arc::new(FileBlobBackend::new("~/.echo-memory/blobs")?),
//!     Arc::new(HashedUserResolver),
//!     Arc::new(OpenAiEmbedder::new(
//!         "https://api.openai.com/v1",
//!         "text-embedding-3-small",
//!         "sk-...",
//!         Duration::from_secs(30),
//!     )?),
//! );
//!
//! store.add("alice-key", "用户偏好深色主题", 0.8, "preferences", vec!["ui".into()]).await?;
//! let hits = store.search("alice-key", "主题", 5).await?;
//! println!("{} 条相关记忆", hits.len());
//! # Ok(())
//! # }
//! ```

use crate::embedding::Embedder;
use crate::error::{EchoError, MemoryError, Result};
use crate::memory::cache::MemoryCache;
use crate::memory::dedup::Deduplicator;
use crate::memory::index::SimilarityIndex;
use crate::memory::types::{MemoryCollection, MemoryData, MemoryRecord};
use crate::storage::BlobBackend;
use crate::storage::resolver::{UserResolver, join_path};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_MEMORY_FILE: &str = "__long-memories/data.json";

pub struct LongTermMemoryStore {
    backend: Arc<dyn BlobBackend>,
    resolver: Arc<dyn UserResolver>,
    embedder: Arc<dyn Embedder>,
    cache: Arc<MemoryCache<MemoryCollection>>,
    dedup: Deduplicator,
    memory_file: String,
}

impl LongTermMemoryStore {
    pub fn new(
        backend: Arc<dyn BlobBackend>,
        resolver: Arc<dyn UserResolver>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            backend,
            resolver,
            embedder,
            cache: Arc::new(MemoryCache::new()),
            dedup: Deduplicator::default(),
            memory_file: DEFAULT_MEMORY_FILE.to_string(),
        }
    }

    /// 使用外部创建的缓存（服务启动时创建，随服务存活）
    pub fn with_cache(mut self, cache: Arc<MemoryCache<MemoryCollection>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_deduplicator(mut self, dedup: Deduplicator) -> Self {
        self.dedup = dedup;
        self
    }

    /// 用户目录下的记忆文件相对路径
    pub fn with_memory_file(mut self, memory_file: impl Into<String>) -> Self {
        self.memory_file = memory_file.into();
        self
    }

    async fn path(&self, credential: &str) -> Result<String> {
        let home = self.resolver.home(credential).await?;
        Ok(join_path(&home, &self.memory_file))
    }

    /// 从后端读取集合
    ///
    /// 对象不存在或文档损坏都视为空集合；只有后端本身的读取失败返回错误。
    async fn load(&self, path: &str) -> Result<MemoryCollection> {
        let Some(bytes) = self.backend.get(path).await? else {
            debug!(path = %path, "后端无记忆文档，使用空集合");
            return Ok(MemoryCollection::default());
        };
        match MemoryCollection::decode(&bytes) {
            Ok(collection) => {
                debug!(path = %path, count = collection.len(), "📥 已加载记忆");
                Ok(collection)
            }
            Err(e) => {
                warn!(path = %path, error = %e, "记忆文档损坏，按空集合处理");
                Ok(MemoryCollection::default())
            }
        }
    }

    /// 刷新 `updated_at` 后整体写回
    async fn persist(&self, path: &str, mut collection: MemoryCollection) -> Result<MemoryCollection> {
        collection.updated_at = Utc::now();
        let bytes = collection.encode()?;
        self.backend.put(path, bytes).await?;
        debug!(path = %path, count = collection.len(), "💾 记忆已持久化");
        Ok(collection)
    }

    /// 取得可供检索的集合，必要时加载并去重
    async fn prepare_for_search(&self, path: &str) -> Result<Arc<MemoryCollection>> {
        let slot = self.cache.slot(path).await;
        {
            let cached = slot.read().await;
            if let Some(collection) = cached.as_ref() {
                if !self.needs_dedup(collection) {
                    debug!(path = %path, "缓存命中");
                    return Ok(collection.clone());
                }
            }
        }

        let mut guard = slot.write().await;
        let collection = match guard.as_ref() {
            Some(collection) => collection.clone(),
            None => {
                debug!(path = %path, "缓存未命中");
                let loaded = Arc::new(self.load(path).await?);
                *guard = Some(loaded.clone());
                loaded
            }
        };
        if !self.needs_dedup(&collection) {
            return Ok(collection);
        }

        let now = Utc::now();
        let dedup = self.dedup.clone();
        let source = collection.clone();
        let reduced = match tokio::task::spawn_blocking(move || dedup.run(&source, now)).await {
            Ok(reduced) => reduced,
            Err(e) => {
                warn!(path = %path, error = %e, "去重任务异常，沿用原集合");
                return Ok(collection);
            }
        };
        let removed = collection.len() - reduced.len();

        match self.persist(path, reduced).await {
            Ok(saved) => {
                info!(path = %path, removed, remaining = saved.len(), "🧹 去重完成");
                let saved = Arc::new(saved);
                *guard = Some(saved.clone());
                Ok(saved)
            }
            Err(e) => {
                warn!(path = %path, error = %e, "去重结果持久化失败，沿用原集合");
                Ok(collection)
            }
        }
    }

    fn needs_dedup(&self, collection: &MemoryCollection) -> bool {
        collection.len() >= 2 && self.dedup.is_due(collection, Utc::now())
    }

    /// 追加一条记忆，返回确认文本
    pub async fn add(
        &self,
        credential: &str,
        content: &str,
        importance: f64,
        category: &str,
        topics: Vec<String>,
    ) -> Result<String> {
        if content.trim().is_empty() {
            return Err(MemoryError::EmptyContent.into());
        }
        let path = self.path(credential).await?;
        let embedding = self.embedder.encode_one(content).await?;

        let slot = self.cache.slot(&path).await;
        let mut guard = slot.write().await;
        let current = match guard.as_ref() {
            Some(collection) => collection.clone(),
            None => {
                let loaded = Arc::new(self.load(&path).await?);
                *guard = Some(loaded.clone());
                loaded
            }
        };

        let mut next = (*current).clone();
        next.memories.push(MemoryRecord {
            data: MemoryData {
                id: Utc::now().timestamp(),
                content: content.to_string(),
                importance: importance.clamp(0.0, 1.0),
                category: category.to_string(),
                topics,
            },
            embedding,
        });
        let saved = self.persist(&path, next).await?;
        info!(path = %path, count = saved.len(), "🧠 新增长期记忆");
        *guard = Some(Arc::new(saved));

        Ok(format!("Successfully stored memory: {}", content))
    }

    /// 语义检索，结果按相似度降序，数量为 `min(top_k, N)`
    ///
    /// 后端读取失败时降级为空结果（不写入缓存，下次重新加载）。
    pub async fn search(&self, credential: &str, query: &str, top_k: usize) -> Result<Vec<MemoryData>> {
        let path = self.path(credential).await?;
        let collection = match self.prepare_for_search(&path).await {
            Ok(collection) => collection,
            Err(e) => {
                warn!(path = %path, error = %e, "记忆不可用，检索降级为空");
                return Ok(Vec::new());
            }
        };
        if collection.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.encode_one(query).await?;
        let k = top_k.clamp(1, collection.len());
        let hits = tokio::task::spawn_blocking(move || {
            let index = SimilarityIndex::build(collection.memories.iter().map(|m| m.embedding.as_slice()));
            index
                .search(&query_vector, k)
                .into_iter()
                .map(|n| collection.memories[n.index].data.clone())
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| EchoError::Other(format!("similarity search failed: {}", e)))?;

        debug!(path = %path, hits = hits.len(), "🔎 检索完成");
        Ok(hits)
    }

    /// 删除该用户的全部记忆
    pub async fn delete_all(&self, credential: &str) -> Result<String> {
        let path = self.path(credential).await?;
        let slot = self.cache.slot(&path).await;
        let mut guard = slot.write().await;
        let deleted = self.backend.delete(&path).await;
        *guard = None;
        let existed = deleted?;
        info!(path = %path, existed, "🗑️ 已删除全部长期记忆");
        Ok("Successfully deleted all long-term memories.".to_string())
    }
}
