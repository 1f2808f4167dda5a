//! 记忆系统
//!
//! 分两层，职责各不相同：
//!
//! | 层次 | 实现 | 内容 |
//! |------|------|------|
//! | 长期事实库 | [`LongTermMemoryStore`] | 带向量的事实条目，语义检索 + 定期去重 |
//! | 用户画像 | [`ProfileMemoryService`] | 一段要点文本，注入系统提示词 |
//!
//! 两者都以 `用户目录 + 相对文件路径` 为键缓存在进程内（[`MemoryCache`]），
//! 缓存在服务启动时创建，只在显式删除时清空。
//!
//! ## 组成
//!
//! - [`types`]：数据模型与 JSON 编解码
//! - [`index`]：归一化向量上的内积近邻检索
//! - [`dedup`]：基于相似度阈值与重要程度的近似去重
//! - [`cache`]：按路径加锁的进程级缓存

pub mod cache;
pub mod dedup;
pub mod index;
pub mod profile;
pub mod store;
pub mod types;

pub use cache::MemoryCache;
pub use dedup::Deduplicator;
pub use index::{Neighbor, SimilarityIndex};
pub use profile::{MemoryCheck, MemoryRequest, MemoryUpdate, ProfileMemoryService};
pub use store::LongTermMemoryStore;
pub use types::{MemoryCollection, MemoryData, MemoryRecord};
