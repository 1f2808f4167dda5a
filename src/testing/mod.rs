//! 测试基础设施
//!
//! 提供在不依赖真实 LLM / 向量服务 / 存储后端的情况下测试 echo-memory 各组件的工具集。
//!
//! | 类型 | 用途 |
//! |------|------|
//! | [`MockLlmClient`] | 替代真实 LLM，脚本化文本回复与工具调用 |
//! | [`MockEmbedder`] | 确定性的文本向量化，可预设向量、注入失败 |
//! | [`CountingBackend`] | 包装任意后端，统计 get / put / delete 次数并可注入故障 |
//!
//! # 设计原则
//!
//! - **零网络请求**：所有 Mock 都完全在内存中运行
//! - **可脚本化**：通过 `with_response()` / `with_vector()` 精确控制返回值
//! - **可观测**：通过 `call_count()` / `gets()` 等方法检查调用情况
//!
//! # 使用示例
//!
//! ```rust
//! use echo_memory::memory::LongTermMemoryStore;
//! use echo_memory::storage::HashedUserResolver;
//! use echo_memory::testing::{CountingBackend, MockEmbedder};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> echo_memory::error::Result<()> {
//! let backend = Arc::new(CountingBackend::default());
//! let store = LongTermMemoryStore::new(
//!     backend.clone(),
//!     Arc::new(HashedUserResolver),
//!     Arc::new(MockEmbedder::new()),
//! );
//!
//! store.add("alice", "prefers dark mode", 0.8, "preferences", vec![]).await?;
//! let hits = store.search("alice", "prefers dark mode", 1).await?;
//! assert_eq!(hits[0].content, "prefers dark mode");
//! assert_eq!(backend.gets(), 1);
//! # Ok(())
//! # }
//! ```

mod counting_backend;
mod mock_embedder;
mod mock_llm;

pub use counting_backend::CountingBackend;
pub use mock_embedder::MockEmbedder;
pub use mock_llm::{MockLlmClient, RecordedCall};
