pub mod agent;
pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod memory;
pub mod storage;
pub mod testing;
pub mod tools;

pub mod prelude {
    pub use crate::agent::{AgentConfig, MemoryAgent, Turn};
    pub use crate::config::AppConfig;
    pub use crate::embedding::{Embedder, OpenAiEmbedder};
    pub use crate::error::Result;
    pub use crate::llm::{LlmClient, OpenAiClient};
    pub use crate::memory::{LongTermMemoryStore, MemoryCache, ProfileMemoryService};
    pub use crate::storage::{BlobBackend, UserResolver};
    pub use crate::tools::{Tool, ToolContext, ToolManager, ToolParameters, ToolResult};
}
