//! 长期记忆工具：store / search / delete
//!
//! | 工具 | 对应操作 |
//! |------|----------|
//! | `store_long_term_memory` | [`LongTermMemoryStore::add`] |
//! | `search_long_term_memory` | [`LongTermMemoryStore::search`] |
//! | `delete_long_term_memory` | [`LongTermMemoryStore::delete_all`]（可同时清除用户画像） |
//!
//! 工具输出始终是可读文本，存储层的错误不会原样暴露给用户。

use crate::error::ToolError;
use crate::memory::types::MemoryData;
use crate::memory::{LongTermMemoryStore, ProfileMemoryService};
use crate::tools::{Tool, ToolContext, ToolParameters, ToolResult};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

const DEFAULT_CATEGORY: &str = "general";
const DEFAULT_IMPORTANCE: f64 = 0.5;
const DEFAULT_TOP_K: u64 = 5;
const MAX_TOP_K: u64 = 20;
const NO_MEMORIES: &str = "No memories found.";

// ── StoreMemoryTool ──────────────────────────────────────────────────────────

/// 保存一条关于用户的事实
pub struct StoreMemoryTool {
    store: Arc<LongTermMemoryStore>,
}

impl StoreMemoryTool {
    pub fn new(store: Arc<LongTermMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for StoreMemoryTool {
    fn name(&self) -> &str {
        "store_long_term_memory"
    }

    fn description(&self) -> &str {
        "Store important information about the user for long-term memory. \
         Use this to remember user preferences, personal details, goals, and context \
         that should be recalled in future conversations."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The memory content to store. Should be a clear, concise fact about the user."
                },
                "category": {
                    "type": "string",
                    "description": "Category of the info (e.g., 'preferences', 'personal_info', 'goals', 'plans', 'context')",
                    "default": DEFAULT_CATEGORY
                },
                "importance": {
                    "type": "number",
                    "description": "Importance score between 0 and 1. Higher means more important to remember.",
                    "minimum": 0,
                    "maximum": 1,
                    "default": DEFAULT_IMPORTANCE
                },
                "topics": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Related topics or tags for the memory",
                    "default": []
                }
            },
            "required": ["content", "category"]
        })
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        parameters: ToolParameters,
    ) -> crate::error::Result<ToolResult> {
        let content = parameters
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::MissingParameter("content".to_string()))?;

        let category = parameters
            .get("category")
            .and_then(|v| v.as_str())
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(DEFAULT_CATEGORY);

        let importance = parameters
            .get("importance")
            .and_then(|v| v.as_f64())
            .unwrap_or(DEFAULT_IMPORTANCE)
            .clamp(0.0, 1.0);

        let topics: Vec<String> = parameters
            .get("topics")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|t| t.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        debug!(category = %category, importance, "💡 store_long_term_memory");

        match self
            .store
            .add(&ctx.credential, content, importance, category, topics)
            .await
        {
            Ok(confirmation) => Ok(ToolResult::success(confirmation)),
            Err(e) => {
                warn!(error = %e, "记忆写入失败");
                Ok(ToolResult::error(format!("Error storing memory: {}", e)))
            }
        }
    }
}

// ── SearchMemoryTool ─────────────────────────────────────────────────────────

/// 语义检索用户的长期记忆
pub struct SearchMemoryTool {
    store: Arc<LongTermMemoryStore>,
}

impl SearchMemoryTool {
    pub fn new(store: Arc<LongTermMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for SearchMemoryTool {
    fn name(&self) -> &str {
        "search_long_term_memory"
    }

    fn description(&self) -> &str {
        "Search long-term memories about the user using semantic similarity. \
         Use this to recall user preferences, personal information, goals, and context \
         from previous conversations. Returns the most relevant memories based on the query."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query. Can be a question or keywords to find relevant memories."
                },
                "top_k": {
                    "type": "integer",
                    "description": "Number of most relevant memories to return",
                    "default": DEFAULT_TOP_K,
                    "minimum": 1,
                    "maximum": MAX_TOP_K
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        parameters: ToolParameters,
    ) -> crate::error::Result<ToolResult> {
        let query = parameters
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::MissingParameter("query".to_string()))?;

        let top_k = parameters
            .get("top_k")
            .and_then(|v| v.as_u64())
            .map(|n| n.clamp(1, MAX_TOP_K))
            .unwrap_or(DEFAULT_TOP_K) as usize;

        debug!(query = %query, top_k, "🔍 search_long_term_memory");

        let memories = match self.store.search(&ctx.credential, query, top_k).await {
            Ok(memories) => memories,
            Err(e) => {
                warn!(error = %e, "记忆检索失败");
                Vec::new()
            }
        };
        Ok(ToolResult::success(format_memories(&memories)))
    }
}

fn format_memories(memories: &[MemoryData]) -> String {
    if memories.is_empty() {
        return NO_MEMORIES.to_string();
    }
    let mut out = format!("Found {} relevant memories:\n", memories.len());
    for memory in memories {
        out.push_str(&format!(
            "**Category:** {}\n**Importance:** {}\n",
            memory.category, memory.importance
        ));
        if !memory.topics.is_empty() {
            out.push_str(&format!("**Topics:** {}\n", memory.topics.join(", ")));
        }
        out.push_str(&format!("**Content:** {}\n\n", memory.content));
    }
    out
}

// ── DeleteMemoryTool ─────────────────────────────────────────────────────────

/// 删除用户的全部长期记忆
pub struct DeleteMemoryTool {
    store: Arc<LongTermMemoryStore>,
    profile: Option<Arc<ProfileMemoryService>>,
}

impl DeleteMemoryTool {
    pub fn new(store: Arc<LongTermMemoryStore>) -> Self {
        Self {
            store,
            profile: None,
        }
    }

    /// 同时清除用户画像
    pub fn with_profile(mut self, profile: Arc<ProfileMemoryService>) -> Self {
        self.profile = Some(profile);
        self
    }
}

#[async_trait::async_trait]
impl Tool for DeleteMemoryTool {
    fn name(&self) -> &str {
        "delete_long_term_memory"
    }

    fn description(&self) -> &str {
        "Delete all long-term memories about the user. \
         This permanently removes all stored information including preferences, \
         personal details, goals, and context from previous conversations. \
         Use only when the user explicitly requests to delete their memories. \
         This action cannot be undone."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        _parameters: ToolParameters,
    ) -> crate::error::Result<ToolResult> {
        // 两处都要尝试删除，任何一处失败都报告失败
        let facts = self.store.delete_all(&ctx.credential);
        let result = match &self.profile {
            Some(profile) => {
                let (facts, profile) = tokio::join!(facts, profile.delete_all(&ctx.credential));
                match (facts, profile) {
                    (Ok(confirmation), Ok(_)) => Ok(confirmation),
                    (Err(e), _) | (_, Err(e)) => Err(e),
                }
            }
            None => facts.await,
        };
        match result {
            Ok(confirmation) => Ok(ToolResult::success(confirmation)),
            Err(e) => {
                warn!(error = %e, "记忆删除失败");
                Ok(ToolResult::error(format!("Error deleting memories: {}", e)))
            }
        }
    }
}
