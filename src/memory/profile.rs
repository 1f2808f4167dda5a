//! 用户画像记忆
//!
//! 每个用户一段自由文本（要点列表），注入 Agent 的系统提示词，每轮对话结束后两步刷新：
//!
//! 1. [`MemoryRequest::Check`]：判断本轮对话是否出现了新的用户信息；
//! 2. [`MemoryRequest::Update`]：仅在第 1 步为真时，合并旧画像与新信息生成完整画像并保存。
//!
//! 两种请求各自携带提示词模板与响应 JSON Schema，LLM 或解析失败只记录日志，不影响对话。

use crate::error::{ParseError, Result};
use crate::llm::types::{Message, ResponseFormat};
use crate::llm::{ChatOptions, LlmClient};
use crate::memory::cache::MemoryCache;
use crate::storage::BlobBackend;
use crate::storage::resolver::{UserResolver, join_path};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_PROFILE_FILE: &str = "__long-memories/data.txt";
pub const NO_PROFILE: &str = "No information available about user";
const NO_EXISTING: &str = "No existing memories";

const CHECK_TEMPLATE: &str = r#"You are a memory filter. Your ONLY job is to quickly determine if any new information is available about the user.

## What must be stored:
- Personal details (name, location, job, etc.)
- Preferences and likes/dislikes
- Goals, projects, or plans
- Skills, hobbies, or interests
- Important relationships or life events
- Decisions or past experiences

## Instructions:
1. Find any information about the user in USER_MESSAGE and ASSISTANT_MESSAGE that can be stored
2. Compare it with EXISTING_INFORMATION and decide whether anything NEW was revealed or should be updated
3. Respond according to RESPONSE_FORMAT

## EXISTING_INFORMATION:
{current_memories}

## USER_MESSAGE:
{user_message}

## ASSISTANT_MESSAGE:
{assistant_message}

## RESPONSE_FORMAT:
{format_instructions}
"#;

const UPDATE_TEMPLATE: &str = r#"You are a memory manager. Generate updated memory content by merging existing memories with new information.

## Your Task:
Combine EXISTING_INFORMATION with the NEW information from USER_MESSAGE and ASSISTANT_MESSAGE. Output the complete updated memory in concise bullet format.

## Rules:
1. Be extremely concise, telegraphic style, short phrases
2. Use bullet points (- prefix) for each fact
3. Each bullet is 1-2 sentences max
4. Remove outdated or contradicting information
5. Group related facts with markdown headers
6. Facts only, no explanations

## EXISTING_INFORMATION:
{current_memories}

## USER_MESSAGE:
{user_message}

## ASSISTANT_MESSAGE:
{assistant_message}

## RESPONSE_FORMAT:
{format_instructions}
"#;

/// 画像刷新的两种请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryRequest {
    /// 是否需要更新，响应为 [`MemoryCheck`]
    Check,
    /// 生成完整新画像，响应为 [`MemoryUpdate`]
    Update,
}

/// `Check` 的响应
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemoryCheck {
    pub needs_update: bool,
    #[serde(default)]
    pub reason: String,
}

/// `Update` 的响应
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemoryUpdate {
    pub updated_memories: String,
}

impl MemoryRequest {
    fn template(self) -> &'static str {
        match self {
            MemoryRequest::Check => CHECK_TEMPLATE,
            MemoryRequest::Update => UPDATE_TEMPLATE,
        }
    }

    fn schema_name(self) -> &'static str {
        match self {
            MemoryRequest::Check => "memory_update_check",
            MemoryRequest::Update => "memory_update_result",
        }
    }

    /// 响应结构的 JSON Schema
    pub fn schema(self) -> Value {
        match self {
            MemoryRequest::Check => json!({
                "type": "object",
                "properties": {
                    "needs_update": {
                        "type": "boolean",
                        "description": "Whether the conversation contains NEW information about the user that should be stored"
                    },
                    "reason": {
                        "type": "string",
                        "description": "Brief 1-sentence explanation of why an update is or isn't needed"
                    }
                },
                "required": ["needs_update", "reason"],
                "additionalProperties": false
            }),
            MemoryRequest::Update => json!({
                "type": "object",
                "properties": {
                    "updated_memories": {
                        "type": "string",
                        "description": "The complete updated memory content in concise bullet point format with all existing and new information"
                    }
                },
                "required": ["updated_memories"],
                "additionalProperties": false
            }),
        }
    }

    pub fn response_format(self) -> ResponseFormat {
        ResponseFormat::json_schema(self.schema_name(), self.schema())
    }

    /// 填充提示词模板
    pub fn render(self, current: &str, user_message: &str, assistant_message: &str) -> String {
        let current = if current.trim().is_empty() {
            NO_EXISTING
        } else {
            current
        };
        let format_instructions = format!(
            "Respond with a single JSON object that conforms to this JSON Schema:\n{}",
            self.schema()
        );
        self.template()
            .replace("{format_instructions}", &format_instructions)
            .replace("{current_memories}", current)
            .replace("{user_message}", user_message)
            .replace("{assistant_message}", assistant_message)
    }
}

/// 从模型输出中取出 JSON 对象（容忍 markdown 代码块与前后说明文字）
pub fn parse_response<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let trimmed = raw.trim();
    let start = trimmed.find('{').unwrap_or(0);
    let end = trimmed.rfind('}').map(|i| i + 1).unwrap_or(trimmed.len());
    if start >= end {
        return Err(ParseError::UnexpectedFormat(trimmed.to_string()).into());
    }
    serde_json::from_str(&trimmed[start..end])
        .map_err(|e| ParseError::JsonError(e.to_string()).into())
}

/// 用户画像的读取、刷新与删除
pub struct ProfileMemoryService {
    backend: Arc<dyn BlobBackend>,
    resolver: Arc<dyn UserResolver>,
    llm: Arc<dyn LlmClient>,
    cache: Arc<MemoryCache<String>>,
    profile_file: String,
}

impl ProfileMemoryService {
    pub fn new(
        backend: Arc<dyn BlobBackend>,
        resolver: Arc<dyn UserResolver>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            backend,
            resolver,
            llm,
            cache: Arc::new(MemoryCache::new()),
            profile_file: DEFAULT_PROFILE_FILE.to_string(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<MemoryCache<String>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_profile_file(mut self, profile_file: impl Into<String>) -> Self {
        self.profile_file = profile_file.into();
        self
    }

    async fn path(&self, credential: &str) -> Result<String> {
        let home = self.resolver.home(credential).await?;
        Ok(join_path(&home, &self.profile_file))
    }

    /// 当前画像文本；无画像时返回固定占位文本
    ///
    /// 后端读取失败时同样返回占位文本，且不写入缓存。
    pub async fn get(&self, credential: &str) -> Result<String> {
        let path = self.path(credential).await?;
        let slot = self.cache.slot(&path).await;
        if let Some(text) = slot.read().await.as_ref() {
            return Ok(or_placeholder(text));
        }

        let mut guard = slot.write().await;
        if let Some(text) = guard.as_ref() {
            return Ok(or_placeholder(text));
        }
        let text = match self.backend.get(&path).await {
            Ok(Some(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(None) => String::new(),
            Err(e) => {
                warn!(path = %path, error = %e, "画像读取失败");
                return Ok(NO_PROFILE.to_string());
            }
        };
        debug!(path = %path, len = text.len(), "📥 已加载用户画像");
        let result = or_placeholder(&text);
        *guard = Some(Arc::new(text));
        Ok(result)
    }

    async fn ask<T: DeserializeOwned>(
        &self,
        request: MemoryRequest,
        current: &str,
        user_message: &str,
        assistant_message: &str,
    ) -> Result<T> {
        let prompt = request.render(current, user_message, assistant_message);
        let reply = self
            .llm
            .chat(
                vec![Message::system(prompt)],
                ChatOptions::with_format(request.response_format()),
            )
            .await?;
        parse_response(reply.content.as_deref().unwrap_or_default())
    }

    /// 按本轮对话刷新画像，返回是否写入了新画像
    ///
    /// LLM 调用或响应解析失败时跳过本次刷新；写入后端失败则返回错误。
    pub async fn update(
        &self,
        credential: &str,
        current: &str,
        user_message: &str,
        assistant_message: &str,
    ) -> Result<bool> {
        let check: MemoryCheck = match self
            .ask(MemoryRequest::Check, current, user_message, assistant_message)
            .await
        {
            Ok(check) => check,
            Err(e) => {
                warn!(error = %e, "画像检查失败，跳过更新");
                return Ok(false);
            }
        };
        debug!(needs_update = check.needs_update, reason = %check.reason, "画像检查");
        if !check.needs_update {
            return Ok(false);
        }

        let update: MemoryUpdate = match self
            .ask(MemoryRequest::Update, current, user_message, assistant_message)
            .await
        {
            Ok(update) => update,
            Err(e) => {
                warn!(error = %e, "画像生成失败，跳过更新");
                return Ok(false);
            }
        };

        let path = self.path(credential).await?;
        let slot = self.cache.slot(&path).await;
        let mut guard = slot.write().await;
        self.backend
            .put(&path, update.updated_memories.clone().into_bytes())
            .await?;
        *guard = Some(Arc::new(update.updated_memories));
        info!(path = %path, "📝 用户画像已更新");
        Ok(true)
    }

    /// 删除画像并清空缓存，画像不存在同样视为成功
    pub async fn delete_all(&self, credential: &str) -> Result<String> {
        let path = self.path(credential).await?;
        let slot = self.cache.slot(&path).await;
        let mut guard = slot.write().await;
        let deleted = self.backend.delete(&path).await;
        *guard = None;
        let existed = deleted?;
        info!(path = %path, existed, "🗑️ 已删除用户画像");
        Ok("Successfully deleted all long-term memories.".to_string())
    }
}

fn or_placeholder(text: &str) -> String {
    if text.trim().is_empty() {
        NO_PROFILE.to_string()
    } else {
        text.to_string()
    }
}
