//! 带长期记忆的对话 Agent
//!
//! 单轮处理流程：
//!
//! 1. 读取用户画像，替换系统提示词中的 `{USER_INFO}`；
//! 2. 携带工具定义调用 LLM；返回工具调用时全部并发执行，结果回填后再次调用，
//!    直到得到最终回答或超过 `max_iterations`；
//! 3. 以本轮用户消息与最终回答刷新用户画像（失败不影响回答）。
//!
//! Agent 本身不保存会话历史，调用方把 [`Turn::messages`] 追加到自己的历史中，
//! 因此同一个 Agent 可以同时服务多个用户。

mod config;

pub use config::{AgentConfig, DEFAULT_SYSTEM_PROMPT, USER_INFO_PLACEHOLDER};

use crate::error::{AgentError, Result};
use crate::llm::types::{Message, ToolCall};
use crate::llm::{ChatOptions, LlmClient};
use crate::memory::ProfileMemoryService;
use crate::memory::profile::NO_PROFILE;
use crate::tools::{ToolContext, ToolInvocation, ToolManager, ToolParameters};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 一轮对话的结果
#[derive(Debug, Clone)]
pub struct Turn {
    /// 最终回答
    pub answer: String,
    /// 本轮新增的消息（用户消息、工具调用与结果、最终回答），不含系统提示词
    pub messages: Vec<Message>,
}

pub struct MemoryAgent {
    config: AgentConfig,
    llm: Arc<dyn LlmClient>,
    tools: ToolManager,
    profile: Arc<ProfileMemoryService>,
}

impl MemoryAgent {
    pub fn new(
        config: AgentConfig,
        llm: Arc<dyn LlmClient>,
        tools: ToolManager,
        profile: Arc<ProfileMemoryService>,
    ) -> Self {
        Self {
            config,
            llm,
            tools,
            profile,
        }
    }

    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    /// 处理一条用户消息
    pub async fn handle(
        &self,
        ctx: &ToolContext,
        history: &[Message],
        user_message: &str,
    ) -> Result<Turn> {
        let user_info = match self.profile.get(&ctx.credential).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "读取用户画像失败");
                NO_PROFILE.to_string()
            }
        };

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.config.render_system_prompt(&user_info)));
        messages.extend_from_slice(history);
        messages.push(Message::user(user_message.to_string()));
        let turn_start = messages.len() - 1;

        let definitions = self.tools.get_tool_definitions();
        let mut answer = None;

        for iteration in 0..self.config.max_iterations {
            debug!(iteration = iteration + 1, "🔄 Agent 迭代");
            let reply = self
                .llm
                .chat(messages.clone(), ChatOptions::with_tools(definitions.clone()))
                .await?;

            let tool_calls = reply.tool_calls.clone().unwrap_or_default();
            if tool_calls.is_empty() {
                let content = reply.content.clone().ok_or(AgentError::NoResponse)?;
                messages.push(reply);
                answer = Some(content);
                break;
            }

            messages.push(reply);
            let results = self.run_tool_calls(ctx, &tool_calls).await;
            messages.extend(results);
        }

        let Some(answer) = answer else {
            return Err(AgentError::MaxIterationsExceeded(self.config.max_iterations).into());
        };
        info!(len = answer.len(), "✅ 最终回答");

        if let Err(e) = self
            .profile
            .update(&ctx.credential, &user_info, user_message, &answer)
            .await
        {
            warn!(error = %e, "用户画像更新失败");
        }

        Ok(Turn {
            answer,
            messages: messages.split_off(turn_start),
        })
    }

    /// 并发执行一批工具调用，返回按调用顺序排列的 tool 消息
    async fn run_tool_calls(&self, ctx: &ToolContext, tool_calls: &[ToolCall]) -> Vec<Message> {
        let mut invocations = Vec::with_capacity(tool_calls.len());
        let mut parse_errors = Vec::with_capacity(tool_calls.len());
        for call in tool_calls {
            debug!(tool = %call.function.name, args = %call.function.arguments, "🚀 调用工具");
            match parse_arguments(&call.function.arguments) {
                Ok(parameters) => {
                    parse_errors.push(None);
                    invocations.push(ToolInvocation {
                        name: call.function.name.clone(),
                        parameters,
                    });
                }
                Err(e) => {
                    parse_errors.push(Some(e));
                }
            }
        }

        let mut results = self.tools.execute_many(ctx, invocations).await.into_iter();
        tool_calls
            .iter()
            .zip(parse_errors)
            .map(|(call, parse_error)| {
                let content = match parse_error {
                    Some(e) => format!("Tool error: invalid arguments: {}", e),
                    None => match results.next() {
                        Some(Ok(result)) => result.into_content(),
                        Some(Err(e)) => {
                            warn!(tool = %call.function.name, error = %e, "工具执行失败");
                            format!("Tool error: {}", e)
                        }
                        None => "Tool error: no result".to_string(),
                    },
                };
                debug!(tool = %call.function.name, "📤 工具返回");
                Message::tool_result(call.id.clone(), call.function.name.clone(), content)
            })
            .collect()
    }
}

fn parse_arguments(raw: &str) -> serde_json::Result<ToolParameters> {
    if raw.trim().is_empty() {
        return Ok(ToolParameters::new());
    }
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EchoError;
    use crate::memory::LongTermMemoryStore;
    use crate::storage::{HashedUserResolver, InMemoryBlobBackend};
    use crate::testing::{MockEmbedder, MockLlmClient};
    use crate::tools::memory::{DeleteMemoryTool, SearchMemoryTool, StoreMemoryTool};

    struct Harness {
        agent: MemoryAgent,
        llm: Arc<MockLlmClient>,
        store: Arc<LongTermMemoryStore>,
        backend: Arc<InMemoryBlobBackend>,
    }

    fn harness(llm: MockLlmClient, max_iterations: usize) -> Harness {
        let backend = Arc::new(InMemoryBlobBackend::new());
        let llm = Arc::new(llm);
        let store = Arc::new(LongTermMemoryStore::new(
            backend.clone(),
            Arc::new(HashedUserResolver),
            Arc::new(MockEmbedder::new()),
        ));
        let profile = Arc::new(ProfileMemoryService::new(
            backend.clone(),
            Arc::new(HashedUserResolver),
            llm.clone(),
        ));
        let mut tools = ToolManager::new();
        tools.register(Arc::new(StoreMemoryTool::new(store.clone())));
        tools.register(Arc::new(SearchMemoryTool::new(store.clone())));
        tools.register(Arc::new(DeleteMemoryTool::new(store.clone()).with_profile(profile.clone())));
        let agent = MemoryAgent::new(
            AgentConfig::new("About the user: {USER_INFO}").max_iterations(max_iterations),
            llm.clone(),
            tools,
            profile,
        );
        Harness {
            agent,
            llm,
            store,
            backend,
        }
    }

    #[tokio::test]
    async fn test_plain_answer_updates_profile() {
        let h = harness(
            MockLlmClient::new()
                .with_response("Hello Alice!")
                .with_response(r#"{"needs_update": true, "reason": "name"}"#)
                .with_response(r#"{"updated_memories": "- Name: Alice"}"#)
                .with_response("Your name is Alice.")
                .with_response(r#"{"needs_update": false, "reason": "nothing new"}"#),
            5,
        );
        let ctx = ToolContext::new("alice");
        let turn = h.agent.handle(&ctx, &[], "Hi, I'm Alice").await.unwrap();
        assert_eq!(turn.answer, "Hello Alice!");
        assert_eq!(turn.messages.len(), 2);
        assert_eq!(turn.messages[0].role, "user");
        assert_eq!(turn.messages[1].role, "assistant");

        let calls = h.llm.all_calls();
        let system = calls[0].messages[0].content.clone().unwrap();
        assert_eq!(system, "About the user: No information available about user");
        assert_eq!(calls[0].options.tools.as_ref().unwrap().len(), 3);

        let second = h.agent.handle(&ctx, &turn.messages, "What's my name?").await.unwrap();
        assert_eq!(second.answer, "Your name is Alice.");

        // 第二轮的系统提示词已包含刷新后的画像，并带上了上一轮历史
        let calls = h.llm.all_calls();
        let system = calls[3].messages[0].content.clone().unwrap();
        assert_eq!(system, "About the user: - Name: Alice");
        assert_eq!(calls[3].messages.len(), 4);
    }

    #[tokio::test]
    async fn test_tool_calls_run_then_answer() {
        let h = harness(
            MockLlmClient::new()
                .with_tool_calls([
                    (
                        "store_long_term_memory",
                        r#"{"content": "has a cat named Mittens", "category": "context", "importance": 0.7}"#,
                    ),
                    ("search_long_term_memory", r#"{"query": "pets"}"#),
                ])
                .with_response("Noted, Mittens sounds lovely.")
                .with_response(r#"{"needs_update": false, "reason": "stored as fact"}"#),
            5,
        );
        let ctx = ToolContext::new("alice");
        let turn = h.agent.handle(&ctx, &[], "I have a cat named Mittens").await.unwrap();
        assert_eq!(turn.answer, "Noted, Mittens sounds lovely.");
        // user, assistant(tool_calls), tool, tool, assistant
        assert_eq!(turn.messages.len(), 5);
        assert_eq!(turn.messages[2].role, "tool");
        assert_eq!(turn.messages[2].tool_call_id.as_deref(), Some("call_0"));
        assert_eq!(
            turn.messages[2].content.as_deref(),
            Some("Successfully stored memory: has a cat named Mittens")
        );

        let hits = h.store.search("alice", "has a cat named Mittens", 1).await.unwrap();
        assert_eq!(hits[0].category, "context");
        assert_eq!(h.llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_bad_tool_arguments_are_reported_to_llm() {
        let h = harness(
            MockLlmClient::new()
                .with_tool_calls([("search_long_term_memory", "{not json")])
                .with_response("Sorry, let me try again later.")
                .with_response(r#"{"needs_update": false, "reason": ""}"#),
            5,
        );
        let turn = h
            .agent
            .handle(&ToolContext::new("alice"), &[], "what do you know?")
            .await
            .unwrap();
        let tool_message = turn.messages[2].content.clone().unwrap();
        assert!(tool_message.starts_with("Tool error: invalid arguments"));
    }

    #[tokio::test]
    async fn test_max_iterations_exceeded() {
        let h = harness(
            MockLlmClient::new()
                .with_tool_calls([("search_long_term_memory", r#"{"query": "a"}"#)])
                .with_tool_calls([("search_long_term_memory", r#"{"query": "b"}"#)]),
            2,
        );
        let err = h
            .agent
            .handle(&ToolContext::new("alice"), &[], "loop")
            .await
            .unwrap_err();
        assert!(matches!(err, EchoError::Agent(AgentError::MaxIterationsExceeded(2))));
        assert_eq!(h.llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_profile_failure_does_not_fail_turn() {
        let h = harness(
            MockLlmClient::new()
                .with_response("Sure.")
                .with_network_error("memory model down"),
            5,
        );
        let turn = h
            .agent
            .handle(&ToolContext::new("alice"), &[], "hello")
            .await
            .unwrap();
        assert_eq!(turn.answer, "Sure.");
        assert!(h.backend.is_empty().await);
    }
}
