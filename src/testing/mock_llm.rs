//! Mock LLM 客户端，用于在不发起真实 HTTP 请求的情况下测试使用了 [`LlmClient`] 的组件。
//!
//! 典型用途：
//! - 测试 [`ProfileMemoryService`](crate::memory::ProfileMemoryService) 的两步更新流程
//! - 测试 [`MemoryAgent`](crate::agent::MemoryAgent) 的工具调用循环
//! - 任何注入了 `Arc<dyn LlmClient>` 依赖的组件
//!
//! # 示例
//!
//! ```rust
//! use echo_memory::testing::MockLlmClient;
//! use echo_memory::llm::LlmClient;
//! use echo_memory::llm::types::Message;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mock = Arc::new(
//!     MockLlmClient::new()
//!         .with_response("第一次响应")
//!         .with_response("第二次响应")
//! );
//!
//! let r1 = mock.chat_simple(vec![Message::user("hi".to_string())]).await.unwrap();
//! assert_eq!(r1, "第一次响应");
//! assert_eq!(mock.call_count(), 1);
//! # }
//! ```

use crate::error::{EchoError, LlmError, Result};
use crate::llm::types::{FunctionCall, Message, ToolCall};
use crate::llm::{ChatOptions, LlmClient};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// 预设响应（assistant 消息或错误）
enum MockLlmResponse {
    Reply(Message),
    Err(EchoError),
}

/// 一次调用的完整记录
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub options: ChatOptions,
}

/// 可脚本化的 Mock LLM 客户端。
///
/// 按顺序返回预设的响应；队列耗尽后返回 `EmptyResponse` 错误。
/// 所有调用都被记录，可通过 [`call_count`](MockLlmClient::call_count) /
/// [`last_messages`](MockLlmClient::last_messages) 等方法检查。
pub struct MockLlmClient {
    responses: Arc<Mutex<VecDeque<MockLlmResponse>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    /// 创建空 Mock，尚未设置任何响应
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn push(self, response: MockLlmResponse) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    /// 追加一条纯文本 assistant 回复
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.push(MockLlmResponse::Reply(Message::assistant(text.into())))
    }

    /// 批量追加多条文本回复
    pub fn with_responses(self, texts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        {
            let mut q = self.responses.lock().unwrap();
            for t in texts {
                q.push_back(MockLlmResponse::Reply(Message::assistant(t.into())));
            }
        }
        self
    }

    /// 追加一条要求调用工具的回复，`calls` 为 `(工具名, JSON 参数)` 列表
    pub fn with_tool_calls<'a>(self, calls: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let tool_calls = calls
            .into_iter()
            .enumerate()
            .map(|(i, (name, arguments))| ToolCall {
                id: format!("call_{}", i),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            })
            .collect();
        self.push(MockLlmResponse::Reply(Message {
            role: "assistant".to_string(),
            tool_calls: Some(tool_calls),
            ..Message::default()
        }))
    }

    /// 追加一条错误响应（用于测试错误处理路径）
    pub fn with_error(self, err: EchoError) -> Self {
        self.push(MockLlmResponse::Err(err))
    }

    /// 追加一条网络错误（常用的便捷方法）
    pub fn with_network_error(self, msg: impl Into<String>) -> Self {
        self.with_error(EchoError::Llm(LlmError::NetworkError(msg.into())))
    }

    /// 已发生的调用总次数
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// 最后一次调用时传入的 messages（若从未调用则返回 `None`）
    pub fn last_messages(&self) -> Option<Vec<Message>> {
        self.calls.lock().unwrap().last().map(|c| c.messages.clone())
    }

    /// 所有历史调用（按时序排列）
    pub fn all_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// 剩余未消费的预设响应数量
    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat(&self, messages: Vec<Message>, options: ChatOptions) -> Result<Message> {
        self.calls
            .lock()
            .unwrap()
            .push(RecordedCall { messages, options });

        match self.responses.lock().unwrap().pop_front() {
            Some(MockLlmResponse::Reply(message)) => Ok(message),
            Some(MockLlmResponse::Err(e)) => Err(e),
            None => Err(EchoError::Llm(LlmError::EmptyResponse)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let mock = MockLlmClient::new()
            .with_tool_calls([("search_long_term_memory", r#"{"query":"name"}"#)])
            .with_response("done");

        let first = mock
            .chat(vec![Message::user("hi".to_string())], ChatOptions::default())
            .await
            .unwrap();
        let calls = first.tool_calls.unwrap();
        assert_eq!(calls[0].function.name, "search_long_term_memory");

        let second = mock.chat_simple(vec![]).await.unwrap();
        assert_eq!(second, "done");
        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.remaining(), 0);
        assert!(mock.chat_simple(vec![]).await.is_err());
    }
}
