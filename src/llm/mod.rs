mod client;
pub mod config;
pub mod types;

use crate::error::{LlmError, Result};
use crate::llm::client::{assemble_req_header, post};
use crate::llm::config::ModelConfig;
use crate::llm::types::{ChatCompletionRequest, Message, ResponseFormat, ToolDefinition};
use async_trait::async_trait;
use reqwest::Client;

/// 单次对话请求的可选参数
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub tools: Option<Vec<ToolDefinition>>,
    pub response_format: Option<ResponseFormat>,
    pub temperature: Option<f32>,
}

impl ChatOptions {
    pub fn with_tools(tools: Vec<ToolDefinition>) -> Self {
        Self {
            tools: (!tools.is_empty()).then_some(tools),
            ..Self::default()
        }
    }

    pub fn with_format(format: ResponseFormat) -> Self {
        Self {
            response_format: Some(format),
            temperature: Some(0.0),
            ..Self::default()
        }
    }
}

/// 对话补全接口，Agent 与记忆服务都只依赖此 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 发起一次对话，返回 assistant 消息（可能携带工具调用）
    async fn chat(&self, messages: Vec<Message>, options: ChatOptions) -> Result<Message>;

    /// 无工具对话，只取文本内容
    async fn chat_simple(&self, messages: Vec<Message>) -> Result<String> {
        self.chat(messages, ChatOptions::default())
            .await?
            .content
            .ok_or_else(|| LlmError::EmptyResponse.into())
    }
}

const MAX_TOKENS: u32 = 4096;

/// OpenAI Chat Completions 兼容实现
pub struct OpenAiClient {
    client: Client,
    model: ModelConfig,
}

impl OpenAiClient {
    pub fn new(client: Client, model: ModelConfig) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(&self, messages: Vec<Message>, options: ChatOptions) -> Result<Message> {
        let request_body = ChatCompletionRequest {
            model: self.model.model.clone(),
            messages,
            tools: options.tools,
            temperature: options.temperature,
            max_tokens: Some(MAX_TOKENS),
            response_format: options.response_format,
        };

        let header_map = assemble_req_header(&self.model)?;
        post(&self.client, &request_body, header_map, &self.model.baseurl)
            .await?
            .into_message()
            .ok_or_else(|| LlmError::EmptyResponse.into())
    }
}
