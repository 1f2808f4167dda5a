//! 工具系统
//!
//! 定义 [`Tool`] trait 和 [`ToolManager`]（注册、执行、并发限流、超时）。
//! 长期记忆工具位于 [`memory`]。
//!
//! 工具执行时通过 [`ToolContext`] 拿到本次请求的用户凭证，
//! 同一个工具实例可以服务所有用户。

pub mod memory;

use crate::config::ToolSettings;
use crate::error::{Result, ToolError};
use crate::llm::types::ToolDefinition;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// 工具执行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: String) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    pub fn error(error: String) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error),
        }
    }

    /// 回填给 LLM 的文本
    pub fn into_content(self) -> String {
        if self.success {
            self.output
        } else {
            self.error.unwrap_or_default()
        }
    }
}

/// 工具执行配置：超时、并发度
#[derive(Debug, Clone)]
pub struct ToolExecutionConfig {
    /// 单次工具执行超时（毫秒）。0 = 不限制。默认 30_000（30 秒）
    pub timeout_ms: u64,
    /// 并行工具调用时的最大并发数。`None` = 不限制（全并发）。默认 `None`
    pub max_concurrency: Option<usize>,
}

impl Default for ToolExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_concurrency: None,
        }
    }
}

impl From<&ToolSettings> for ToolExecutionConfig {
    fn from(settings: &ToolSettings) -> Self {
        Self {
            timeout_ms: settings.timeout_ms,
            max_concurrency: settings.max_concurrency,
        }
    }
}

/// 单次请求的上下文
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// 不透明的用户凭证，由存储层解析为用户目录
    pub credential: String,
}

impl ToolContext {
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
        }
    }
}

pub type ToolParameters = HashMap<String, serde_json::Value>;

/// 工具接口
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// 工具参数的 JSON Schema 定义
    fn parameters(&self) -> serde_json::Value;
    async fn execute(&self, ctx: &ToolContext, parameters: ToolParameters) -> Result<ToolResult>;
}

/// 一次待执行的工具调用
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub name: String,
    pub parameters: ToolParameters,
}

pub struct ToolManager {
    tools: HashMap<String, Arc<dyn Tool>>,
    config: ToolExecutionConfig,
    /// 并发限流器：`Some(sem)` 表示最多同时执行 N 个工具；`None` = 不限制
    semaphore: Option<Arc<Semaphore>>,
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolManager {
    pub fn new() -> Self {
        Self::new_with_config(ToolExecutionConfig::default())
    }

    pub fn new_with_config(config: ToolExecutionConfig) -> Self {
        let semaphore = config
            .max_concurrency
            .map(|n| Arc::new(Semaphore::new(n.max(1))));
        Self {
            tools: HashMap::new(),
            semaphore,
            config,
        }
    }

    /// 返回并发度限制（`None` = 不限制）
    pub fn max_concurrency(&self) -> Option<usize> {
        self.config.max_concurrency
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn register_tools(&mut self, tools: Vec<Arc<dyn Tool>>) {
        for tool in tools {
            self.register(tool);
        }
    }

    pub fn list_tools(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|name| name.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn get_tool(&self, tool_name: &str) -> Option<&dyn Tool> {
        self.tools.get(tool_name).map(|tool| &**tool)
    }

    /// 按名称排序的工具定义，保证每次请求体一致
    pub fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|tool| ToolDefinition::from_tool(&**tool))
            .collect();
        definitions.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        definitions
    }

    pub async fn execute_tool(
        &self,
        ctx: &ToolContext,
        tool_name: &str,
        parameters: ToolParameters,
    ) -> Result<ToolResult> {
        let tool = self
            .get_tool(tool_name)
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))?;

        let _permit = match &self.semaphore {
            Some(sem) => Some(sem.acquire().await.map_err(|e| ToolError::ExecutionFailed {
                tool: tool_name.to_string(),
                message: e.to_string(),
            })?),
            None => None,
        };

        debug!(tool = %tool_name, "🔧 执行工具");
        if self.config.timeout_ms == 0 {
            return tool.execute(ctx, parameters).await;
        }
        match tokio::time::timeout(
            Duration::from_millis(self.config.timeout_ms),
            tool.execute(ctx, parameters),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(tool = %tool_name, timeout_ms = self.config.timeout_ms, "工具执行超时");
                Err(ToolError::Timeout(tool_name.to_string()).into())
            }
        }
    }

    /// 并发执行一批工具调用，结果与输入一一对应；不做自动重试
    pub async fn execute_many(
        &self,
        ctx: &ToolContext,
        invocations: Vec<ToolInvocation>,
    ) -> Vec<Result<ToolResult>> {
        join_all(
            invocations
                .into_iter()
                .map(|call| async move { self.execute_tool(ctx, &call.name, call.parameters).await }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EchoError;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SleepTool {
        delay_ms: u64,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SleepTool {
        fn new(delay_ms: u64) -> Self {
            Self {
                delay_ms,
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl Tool for SleepTool {
        fn name(&self) -> &str {
            "sleep"
        }

        fn description(&self) -> &str {
            "sleeps, then echoes the caller"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, ctx: &ToolContext, _parameters: ToolParameters) -> Result<ToolResult> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(ToolResult::success(ctx.credential.clone()))
        }
    }

    fn invocation(name: &str) -> ToolInvocation {
        ToolInvocation {
            name: name.to_string(),
            parameters: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let manager = ToolManager::new();
        let err = manager
            .execute_tool(&ToolContext::new("k"), "missing", HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EchoError::Tool(ToolError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_timeout() {
        let mut manager = ToolManager::new_with_config(ToolExecutionConfig {
            timeout_ms: 10,
            max_concurrency: None,
        });
        manager.register(Arc::new(SleepTool::new(200)));
        let err = manager
            .execute_tool(&ToolContext::new("k"), "sleep", HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EchoError::Tool(ToolError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_execute_many_preserves_order_and_context() {
        let mut manager = ToolManager::new();
        manager.register(Arc::new(SleepTool::new(5)));
        let results = manager
            .execute_many(
                &ToolContext::new("alice"),
                vec![invocation("sleep"), invocation("missing"), invocation("sleep")],
            )
            .await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().output, "alice");
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[tokio::test]
    async fn test_concurrency_limit() {
        let tool = Arc::new(SleepTool::new(20));
        let mut manager = ToolManager::new_with_config(ToolExecutionConfig {
            timeout_ms: 0,
            max_concurrency: Some(2),
        });
        manager.register(tool.clone());
        let calls = (0..6).map(|_| invocation("sleep")).collect();
        let results = manager.execute_many(&ToolContext::new("k"), calls).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(tool.peak.load(Ordering::SeqCst) <= 2);

        let unlimited = Arc::new(SleepTool::new(20));
        let mut manager = ToolManager::new();
        manager.register(unlimited.clone());
        let calls = (0..6).map(|_| invocation("sleep")).collect();
        manager.execute_many(&ToolContext::new("k"), calls).await;
        assert_eq!(unlimited.peak.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_definitions_sorted() {
        struct Named(&'static str);

        #[async_trait::async_trait]
        impl Tool for Named {
            fn name(&self) -> &str {
                self.0
            }
            fn description(&self) -> &str {
                ""
            }
            fn parameters(&self) -> Value {
                json!({})
            }
            async fn execute(&self, _ctx: &ToolContext, _p: ToolParameters) -> Result<ToolResult> {
                Ok(ToolResult::success(String::new()))
            }
        }

        let mut manager = ToolManager::new();
        manager.register_tools(vec![Arc::new(Named("b")), Arc::new(Named("a"))]);
        let names: Vec<String> = manager
            .get_tool_definitions()
            .into_iter()
            .map(|d| d.function.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(manager.list_tools(), vec!["a", "b"]);
    }
}
