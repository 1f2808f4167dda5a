//! Agent 配置

use crate::config::AgentSettings;

/// 系统提示词中用户画像的占位符
pub const USER_INFO_PLACEHOLDER: &str = "{USER_INFO}";

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful personal assistant with long-term memory.

## What you know about the user
{USER_INFO}

## Memory tools
- Call `search_long_term_memory` before answering questions that may depend on the user's preferences, background or earlier conversations.
- Call `store_long_term_memory` when the user reveals a new, durable fact about themselves (preferences, personal details, goals, plans, important context). Store one concise fact per call.
- Call `delete_long_term_memory` only when the user explicitly asks you to forget everything.

Never mention these tools unless the user asks how your memory works."#;

/// Agent 运行时配置
///
/// 通过构建器链式调用设置各项参数，再传入 [`MemoryAgent::new`](crate::agent::MemoryAgent::new)。
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// 系统提示词，`{USER_INFO}` 会被替换为用户画像
    pub(crate) system_prompt: String,
    /// 最大迭代轮次，防止死循环
    pub(crate) max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: 10,
        }
    }
}

impl AgentConfig {
    pub fn new(system_prompt: &str) -> Self {
        Self {
            system_prompt: system_prompt.to_string(),
            ..Self::default()
        }
    }

    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self::default().max_iterations(settings.max_iterations)
    }

    pub fn system_prompt(mut self, system_prompt: &str) -> Self {
        self.system_prompt = system_prompt.to_string();
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// 注入用户画像后的系统提示词
    pub fn render_system_prompt(&self, user_info: &str) -> String {
        self.system_prompt.replace(USER_INFO_PLACEHOLDER, user_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_injects_user_info() {
        let config = AgentConfig::new("Known facts:\n{USER_INFO}").max_iterations(0);
        assert_eq!(config.render_system_prompt("- Lives in Paris"), "Known facts:\n- Lives in Paris");
        assert_eq!(config.max_iterations, 1);
        assert!(AgentConfig::default().system_prompt.contains(USER_INFO_PLACEHOLDER));
    }
}
