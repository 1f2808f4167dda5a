use std::fmt;

/// echo-memory 项目的统一错误类型
#[derive(Debug)]
pub enum EchoError {
    /// LLM 相关错误
    Llm(LlmError),
    /// 工具执行错误
    Tool(ToolError),
    /// 解析错误
    Parse(ParseError),
    /// 配置错误
    Config(ConfigError),
    /// 存储后端错误
    Storage(StorageError),
    /// 向量化错误
    Embedding(EmbeddingError),
    /// 记忆库错误
    Memory(MemoryError),
    /// Agent 执行错误
    Agent(AgentError),
    /// IO 错误
    Io(std::io::Error),
    /// 其他错误
    Other(String),
}

/// LLM 相关错误
#[derive(Debug)]
pub enum LlmError {
    /// 网络请求失败
    NetworkError(String),
    /// API 返回错误状态码
    ApiError { status: u16, message: String },
    /// 响应格式无效
    InvalidResponse(String),
    /// 没有返回内容
    EmptyResponse,
}

/// 工具执行错误
#[derive(Debug)]
pub enum ToolError {
    /// 工具未找到
    NotFound(String),
    /// 参数缺失
    MissingParameter(String),
    /// 参数类型错误
    InvalidParameter { name: String, message: String },
    /// 工具执行失败
    ExecutionFailed { tool: String, message: String },
    /// 工具执行超时
    Timeout(String),
}

/// 解析错误
#[derive(Debug)]
pub enum ParseError {
    /// JSON 解析错误
    JsonError(String),
    /// 输出格式不符合预期
    UnexpectedFormat(String),
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),
    /// 配置解析失败
    ParseFailed(String),
    /// 缺少必需的配置项
    MissingField(String),
    /// 配置值无效
    InvalidValue { field: String, message: String },
    /// 环境变量格式错误
    EnvFormatError(String),
    /// 未找到指定模型
    ModelNotFound(String),
}

/// 存储后端错误
///
/// "对象不存在" 不属于错误：`get` 返回 `Ok(None)`，`delete` 返回 `Ok(false)`。
#[derive(Debug)]
pub enum StorageError {
    /// 网络层失败（连接、超时）
    Network(String),
    /// 后端返回非成功状态码
    Status { status: u16, message: String },
    /// 本地文件读写失败
    Io(String),
    /// 路径非法（例如包含 `..`）
    InvalidPath(String),
}

/// 向量化错误
#[derive(Debug)]
pub enum EmbeddingError {
    /// 请求失败
    RequestFailed(String),
    /// 返回的向量数量与输入不一致
    CountMismatch { expected: usize, got: usize },
}

/// 记忆库错误
#[derive(Debug)]
pub enum MemoryError {
    /// 记忆内容为空（会产生零范数向量）
    EmptyContent,
    /// 序列化失败
    SerializationError(String),
}

/// Agent 执行错误
#[derive(Debug)]
pub enum AgentError {
    /// 超过最大迭代次数仍未得到最终回答
    MaxIterationsExceeded(usize),
    /// LLM 没有返回任何内容
    NoResponse,
}

impl fmt::Display for EchoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EchoError::Llm(e) => write!(f, "LLM Error: {}", e),
            EchoError::Tool(e) => write!(f, "Tool Error: {}", e),
            EchoError::Parse(e) => write!(f, "Parse Error: {}", e),
            EchoError::Config(e) => write!(f, "Config Error: {}", e),
            EchoError::Storage(e) => write!(f, "Storage Error: {}", e),
            EchoError::Embedding(e) => write!(f, "Embedding Error: {}", e),
            EchoError::Memory(e) => write!(f, "Memory Error: {}", e),
            EchoError::Agent(e) => write!(f, "Agent Error: {}", e),
            EchoError::Io(e) => write!(f, "IO Error: {}", e),
            EchoError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            LlmError::ApiError { status, message } => {
                write!(f, "API error (status {}): {}", status, message)
            }
            LlmError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            LlmError::EmptyResponse => write!(f, "Empty response from LLM"),
        }
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::NotFound(name) => write!(f, "Tool '{}' not found", name),
            ToolError::MissingParameter(name) => write!(f, "Missing parameter: {}", name),
            ToolError::InvalidParameter { name, message } => {
                write!(f, "Invalid parameter '{}': {}", name, message)
            }
            ToolError::ExecutionFailed { tool, message } => {
                write!(f, "Tool '{}' execution failed: {}", tool, message)
            }
            ToolError::Timeout(name) => write!(f, "Tool '{}' timed out", name),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::JsonError(msg) => write!(f, "JSON parse error: {}", msg),
            ParseError::UnexpectedFormat(msg) => write!(f, "Unexpected format: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseFailed(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::MissingField(field) => write!(f, "Missing config field: {}", field),
            ConfigError::InvalidValue { field, message } => {
                write!(f, "Invalid config value for '{}': {}", field, message)
            }
            ConfigError::EnvFormatError(key) => {
                write!(f, "Malformed model env var '{}'", key)
            }
            ConfigError::ModelNotFound(model) => write!(f, "Model '{}' is not configured", model),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Network(msg) => write!(f, "Network error: {}", msg),
            StorageError::Status { status, message } => {
                write!(f, "Backend error (status {}): {}", status, message)
            }
            StorageError::Io(msg) => write!(f, "IO error: {}", msg),
            StorageError::InvalidPath(path) => write!(f, "Invalid storage path: {}", path),
        }
    }
}

impl fmt::Display for EmbeddingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingError::RequestFailed(msg) => write!(f, "Embedding request failed: {}", msg),
            EmbeddingError::CountMismatch { expected, got } => {
                write!(f, "Expected {} embeddings, got {}", expected, got)
            }
        }
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::EmptyContent => write!(f, "Memory content must not be empty"),
            MemoryError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentError::MaxIterationsExceeded(n) => {
                write!(f, "Exceeded maximum iterations ({})", n)
            }
            AgentError::NoResponse => write!(f, "No response from LLM"),
        }
    }
}

impl std::error::Error for EchoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EchoError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for LlmError {}
impl std::error::Error for ToolError {}
impl std::error::Error for ParseError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}
impl std::error::Error for EmbeddingError {}
impl std::error::Error for MemoryError {}
impl std::error::Error for AgentError {}

// From 转换实现
impl From<std::io::Error> for EchoError {
    fn from(err: std::io::Error) -> Self {
        EchoError::Io(err)
    }
}

impl From<reqwest::Error> for EchoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EchoError::Llm(LlmError::NetworkError("Request timeout".to_string()))
        } else if err.is_connect() {
            EchoError::Llm(LlmError::NetworkError(format!(
                "Connection failed: {}",
                err
            )))
        } else {
            EchoError::Llm(LlmError::NetworkError(err.to_string()))
        }
    }
}

impl From<serde_json::Error> for EchoError {
    fn from(err: serde_json::Error) -> Self {
        EchoError::Parse(ParseError::JsonError(err.to_string()))
    }
}

impl From<serde_yaml::Error> for EchoError {
    fn from(err: serde_yaml::Error) -> Self {
        EchoError::Config(ConfigError::ParseFailed(err.to_string()))
    }
}

impl From<LlmError> for EchoError {
    fn from(err: LlmError) -> Self {
        EchoError::Llm(err)
    }
}

impl From<ToolError> for EchoError {
    fn from(err: ToolError) -> Self {
        EchoError::Tool(err)
    }
}

impl From<ParseError> for EchoError {
    fn from(err: ParseError) -> Self {
        EchoError::Parse(err)
    }
}

impl From<ConfigError> for EchoError {
    fn from(err: ConfigError) -> Self {
        EchoError::Config(err)
    }
}

impl From<StorageError> for EchoError {
    fn from(err: StorageError) -> Self {
        EchoError::Storage(err)
    }
}

impl From<EmbeddingError> for EchoError {
    fn from(err: EmbeddingError) -> Self {
        EchoError::Embedding(err)
    }
}

impl From<MemoryError> for EchoError {
    fn from(err: MemoryError) -> Self {
        EchoError::Memory(err)
    }
}

impl From<AgentError> for EchoError {
    fn from(err: AgentError) -> Self {
        EchoError::Agent(err)
    }
}

// 便捷的 Result 类型别名
pub type Result<T> = std::result::Result<T, EchoError>;
