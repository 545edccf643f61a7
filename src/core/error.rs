//! 统一错误类型
//!
//! 所有组件通过 SdkError 报告失败：ErrorKind 区分类别，ErrorContext 附带有序诊断键值，
//! source 保留被转换的底层错误（错误链）。Display 输出自包含：`<Kind>: <message> (k=v, ...)`。

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// 可作为错误链 source 的装箱错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 本 crate 的 Result 别名
pub type Result<T, E = SdkError> = std::result::Result<T, E>;

/// 错误类别（所有类别共享同一个根类型 SdkError）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 配置缺失或非法
    Configuration,
    /// Prompt 模板无法解析
    PromptNotFound,
    /// 任务 / Agent 调用失败
    AgentExecution,
    /// 外部向量存储失败
    VectorStorage,
    /// 工具调用失败
    ToolExecution,
    /// 模型响应生成失败
    ResponseGeneration,
    /// 输入载荷与预期结构不符
    InputValidation,
    /// 异步桥接超时或嵌套运行时失败
    AsyncExecution,
    /// 资源清理失败
    ResourceCleanup,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::PromptNotFound => "PromptNotFoundError",
            ErrorKind::AgentExecution => "AgentExecutionError",
            ErrorKind::VectorStorage => "VectorStorageError",
            ErrorKind::ToolExecution => "ToolExecutionError",
            ErrorKind::ResponseGeneration => "ResponseGenerationError",
            ErrorKind::InputValidation => "InputValidationError",
            ErrorKind::AsyncExecution => "AsyncExecutionError",
            ErrorKind::ResourceCleanup => "ResourceCleanupError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 有序诊断上下文：按插入顺序保存键值；重复键覆盖原值但保留原位置
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    entries: Vec<(String, Value)>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 为空时不输出任何内容，否则输出 ` (k=v, k2=v2)`
impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return Ok(());
        }
        f.write_str(" (")?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match value {
                Value::String(s) => write!(f, "{key}={s}")?,
                other => write!(f, "{key}={other}")?,
            }
        }
        f.write_str(")")
    }
}

/// 根错误类型：kind + message + context + 可选 source
///
/// 通过构造函数创建、builder 方法补充上下文；创建完成后不再修改。
#[derive(Error, Debug)]
#[error("{kind}: {message}{context}")]
pub struct SdkError {
    kind: ErrorKind,
    message: String,
    context: ErrorContext,
    #[source]
    source: Option<BoxError>,
}

impl SdkError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: ErrorContext::new(),
            source: None,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn prompt_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PromptNotFound, message)
    }

    pub fn agent_execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AgentExecution, message)
    }

    pub fn vector_storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::VectorStorage, message)
    }

    pub fn tool_execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ToolExecution, message)
    }

    pub fn response_generation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResponseGeneration, message)
    }

    pub fn input_validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InputValidation, message)
    }

    pub fn async_execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AsyncExecution, message)
    }

    pub fn resource_cleanup(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceCleanup, message)
    }

    /// 追加一条诊断上下文
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key, value);
        self
    }

    /// 挂上被转换的原始错误
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &ErrorContext {
        &self.context
    }
}
