//! sdk-helpers - OpenAI SDK 便捷层
//!
//! 模块划分：
//! - **config**: OpenAI 连接配置（显式参数 > 环境变量 > TOML 文件）
//! - **core**: 统一错误类型、重试退避、同步/异步桥接、并发调度、资源清理
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock / 重试装饰）
//! - **observability**: 全局日志配置与具名 Logger
//! - **plan**: 计划与任务，按角色派发给处理器执行
//! - **prompt**: Prompt 模板编译与 LRU 缓存渲染
//! - **response**: 响应配置、注册表、执行器与多轮会话
//! - **tools**: 工具参数解析、Tool trait 与注册表

pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod plan;
pub mod prompt;
pub mod response;
pub mod tools;

pub use crate::config::{OpenAiSettings, DEFAULT_MODEL};
pub use crate::core::{run_sync, ErrorKind, RetryPolicy, SdkError};
pub use llm::{LlmClient, OpenAiClient};
pub use plan::{execute_plan, execute_task, FailurePolicy, HandlerRegistry, Plan, Task};
pub use prompt::PromptRenderer;
pub use response::{ResponseConfiguration, ResponseRegistry, ResponseRunner, ResponseSession};
pub use tools::{parse_tool_arguments, ToolRegistry};
