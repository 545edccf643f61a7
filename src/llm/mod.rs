//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock / 重试装饰）

pub mod mock;
pub mod openai;
pub mod retrying;
pub mod traits;

pub use mock::MockLlmClient;
pub use openai::{map_openai_error, OpenAiClient, TokenUsage};
pub use retrying::RetryingLlmClient;
pub use traits::{CompletionRequest, LlmClient, Message, Role};
