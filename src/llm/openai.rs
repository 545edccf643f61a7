//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点；SDK 错误转为 SdkError(ResponseGeneration)，
//! 并在上下文中标注 failure_class，供 RetryPolicy 判断是否可重试。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::config::OpenAiSettings;
use crate::core::{Classify, SdkError, FAILURE_CLASS_KEY};
use crate::llm::{CompletionRequest, LlmClient, Message, Role};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client 与默认模型名
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    default_model: String,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(client: Client<OpenAIConfig>, default_model: impl Into<String>) -> Self {
        Self {
            client,
            default_model: default_model.into(),
            usage: TokenUsage::new(),
        }
    }

    /// 由已校验的配置创建（含 HTTP 超时）
    pub fn from_settings(settings: &OpenAiSettings) -> Result<Self, SdkError> {
        Ok(Self::new(settings.create_client()?, settings.default_model.clone()))
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn to_openai_messages(
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, SdkError> {
        messages
            .iter()
            .map(|m| {
                let built = match m.role {
                    Role::System => ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::System),
                    Role::User => ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::User),
                    Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::Assistant),
                };
                built.map_err(|e| {
                    SdkError::input_validation("failed to build chat message").with_source(e)
                })
            })
            .collect()
    }
}

/// SDK 错误 → SdkError，保留失败类别与原始错误
pub fn map_openai_error(err: OpenAIError) -> SdkError {
    let mut mapped = SdkError::response_generation(format!("OpenAI request failed: {err}"));
    if let Some(class) = err.failure_class() {
        mapped = mapped.with_context(FAILURE_CLASS_KEY, class.as_str());
    }
    mapped.with_source(err)
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, SdkError> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let api_request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(Self::to_openai_messages(&request.messages)?)
            .build()
            .map_err(map_openai_error)?;

        let response = self
            .client
            .chat()
            .create(api_request)
            .await
            .map_err(|e| map_openai_error(e).with_context("model", model))?;

        if let Some(usage) = &response.usage {
            self.usage.add(
                usage.prompt_tokens as u64,
                usage.completion_tokens as u64,
            );
        }

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(content)
    }
}
