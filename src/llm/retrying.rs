//! 重试装饰器：为任意 LlmClient 套上 RetryPolicy，对外签名不变

use async_trait::async_trait;

use crate::core::{RetryPolicy, SdkError};
use crate::llm::{CompletionRequest, LlmClient};

/// 带重试的客户端包装
pub struct RetryingLlmClient<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: LlmClient> RetryingLlmClient<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: LlmClient> LlmClient for RetryingLlmClient<C> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, SdkError> {
        self.policy.run(|| self.inner.complete(request)).await
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::{ErrorKind, FailureClass, FAILURE_CLASS_KEY};
    use crate::llm::{Message, MockLlmClient};

    fn policy() -> RetryPolicy {
        RetryPolicy::new(2)
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(2))
    }

    fn server_error() -> SdkError {
        SdkError::response_generation("upstream 503")
            .with_context(FAILURE_CLASS_KEY, FailureClass::ServerError.as_str())
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let mock = MockLlmClient::new()
            .with_error(server_error())
            .with_error(server_error())
            .with_reply("finally");
        let client = RetryingLlmClient::new(mock, policy());

        let request = CompletionRequest::new(vec![Message::user("hi")]);
        let reply = client.complete(&request).await.unwrap();
        assert_eq!(reply, "finally");
        assert_eq!(client.inner().calls(), 3);
    }

    #[tokio::test]
    async fn test_non_transient_error_is_returned_immediately() {
        let mock = MockLlmClient::new()
            .with_error(SdkError::input_validation("bad prompt"))
            .with_reply("never");
        let client = RetryingLlmClient::new(mock, policy());

        let request = CompletionRequest::new(vec![Message::user("hi")]);
        let err = client.complete(&request).await.unwrap_err();
        assert!(err.is(ErrorKind::InputValidation));
        assert_eq!(client.inner().calls(), 1);
    }
}
