//! 重试与指数退避
//!
//! RetryPolicy 按错误的 FailureClass 决定是否重试：可重试错误等待
//! `min(base_delay * 2^attempt, max_delay)` 后再次调用，其余错误原样返回。
//! 异步版本用 tokio::time::sleep 只挂起当前任务，同步版本用 std::thread::sleep。

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use async_openai::error::OpenAIError;

use crate::core::SdkError;

/// 默认最大重试次数（总调用次数 = max_retries + 1）
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// SdkError 上下文中记录瞬时失败类别的键
pub const FAILURE_CLASS_KEY: &str = "failure_class";

/// 瞬时失败类别（HTTP 408 / 429 / 5xx 一类）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    RateLimited,
    Timeout,
    ServerError,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::RateLimited => "rate_limited",
            FailureClass::Timeout => "timeout",
            FailureClass::ServerError => "server_error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rate_limited" => Some(FailureClass::RateLimited),
            "timeout" => Some(FailureClass::Timeout),
            "server_error" => Some(FailureClass::ServerError),
            _ => None,
        }
    }

    /// 按 HTTP 状态码归类；非瞬时状态返回 None
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            408 => Some(FailureClass::Timeout),
            429 => Some(FailureClass::RateLimited),
            500 | 502 | 503 => Some(FailureClass::ServerError),
            _ => None,
        }
    }
}

/// 错误自报失败类别；None 表示不可重试
pub trait Classify {
    fn failure_class(&self) -> Option<FailureClass>;
}

impl Classify for SdkError {
    fn failure_class(&self) -> Option<FailureClass> {
        self.context()
            .get(FAILURE_CLASS_KEY)
            .and_then(|v| v.as_str())
            .and_then(FailureClass::parse)
    }
}

impl Classify for OpenAIError {
    fn failure_class(&self) -> Option<FailureClass> {
        match self {
            OpenAIError::Reqwest(err) => {
                if err.is_timeout() {
                    Some(FailureClass::Timeout)
                } else {
                    err.status()
                        .and_then(|status| FailureClass::from_status(status.as_u16()))
                }
            }
            OpenAIError::ApiError(api) => {
                let code = api.code.as_deref().unwrap_or_default();
                let kind = api.r#type.as_deref().unwrap_or_default();
                if code.contains("rate_limit") || kind.contains("rate_limit") {
                    Some(FailureClass::RateLimited)
                } else if kind == "server_error" {
                    Some(FailureClass::ServerError)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// 重试策略：次数、基础延迟、延迟上限、可重试的失败类别
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub retry_on: Vec<FailureClass>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            retry_on: vec![
                FailureClass::RateLimited,
                FailureClass::Timeout,
                FailureClass::ServerError,
            ],
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn retry_on(mut self, classes: impl IntoIterator<Item = FailureClass>) -> Self {
        self.retry_on = classes.into_iter().collect();
        self
    }

    /// 错误是否属于可重试类别
    pub fn should_retry<E: Classify>(&self, err: &E) -> bool {
        err.failure_class()
            .map(|class| self.retry_on.contains(&class))
            .unwrap_or(false)
    }

    /// 第 attempt 次失败（从 0 计）后的等待时长
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let nanos = 1u128
            .checked_shl(attempt)
            .and_then(|factor| self.base_delay.as_nanos().checked_mul(factor))
            .and_then(|n| u64::try_from(n).ok());
        match nanos {
            Some(n) if u128::from(n) < self.max_delay.as_nanos() => Duration::from_nanos(n),
            _ => self.max_delay,
        }
    }

    /// 异步执行 op，按策略重试；最终失败返回最后一次的原始错误
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let delay = self.next_delay(attempt, err)?;
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// 同步版本：在当前线程阻塞等待
    pub fn run_blocking<T, E, F>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Classify + Display,
    {
        let mut attempt = 0u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let delay = self.next_delay(attempt, err)?;
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }

    /// 决定是否继续：返回等待时长，或把错误原样交回调用方
    fn next_delay<E: Classify + Display>(&self, attempt: u32, err: E) -> Result<Duration, E> {
        if attempt >= self.max_retries || !self.should_retry(&err) {
            return Err(err);
        }
        let delay = self.delay_for(attempt);
        tracing::warn!(
            attempt = attempt + 1,
            max_attempts = self.max_retries + 1,
            retry_in_ms = delay.as_millis() as u64,
            error = %err,
            "transient failure, retrying"
        );
        Ok(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries)
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(4))
    }

    fn transient() -> SdkError {
        SdkError::response_generation("rate limited")
            .with_context(FAILURE_CLASS_KEY, FailureClass::RateLimited.as_str())
    }

    #[test]
    fn test_delay_grows_then_caps() {
        let policy = RetryPolicy::new(10)
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(10));
        let delays: Vec<u64> = (0..6).map(|a| policy.delay_for(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_delay_does_not_overflow() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(u32::MAX), DEFAULT_MAX_DELAY);
    }

    #[test]
    fn test_cap_below_base_wins() {
        let policy = RetryPolicy::new(3)
            .with_base_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(5));
        assert_eq!(policy.delay_for(0), Duration::from_millis(5));
        assert_eq!(policy.delay_for(3), Duration::from_millis(5));
    }

    #[test]
    fn test_tiny_base_keeps_doubling_past_twenty() {
        let policy = RetryPolicy::new(30)
            .with_base_delay(Duration::from_nanos(1))
            .with_max_delay(Duration::from_secs(60));
        assert_eq!(policy.delay_for(20), Duration::from_nanos(1 << 20));
        assert_eq!(policy.delay_for(25), Duration::from_nanos(1 << 25));
        assert_eq!(policy.delay_for(32), Duration::from_nanos(1 << 32));
        assert_eq!(policy.delay_for(40), Duration::from_secs(60));
    }

    #[test]
    fn test_failure_class_from_status() {
        assert_eq!(FailureClass::from_status(429), Some(FailureClass::RateLimited));
        assert_eq!(FailureClass::from_status(408), Some(FailureClass::Timeout));
        assert_eq!(FailureClass::from_status(503), Some(FailureClass::ServerError));
        assert_eq!(FailureClass::from_status(400), None);
        assert_eq!(FailureClass::from_status(401), None);
    }

    #[tokio::test]
    async fn test_non_retryable_runs_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), SdkError> = fast_policy(3)
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SdkError::input_validation("bad request"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retryable_then_success() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 3 {
                    Err(transient())
                } else {
                    Ok("done")
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_exhausted_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), SdkError> = fast_policy(2)
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(transient().with_context("attempt", n))
            })
            .await;
        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.context().get("attempt"), Some(&serde_json::Value::from(2)));
    }

    #[tokio::test]
    async fn test_class_outside_retry_set_is_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = fast_policy(3).retry_on([FailureClass::ServerError]);
        let result: Result<(), SdkError> = policy
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transient())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_blocking_retry() {
        let mut calls = 0;
        let result = fast_policy(2).run_blocking(|| {
            calls += 1;
            if calls < 3 {
                Err(transient())
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }
}
