//! 任务调度：有界并发许可
//!
//! 批量执行计划任务时用 Semaphore 限制同时运行的任务数。

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::core::SdkError;

/// 默认并发上限
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// 任务调度器：持有共享 Semaphore，acquire 得到的许可在 drop 时归还
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
}

impl TaskScheduler {
    /// max_concurrency 为 0 时按 1 处理
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// 当前空闲许可数
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// 获取执行许可
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, SdkError> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| SdkError::async_execution("task scheduler closed").with_source(err))
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let scheduler = TaskScheduler::new(0);
        assert_eq!(scheduler.max_concurrency(), 1);
        assert_eq!(scheduler.available(), 1);
    }

    #[tokio::test]
    async fn test_permit_is_returned_on_drop() {
        let scheduler = TaskScheduler::new(2);
        let first = scheduler.acquire().await.unwrap();
        let _second = scheduler.acquire().await.unwrap();
        assert_eq!(scheduler.available(), 0);
        drop(first);
        assert_eq!(scheduler.available(), 1);
    }
}
