//! 核心层：错误类型、重试退避、异步桥接、任务调度、资源清理

pub mod bridge;
pub mod cleanup;
pub mod error;
pub mod retry;
pub mod task_scheduler;

pub use bridge::{run_in_thread, run_sync};
pub use cleanup::CleanupGuard;
pub use error::{BoxError, ErrorContext, ErrorKind, Result, SdkError};
pub use retry::{Classify, FailureClass, RetryPolicy, FAILURE_CLASS_KEY};
pub use task_scheduler::TaskScheduler;
