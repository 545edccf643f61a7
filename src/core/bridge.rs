//! 异步 → 同步桥接
//!
//! 在同步调用点拿到 Future 的结果：
//! - 当前线程没有 tokio 运行时：本地建一个 current-thread 运行时直接 block_on；
//! - 已处于运行时内：换到独立线程（自带运行时）执行，按可选超时 join，避免阻塞外层运行时死锁。
//!
//! 内层错误原样返回；超时与运行时构建失败通过 `E: From<SdkError>` 以 AsyncExecution 报告。
//! 超时后工作线程被放弃（尽力而为），不保证立即释放其资源。

use std::future::Future;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};

use crate::core::SdkError;

const BRIDGE_THREAD_NAME: &str = "sdk-helpers-bridge";

/// 同步执行 future：自动判断是否已处于运行时内
pub fn run_sync<F, T, E>(future: F, timeout: Option<Duration>) -> Result<T, E>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<SdkError> + Send + 'static,
{
    if Handle::try_current().is_ok() {
        tracing::debug!("active runtime detected, running future on a bridge thread");
        return run_in_thread(future, timeout);
    }

    let runtime = build_runtime().map_err(E::from)?;
    runtime.block_on(with_timeout(future, timeout))
}

/// 始终在独立线程（自带 current-thread 运行时）中执行 future
pub fn run_in_thread<F, T, E>(future: F, timeout: Option<Duration>) -> Result<T, E>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<SdkError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();

    std::thread::Builder::new()
        .name(BRIDGE_THREAD_NAME.to_string())
        .spawn(move || {
            let outcome = match build_runtime() {
                Ok(runtime) => runtime.block_on(future),
                Err(err) => Err(E::from(err)),
            };
            // 调用方可能已超时离开，发送失败即丢弃结果
            let _ = tx.send(outcome);
        })
        .map_err(|err| {
            E::from(SdkError::async_execution("failed to spawn bridge thread").with_source(err))
        })?;

    let received = match timeout {
        Some(limit) => rx.recv_timeout(limit).map_err(|err| match err {
            RecvTimeoutError::Timeout => timed_out(limit),
            RecvTimeoutError::Disconnected => worker_lost(),
        }),
        None => rx.recv().map_err(|_| worker_lost()),
    };

    received.map_err(E::from)?
}

async fn with_timeout<F, T, E>(future: F, timeout: Option<Duration>) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<SdkError>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, future).await {
            Ok(result) => result,
            Err(_) => Err(E::from(timed_out(limit))),
        },
        None => future.await,
    }
}

fn build_runtime() -> Result<Runtime, SdkError> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| SdkError::async_execution("failed to build tokio runtime").with_source(err))
}

fn timed_out(limit: Duration) -> SdkError {
    SdkError::async_execution(format!(
        "coroutine execution timed out after {:.3}s",
        limit.as_secs_f64()
    ))
    .with_context("timeout_ms", limit.as_millis() as u64)
}

fn worker_lost() -> SdkError {
    SdkError::async_execution("bridge thread terminated before producing a result")
}
