//! 资源清理守卫
//!
//! CleanupGuard 收集清理动作，按注册的逆序执行。显式 close 汇总失败为 ResourceCleanup；
//! 未 close 就被丢弃时在 Drop 中执行剩余动作，失败只记 warn 日志，不 panic。

use crate::core::SdkError;

type CleanupFn = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// 清理守卫
#[derive(Default)]
pub struct CleanupGuard {
    actions: Vec<(String, CleanupFn)>,
}

impl CleanupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个清理动作；name 出现在日志与错误上下文中
    pub fn defer<F>(&mut self, name: impl Into<String>, action: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.actions.push((name.into(), Box::new(action)));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// 执行全部清理动作；单个失败不影响其余动作
    ///
    /// 有失败时返回 ResourceCleanup，context 中 `failed` 按执行顺序列出失败动作名，
    /// source 为第一个失败的原始错误。
    pub fn close(mut self) -> Result<(), SdkError> {
        let mut failures = self.run_all().into_iter();
        let Some((first_name, first_err)) = failures.next() else {
            return Ok(());
        };
        let mut names = vec![first_name];
        names.extend(failures.map(|(name, _)| name));
        Err(SdkError::resource_cleanup(format!(
            "{} cleanup action(s) failed: {first_err}",
            names.len()
        ))
        .with_context("failed", names)
        .with_source(first_err))
    }

    fn run_all(&mut self) -> Vec<(String, anyhow::Error)> {
        let mut failures = Vec::new();
        while let Some((name, action)) = self.actions.pop() {
            match action() {
                Ok(()) => tracing::debug!(resource = %name, "cleanup done"),
                Err(err) => {
                    tracing::warn!(resource = %name, error = %err, "cleanup failed");
                    failures.push((name, err));
                }
            }
        }
        failures
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.actions.is_empty() {
            let _ = self.run_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn FnOnce() -> anyhow::Result<()> + Send>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |name: &str| {
            let sink = Arc::clone(&sink);
            let name = name.to_string();
            Box::new(move || {
                sink.lock().unwrap().push(name);
                Ok(())
            }) as Box<dyn FnOnce() -> anyhow::Result<()> + Send>
        };
        (log, make)
    }

    #[test]
    fn test_close_runs_in_reverse_order() {
        let (log, make) = recorder();
        let mut guard = CleanupGuard::new();
        guard.defer("first", make("first"));
        guard.defer("second", make("second"));
        guard.close().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["second", "first"]);
    }

    #[test]
    fn test_failure_does_not_skip_remaining_actions() {
        let (log, make) = recorder();
        let mut guard = CleanupGuard::new();
        guard.defer("store", make("store"));
        guard.defer("socket", || Err(anyhow::anyhow!("connection reset")));

        let err = guard.close().unwrap_err();
        assert!(err.is(ErrorKind::ResourceCleanup));
        assert_eq!(err.context().get("failed"), Some(&serde_json::json!(["socket"])));
        let source = std::error::Error::source(&err).unwrap().to_string();
        assert!(source.contains("connection reset"));
        assert_eq!(*log.lock().unwrap(), vec!["store"]);
    }

    #[test]
    fn test_drop_runs_pending_actions() {
        let (log, make) = recorder();
        {
            let mut guard = CleanupGuard::new();
            guard.defer("temp", make("temp"));
            guard.defer("broken", || Err(anyhow::anyhow!("ignored on drop")));
        }
        assert_eq!(*log.lock().unwrap(), vec!["temp"]);
    }

    #[test]
    fn test_empty_guard_closes_cleanly() {
        let guard = CleanupGuard::new();
        assert!(guard.is_empty());
        assert!(guard.close().is_ok());
    }
}
