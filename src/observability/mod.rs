//! 可观测性：全局日志订阅器与具名 Logger
//!
//! configure 只安装一次 tracing-subscriber；再次调用通过 reload 句柄替换过滤级别，不会叠加输出层。

use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

use crate::core::SdkError;

/// 默认日志级别
pub const DEFAULT_LEVEL: &str = "info";

static FILTER_HANDLE: Mutex<Option<reload::Handle<EnvFilter, Registry>>> = Mutex::new(None);

fn build_filter(level: &str) -> Result<EnvFilter, SdkError> {
    EnvFilter::try_new(level).map_err(|e| {
        SdkError::input_validation(format!("Invalid log level: {level}"))
            .with_context("level", level)
            .with_source(e)
    })
}

/// 安装或更新全局日志配置；level 可为 `info` 或 `sdk_helpers=debug,warn` 等过滤指令
pub fn configure(level: &str) -> Result<(), SdkError> {
    let filter = build_filter(level)?;
    let mut slot = FILTER_HANDLE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(handle) = slot.as_ref() {
        handle.reload(filter).map_err(|e| {
            SdkError::configuration("Failed to update log filter").with_source(e)
        })?;
        tracing::debug!(level, "log filter updated");
        return Ok(());
    }

    let (filter_layer, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer())
        .try_init()
        .map_err(|e| {
            SdkError::configuration("A global tracing subscriber is already installed")
                .with_source(e)
        })?;
    *slot = Some(handle);
    tracing::debug!(level, "logging configured");
    Ok(())
}

/// 按 RUST_LOG 配置，未设置时使用 info
pub fn configure_default() -> Result<(), SdkError> {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LEVEL.to_string());
    configure(&level)
}

/// 具名 Logger：事件附带 logger 字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logger {
    name: String,
}

impl Logger {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!(logger = %self.name, "{message}");
    }

    pub fn info(&self, message: &str) {
        tracing::info!(logger = %self.name, "{message}");
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(logger = %self.name, "{message}");
    }

    pub fn error(&self, message: &str) {
        tracing::error!(logger = %self.name, "{message}");
    }

    /// 以 logger 名称为字段的 span
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!("logger", name = %self.name)
    }
}

pub fn logger(name: &str) -> Logger {
    Logger {
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;

    #[test]
    fn test_configure_is_idempotent() {
        configure("info").unwrap();
        configure("sdk_helpers=debug").unwrap();
        configure_default().unwrap();
        logger("observability-test").info("configured twice without stacking");
    }

    #[test]
    fn test_invalid_level() {
        let err = configure("sdk_helpers=notalevel").unwrap_err();
        assert!(err.is(ErrorKind::InputValidation));
    }

    #[test]
    fn test_logger_name() {
        let log = logger("sdk_helpers.plan");
        assert_eq!(log.name(), "sdk_helpers.plan");
        let _entered = log.span().entered();
        log.debug("inside span");
    }
}
