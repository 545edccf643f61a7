//! 响应配置注册表
//!
//! 按名称注册，保持注册顺序；进程级默认实例惰性创建，测试通过 reset_default_registry 清空。

use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::SdkError;
use crate::response::ResponseConfiguration;

/// 配置注册表
#[derive(Debug, Default)]
pub struct ResponseRegistry {
    configs: RwLock<Vec<Arc<ResponseConfiguration>>>,
}

impl ResponseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<ResponseConfiguration>>> {
        self.configs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<ResponseConfiguration>>> {
        self.configs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 注册配置；重名返回 Configuration
    pub fn register(&self, config: ResponseConfiguration) -> Result<(), SdkError> {
        let mut configs = self.write();
        if configs.iter().any(|c| c.name() == config.name()) {
            return Err(SdkError::configuration(format!(
                "Configuration '{}' is already registered",
                config.name()
            ))
            .with_context("name", config.name()));
        }
        tracing::debug!(name = config.name(), "response configuration registered");
        configs.push(Arc::new(config));
        Ok(())
    }

    /// 按名称查找；不存在时返回 Configuration，上下文附带可用名称
    pub fn get(&self, name: &str) -> Result<Arc<ResponseConfiguration>, SdkError> {
        let configs = self.read();
        configs
            .iter()
            .find(|c| c.name() == name)
            .cloned()
            .ok_or_else(|| {
                let available: Vec<String> =
                    configs.iter().map(|c| c.name().to_string()).collect();
                SdkError::configuration(format!("No configuration named '{name}' found"))
                    .with_context("name", name)
                    .with_context("available", available)
            })
    }

    /// 已注册名称（注册顺序）
    pub fn list_names(&self) -> Vec<String> {
        self.read().iter().map(|c| c.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }
}

static DEFAULT_REGISTRY: OnceLock<ResponseRegistry> = OnceLock::new();

/// 进程级默认注册表
pub fn default_registry() -> &'static ResponseRegistry {
    DEFAULT_REGISTRY.get_or_init(ResponseRegistry::new)
}

/// 清空默认注册表（测试用）
#[doc(hidden)]
pub fn reset_default_registry() {
    default_registry().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;

    fn config(name: &str) -> ResponseConfiguration {
        ResponseConfiguration::new(name, "instructions").unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let registry = ResponseRegistry::new();
        registry.register(config("alpha")).unwrap();
        assert_eq!(registry.get("alpha").unwrap().name(), "alpha");
    }

    #[test]
    fn test_duplicate_name() {
        let registry = ResponseRegistry::new();
        registry.register(config("alpha")).unwrap();
        let err = registry.register(config("alpha")).unwrap_err();
        assert!(err.is(ErrorKind::Configuration));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_name_lists_available() {
        let registry = ResponseRegistry::new();
        registry.register(config("zeta")).unwrap();
        registry.register(config("alpha")).unwrap();
        let err = registry.get("beta").unwrap_err();
        assert!(err.is(ErrorKind::Configuration));
        assert_eq!(
            err.context().get("available"),
            Some(&serde_json::json!(["zeta", "alpha"]))
        );
    }

    #[test]
    fn test_list_names_keeps_registration_order() {
        let registry = ResponseRegistry::new();
        for name in ["c", "a", "b"] {
            registry.register(config(name)).unwrap();
        }
        assert_eq!(registry.list_names(), vec!["c", "a", "b"]);
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_default_registry_is_shared_and_resettable() {
        reset_default_registry();
        default_registry()
            .register(config("registry-unit-test"))
            .unwrap();
        assert!(default_registry()
            .list_names()
            .contains(&"registry-unit-test".to_string()));
        reset_default_registry();
        assert!(default_registry().get("registry-unit-test").is_err());
    }
}
