//! 任务处理器：按角色注册的执行能力

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::SdkError;
use crate::plan::TaskRequest;

/// 任务处理器；任意 `Fn(TaskRequest) -> Future<Output = anyhow::Result<Vec<String>>>` 闭包均可
#[async_trait]
pub trait AgentHandler: Send + Sync {
    async fn handle(&self, request: TaskRequest) -> anyhow::Result<Vec<String>>;
}

#[async_trait]
impl<F, Fut> AgentHandler for F
where
    F: Fn(TaskRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<String>>> + Send + 'static,
{
    async fn handle(&self, request: TaskRequest) -> anyhow::Result<Vec<String>> {
        (self)(request).await
    }
}

/// 角色 → 处理器
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn AgentHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册处理器；同名角色被替换
    pub fn register(&mut self, role: impl Into<String>, handler: impl AgentHandler + 'static) {
        self.handlers.insert(role.into(), Arc::new(handler));
    }

    pub fn with(mut self, role: impl Into<String>, handler: impl AgentHandler + 'static) -> Self {
        self.register(role, handler);
        self
    }

    pub fn get(&self, role: &str) -> Option<Arc<dyn AgentHandler>> {
        self.handlers.get(role).cloned()
    }

    /// 已注册角色（按字母序）
    pub fn roles(&self) -> Vec<String> {
        let mut roles: Vec<String> = self.handlers.keys().cloned().collect();
        roles.sort();
        roles
    }

    /// 查找处理器；未注册返回 Configuration，上下文附带可用角色
    pub fn resolve(&self, role: &str) -> Result<Arc<dyn AgentHandler>, SdkError> {
        self.get(role).ok_or_else(|| {
            SdkError::configuration(format!("No handler registered for role '{role}'"))
                .with_context("role", role)
                .with_context("available", self.roles())
        })
    }
}
