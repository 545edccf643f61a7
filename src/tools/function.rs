//! 由闭包构建的类型化工具
//!
//! FnTool 把 `Fn(Args) -> Future<Output = anyhow::Result<R>>` 包装为 Tool：
//! 参数按 Args 反序列化校验，schema 由 schemars 从 Args 派生，返回值序列化为 JSON。

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::core::SdkError;
use crate::tools::{parameters_schema, validate_arguments, Tool};

/// 闭包工具
pub struct FnTool<A, F> {
    name: String,
    description: String,
    schema: Value,
    handler: F,
    _args: PhantomData<fn(A)>,
}

impl<A, F> FnTool<A, F>
where
    A: JsonSchema,
{
    pub fn new(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: parameters_schema::<A>(),
            handler,
            _args: PhantomData,
        }
    }
}

#[async_trait]
impl<A, R, F, Fut> Tool for FnTool<A, F>
where
    A: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, args: Value) -> Result<Value, SdkError> {
        let typed: A = validate_arguments(args, Some(&self.name))?;
        let result = (self.handler)(typed).await.map_err(|e| {
            SdkError::tool_execution(format!("Tool '{}' failed: {e}", self.name))
                .with_context("tool_name", self.name.clone())
                .with_source(e)
        })?;
        serde_json::to_value(result).map_err(|e| {
            SdkError::tool_execution(format!("Failed to serialize tool result: {e}"))
                .with_context("tool_name", self.name.clone())
                .with_source(e)
        })
    }
}
