//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找。
//! dispatch 负责一次完整的工具调用：解析参数 → 执行 → 序列化结果，并输出结构化审计日志（JSON）。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{ErrorKind, SdkError};
use crate::tools::arguments::payload_preview;
use crate::tools::{parse_tool_arguments, serialize_tool_result};

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（对应 tool call 中的 name 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema
    /// 默认返回空对象，表示无参数或参数格式不限
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具；参数校验失败返回 InputValidation，执行失败返回 ToolExecution
    async fn execute(&self, args: Value) -> Result<Value, SdkError>;
}

/// 模型发起的一次工具调用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    /// 原始参数文本（期望为 JSON）
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// 工具调用结果：content 为序列化后的 JSON 文本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub call_id: String,
    pub name: String,
    pub content: String,
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；同名工具被替换
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Arc::new(tool)).is_some() {
            tracing::warn!(tool = %name, "tool re-registered, previous handler replaced");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// 已注册工具名（按字母序）
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// 工具定义 JSON（name / description / parameters），与注册内容一致
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .tool_names()
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }

    /// 执行一次工具调用；未知工具与执行失败均为 ToolExecution，参数错误保持 InputValidation
    pub async fn dispatch(&self, call: &ToolCall) -> Result<ToolOutput, SdkError> {
        let start = Instant::now();
        let result = self.dispatch_inner(call).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) if e.is(ErrorKind::InputValidation) => "invalid_arguments",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": call.name,
            "call_id": call.call_id,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": payload_preview(&call.arguments),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        result
    }

    async fn dispatch_inner(&self, call: &ToolCall) -> Result<ToolOutput, SdkError> {
        let tool = self.get(&call.name).ok_or_else(|| {
            SdkError::tool_execution(format!("Unknown tool: {}", call.name))
                .with_context("tool_name", call.name.clone())
                .with_context("available", self.tool_names())
        })?;

        let args = parse_tool_arguments(&call.arguments, Some(&call.name))?;
        let value = tool.execute(args).await.map_err(|e| match e.kind() {
            ErrorKind::InputValidation | ErrorKind::ToolExecution => {
                e.with_context("call_id", call.call_id.clone())
            }
            _ => SdkError::tool_execution(format!("Tool '{}' failed", call.name))
                .with_context("tool_name", call.name.clone())
                .with_context("call_id", call.call_id.clone())
                .with_source(e),
        })?;

        Ok(ToolOutput {
            call_id: call.call_id.clone(),
            name: call.name.clone(),
            content: serialize_tool_result(&value)?,
        })
    }
}
