//! 响应配置：名称、指令（文本或模板文件）、模型、可用工具、结构化输出 schema
//!
//! 构造时校验：名称非空、文本指令非空、模板文件存在。

use std::path::PathBuf;

use schemars::JsonSchema;
use serde_json::Value;

use crate::core::SdkError;
use crate::tools::parameters_schema;

/// 指令来源
#[derive(Debug, Clone, PartialEq)]
pub enum Instructions {
    Text(String),
    /// 模板文件路径，运行时读取
    File(PathBuf),
}

impl From<&str> for Instructions {
    fn from(text: &str) -> Self {
        Instructions::Text(text.to_string())
    }
}

impl From<String> for Instructions {
    fn from(text: String) -> Self {
        Instructions::Text(text)
    }
}

impl From<PathBuf> for Instructions {
    fn from(path: PathBuf) -> Self {
        Instructions::File(path)
    }
}

/// 一个可复用的响应定义
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseConfiguration {
    name: String,
    instructions: Instructions,
    /// 覆盖客户端默认模型
    pub model: Option<String>,
    /// 允许调用的工具名
    pub tools: Vec<String>,
    /// 结构化输出的 JSON Schema；设置后回复按 JSON 解析
    pub output_schema: Option<Value>,
}

impl ResponseConfiguration {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<Instructions>,
    ) -> Result<Self, SdkError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SdkError::input_validation(
                "Configuration name must be a non-empty string",
            ));
        }
        let instructions = instructions.into();
        match &instructions {
            Instructions::Text(text) if text.trim().is_empty() => {
                return Err(SdkError::input_validation(
                    "Configuration instructions must be a non-empty string",
                )
                .with_context("name", name));
            }
            Instructions::File(path) if !path.is_file() => {
                return Err(SdkError::prompt_not_found(format!(
                    "Instruction template not found: {}",
                    path.display()
                ))
                .with_context("name", name)
                .with_context("path", path.display().to_string()));
            }
            _ => {}
        }
        Ok(Self {
            name,
            instructions,
            model: None,
            tools: Vec::new(),
            output_schema: None,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// 以类型 T 的 schema 作为结构化输出约束
    pub fn with_output<T: JsonSchema>(mut self) -> Self {
        self.output_schema = Some(parameters_schema::<T>());
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &Instructions {
        &self.instructions
    }

    /// 解析后的指令文本（模板文件在此读取）
    pub fn instructions_text(&self) -> Result<String, SdkError> {
        match &self.instructions {
            Instructions::Text(text) => Ok(text.clone()),
            Instructions::File(path) => std::fs::read_to_string(path).map_err(|e| {
                SdkError::prompt_not_found(format!(
                    "Unable to read instructions at '{}': {e}",
                    path.display()
                ))
                .with_context("name", self.name.clone())
                .with_source(e)
            }),
        }
    }
}
