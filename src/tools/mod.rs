//! 工具：参数解析、Tool trait 与注册表、闭包工具、参数 schema

pub mod arguments;
pub mod function;
pub mod registry;
pub mod schema;

pub use arguments::{
    parse_tool_arguments, parse_tool_arguments_as, serialize_tool_result, validate_arguments,
    MAX_PAYLOAD_PREVIEW,
};
pub use function::FnTool;
pub use registry::{Tool, ToolCall, ToolOutput, ToolRegistry};
pub use schema::parameters_schema;
