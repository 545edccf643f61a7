//! 工具参数 JSON Schema 生成（schemars）
//!
//! 由参数结构体派生 JsonSchema，生成的 schema 随工具定义一并提供给模型，减少参数格式错误。

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// 返回类型 T 的参数 schema（JSON 值）
pub fn parameters_schema<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    serde_json::to_value(&schema).unwrap_or_else(|_| {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    })
}
