//! 工具参数解析
//!
//! 模型返回的 arguments 通常是 JSON，但偶尔带有 Python 字面量风格（单引号、True/False/None）。
//! 先按 JSON 解析，失败后规整字面量再解析一次；仍失败则返回 InputValidation，消息中带工具名与截断预览。

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::core::SdkError;

/// 错误信息中 payload 预览的最大字符数
pub const MAX_PAYLOAD_PREVIEW: usize = 200;

/// 解析工具参数为 JSON 值
pub fn parse_tool_arguments(payload: &str, tool_name: Option<&str>) -> Result<Value, SdkError> {
    match serde_json::from_str::<Value>(payload) {
        Ok(value) => Ok(value),
        Err(strict_err) => {
            let relaxed = relax_python_literals(payload);
            serde_json::from_str::<Value>(&relaxed).map_err(|_| {
                let mut err = SdkError::input_validation(format!(
                    "Invalid JSON arguments{}: {}",
                    tool_suffix(tool_name),
                    payload_preview(payload)
                ))
                .with_context("payload_length", payload.chars().count());
                if let Some(name) = tool_name {
                    err = err.with_context("tool_name", name);
                }
                err.with_source(strict_err)
            })
        }
    }
}

/// 解析并反序列化为具体参数类型
pub fn parse_tool_arguments_as<T: DeserializeOwned>(
    payload: &str,
    tool_name: Option<&str>,
) -> Result<T, SdkError> {
    let value = parse_tool_arguments(payload, tool_name)?;
    validate_arguments(value, tool_name)
}

/// 将已解析的 JSON 值校验为具体参数类型
pub fn validate_arguments<T: DeserializeOwned>(
    value: Value,
    tool_name: Option<&str>,
) -> Result<T, SdkError> {
    serde_json::from_value(value).map_err(|e| {
        let mut err = SdkError::input_validation(format!(
            "Invalid arguments{}: {e}",
            tool_suffix(tool_name)
        ));
        if let Some(name) = tool_name {
            err = err.with_context("tool_name", name);
        }
        err.with_source(e)
    })
}

/// 工具结果序列化为 JSON 文本（字符串结果带引号）
pub fn serialize_tool_result<T: Serialize + ?Sized>(result: &T) -> Result<String, SdkError> {
    serde_json::to_string(result).map_err(|e| {
        SdkError::tool_execution(format!("Failed to serialize tool result: {e}")).with_source(e)
    })
}

fn tool_suffix(tool_name: Option<&str>) -> String {
    tool_name
        .map(|name| format!(" for tool '{name}'"))
        .unwrap_or_default()
}

pub(crate) fn payload_preview(payload: &str) -> String {
    if payload.chars().count() > MAX_PAYLOAD_PREVIEW {
        format!(
            "{}...",
            payload.chars().take(MAX_PAYLOAD_PREVIEW).collect::<String>()
        )
    } else {
        payload.to_string()
    }
}

/// 单引号字符串转双引号，字符串外的 True/False/None 转 true/false/null
fn relax_python_literals(payload: &str) -> String {
    let mut out = String::with_capacity(payload.len());
    let mut chars = payload.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                out.push('"');
                while let Some(inner) = chars.next() {
                    match inner {
                        '\\' => match chars.next() {
                            Some('\'') => out.push('\''),
                            Some(escaped) => {
                                out.push('\\');
                                out.push(escaped);
                            }
                            None => out.push('\\'),
                        },
                        q if q == c => break,
                        '"' => out.push_str("\\\""),
                        other => out.push(other),
                    }
                }
                out.push('"');
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    other => other,
                });
            }
            other => out.push(other),
        }
    }
    out
}
