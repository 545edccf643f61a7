//! Prompt 模板编译与渲染
//!
//! 语法：`{{ name }}` 占位符，支持点号路径访问嵌套变量（`{{ user.name }}`），花括号内空白忽略。
//! 编译阶段报告语法错误（未闭合、空占位符、非法标识符），渲染阶段报告缺失变量；
//! 两者均为 InputValidation，并在上下文中以 stage 区分。

use serde_json::Value;

use crate::core::SdkError;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder { path: Vec<String>, raw: String },
}

/// 编译后的模板：字面量与占位符片段序列
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTemplate {
    id: String,
    segments: Vec<Segment>,
}

impl CompiledTemplate {
    /// 编译模板文本；id 仅用于错误信息
    pub fn compile(id: &str, text: &str) -> Result<Self, SdkError> {
        let mut segments = Vec::new();
        let mut rest = text;
        let mut offset = 0usize;

        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after_open = &rest[start + OPEN.len()..];
            let Some(end) = after_open.find(CLOSE) else {
                return Err(syntax_error(id, text, offset + start, "unclosed '{{'"));
            };

            let raw = after_open[..end].trim();
            if raw.is_empty() {
                return Err(syntax_error(id, text, offset + start, "empty placeholder"));
            }
            let path: Vec<String> = raw.split('.').map(str::to_string).collect();
            if path.iter().any(|part| !is_identifier(part)) {
                return Err(syntax_error(
                    id,
                    text,
                    offset + start,
                    &format!("invalid variable name '{raw}'"),
                ));
            }
            segments.push(Segment::Placeholder {
                path,
                raw: raw.to_string(),
            });

            let consumed = start + OPEN.len() + end + CLOSE.len();
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            id: id.to_string(),
            segments,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 模板引用的变量（按出现顺序，去重）
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Placeholder { raw, .. } = segment {
                if !names.contains(&raw.as_str()) {
                    names.push(raw);
                }
            }
        }
        names
    }

    /// 用变量映射渲染；variables 为 Null 时视为空映射
    pub fn render(&self, variables: &Value) -> Result<String, SdkError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { path, raw } => {
                    let value = lookup(variables, path).ok_or_else(|| {
                        SdkError::input_validation(format!(
                            "Missing template variable '{raw}' in '{}'",
                            self.id
                        ))
                        .with_context("template", self.id.clone())
                        .with_context("variable", raw.clone())
                        .with_context("stage", "render")
                    })?;
                    push_value(&mut out, value);
                }
            }
        }
        Ok(out)
    }
}

fn is_identifier(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

fn lookup<'a>(variables: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = variables;
    for key in path {
        current = match current {
            Value::Object(map) => map.get(key)?,
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Null => {}
        other => out.push_str(&other.to_string()),
    }
}

fn syntax_error(id: &str, text: &str, byte_offset: usize, reason: &str) -> SdkError {
    let line = text[..byte_offset].matches('\n').count() + 1;
    SdkError::input_validation(format!("Template syntax error in '{id}': {reason}"))
        .with_context("template", id)
        .with_context("line", line)
        .with_context("stage", "compile")
}
