//! 响应执行器
//!
//! 将 ResponseConfiguration + 用户输入组装为一次 LLM 调用：system = 指令 + 可用工具 + 输出 schema。
//! 回复若为 `{"tool": "...", "args": {...}}` 且工具在配置允许范围内，则经 ToolRegistry 执行并把结果回填，
//! 直到得到最终回复或达到轮数上限；配置了 output_schema 时最终回复按 JSON 解析。
//! run 每次从空历史开始；需要保留多轮历史时使用 ResponseSession。

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::core::{run_sync, SdkError};
use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::response::{HistoryEntry, ResponseConfiguration, ResponseRegistry};
use crate::tools::{parse_tool_arguments, ToolCall, ToolRegistry};

/// 单次 run 中工具调用轮数上限
pub const MAX_TOOL_ROUNDS: usize = 5;

/// Observation 预览最大字符数（日志用）
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 一次响应的输出
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseOutput {
    /// 最终回复原文
    pub text: String,
    /// 结构化输出（仅当配置了 output_schema）
    pub structured: Option<Value>,
    /// 本次执行过的工具名（按调用顺序）
    pub tools_used: Vec<String>,
}

/// 回复中的工具调用（`{"tool": "...", "args": {...}}`）
#[derive(Debug, Deserialize)]
struct ReplyToolCall {
    tool: String,
    #[serde(default)]
    args: Value,
}

/// 响应执行器：持有 LLM 客户端与（可选）工具注册表
#[derive(Clone)]
pub struct ResponseRunner {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
}

impl ResponseRunner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            tools: Arc::new(ToolRegistry::new()),
        }
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    /// 组装 system prompt；配置引用了未注册的工具时返回 Configuration
    pub fn system_prompt(&self, config: &ResponseConfiguration) -> Result<String, SdkError> {
        let mut system = config.instructions_text()?;

        if !config.tools.is_empty() {
            system.push_str("\n\nAvailable tools:\n");
            for name in &config.tools {
                let tool = self.tools.get(name).ok_or_else(|| {
                    SdkError::configuration(format!(
                        "Response '{}' references unknown tool '{name}'",
                        config.name()
                    ))
                    .with_context("tool_name", name.clone())
                    .with_context("available", self.tools.tool_names())
                })?;
                system.push_str(&format!(
                    "- {}: {} Parameters: {}\n",
                    name,
                    tool.description(),
                    tool.parameters_schema()
                ));
            }
            system.push_str(
                "To call a tool reply with only {\"tool\": \"<name>\", \"args\": {...}}; \
                 otherwise reply with the final answer.",
            );
        }

        if let Some(schema) = &config.output_schema {
            system.push_str("\n\nRespond with JSON matching this schema:\n");
            system.push_str(&schema.to_string());
        }
        Ok(system)
    }

    /// 按名称从注册表取配置后执行
    pub async fn run_registered(
        &self,
        registry: &ResponseRegistry,
        name: &str,
        input: &str,
    ) -> Result<ResponseOutput, SdkError> {
        let config = registry.get(name)?;
        self.run(&config, input).await
    }

    /// 执行一次响应（无状态：每次都是新的对话）
    pub async fn run(
        &self,
        config: &ResponseConfiguration,
        input: &str,
    ) -> Result<ResponseOutput, SdkError> {
        let mut history = vec![
            HistoryEntry::system(self.system_prompt(config)?),
            HistoryEntry::user(input),
        ];
        self.converse(config, &mut history).await
    }

    /// 在给定历史上继续对话：模型回复、工具调用与结果依次追加到 history
    pub(crate) async fn converse(
        &self,
        config: &ResponseConfiguration,
        history: &mut Vec<HistoryEntry>,
    ) -> Result<ResponseOutput, SdkError> {
        let mut tools_used = Vec::new();

        for round in 0..=MAX_TOOL_ROUNDS {
            let messages: Vec<Message> = history.iter().map(HistoryEntry::to_message).collect();
            let mut request = CompletionRequest::new(messages);
            request.model = config.model.clone();

            tracing::debug!(response = config.name(), round, "requesting completion");
            let reply = self.llm.complete(&request).await?;
            let call = self.tool_call_in(config, &reply);
            history.push(HistoryEntry::assistant(reply.clone()));

            let Some(call) = call else {
                let structured = match &config.output_schema {
                    Some(_) => Some(parse_tool_arguments(
                        extract_json_block(&reply),
                        Some(config.name()),
                    )?),
                    None => None,
                };
                tracing::info!(
                    response = config.name(),
                    rounds = round + 1,
                    tools = tools_used.len(),
                    "response completed"
                );
                return Ok(ResponseOutput {
                    text: reply,
                    structured,
                    tools_used,
                });
            };

            if round == MAX_TOOL_ROUNDS {
                break;
            }

            let (tool, observation) = self.observe(config, call).await?;
            tools_used.push(tool.clone());
            history.push(HistoryEntry::tool(tool, observation));
        }

        Err(SdkError::response_generation(format!(
            "Response '{}' exceeded {MAX_TOOL_ROUNDS} tool rounds",
            config.name()
        ))
        .with_context("name", config.name()))
    }

    /// 同步执行（可在运行时内外调用）
    pub fn run_sync(
        &self,
        config: Arc<ResponseConfiguration>,
        input: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<ResponseOutput, SdkError> {
        let runner = self.clone();
        let input = input.into();
        run_sync(async move { runner.run(&config, &input).await }, timeout)
    }

    /// 回复是否为允许范围内的工具调用
    fn tool_call_in(&self, config: &ResponseConfiguration, reply: &str) -> Option<ReplyToolCall> {
        if config.tools.is_empty() {
            return None;
        }
        let call: ReplyToolCall = serde_json::from_str(extract_json_block(reply)).ok()?;
        if call.tool.is_empty() {
            return None;
        }
        Some(call)
    }

    /// 执行工具并返回 (工具名, observation)；工具失败作为 observation 回填给模型
    async fn observe(
        &self,
        config: &ResponseConfiguration,
        call: ReplyToolCall,
    ) -> Result<(String, String), SdkError> {
        if !config.tools.iter().any(|t| t == &call.tool) {
            return Err(SdkError::tool_execution(format!(
                "Tool '{}' is not available to response '{}'",
                call.tool,
                config.name()
            ))
            .with_context("tool_name", call.tool)
            .with_context("available", config.tools.clone()));
        }

        let tool_call = ToolCall::new(
            format!("call_{}", uuid::Uuid::new_v4()),
            call.tool.clone(),
            call.args.to_string(),
        );
        let observation = match self.tools.dispatch(&tool_call).await {
            Ok(output) => output.content,
            Err(e) => format!("Error: {e}"),
        };
        let preview: String = observation.chars().take(OBSERVATION_PREVIEW_CHARS).collect();
        tracing::debug!(tool = %call.tool, observation = %preview, "tool observation");
        Ok((call.tool, observation))
    }
}

/// 提取 JSON 块（```json ... ``` 或首个 `{` 到末个 `}`），找不到时返回原文
fn extract_json_block(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim());
    }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}
