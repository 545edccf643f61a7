//! 多轮响应会话
//!
//! ResponseSession 在一份配置上保留完整对话历史（system / user / assistant / tool），
//! 每次 send 都带着全部历史调用模型。历史可保存为 JSON；close 时先保存再执行注册的清理动作，
//! 任何失败汇总为 ResourceCleanup。会话未 close 就被丢弃时，清理动作仍会执行（失败只记日志）。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{CleanupGuard, SdkError};
use crate::llm::Message;
use crate::response::{ResponseConfiguration, ResponseOutput, ResponseRunner};

/// 历史条目角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryRole {
    System,
    User,
    Assistant,
    Tool,
}

/// 一条对话历史
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: EntryRole,
    pub content: String,
    /// 仅 tool 条目：产生该结果的工具名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// 毫秒时间戳
    pub timestamp: i64,
}

impl HistoryEntry {
    fn new(role: EntryRole, content: impl Into<String>, tool_name: Option<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_name,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(EntryRole::System, content, None)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(EntryRole::User, content, None)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(EntryRole::Assistant, content, None)
    }

    pub fn tool(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(EntryRole::Tool, content, Some(name.into()))
    }

    /// 转为发给模型的消息；工具结果以 user 消息回填
    pub fn to_message(&self) -> Message {
        match self.role {
            EntryRole::System => Message::system(self.content.clone()),
            EntryRole::User => Message::user(self.content.clone()),
            EntryRole::Assistant => Message::assistant(self.content.clone()),
            EntryRole::Tool => Message::user(format!(
                "Tool result ({}): {}",
                self.tool_name.as_deref().unwrap_or("unknown"),
                self.content
            )),
        }
    }
}

/// 保存到磁盘的会话内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub response: String,
    pub messages: Vec<HistoryEntry>,
}

impl SessionRecord {
    /// 读取 save 写出的 JSON 文件
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SdkError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            SdkError::configuration(format!("Cannot read session file: {}", path.display()))
                .with_source(e)
        })?;
        serde_json::from_str(&text).map_err(|e| {
            SdkError::input_validation(format!("Invalid session file: {}", path.display()))
                .with_source(e)
        })
    }

    fn write(&self, path: &Path) -> Result<(), SdkError> {
        let io_error = |e: std::io::Error| {
            SdkError::configuration(format!("Cannot write session file: {}", path.display()))
                .with_context("path", path.display().to_string())
                .with_source(e)
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            SdkError::input_validation("Session history is not serializable").with_source(e)
        })?;
        fs::write(path, json).map_err(io_error)
    }
}

/// 多轮响应会话
pub struct ResponseSession {
    id: String,
    runner: ResponseRunner,
    config: Arc<ResponseConfiguration>,
    history: Vec<HistoryEntry>,
    save_path: Option<PathBuf>,
    cleanup: CleanupGuard,
}

impl ResponseSession {
    /// 创建会话；system prompt 在此时组装一次，未注册的工具即刻报 Configuration
    pub fn new(
        runner: ResponseRunner,
        config: Arc<ResponseConfiguration>,
    ) -> Result<Self, SdkError> {
        let system = runner.system_prompt(&config)?;
        let id = uuid::Uuid::new_v4().to_string();
        tracing::debug!(session = %id, response = config.name(), "session opened");
        Ok(Self {
            id,
            runner,
            config,
            history: vec![HistoryEntry::system(system)],
            save_path: None,
            cleanup: CleanupGuard::new(),
        })
    }

    /// 默认保存位置：以 `.json` 结尾视为文件，否则视为目录（文件名为 `<id>.json`）
    pub fn with_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_path = Some(path.into());
        self
    }

    /// 注册 close 时执行的清理动作（逆序执行）
    pub fn on_close<F>(&mut self, name: impl Into<String>, action: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.cleanup.defer(name, action);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &ResponseConfiguration {
        &self.config
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// 追加一条用户输入并继续对话
    pub async fn send(&mut self, input: &str) -> Result<ResponseOutput, SdkError> {
        self.history.push(HistoryEntry::user(input));
        self.runner.converse(&self.config, &mut self.history).await
    }

    pub fn last_user_message(&self) -> Option<&HistoryEntry> {
        self.last_of(EntryRole::User)
    }

    pub fn last_assistant_message(&self) -> Option<&HistoryEntry> {
        self.last_of(EntryRole::Assistant)
    }

    pub fn last_tool_message(&self) -> Option<&HistoryEntry> {
        self.last_of(EntryRole::Tool)
    }

    fn last_of(&self, role: EntryRole) -> Option<&HistoryEntry> {
        self.history.iter().rev().find(|entry| entry.role == role)
    }

    pub fn record(&self) -> SessionRecord {
        SessionRecord {
            id: self.id.clone(),
            response: self.config.name().to_string(),
            messages: self.history.clone(),
        }
    }

    /// 保存历史；path 为 None 时使用 with_save_path 的位置，两者都没有则跳过并返回 None
    pub fn save(&self, path: Option<&Path>) -> Result<Option<PathBuf>, SdkError> {
        let target = match path {
            Some(path) => path.to_path_buf(),
            None => match self.default_target() {
                Some(target) => target,
                None => {
                    tracing::debug!(session = %self.id, "no save path configured, skipping save");
                    return Ok(None);
                }
            },
        };
        self.record().write(&target)?;
        tracing::info!(session = %self.id, path = %target.display(), "session saved");
        Ok(Some(target))
    }

    fn default_target(&self) -> Option<PathBuf> {
        let base = self.save_path.as_ref()?;
        if base.extension().is_some_and(|ext| ext == "json") {
            Some(base.clone())
        } else {
            Some(base.join(format!("{}.json", self.id)))
        }
    }

    /// 关闭会话：保存历史（若配置了保存位置），再执行全部清理动作
    ///
    /// 保存失败不会跳过清理动作；所有失败合并为一个 ResourceCleanup。
    pub fn close(self) -> Result<(), SdkError> {
        let target = self.default_target();
        let record = self.record();
        let Self { id, mut cleanup, .. } = self;

        tracing::info!(session = %id, messages = record.messages.len(), "closing session");
        if let Some(target) = target {
            // 最后注册，最先执行
            cleanup.defer("save", move || {
                record.write(&target).map_err(anyhow::Error::from)
            });
        }
        cleanup.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::llm::MockLlmClient;
    use crate::tools::{FnTool, ToolRegistry};
    use schemars::JsonSchema;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Deserialize, JsonSchema)]
    struct CityArgs {
        city: String,
    }

    fn session(mock: MockLlmClient) -> (ResponseSession, Arc<MockLlmClient>) {
        let mut tools = ToolRegistry::new();
        tools.register(FnTool::new(
            "weather",
            "Current weather for a city.",
            |args: CityArgs| async move { Ok::<_, anyhow::Error>(format!("sunny in {}", args.city)) },
        ));
        let mock = Arc::new(mock);
        let runner = ResponseRunner::new(mock.clone()).with_tools(Arc::new(tools));
        let config = ResponseConfiguration::new("assistant", "Be brief.")
            .unwrap()
            .with_tools(["weather"]);
        (ResponseSession::new(runner, Arc::new(config)).unwrap(), mock)
    }

    #[tokio::test]
    async fn test_history_carries_across_turns() {
        let (mut session, mock) = session(
            MockLlmClient::new()
                .with_reply("first answer")
                .with_reply("second answer"),
        );
        session.send("one").await.unwrap();
        session.send("two").await.unwrap();

        let roles: Vec<EntryRole> = session.history().iter().map(|e| e.role).collect();
        assert_eq!(
            roles,
            vec![
                EntryRole::System,
                EntryRole::User,
                EntryRole::Assistant,
                EntryRole::User,
                EntryRole::Assistant
            ]
        );
        // 第二次调用带着第一轮的问答
        let request = mock.last_request().unwrap();
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[2].content, "first answer");
        assert_eq!(session.last_user_message().unwrap().content, "two");
        assert_eq!(session.last_assistant_message().unwrap().content, "second answer");
        assert!(session.last_tool_message().is_none());
    }

    #[tokio::test]
    async fn test_tool_results_are_recorded() {
        let (mut session, _) = session(
            MockLlmClient::new()
                .with_reply(r#"{"tool": "weather", "args": {"city": "Oslo"}}"#)
                .with_reply("It is sunny."),
        );
        let out = session.send("weather in Oslo?").await.unwrap();
        assert_eq!(out.tools_used, vec!["weather"]);

        let tool = session.last_tool_message().unwrap();
        assert_eq!(tool.tool_name.as_deref(), Some("weather"));
        assert_eq!(tool.content, "\"sunny in Oslo\"");
        assert_eq!(
            tool.to_message().content,
            "Tool result (weather): \"sunny in Oslo\""
        );
        assert_eq!(session.last_assistant_message().unwrap().content, "It is sunny.");
    }

    #[tokio::test]
    async fn test_save_writes_json_history() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, _) = session(MockLlmClient::new().with_reply("hi there"));
        let session_dir = dir.path().join("sessions");
        session = session.with_save_path(&session_dir);
        session.send("hello").await.unwrap();

        let path = session.save(None).unwrap().unwrap();
        assert_eq!(path, session_dir.join(format!("{}.json", session.id())));

        let record = SessionRecord::load(&path).unwrap();
        assert_eq!(record, session.record());
        assert_eq!(record.response, "assistant");
        assert_eq!(record.messages.len(), 3);
    }

    #[test]
    fn test_save_without_path_is_skipped() {
        let (session, _) = session(MockLlmClient::new());
        assert_eq!(session.save(None).unwrap(), None);
    }

    #[test]
    fn test_close_saves_then_runs_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("chat.json");
        let (mut session, _) = session(MockLlmClient::new());
        session = session.with_save_path(&file);

        let released = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&released);
        let saved_first = file.clone();
        session.on_close("release", move || {
            // 保存先于其他清理动作
            anyhow::ensure!(saved_first.exists(), "history not saved yet");
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });

        session.close().unwrap();
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(SessionRecord::load(&file).unwrap().messages.len(), 1);
    }

    #[test]
    fn test_close_reports_cleanup_failures() {
        let (mut session, _) = session(MockLlmClient::new());
        session.on_close("vector_store", || Err(anyhow::anyhow!("delete refused")));

        let err = session.close().unwrap_err();
        assert!(err.is(ErrorKind::ResourceCleanup));
        assert_eq!(
            err.context().get("failed"),
            Some(&serde_json::json!(["vector_store"]))
        );
    }

    #[test]
    fn test_unknown_tool_fails_at_open() {
        let runner = ResponseRunner::new(Arc::new(MockLlmClient::new()));
        let config = ResponseConfiguration::new("x", "y").unwrap().with_tools(["nope"]);
        let err = ResponseSession::new(runner, Arc::new(config)).err().unwrap();
        assert!(err.is(ErrorKind::Configuration));
    }
}
