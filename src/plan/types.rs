//! 计划类型定义
//!
//! 定义计划、任务、任务状态、执行策略与执行报告等核心数据类型

use serde::{Deserialize, Serialize};

use crate::core::SdkError;

pub type TaskId = String;

/// 任务状态：Pending → Running → Succeeded / Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// 等待执行
    Pending,
    /// 正在执行
    Running,
    /// 执行成功
    Succeeded,
    /// 执行失败或被取消
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }

    fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::Succeeded)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}

/// 计划中的单个任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// 任务ID
    pub id: TaskId,
    /// 负责执行的角色（对应 HandlerRegistry 中的 key）
    pub role: String,
    /// 任务指令
    pub prompt: String,
    /// 任务自带的静态上下文
    pub context: Vec<String>,
    /// 当前状态
    status: TaskStatus,
    /// 执行结果
    pub results: Vec<String>,
    /// 失败原因
    pub error: Option<String>,
    /// 开始执行时间（毫秒时间戳）
    pub started_at: Option<i64>,
    /// 结束时间（毫秒时间戳）
    pub finished_at: Option<i64>,
}

impl Task {
    pub fn new(role: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: format!("task_{}", uuid::Uuid::new_v4()),
            role: role.into(),
            prompt: prompt.into(),
            context: Vec::new(),
            status: TaskStatus::Pending,
            results: Vec::new(),
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn with_context(mut self, context: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.context = context.into_iter().map(Into::into).collect();
        self
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// 状态迁移；非法迁移返回 AgentExecution
    pub fn transition(&mut self, next: TaskStatus) -> Result<(), SdkError> {
        if !self.status.can_transition_to(next) {
            return Err(SdkError::agent_execution(format!(
                "Illegal task status transition: {:?} -> {:?}",
                self.status, next
            ))
            .with_context("task_id", self.id.clone()));
        }
        let now = chrono::Utc::now().timestamp_millis();
        match next {
            TaskStatus::Running => self.started_at = Some(now),
            TaskStatus::Succeeded | TaskStatus::Failed => self.finished_at = Some(now),
            TaskStatus::Pending => {}
        }
        self.status = next;
        Ok(())
    }

    /// 取消尚未结束的任务（标记为 Failed）
    pub(crate) fn cancel(&mut self, reason: &str) {
        if !self.status.is_terminal() && self.transition(TaskStatus::Failed).is_ok() {
            self.error = Some(reason.to_string());
        }
    }
}

/// 有序任务序列 + 调用方提供的初始上下文
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub tasks: Vec<Task>,
    /// 初始上下文，传给每个任务
    pub context: Vec<String>,
}

impl Plan {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            context: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn statuses(&self) -> Vec<TaskStatus> {
        self.tasks.iter().map(Task::status).collect()
    }
}

/// 交给 handler 的执行请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_id: TaskId,
    pub role: String,
    pub prompt: String,
    /// 任务静态上下文 + 初始上下文 + 先前成功任务的输出
    pub context: Vec<String>,
}

/// 顺序执行时的失败策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// 首个失败即停止，返回该任务的错误，后续任务保持 Pending
    #[default]
    Halt,
    /// 继续执行剩余任务，失败记录在对应槽位
    Continue,
}

impl FailurePolicy {
    pub fn from_halt_on_error(halt_on_error: bool) -> Self {
        if halt_on_error {
            FailurePolicy::Halt
        } else {
            FailurePolicy::Continue
        }
    }
}

/// 批量（并发）执行时的失败策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BatchPolicy {
    /// 首个失败即取消其余任务
    #[default]
    FailFast,
    /// 隔离失败，收集全部结果
    CollectAll,
}

/// 本次执行采用的调度方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dispatch {
    Sequential(FailurePolicy),
    Batch {
        policy: BatchPolicy,
        max_concurrency: usize,
    },
}

/// 单个任务的执行结果
#[derive(Debug)]
pub enum TaskOutcome {
    Succeeded(Vec<String>),
    Failed(SdkError),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded(_))
    }

    pub fn output(&self) -> Option<&[String]> {
        match self {
            TaskOutcome::Succeeded(out) => Some(out),
            TaskOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&SdkError> {
        match self {
            TaskOutcome::Failed(e) => Some(e),
            TaskOutcome::Succeeded(_) => None,
        }
    }
}

/// 计划执行报告：每个任务一个槽位，顺序与计划一致
#[derive(Debug)]
pub struct PlanReport {
    pub dispatch: Dispatch,
    pub outcomes: Vec<TaskOutcome>,
}

impl PlanReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(TaskOutcome::is_success)
    }

    /// 所有成功任务的输出，按计划顺序拼接
    pub fn results(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(TaskOutcome::output)
            .flatten()
            .cloned()
            .collect()
    }

    pub fn failures(&self) -> Vec<(usize, &SdkError)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.error().map(|e| (i, e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;

    #[test]
    fn test_legal_transitions_set_timestamps() {
        let mut task = Task::new("writer", "draft");
        assert_eq!(task.status(), TaskStatus::Pending);
        task.transition(TaskStatus::Running).unwrap();
        assert!(task.started_at.is_some());
        task.transition(TaskStatus::Succeeded).unwrap();
        assert!(task.finished_at.is_some());
    }

    #[test]
    fn test_illegal_transition() {
        let mut task = Task::new("writer", "draft");
        let err = task.transition(TaskStatus::Succeeded).unwrap_err();
        assert!(err.is(ErrorKind::AgentExecution));

        task.transition(TaskStatus::Running).unwrap();
        task.transition(TaskStatus::Failed).unwrap();
        assert!(task.transition(TaskStatus::Running).is_err());
    }

    #[test]
    fn test_cancel_only_touches_unfinished() {
        let mut done = Task::new("a", "x");
        done.transition(TaskStatus::Running).unwrap();
        done.transition(TaskStatus::Succeeded).unwrap();
        done.cancel("cancelled");
        assert_eq!(done.status(), TaskStatus::Succeeded);
        assert!(done.error.is_none());

        let mut pending = Task::new("a", "y");
        pending.cancel("cancelled");
        assert_eq!(pending.status(), TaskStatus::Failed);
        assert_eq!(pending.error.as_deref(), Some("cancelled"));
    }

    #[test]
    fn test_task_ids_are_unique() {
        assert_ne!(Task::new("a", "x").id, Task::new("a", "x").id);
    }

    #[test]
    fn test_report_results_skip_failures() {
        let report = PlanReport {
            dispatch: Dispatch::Sequential(FailurePolicy::Continue),
            outcomes: vec![
                TaskOutcome::Succeeded(vec!["one".into()]),
                TaskOutcome::Failed(SdkError::agent_execution("boom")),
                TaskOutcome::Succeeded(vec!["three".into()]),
            ],
        };
        assert!(!report.is_success());
        assert_eq!(report.results(), vec!["one", "three"]);
        assert_eq!(report.failures().len(), 1);
        assert_eq!(report.failures()[0].0, 1);
    }
}
