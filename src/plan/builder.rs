//! 计划构建器
//!
//! 提供流畅的API来构建计划

use crate::plan::{Plan, Task};

/// 计划构建器
#[derive(Debug, Default)]
pub struct PlanBuilder {
    tasks: Vec<Task>,
    context: Vec<String>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加任务（按添加顺序执行）
    pub fn task(mut self, role: impl Into<String>, prompt: impl Into<String>) -> Self {
        self.tasks.push(Task::new(role, prompt));
        self
    }

    /// 添加已构造好的任务
    pub fn push(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// 设置初始上下文
    pub fn context(mut self, context: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.context = context.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Plan {
        Plan {
            tasks: self.tasks,
            context: self.context,
        }
    }
}

impl Plan {
    pub fn builder() -> PlanBuilder {
        PlanBuilder::new()
    }
}

/// 由任务序列创建计划
pub fn create_plan(tasks: impl IntoIterator<Item = Task>) -> Plan {
    Plan::new(tasks.into_iter().collect())
}
