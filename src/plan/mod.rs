//! 计划执行：有序任务按角色派发给处理器
//!
//! - **types**: Plan / Task / 状态 / 策略 / 报告
//! - **handler**: AgentHandler 与 HandlerRegistry
//! - **builder**: PlanBuilder / create_plan
//! - **engine**: execute_task / execute_plan / execute_batch

pub mod builder;
pub mod engine;
pub mod handler;
pub mod types;

pub use builder::{create_plan, PlanBuilder};
pub use engine::{execute_batch, execute_plan, execute_task};
pub use handler::{AgentHandler, HandlerRegistry};
pub use types::{
    BatchPolicy, Dispatch, FailurePolicy, Plan, PlanReport, Task, TaskId, TaskOutcome,
    TaskRequest, TaskStatus,
};
