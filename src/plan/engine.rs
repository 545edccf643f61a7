//! 计划执行引擎
//!
//! execute_plan 按声明顺序逐个派发，前序成功任务的输出累积为后续任务的上下文；
//! execute_batch 将任务视为相互独立的一批，由 TaskScheduler 限制并发。
//! 两者都在派发前解析全部处理器，缺失角色时所有任务保持 Pending。

use std::sync::Arc;

use futures_util::future::{join_all, try_join_all};

use crate::core::{SdkError, TaskScheduler};
use crate::plan::{
    AgentHandler, BatchPolicy, Dispatch, FailurePolicy, HandlerRegistry, Plan, PlanReport, Task,
    TaskOutcome, TaskRequest, TaskStatus,
};

const CANCELLED: &str = "cancelled: sibling task failed";

/// 执行单个任务；上下文为任务静态上下文后接 context
pub async fn execute_task(
    task: &mut Task,
    handler: &dyn AgentHandler,
    context: &[String],
) -> Result<Vec<String>, SdkError> {
    task.transition(TaskStatus::Running)?;
    tracing::info!(task_id = %task.id, role = %task.role, "task started");

    let request = TaskRequest {
        task_id: task.id.clone(),
        role: task.role.clone(),
        prompt: task.prompt.clone(),
        context: task.context.iter().chain(context).cloned().collect(),
    };

    match handler.handle(request).await {
        Ok(output) => {
            task.transition(TaskStatus::Succeeded)?;
            task.results = output.clone();
            tracing::info!(task_id = %task.id, outputs = output.len(), "task succeeded");
            Ok(output)
        }
        Err(e) => {
            task.transition(TaskStatus::Failed)?;
            task.error = Some(e.to_string());
            tracing::warn!(task_id = %task.id, role = %task.role, error = %e, "task failed");
            Err(SdkError::agent_execution(format!("Task '{}' failed: {e}", task.id))
                .with_context("task_id", task.id.clone())
                .with_context("role", task.role.clone())
                .with_source(e))
        }
    }
}

fn resolve_handlers(
    plan: &Plan,
    registry: &HandlerRegistry,
) -> Result<Vec<Arc<dyn AgentHandler>>, SdkError> {
    plan.tasks
        .iter()
        .map(|task| registry.resolve(&task.role))
        .collect()
}

/// 顺序执行计划
///
/// Halt：首个失败返回该任务的错误，后续任务不派发；Continue：返回每个任务一个槽位的报告。
pub async fn execute_plan(
    plan: &mut Plan,
    registry: &HandlerRegistry,
    policy: FailurePolicy,
) -> Result<PlanReport, SdkError> {
    let handlers = resolve_handlers(plan, registry)?;
    let mut accumulated = plan.context.clone();
    let mut outcomes = Vec::with_capacity(plan.tasks.len());

    for (task, handler) in plan.tasks.iter_mut().zip(handlers) {
        match execute_task(task, handler.as_ref(), &accumulated).await {
            Ok(output) => {
                accumulated.extend(output.iter().cloned());
                outcomes.push(TaskOutcome::Succeeded(output));
            }
            Err(e) => match policy {
                FailurePolicy::Halt => return Err(e),
                FailurePolicy::Continue => outcomes.push(TaskOutcome::Failed(e)),
            },
        }
    }

    Ok(PlanReport {
        dispatch: Dispatch::Sequential(policy),
        outcomes,
    })
}

/// 并发执行一批独立任务（每个任务只拿到自身上下文与初始上下文）
///
/// FailFast：首个失败即返回其错误，未完成的任务被取消并标记为 Failed；
/// CollectAll：失败互不影响，返回完整报告。
pub async fn execute_batch(
    plan: &mut Plan,
    registry: &HandlerRegistry,
    max_concurrency: usize,
    policy: BatchPolicy,
) -> Result<PlanReport, SdkError> {
    let handlers = resolve_handlers(plan, registry)?;
    let scheduler = TaskScheduler::new(max_concurrency);
    let seed = plan.context.clone();
    let dispatch = Dispatch::Batch {
        policy,
        max_concurrency: scheduler.max_concurrency(),
    };

    let runs = plan
        .tasks
        .iter_mut()
        .zip(handlers)
        .map(|(task, handler)| {
            let scheduler = scheduler.clone();
            let seed = &seed;
            async move {
                let _permit = scheduler.acquire().await?;
                execute_task(task, handler.as_ref(), seed).await
            }
        })
        .collect::<Vec<_>>();

    match policy {
        BatchPolicy::FailFast => {
            let result = try_join_all(runs).await;
            match result {
                Ok(outputs) => Ok(PlanReport {
                    dispatch,
                    outcomes: outputs.into_iter().map(TaskOutcome::Succeeded).collect(),
                }),
                Err(e) => {
                    for task in plan.tasks.iter_mut() {
                        task.cancel(CANCELLED);
                    }
                    Err(e)
                }
            }
        }
        BatchPolicy::CollectAll => {
            let outcomes = join_all(runs)
                .await
                .into_iter()
                .map(|r| match r {
                    Ok(output) => TaskOutcome::Succeeded(output),
                    Err(e) => TaskOutcome::Failed(e),
                })
                .collect();
            Ok(PlanReport { dispatch, outcomes })
        }
    }
}
