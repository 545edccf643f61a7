//! 计划执行集成测试

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use sdk_helpers::core::ErrorKind;
    use sdk_helpers::plan::*;

    /// 统计各角色被调用次数的注册表：ok 成功，boom 失败
    fn counting_registry(ok_calls: Arc<AtomicUsize>, boom_calls: Arc<AtomicUsize>) -> HandlerRegistry {
        HandlerRegistry::new()
            .with("ok", move |req: TaskRequest| {
                let calls = Arc::clone(&ok_calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    anyhow::Ok(vec![format!("done:{}", req.prompt)])
                }
            })
            .with("boom", move |_: TaskRequest| {
                let calls = Arc::clone(&boom_calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<Vec<String>, _>(anyhow::anyhow!("task exploded"))
                }
            })
    }

    fn three_task_plan() -> Plan {
        Plan::builder()
            .task("ok", "first")
            .task("boom", "second")
            .task("ok", "third")
            .build()
    }

    #[tokio::test]
    async fn test_halt_stops_before_third_task() {
        let ok_calls = Arc::new(AtomicUsize::new(0));
        let boom_calls = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(ok_calls.clone(), boom_calls.clone());
        let mut plan = three_task_plan();

        let err = execute_plan(&mut plan, &registry, FailurePolicy::from_halt_on_error(true))
            .await
            .unwrap_err();

        assert!(err.is(ErrorKind::AgentExecution));
        assert!(err.to_string().contains("task exploded"));
        assert_eq!(ok_calls.load(Ordering::SeqCst), 1);
        assert_eq!(boom_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            plan.statuses(),
            vec![TaskStatus::Succeeded, TaskStatus::Failed, TaskStatus::Pending]
        );
    }

    #[tokio::test]
    async fn test_continue_runs_every_task() {
        let ok_calls = Arc::new(AtomicUsize::new(0));
        let boom_calls = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(ok_calls.clone(), boom_calls.clone());
        let mut plan = three_task_plan();

        let report = execute_plan(&mut plan, &registry, FailurePolicy::from_halt_on_error(false))
            .await
            .unwrap();

        assert_eq!(report.dispatch, Dispatch::Sequential(FailurePolicy::Continue));
        assert_eq!(report.outcomes.len(), 3);
        assert!(report.outcomes[0].is_success());
        assert!(report.outcomes[1].error().unwrap().is(ErrorKind::AgentExecution));
        assert!(report.outcomes[2].is_success());
        assert_eq!(report.results(), vec!["done:first", "done:third"]);
        assert_eq!(ok_calls.load(Ordering::SeqCst), 2);
        assert_eq!(plan.tasks[1].error.as_deref(), Some("task exploded"));
    }

    #[tokio::test]
    async fn test_batch_respects_max_concurrency() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (running_in, peak_in) = (running.clone(), peak.clone());

        let registry = HandlerRegistry::new().with("work", move |req: TaskRequest| {
            let running = Arc::clone(&running_in);
            let peak = Arc::clone(&peak_in);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                anyhow::Ok(vec![req.prompt])
            }
        });

        let mut builder = Plan::builder();
        for i in 0..6 {
            builder = builder.task("work", format!("job-{i}"));
        }
        let mut plan = builder.build();

        let report = execute_batch(&mut plan, &registry, 2, BatchPolicy::CollectAll)
            .await
            .unwrap();

        assert!(report.is_success());
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(
            report.results(),
            (0..6).map(|i| format!("job-{i}")).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_execute_task_with_single_handler() {
        let mut task = Task::new("solo", "alone").with_context(["ctx"]);
        let handler = |req: TaskRequest| async move {
            anyhow::Ok(vec![format!("{} with {}", req.prompt, req.context.join(","))])
        };
        let out = execute_task(&mut task, &handler, &["prior".to_string()])
            .await
            .unwrap();
        assert_eq!(out, vec!["alone with ctx,prior"]);
        assert!(task.started_at.is_some() && task.finished_at.is_some());
    }
}
