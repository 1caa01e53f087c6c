//! Executor 集成测试：用脚本化的 Planner / Navigator / 页面桥接驱动完整运行循环

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use webpilot::agent::{
    Action, ActionKind, ActionResult, ExecutorConfig, ExecutorEvent, Navigator, PageState, Plan,
    Planner, RunContext, FALLBACK_PLAN_STEPS,
};
use webpilot::bridge::{BridgeError, MockPageBridge};
use webpilot::core::ExecutorPhase;
use webpilot::llm::MockLlmClient;
use webpilot::{AgentError, Executor};

fn plan(steps: &[&str]) -> Plan {
    Plan {
        analysis: String::new(),
        memory: Vec::new(),
        thought: String::new(),
        steps: steps.iter().map(|s| s.to_string()).collect(),
        success_criteria: String::new(),
    }
}

fn navigate(url: &str) -> Action {
    Action::new(ActionKind::Navigate).with_param("url", url)
}

fn done(result: &str) -> Action {
    Action::new(ActionKind::Done).with_param("result", result)
}

fn click(index: usize) -> Action {
    Action::new(ActionKind::Click).with_param("index", index.to_string())
}

struct ScriptedPlanner {
    initial: Mutex<Option<Result<Plan, AgentError>>>,
    replans: Mutex<VecDeque<Result<Plan, AgentError>>>,
    reasons: Mutex<Vec<String>>,
    resets: AtomicUsize,
}

impl ScriptedPlanner {
    fn new() -> Self {
        Self {
            initial: Mutex::new(None),
            replans: Mutex::new(VecDeque::new()),
            reasons: Mutex::new(Vec::new()),
            resets: AtomicUsize::new(0),
        }
    }

    fn with_initial(self, result: Result<Plan, AgentError>) -> Self {
        *self.initial.lock().unwrap() = Some(result);
        self
    }

    fn with_replan(self, result: Result<Plan, AgentError>) -> Self {
        self.replans.lock().unwrap().push_back(result);
        self
    }

    fn reasons(&self) -> Vec<String> {
        self.reasons.lock().unwrap().clone()
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn create_plan(&self, _task: &str) -> Result<Plan, AgentError> {
        self.initial
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(plan(&["Open the site", "Finish"])))
    }

    async fn replan(&self, _context: &RunContext, reason: &str) -> Result<Plan, AgentError> {
        self.reasons.lock().unwrap().push(reason.to_string());
        self.replans
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(plan(&["Try another way"])))
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScriptedNavigator {
    script: Mutex<VecDeque<Result<Action, AgentError>>>,
    when_empty: Result<Action, AgentError>,
    pages: Mutex<Vec<PageState>>,
    history_lens: Mutex<Vec<usize>>,
    resets: AtomicUsize,
    gate: Option<(Arc<AtomicBool>, Arc<Notify>)>,
}

impl ScriptedNavigator {
    fn new(when_empty: Result<Action, AgentError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            when_empty,
            pages: Mutex::new(Vec::new()),
            history_lens: Mutex::new(Vec::new()),
            resets: AtomicUsize::new(0),
            gate: None,
        }
    }

    fn with_script(self, script: Vec<Result<Action, AgentError>>) -> Self {
        self.script.lock().unwrap().extend(script);
        self
    }

    /// 每次决策前先标记 entered，再等待放行
    fn with_gate(mut self, entered: Arc<AtomicBool>, release: Arc<Notify>) -> Self {
        self.gate = Some((entered, release));
        self
    }
}

#[async_trait]
impl Navigator for ScriptedNavigator {
    async fn next_action(&self, context: &RunContext, page: &PageState) -> Result<Action, AgentError> {
        if let Some((entered, release)) = &self.gate {
            entered.store(true, Ordering::SeqCst);
            release.notified().await;
        }
        self.pages.lock().unwrap().push(page.clone());
        self.history_lens.lock().unwrap().push(context.history().len());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.when_empty.clone())
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    executor: Arc<Executor>,
    llm: Arc<MockLlmClient>,
    planner: Arc<ScriptedPlanner>,
    navigator: Arc<ScriptedNavigator>,
    bridge: Arc<MockPageBridge>,
    events: Arc<Mutex<Vec<ExecutorEvent>>>,
}

impl Harness {
    fn new(
        llm: MockLlmClient,
        planner: ScriptedPlanner,
        navigator: ScriptedNavigator,
        config: ExecutorConfig,
    ) -> Self {
        let llm = Arc::new(llm);
        let planner = Arc::new(planner);
        let navigator = Arc::new(navigator);
        let bridge = Arc::new(MockPageBridge::new());
        let executor = Arc::new(Executor::new(
            llm.clone(),
            planner.clone(),
            navigator.clone(),
            bridge.clone(),
            config,
        ));
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        executor.on_event(move |e| {
            sink.lock().unwrap().push(e.clone());
            Ok(())
        });
        Self {
            executor,
            llm,
            planner,
            navigator,
            bridge,
            events,
        }
    }

    fn with_navigator(navigator: ScriptedNavigator) -> Self {
        Self::new(
            MockLlmClient::new(),
            ScriptedPlanner::new(),
            navigator,
            ExecutorConfig::default(),
        )
    }

    fn events(&self) -> Vec<ExecutorEvent> {
        self.events.lock().unwrap().clone()
    }

    fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.name()).collect()
    }

    fn count(&self, name: &str) -> usize {
        self.names().iter().filter(|n| **n == name).count()
    }

    fn assert_single_terminal_last(&self) {
        let events = self.events();
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert!(events.last().map(|e| e.is_terminal()).unwrap_or(false));
    }
}

#[tokio::test]
async fn test_navigate_then_done_resolves_with_result() {
    let h = Harness::with_navigator(
        ScriptedNavigator::new(Err(AgentError::Navigation("unexpected call".into())))
            .with_script(vec![Ok(navigate("example.com")), Ok(done("Visited example.com"))]),
    );

    let result = h.executor.execute_task("go to example.com", None).await.unwrap();
    assert_eq!(result, "Visited example.com");

    assert_eq!(
        h.names(),
        vec![
            "INIT_START",
            "INIT_COMPLETE",
            "PLAN_START",
            "PLAN_COMPLETE",
            "STEP_START",
            "STEP_ACTION",
            "STEP_RESULT",
            "STEP_START",
            "STEP_ACTION",
            "TASK_COMPLETE",
        ]
    );
    h.assert_single_terminal_last();
    assert_eq!(
        h.events().last(),
        Some(&ExecutorEvent::TaskComplete {
            result: "Visited example.com".into()
        })
    );

    let performed = h.bridge.performed();
    assert_eq!(performed.len(), 1);
    assert_eq!(performed[0].0, ActionKind::Navigate);
    assert_eq!(performed[0].1.get("url").map(String::as_str), Some("example.com"));

    // 第二轮决策时能看到第一轮的历史
    assert_eq!(*h.navigator.history_lens.lock().unwrap(), vec![0, 1]);
    assert_eq!(h.executor.phase(), ExecutorPhase::Complete);
    assert!(!h.executor.is_running());
}

#[tokio::test]
async fn test_done_without_result_uses_default_message() {
    let h = Harness::with_navigator(ScriptedNavigator::new(Ok(Action::new(ActionKind::Done))));
    let result = h.executor.execute_task("anything", None).await.unwrap();
    assert_eq!(result, webpilot::agent::DEFAULT_SUCCESS_MESSAGE);
}

#[tokio::test]
async fn test_all_models_fail_to_initialize() {
    let h = Harness::new(
        MockLlmClient::new().with_all_models_failing(),
        ScriptedPlanner::new(),
        ScriptedNavigator::new(Ok(done("never"))),
        ExecutorConfig::default(),
    );

    let err = h.executor.execute_task("anything", Some("custom-model")).await.unwrap_err();
    assert!(matches!(err, AgentError::Initialization(_)));
    assert!(err.to_string().contains("custom-model"));
    assert_eq!(h.names(), vec!["INIT_START", "TASK_FAILED"]);
    assert_eq!(h.executor.phase(), ExecutorPhase::Failed);
}

#[tokio::test]
async fn test_requested_model_failure_falls_back() {
    let h = Harness::new(
        MockLlmClient::new()
            .with_failing_model("huge-model")
            .with_progress(vec![0.1, 0.5, 1.0]),
        ScriptedPlanner::new(),
        ScriptedNavigator::new(Ok(done("ok"))),
        ExecutorConfig {
            model: "default-model".into(),
            fallback_models: vec!["small-model".into()],
            ..ExecutorConfig::default()
        },
    );

    h.executor.execute_task("anything", Some("huge-model")).await.unwrap();
    assert_eq!(h.llm.loaded_model().as_deref(), Some("default-model"));

    let events = h.events();
    let progress: Vec<f32> = events
        .iter()
        .filter_map(|e| match e {
            ExecutorEvent::InitProgress { progress } => Some(*progress),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![0.1, 0.5, 1.0]);
    let names = h.names();
    let complete_at = names.iter().position(|n| *n == "INIT_COMPLETE").unwrap();
    assert!(names[..complete_at].iter().all(|n| *n != "PLAN_START"));
    assert_eq!(names[1], "INIT_PROGRESS");
}

#[tokio::test]
async fn test_navigator_always_errors_exhausts_replans() {
    let h = Harness::with_navigator(ScriptedNavigator::new(Err(AgentError::Navigation(
        "inference timed out".into(),
    ))));

    let err = h.executor.execute_task("anything", None).await.unwrap_err();
    assert!(matches!(err, AgentError::Navigation(_)));
    assert_eq!(h.count("REPLAN"), 2);
    assert_eq!(h.count("TASK_FAILED"), 1);
    assert_eq!(h.names().last(), Some(&"TASK_FAILED"));
    // 重规划后的重试不算新的一步
    assert_eq!(h.count("STEP_START"), 1);
    assert_eq!(h.planner.reasons().len(), 2);
    assert!(h.navigator.resets.load(Ordering::SeqCst) >= 2);
    assert!(h.bridge.performed().is_empty());
}

#[tokio::test]
async fn test_empty_plan_is_replaced_by_fallback() {
    let h = Harness::new(
        MockLlmClient::new(),
        ScriptedPlanner::new().with_initial(Ok(plan(&[]))),
        ScriptedNavigator::new(Ok(done("ok"))),
        ExecutorConfig::default(),
    );

    assert_eq!(h.executor.execute_task("anything", None).await.unwrap(), "ok");
    let fallback: Vec<String> = FALLBACK_PLAN_STEPS.iter().map(|s| s.to_string()).collect();
    assert!(h
        .events()
        .contains(&ExecutorEvent::PlanComplete { plan: fallback }));
}

#[tokio::test]
async fn test_invalid_plan_output_is_replaced_by_fallback() {
    let h = Harness::new(
        MockLlmClient::new(),
        ScriptedPlanner::new().with_initial(Err(AgentError::InvalidPlan("missing steps".into()))),
        ScriptedNavigator::new(Ok(done("ok"))),
        ExecutorConfig::default(),
    );

    assert!(h.executor.execute_task("anything", None).await.is_ok());
    assert!(h.events().iter().any(|e| matches!(
        e,
        ExecutorEvent::PlanComplete { plan } if plan.len() == 2
    )));
}

#[tokio::test]
async fn test_planning_inference_failure_is_fatal() {
    let h = Harness::new(
        MockLlmClient::new(),
        ScriptedPlanner::new().with_initial(Err(AgentError::Planning("connection refused".into()))),
        ScriptedNavigator::new(Ok(done("ok"))),
        ExecutorConfig::default(),
    );

    let err = h.executor.execute_task("anything", None).await.unwrap_err();
    assert!(matches!(err, AgentError::Planning(_)));
    assert_eq!(
        h.names(),
        vec!["INIT_START", "INIT_COMPLETE", "PLAN_START", "TASK_FAILED"]
    );
}

#[tokio::test]
async fn test_failure_streak_forces_one_replan_and_resets() {
    let mut script: Vec<Result<Action, AgentError>> = (0..8).map(|i| Ok(click(i))).collect();
    script.push(Ok(done("finished")));
    let h = Harness::with_navigator(
        ScriptedNavigator::new(Err(AgentError::Navigation("script exhausted".into())))
            .with_script(script),
    );
    // F F F (重规划) F F S F F
    for ok in [false, false, false, false, false, true, false, false] {
        h.bridge.push_result(if ok {
            ActionResult::ok(None)
        } else {
            ActionResult::failed("element detached")
        });
    }

    let result = h.executor.execute_task("anything", None).await.unwrap();
    assert_eq!(result, "finished");
    assert_eq!(h.count("REPLAN"), 1);
    assert_eq!(h.planner.reasons(), vec!["3 consecutive action failures".to_string()]);

    // 重规划紧跟在第 3 个失败结果之后
    let names = h.names();
    let third_result = names
        .iter()
        .enumerate()
        .filter(|(_, n)| **n == "STEP_RESULT")
        .nth(2)
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(names[third_result + 1], "REPLAN");
    assert_eq!(names[third_result + 2], "PLAN_COMPLETE");
    assert_eq!(h.count("STEP_START"), 9);
    h.assert_single_terminal_last();
}

#[tokio::test]
async fn test_failure_streak_without_budget_keeps_going() {
    let mut script: Vec<Result<Action, AgentError>> = (0..4).map(|i| Ok(click(i))).collect();
    script.push(Ok(done("adapted")));
    let h = Harness::new(
        MockLlmClient::new(),
        ScriptedPlanner::new(),
        ScriptedNavigator::new(Err(AgentError::Navigation("script exhausted".into())))
            .with_script(script),
        ExecutorConfig {
            max_replans: 0,
            ..ExecutorConfig::default()
        },
    );
    for _ in 0..4 {
        h.bridge.push_result(ActionResult::failed("not clickable"));
    }

    assert_eq!(h.executor.execute_task("anything", None).await.unwrap(), "adapted");
    assert_eq!(h.count("REPLAN"), 0);
}

#[tokio::test]
async fn test_fail_action_consumes_replans_then_fails() {
    let h = Harness::new(
        MockLlmClient::new(),
        ScriptedPlanner::new(),
        ScriptedNavigator::new(Ok(
            Action::new(ActionKind::Fail).with_param("reason", "captcha wall")
        )),
        ExecutorConfig {
            max_replans: 1,
            ..ExecutorConfig::default()
        },
    );

    let err = h.executor.execute_task("anything", None).await.unwrap_err();
    assert_eq!(err, AgentError::TaskFailed("captcha wall".into()));
    assert_eq!(h.count("REPLAN"), 1);
    assert_eq!(h.count("STEP_ACTION"), 2);
    assert!(h.bridge.performed().is_empty());
    h.assert_single_terminal_last();
}

#[tokio::test]
async fn test_replan_budget_shared_across_triggers() {
    let h = Harness::new(
        MockLlmClient::new(),
        ScriptedPlanner::new(),
        ScriptedNavigator::new(Ok(click(1))).with_script(vec![
            Err(AgentError::InvalidAction("unknown action_type 'hover'".into())),
            Ok(Action::new(ActionKind::Fail).with_param("reason", "dead end")),
        ]),
        ExecutorConfig {
            max_replans: 2,
            max_steps: 6,
            ..ExecutorConfig::default()
        },
    );
    for _ in 0..6 {
        h.bridge.push_result(ActionResult::failed("nothing happens"));
    }

    let err = h.executor.execute_task("anything", None).await.unwrap_err();
    assert_eq!(err, AgentError::StepBudgetExceeded(6));
    // 导航错误与 fail 已用完额度，连续失败不再触发重规划
    assert_eq!(h.count("REPLAN"), 2);
}

#[tokio::test]
async fn test_replan_failure_is_fatal() {
    let h = Harness::new(
        MockLlmClient::new(),
        ScriptedPlanner::new().with_replan(Err(AgentError::Planning("model crashed".into()))),
        ScriptedNavigator::new(Err(AgentError::Navigation("bad output".into()))),
        ExecutorConfig::default(),
    );

    let err = h.executor.execute_task("anything", None).await.unwrap_err();
    assert!(matches!(err, AgentError::Planning(_)));
    assert_eq!(h.count("REPLAN"), 1);
    h.assert_single_terminal_last();
}

#[tokio::test]
async fn test_step_budget_exceeded() {
    let h = Harness::new(
        MockLlmClient::new(),
        ScriptedPlanner::new(),
        ScriptedNavigator::new(Ok(Action::new(ActionKind::Scroll).with_param("direction", "down"))),
        ExecutorConfig {
            max_steps: 3,
            ..ExecutorConfig::default()
        },
    );

    let err = h.executor.execute_task("anything", None).await.unwrap_err();
    assert_eq!(err, AgentError::StepBudgetExceeded(3));
    assert_eq!(h.count("STEP_START"), 3);
    assert_eq!(h.bridge.performed().len(), 3);
    match h.events().last() {
        Some(ExecutorEvent::TaskFailed { error }) => {
            assert!(error.contains("Maximum steps exceeded"))
        }
        other => panic!("unexpected last event: {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_stops_before_next_iteration() {
    let h = Harness::with_navigator(ScriptedNavigator::new(Ok(click(2))));
    let weak = Arc::downgrade(&h.executor);
    h.executor.on_event(move |e| {
        if matches!(e, ExecutorEvent::StepResult { .. }) {
            if let Some(ex) = weak.upgrade() {
                ex.cancel();
            }
        }
        Ok(())
    });

    let err = h.executor.execute_task("anything", None).await.unwrap_err();
    assert_eq!(err, AgentError::Cancelled);
    assert_eq!(h.bridge.performed().len(), 1);
    assert_eq!(h.count("STEP_START"), 1);
    match h.events().last() {
        Some(ExecutorEvent::TaskFailed { error }) => assert!(error.contains("cancelled")),
        other => panic!("unexpected last event: {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_before_dispatch_performs_nothing() {
    let h = Harness::with_navigator(ScriptedNavigator::new(Ok(click(0))));
    let weak = Arc::downgrade(&h.executor);
    h.executor.on_event(move |e| {
        if matches!(e, ExecutorEvent::StepAction { .. }) {
            if let Some(ex) = weak.upgrade() {
                ex.cancel();
            }
        }
        Ok(())
    });

    assert_eq!(
        h.executor.execute_task("anything", None).await,
        Err(AgentError::Cancelled)
    );
    assert!(h.bridge.performed().is_empty());
}

/// 在 STEP_START 时取消，使取消落在 Navigator 决策期间
fn cancel_on_step_start(h: &Harness) {
    let weak = Arc::downgrade(&h.executor);
    h.executor.on_event(move |e| {
        if matches!(e, ExecutorEvent::StepStart { .. }) {
            if let Some(ex) = weak.upgrade() {
                ex.cancel();
            }
        }
        Ok(())
    });
}

#[tokio::test]
async fn test_cancel_during_decision_overrides_done() {
    let h = Harness::with_navigator(ScriptedNavigator::new(Ok(done("finished anyway"))));
    cancel_on_step_start(&h);

    let err = h.executor.execute_task("anything", None).await.unwrap_err();
    assert_eq!(err, AgentError::Cancelled);
    assert_eq!(h.count("TASK_COMPLETE"), 0);
    assert_eq!(h.count("STEP_ACTION"), 0);
    h.assert_single_terminal_last();
    assert!(matches!(h.events().last(), Some(ExecutorEvent::TaskFailed { .. })));
    assert_eq!(h.executor.phase(), ExecutorPhase::Failed);
}

#[tokio::test]
async fn test_cancel_during_decision_skips_replan() {
    let give_up = Action::new(ActionKind::Fail).with_param("reason", "captcha");
    let h = Harness::with_navigator(ScriptedNavigator::new(Ok(give_up)));
    cancel_on_step_start(&h);

    let err = h.executor.execute_task("anything", None).await.unwrap_err();
    assert_eq!(err, AgentError::Cancelled);
    assert_eq!(h.count("REPLAN"), 0);
    assert!(h.planner.reasons().is_empty());
    assert_eq!(h.count("PLAN_COMPLETE"), 1);
    h.assert_single_terminal_last();
}

#[tokio::test]
async fn test_cancel_during_failed_decision_skips_replan() {
    let h = Harness::with_navigator(ScriptedNavigator::new(Err(AgentError::Navigation(
        "inference timed out".into(),
    ))));
    cancel_on_step_start(&h);

    let err = h.executor.execute_task("anything", None).await.unwrap_err();
    assert_eq!(err, AgentError::Cancelled);
    assert_eq!(h.count("REPLAN"), 0);
    assert!(h.planner.reasons().is_empty());
    assert!(h.bridge.performed().is_empty());
}

#[tokio::test]
async fn test_cancel_when_idle_does_not_affect_next_run() {
    let h = Harness::with_navigator(ScriptedNavigator::new(Ok(done("fine"))));
    h.executor.cancel();
    assert_eq!(h.executor.execute_task("anything", None).await.unwrap(), "fine");
}

#[tokio::test]
async fn test_overlapping_run_is_rejected() {
    let entered = Arc::new(AtomicBool::new(false));
    let release = Arc::new(Notify::new());
    let h = Harness::with_navigator(
        ScriptedNavigator::new(Ok(done("first run"))).with_gate(entered.clone(), release.clone()),
    );

    let ex = h.executor.clone();
    let first = tokio::spawn(async move { ex.execute_task("slow task", None).await });
    while !entered.load(Ordering::SeqCst) {
        tokio::task::yield_now().await;
    }
    assert!(h.executor.is_running());
    assert_eq!(h.executor.phase(), ExecutorPhase::Executing);

    let before = h.events().len();
    let err = h.executor.execute_task("second task", None).await.unwrap_err();
    assert_eq!(err, AgentError::AlreadyRunning);
    assert_eq!(h.events().len(), before);

    release.notify_one();
    assert_eq!(first.await.unwrap().unwrap(), "first run");
    assert!(!h.executor.is_running());
}

#[tokio::test]
async fn test_run_end_resets_collaborators_and_allows_reuse() {
    let h = Harness::with_navigator(
        ScriptedNavigator::new(Ok(done("again")))
            .with_script(vec![Err(AgentError::Navigation("flaky".into()))]),
    );

    assert_eq!(h.executor.execute_task("first", None).await.unwrap(), "again");
    assert_eq!(h.planner.resets.load(Ordering::SeqCst), 1);
    // 一次重规划 + 一次运行结束
    assert_eq!(h.navigator.resets.load(Ordering::SeqCst), 2);

    assert_eq!(h.executor.execute_task("second", None).await.unwrap(), "again");
    assert_eq!(h.planner.resets.load(Ordering::SeqCst), 2);
    assert_eq!(h.count("TASK_COMPLETE"), 2);
}

#[tokio::test]
async fn test_listener_failures_do_not_affect_run() {
    let h = Harness::with_navigator(
        ScriptedNavigator::new(Ok(done("still fine"))),
    );
    h.executor.on_event(|_| Err(anyhow::anyhow!("ui detached")));
    h.executor.on_event(|e| {
        if e.is_terminal() {
            panic!("listener bug");
        }
        Ok(())
    });

    assert_eq!(
        h.executor.execute_task("anything", None).await.unwrap(),
        "still fine"
    );
    h.assert_single_terminal_last();
}

#[tokio::test]
async fn test_page_read_failure_uses_degraded_state() {
    let h = Harness::with_navigator(
        ScriptedNavigator::new(Ok(done("ok"))).with_script(vec![Ok(navigate("https://example.com"))]),
    );
    h.bridge.set_current_url("chrome://newtab");
    h.bridge
        .push_page(Err(BridgeError::Read("cannot inject script".into())));

    assert!(h.executor.execute_task("anything", None).await.is_ok());
    let pages = h.navigator.pages.lock().unwrap().clone();
    assert_eq!(pages[0].title, "Restricted page");
    assert_eq!(pages[0].url, "chrome://newtab");
    assert!(pages[0].elements.is_empty());
    // 下一轮重新读取，拿到导航后的页面
    assert_eq!(pages[1].url, "https://example.com");
}

#[tokio::test]
async fn test_step_result_data_is_bounded() {
    let h = Harness::new(
        MockLlmClient::new(),
        ScriptedPlanner::new(),
        ScriptedNavigator::new(Ok(done("ok"))).with_script(vec![Ok(
            Action::new(ActionKind::Extract).with_param("selector", "main")
        )]),
        ExecutorConfig {
            result_preview_chars: 10,
            ..ExecutorConfig::default()
        },
    );
    h.bridge.push_result(ActionResult::ok(Some("x".repeat(50))));

    h.executor.execute_task("anything", None).await.unwrap();
    assert!(h.events().contains(&ExecutorEvent::StepResult {
        success: true,
        data: Some(format!("{}...", "x".repeat(10))),
    }));
}
