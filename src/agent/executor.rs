//! Executor：模型初始化 → 规划 → 执行循环（读页面 → 决策 → 执行）
//!
//! 负责步数上限、连续失败检测、有限次重规划、协作式取消，以及贯穿全程的事件流。
//! 同一时刻只允许一次运行；无论以何种方式退出，RunGuard 都会释放运行槽位并 reset Planner / Navigator。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::agent::prompt::truncate_chars;
use crate::agent::{
    Action, ActionKind, EventBus, ExecutorEvent, HistoryEntry, LlmNavigator, LlmPlanner,
    Navigator, PageState, Plan, Planner, RunContext, Subscription,
};
use crate::bridge::{degraded_page_state, PageBridge};
use crate::config::AppConfig;
use crate::core::{AgentError, ExecutorPhase, PhaseCell, SessionSupervisor};
use crate::llm::{LlmClient, LlmError};

/// done 动作未给出 result 时的默认结果
pub const DEFAULT_SUCCESS_MESSAGE: &str = "Task completed successfully";
/// fail 动作未给出 reason 时的默认原因
const DEFAULT_FAIL_REASON: &str = "Navigator reported the task cannot be completed";

/// Executor 运行参数
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    /// 默认模型
    pub model: String,
    /// 加载失败时依次尝试
    pub fallback_models: Vec<String>,
    pub max_steps: usize,
    pub max_replans: usize,
    pub failure_threshold: usize,
    pub result_preview_chars: usize,
}

impl ExecutorConfig {
    pub fn from_app(cfg: &AppConfig) -> Self {
        Self {
            model: cfg.llm.model.clone(),
            fallback_models: cfg.llm.fallback_models.clone(),
            max_steps: cfg.executor.max_steps,
            max_replans: cfg.executor.max_replans,
            failure_threshold: cfg.executor.failure_threshold,
            result_preview_chars: cfg.executor.result_preview_chars,
        }
    }

    /// 候选模型：请求的模型、默认模型、备选模型依次排列，去空去重
    pub fn model_candidates(&self, requested: Option<&str>) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let ordered = requested
            .into_iter()
            .chain(std::iter::once(self.model.as_str()))
            .chain(self.fallback_models.iter().map(String::as_str));
        for m in ordered {
            let m = m.trim();
            if !m.is_empty() && !out.iter().any(|c| c == m) {
                out.push(m.to_string());
            }
        }
        out
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::from_app(&AppConfig::default())
    }
}

/// 执行循环的计数器
#[derive(Debug, Default)]
struct LoopState {
    step: usize,
    replans: usize,
    failure_streak: usize,
}

/// 任务执行器
pub struct Executor {
    llm: Arc<dyn LlmClient>,
    planner: Arc<dyn Planner>,
    navigator: Arc<dyn Navigator>,
    bridge: Arc<dyn PageBridge>,
    config: ExecutorConfig,
    events: EventBus,
    supervisor: SessionSupervisor,
    phase: PhaseCell,
}

/// 运行结束（任何路径，包括 future 被丢弃）时释放槽位并 reset
struct RunGuard<'a> {
    executor: &'a Executor,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let ex = self.executor;
        if !ex.phase.get().is_terminal() {
            ex.phase.set(ExecutorPhase::Failed);
        }
        ex.reset();
        ex.supervisor.finish();
    }
}

impl Executor {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        planner: Arc<dyn Planner>,
        navigator: Arc<dyn Navigator>,
        bridge: Arc<dyn PageBridge>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            llm,
            planner,
            navigator,
            bridge,
            config,
            events: EventBus::new(),
            supervisor: SessionSupervisor::new(),
            phase: PhaseCell::new(),
        }
    }

    /// 用配置组装基于 LLM 的 Planner / Navigator
    pub fn from_config(llm: Arc<dyn LlmClient>, bridge: Arc<dyn PageBridge>, cfg: &AppConfig) -> Self {
        let planner = Arc::new(LlmPlanner::new(llm.clone()));
        let navigator = Arc::new(LlmNavigator::new(llm.clone()).with_limits(cfg.navigator.clone()));
        Self::new(llm, planner, navigator, bridge, ExecutorConfig::from_app(cfg))
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// 订阅事件
    pub fn on_event<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ExecutorEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.events.on_event(listener)
    }

    /// 事件总线（channel 订阅等）
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn phase(&self) -> ExecutorPhase {
        self.phase.get()
    }

    pub fn is_running(&self) -> bool {
        self.supervisor.is_running()
    }

    /// 请求协作式取消：在下一个循环边界生效，不打断正在进行的外部调用
    pub fn cancel(&self) {
        if self.supervisor.is_running() {
            tracing::info!("cancellation requested");
        }
        self.supervisor.cancel();
    }

    /// 重置 Planner 与 Navigator 的内部状态；运行结束时总会调用
    pub fn reset(&self) {
        self.planner.reset();
        self.navigator.reset();
    }

    /// 执行一个任务，返回最终结果；每次运行恰好发出一个 TASK_COMPLETE 或 TASK_FAILED
    pub async fn execute_task(&self, task: &str, model_id: Option<&str>) -> Result<String, AgentError> {
        let cancel = self.supervisor.try_begin().ok_or(AgentError::AlreadyRunning)?;
        let _guard = RunGuard { executor: self };

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", run_id = %run_id);
        async {
            tracing::info!(task = %truncate_chars(task, 120), "run started");
            let outcome = self.run(task, model_id, &cancel).await;
            match &outcome {
                Ok(result) => {
                    self.phase.set(ExecutorPhase::Complete);
                    tracing::info!(result = %truncate_chars(result, 120), "task complete");
                    self.events.emit(ExecutorEvent::TaskComplete {
                        result: result.clone(),
                    });
                }
                Err(e) => {
                    self.phase.set(ExecutorPhase::Failed);
                    tracing::warn!(error = %e, "task failed");
                    self.events.emit(ExecutorEvent::TaskFailed {
                        error: e.to_string(),
                    });
                }
            }
            let (prompt_tokens, completion_tokens, total_tokens) = self.llm.token_usage();
            tracing::debug!(prompt_tokens, completion_tokens, total_tokens, "token usage");
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        task: &str,
        model_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        self.phase.set(ExecutorPhase::Initializing);
        self.events.emit(ExecutorEvent::InitStart);
        self.initialize_model(model_id).await?;
        self.events.emit(ExecutorEvent::InitComplete);
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        self.phase.set(ExecutorPhase::Planning);
        self.events.emit(ExecutorEvent::PlanStart);
        let plan = match self.planner.create_plan(task).await {
            Ok(plan) if !plan.steps.is_empty() => plan,
            Ok(_) => {
                tracing::warn!("planner returned no steps, using fallback plan");
                Plan::fallback(task)
            }
            Err(e) if e.is_invalid_plan() => {
                tracing::warn!(error = %e, "planner output rejected, using fallback plan");
                Plan::fallback(task)
            }
            Err(e) => return Err(e),
        };
        self.events.emit(ExecutorEvent::PlanComplete {
            plan: plan.steps.clone(),
        });

        let mut ctx = RunContext::new(task, plan);
        self.phase.set(ExecutorPhase::Executing);
        self.execute_loop(&mut ctx, cancel).await
    }

    /// 依次尝试候选模型，加载进度转发为 INIT_PROGRESS
    async fn initialize_model(&self, model_id: Option<&str>) -> Result<(), AgentError> {
        let candidates = self.config.model_candidates(model_id);
        if candidates.is_empty() {
            return Err(AgentError::Initialization(
                "no candidate models configured".to_string(),
            ));
        }
        let mut failures = Vec::new();
        for model in &candidates {
            tracing::info!(model = %model, "loading model");
            match self.load_model(model).await {
                Ok(()) => {
                    tracing::info!(model = %model, "model ready");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(model = %model, error = %e, "model load failed");
                    failures.push(format!("{}: {}", model, e));
                }
            }
        }
        Err(AgentError::Initialization(failures.join("; ")))
    }

    async fn load_model(&self, model: &str) -> Result<(), LlmError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<f32>();
        let init = self.llm.initialize(model, tx);
        tokio::pin!(init);
        let result = loop {
            tokio::select! {
                res = &mut init => break res,
                Some(progress) = rx.recv() => self.emit_progress(progress),
            }
        };
        while let Ok(progress) = rx.try_recv() {
            self.emit_progress(progress);
        }
        result
    }

    fn emit_progress(&self, progress: f32) {
        if progress.is_nan() {
            return;
        }
        self.events.emit(ExecutorEvent::InitProgress {
            progress: progress.clamp(0.0, 1.0),
        });
    }

    async fn execute_loop(
        &self,
        ctx: &mut RunContext,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        let mut state = LoopState::default();
        // 重规划后的重试不算新的一步
        let mut new_step = true;

        loop {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            if new_step {
                if state.step >= self.config.max_steps {
                    return Err(AgentError::StepBudgetExceeded(self.config.max_steps));
                }
                state.step += 1;
                tracing::info!(step = state.step, "step started");
                self.events.emit(ExecutorEvent::StepStart {
                    step_number: state.step,
                });
            }
            new_step = true;

            let page = self.read_page_state().await;

            let decision = self.navigator.next_action(ctx, &page).await;
            // 决策期间收到的取消优先于决策结果
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            let action = match decision {
                Ok(action) => action,
                Err(e) if !e.is_navigation() => return Err(e),
                Err(e) => {
                    tracing::warn!(step = state.step, error = %e, "navigator failed");
                    if self.replan(ctx, &mut state, &e.to_string(), cancel).await? {
                        new_step = false;
                        continue;
                    }
                    return Err(e);
                }
            };

            self.events.emit(ExecutorEvent::StepAction {
                action: action.kind,
                params: action.params.clone(),
            });

            match action.kind {
                ActionKind::Done => {
                    let result = action
                        .param("result")
                        .map(str::trim)
                        .filter(|r| !r.is_empty())
                        .unwrap_or(DEFAULT_SUCCESS_MESSAGE);
                    return Ok(result.to_string());
                }
                ActionKind::Fail => {
                    let reason = action
                        .param("reason")
                        .map(str::trim)
                        .filter(|r| !r.is_empty())
                        .unwrap_or(DEFAULT_FAIL_REASON)
                        .to_string();
                    tracing::warn!(step = state.step, reason = %reason, "navigator gave up on the plan");
                    if self.replan(ctx, &mut state, &reason, cancel).await? {
                        new_step = false;
                        continue;
                    }
                    return Err(AgentError::TaskFailed(reason));
                }
                _ => {}
            }

            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            self.perform(ctx, &mut state, action, cancel).await?;
        }
    }

    /// 执行动作、记录历史并应用连续失败策略
    async fn perform(
        &self,
        ctx: &mut RunContext,
        state: &mut LoopState,
        action: Action,
        cancel: &CancellationToken,
    ) -> Result<(), AgentError> {
        let result = self.bridge.perform_action(action.kind, &action.params).await;
        let success = result.is_success();
        self.events.emit(ExecutorEvent::StepResult {
            success,
            data: result
                .message()
                .map(|m| truncate_chars(m, self.config.result_preview_chars)),
        });
        if !success {
            tracing::warn!(
                step = state.step,
                action = %action.kind,
                error = result.message().unwrap_or_default(),
                "action failed"
            );
        }
        ctx.record(HistoryEntry::new(action, result));

        if success {
            state.failure_streak = 0;
            return Ok(());
        }
        state.failure_streak += 1;
        let threshold = self.config.failure_threshold.max(1);
        if state.failure_streak >= threshold {
            let reason = format!("{} consecutive action failures", state.failure_streak);
            if !self.replan(ctx, state, &reason, cancel).await? {
                tracing::debug!(
                    streak = state.failure_streak,
                    "replan budget exhausted, navigator keeps adapting"
                );
            }
        }
        Ok(())
    }

    /// 消耗一次重规划额度；额度用尽返回 Ok(false)，Planner 失败为致命错误
    async fn replan(
        &self,
        ctx: &mut RunContext,
        state: &mut LoopState,
        reason: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, AgentError> {
        // 已取消时不再消耗额度，也不再调用 Planner
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        if state.replans >= self.config.max_replans {
            return Ok(false);
        }
        state.replans += 1;
        tracing::info!(
            replan = state.replans,
            max = self.config.max_replans,
            reason = %reason,
            "replanning"
        );
        self.events.emit(ExecutorEvent::Replan {
            reason: reason.to_string(),
        });
        self.navigator.reset();

        self.phase.set(ExecutorPhase::Planning);
        let plan = self.planner.replan(ctx, reason).await?;
        let plan = if plan.steps.is_empty() {
            tracing::warn!("replan returned no steps, using fallback plan");
            Plan::fallback(&ctx.task)
        } else {
            plan
        };
        self.events.emit(ExecutorEvent::PlanComplete {
            plan: plan.steps.clone(),
        });
        ctx.replace_plan(plan);
        state.failure_streak = 0;
        self.phase.set(ExecutorPhase::Executing);
        Ok(true)
    }

    /// 读取页面；失败时降级为提示性的页面状态，循环继续
    async fn read_page_state(&self) -> PageState {
        match self.bridge.read_page_state().await {
            Ok(page) => page,
            Err(e) => {
                let url = self.bridge.current_url().await;
                tracing::warn!(error = %e, url = ?url, "page read failed, using degraded page state");
                degraded_page_state(url)
            }
        }
    }
}
