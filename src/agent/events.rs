//! 执行过程事件与多播总线
//!
//! 事件序列化为 `{"type": "STEP_START", "stepNumber": 1}` 形式的 JSON，供 UI / CLI 展示。
//! 监听器之间相互隔离：某个监听器返回错误或 panic 只记录日志，不影响其他监听器与运行本身。

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::agent::ActionKind;

/// 执行器事件（可序列化为 JSON）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutorEvent {
    InitStart,
    /// 模型加载进度，取值 [0, 1]
    InitProgress { progress: f32 },
    InitComplete,
    PlanStart,
    /// 已采用的计划步骤
    PlanComplete { plan: Vec<String> },
    /// 第几步（从 1 开始）
    StepStart {
        #[serde(rename = "stepNumber")]
        step_number: usize,
    },
    StepAction {
        action: ActionKind,
        params: BTreeMap<String, String>,
    },
    /// 动作结果；data 为截断后的返回数据或错误信息
    StepResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<String>,
    },
    Replan { reason: String },
    TaskComplete { result: String },
    TaskFailed { error: String },
}

impl ExecutorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ExecutorEvent::InitStart => "INIT_START",
            ExecutorEvent::InitProgress { .. } => "INIT_PROGRESS",
            ExecutorEvent::InitComplete => "INIT_COMPLETE",
            ExecutorEvent::PlanStart => "PLAN_START",
            ExecutorEvent::PlanComplete { .. } => "PLAN_COMPLETE",
            ExecutorEvent::StepStart { .. } => "STEP_START",
            ExecutorEvent::StepAction { .. } => "STEP_ACTION",
            ExecutorEvent::StepResult { .. } => "STEP_RESULT",
            ExecutorEvent::Replan { .. } => "REPLAN",
            ExecutorEvent::TaskComplete { .. } => "TASK_COMPLETE",
            ExecutorEvent::TaskFailed { .. } => "TASK_FAILED",
        }
    }

    /// TASK_COMPLETE / TASK_FAILED
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutorEvent::TaskComplete { .. } | ExecutorEvent::TaskFailed { .. }
        )
    }
}

type Listener = Arc<dyn Fn(&ExecutorEvent) -> anyhow::Result<()> + Send + Sync>;

struct BusInner {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
}

/// 事件多播总线（克隆共享同一组监听器）
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                next_id: AtomicU64::new(1),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// 注册监听器，返回可取消订阅的句柄（丢弃句柄不会取消订阅）
    pub fn on_event<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ExecutorEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let listener: Listener = Arc::new(listener);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, listener));
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// 以 channel 形式订阅，适合异步消费者
    pub fn channel(&self) -> (Subscription, mpsc::UnboundedReceiver<ExecutorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub = self.on_event(move |event| {
            // 接收端已关闭时静默丢弃
            let _ = tx.send(event.clone());
            Ok(())
        });
        (sub, rx)
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// 依次投递给所有监听器；监听器可在回调中取消订阅
    pub fn emit(&self, event: ExecutorEvent) {
        tracing::debug!(event = event.name(), "executor event");
        let snapshot: Vec<(u64, Listener)> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for (id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(listener = id, event = event.name(), error = %e, "event listener failed");
                }
                Err(_) => {
                    tracing::warn!(listener = id, event = event.name(), "event listener panicked");
                }
            }
        }
    }
}

/// 订阅句柄
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 取消订阅；总线已释放时为空操作
    pub fn unsubscribe(self) {
        if let Some(inner) = self.bus.upgrade() {
            inner
                .listeners
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .retain(|(id, _)| *id != self.id);
        }
    }
}
