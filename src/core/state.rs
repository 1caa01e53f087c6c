//! Executor 状态机阶段
//!
//! Idle → Initializing → Planning → Executing → {Complete | Failed}；取消是正交标志，由 SessionSupervisor 持有。

use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

/// Executor 阶段（供调用方查询与 UI 投影）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorPhase {
    Idle,
    Initializing,
    Planning,
    Executing,
    Complete,
    Failed,
}

impl ExecutorPhase {
    /// 终态：Complete / Failed
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutorPhase::Complete | ExecutorPhase::Failed)
    }

    fn to_u8(self) -> u8 {
        match self {
            ExecutorPhase::Idle => 0,
            ExecutorPhase::Initializing => 1,
            ExecutorPhase::Planning => 2,
            ExecutorPhase::Executing => 3,
            ExecutorPhase::Complete => 4,
            ExecutorPhase::Failed => 5,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => ExecutorPhase::Initializing,
            2 => ExecutorPhase::Planning,
            3 => ExecutorPhase::Executing,
            4 => ExecutorPhase::Complete,
            5 => ExecutorPhase::Failed,
            _ => ExecutorPhase::Idle,
        }
    }
}

/// 可跨任务读取的阶段单元（Executor 内部写，调用方随时读）
#[derive(Debug)]
pub struct PhaseCell(AtomicU8);

impl PhaseCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(ExecutorPhase::Idle.to_u8()))
    }

    pub fn get(&self) -> ExecutorPhase {
        ExecutorPhase::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, phase: ExecutorPhase) {
        self.0.store(phase.to_u8(), Ordering::SeqCst);
    }
}

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}
