//! 运行监管：单飞约束与协作式取消
//!
//! 每次运行开始时换一个新的 CancellationToken；cancel() 只作用于当前运行，
//! Executor 在每轮循环边界轮询 token，不会打断正在进行的外部调用。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

/// 运行级生命周期管理：是否在运行、当前运行的取消令牌
#[derive(Debug)]
pub struct SessionSupervisor {
    running: AtomicBool,
    cancel_token: Mutex<CancellationToken>,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            cancel_token: Mutex::new(CancellationToken::new()),
        }
    }

    /// 尝试占用运行槽位；已有运行时返回 None
    pub fn try_begin(&self) -> Option<CancellationToken> {
        let mut guard = self
            .cancel_token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }
        let token = CancellationToken::new();
        *guard = token.clone();
        Some(token)
    }

    /// 释放运行槽位
    pub fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 请求取消当前运行；空闲时无效果
    pub fn cancel(&self) {
        let guard = self
            .cancel_token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.is_running() {
            guard.cancel();
        }
    }
}

impl Default for SessionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
