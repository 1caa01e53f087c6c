//! 页面桥接层：读取页面状态、执行单个动作
//!
//! 超时等由具体实现负责；Executor 只关心成功 / 失败。perform_action 永不抛错，页面读取失败由 Executor 降级处理。

#[cfg(feature = "browser")]
pub mod chrome;
pub mod mock;
pub mod restricted;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::agent::{ActionKind, ActionResult, PageState};

#[cfg(feature = "browser")]
pub use chrome::ChromeBridge;
pub use mock::MockPageBridge;
pub use restricted::{degraded_page_state, is_restricted_url};

/// 页面读取错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("No active page")]
    NoActivePage,

    #[error("Page read failed: {0}")]
    Read(String),

    #[error("Bridge timed out after {0} ms")]
    Timeout(u64),
}

/// 页面桥接 trait
#[async_trait]
pub trait PageBridge: Send + Sync {
    /// 读取当前页面状态
    async fn read_page_state(&self) -> Result<PageState, BridgeError>;

    /// 执行一个动作，失败也以 ActionResult::Failure 返回
    async fn perform_action(&self, kind: ActionKind, params: &BTreeMap<String, String>) -> ActionResult;

    /// 当前标签页 URL（无需读取页面内容），用于页面读取失败时的降级提示
    async fn current_url(&self) -> Option<String> {
        None
    }
}
