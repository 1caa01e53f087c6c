//! Mock 页面桥接（用于测试与无浏览器时本地跑通流程）
//!
//! 页面状态与动作结果均可脚本化；记录所有执行过的动作。

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::agent::{ActionKind, ActionResult, PageState};
use crate::bridge::{BridgeError, PageBridge};

/// Mock 页面桥接
#[derive(Debug, Default)]
pub struct MockPageBridge {
    pages: Mutex<VecDeque<Result<PageState, BridgeError>>>,
    results: Mutex<VecDeque<ActionResult>>,
    performed: Mutex<Vec<(ActionKind, BTreeMap<String, String>)>>,
    current_url: Mutex<Option<String>>,
}

impl MockPageBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一次页面读取结果；脚本耗尽后返回 about:blank 的空白页
    pub fn push_page(&self, page: Result<PageState, BridgeError>) {
        self.pages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(page);
    }

    /// 追加一次动作结果；脚本耗尽后动作一律成功
    pub fn push_result(&self, result: ActionResult) {
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(result);
    }

    pub fn set_current_url(&self, url: impl Into<String>) {
        *self
            .current_url
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(url.into());
    }

    fn url(&self) -> Option<String> {
        self.current_url
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// 已执行的动作（按顺序）
    pub fn performed(&self) -> Vec<(ActionKind, BTreeMap<String, String>)> {
        self.performed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl PageBridge for MockPageBridge {
    async fn read_page_state(&self) -> Result<PageState, BridgeError> {
        let scripted = self
            .pages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        scripted.unwrap_or_else(|| {
            Ok(PageState {
                url: self.url().unwrap_or_else(|| "about:blank".to_string()),
                title: "Blank".to_string(),
                elements: Vec::new(),
                text: String::new(),
            })
        })
    }

    async fn perform_action(&self, kind: ActionKind, params: &BTreeMap<String, String>) -> ActionResult {
        self.performed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((kind, params.clone()));
        if kind == ActionKind::Navigate {
            if let Some(url) = params.get("url") {
                self.set_current_url(url.clone());
            }
        }
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or_else(|| ActionResult::ok(None))
    }

    async fn current_url(&self) -> Option<String> {
        self.url()
    }
}
