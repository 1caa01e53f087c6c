//! 共享数据模型：Plan、Action、ActionResult、HistoryEntry、RunContext、PageState

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 初次规划失败时使用的兜底计划步骤
pub const FALLBACK_PLAN_STEPS: [&str; 2] = [
    "Analyze the current page and identify elements relevant to the task",
    "Interact with the page to complete the task",
];

/// Planner 产出的策略计划
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub analysis: String,
    pub memory: Vec<String>,
    pub thought: String,
    pub steps: Vec<String>,
    pub success_criteria: String,
}

impl Plan {
    /// 兜底计划：恰好两个通用步骤，保证执行循环总有可执行的内容
    pub fn fallback(task: &str) -> Self {
        Self {
            analysis: format!("Fallback plan for task: {}", task),
            memory: Vec::new(),
            thought: "Planner output was unusable; proceeding with a generic plan".to_string(),
            steps: FALLBACK_PLAN_STEPS.iter().map(|s| s.to_string()).collect(),
            success_criteria: "The task described by the user is completed".to_string(),
        }
    }
}

/// 动作类型（done / fail 为终止动作）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Navigate,
    Click,
    Type,
    Extract,
    Scroll,
    Wait,
    Done,
    Fail,
}

impl ActionKind {
    pub const ALL: [ActionKind; 8] = [
        ActionKind::Navigate,
        ActionKind::Click,
        ActionKind::Type,
        ActionKind::Extract,
        ActionKind::Scroll,
        ActionKind::Wait,
        ActionKind::Done,
        ActionKind::Fail,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Navigate => "navigate",
            ActionKind::Click => "click",
            ActionKind::Type => "type",
            ActionKind::Extract => "extract",
            ActionKind::Scroll => "scroll",
            ActionKind::Wait => "wait",
            ActionKind::Done => "done",
            ActionKind::Fail => "fail",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ActionKind::Done | ActionKind::Fail)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ActionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| format!("unknown action_type '{}'", s))
    }
}

/// Navigator 产出的单个浏览器动作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub params: BTreeMap<String, String>,
    /// Navigator 的推理过程（仅用于日志与历史）
    #[serde(default)]
    pub thought: String,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            params: BTreeMap::new(),
            thought: String::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// 执行单个动作的结果；页面桥接层的任何错误都表示为 Failure，不会向上抛出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionResult {
    Success { data: Option<String> },
    Failure { error: String },
}

impl ActionResult {
    pub fn ok(data: Option<String>) -> Self {
        ActionResult::Success { data }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        ActionResult::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Success { .. })
    }

    /// 成功时为返回数据，失败时为错误信息
    pub fn message(&self) -> Option<&str> {
        match self {
            ActionResult::Success { data } => data.as_deref(),
            ActionResult::Failure { error } => Some(error.as_str()),
        }
    }
}

/// 一次完成的循环迭代
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: Action,
    pub result: ActionResult,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(action: Action, result: ActionResult) -> Self {
        Self {
            action,
            result,
            timestamp: Utc::now(),
        }
    }
}

/// 单次运行的可变上下文：任务、当前计划、历史；由 Executor 独占
#[derive(Debug, Clone)]
pub struct RunContext {
    pub task: String,
    pub plan: Plan,
    history: Vec<HistoryEntry>,
}

impl RunContext {
    pub fn new(task: impl Into<String>, plan: Plan) -> Self {
        Self {
            task: task.into(),
            plan,
            history: Vec::new(),
        }
    }

    /// 重规划只替换计划，历史保留
    pub fn replace_plan(&mut self, plan: Plan) {
        self.plan = plan;
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }
}

/// 页面上的可交互元素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractiveElement {
    pub index: usize,
    pub tag: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub text: String,
    pub selector: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// 每轮循环重新读取的页面快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageState {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub elements: Vec<InteractiveElement>,
    #[serde(default)]
    pub text: String,
}
