//! 浏览器任务智能体：Planner（策略）、Navigator（战术）、Executor（编排与事件）

pub mod events;
pub mod executor;
pub mod navigator;
pub mod parse;
pub mod planner;
pub mod prompt;
pub mod schema;
pub mod types;

pub use events::{EventBus, ExecutorEvent, Subscription};
pub use executor::{Executor, ExecutorConfig, DEFAULT_SUCCESS_MESSAGE};
pub use navigator::{LlmNavigator, Navigator};
pub use parse::{extract_json, parse_action, parse_plan, NavigatorDecision};
pub use planner::{LlmPlanner, Planner};
pub use types::{
    Action, ActionKind, ActionResult, HistoryEntry, InteractiveElement, PageState, Plan,
    RunContext, FALLBACK_PLAN_STEPS,
};
