//! 运行错误类型
//!
//! 与 Executor 的恢复策略对应：可恢复的错误在循环内部吸收，不进入本枚举。
//! 动作失败即 `ActionResult::Failure`，页面读取失败即 `BridgeError`（降级为提示性页面状态）。
//! 致命错误终止本次运行，作为 TASK_FAILED 事件与 execute_task 的 Err 返回。

use thiserror::Error;

/// 任务编排过程中可能出现的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    /// 所有候选模型均加载失败
    #[error("Model initialization failed: {0}")]
    Initialization(String),

    /// Planner 调用推理服务失败
    #[error("Planning failed: {0}")]
    Planning(String),

    /// Planner 输出不符合计划结构（缺少 steps、steps 为空等）
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// Navigator 调用推理服务失败
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Navigator 输出不符合动作结构（未知 action_type、参数非法等）
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Navigator 主动放弃（fail 动作）且重规划次数已用尽
    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Task cancelled by user")]
    Cancelled,

    #[error("Maximum steps exceeded ({0})")]
    StepBudgetExceeded(usize),

    /// 已有任务在运行（单飞约束，调用方的编程错误）
    #[error("A task is already running")]
    AlreadyRunning,

    /// 配置取值非法（如 max_steps 为 0）
    #[error("Config error: {0}")]
    ConfigError(String),
}

impl AgentError {
    /// 是否为 Planner 输出校验失败（初次规划时可用兜底计划替代）
    pub fn is_invalid_plan(&self) -> bool {
        matches!(self, AgentError::InvalidPlan(_))
    }

    /// 是否可通过重规划恢复（Navigator 调用失败或输出非法）
    pub fn is_navigation(&self) -> bool {
        matches!(self, AgentError::Navigation(_) | AgentError::InvalidAction(_))
    }
}
