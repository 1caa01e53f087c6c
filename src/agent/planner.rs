//! Planner：把任务（重规划时加上失败原因与历史）交给 LLM，解析出结构化计划
//!
//! 推理服务失败为 Planning 错误，输出不符合结构为 InvalidPlan 错误；除最近一次原始输出外不保留跨调用状态。

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::agent::parse::parse_plan;
use crate::agent::prompt::{format_history, format_plan, planner_system_prompt};
use crate::agent::{Plan, RunContext};
use crate::core::AgentError;
use crate::llm::{LlmClient, Message};

/// 重规划时放入 prompt 的历史条数
const REPLAN_HISTORY_WINDOW: usize = 20;
/// 历史中参数与结果的预览长度
const HISTORY_PREVIEW_CHARS: usize = 120;

/// 策略规划器
#[async_trait]
pub trait Planner: Send + Sync {
    /// 为任务生成初始计划
    async fn create_plan(&self, task: &str) -> Result<Plan, AgentError>;

    /// 根据失败原因与已有历史生成新计划
    async fn replan(&self, context: &RunContext, reason: &str) -> Result<Plan, AgentError>;

    /// 丢弃内部缓冲
    fn reset(&self);
}

/// 基于 LLM 的 Planner
pub struct LlmPlanner {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    last_output: Mutex<Option<String>>,
}

impl LlmPlanner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            system_prompt: planner_system_prompt(),
            last_output: Mutex::new(None),
        }
    }

    /// 最近一次模型原始输出（诊断用）
    pub fn last_output(&self) -> Option<String> {
        self.last_output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn request(&self, user_prompt: String) -> Result<Plan, AgentError> {
        let messages = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(user_prompt),
        ];
        let output = self
            .llm
            .complete(&messages)
            .await
            .map_err(|e| AgentError::Planning(e.to_string()))?;
        *self
            .last_output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(output.clone());
        parse_plan(&output).map_err(AgentError::InvalidPlan)
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn create_plan(&self, task: &str) -> Result<Plan, AgentError> {
        let prompt = format!("Task: {}\n\nCreate a plan for this task.", task);
        let plan = self.request(prompt).await?;
        tracing::info!(steps = plan.steps.len(), "plan created");
        Ok(plan)
    }

    async fn replan(&self, context: &RunContext, reason: &str) -> Result<Plan, AgentError> {
        let prompt = format!(
            "Task: {}\n\nThe current plan is not working.\nReason: {}\n\nCurrent plan:\n{}\nAction history:\n{}\n\n\
             Create a NEW plan that avoids the strategy that failed.",
            context.task,
            reason,
            format_plan(&context.plan),
            format_history(context.history(), REPLAN_HISTORY_WINDOW, HISTORY_PREVIEW_CHARS),
        );
        let plan = self.request(prompt).await?;
        tracing::info!(steps = plan.steps.len(), reason = %reason, "plan revised");
        Ok(plan)
    }

    fn reset(&self) {
        self.last_output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }
}
