//! Navigator：根据任务、计划、历史与当前页面决定下一步动作
//!
//! 保留最近几轮的进度判断作为短期记忆拼入 prompt；reset 时清空，使重规划后从新计划重新开始。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::agent::parse::parse_action;
use crate::agent::prompt::{
    format_history, format_page_state, format_plan, navigator_system_prompt, truncate_chars,
};
use crate::agent::{Action, PageState, RunContext};
use crate::config::NavigatorSection;
use crate::core::AgentError;
use crate::llm::{LlmClient, Message};

/// 短期记忆保留的条数
const MAX_NOTES: usize = 5;
const NOTE_PREVIEW_CHARS: usize = 160;
const HISTORY_PREVIEW_CHARS: usize = 120;

/// 战术导航器
#[async_trait]
pub trait Navigator: Send + Sync {
    /// 针对当前上下文与页面选择下一步动作
    async fn next_action(&self, context: &RunContext, page: &PageState) -> Result<Action, AgentError>;

    /// 清空短期记忆
    fn reset(&self);
}

/// 基于 LLM 的 Navigator
pub struct LlmNavigator {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    limits: NavigatorSection,
    notes: Mutex<VecDeque<String>>,
}

impl LlmNavigator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            system_prompt: navigator_system_prompt(),
            limits: NavigatorSection::default(),
            notes: Mutex::new(VecDeque::new()),
        }
    }

    /// 设置页面 / 历史的截断上限
    pub fn with_limits(mut self, limits: NavigatorSection) -> Self {
        self.limits = limits;
        self
    }

    /// 当前短期记忆（最旧在前）
    pub fn notes(&self) -> Vec<String> {
        self.notes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    fn remember(&self, note: String) {
        let mut notes = self
            .notes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        notes.push_back(note);
        while notes.len() > MAX_NOTES {
            notes.pop_front();
        }
    }

    fn build_prompt(&self, context: &RunContext, page: &PageState) -> String {
        let notes = self.notes();
        let notes_block = if notes.is_empty() {
            String::new()
        } else {
            format!("Your recent notes:\n- {}\n\n", notes.join("\n- "))
        };
        format!(
            "Task: {}\n\nPlan:\n{}\nAction history:\n{}\n\n{}Current page:\n{}\nChoose the next action.",
            context.task,
            format_plan(&context.plan),
            format_history(
                context.history(),
                self.limits.history_window,
                HISTORY_PREVIEW_CHARS
            ),
            notes_block,
            format_page_state(
                page,
                self.limits.max_elements,
                self.limits.max_page_text_chars
            ),
        )
    }
}

#[async_trait]
impl Navigator for LlmNavigator {
    async fn next_action(&self, context: &RunContext, page: &PageState) -> Result<Action, AgentError> {
        let messages = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(self.build_prompt(context, page)),
        ];
        let output = self
            .llm
            .complete(&messages)
            .await
            .map_err(|e| AgentError::Navigation(e.to_string()))?;
        let decision = parse_action(&output).map_err(AgentError::InvalidAction)?;

        let note = match (decision.progress.is_empty(), decision.action.thought.is_empty()) {
            (true, true) => format!("chose {}", decision.action.kind),
            (false, true) => decision.progress.clone(),
            (true, false) => decision.action.thought.clone(),
            (false, false) => format!("{} / {}", decision.progress, decision.action.thought),
        };
        self.remember(truncate_chars(&note, NOTE_PREVIEW_CHARS));
        tracing::debug!(
            action = %decision.action.kind,
            page = %truncate_chars(&decision.page_summary, 80),
            "navigator decided"
        );
        Ok(decision.action)
    }

    fn reset(&self) {
        self.notes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}
