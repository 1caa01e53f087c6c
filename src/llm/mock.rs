//! Mock LLM 客户端（用于测试与无模型端点时本地跑通流程）
//!
//! 支持脚本化回复、指定加载失败的模型与加载进度序列；脚本耗尽后按请求类型返回固定的计划 / done 动作。

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, Message, ProgressSender, Role};

const CANNED_PLAN: &str = r#"{"current_state": {"analysis": "Mock analysis", "memory": []}, "plan": {"thought": "Mock plan", "steps": ["Inspect the current page", "Report what was found"], "success_criteria": "The page was inspected"}}"#;

const CANNED_DONE: &str = r#"{"current_state": {"page_summary": "Mock page", "relevant_elements": [], "progress": "finished"}, "action": {"thought": "Nothing left to do", "action_type": "done", "parameters": {"result": "Mock run finished"}}}"#;

/// Mock 客户端：按顺序吐出预设回复
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    failing_models: HashSet<String>,
    fail_all_models: bool,
    progress_steps: Vec<f32>,
    loaded_model: Mutex<Option<String>>,
    last_messages: Mutex<Vec<Message>>,
    calls: AtomicUsize,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预设回复（按调用顺序消费）
    pub fn with_responses<I, S>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for r in responses {
            self.push_response(Ok(r.into()));
        }
        self
    }

    pub fn push_response(&self, response: Result<String, LlmError>) {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(response);
    }

    /// 指定模型加载失败
    pub fn with_failing_model(mut self, model: impl Into<String>) -> Self {
        self.failing_models.insert(model.into());
        self
    }

    /// 所有模型加载失败
    pub fn with_all_models_failing(mut self) -> Self {
        self.fail_all_models = true;
        self
    }

    /// 加载成功时依次上报的进度
    pub fn with_progress(mut self, steps: Vec<f32>) -> Self {
        self.progress_steps = steps;
        self
    }

    /// 最近一次加载成功的模型
    pub fn loaded_model(&self) -> Option<String> {
        self.loaded_model
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// complete 被调用的次数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 最近一次 complete 收到的消息
    pub fn last_messages(&self) -> Vec<Message> {
        self.last_messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn canned_reply(messages: &[Message]) -> String {
        let wants_action = messages
            .iter()
            .any(|m| m.role == Role::System && m.content.contains("action_type"));
        if wants_action {
            CANNED_DONE.to_string()
        } else {
            CANNED_PLAN.to_string()
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn initialize(&self, model_id: &str, progress: ProgressSender) -> Result<(), LlmError> {
        if self.fail_all_models || self.failing_models.contains(model_id) {
            return Err(LlmError::ModelLoad {
                model: model_id.to_string(),
                reason: "mock load failure".to_string(),
            });
        }
        for step in &self.progress_steps {
            let _ = progress.send(*step);
        }
        *self
            .loaded_model
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(model_id.to_string());
        Ok(())
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = messages.to_vec();
        let scripted = self
            .responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        match scripted {
            Some(r) => r,
            None => Ok(Self::canned_reply(messages)),
        }
    }
}
