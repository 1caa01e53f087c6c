//! 推理服务抽象
//!
//! 所有后端（OpenAI 兼容端点 / Mock）实现 LlmClient：initialize（加载模型并上报进度）、complete（非流式对话补全）。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// 模型加载进度发送端，取值范围 [0, 1]
pub type ProgressSender = mpsc::UnboundedSender<f32>;

/// 消息角色（与 Chat API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 推理服务错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("Model not initialized")]
    NotInitialized,

    #[error("Failed to load model {model}: {reason}")]
    ModelLoad { model: String, reason: String },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Empty response from model")]
    EmptyResponse,
}

/// LLM 客户端 trait：模型初始化与非流式补全
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 加载（或校验）模型；加载进度通过 progress 发出，发送失败可忽略
    async fn initialize(&self, model_id: &str, progress: ProgressSender) -> Result<(), LlmError>;

    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
