//! webpilot - 浏览器任务自动化智能体
//!
//! 模块划分：
//! - **agent**: Planner、Navigator、Executor 运行循环与事件协议
//! - **bridge**: 页面桥接（读取页面状态、执行动作；Mock / headless Chrome）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、执行阶段、运行监管
//! - **llm**: 推理服务客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **observability**: 日志初始化

pub mod agent;
pub mod bridge;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;

pub use agent::{Executor, ExecutorConfig, ExecutorEvent};
pub use core::AgentError;
