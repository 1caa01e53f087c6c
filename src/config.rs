//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WEBPILOT__*` 覆盖（双下划线表示嵌套，如 `WEBPILOT__EXECUTOR__MAX_STEPS=20`）。
//! `WEBPILOT__LLM__FALLBACK_MODELS` 以逗号分隔。

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::AgentError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub executor: ExecutorSection,
    pub navigator: NavigatorSection,
    pub browser: BrowserSection,
}

impl AppConfig {
    /// 校验反序列化无法表达的约束
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.executor.max_steps == 0 {
            return Err(AgentError::ConfigError(
                "executor.max_steps must be at least 1".to_string(),
            ));
        }
        if self.executor.failure_threshold == 0 {
            return Err(AgentError::ConfigError(
                "executor.failure_threshold must be at least 1".to_string(),
            ));
        }
        let has_model = std::iter::once(&self.llm.model)
            .chain(self.llm.fallback_models.iter())
            .any(|m| !m.trim().is_empty());
        if !has_model {
            return Err(AgentError::ConfigError(
                "llm.model or llm.fallback_models must name a model".to_string(),
            ));
        }
        Ok(())
    }
}

/// [app] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "webpilot".to_string(),
        }
    }
}

/// [llm] 段：模型与 OpenAI 兼容端点
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 默认（推荐）模型
    pub model: String,
    /// 加载失败时依次尝试的备选模型
    pub fallback_models: Vec<String>,
    /// OpenAI 兼容端点，如本地推理服务 http://localhost:8000/v1
    pub base_url: Option<String>,
    /// 读取 API Key 的环境变量名
    pub api_key_env: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: "Qwen2.5-1.5B-Instruct".to_string(),
            fallback_models: vec![
                "Qwen2.5-0.5B-Instruct".to_string(),
                "Llama-3.2-1B-Instruct".to_string(),
            ],
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl LlmSection {
    /// 从 api_key_env 指定的环境变量读取 Key（空值视为未设置）
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// [executor] 段：步数、重规划与连续失败阈值
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutorSection {
    pub max_steps: usize,
    pub max_replans: usize,
    /// 连续失败多少次后强制重规划
    pub failure_threshold: usize,
    /// STEP_RESULT 中 data 的最大字符数
    pub result_preview_chars: usize,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            max_steps: 15,
            max_replans: 2,
            failure_threshold: 3,
            result_preview_chars: 200,
        }
    }
}

/// [navigator] 段：prompt 中页面与历史的上限
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct NavigatorSection {
    pub max_elements: usize,
    pub max_page_text_chars: usize,
    /// 放入 prompt 的最近历史条数
    pub history_window: usize,
}

impl Default for NavigatorSection {
    fn default() -> Self {
        Self {
            max_elements: 60,
            max_page_text_chars: 2000,
            history_window: 10,
        }
    }
}

/// [browser] 段：仅 Chrome 桥接使用
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrowserSection {
    pub headless: bool,
    /// 页面正文摘录的最大字符数
    pub page_text_chars: usize,
    /// 快照中最多收集的可交互元素数
    pub max_elements: usize,
    /// 导航等待超时（秒）
    pub navigation_timeout_secs: u64,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            headless: true,
            page_text_chars: 4000,
            max_elements: 100,
            navigation_timeout_secs: 30,
        }
    }
}

/// 从 config 目录加载配置，环境变量 WEBPILOT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WEBPILOT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        if Path::new(&format!("{}.toml", name)).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignoring");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WEBPILOT")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("llm.fallback_models")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

/// 加载失败时记录警告并回退到默认配置
pub fn load_config_or_default(config_path: Option<PathBuf>) -> AppConfig {
    match load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            AppConfig::default()
        }
    }
}
