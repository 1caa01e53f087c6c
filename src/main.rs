//! webpilot - 浏览器任务自动化智能体
//!
//! 用法：`webpilot [--config PATH] [--model ID] <task...>`
//! 事件以 JSON 行输出到 stdout，日志输出到 stderr；Ctrl+C 请求协作式取消。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use webpilot::bridge::PageBridge;
use webpilot::config::{load_config_or_default, AppConfig};
use webpilot::llm::{LlmClient, MockLlmClient, OpenAiClient};
use webpilot::Executor;

const USAGE: &str = "usage: webpilot [--config PATH] [--model ID] <task...>";

#[derive(Debug, Default)]
struct CliArgs {
    config: Option<PathBuf>,
    model: Option<String>,
    task: String,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut words = Vec::new();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => out.config = Some(PathBuf::from(it.next().context("--config needs a path")?)),
            "--model" => out.model = Some(it.next().context("--model needs a model id")?),
            "-h" | "--help" => bail!(USAGE),
            _ => words.push(arg),
        }
    }
    out.task = words.join(" ").trim().to_string();
    if out.task.is_empty() {
        bail!(USAGE);
    }
    Ok(out)
}

/// 配置了端点或 API Key 时用 OpenAI 兼容客户端，否则用 Mock
fn build_llm(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let api_key = cfg.llm.api_key();
    if cfg.llm.base_url.is_some() || api_key.is_some() {
        tracing::info!(base_url = ?cfg.llm.base_url, "using OpenAI-compatible inference service");
        Arc::new(OpenAiClient::new(cfg.llm.base_url.as_deref(), api_key.as_deref()))
    } else {
        tracing::warn!(
            env = %cfg.llm.api_key_env,
            "no inference endpoint or API key configured, using mock LLM"
        );
        Arc::new(MockLlmClient::new())
    }
}

#[cfg(feature = "browser")]
async fn build_bridge(cfg: &AppConfig) -> anyhow::Result<Arc<dyn PageBridge>> {
    let settings = cfg.browser.clone();
    let bridge = tokio::task::spawn_blocking(move || webpilot::bridge::ChromeBridge::launch(settings))
        .await
        .context("Chrome launch task panicked")?
        .context("Failed to start Chrome")?;
    Ok(Arc::new(bridge))
}

#[cfg(not(feature = "browser"))]
async fn build_bridge(_cfg: &AppConfig) -> anyhow::Result<Arc<dyn PageBridge>> {
    tracing::warn!("built without the \"browser\" feature, using mock page bridge");
    Ok(Arc::new(webpilot::bridge::MockPageBridge::new()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    webpilot::observability::init();

    let args = parse_args(std::env::args().skip(1))?;
    let cfg = load_config_or_default(args.config.clone());
    cfg.validate().context("Invalid configuration")?;
    tracing::info!(app = %cfg.app.name, max_steps = cfg.executor.max_steps, "starting");

    let llm = build_llm(&cfg);
    let bridge = build_bridge(&cfg).await?;
    let executor = Arc::new(Executor::from_config(llm, bridge, &cfg));

    let _events = executor.on_event(|event| {
        println!("{}", serde_json::to_string(event)?);
        Ok(())
    });

    let canceller = Arc::clone(&executor);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling task");
            canceller.cancel();
        }
    });

    let result = executor
        .execute_task(&args.task, args.model.as_deref())
        .await
        .context("Task did not complete")?;
    println!("{}", result);
    Ok(())
}
