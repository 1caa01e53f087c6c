//! Headless Chrome 页面桥接
//!
//! 需启用 feature "browser" 且系统已安装 Chrome/Chromium。headless_chrome 为同步 API，所有调用放在 spawn_blocking 中。
//! 快照脚本给每个可交互元素打上 `data-webpilot-index` 属性，click / type 通过该属性定位元素。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Deserialize;

use crate::agent::prompt::truncate_chars;
use crate::agent::{ActionKind, ActionResult, InteractiveElement, PageState};
use crate::bridge::{BridgeError, PageBridge};
use crate::config::BrowserSection;

/// wait 动作的上限
const MAX_WAIT_MS: u64 = 10_000;
const SCROLL_PIXELS: i64 = 600;

const SNAPSHOT_JS: &str = r#"
(function(maxElements, maxText) {
    const selector = 'a[href], button, input, select, textarea, [role="button"], [role="link"], [role="textbox"], [role="searchbox"], [onclick], [contenteditable="true"]';
    document.querySelectorAll('[data-webpilot-index]').forEach(el => el.removeAttribute('data-webpilot-index'));
    const elements = [];
    for (const el of document.querySelectorAll(selector)) {
        if (elements.length >= maxElements) break;
        const rect = el.getBoundingClientRect();
        const style = window.getComputedStyle(el);
        if (rect.width === 0 || rect.height === 0 || style.visibility === 'hidden' || style.display === 'none') continue;
        const index = elements.length;
        el.setAttribute('data-webpilot-index', String(index));
        const attributes = {};
        for (const name of ['id', 'name', 'href', 'placeholder', 'aria-label', 'title', 'value', 'role']) {
            const v = el.getAttribute(name);
            if (v) attributes[name] = v.substring(0, 200);
        }
        elements.push({
            index: index,
            tag: el.tagName.toLowerCase(),
            subtype: el.getAttribute('type'),
            text: (el.innerText || el.value || '').trim().substring(0, 200),
            selector: '[data-webpilot-index="' + index + '"]',
            attributes: attributes
        });
    }
    const text = document.body ? document.body.innerText.substring(0, maxText) : '';
    return JSON.stringify({ title: document.title, elements: elements, text: text });
})"#;

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(default)]
    title: String,
    #[serde(default)]
    elements: Vec<InteractiveElement>,
    #[serde(default)]
    text: String,
}

/// 驱动单个 Chrome 标签页的桥接
pub struct ChromeBridge {
    // 持有 Browser 以保持进程存活
    _browser: Browser,
    tab: Arc<Tab>,
    settings: BrowserSection,
}

impl ChromeBridge {
    /// 启动浏览器并打开一个标签页（阻塞调用，异步上下文中请放进 spawn_blocking）
    pub fn launch(settings: BrowserSection) -> Result<Self, BridgeError> {
        let options = LaunchOptions::default_builder()
            .headless(settings.headless)
            .build()
            .map_err(|e| BridgeError::Read(format!("Chrome options invalid: {}", e)))?;
        let browser = Browser::new(options)
            .map_err(|e| BridgeError::Read(format!("Chrome launch failed: {}. Install Chrome/Chromium.", e)))?;
        let tab = browser
            .new_tab()
            .map_err(|e| BridgeError::Read(format!("Browser tab failed: {}", e)))?;
        tab.set_default_timeout(Duration::from_secs(settings.navigation_timeout_secs));
        tracing::info!(headless = settings.headless, "chrome bridge ready");
        Ok(Self {
            _browser: browser,
            tab,
            settings,
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, String>
    where
        F: FnOnce(Arc<Tab>) -> Result<T, String> + Send + 'static,
        T: Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(tab))
            .await
            .map_err(|e| format!("Task join: {}", e))?
    }

    /// index 优先，其次 selector
    fn target_selector(params: &BTreeMap<String, String>) -> Result<String, String> {
        if let Some(index) = params.get("index") {
            let index: usize = index
                .trim()
                .parse()
                .map_err(|_| format!("Invalid element index '{}'", index))?;
            return Ok(format!("[data-webpilot-index=\"{}\"]", index));
        }
        params
            .get("selector")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Missing index or selector".to_string())
    }

    async fn run_action(&self, kind: ActionKind, params: &BTreeMap<String, String>) -> Result<Option<String>, String> {
        match kind {
            ActionKind::Navigate => {
                let url = normalize_url(params.get("url").map(String::as_str).unwrap_or(""))?;
                tracing::info!(url = %url, "browser navigate");
                self.blocking(move |tab| {
                    tab.navigate_to(&url)
                        .map_err(|e| format!("Navigate failed: {}", e))?
                        .wait_until_navigated()
                        .map_err(|e| format!("Page load failed: {}", e))?;
                    Ok(Some(format!("Navigated to {}", url)))
                })
                .await
            }
            ActionKind::Click => {
                let selector = Self::target_selector(params)?;
                self.blocking(move |tab| {
                    let element = tab
                        .find_element(&selector)
                        .map_err(|e| format!("Element not found ({}): {}", selector, e))?;
                    element.click().map_err(|e| format!("Click failed: {}", e))?;
                    Ok(Some(format!("Clicked {}", selector)))
                })
                .await
            }
            ActionKind::Type => {
                let selector = Self::target_selector(params)?;
                let text = params.get("text").cloned().unwrap_or_default();
                let submit = params
                    .get("submit")
                    .map(|v| v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false);
                self.blocking(move |tab| {
                    let element = tab
                        .find_element(&selector)
                        .map_err(|e| format!("Element not found ({}): {}", selector, e))?;
                    element
                        .type_into(&text)
                        .map_err(|e| format!("Type failed: {}", e))?;
                    if submit {
                        tab.press_key("Enter")
                            .map_err(|e| format!("Submit failed: {}", e))?;
                    }
                    Ok(Some(format!("Typed \"{}\" into {}", text, selector)))
                })
                .await
            }
            ActionKind::Extract => {
                let selector = params
                    .get("selector")
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "body".to_string());
                let max_chars = self.settings.page_text_chars;
                self.blocking(move |tab| {
                    let text = tab
                        .find_element(&selector)
                        .map_err(|e| format!("Element not found ({}): {}", selector, e))?
                        .get_inner_text()
                        .map_err(|e| format!("Get text failed: {}", e))?;
                    Ok(Some(truncate_chars(text.trim(), max_chars)))
                })
                .await
            }
            ActionKind::Scroll => {
                let up = params
                    .get("direction")
                    .map(|d| d.eq_ignore_ascii_case("up"))
                    .unwrap_or(false);
                let amount = if up { -SCROLL_PIXELS } else { SCROLL_PIXELS };
                self.blocking(move |tab| {
                    tab.evaluate(&format!("window.scrollBy(0, {})", amount), false)
                        .map_err(|e| format!("Scroll failed: {}", e))?;
                    Ok(Some(format!("Scrolled {}", if up { "up" } else { "down" })))
                })
                .await
            }
            ActionKind::Wait => {
                let ms = params
                    .get("ms")
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .unwrap_or(1000)
                    .min(MAX_WAIT_MS);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(Some(format!("Waited {} ms", ms)))
            }
            ActionKind::Done | ActionKind::Fail => Ok(None),
        }
    }
}

/// 标签页尚未加载任何页面时 URL 为空
fn active_url(url: String) -> Result<String, BridgeError> {
    if url.trim().is_empty() {
        Err(BridgeError::NoActivePage)
    } else {
        Ok(url)
    }
}

/// 给阻塞调用加上时限，超时映射为 BridgeError::Timeout
async fn with_deadline<T, F>(limit: Duration, fut: F) -> Result<T, BridgeError>
where
    F: std::future::Future<Output = Result<T, String>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(BridgeError::Read),
        Err(_) => Err(BridgeError::Timeout(limit.as_millis() as u64)),
    }
}

/// 补全协议头；拒绝空 URL
fn normalize_url(raw: &str) -> Result<String, String> {
    let url = raw.trim();
    if url.is_empty() {
        return Err("Missing url".to_string());
    }
    if url.contains("://") || url.starts_with("about:") {
        Ok(url.to_string())
    } else {
        Ok(format!("https://{}", url))
    }
}

#[async_trait]
impl PageBridge for ChromeBridge {
    async fn read_page_state(&self) -> Result<PageState, BridgeError> {
        let js = format!(
            "{}({}, {})",
            SNAPSHOT_JS, self.settings.max_elements, self.settings.page_text_chars
        );
        let limit = Duration::from_secs(self.settings.navigation_timeout_secs);
        let (url, raw) = with_deadline(
            limit,
            self.blocking(move |tab| {
                let url = tab.get_url();
                let value = tab
                    .evaluate(&js, false)
                    .map_err(|e| format!("Snapshot script failed: {}", e))?
                    .value;
                Ok((url, value))
            }),
        )
        .await?;
        let url = active_url(url)?;

        let raw = match raw {
            Some(serde_json::Value::String(s)) => s,
            _ => return Err(BridgeError::Read("snapshot returned no data".to_string())),
        };
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .map_err(|e| BridgeError::Read(format!("snapshot malformed: {}", e)))?;
        tracing::debug!(url = %url, elements = snapshot.elements.len(), "page snapshot");
        Ok(PageState {
            url,
            title: snapshot.title,
            elements: snapshot.elements,
            text: snapshot.text,
        })
    }

    async fn perform_action(&self, kind: ActionKind, params: &BTreeMap<String, String>) -> ActionResult {
        match self.run_action(kind, params).await {
            Ok(data) => ActionResult::ok(data),
            Err(e) => ActionResult::failed(e),
        }
    }

    async fn current_url(&self) -> Option<String> {
        self.blocking(|tab| Ok(tab.get_url()))
            .await
            .ok()
            .and_then(|url| active_url(url).ok())
    }
}
