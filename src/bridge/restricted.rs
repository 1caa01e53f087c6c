//! 受限页面识别与降级页面状态
//!
//! 浏览器内部页（chrome://、about: 等）无法注入脚本读取内容；读取失败时用提示文本替代页面内容，循环继续。

use crate::agent::PageState;

const RESTRICTED_PREFIXES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "chrome-search://",
    "edge://",
    "about:",
    "devtools://",
    "view-source:",
    "moz-extension://",
    "brave://",
    "opera://",
    "vivaldi://",
    "https://chrome.google.com/webstore",
    "https://chromewebstore.google.com",
];

const RESTRICTED_HINT: &str = "This is a restricted browser page whose content cannot be read or automated. \
Navigate to a regular web page (http:// or https://) to continue the task.";

const UNAVAILABLE_HINT: &str = "Page content is not available right now. The page may still be loading \
or block scripted access; consider waiting or navigating to another page.";

/// URL 是否属于浏览器内部 / 受限页
pub fn is_restricted_url(url: &str) -> bool {
    let url = url.trim().to_ascii_lowercase();
    RESTRICTED_PREFIXES.iter().any(|p| url.starts_with(p))
}

/// 页面读取失败时的降级页面状态
pub fn degraded_page_state(url: Option<String>) -> PageState {
    let url = url.unwrap_or_default();
    let (title, text) = if is_restricted_url(&url) {
        ("Restricted page", RESTRICTED_HINT)
    } else {
        ("Content not available", UNAVAILABLE_HINT)
    };
    PageState {
        url,
        title: title.to_string(),
        elements: Vec::new(),
        text: text.to_string(),
    }
}
