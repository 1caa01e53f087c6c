//! Prompt 拼装：系统提示词、计划 / 历史 / 页面状态的文本表示

use crate::agent::schema::{navigator_schema_json, planner_schema_json};
use crate::agent::{HistoryEntry, PageState, Plan};

const PLANNER_INSTRUCTIONS: &str = r#"You are the planning component of a browser automation agent.
Break the user's web task into a short ordered list of concrete, human-readable steps that a
navigator can carry out with these browser actions: navigate, click, type, extract, scroll, wait.

Rules:
1. Reply with ONE JSON object only. No markdown, no explanation outside the JSON.
2. "plan.steps" must contain at least one step; keep it between 2 and 8 steps.
3. Record facts worth remembering (names, values, URLs) in "current_state.memory".
4. When asked to re-plan, do NOT repeat the strategy that failed; use the action history."#;

const NAVIGATOR_INSTRUCTIONS: &str = r#"You are the navigation component of a browser automation agent.
Given the task, the current plan, the action history and the current page, choose exactly ONE next action.

Available action_type values and parameters:
- navigate: {"url": "https://..."}
- click: {"index": "<element index>"} or {"selector": "<css selector>"}
- type: {"index": "<element index>", "text": "...", "submit": "true|false"}
- extract: {"selector": "<css selector, optional>", "label": "..."}
- scroll: {"direction": "down|up"}
- wait: {"ms": "1000"}
- done: {"result": "final answer or summary for the user"}
- fail: {"reason": "why the current plan cannot work"}

Rules:
1. Reply with ONE JSON object only. No markdown, no explanation outside the JSON.
2. Use element indexes from the page listing; never invent elements.
3. Use done as soon as the success criteria are met. Use fail only when the plan is clearly unworkable."#;

/// Planner 系统提示词（含回复结构 Schema）
pub fn planner_system_prompt() -> String {
    format!(
        "{}\n\nReply schema:\n{}",
        PLANNER_INSTRUCTIONS,
        planner_schema_json()
    )
}

/// Navigator 系统提示词（含回复结构 Schema）
pub fn navigator_system_prompt() -> String {
    format!(
        "{}\n\nReply schema:\n{}",
        NAVIGATOR_INSTRUCTIONS,
        navigator_schema_json()
    )
}

/// 按字符截断，超出时追加 "..."
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let preview: String = text.chars().take(max_chars).collect();
    format!("{}...", preview)
}

pub fn format_plan(plan: &Plan) -> String {
    let mut out = String::new();
    if !plan.thought.is_empty() {
        out.push_str(&format!("Strategy: {}\n", plan.thought));
    }
    for (i, step) in plan.steps.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, step));
    }
    if !plan.success_criteria.is_empty() {
        out.push_str(&format!("Success criteria: {}\n", plan.success_criteria));
    }
    if !plan.memory.is_empty() {
        out.push_str(&format!("Remembered facts: {}\n", plan.memory.join("; ")));
    }
    out
}

/// 历史的文本表示，只保留最近 window 条（序号保持全局编号）
pub fn format_history(history: &[HistoryEntry], window: usize, preview_chars: usize) -> String {
    if history.is_empty() {
        return "(no actions taken yet)".to_string();
    }
    let skip = history.len().saturating_sub(window);
    history
        .iter()
        .enumerate()
        .skip(skip)
        .map(|(i, entry)| {
            let params = entry
                .action
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", k, truncate_chars(v, preview_chars)))
                .collect::<Vec<_>>()
                .join(", ");
            let outcome = match entry.result.message() {
                Some(msg) if entry.result.is_success() => {
                    format!("ok: {}", truncate_chars(msg, preview_chars))
                }
                Some(msg) => format!("FAILED: {}", truncate_chars(msg, preview_chars)),
                None => "ok".to_string(),
            };
            format!("{}. {}({}) -> {}", i + 1, entry.action.kind, params, outcome)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 页面状态的文本表示：元素与正文均有上限
pub fn format_page_state(page: &PageState, max_elements: usize, max_text_chars: usize) -> String {
    let mut out = format!("URL: {}\nTitle: {}\n", page.url, page.title);
    if page.elements.is_empty() {
        out.push_str("Interactive elements: (none)\n");
    } else {
        out.push_str("Interactive elements:\n");
        for el in page.elements.iter().take(max_elements) {
            let subtype = el
                .subtype
                .as_deref()
                .map(|s| format!(" type={}", s))
                .unwrap_or_default();
            let attrs = el
                .attributes
                .iter()
                .map(|(k, v)| format!(" {}=\"{}\"", k, truncate_chars(v, 40)))
                .collect::<String>();
            out.push_str(&format!(
                "[{}] <{}{}{}> \"{}\"\n",
                el.index,
                el.tag,
                subtype,
                attrs,
                truncate_chars(el.text.trim(), 80)
            ));
        }
        if page.elements.len() > max_elements {
            out.push_str(&format!(
                "... {} more elements not shown\n",
                page.elements.len() - max_elements
            ));
        }
    }
    if !page.text.trim().is_empty() {
        out.push_str(&format!(
            "Page text:\n{}\n",
            truncate_chars(page.text.trim(), max_text_chars)
        ));
    }
    out
}
