//! 模型输出解析：提取 JSON 并按 Plan / Action 结构严格校验
//!
//! 输出可能包在 ```json ... ``` 中或夹带说明文字，先提取第一个 JSON 对象再反序列化；
//! 结构不符（缺字段、类型错误、steps 为空、未知 action_type、嵌套参数）一律拒绝，不做猜测性修补。

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::agent::{Action, ActionKind, Plan};

/// Planner 回复结构
#[derive(Debug, Deserialize, JsonSchema)]
pub struct PlannerResponse {
    #[serde(default)]
    pub current_state: PlannerState,
    pub plan: PlanBody,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct PlannerState {
    /// 对任务与当前局面的分析
    #[serde(default)]
    pub analysis: String,
    /// 需要记住的事实
    #[serde(default)]
    pub memory: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PlanBody {
    /// 总体策略
    #[serde(default)]
    pub thought: String,
    /// 有序的、人类可读的步骤描述，至少一项
    pub steps: Vec<String>,
    /// 如何判断任务完成
    #[serde(default)]
    pub success_criteria: String,
}

/// Navigator 回复结构
#[derive(Debug, Deserialize, JsonSchema)]
pub struct NavigatorResponse {
    #[serde(default)]
    pub current_state: NavigatorState,
    pub action: ActionBody,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct NavigatorState {
    /// 当前页面概述
    #[serde(default)]
    pub page_summary: String,
    /// 与任务相关的元素（索引或描述）
    #[serde(default)]
    pub relevant_elements: Vec<Value>,
    /// 相对计划的进度
    #[serde(default)]
    pub progress: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ActionBody {
    /// 选择该动作的理由
    #[serde(default)]
    pub thought: String,
    /// navigate / click / type / extract / scroll / wait / done / fail
    pub action_type: String,
    /// 动作参数，值为字符串（数字与布尔值按字符串处理）
    #[serde(default)]
    pub parameters: Option<serde_json::Map<String, Value>>,
}

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").ok())
        .as_ref()
}

/// 从模型输出中提取 JSON 对象文本（```json 块优先，其次为首个 `{` 到末个 `}`）
pub fn extract_json(output: &str) -> Option<&str> {
    let trimmed = output.trim();
    if let Some(caps) = fence_regex().and_then(|re| re.captures(trimmed)) {
        return caps.get(1).map(|m| m.as_str());
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&trimmed[start..=end])
}

fn decode<T: for<'de> Deserialize<'de>>(output: &str) -> Result<T, String> {
    let json = extract_json(output).ok_or_else(|| "no JSON object in model output".to_string())?;
    let value: Value = serde_json::from_str(json).map_err(|e| format!("malformed JSON: {}", e))?;
    if !value.is_object() {
        return Err("top-level JSON value must be an object".to_string());
    }
    serde_json::from_value(value).map_err(|e| format!("unexpected shape: {}", e))
}

/// 解析 Planner 输出为 Plan
pub fn parse_plan(output: &str) -> Result<Plan, String> {
    let resp: PlannerResponse = decode(output)?;
    if resp.plan.steps.is_empty() {
        return Err("plan.steps must not be empty".to_string());
    }
    if let Some(i) = resp.plan.steps.iter().position(|s| s.trim().is_empty()) {
        return Err(format!("plan.steps[{}] is blank", i));
    }
    Ok(Plan {
        analysis: resp.current_state.analysis,
        memory: resp.current_state.memory,
        thought: resp.plan.thought,
        steps: resp.plan.steps.into_iter().map(|s| s.trim().to_string()).collect(),
        success_criteria: resp.plan.success_criteria,
    })
}

/// Navigator 输出解析结果：动作与本轮的状态判断
#[derive(Debug, Clone)]
pub struct NavigatorDecision {
    pub action: Action,
    pub page_summary: String,
    pub progress: String,
}

fn scalar_to_string(key: &str, value: Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Array(_) | Value::Object(_) => {
            Err(format!("parameter '{}' must be a scalar value", key))
        }
    }
}

fn require_param(action: &Action, key: &str) -> Result<(), String> {
    match action.param(key) {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(format!("{} action requires parameter '{}'", action.kind, key)),
    }
}

/// 解析 Navigator 输出为动作
pub fn parse_action(output: &str) -> Result<NavigatorDecision, String> {
    let resp: NavigatorResponse = decode(output)?;
    let kind: ActionKind = resp.action.action_type.parse()?;

    let mut params = BTreeMap::new();
    for (key, value) in resp.action.parameters.unwrap_or_default() {
        if let Some(v) = scalar_to_string(&key, value)? {
            params.insert(key, v);
        }
    }

    let action = Action {
        kind,
        params,
        thought: resp.action.thought,
    };
    match kind {
        ActionKind::Navigate => require_param(&action, "url")?,
        ActionKind::Type => require_param(&action, "text")?,
        _ => {}
    }

    Ok(NavigatorDecision {
        action,
        page_summary: resp.current_state.page_summary,
        progress: resp.current_state.progress,
    })
}
