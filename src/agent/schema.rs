//! Planner / Navigator 回复的 JSON Schema（schemars 自动生成）
//!
//! 拼入 system prompt，让模型按固定结构输出，减少解析失败。

use schemars::schema_for;

use crate::agent::parse::{NavigatorResponse, PlannerResponse};

/// Planner 回复结构的 JSON Schema 字符串
pub fn planner_schema_json() -> String {
    let schema = schema_for!(PlannerResponse);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// Navigator 回复结构的 JSON Schema 字符串
pub fn navigator_schema_json() -> String {
    let schema = schema_for!(NavigatorResponse);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
