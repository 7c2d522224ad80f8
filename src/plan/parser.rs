//! 模型输出 → Plan
//!
//! 容忍：`<think>` 推理块、```json 代码块、JSON 前后的说明文字、`//` 与 `/* */` 注释、尾逗号。
//! 缺 estimated_steps 取步数，缺 step_id 按位置补，goal 为空时取 JSON 之前的说明文字。
//! 有多个代码块时取最后一个能解析为计划的（前面的往往是格式示例）。
//! 没有 `steps` 字段或 JSON 无法解析都是 PlanError::Parse。

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::core::PlanError;
use crate::plan::{Plan, Step, StepParams};

fn think_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"))
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("valid regex"))
}

#[derive(Deserialize)]
struct RawPlan {
    #[serde(default)]
    goal: String,
    steps: Vec<RawStep>,
    #[serde(default)]
    estimated_steps: Option<usize>,
}

#[derive(Deserialize)]
struct RawStep {
    #[serde(default)]
    step_id: Option<u32>,
    #[serde(default)]
    description: String,
    #[serde(rename = "type", alias = "tool", alias = "tool_type")]
    tool_type: String,
    #[serde(default)]
    params: Option<StepParams>,
}

/// 解析模型原始输出
pub fn parse_plan(raw: &str) -> Result<Plan, PlanError> {
    let text = strip_thinking(raw);
    let (raw_plan, prose) = extract_plan(&text)?;

    let steps: Vec<Step> = raw_plan
        .steps
        .into_iter()
        .enumerate()
        .map(|(i, s)| Step {
            step_id: s.step_id.unwrap_or(i as u32 + 1),
            description: s.description,
            tool_type: s.tool_type.trim().to_string(),
            params: s.params.unwrap_or_default(),
        })
        .collect();

    let mut goal = raw_plan.goal.trim().to_string();
    if goal.is_empty() {
        goal = summarize_prose(prose);
    }

    Ok(Plan {
        goal,
        estimated_steps: raw_plan.estimated_steps.unwrap_or(steps.len()),
        steps,
    })
}

/// 去掉 `<think>…</think>`；只有闭合标签时丢弃其之前的全部内容
fn strip_thinking(raw: &str) -> String {
    let without = think_re().replace_all(raw, "");
    match without.rfind("</think>") {
        Some(pos) => without[pos + "</think>".len()..].to_string(),
        None => without.into_owned(),
    }
}

fn decode(json: &str) -> Result<RawPlan, String> {
    serde_json::from_str(&strip_json_noise(json)).map_err(|e| e.to_string())
}

/// 返回 (计划, JSON 之前的说明文字)
///
/// 代码块从后往前试，第一个能解析的即为结果；都不行时退回首个 `{` 到末个 `}`。
fn extract_plan(text: &str) -> Result<(RawPlan, &str), PlanError> {
    let mut last_error = None;
    let fences: Vec<_> = fence_re().captures_iter(text).collect();
    for caps in fences.iter().rev() {
        let (Some(all), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let body = body.as_str().trim();
        if !body.starts_with('{') {
            continue;
        }
        match decode(body) {
            Ok(plan) => return Ok((plan, &text[..all.start()])),
            Err(e) => {
                last_error.get_or_insert(e);
            }
        }
    }

    let braced = text
        .find('{')
        .zip(text.rfind('}'))
        .filter(|(start, end)| start < end);
    match (braced, last_error) {
        (Some((start, end)), last_error) => match decode(&text[start..=end]) {
            Ok(plan) => Ok((plan, &text[..start])),
            Err(e) => Err(PlanError::Parse(format!(
                "invalid plan JSON: {}",
                last_error.unwrap_or(e)
            ))),
        },
        (None, Some(e)) => Err(PlanError::Parse(format!("invalid plan JSON: {}", e))),
        (None, None) => Err(PlanError::Parse(
            "no JSON object found in model output".to_string(),
        )),
    }
}

/// 去掉字符串之外的注释与尾逗号
fn strip_json_noise(json: &str) -> String {
    let chars: Vec<char> = json.chars().collect();
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// 说明文字压成一行，作为 goal 的兜底
fn summarize_prose(prose: &str) -> String {
    let line = prose
        .split_whitespace()
        .filter(|w| !w.starts_with("```") && !w.starts_with('#'))
        .collect::<Vec<_>>()
        .join(" ");
    let line = line.trim_end_matches(':').trim();
    line.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_json_with_thinking() {
        let raw = r#"<think>user wants infantry positions</think>
Here is the plan:
```json
{
  "goal": "find light infantry positions",
  "steps": [
    {"step_id": 1, "description": "keep away from buildings", "type": "buffer", "params": {"buffer_distance": 200}},
    {"step_id": 2, "description": "gentle slope", "type": "slope", "params": {"max_slope": 15}}
  ],
  "estimated_steps": 2
}
```"#;
        let plan = parse_plan(raw).unwrap();
        assert_eq!(plan.goal, "find light infantry positions");
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[1].params["max_slope"], 15);
    }

    #[test]
    fn test_parse_bare_json_with_comments_and_trailing_commas() {
        let raw = r#"I will filter by elevation first.
{
  // thinking aloud
  "steps": [
    {"description": "elevation", "type": "elevation", "params": {"max_elevation": 400,},},
    /* second */ {"description": "see http://example.com", "type": "vegetation", "params": {"land_cover_types": ["tree"]}},
  ],
}
Hope this helps."#;
        let plan = parse_plan(raw).unwrap();
        assert_eq!(plan.goal, "I will filter by elevation first.");
        assert_eq!(plan.estimated_steps, 2);
        assert_eq!(plan.steps[0].step_id, 1);
        assert_eq!(plan.steps[1].step_id, 2);
        assert_eq!(plan.steps[1].description, "see http://example.com");
    }

    #[test]
    fn test_unclosed_thinking_prefix() {
        let raw = "reasoning without opening tag</think>{\"goal\":\"g\",\"steps\":[{\"type\":\"buffer\"}]}";
        let plan = parse_plan(raw).unwrap();
        assert_eq!(plan.steps[0].tool_type, "buffer");
        assert!(plan.steps[0].params.is_empty());
    }

    #[test]
    fn test_last_parsable_fence_wins_over_format_example() {
        let raw = r#"Example format:
```json
{"goal": "...", "steps": [], "estimated_steps": 0}
```
Actual plan:
```json
{"goal": "gentle terrain", "steps": [{"step_id": 1, "description": "slope", "type": "slope", "params": {"max_slope": 15}}]}
```"#;
        let plan = parse_plan(raw).unwrap();
        assert_eq!(plan.goal, "gentle terrain");
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].tool_type, "slope");
    }

    #[test]
    fn test_broken_last_fence_falls_back_to_earlier_one() {
        let raw = "```json\n{\"goal\": \"g\", \"steps\": [{\"type\": \"buffer\"}]}\n```\n\
                   and a note:\n```json\n{\"steps\": [oops]}\n```";
        let plan = parse_plan(raw).unwrap();
        assert_eq!(plan.steps[0].tool_type, "buffer");
    }

    #[test]
    fn test_missing_steps_is_parse_error() {
        let err = parse_plan(r#"{"goal": "g"}"#).unwrap_err();
        assert!(matches!(err, PlanError::Parse(_)));
        let err = parse_plan("I cannot help with that.").unwrap_err();
        assert!(matches!(err, PlanError::Parse(_)));
    }
}
