//! 离线 LLM 客户端（无需 API Key）
//!
//! - MockLlmClient：按任务文本中的关键词起草一个合法计划，便于本地跑通 Plan → Execute 流程
//! - ScriptedLlmClient：按顺序返回预置回复，并记录收到的 prompt，供测试断言

use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use crate::llm::{message::last_user_content, LlmClient, Message};

/// Mock 客户端：从最后一条 User 消息中取出任务行，按关键词拼装步骤
#[derive(Debug, Default)]
pub struct MockLlmClient;

fn task_line(prompt: &str) -> &str {
    prompt
        .lines()
        .find_map(|l| l.trim().strip_prefix("Task:"))
        .map(str::trim)
        .unwrap_or(prompt)
}

/// 关键词起草计划（中英文关键词均可命中）；一个都没命中时给出 buffer → elevation → slope
pub fn draft_plan_for(task: &str) -> serde_json::Value {
    let lower = task.to_lowercase();
    let hit = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    let mut steps = Vec::new();
    if hit(&["buffer", "distance", "距离", "缓冲"]) {
        steps.push(("Keep cells away from buildings and roads", "buffer", json!({"buffer_distance": 300})));
    }
    if hit(&["elevation", "altitude", "高程", "海拔"]) {
        steps.push(("Keep cells within the elevation band", "elevation", json!({"min_elevation": 100, "max_elevation": 500})));
    }
    if hit(&["slope", "gradient", "坡度"]) {
        steps.push(("Keep gentle slopes", "slope", json!({"max_slope": 15})));
    }
    if hit(&["vegetation", "forest", "grass", "cover", "植被", "草地", "林地"]) {
        steps.push(("Keep concealing land cover", "vegetation", json!({"land_cover_types": ["tree", "shrub", "grass"]})));
    }
    if steps.is_empty() {
        steps.push(("Keep cells away from buildings and roads", "buffer", json!({"buffer_distance": 300})));
        steps.push(("Keep cells within the elevation band", "elevation", json!({"min_elevation": 100, "max_elevation": 500})));
        steps.push(("Keep gentle slopes", "slope", json!({"max_slope": 15})));
    }

    let steps: Vec<serde_json::Value> = steps
        .into_iter()
        .enumerate()
        .map(|(i, (description, ty, params))| {
            json!({"step_id": i + 1, "description": description, "type": ty, "params": params})
        })
        .collect();
    json!({
        "goal": format!("Candidate sites for: {}", task),
        "estimated_steps": steps.len(),
        "steps": steps,
    })
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let prompt = last_user_content(messages).unwrap_or("(no input)");
        let plan = draft_plan_for(task_line(prompt));
        Ok(format!("```json\n{}\n```", plan))
    }
}

/// 预置脚本客户端：每次 complete 弹出一条回复；脚本耗尽时返回 Err
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// 追加一条失败回复（模拟网络错误等）
    pub async fn push_error(&self, err: impl Into<String>) {
        self.replies.lock().await.push_back(Err(err.into()));
    }

    /// 已收到的全部请求（按调用顺序）
    pub async fn prompts(&self) -> Vec<Vec<Message>> {
        self.prompts.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.prompts.lock().await.len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        self.prompts.lock().await.push(messages.to_vec());
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err("script exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_plan_keywords() {
        let plan = draft_plan_for("find sites with slope under 15 and forest cover");
        let steps = plan["steps"].as_array().unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0]["type"], "slope");
        assert_eq!(steps[1]["type"], "vegetation");
        assert_eq!(steps[1]["step_id"], 2);
    }

    #[test]
    fn test_draft_plan_default_chain() {
        let plan = draft_plan_for("find deployment sites for light infantry");
        assert_eq!(plan["estimated_steps"], 3);
    }

    #[tokio::test]
    async fn test_mock_reads_task_line() {
        let msgs = vec![
            Message::system("instructions"),
            Message::user("Task: keep 200m distance from roads\n\nContext: none"),
        ];
        let out = MockLlmClient.complete(&msgs).await.unwrap();
        assert!(out.contains("\"buffer\""));
        assert!(!out.contains("\"slope\""));
    }

    #[tokio::test]
    async fn test_scripted_client_order_and_exhaustion() {
        let client = ScriptedLlmClient::new(["first", "second"]);
        let msgs = vec![Message::user("hi")];
        assert_eq!(client.complete(&msgs).await.unwrap(), "first");
        assert_eq!(client.complete(&msgs).await.unwrap(), "second");
        assert!(client.complete(&msgs).await.is_err());
        assert_eq!(client.call_count().await, 3);
    }
}
