//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时。execute(tool_name, params) 先解析工具、做执行前校验，
//! 再在超时内调用工具；失败统一转为 StepError，每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::StepError;
use crate::plan::StepParams;
use crate::tools::{Artifact, Tool, ToolRegistry, ValidationMode};

/// 工具执行器：对每次调用施加超时，并将结果映射为 StepError
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行指定工具：未注册 → UnknownTool，校验失败 → Validation，
    /// 工具返回 Err → Execution，超时 → Timeout；输出 JSON 审计日志
    pub async fn execute(&self, tool_name: &str, params: &StepParams) -> Result<Artifact, StepError> {
        let start = Instant::now();
        let result = self.run(tool_name, params).await;

        let (ok, outcome) = match &result {
            Ok(_) => (true, "ok"),
            Err(StepError::Validation(_)) => (false, "invalid"),
            Err(StepError::UnknownTool(_)) => (false, "unknown_tool"),
            Err(StepError::Execution(_)) => (false, "error"),
            Err(StepError::Timeout { .. }) => (false, "timeout"),
            Err(StepError::Dataset(_)) => (false, "dataset"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(params),
        });
        tracing::info!(audit = %audit.to_string(), "tool");
        result
    }

    async fn run(&self, tool_name: &str, params: &StepParams) -> Result<Artifact, StepError> {
        let tool = self
            .get_tool(tool_name)
            .ok_or_else(|| StepError::UnknownTool(tool_name.to_string()))?;
        tool.validate(params, ValidationMode::Execution)
            .map_err(|issues| StepError::Validation(issues.join("; ")))?;

        match timeout(self.timeout, tool.execute(params)).await {
            Ok(Ok(artifact)) => Ok(artifact),
            Ok(Err(e)) => Err(StepError::Execution(e)),
            Err(_) => Err(StepError::Timeout {
                tool: tool_name.to_string(),
                secs: self.timeout.as_secs(),
            }),
        }
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.registry.get(name)
    }
}

fn args_preview(params: &StepParams) -> String {
    let s = serde_json::to_string(params).unwrap_or_default();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ArtifactRef, ParamSpec, ParamType, ToolSchema};
    use async_trait::async_trait;
    use serde_json::json;

    struct Sleepy;

    #[async_trait]
    impl Tool for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "sleepy".into(),
                description: "sleeps".into(),
                params: vec![
                    ParamSpec::new("input", ParamType::String, "input").required(),
                    ParamSpec::new("ms", ParamType::Integer, "sleep").range(0.0, 10_000.0),
                ],
                chained_input: "input".into(),
            }
        }

        async fn execute(&self, params: &StepParams) -> Result<Artifact, String> {
            let ms = params.get("ms").and_then(|v| v.as_u64()).unwrap_or(0);
            if ms == 13 {
                return Err("unlucky".into());
            }
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(Artifact::new(ArtifactRef::new("out.json"), "done"))
        }
    }

    fn executor(timeout_secs: u64) -> ToolExecutor {
        let mut reg = ToolRegistry::new();
        reg.register(Sleepy);
        ToolExecutor::new(Arc::new(reg), timeout_secs)
    }

    fn params(v: serde_json::Value) -> StepParams {
        serde_json::from_value(v).unwrap()
    }

    #[tokio::test]
    async fn test_execute_maps_errors() {
        let ex = executor(5);
        let ok = ex.execute("sleepy", &params(json!({"input": "a", "ms": 0}))).await;
        assert_eq!(ok.unwrap().reference.as_str(), "out.json");

        let err = ex.execute("nope", &StepParams::new()).await.unwrap_err();
        assert_eq!(err, StepError::UnknownTool("nope".into()));

        let err = ex.execute("sleepy", &params(json!({"ms": 0}))).await.unwrap_err();
        assert!(matches!(err, StepError::Validation(_)));

        let err = ex.execute("sleepy", &params(json!({"input": "a", "ms": 13}))).await.unwrap_err();
        assert_eq!(err, StepError::Execution("unlucky".into()));
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let ex = executor(1);
        let err = ex
            .execute("sleepy", &params(json!({"input": "a", "ms": 5000})))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StepError::Timeout {
                tool: "sleepy".into(),
                secs: 1
            }
        );
    }
}
