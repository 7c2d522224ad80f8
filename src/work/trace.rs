//! 执行记录与执行轨迹
//!
//! 每次执行尝试产生一条 ExecutionTrace；每个已执行步骤追加一条 ExecutionRecord。
//! 失败即停，所以失败记录总是 trace 的最后一条。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{StepError, StepErrorKind};
use crate::plan::{Plan, StepParams};
use crate::tools::ArtifactRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failure,
}

/// 单步执行记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub step_id: u32,
    pub tool_type: String,
    /// 实际使用的参数（含自动注入的链式输入）
    pub params_used: StepParams,
    pub status: StepStatus,
    pub output_artifact: Option<ArtifactRef>,
    pub error_kind: Option<StepErrorKind>,
    pub error_detail: Option<String>,
    pub duration_ms: u64,
}

impl ExecutionRecord {
    pub fn success(
        step_id: u32,
        tool_type: impl Into<String>,
        params_used: StepParams,
        artifact: ArtifactRef,
        duration_ms: u64,
    ) -> Self {
        Self {
            step_id,
            tool_type: tool_type.into(),
            params_used,
            status: StepStatus::Success,
            output_artifact: Some(artifact),
            error_kind: None,
            error_detail: None,
            duration_ms,
        }
    }

    pub fn failure(
        step_id: u32,
        tool_type: impl Into<String>,
        params_used: StepParams,
        error: &StepError,
        duration_ms: u64,
    ) -> Self {
        Self {
            step_id,
            tool_type: tool_type.into(),
            params_used,
            status: StepStatus::Failure,
            output_artifact: None,
            error_kind: Some(error.kind()),
            error_detail: Some(error.to_string()),
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}

/// 一次计划执行尝试的有序记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    /// 第几次执行尝试（从 1 开始，跨重规划递增）
    pub attempt: u32,
    pub records: Vec<ExecutionRecord>,
    /// 在步骤之间观察到取消信号而提前结束
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
}

impl ExecutionTrace {
    pub fn new(attempt: u32) -> Self {
        Self {
            attempt,
            records: Vec::new(),
            cancelled: false,
            started_at: Utc::now(),
        }
    }

    pub fn push(&mut self, record: ExecutionRecord) {
        self.records.push(record);
    }

    pub fn last(&self) -> Option<&ExecutionRecord> {
        self.records.last()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 失败记录（若最后一条为失败）
    pub fn failure(&self) -> Option<&ExecutionRecord> {
        self.last().filter(|r| !r.is_success())
    }

    /// 最后一条为成功且正是计划的最后一步
    pub fn completes(&self, plan: &Plan) -> bool {
        match (self.last(), plan.final_step_id()) {
            (Some(last), Some(final_id)) => {
                !self.cancelled && last.is_success() && last.step_id == final_id
            }
            _ => false,
        }
    }

    pub fn final_artifact(&self) -> Option<&ArtifactRef> {
        self.records
            .iter()
            .rev()
            .find_map(|r| r.output_artifact.as_ref())
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.records.iter().map(|r| r.duration_ms).sum()
    }

    /// 供重规划 prompt 使用的逐步状态摘要
    pub fn to_prompt_section(&self) -> String {
        if self.records.is_empty() {
            return "(plan was not executed)".to_string();
        }
        self.records
            .iter()
            .map(|r| match r.status {
                StepStatus::Success => format!(
                    "- step {} [{}]: success ({} ms)",
                    r.step_id, r.tool_type, r.duration_ms
                ),
                StepStatus::Failure => format!(
                    "- step {} [{}]: FAILURE: {} | params: {}",
                    r.step_id,
                    r.tool_type,
                    r.error_detail.as_deref().unwrap_or("unknown error"),
                    serde_json::to_string(&r.params_used).unwrap_or_default()
                ),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Step;

    fn plan(n: u32) -> Plan {
        Plan {
            goal: "g".into(),
            estimated_steps: n as usize,
            steps: (1..=n)
                .map(|i| Step {
                    step_id: i,
                    description: format!("s{i}"),
                    tool_type: "buffer".into(),
                    params: StepParams::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_completes_requires_final_step_success() {
        let p = plan(2);
        let mut trace = ExecutionTrace::new(1);
        trace.push(ExecutionRecord::success(1, "buffer", StepParams::new(), ArtifactRef::new("a.json"), 3));
        assert!(!trace.completes(&p));
        trace.push(ExecutionRecord::success(2, "buffer", StepParams::new(), ArtifactRef::new("b.json"), 4));
        assert!(trace.completes(&p));
        assert_eq!(trace.final_artifact().unwrap().as_str(), "b.json");
        assert_eq!(trace.total_duration_ms(), 7);
    }

    #[test]
    fn test_failure_is_last_record() {
        let mut trace = ExecutionTrace::new(1);
        trace.push(ExecutionRecord::success(1, "buffer", StepParams::new(), ArtifactRef::new("a.json"), 1));
        trace.push(ExecutionRecord::failure(
            2,
            "slope",
            StepParams::new(),
            &StepError::Execution("raster missing".into()),
            1,
        ));
        let failure = trace.failure().unwrap();
        assert_eq!(failure.step_id, 2);
        assert_eq!(failure.error_kind, Some(StepErrorKind::Execution));
        assert!(trace.to_prompt_section().contains("FAILURE: Tool execution failed: raster missing"));
        assert!(!trace.completes(&plan(2)));
    }

    #[test]
    fn test_empty_trace_prompt() {
        assert_eq!(ExecutionTrace::new(0).to_prompt_section(), "(plan was not executed)");
    }
}
