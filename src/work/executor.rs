//! 计划执行器
//!
//! 按列表顺序逐步执行，不并发。每步：解析工具 → 注入链式输入 → 校验并执行（ToolExecutor）→ 记录。
//! 任一步失败即停，返回（完整或部分的）ExecutionTrace。每步开始前检查取消信号。
//! 执行结束后删除本次产生的中间产物，只保留最后一个成功步骤的产物；
//! 基础数据集和计划里显式给出的输入文件不删。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::core::StepError;
use crate::geo::BaseDataset;
use crate::plan::Plan;
use crate::tools::{ArtifactRef, ToolExecutor};
use crate::work::{resolve_params, ExecutionRecord, ExecutionTrace};

pub struct WorkExecutor {
    tools: ToolExecutor,
    base: Arc<dyn BaseDataset>,
    keep_intermediate: bool,
}

impl WorkExecutor {
    pub fn new(tools: ToolExecutor, base: Arc<dyn BaseDataset>) -> Self {
        Self {
            tools,
            base,
            keep_intermediate: false,
        }
    }

    /// 保留全部中间产物（调试用）
    pub fn keep_intermediate(mut self, keep: bool) -> Self {
        self.keep_intermediate = keep;
        self
    }

    /// 执行整个计划；attempt 为本次执行尝试的序号
    pub async fn execute(
        &self,
        plan: &Plan,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> ExecutionTrace {
        let mut trace = ExecutionTrace::new(attempt);
        let mut prior: Option<ArtifactRef> = None;
        let mut protected: HashSet<ArtifactRef> = HashSet::new();

        for step in &plan.steps {
            if cancel.is_cancelled() {
                tracing::info!(step_id = step.step_id, "execution cancelled before step");
                trace.cancelled = true;
                break;
            }
            let start = Instant::now();

            let Some(tool) = self.tools.get_tool(&step.tool_type) else {
                let err = StepError::UnknownTool(step.tool_type.clone());
                trace.push(ExecutionRecord::failure(
                    step.step_id,
                    &step.tool_type,
                    step.params.clone(),
                    &err,
                    elapsed_ms(start),
                ));
                tracing::warn!(step_id = step.step_id, error = %err, "step failed");
                break;
            };

            let input = match prior.take() {
                Some(artifact) => artifact,
                None => match self.base.artifact().await {
                    Ok(artifact) => {
                        protected.insert(artifact.clone());
                        artifact
                    }
                    Err(e) => {
                        let err = StepError::Dataset(e);
                        trace.push(ExecutionRecord::failure(
                            step.step_id,
                            &step.tool_type,
                            step.params.clone(),
                            &err,
                            elapsed_ms(start),
                        ));
                        tracing::warn!(step_id = step.step_id, error = %err, "base dataset unavailable");
                        break;
                    }
                },
            };
            let chained_input = tool.schema().chained_input;
            if let Some(explicit) = step.params.get(&chained_input).and_then(|v| v.as_str()) {
                if !explicit.trim().is_empty() {
                    protected.insert(ArtifactRef::new(explicit));
                }
            }
            let params = resolve_params(step, &chained_input, &input);

            match self.tools.execute(&step.tool_type, &params).await {
                Ok(artifact) => {
                    tracing::info!(
                        step_id = step.step_id,
                        tool = %step.tool_type,
                        summary = %artifact.summary,
                        "step succeeded"
                    );
                    trace.push(ExecutionRecord::success(
                        step.step_id,
                        &step.tool_type,
                        params,
                        artifact.reference.clone(),
                        elapsed_ms(start),
                    ));
                    prior = Some(artifact.reference);
                }
                Err(err) => {
                    tracing::warn!(step_id = step.step_id, tool = %step.tool_type, error = %err, "step failed");
                    trace.push(ExecutionRecord::failure(
                        step.step_id,
                        &step.tool_type,
                        params,
                        &err,
                        elapsed_ms(start),
                    ));
                    break;
                }
            }
        }
        if !self.keep_intermediate {
            remove_intermediates(&trace, &protected).await;
        }
        trace
    }
}

/// 删除 trace 中除最后一个成功产物之外的输出文件
async fn remove_intermediates(trace: &ExecutionTrace, protected: &HashSet<ArtifactRef>) {
    let keep = trace
        .records
        .iter()
        .rev()
        .find(|r| r.is_success())
        .and_then(|r| r.output_artifact.as_ref());
    let mut seen = HashSet::new();
    for reference in trace.records.iter().filter_map(|r| r.output_artifact.as_ref()) {
        if Some(reference) == keep || protected.contains(reference) || !seen.insert(reference) {
            continue;
        }
        match tokio::fs::remove_file(reference.to_path()).await {
            Ok(()) => tracing::debug!(artifact = %reference, "removed intermediate artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(artifact = %reference, error = %e, "failed to remove intermediate artifact")
            }
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StepErrorKind;
    use crate::geo::{FileDataset, GridDataset, RegionSet, ResultSink};
    use crate::plan::Step;
    use crate::tools::geo_registry;
    use crate::work::StepStatus;
    use serde_json::json;

    fn step(id: u32, tool: &str, params: serde_json::Value) -> Step {
        Step {
            step_id: id,
            description: format!("step {id}"),
            tool_type: tool.into(),
            params: serde_json::from_value(params).unwrap(),
        }
    }

    fn executor(dir: &std::path::Path) -> WorkExecutor {
        let sink = ResultSink::new(dir);
        let tools = ToolExecutor::new(Arc::new(geo_registry(sink.clone())), 10);
        WorkExecutor::new(tools, Arc::new(GridDataset::new(6, 6, 100.0, sink)))
    }

    #[tokio::test]
    async fn test_chains_artifacts_between_steps() {
        let dir = tempfile::tempdir().unwrap();
        let plan = Plan {
            goal: "g".into(),
            estimated_steps: 3,
            steps: vec![
                step(1, "buffer", json!({"buffer_distance": 150})),
                step(2, "elevation_filter_tool", json!({"max_elevation": 500})),
                step(3, "slope", json!({"max_slope": 20})),
            ],
        };
        let trace = executor(dir.path())
            .execute(&plan, 1, &CancellationToken::new())
            .await;
        assert_eq!(trace.records.len(), 3);
        assert!(trace.completes(&plan));
        for pair in trace.records.windows(2) {
            let prev = pair[0].output_artifact.as_ref().unwrap();
            assert_eq!(pair[1].params_used["input_geojson_path"], prev.as_str());
        }
        let out = RegionSet::read(trace.final_artifact().unwrap().to_path()).await.unwrap();
        assert!(out
            .regions
            .iter()
            .all(|r| r.structure_distance_m >= 150.0 && r.elevation_m <= 500.0 && r.slope_deg <= 20.0));
    }

    #[tokio::test]
    async fn test_fail_fast_on_invalid_step() {
        let dir = tempfile::tempdir().unwrap();
        let plan = Plan {
            goal: "g".into(),
            estimated_steps: 3,
            steps: vec![
                step(1, "buffer", json!({"buffer_distance": 150})),
                step(2, "slope", json!({"max_slope": 120})),
                step(3, "vegetation", json!({"land_cover_types": ["grass"]})),
            ],
        };
        let trace = executor(dir.path())
            .execute(&plan, 1, &CancellationToken::new())
            .await;
        assert_eq!(trace.records.len(), 2);
        let failure = trace.failure().unwrap();
        assert_eq!(failure.step_id, 2);
        assert_eq!(failure.status, StepStatus::Failure);
        assert_eq!(failure.error_kind, Some(StepErrorKind::Validation));
    }

    fn file_count(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_intermediate_artifacts_removed_after_each_run() {
        let dir = tempfile::tempdir().unwrap();
        let plan = Plan {
            goal: "g".into(),
            estimated_steps: 3,
            steps: vec![
                step(1, "buffer", json!({"buffer_distance": 150})),
                step(2, "elevation", json!({"max_elevation": 500})),
                step(3, "slope", json!({"max_slope": 20})),
            ],
        };
        let executor = executor(dir.path());
        let mut finals = Vec::new();
        for attempt in 1..=3 {
            let trace = executor.execute(&plan, attempt, &CancellationToken::new()).await;
            assert!(trace.completes(&plan));
            finals.push(trace.final_artifact().unwrap().clone());
        }
        // 基础栅格 + 每次执行的最终产物
        assert_eq!(file_count(dir.path()), 4);
        for reference in &finals {
            assert!(reference.to_path().exists());
        }
    }

    #[tokio::test]
    async fn test_failed_run_keeps_last_successful_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let plan = Plan {
            goal: "g".into(),
            estimated_steps: 3,
            steps: vec![
                step(1, "buffer", json!({"buffer_distance": 150})),
                step(2, "elevation", json!({"max_elevation": 500})),
                step(3, "slope", json!({"max_slope": 120})),
            ],
        };
        let trace = executor(dir.path())
            .execute(&plan, 1, &CancellationToken::new())
            .await;
        assert_eq!(trace.failure().unwrap().step_id, 3);
        let step1 = trace.records[0].output_artifact.as_ref().unwrap();
        let step2 = trace.records[1].output_artifact.as_ref().unwrap();
        assert!(!step1.to_path().exists());
        assert!(step2.to_path().exists());
        assert_eq!(file_count(dir.path()), 2);
    }

    #[tokio::test]
    async fn test_keep_intermediate_leaves_every_output() {
        let dir = tempfile::tempdir().unwrap();
        let plan = Plan {
            goal: "g".into(),
            estimated_steps: 2,
            steps: vec![
                step(1, "buffer", json!({"buffer_distance": 150})),
                step(2, "slope", json!({"max_slope": 20})),
            ],
        };
        let trace = executor(dir.path())
            .keep_intermediate(true)
            .execute(&plan, 1, &CancellationToken::new())
            .await;
        assert!(trace.completes(&plan));
        assert_eq!(file_count(dir.path()), 3);
    }

    #[tokio::test]
    async fn test_missing_base_dataset_is_dataset_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ResultSink::new(dir.path());
        let tools = ToolExecutor::new(Arc::new(geo_registry(sink)), 10);
        let executor = WorkExecutor::new(
            tools,
            Arc::new(FileDataset::new(dir.path().join("missing.json"))),
        );
        let plan = Plan {
            goal: "g".into(),
            estimated_steps: 1,
            steps: vec![step(1, "buffer", json!({"buffer_distance": 150}))],
        };
        let trace = executor.execute(&plan, 1, &CancellationToken::new()).await;
        assert_eq!(trace.failure().unwrap().error_kind, Some(StepErrorKind::Dataset));
    }

    #[tokio::test]
    async fn test_unknown_tool_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let plan = Plan {
            goal: "g".into(),
            estimated_steps: 1,
            steps: vec![step(1, "teleport", json!({}))],
        };
        let trace = executor(dir.path())
            .execute(&plan, 1, &CancellationToken::new())
            .await;
        assert_eq!(trace.failure().unwrap().error_kind, Some(StepErrorKind::UnknownTool));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_step() {
        let dir = tempfile::tempdir().unwrap();
        let plan = Plan {
            goal: "g".into(),
            estimated_steps: 1,
            steps: vec![step(1, "buffer", json!({"buffer_distance": 150}))],
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let trace = executor(dir.path()).execute(&plan, 1, &cancel).await;
        assert!(trace.cancelled);
        assert!(trace.is_empty());
    }
}
