//! 编排过程事件：交互模式下推送每个计划与重规划原因，自主模式只推送终态

use serde::Serialize;

use crate::core::TaskPhase;
use crate::plan::Plan;
use crate::tools::ArtifactRef;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// 阶段迁移
    PhaseChanged { task_id: String, phase: TaskPhase },
    /// 新计划（首个计划 revision = 1）
    PlanReady {
        task_id: String,
        revision: u32,
        plan: Plan,
    },
    /// 审阅者提交了修改意见
    FeedbackReceived { task_id: String, comment: String },
    /// 一次执行尝试结束
    ExecutionFinished {
        task_id: String,
        attempt: u32,
        succeeded: bool,
        steps_run: usize,
    },
    /// 执行失败，已安排自动重规划
    ReplanScheduled {
        task_id: String,
        attempt: u32,
        max_attempts: u32,
        reason: String,
    },
    Succeeded {
        task_id: String,
        final_artifact: Option<ArtifactRef>,
        replans: u32,
    },
    Failed { task_id: String, error: String },
}

impl OrchestratorEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestratorEvent::Succeeded { .. } | OrchestratorEvent::Failed { .. }
        )
    }
}
