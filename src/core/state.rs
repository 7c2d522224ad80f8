//! 任务运行状态：阶段、执行模式、重试预算
//!
//! TaskRun 是每个任务独立的值，在 Orchestrator::advance / apply_review 之间传入传出，没有全局状态。

use serde::{Deserialize, Serialize};

use crate::plan::{Feedback, Plan, Task};
use crate::work::ExecutionTrace;

/// 编排阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPhase {
    Planning,
    AwaitingReview,
    Executing,
    Replanning,
    Succeeded,
    Failed,
}

impl TaskPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskPhase::Succeeded | TaskPhase::Failed)
    }
}

/// 交互模式下每个计划都交给审阅者；自主模式直接执行
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Interactive,
    Autonomous,
}

/// 自动重规划预算
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RetryState {
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub last_failure_reason: Option<String>,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt_count: 0,
            max_attempts,
            last_failure_reason: None,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.attempt_count < self.max_attempts
    }

    /// 消耗一次预算
    pub fn record_failure(&mut self, reason: impl Into<String>) {
        self.attempt_count += 1;
        self.last_failure_reason = Some(reason.into());
    }
}

/// 单个任务的运行值
#[derive(Clone, Debug)]
pub struct TaskRun {
    pub task: Task,
    pub mode: ExecutionMode,
    pub phase: TaskPhase,
    /// 当前计划；重规划时整体替换
    pub plan: Option<Plan>,
    pub retry: RetryState,
    /// 每次执行尝试一条 trace
    pub history: Vec<ExecutionTrace>,
    /// 进入 Replanning 时待消费的反馈
    pub pending_feedback: Option<Feedback>,
    /// 已生成的计划数（首个计划为 1）
    pub revision: u32,
}

impl TaskRun {
    pub fn new(task: Task, mode: ExecutionMode, max_attempts: u32) -> Self {
        Self {
            task,
            mode,
            phase: TaskPhase::Planning,
            plan: None,
            retry: RetryState::new(max_attempts),
            history: Vec::new(),
            pending_feedback: None,
            revision: 0,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.mode == ExecutionMode::Interactive
    }

    pub fn last_trace(&self) -> Option<&ExecutionTrace> {
        self.history.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_budget() {
        let mut retry = RetryState::new(3);
        for i in 1..=3 {
            assert!(retry.can_retry());
            retry.record_failure(format!("failure {i}"));
        }
        assert!(!retry.can_retry());
        assert_eq!(retry.attempt_count, 3);
        assert_eq!(retry.last_failure_reason.as_deref(), Some("failure 3"));
    }

    #[test]
    fn test_new_run_starts_planning() {
        let run = TaskRun::new(Task::new("t"), ExecutionMode::Autonomous, 3);
        assert_eq!(run.phase, TaskPhase::Planning);
        assert!(!run.phase.is_terminal());
        assert!(run.plan.is_none());
        assert_eq!(serde_json::to_value(TaskPhase::AwaitingReview).unwrap(), "AWAITING_REVIEW");
    }
}
