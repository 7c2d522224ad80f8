//! 主控状态机：PLANNING → (AWAITING_REVIEW) → EXECUTING → {SUCCEEDED, REPLANNING, FAILED}
//!
//! 每个任务一个 TaskRun 值，advance / apply_review 接收并返回它。
//! 执行失败且预算未用尽时自动重规划（新计划从第 1 步重新执行）；预算用尽后再次失败即 RetryBudgetExhausted。
//! 审阅意见触发的重规划不消耗预算。规划/重规划的解析或校验错误立即终止任务。

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::{
    ExecutionMode, OrchestratorError, OrchestratorEvent, PlanError, RecoveryEngine, TaskPhase,
    TaskRun,
};
use crate::plan::{Feedback, Plan, PlanModule, ReplanModule, Task};
use crate::retrieval::RetrievalContextProvider;
use crate::tools::ArtifactRef;
use crate::work::{ExecutionTrace, WorkExecutor};

/// 默认自动重规划次数
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// 审阅结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Comment(String),
}

/// 交互模式下的计划审阅者
#[async_trait]
pub trait PlanReviewer: Send + Sync {
    async fn review(&self, task: &Task, plan: &Plan, revision: u32) -> ReviewDecision;
}

/// 总是批准
#[derive(Debug, Default)]
pub struct AutoApprove;

#[async_trait]
impl PlanReviewer for AutoApprove {
    async fn review(&self, _task: &Task, _plan: &Plan, _revision: u32) -> ReviewDecision {
        ReviewDecision::Approve
    }
}

/// 成功结束的任务
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub task_id: String,
    pub plan: Plan,
    pub final_artifact: Option<ArtifactRef>,
    /// 消耗的自动重规划次数
    pub replans: u32,
    pub history: Vec<ExecutionTrace>,
}

pub struct Orchestrator {
    planner: PlanModule,
    replanner: ReplanModule,
    executor: WorkExecutor,
    retrieval: RetrievalContextProvider,
    recovery: RecoveryEngine,
    max_attempts: u32,
    events: Option<mpsc::UnboundedSender<OrchestratorEvent>>,
}

impl Orchestrator {
    pub fn new(
        planner: PlanModule,
        replanner: ReplanModule,
        executor: WorkExecutor,
        retrieval: RetrievalContextProvider,
        max_attempts: u32,
    ) -> Self {
        Self {
            planner,
            replanner,
            executor,
            retrieval,
            recovery: RecoveryEngine::new(),
            max_attempts,
            events: None,
        }
    }

    /// 订阅编排事件
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<OrchestratorEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// 自主模式只推送终态事件
    fn emit(&self, run: &TaskRun, event: OrchestratorEvent) {
        if !run.is_interactive() && !event.is_terminal() {
            return;
        }
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn transition(&self, run: &mut TaskRun, phase: TaskPhase) {
        tracing::info!(task_id = %run.task.id(), from = ?run.phase, to = ?phase, "phase transition");
        run.phase = phase;
        let event = OrchestratorEvent::PhaseChanged {
            task_id: run.task.id().to_string(),
            phase,
        };
        self.emit(run, event);
    }

    pub fn start(&self, task: Task, mode: ExecutionMode) -> TaskRun {
        tracing::info!(task_id = %task.id(), mode = ?mode, "task started");
        TaskRun::new(task, mode, self.max_attempts)
    }

    /// 计划生成后：交互模式进入审阅，自主模式直接执行
    fn accept_plan(&self, run: &mut TaskRun, plan: Plan) {
        run.revision += 1;
        run.plan = Some(plan.clone());
        self.emit(
            run,
            OrchestratorEvent::PlanReady {
                task_id: run.task.id().to_string(),
                revision: run.revision,
                plan,
            },
        );
        let next = match run.mode {
            ExecutionMode::Interactive => TaskPhase::AwaitingReview,
            ExecutionMode::Autonomous => TaskPhase::Executing,
        };
        self.transition(run, next);
    }

    fn plan_failed(&self, mut run: TaskRun, err: PlanError) -> OrchestratorError {
        match err {
            PlanError::Cancelled => OrchestratorError::Cancelled {
                history: run.history,
            },
            other => {
                tracing::error!(task_id = %run.task.id(), error = %other, "planning failed");
                self.transition(&mut run, TaskPhase::Failed);
                OrchestratorError::Plan(other)
            }
        }
    }

    /// 推进一个非审阅阶段
    pub async fn advance(
        &self,
        mut run: TaskRun,
        cancel: &CancellationToken,
    ) -> Result<TaskRun, OrchestratorError> {
        match run.phase {
            TaskPhase::Planning => {
                match self.planner.generate_plan(&run.task, cancel).await {
                    Ok(plan) => self.accept_plan(&mut run, plan),
                    Err(e) => return Err(self.plan_failed(run, e)),
                }
                Ok(run)
            }
            TaskPhase::Executing => self.execute_current(run, cancel).await,
            TaskPhase::Replanning => {
                let feedback = run.pending_feedback.take().ok_or_else(|| {
                    OrchestratorError::InvalidTransition("replanning without feedback".to_string())
                })?;
                let prior = run.plan.clone().ok_or_else(|| {
                    OrchestratorError::InvalidTransition("replanning without a prior plan".to_string())
                })?;
                // 审阅意见针对的是尚未执行的当前计划
                let trace = match &feedback {
                    Feedback::AutomaticFailure(_) => run
                        .last_trace()
                        .cloned()
                        .unwrap_or_else(|| ExecutionTrace::new(0)),
                    Feedback::UserComment(_) => ExecutionTrace::new(0),
                };
                match self
                    .replanner
                    .replan(&run.task, &prior, &trace, &feedback, cancel)
                    .await
                {
                    Ok(plan) => self.accept_plan(&mut run, plan),
                    Err(e) => return Err(self.plan_failed(run, e)),
                }
                Ok(run)
            }
            TaskPhase::AwaitingReview => Err(OrchestratorError::InvalidTransition(
                "plan is awaiting review; call apply_review".to_string(),
            )),
            TaskPhase::Succeeded | TaskPhase::Failed => Err(OrchestratorError::InvalidTransition(
                format!("task already finished ({:?})", run.phase),
            )),
        }
    }

    async fn execute_current(
        &self,
        mut run: TaskRun,
        cancel: &CancellationToken,
    ) -> Result<TaskRun, OrchestratorError> {
        let plan = run.plan.clone().ok_or_else(|| {
            OrchestratorError::InvalidTransition("executing without a plan".to_string())
        })?;
        let attempt = run.history.len() as u32 + 1;
        let trace = self.executor.execute(&plan, attempt, cancel).await;
        self.retrieval
            .record_execution(&run.task, &plan, &trace)
            .await;

        if trace.cancelled {
            run.history.push(trace);
            return Err(OrchestratorError::Cancelled {
                history: run.history,
            });
        }

        let succeeded = trace.completes(&plan);
        let failure = trace.failure().cloned();
        self.emit(
            &run,
            OrchestratorEvent::ExecutionFinished {
                task_id: run.task.id().to_string(),
                attempt,
                succeeded,
                steps_run: trace.records.len(),
            },
        );
        run.history.push(trace);

        if succeeded {
            self.retrieval.record_task_plan(&run.task, &plan).await;
            self.transition(&mut run, TaskPhase::Succeeded);
            return Ok(run);
        }

        let (reason, feedback) = match &failure {
            Some(record) => (
                record
                    .error_detail
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
                self.recovery.failure_feedback(record),
            ),
            None => {
                let reason = "execution stopped before the final step".to_string();
                (reason.clone(), reason)
            }
        };

        if run.retry.can_retry() {
            run.retry.record_failure(reason.clone());
            tracing::warn!(
                task_id = %run.task.id(),
                attempt = run.retry.attempt_count,
                max_attempts = run.retry.max_attempts,
                reason = %reason,
                "execution failed, replanning"
            );
            self.emit(
                &run,
                OrchestratorEvent::ReplanScheduled {
                    task_id: run.task.id().to_string(),
                    attempt: run.retry.attempt_count,
                    max_attempts: run.retry.max_attempts,
                    reason,
                },
            );
            run.pending_feedback = Some(Feedback::AutomaticFailure(feedback));
            self.transition(&mut run, TaskPhase::Replanning);
            Ok(run)
        } else {
            run.retry.last_failure_reason = Some(reason.clone());
            tracing::error!(
                task_id = %run.task.id(),
                attempts = run.retry.attempt_count,
                reason = %reason,
                "retry budget exhausted"
            );
            self.transition(&mut run, TaskPhase::Failed);
            Err(OrchestratorError::RetryBudgetExhausted {
                attempts: run.retry.attempt_count,
                history: run.history,
            })
        }
    }

    /// 提交审阅结果：批准 → EXECUTING；意见 → REPLANNING（不消耗预算）
    pub fn apply_review(
        &self,
        mut run: TaskRun,
        decision: ReviewDecision,
    ) -> Result<TaskRun, OrchestratorError> {
        if run.phase != TaskPhase::AwaitingReview {
            return Err(OrchestratorError::InvalidTransition(format!(
                "cannot apply review in phase {:?}",
                run.phase
            )));
        }
        match decision {
            ReviewDecision::Approve => self.transition(&mut run, TaskPhase::Executing),
            ReviewDecision::Comment(comment) => {
                self.emit(
                    &run,
                    OrchestratorEvent::FeedbackReceived {
                        task_id: run.task.id().to_string(),
                        comment: comment.clone(),
                    },
                );
                run.pending_feedback = Some(Feedback::UserComment(comment));
                self.transition(&mut run, TaskPhase::Replanning);
            }
        }
        Ok(run)
    }

    /// 跑完整个任务
    pub async fn run(
        &self,
        task: Task,
        mode: ExecutionMode,
        reviewer: &dyn PlanReviewer,
        cancel: &CancellationToken,
    ) -> Result<TaskOutcome, OrchestratorError> {
        let task_id = task.id().to_string();
        let mut run = self.start(task, mode);
        let result = loop {
            match run.phase {
                TaskPhase::Succeeded => break Ok(self.outcome(run)),
                TaskPhase::AwaitingReview => {
                    if cancel.is_cancelled() {
                        break Err(OrchestratorError::Cancelled {
                            history: run.history,
                        });
                    }
                    let decision = match &run.plan {
                        Some(plan) => reviewer.review(&run.task, plan, run.revision).await,
                        None => ReviewDecision::Approve,
                    };
                    run = match self.apply_review(run, decision) {
                        Ok(run) => run,
                        Err(e) => break Err(e),
                    };
                }
                _ => {
                    run = match self.advance(run, cancel).await {
                        Ok(run) => run,
                        Err(e) => break Err(e),
                    };
                }
            }
        };

        let event = match &result {
            Ok(outcome) => OrchestratorEvent::Succeeded {
                task_id: task_id.clone(),
                final_artifact: outcome.final_artifact.clone(),
                replans: outcome.replans,
            },
            Err(e) => OrchestratorEvent::Failed {
                task_id: task_id.clone(),
                error: e.to_string(),
            },
        };
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
        result
    }

    fn outcome(&self, run: TaskRun) -> TaskOutcome {
        let final_artifact = run.last_trace().and_then(|t| t.final_artifact().cloned());
        TaskOutcome {
            task_id: run.task.id().to_string(),
            plan: run.plan.unwrap_or_else(|| Plan {
                goal: String::new(),
                steps: Vec::new(),
                estimated_steps: 0,
            }),
            final_artifact,
            replans: run.retry.attempt_count,
            history: run.history,
        }
    }
}
