//! 核心编排层：错误、状态机、恢复提示、事件、任务监管与构建器

pub mod builder;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod recovery;
pub mod session_supervisor;
pub mod state;

pub use builder::{create_llm_from_config, OrchestratorBuilder};
pub use error::{OrchestratorError, PlanError, RetrievalError, StepError, StepErrorKind};
pub use events::OrchestratorEvent;
pub use orchestrator::{
    AutoApprove, Orchestrator, PlanReviewer, ReviewDecision, TaskOutcome, DEFAULT_MAX_ATTEMPTS,
};
pub use recovery::{RecoveryAction, RecoveryEngine};
pub use session_supervisor::TaskSupervisor;
pub use state::{ExecutionMode, RetryState, TaskPhase, TaskRun};
