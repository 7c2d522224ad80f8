//! 执行层：链式输入推断、计划执行、执行轨迹

pub mod chaining;
pub mod executor;
pub mod trace;

pub use chaining::resolve_params;
pub use executor::WorkExecutor;
pub use trace::{ExecutionRecord, ExecutionTrace, StepStatus};
