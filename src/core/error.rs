//! 错误分类
//!
//! - PlanError：规划/重规划阶段的错误，直接上抛，不进入重试
//! - StepError：单步执行错误，记入 ExecutionTrace，由 Orchestrator 决定是否重规划
//! - RetrievalError：检索存储不可达，就地吸收，降级为空上下文
//! - OrchestratorError：任务级终止错误（含完整执行历史，便于诊断）

use serde::Serialize;
use thiserror::Error;

use crate::work::ExecutionTrace;

/// Plan / Replan 模块的错误
#[derive(Error, Debug, Clone)]
pub enum PlanError {
    /// 模型输出无法解析为计划结构（已做过一次改写请求）
    #[error("Plan parse error: {0}")]
    Parse(String),

    /// 可解析但不合法：未注册工具、参数不满足 schema、空计划等
    #[error("Plan validation error: {}", .issues.join("; "))]
    Validation { issues: Vec<String> },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("LLM timeout after {0}s")]
    Timeout(u64),

    #[error("Cancelled")]
    Cancelled,
}

impl PlanError {
    pub fn validation(issue: impl Into<String>) -> Self {
        PlanError::Validation {
            issues: vec![issue.into()],
        }
    }
}

/// 单步执行失败的类别（序列化进执行记录）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    Validation,
    UnknownTool,
    Execution,
    Timeout,
    /// 基础数据集不可用（与计划内容无关）
    Dataset,
}

/// 单步执行错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("Step validation failed: {0}")]
    Validation(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool execution failed: {0}")]
    Execution(String),

    #[error("Tool timeout: {tool} after {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("Base dataset unavailable: {0}")]
    Dataset(String),
}

impl StepError {
    pub fn kind(&self) -> StepErrorKind {
        match self {
            StepError::Validation(_) => StepErrorKind::Validation,
            StepError::UnknownTool(_) => StepErrorKind::UnknownTool,
            StepError::Execution(_) => StepErrorKind::Execution,
            StepError::Timeout { .. } => StepErrorKind::Timeout,
            StepError::Dataset(_) => StepErrorKind::Dataset,
        }
    }
}

/// 检索存储错误（调用方吸收并记录 warn 日志）
#[derive(Error, Debug, Clone)]
pub enum RetrievalError {
    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// 任务级终止错误
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// 自动重规划次数用尽；history 为每次执行尝试的完整 trace
    #[error("Retry budget exhausted after {attempts} replans")]
    RetryBudgetExhausted {
        attempts: u32,
        history: Vec<ExecutionTrace>,
    },

    #[error("Task cancelled")]
    Cancelled { history: Vec<ExecutionTrace> },

    /// 在不允许的阶段调用了状态迁移（如未处于 AwaitingReview 时提交审阅结果）
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}
