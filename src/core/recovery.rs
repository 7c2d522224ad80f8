//! 失败恢复提示
//!
//! 根据失败步骤的错误类别给出修正方向，拼进自动重规划的反馈里。

use crate::core::StepErrorKind;
use crate::work::ExecutionRecord;

/// 重规划时建议的修正动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 按 schema 修正参数
    FixParameters,
    /// 换成已注册的工具
    UseRegisteredTool,
    /// 缩小该步范围或拆分
    NarrowStep,
    /// 调整参数或换一种筛选思路
    AdjustApproach,
    /// 基础数据集缺失，改计划无济于事
    CheckDataset,
}

impl RecoveryAction {
    pub fn hint(&self) -> &'static str {
        match self {
            RecoveryAction::FixParameters => {
                "fix the step parameters so they satisfy the tool schema (types, ranges, allowed values)"
            }
            RecoveryAction::UseRegisteredTool => "use only the tools listed in the available tools",
            RecoveryAction::NarrowStep => {
                "the tool timed out; narrow the step or split it into smaller steps"
            }
            RecoveryAction::AdjustApproach => {
                "adjust the parameters or choose a different filtering approach for this step"
            }
            RecoveryAction::CheckDataset => {
                "the base dataset is unavailable and no plan change can fix it; keep the plan unchanged"
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, kind: StepErrorKind) -> RecoveryAction {
        match kind {
            StepErrorKind::Validation => RecoveryAction::FixParameters,
            StepErrorKind::UnknownTool => RecoveryAction::UseRegisteredTool,
            StepErrorKind::Timeout => RecoveryAction::NarrowStep,
            StepErrorKind::Execution => RecoveryAction::AdjustApproach,
            StepErrorKind::Dataset => RecoveryAction::CheckDataset,
        }
    }

    /// 自动重规划的反馈文本
    pub fn failure_feedback(&self, record: &ExecutionRecord) -> String {
        let detail = record.error_detail.as_deref().unwrap_or("unknown error");
        let action = self.handle(record.error_kind.unwrap_or(StepErrorKind::Execution));
        format!(
            "step {} ({}) failed: {}. Hint: {}.",
            record.step_id,
            record.tool_type,
            detail,
            action.hint()
        )
    }
}
