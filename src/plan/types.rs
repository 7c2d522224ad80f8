//! 任务与计划的数据模型
//!
//! Task 创建后不可变；Step 由解析产生后不再修改，重规划总是产生全新的 Plan。

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 步骤参数：参数名 → JSON 值（BTreeMap 保证 prompt 与日志中的顺序稳定）
pub type StepParams = BTreeMap<String, serde_json::Value>;

/// 自然语言任务目标 + 标识
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: String,
    text: String,
}

impl Task {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
        }
    }

    pub fn with_id(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// 计划中的一步工具调用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Step {
    /// 从 1 开始，与步骤在列表中的位置一致
    pub step_id: u32,
    /// 该步要做什么（自然语言）
    pub description: String,
    /// 工具名，必须是已注册工具之一
    #[serde(rename = "type")]
    pub tool_type: String,
    /// 工具参数；链式输入参数可省略，执行时由上一步产物自动填充
    #[serde(default)]
    pub params: StepParams,
}

/// 多步计划：steps 的顺序即执行顺序
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Plan {
    /// 对任务目标的理解与规划思路
    pub goal: String,
    pub steps: Vec<Step>,
    /// 预计步数（仅供参考，不强制等于 steps 长度）
    pub estimated_steps: usize,
}

impl Plan {
    pub fn final_step_id(&self) -> Option<u32> {
        self.steps.last().map(|s| s.step_id)
    }

    pub fn tool_chain(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.tool_type.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}
