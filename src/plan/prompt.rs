//! Prompt 组装
//!
//! 静态指令来自模板（可由 TOML 文件覆盖），输出格式由 `Plan` 类型经 schemars 生成。
//! 检索上下文为空时只发送指令与任务。

use std::path::Path;

use schemars::schema_for;
use serde::Deserialize;

use crate::llm::Message;
use crate::plan::{Feedback, Plan, Task};
use crate::retrieval::RetrievedContext;
use crate::work::ExecutionTrace;

const DEFAULT_PLAN_INSTRUCTIONS: &str = "\
You are a geospatial analysis planner. Decompose the task into an ordered chain of region \
filtering steps. Each step calls exactly one of the available tools and narrows the candidate \
regions produced by the previous step.

Rules:
- Use only the tools listed below; the step \"type\" is the tool name.
- step_id starts at 1 and increases by one per step.
- Give every required parameter, respecting minimum/maximum and allowed values.
- Omit the chained input parameter; it is filled with the previous step's result automatically.
- Use the domain knowledge and equipment ranges below when choosing thresholds and buffer distances.
- Answer with a single JSON object in a ```json code block and nothing else.";

const DEFAULT_REPLAN_INSTRUCTIONS: &str = "\
The previous plan for this task must be revised. Study the prior plan, the execution record of \
every step and the feedback, then produce a corrected plan that avoids the problem. The new plan \
is executed from its first step. The output format and tool rules are unchanged.";

const DEFAULT_REFORMULATE: &str = "\
Your previous answer could not be parsed as a plan ({error}). Reply again with ONLY one JSON \
object in a ```json code block, with fields \"goal\", \"steps\" (each with \"step_id\", \
\"description\", \"type\", \"params\") and \"estimated_steps\".";

fn default_plan_instructions() -> String {
    DEFAULT_PLAN_INSTRUCTIONS.to_string()
}

fn default_replan_instructions() -> String {
    DEFAULT_REPLAN_INSTRUCTIONS.to_string()
}

fn default_reformulate() -> String {
    DEFAULT_REFORMULATE.to_string()
}

/// 静态指令模板
#[derive(Debug, Clone, Deserialize)]
pub struct PromptTemplates {
    #[serde(default = "default_plan_instructions")]
    pub plan_instructions: String,
    #[serde(default = "default_replan_instructions")]
    pub replan_instructions: String,
    /// 改写请求；`{error}` 替换为解析错误
    #[serde(default = "default_reformulate")]
    pub reformulate: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            plan_instructions: default_plan_instructions(),
            replan_instructions: default_replan_instructions(),
            reformulate: default_reformulate(),
        }
    }
}

/// 计划输出格式（JSON Schema），由 Plan 类型生成
pub fn plan_output_schema() -> String {
    let schema = schema_for!(Plan);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

impl PromptTemplates {
    /// 从 TOML 文件加载；文件不存在时使用内置模板，缺失字段取默认值
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "prompt file not found, using built-in templates");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("Read {} failed: {}", path.display(), e))?;
        toml::from_str(&raw).map_err(|e| format!("Invalid prompt file {}: {}", path.display(), e))
    }

    fn system_message(&self, instructions: &str, tool_schemas: &str) -> Message {
        Message::system(format!(
            "{}\n\nAvailable tools:\n{}\n\nOutput format (JSON Schema):\n{}",
            instructions,
            tool_schemas,
            plan_output_schema()
        ))
    }

    fn task_section(task: &Task, context: &RetrievedContext) -> String {
        let section = context.to_prompt_section();
        if section.is_empty() {
            format!("Task: {}", task.text())
        } else {
            format!("Task: {}\n\n{}", task.text(), section)
        }
    }

    pub fn compose_plan(
        &self,
        task: &Task,
        context: &RetrievedContext,
        tool_schemas: &str,
    ) -> Vec<Message> {
        vec![
            self.system_message(&self.plan_instructions, tool_schemas),
            Message::user(Self::task_section(task, context)),
        ]
    }

    pub fn compose_replan(
        &self,
        task: &Task,
        context: &RetrievedContext,
        tool_schemas: &str,
        prior_plan: &Plan,
        trace: &ExecutionTrace,
        feedback: &Feedback,
    ) -> Vec<Message> {
        let instructions = format!("{}\n\n{}", self.plan_instructions, self.replan_instructions);
        let feedback_text = match feedback {
            Feedback::AutomaticFailure(reason) => format!("Execution failed: {}", reason),
            Feedback::UserComment(comment) => format!("Reviewer comment: {}", comment),
        };
        let user = format!(
            "{}\n\n## Prior plan\n{}\n\n## Execution record\n{}\n\n## Feedback\n{}\n\nProduce the corrected plan.",
            Self::task_section(task, context),
            prior_plan.to_pretty_json(),
            trace.to_prompt_section(),
            feedback_text
        );
        vec![
            self.system_message(&instructions, tool_schemas),
            Message::user(user),
        ]
    }

    /// 改写请求：回显无法解析的输出并重申格式
    pub fn compose_reformulation(
        &self,
        mut messages: Vec<Message>,
        raw_output: &str,
        error: &str,
    ) -> Vec<Message> {
        messages.push(Message::assistant(raw_output));
        messages.push(Message::user(self.reformulate.replace("{error}", error)));
        messages
    }
}
