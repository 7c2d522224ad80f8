//! 规划层：数据模型、输出解析、校验、prompt 组装、Plan / Replan 模块

pub mod parser;
pub mod planner;
pub mod prompt;
pub mod replanner;
pub mod synth;
pub mod types;
pub mod validator;

pub use parser::parse_plan;
pub use planner::PlanModule;
pub use prompt::{plan_output_schema, PromptTemplates};
pub use replanner::{Feedback, ReplanModule};
pub use synth::PlanSynthesizer;
pub use types::{Plan, Step, StepParams, Task};
pub use validator::PlanValidator;
