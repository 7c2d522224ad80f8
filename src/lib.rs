//! Geoplan - 地理空间分析任务智能体
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排状态机、错误、恢复提示、事件、任务监管、构建器
//! - **geo**: 候选区域数据模型与基础数据集
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）、嵌入
//! - **observability**: 日志初始化
//! - **plan**: 计划数据模型、解析、校验、prompt、Plan / Replan 模块
//! - **retrieval**: 检索存储、上下文组装、默认领域知识
//! - **tools**: 工具契约、注册表、执行器与区域过滤工具
//! - **work**: 链式输入推断、计划执行、执行轨迹

pub mod config;
pub mod core;
pub mod geo;
pub mod llm;
pub mod observability;
pub mod plan;
pub mod retrieval;
pub mod tools;
pub mod work;

pub use crate::core::{
    ExecutionMode, Orchestrator, OrchestratorBuilder, OrchestratorError, ReviewDecision,
    TaskOutcome,
};
pub use crate::plan::{Plan, Step, Task};
