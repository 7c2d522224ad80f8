//! 工具注册表
//!
//! 所有工具实现 Tool trait（schema / validate / execute），由 ToolRegistry 按规范名与别名注册、查找；
//! ToolExecutor 在调用时加超时并统一转 StepError。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use crate::plan::StepParams;
use crate::tools::{Artifact, ToolSchema, ValidationMode};

/// 工具 trait：参数 schema（每次调用现取）、校验、异步执行
#[async_trait]
pub trait Tool: Send + Sync {
    /// 规范名称（计划中 step 的 "type" 字段）
    fn name(&self) -> &str;

    fn schema(&self) -> ToolSchema;

    /// 可解析到本工具的别名
    fn aliases(&self) -> &[&'static str] {
        &[]
    }

    /// 超出单参数 schema 的约束（如 min <= max）
    fn check_constraints(&self, _params: &StepParams) -> Result<(), String> {
        Ok(())
    }

    /// schema 校验 + 组合约束；返回全部问题
    fn validate(&self, params: &StepParams, mode: ValidationMode) -> Result<(), Vec<String>> {
        self.schema().validate(params, mode)?;
        self.check_constraints(params).map_err(|e| vec![e])
    }

    /// 执行工具；params 已通过 Execution 模式校验
    async fn execute(&self, params: &StepParams) -> Result<Artifact, String>;
}

/// 工具注册表：按规范名存储 Arc<dyn Tool>，别名映射到规范名
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    aliases: HashMap<String, String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        for alias in tool.aliases() {
            self.aliases.insert(alias.to_lowercase(), name.clone());
        }
        self.tools.insert(name, tool);
    }

    fn canonical<'a>(&'a self, name: &str) -> Option<&'a str> {
        let key = name.trim().to_lowercase();
        if let Some((canonical, _)) = self.tools.get_key_value(key.as_str()) {
            return Some(canonical.as_str());
        }
        self.aliases.get(&key).map(String::as_str)
    }

    /// 按规范名或别名查找
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.canonical(name)
            .and_then(|canonical| self.tools.get(canonical))
            .cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 当前所有工具的 schema，每次调用都重新向工具索取
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// 动态生成工具 schema JSON（与实际注册工具一致），供 prompt 使用
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<serde_json::Value> = self
            .schemas()
            .iter()
            .map(ToolSchema::to_prompt_json)
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}
