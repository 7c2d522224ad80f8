//! Plan / Replan 共用的生成路径：调用模型 → 解析（失败时一次改写请求）→ 校验
//!
//! 模型调用前检查取消信号，调用本身受超时约束；超时与模型错误都是致命的规划错误。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::core::PlanError;
use crate::llm::{LlmClient, Message};
use crate::plan::{parse_plan, Plan, PlanValidator, PromptTemplates};
use crate::tools::ToolRegistry;

pub struct PlanSynthesizer {
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    templates: Arc<PromptTemplates>,
    llm_timeout: Duration,
}

impl PlanSynthesizer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
        templates: Arc<PromptTemplates>,
        llm_timeout_secs: u64,
    ) -> Self {
        Self {
            llm,
            registry,
            templates,
            llm_timeout: Duration::from_secs(llm_timeout_secs),
        }
    }

    pub fn templates(&self) -> &PromptTemplates {
        &self.templates
    }

    /// 当前注册工具的 schema（每次现取）
    pub fn tool_schemas(&self) -> String {
        self.registry.to_schema_json()
    }

    async fn call_llm(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<String, PlanError> {
        if cancel.is_cancelled() {
            return Err(PlanError::Cancelled);
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(PlanError::Cancelled),
            res = timeout(self.llm_timeout, self.llm.complete(messages)) => match res {
                Ok(Ok(text)) => Ok(text),
                Ok(Err(e)) => Err(PlanError::Llm(e)),
                Err(_) => Err(PlanError::Timeout(self.llm_timeout.as_secs())),
            },
        }
    }

    /// 发送 prompt 并得到一个已校验的计划
    pub async fn synthesize(
        &self,
        messages: Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<Plan, PlanError> {
        let raw = self.call_llm(&messages, cancel).await?;
        let plan = match parse_plan(&raw) {
            Ok(plan) => plan,
            Err(PlanError::Parse(reason)) => {
                tracing::warn!(error = %reason, "plan output unparseable, requesting reformulation");
                let retry = self
                    .templates
                    .compose_reformulation(messages, &raw, &reason);
                let raw = self.call_llm(&retry, cancel).await?;
                parse_plan(&raw)?
            }
            Err(e) => return Err(e),
        };
        let plan = PlanValidator::new(&self.registry).validate(plan)?;
        tracing::info!(steps = plan.steps.len(), chain = %plan.tool_chain(), "plan accepted");
        Ok(plan)
    }
}
