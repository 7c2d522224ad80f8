//! 规划模块：任务 → 已校验的计划

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::PlanError;
use crate::plan::{Plan, PlanSynthesizer, Task};
use crate::retrieval::RetrievalContextProvider;

pub struct PlanModule {
    synth: Arc<PlanSynthesizer>,
    retrieval: RetrievalContextProvider,
}

impl PlanModule {
    pub fn new(synth: Arc<PlanSynthesizer>, retrieval: RetrievalContextProvider) -> Self {
        Self { synth, retrieval }
    }

    /// 检索四个集合 → 组装 prompt（现取工具 schema）→ 生成并校验
    pub async fn generate_plan(
        &self,
        task: &Task,
        cancel: &CancellationToken,
    ) -> Result<Plan, PlanError> {
        let context = self.retrieval.retrieve_all(task.text()).await;
        tracing::info!(task_id = %task.id(), snippets = context.total(), "generating plan");
        let messages =
            self.synth
                .templates()
                .compose_plan(task, &context, &self.synth.tool_schemas());
        self.synth.synthesize(messages, cancel).await
    }
}
