//! 重规划模块：在原计划、执行轨迹与反馈的基础上生成新计划
//!
//! 输出格式、解析与校验与 PlanModule 走同一条路径（PlanSynthesizer）。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::PlanError;
use crate::plan::{Plan, PlanSynthesizer, Task};
use crate::retrieval::RetrievalContextProvider;
use crate::work::ExecutionTrace;

/// 重规划的触发原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Feedback {
    /// 执行失败（失败步骤的错误详情）
    AutomaticFailure(String),
    /// 审阅者的修改意见
    UserComment(String),
}

impl Feedback {
    pub fn text(&self) -> &str {
        match self {
            Feedback::AutomaticFailure(t) | Feedback::UserComment(t) => t,
        }
    }
}

pub struct ReplanModule {
    synth: Arc<PlanSynthesizer>,
    retrieval: RetrievalContextProvider,
}

impl ReplanModule {
    pub fn new(synth: Arc<PlanSynthesizer>, retrieval: RetrievalContextProvider) -> Self {
        Self { synth, retrieval }
    }

    pub async fn replan(
        &self,
        task: &Task,
        prior_plan: &Plan,
        trace: &ExecutionTrace,
        feedback: &Feedback,
        cancel: &CancellationToken,
    ) -> Result<Plan, PlanError> {
        let query = format!("{}\n{}", task.text(), feedback.text());
        let context = self.retrieval.retrieve_all(&query).await;
        tracing::info!(task_id = %task.id(), feedback = ?feedback, "replanning");
        let messages = self.synth.templates().compose_replan(
            task,
            &context,
            &self.synth.tool_schemas(),
            prior_plan,
            trace,
            feedback,
        );
        self.synth.synthesize(messages, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StepError;
    use crate::geo::ResultSink;
    use crate::llm::{HashingEmbedder, ScriptedLlmClient};
    use crate::plan::{PromptTemplates, Step, StepParams};
    use crate::retrieval::InMemoryVectorStore;
    use crate::tools::geo_registry;
    use crate::work::ExecutionRecord;

    #[tokio::test]
    async fn test_replan_prompt_carries_failure() {
        let reply = r#"{"goal":"g2","steps":[{"step_id":1,"description":"d","type":"slope","params":{"max_slope":20}}]}"#;
        let llm = Arc::new(ScriptedLlmClient::new([reply]));
        let synth = PlanSynthesizer::new(
            llm.clone(),
            Arc::new(geo_registry(ResultSink::new("unused"))),
            Arc::new(PromptTemplates::default()),
            5,
        );
        let store = Arc::new(InMemoryVectorStore::new(Arc::new(HashingEmbedder::new(64)), 10));
        let module = ReplanModule::new(Arc::new(synth), RetrievalContextProvider::new(store));

        let prior = Plan {
            goal: "g".into(),
            estimated_steps: 1,
            steps: vec![Step {
                step_id: 1,
                description: "d".into(),
                tool_type: "slope".into(),
                params: StepParams::new(),
            }],
        };
        let mut trace = ExecutionTrace::new(1);
        trace.push(ExecutionRecord::failure(
            1,
            "slope",
            StepParams::new(),
            &StepError::Execution("DEM tile missing".into()),
            2,
        ));
        let plan = module
            .replan(
                &Task::new("t"),
                &prior,
                &trace,
                &Feedback::AutomaticFailure("DEM tile missing".into()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(plan.goal, "g2");
        let prompts = llm.prompts().await;
        let user = &prompts[0][1].content;
        assert!(user.contains("FAILURE: Tool execution failed: DEM tile missing"));
        assert!(user.contains("Execution failed: DEM tile missing"));
    }
}
