//! 检索上下文：按集合查询存储并组装为 prompt 段落
//!
//! 检索从不让调用方失败：存储错误被吸收为空结果并记 warn 日志。

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::plan::{Plan, Task};
use crate::retrieval::{Collection, ScoredSnippet, SimilarityStore};
use crate::work::ExecutionTrace;

/// 四个集合的检索结果（一次性使用，不持久化）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievedContext {
    pub knowledge: Vec<ScoredSnippet>,
    pub precedent_tasks: Vec<ScoredSnippet>,
    pub precedent_executions: Vec<ScoredSnippet>,
    pub equipment: Vec<ScoredSnippet>,
}

impl RetrievedContext {
    pub fn get(&self, collection: Collection) -> &[ScoredSnippet] {
        match collection {
            Collection::Knowledge => &self.knowledge,
            Collection::PrecedentTasks => &self.precedent_tasks,
            Collection::PrecedentExecutions => &self.precedent_executions,
            Collection::Equipment => &self.equipment,
        }
    }

    fn slot_mut(&mut self, collection: Collection) -> &mut Vec<ScoredSnippet> {
        match collection {
            Collection::Knowledge => &mut self.knowledge,
            Collection::PrecedentTasks => &mut self.precedent_tasks,
            Collection::PrecedentExecutions => &mut self.precedent_executions,
            Collection::Equipment => &mut self.equipment,
        }
    }

    pub fn is_empty(&self) -> bool {
        Collection::ALL.iter().all(|c| self.get(*c).is_empty())
    }

    pub fn total(&self) -> usize {
        Collection::ALL.iter().map(|c| self.get(*c).len()).sum()
    }

    /// 拼成 prompt 段落；没有任何命中时返回空串
    pub fn to_prompt_section(&self) -> String {
        let sections = [
            (Collection::Knowledge, "Relevant domain knowledge"),
            (Collection::Equipment, "Relevant equipment facts (ranges)"),
            (Collection::PrecedentTasks, "Similar past tasks and their plans"),
            (Collection::PrecedentExecutions, "Past execution records"),
        ];
        let mut out = String::new();
        for (collection, title) in sections {
            let snippets = self.get(collection);
            if snippets.is_empty() {
                continue;
            }
            out.push_str(&format!("## {}\n", title));
            for s in snippets {
                out.push_str(&format!("- ({:.2}) {}\n", s.score, s.text));
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}

/// 默认每个集合取 3 条
pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.65;

/// 检索上下文提供者
#[derive(Clone)]
pub struct RetrievalContextProvider {
    store: Arc<dyn SimilarityStore>,
    top_k: usize,
    threshold: f32,
}

impl RetrievalContextProvider {
    pub fn new(store: Arc<dyn SimilarityStore>) -> Self {
        Self {
            store,
            top_k: DEFAULT_TOP_K,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    pub fn with_limits(mut self, top_k: usize, threshold: f32) -> Self {
        self.top_k = top_k;
        self.threshold = threshold;
        self
    }

    /// 用配置的 top_k / 阈值检索全部四个集合
    pub async fn retrieve_all(&self, query: &str) -> RetrievedContext {
        self.retrieve(query, &Collection::ALL, self.top_k, self.threshold)
            .await
    }

    /// 逐个集合检索；结果再按阈值过滤、稳定降序、截断到 top_k
    pub async fn retrieve(
        &self,
        query: &str,
        collections: &[Collection],
        top_k: usize,
        threshold: f32,
    ) -> RetrievedContext {
        let mut ctx = RetrievedContext::default();
        for &collection in collections {
            let hits = match self.store.query(collection, query, top_k, threshold).await {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::warn!(collection = %collection, error = %e, "retrieval failed, using empty context");
                    continue;
                }
            };
            let mut hits: Vec<ScoredSnippet> =
                hits.into_iter().filter(|s| s.score >= threshold).collect();
            hits.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            hits.truncate(top_k);
            if hits.is_empty() {
                tracing::warn!(collection = %collection, "no snippets above threshold");
            }
            *ctx.slot_mut(collection) = hits;
        }
        tracing::debug!(total = ctx.total(), "retrieved context");
        ctx
    }

    /// 成功任务的 任务/计划 对写入 tasks 集合
    pub async fn record_task_plan(&self, task: &Task, plan: &Plan) {
        let text = format!(
            "Task: {}\nPlan ({}): {}",
            task.text(),
            plan.tool_chain(),
            serde_json::to_string(plan).unwrap_or_default()
        );
        let metadata = HashMap::from([
            ("task_id".to_string(), task.id().to_string()),
            ("steps".to_string(), plan.steps.len().to_string()),
        ]);
        if let Err(e) = self
            .store
            .add(Collection::PrecedentTasks, &text, metadata)
            .await
        {
            tracing::warn!(error = %e, "failed to index task plan");
        }
    }

    /// 每次执行尝试的 trace 写入 executions 集合
    pub async fn record_execution(&self, task: &Task, plan: &Plan, trace: &ExecutionTrace) {
        let status = if trace.completes(plan) {
            "success"
        } else if trace.cancelled {
            "cancelled"
        } else {
            "failure"
        };
        let text = format!(
            "Task: {}\nTool chain: {}\nOutcome: {}\n{}",
            task.text(),
            plan.tool_chain(),
            status,
            trace.to_prompt_section()
        );
        let metadata = HashMap::from([
            ("task_id".to_string(), task.id().to_string()),
            ("attempt".to_string(), trace.attempt.to_string()),
            ("status".to_string(), status.to_string()),
        ]);
        if let Err(e) = self
            .store
            .add(Collection::PrecedentExecutions, &text, metadata)
            .await
        {
            tracing::warn!(error = %e, "failed to index execution trace");
        }
    }
}
