//! Orchestrator 构建器：按配置装配 LLM、检索存储、工具注册表、基础数据集与 prompt 模板
//!
//! 每个组件都可以用 with_* 替换（测试中注入脚本 LLM 与桩工具）。

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::core::{Orchestrator, OrchestratorEvent};
use crate::geo::{BaseDataset, FileDataset, GridDataset, ResultSink};
use crate::llm::{create_embedder_from_config, LlmClient, MockLlmClient, OpenAiClient};
use crate::plan::{PlanModule, PlanSynthesizer, PromptTemplates, ReplanModule};
use crate::retrieval::{
    seed_defaults, Collection, InMemoryVectorStore, RetrievalContextProvider, SimilarityStore,
};
use crate::tools::{geo_registry, ToolExecutor, ToolRegistry};
use crate::work::WorkExecutor;

/// 按 provider 与可用的 API Key 选择 LLM；缺 Key 时退回 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let has_key = |name: &str| std::env::var(name).map(|k| !k.is_empty()).unwrap_or(false);

    match provider.as_str() {
        "mock" => {
            tracing::info!("Using Mock LLM");
            Arc::new(MockLlmClient)
        }
        "deepseek" if has_key("DEEPSEEK_API_KEY") || has_key("OPENAI_API_KEY") => {
            tracing::info!("Using DeepSeek LLM ({})", cfg.llm.model);
            Arc::new(OpenAiClient::deepseek(Some(&cfg.llm.model)))
        }
        "openai" if has_key("OPENAI_API_KEY") => {
            tracing::info!("Using OpenAI LLM ({})", cfg.llm.model);
            Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &cfg.llm.model,
                None,
            ))
        }
        other => {
            tracing::warn!("No API key for provider '{}', using Mock LLM", other);
            Arc::new(MockLlmClient)
        }
    }
}

pub struct OrchestratorBuilder {
    config: AppConfig,
    llm: Option<Arc<dyn LlmClient>>,
    store: Option<Arc<dyn SimilarityStore>>,
    registry: Option<ToolRegistry>,
    base: Option<Arc<dyn BaseDataset>>,
    templates: Option<PromptTemplates>,
    events: Option<mpsc::UnboundedSender<OrchestratorEvent>>,
}

impl OrchestratorBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            llm: None,
            store: None,
            registry: None,
            base: None,
            templates: None,
            events: None,
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn SimilarityStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_base_dataset(mut self, base: Arc<dyn BaseDataset>) -> Self {
        self.base = Some(base);
        self
    }

    pub fn with_templates(mut self, templates: PromptTemplates) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<OrchestratorEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    fn sink(&self) -> ResultSink {
        ResultSink::new(self.config.app.result_dir.clone())
    }

    /// 内存向量存储；executions 集合单独限容，按配置写入默认知识
    pub async fn build_store(&self) -> Arc<dyn SimilarityStore> {
        let rc = &self.config.retrieval;
        let embedder =
            create_embedder_from_config(rc.embedding_base_url.as_deref(), &rc.embedding_model);
        let store = InMemoryVectorStore::new(embedder, rc.max_entries)
            .with_capacity(Collection::PrecedentExecutions, rc.max_executions);
        if rc.seed_defaults {
            if let Err(e) = seed_defaults(&store).await {
                tracing::warn!("Failed to seed default knowledge: {}", e);
            }
        }
        Arc::new(store)
    }

    pub fn build_base_dataset(&self) -> Arc<dyn BaseDataset> {
        match &self.config.app.base_dataset {
            Some(path) => Arc::new(FileDataset::new(path.clone())),
            None => {
                let grid = &self.config.tools.grid;
                Arc::new(GridDataset::new(
                    grid.rows,
                    grid.cols,
                    grid.cell_size_m,
                    self.sink(),
                ))
            }
        }
    }

    pub fn build_templates(&self) -> PromptTemplates {
        PromptTemplates::load(&self.config.app.prompts_path).unwrap_or_else(|e| {
            tracing::warn!("Prompt templates load failed ({}), using built-in", e);
            PromptTemplates::default()
        })
    }

    pub async fn build(mut self) -> Orchestrator {
        let llm = self
            .llm
            .take()
            .unwrap_or_else(|| create_llm_from_config(&self.config));
        let store = match self.store.take() {
            Some(store) => store,
            None => self.build_store().await,
        };
        let registry = Arc::new(
            self.registry
                .take()
                .unwrap_or_else(|| geo_registry(self.sink())),
        );
        let base = self.base.take().unwrap_or_else(|| self.build_base_dataset());
        let templates = Arc::new(self.templates.take().unwrap_or_else(|| self.build_templates()));

        let rc = &self.config.retrieval;
        let retrieval =
            RetrievalContextProvider::new(store).with_limits(rc.top_k, rc.similarity_threshold);
        let synth = Arc::new(PlanSynthesizer::new(
            llm,
            registry.clone(),
            templates,
            self.config.llm.timeouts.request,
        ));
        let executor = WorkExecutor::new(
            ToolExecutor::new(registry, self.config.tools.tool_timeout_secs),
            base,
        )
        .keep_intermediate(self.config.tools.keep_intermediate_artifacts);

        let orchestrator = Orchestrator::new(
            PlanModule::new(synth.clone(), retrieval.clone()),
            ReplanModule::new(synth, retrieval.clone()),
            executor,
            retrieval,
            self.config.orchestrator.max_attempts,
        );
        match self.events.take() {
            Some(tx) => orchestrator.with_events(tx),
            None => orchestrator,
        }
    }
}
