//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `GEOPLAN__*` 覆盖
//! （双下划线表示嵌套，如 `GEOPLAN__LLM__PROVIDER=openai`、`GEOPLAN__ORCHESTRATOR__MAX_ATTEMPTS=5`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub retrieval: RetrievalSection,
    pub orchestrator: OrchestratorSection,
    pub tools: ToolsSection,
}

/// [app] 段：应用名、结果目录、基础数据集、prompt 模板
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// 工具产物写入的目录
    #[serde(default = "default_result_dir")]
    pub result_dir: PathBuf,
    /// 基础区域集文件；未设置时生成合成栅格
    pub base_dataset: Option<PathBuf>,
    #[serde(default = "default_prompts_path")]
    pub prompts_path: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            result_dir: default_result_dir(),
            base_dataset: None,
            prompts_path: default_prompts_path(),
        }
    }
}

fn default_result_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_prompts_path() -> PathBuf {
    PathBuf::from("config/prompts.toml")
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：mock / openai / deepseek；没有对应 API Key 时退回 mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次模型请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    180
}

/// [retrieval] 段：检索数量、相似度阈值、存储容量、嵌入模型
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalSection {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// 每个集合的默认容量
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// executions 集合只保留最近的记录
    #[serde(default = "default_max_executions")]
    pub max_executions: usize,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    pub embedding_base_url: Option<String>,
    /// 启动时写入默认部署规则与装备信息
    #[serde(default = "default_true")]
    pub seed_defaults: bool,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
            max_entries: default_max_entries(),
            max_executions: default_max_executions(),
            embedding_model: default_embedding_model(),
            embedding_base_url: None,
            seed_defaults: true,
        }
    }
}

fn default_top_k() -> usize {
    crate::retrieval::DEFAULT_TOP_K
}

fn default_similarity_threshold() -> f32 {
    crate::retrieval::DEFAULT_SIMILARITY_THRESHOLD
}

fn default_max_entries() -> usize {
    1000
}

fn default_max_executions() -> usize {
    30
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_true() -> bool {
    true
}

/// [orchestrator] 段：重试预算与默认模式
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 默认是否交互审阅计划（命令行 --interactive 可覆盖）
    #[serde(default)]
    pub interactive: bool,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interactive: false,
        }
    }
}

fn default_max_attempts() -> u32 {
    crate::core::DEFAULT_MAX_ATTEMPTS
}

/// [tools] 段：工具超时与合成栅格
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// 保留每次执行的中间产物（默认只留最后一个成功步骤的产物）
    #[serde(default)]
    pub keep_intermediate_artifacts: bool,
    #[serde(default)]
    pub grid: GridSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            keep_intermediate_artifacts: false,
            grid: GridSection::default(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// [tools.grid] 段：合成基础栅格的形状
#[derive(Debug, Clone, Deserialize)]
pub struct GridSection {
    #[serde(default = "default_grid_dim")]
    pub rows: u32,
    #[serde(default = "default_grid_dim")]
    pub cols: u32,
    #[serde(default = "default_cell_size_m")]
    pub cell_size_m: f64,
}

impl Default for GridSection {
    fn default() -> Self {
        Self {
            rows: default_grid_dim(),
            cols: default_grid_dim(),
            cell_size_m: default_cell_size_m(),
        }
    }
}

fn default_grid_dim() -> u32 {
    20
}

fn default_cell_size_m() -> f64 {
    250.0
}

/// 从 config 目录加载配置，环境变量 GEOPLAN__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path，则追加该文件（可覆盖前面的键；显式指定的文件必须存在）
/// 3. 最后叠加环境变量 GEOPLAN__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        if std::path::Path::new(&format!("{}.toml", name)).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("GEOPLAN")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
