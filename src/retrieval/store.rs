//! 检索存储契约
//!
//! 核心只发出相似度查询与历史写入；索引、嵌入、持久化都是存储实现自己的事。

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::RetrievalError;

/// 四个逻辑集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// 领域知识（部署规则等）
    Knowledge,
    /// 历史任务 / 计划对
    PrecedentTasks,
    /// 历史执行记录
    PrecedentExecutions,
    /// 装备信息（射程等）
    Equipment,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Knowledge,
        Collection::PrecedentTasks,
        Collection::PrecedentExecutions,
        Collection::Equipment,
    ];

    /// 存储中的集合名
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Knowledge => "knowledge",
            Collection::PrecedentTasks => "tasks",
            Collection::PrecedentExecutions => "executions",
            Collection::Equipment => "equipment",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 一条检索命中
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSnippet {
    pub text: String,
    pub score: f32,
    pub metadata: HashMap<String, String>,
}

/// 相似度检索存储
#[async_trait]
pub trait SimilarityStore: Send + Sync {
    /// 返回相似度 >= threshold 的至多 top_k 条，按相似度降序；同分保持写入顺序
    async fn query(
        &self,
        collection: Collection,
        query: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredSnippet>, RetrievalError>;

    /// 写入一段文本
    async fn add(
        &self,
        collection: Collection,
        text: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), RetrievalError>;

    /// 集合中的条目数
    async fn count(&self, collection: Collection) -> Result<usize, RetrievalError>;
}
