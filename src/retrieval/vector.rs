//! 内存向量存储
//!
//! 每个集合一个按写入顺序排列的 Vec；超出容量时移除最旧的条目。
//! 查询时计算余弦相似度，稳定排序保证同分条目按写入顺序返回。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::RetrievalError;
use crate::llm::EmbeddingProvider;
use crate::retrieval::{Collection, ScoredSnippet, SimilarityStore};

struct Entry {
    text: String,
    metadata: HashMap<String, String>,
    embedding: Vec<f32>,
}

/// 内存向量存储：集合 → 条目列表
pub struct InMemoryVectorStore {
    embedder: Arc<dyn EmbeddingProvider>,
    collections: RwLock<HashMap<Collection, Vec<Entry>>>,
    default_capacity: usize,
    capacities: HashMap<Collection, usize>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, max_entries: usize) -> Self {
        Self {
            embedder,
            collections: RwLock::new(HashMap::new()),
            default_capacity: max_entries,
            capacities: HashMap::new(),
        }
    }

    /// 为单个集合设置容量（如 executions 只保留最近 30 条）
    pub fn with_capacity(mut self, collection: Collection, capacity: usize) -> Self {
        self.capacities.insert(collection, capacity);
        self
    }

    fn capacity(&self, collection: Collection) -> usize {
        self.capacities
            .get(&collection)
            .copied()
            .unwrap_or(self.default_capacity)
    }

}

#[async_trait]
impl SimilarityStore for InMemoryVectorStore {
    async fn query(
        &self,
        collection: Collection,
        query: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredSnippet>, RetrievalError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(RetrievalError::Embedding)?;
        if query_embedding.is_empty() {
            return Ok(Vec::new());
        }

        let collections = self.collections.read().await;
        let Some(entries) = collections.get(&collection) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<ScoredSnippet> = entries
            .iter()
            .map(|e| (cosine_similarity(&query_embedding, &e.embedding), e))
            .filter(|(score, _)| *score >= threshold)
            .map(|(score, e)| ScoredSnippet {
                text: e.text.clone(),
                score,
                metadata: e.metadata.clone(),
            })
            .collect();

        // sort_by 是稳定排序：同分保持写入顺序
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn count(&self, collection: Collection) -> Result<usize, RetrievalError> {
        Ok(self
            .collections
            .read()
            .await
            .get(&collection)
            .map_or(0, Vec::len))
    }

    async fn add(
        &self,
        collection: Collection,
        text: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), RetrievalError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let embedding = self
            .embedder
            .embed(text)
            .await
            .map_err(RetrievalError::Embedding)?;
        if embedding.is_empty() {
            return Err(RetrievalError::Embedding("empty embedding".to_string()));
        }

        let capacity = self.capacity(collection);
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection).or_default();
        entries.push(Entry {
            text: text.to_string(),
            metadata,
            embedding,
        });
        if entries.len() > capacity {
            let overflow = entries.len() - capacity;
            entries.drain(0..overflow);
        }
        Ok(())
    }
}

/// 余弦相似度
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::HashingEmbedder;

    fn store() -> InMemoryVectorStore {
        InMemoryVectorStore::new(Arc::new(HashingEmbedder::new(4096)), 100)
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.001);
        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.001);
        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_query_orders_by_score_and_applies_threshold() {
        let s = store();
        s.add(Collection::Knowledge, "tank units prefer open terrain", HashMap::new())
            .await
            .unwrap();
        s.add(Collection::Knowledge, "light infantry prefers gentle slope", HashMap::new())
            .await
            .unwrap();
        s.add(Collection::Knowledge, "light infantry", HashMap::new())
            .await
            .unwrap();

        let hits = s
            .query(Collection::Knowledge, "light infantry", 5, 0.4)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "light infantry");
        assert!(hits[0].score >= hits[1].score);
        assert!(hits.iter().all(|h| h.score >= 0.4));
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let s = store();
        for i in 0..3 {
            let mut meta = HashMap::new();
            meta.insert("n".to_string(), i.to_string());
            s.add(Collection::Equipment, "assault rifle range 400", meta)
                .await
                .unwrap();
        }
        let hits = s
            .query(Collection::Equipment, "assault rifle range 400", 2, 0.5)
            .await
            .unwrap();
        let order: Vec<&str> = hits.iter().map(|h| h.metadata["n"].as_str()).collect();
        assert_eq!(order, vec!["0", "1"]);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let s = store().with_capacity(Collection::PrecedentExecutions, 2);
        for text in ["run one buffer", "run two slope", "run three elevation"] {
            s.add(Collection::PrecedentExecutions, text, HashMap::new())
                .await
                .unwrap();
        }
        assert_eq!(s.count(Collection::PrecedentExecutions).await.unwrap(), 2);
        let hits = s
            .query(Collection::PrecedentExecutions, "run one buffer", 5, 0.9)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let hits = store()
            .query(Collection::PrecedentTasks, "anything", 3, 0.0)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
