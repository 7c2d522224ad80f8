//! 嵌入提供方：供检索存储把文本编码为向量
//!
//! - OpenAiEmbedder：调用 OpenAI 兼容的 /embeddings 端点
//! - HashingEmbedder：特征哈希词袋，确定性、无网络，适合离线运行与测试

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::types::embeddings::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_openai::Client;
use async_trait::async_trait;

use crate::retrieval::tokenizer;

/// 文本 → 向量；失败时返回错误字符串
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String>;
}

/// 使用 async-openai 调用 OpenAI 兼容的 embeddings API
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str) -> Self {
        let config = match base_url {
            Some(url) => OpenAIConfig::new().with_api_base(url).with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };
        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(vec![]);
        }
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::String(text.to_string()))
            .build()
            .map_err(|e| e.to_string())?;
        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| e.to_string())?;
        Ok(response
            .data
            .first()
            .map(|e| e.embedding.clone())
            .unwrap_or_default())
    }
}

/// 特征哈希嵌入：小写分词后哈希到固定维度并做 L2 归一化
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
        let mut v = vec![0.0f32; self.dims];
        for token in tokenizer::tokenize(text) {
            let mut h = DefaultHasher::new();
            token.hash(&mut h);
            let idx = (h.finish() % self.dims as u64) as usize;
            v[idx] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }
}

/// 从配置创建嵌入提供方：有 OPENAI_API_KEY 时用远端模型，否则退回 HashingEmbedder
pub fn create_embedder_from_config(
    base_url: Option<&str>,
    model: &str,
) -> Arc<dyn EmbeddingProvider> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Arc::new(OpenAiEmbedder::new(base_url, model, &key)),
        _ => {
            tracing::debug!("embedding: no OPENAI_API_KEY, using hashing embedder");
            Arc::new(HashingEmbedder::default())
        }
    }
}
