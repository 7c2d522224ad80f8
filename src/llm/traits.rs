//! LLM 客户端抽象
//!
//! 核心只把 LLM 当作一个可失败的 `messages -> text` 函数：单次请求、非流式。
//! 超时由调用方（PlanSynthesizer）用 tokio::time::timeout 施加。

use async_trait::async_trait;

use crate::llm::Message;

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成，返回模型的原始文本
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;
}
