//! LLM 层：消息类型、客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）、嵌入

pub mod embedding;
pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

pub use embedding::{create_embedder_from_config, EmbeddingProvider, HashingEmbedder, OpenAiEmbedder};
pub use message::{Message, Role};
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::OpenAiClient;
pub use traits::LlmClient;
