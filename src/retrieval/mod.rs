//! 检索层：存储契约、内存向量存储、上下文组装与默认知识

pub mod context;
pub mod seed;
pub mod store;
pub mod tokenizer;
pub mod vector;

pub use context::{
    RetrievalContextProvider, RetrievedContext, DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_TOP_K,
};
pub use seed::seed_defaults;
pub use store::{Collection, ScoredSnippet, SimilarityStore};
pub use vector::InMemoryVectorStore;
