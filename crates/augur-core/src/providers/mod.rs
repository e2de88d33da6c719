pub mod embedder;
pub mod fallback;
pub mod llm;
pub mod query;
