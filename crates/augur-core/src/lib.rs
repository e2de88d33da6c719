pub mod config;
pub mod embeddings;
pub mod engine;
pub mod errors;
pub mod model;
pub mod providers;
pub mod recommend;
pub mod serialize;
pub mod session;
pub mod storage;
pub mod summary;
