pub mod generator;
pub mod pipeline;
