pub mod schema;
pub mod store;

pub use store::{EmbeddedQuestion, Store, StoredQuestion};
