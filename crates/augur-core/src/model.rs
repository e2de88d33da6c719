use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated caller, resolved by the (external) HTTP layer. The id is
/// an opaque string owned by that layer, never parsed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
}

/// One cell of a query result. Coercion to JSON is total, see `serialize`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Bytes(Vec<u8>),
}

/// Column-ordered query result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Terminal pipeline output. The `type` tag and field names are the wire
/// format cached payloads use; changing them invalidates existing caches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerResult {
    SqlResponse {
        query: String,
        records: Vec<serde_json::Map<String, serde_json::Value>>,
        columns: Vec<String>,
        summary: String,
        #[serde(default)]
        next_question: Option<String>,
    },
    Text {
        content: String,
        #[serde(default)]
        next_question: Option<String>,
    },
}

impl AnswerResult {
    pub fn next_question(&self) -> Option<&str> {
        match self {
            AnswerResult::SqlResponse { next_question, .. } => next_question.as_deref(),
            AnswerResult::Text { next_question, .. } => next_question.as_deref(),
        }
    }
}
