use crate::model::Table;
use crate::providers::llm::ChatClient;
use crate::serialize;
use std::sync::Arc;

const DEFAULT_SAMPLE_ROWS: usize = 20;

/// Describes a query result in natural language. Degrades to a
/// deterministic statistical description when the model is unavailable,
/// so summarization can never fail the pipeline.
#[derive(Clone)]
pub struct Summarizer {
    chat: Arc<dyn ChatClient>,
    sample_rows: usize,
}

impl Summarizer {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self {
            chat,
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }

    pub async fn summarize(&self, question: &str, table: &Table) -> String {
        let records = serialize::table_records(table);
        let sample = &records[..records.len().min(self.sample_rows)];
        let sample_json = match serde_json::to_string_pretty(sample) {
            Ok(s) => s,
            Err(_) => return stats_summary(table),
        };

        let system = "You describe query results for a business user in two or three \
                      sentences. Mention concrete values when they matter. Plain text.";
        let user = format!(
            "Question: {}\nColumns: {}\nTotal rows: {}\nSample rows (JSON):\n{}",
            question,
            table.columns.join(", "),
            table.row_count(),
            sample_json
        );

        match self.chat.complete(system, &user).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => stats_summary(table),
            Err(e) => {
                tracing::warn!(error = %e, "summarization failed, using statistical fallback");
                stats_summary(table)
            }
        }
    }
}

/// Deterministic description used when the model summary is unavailable.
pub fn stats_summary(table: &Table) -> String {
    format!(
        "The query returned {} row(s) across {} column(s): {}.",
        table.row_count(),
        table.column_count(),
        table.columns.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellValue;
    use async_trait::async_trait;

    fn table() -> Table {
        Table {
            columns: vec!["region".into(), "total".into()],
            rows: vec![vec![CellValue::Text("emea".into()), CellValue::Int(42)]],
        }
    }

    struct DownChat;

    #[async_trait]
    impl ChatClient for DownChat {
        async fn complete(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            anyhow::bail!("timeout")
        }

        fn provider_name(&self) -> &'static str {
            "down"
        }
    }

    struct EchoChat;

    #[async_trait]
    impl ChatClient for EchoChat {
        async fn complete(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            Ok("EMEA leads with 42.".into())
        }

        fn provider_name(&self) -> &'static str {
            "echo"
        }
    }

    #[test]
    fn stats_summary_is_deterministic() {
        assert_eq!(
            stats_summary(&table()),
            "The query returned 1 row(s) across 2 column(s): region, total."
        );
    }

    #[tokio::test]
    async fn model_summary_wins_when_available() {
        let s = Summarizer::new(Arc::new(EchoChat));
        assert_eq!(s.summarize("who leads?", &table()).await, "EMEA leads with 42.");
    }

    #[tokio::test]
    async fn degrades_to_stats_when_model_is_down() {
        let s = Summarizer::new(Arc::new(DownChat));
        let text = s.summarize("who leads?", &table()).await;
        assert_eq!(text, stats_summary(&table()));
    }
}
