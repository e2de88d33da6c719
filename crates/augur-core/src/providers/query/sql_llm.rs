use super::{EngineError, EngineOutput, QueryEngine};
use crate::model::{CellValue, Table};
use crate::providers::llm::ChatClient;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// NL-to-SQL engine: prompts a chat model with the warehouse schema,
/// extracts a single SELECT from the reply and runs it.
pub struct SqlLlmEngine {
    chat: Arc<dyn ChatClient>,
    conn: Arc<Mutex<Connection>>,
    schema_hint: String,
}

impl SqlLlmEngine {
    /// Opens the analytics database read-only; generated queries can never
    /// write through this connection.
    pub fn open(chat: Arc<dyn ChatClient>, path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let schema_hint = read_schema_hint(&conn)?;
        Ok(Self {
            chat,
            conn: Arc::new(Mutex::new(conn)),
            schema_hint,
        })
    }

    fn execute(&self, sql: &str) -> Result<Table, EngineError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql).map_err(backend)?;
        let cols: Vec<(String, Option<String>)> = stmt
            .columns()
            .iter()
            .map(|c| {
                (
                    c.name().to_string(),
                    c.decl_type().map(|d| d.to_ascii_uppercase()),
                )
            })
            .collect();
        let columns: Vec<String> = cols.iter().map(|(name, _)| name.clone()).collect();

        let mut rows = Vec::new();
        let mut result = stmt.query([]).map_err(backend)?;
        while let Some(row) = result.next().map_err(backend)? {
            let mut cells = Vec::with_capacity(cols.len());
            for (i, (_, decl)) in cols.iter().enumerate() {
                let value = row.get_ref(i).map_err(backend)?;
                cells.push(cell_from_value(value, decl.as_deref()));
            }
            rows.push(cells);
        }
        Ok(Table { columns, rows })
    }
}

#[async_trait]
impl QueryEngine for SqlLlmEngine {
    async fn run(&self, question: &str, context: &str) -> Result<EngineOutput, EngineError> {
        let system = format!(
            "You translate analyst questions into a single SQLite SELECT statement.\n\
             Schema:\n{}\n\n\
             Rules:\n\
             - Reply with only the SQL, no commentary.\n\
             - Only SELECT (or WITH ... SELECT) statements.\n\
             - Reply NO_QUERY if the question cannot be answered from this schema.",
            self.schema_hint
        );
        let user = if context.is_empty() {
            question.to_string()
        } else {
            format!("Conversation so far:\n{}\n\nQuestion: {}", context, question)
        };

        let reply = self
            .chat
            .complete(&system, &user)
            .await
            .map_err(EngineError::Backend)?;
        let sql = extract_select(&reply)?;
        let table = self.execute(&sql)?;
        tracing::debug!(rows = table.row_count(), "generated query executed");
        Ok(EngineOutput { query: sql, table })
    }

    fn engine_name(&self) -> &'static str {
        "sql-llm"
    }
}

fn backend(e: rusqlite::Error) -> EngineError {
    EngineError::Backend(e.into())
}

fn read_schema_hint(conn: &Connection) -> anyhow::Result<String> {
    let mut stmt = conn.prepare(
        "SELECT sql FROM sqlite_master
         WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let mut rows = stmt.query([])?;
    let mut parts = Vec::new();
    while let Some(row) = rows.next()? {
        let sql: Option<String> = row.get(0)?;
        if let Some(sql) = sql {
            parts.push(sql);
        }
    }
    Ok(parts.join("\n\n"))
}

fn extract_select(reply: &str) -> Result<String, EngineError> {
    let body = match reply.find("```") {
        Some(start) => {
            let rest = &reply[start + 3..];
            let rest = rest
                .strip_prefix("sql")
                .or_else(|| rest.strip_prefix("SQL"))
                .unwrap_or(rest);
            match rest.find("```") {
                Some(end) => &rest[..end],
                None => rest,
            }
        }
        None => reply,
    };
    let sql = body.trim().trim_end_matches(';').trim();

    if sql.to_ascii_uppercase().starts_with("NO_QUERY") {
        return Err(EngineError::Unsupported(
            "the model declined to write a query for this question".into(),
        ));
    }
    let head = sql
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_uppercase();
    if head != "SELECT" && head != "WITH" {
        return Err(EngineError::Backend(anyhow::anyhow!(
            "model reply is not a SELECT statement: {:?}",
            first_line(sql)
        )));
    }
    Ok(sql.to_string())
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}

fn cell_from_value(value: ValueRef<'_>, decl: Option<&str>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(i) => {
            if decl.map(|d| d.starts_with("BOOL")).unwrap_or(false) {
                CellValue::Bool(i != 0)
            } else {
                CellValue::Int(i)
            }
        }
        ValueRef::Real(f) => CellValue::Float(f),
        ValueRef::Text(t) => {
            let s = String::from_utf8_lossy(t).into_owned();
            let is_temporal = decl
                .map(|d| d.contains("DATE") || d.contains("TIME"))
                .unwrap_or(false);
            if is_temporal {
                match parse_timestamp(&s) {
                    Some(ts) => CellValue::Timestamp(ts),
                    None => CellValue::Text(s),
                }
            } else {
                CellValue::Text(s)
            }
        }
        ValueRef::Blob(b) => CellValue::Bytes(b.to_vec()),
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    struct ScriptedChat(String);

    #[async_trait]
    impl ChatClient for ScriptedChat {
        async fn complete(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            Ok(self.0.clone())
        }

        fn provider_name(&self) -> &'static str {
            "scripted"
        }
    }

    #[test]
    fn extracts_bare_select() {
        let sql = extract_select("SELECT id FROM t;").unwrap();
        assert_eq!(sql, "SELECT id FROM t");
    }

    #[test]
    fn extracts_fenced_select() {
        let reply = "Here you go:\n```sql\nSELECT count(*) FROM sales\n```\nEnjoy!";
        let sql = extract_select(reply).unwrap();
        assert_eq!(sql, "SELECT count(*) FROM sales");
    }

    #[test]
    fn accepts_cte() {
        let sql = extract_select("WITH top AS (SELECT 1) SELECT * FROM top").unwrap();
        assert!(sql.starts_with("WITH"));
    }

    #[test]
    fn no_query_is_unsupported() {
        let err = extract_select("NO_QUERY").unwrap_err();
        assert!(matches!(err, EngineError::Unsupported(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn non_select_is_retryable_backend_error() {
        let err = extract_select("DROP TABLE users").unwrap_err();
        assert!(matches!(err, EngineError::Backend(_)));
        assert!(err.is_retryable());
    }

    fn seed_warehouse(path: &Path) -> anyhow::Result<()> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE metrics (
               id INTEGER,
               ratio REAL,
               label TEXT,
               day DATE,
               seen_at TIMESTAMP,
               payload BLOB,
               active BOOLEAN
             );
             INSERT INTO metrics VALUES
               (1, 0.5, 'alpha', '2024-03-01', '2024-03-01 12:30:00', X'0102', 1),
               (2, NULL, 'beta', '2024-03-02', '2024-03-02 01:02:03', NULL, 0);",
        )?;
        Ok(())
    }

    #[tokio::test]
    async fn runs_query_with_typed_cells() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = dir.path().join("warehouse.db");
        seed_warehouse(&db)?;

        let chat = Arc::new(ScriptedChat(
            "```sql\nSELECT id, ratio, label, day, seen_at, payload, active FROM metrics ORDER BY id\n```".into(),
        ));
        let engine = SqlLlmEngine::open(chat, &db)?;
        let out = engine.run("show me the metrics", "").await.unwrap();

        assert_eq!(
            out.table.columns,
            vec!["id", "ratio", "label", "day", "seen_at", "payload", "active"]
        );
        assert_eq!(out.table.row_count(), 2);

        let row = &out.table.rows[0];
        assert_eq!(row[0], CellValue::Int(1));
        assert_eq!(row[1], CellValue::Float(0.5));
        assert_eq!(row[2], CellValue::Text("alpha".into()));
        match &row[3] {
            CellValue::Timestamp(ts) => assert_eq!(ts.to_rfc3339(), "2024-03-01T00:00:00+00:00"),
            other => panic!("expected timestamp, got {:?}", other),
        }
        match &row[4] {
            CellValue::Timestamp(ts) => assert_eq!(ts.hour(), 12),
            other => panic!("expected timestamp, got {:?}", other),
        }
        assert_eq!(row[5], CellValue::Bytes(vec![1, 2]));
        assert_eq!(row[6], CellValue::Bool(true));
        assert_eq!(out.table.rows[1][1], CellValue::Null);
        Ok(())
    }

    #[tokio::test]
    async fn empty_result_is_ok_not_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = dir.path().join("warehouse.db");
        seed_warehouse(&db)?;

        let chat = Arc::new(ScriptedChat("SELECT id FROM metrics WHERE id > 99".into()));
        let engine = SqlLlmEngine::open(chat, &db)?;
        let out = engine.run("anything big?", "").await.unwrap();
        assert!(out.table.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn writes_are_blocked_by_readonly_connection() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = dir.path().join("warehouse.db");
        seed_warehouse(&db)?;

        // The SELECT guard catches this first; the prompt reply sneaking a
        // write past it would still hit the read-only connection.
        let chat = Arc::new(ScriptedChat("DELETE FROM metrics".into()));
        let engine = SqlLlmEngine::open(chat, &db)?;
        let err = engine.run("wipe it", "").await.unwrap_err();
        assert!(err.is_retryable());
        Ok(())
    }
}
