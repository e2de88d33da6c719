use crate::model::AnswerResult;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Suggested-question row without its vector.
#[derive(Debug, Clone)]
pub struct StoredQuestion {
    pub id: i64,
    pub question: String,
}

/// Suggested-question row with its raw embedding blob. Decoding is left to
/// the caller so that a corrupt blob can be treated differently from a
/// database failure.
#[derive(Debug, Clone)]
pub struct EmbeddedQuestion {
    pub id: i64,
    pub question: String,
    pub embedding: Vec<u8>,
    pub dims: i64,
}

#[derive(Clone)]
pub struct Store {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(crate::storage::schema::DDL)?;
        Ok(())
    }

    // questions

    pub fn insert_question(&self, persona: &str, question: &str, vec: &[f32]) -> anyhow::Result<i64> {
        let blob = crate::embeddings::encode_f32(vec);
        let dims = vec.len() as i64;
        let created_at = now_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO questions(persona, question, embedding, dims, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![persona, question, blob, dims, created_at],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn count_questions(&self, persona: &str) -> anyhow::Result<i64> {
        let conn = self.conn.lock().unwrap();
        let n = conn.query_row(
            "SELECT count(*) FROM questions WHERE persona=?1",
            params![persona],
            |r| r.get(0),
        )?;
        Ok(n)
    }

    /// All questions for a persona in ascending id order, blobs included.
    pub fn questions_with_embeddings(&self, persona: &str) -> anyhow::Result<Vec<EmbeddedQuestion>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, question, embedding, dims FROM questions
             WHERE persona=?1 ORDER BY id ASC",
        )?;
        let mut rows = stmt.query(params![persona])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(EmbeddedQuestion {
                id: row.get(0)?,
                question: row.get(1)?,
                embedding: row.get(2)?,
                dims: row.get(3)?,
            });
        }
        Ok(out)
    }

    /// Smallest id strictly greater than `id` within the persona.
    pub fn question_after(&self, persona: &str, id: i64) -> anyhow::Result<Option<StoredQuestion>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, question FROM questions
             WHERE persona=?1 AND id>?2 ORDER BY id ASC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![persona, id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(StoredQuestion {
                id: row.get(0)?,
                question: row.get(1)?,
            }))
        } else {
            Ok(None)
        }
    }

    pub fn first_question(&self, persona: &str) -> anyhow::Result<Option<StoredQuestion>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, question FROM questions
             WHERE persona=?1 ORDER BY id ASC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![persona])?;
        if let Some(row) = rows.next()? {
            Ok(Some(StoredQuestion {
                id: row.get(0)?,
                question: row.get(1)?,
            }))
        } else {
            Ok(None)
        }
    }

    // answer cache

    pub fn cache_get(&self, key: &str) -> anyhow::Result<Option<AnswerResult>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT payload_json FROM answer_cache WHERE key=?1")?;
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            let s: String = row.get(0)?;
            let result: AnswerResult = serde_json::from_str(&s)?;
            Ok(Some(result))
        } else {
            Ok(None)
        }
    }

    /// First write wins; a later put for the same key is a no-op.
    pub fn cache_put(&self, key: &str, result: &AnswerResult) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        let created_at = now_rfc3339();
        conn.execute(
            "INSERT OR IGNORE INTO answer_cache(key, payload_json, created_at)
             VALUES (?1, ?2, ?3)",
            params![key, serde_json::to_string(result)?, created_at],
        )?;
        Ok(())
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
