use augur_core::model::AnswerResult;
use augur_core::storage::Store;
use tempfile::tempdir;

#[test]
fn question_store_lifecycle() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("augur.db");

    let store = Store::open(&db_path)?;
    store.init_schema()?;
    // reopening must not clobber anything
    store.init_schema()?;

    let a = store.insert_question("sales", "How many orders last week?", &[1.0, 0.0])?;
    let b = store.insert_question("sales", "Which region grew fastest?", &[0.0, 1.0])?;
    let c = store.insert_question("hr", "How many hires this month?", &[0.5, 0.5])?;
    assert!(a < b && b < c);

    assert_eq!(store.count_questions("sales")?, 2);
    assert_eq!(store.count_questions("hr")?, 1);
    assert_eq!(store.count_questions("nobody")?, 0);

    let sales = store.questions_with_embeddings("sales")?;
    assert_eq!(sales.len(), 2);
    assert_eq!(sales[0].id, a);
    assert_eq!(sales[0].dims, 2);
    assert_eq!(sales[1].question, "Which region grew fastest?");

    let first = store.first_question("sales")?.unwrap();
    assert_eq!(first.id, a);

    let after = store.question_after("sales", a)?.unwrap();
    assert_eq!(after.id, b);
    // persona partition: hr's question is not sales' successor
    assert!(store.question_after("sales", b)?.is_none());

    // verify the raw rows landed where expected
    let conn = rusqlite::Connection::open(&db_path)?;
    let count: i64 = conn.query_row("SELECT count(*) FROM questions", [], |r| r.get(0))?;
    assert_eq!(count, 3);

    Ok(())
}

#[test]
fn answer_cache_first_write_wins() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let store = Store::open(&dir.path().join("augur.db"))?;
    store.init_schema()?;

    let key = "How many orders last week?";
    assert!(store.cache_get(key)?.is_none());

    let first = AnswerResult::Text {
        content: "42 orders.".into(),
        next_question: Some("Which region grew fastest?".into()),
    };
    store.cache_put(key, &first)?;
    assert_eq!(store.cache_get(key)?.unwrap(), first);

    // a losing concurrent writer is ignored, the stored answer stays
    let second = AnswerResult::Text {
        content: "43 orders.".into(),
        next_question: None,
    };
    store.cache_put(key, &second)?;
    assert_eq!(store.cache_get(key)?.unwrap(), first);

    // keys are the raw question text, whitespace and case included
    assert!(store.cache_get("how many orders last week?")?.is_none());

    Ok(())
}
