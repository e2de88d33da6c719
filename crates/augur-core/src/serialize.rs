//! Table rows to JSON-safe records. The conversion is total: every cell
//! maps to some JSON value, non-finite floats become null.

use crate::model::{CellValue, Table};
use serde_json::{Map, Value};

pub fn table_records(table: &Table) -> Vec<Map<String, Value>> {
    table
        .rows
        .iter()
        .map(|row| row_record(&table.columns, row))
        .collect()
}

fn row_record(columns: &[String], row: &[CellValue]) -> Map<String, Value> {
    let mut rec = Map::new();
    for (i, col) in columns.iter().enumerate() {
        let cell = row.get(i).unwrap_or(&CellValue::Null);
        rec.insert(col.clone(), cell_to_json(cell));
    }
    rec
}

pub fn cell_to_json(cell: &CellValue) -> Value {
    match cell {
        CellValue::Null => Value::Null,
        CellValue::Bool(b) => Value::Bool(*b),
        CellValue::Int(i) => Value::from(*i),
        CellValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        CellValue::Text(s) => Value::String(s.clone()),
        CellValue::Timestamp(ts) => Value::String(ts.to_rfc3339()),
        CellValue::Bytes(b) => Value::String(hex::encode(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn table() -> Table {
        Table {
            columns: vec!["n".into(), "note".into()],
            rows: vec![
                vec![CellValue::Int(1), CellValue::Text("one".into())],
                vec![CellValue::Float(f64::NAN), CellValue::Null],
            ],
        }
    }

    #[test]
    fn records_keep_column_order() {
        let recs = table_records(&table());
        let keys: Vec<&String> = recs[0].keys().collect();
        assert_eq!(keys, vec!["n", "note"]);
    }

    #[test]
    fn non_finite_floats_become_null() {
        let recs = table_records(&table());
        assert!(recs[1]["n"].is_null());
        assert_eq!(cell_to_json(&CellValue::Float(f64::INFINITY)), Value::Null);
        assert_eq!(
            cell_to_json(&CellValue::Float(f64::NEG_INFINITY)),
            Value::Null
        );
        assert_eq!(cell_to_json(&CellValue::Float(1.25)), Value::from(1.25));
    }

    #[test]
    fn records_are_json_encodable() -> anyhow::Result<()> {
        // the whole point: serde_json::to_string can never refuse these
        let recs = table_records(&table());
        let s = serde_json::to_string(&recs)?;
        assert!(s.contains("\"one\""));
        Ok(())
    }

    #[test]
    fn timestamps_render_rfc3339() {
        let ts = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(
            cell_to_json(&CellValue::Timestamp(ts)),
            Value::String("2024-03-01T12:30:00+00:00".into())
        );
    }

    #[test]
    fn bytes_render_hex() {
        assert_eq!(
            cell_to_json(&CellValue::Bytes(vec![0xde, 0xad])),
            Value::String("dead".into())
        );
    }

    #[test]
    fn short_rows_pad_with_null() {
        let t = Table {
            columns: vec!["a".into(), "b".into()],
            rows: vec![vec![CellValue::Int(1)]],
        };
        let recs = table_records(&t);
        assert_eq!(recs[0]["a"], Value::from(1));
        assert!(recs[0]["b"].is_null());
    }
}
