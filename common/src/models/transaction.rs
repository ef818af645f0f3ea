//! Stored-procedure result models.
//!
//! The procedure has no fixed schema: column names come from the result
//! metadata of each execution and every row is re-keyed by them.

use serde::Serialize;
use serde_json::{Map, Value};

/// One returned row, keyed by column name in metadata order.
pub type TransactionRecord = Map<String, Value>;

/// Raw tabular result of a procedure call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    /// Column names in the order the driver reported them.
    pub columns: Vec<String>,
    /// Row values, positionally aligned with `columns`.
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Creates a result set.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows were returned.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Pairs each row with the column names.
    ///
    /// Values are matched positionally and the shorter side wins. A repeated
    /// column name keeps its first position and takes the last value.
    pub fn into_records(self) -> Vec<TransactionRecord> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .cloned()
                    .zip(row)
                    .collect::<TransactionRecord>()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_records_keep_column_order() {
        let set = ResultSet::new(
            columns(&["TransID", "Date", "Amount"]),
            vec![
                vec![json!(1), json!("2024-01-01"), json!(100.0)],
                vec![json!(2), json!("2024-01-02"), json!(-50.0)],
            ],
        );

        let records = set.into_records();
        assert_eq!(records.len(), 2);
        for record in &records {
            let keys: Vec<&str> = record.keys().map(String::as_str).collect();
            assert_eq!(keys, ["TransID", "Date", "Amount"]);
        }
        assert_eq!(
            serde_json::to_string(&records).unwrap(),
            r#"[{"TransID":1,"Date":"2024-01-01","Amount":100.0},{"TransID":2,"Date":"2024-01-02","Amount":-50.0}]"#
        );
    }

    #[test]
    fn test_order_is_not_alphabetical() {
        let set = ResultSet::new(columns(&["z", "a", "m"]), vec![vec![json!(1), json!(2), json!(3)]]);
        let record = &set.into_records()[0];
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn test_mismatched_row_width_is_truncated() {
        let set = ResultSet::new(
            columns(&["a", "b"]),
            vec![vec![json!(1)], vec![json!(1), json!(2), json!(3)]],
        );
        let records = set.into_records();
        assert_eq!(Value::Object(records[0].clone()), json!({"a": 1}));
        assert_eq!(Value::Object(records[1].clone()), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_duplicate_column_takes_last_value() {
        let set = ResultSet::new(
            columns(&["id", "name", "id"]),
            vec![vec![json!(1), json!("x"), json!(2)]],
        );
        let record = &set.into_records()[0];
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, ["id", "name"]);
        assert_eq!(record["id"], json!(2));
    }

    #[test]
    fn test_empty_result_set() {
        let set = ResultSet::new(columns(&["a"]), vec![]);
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        assert!(set.into_records().is_empty());
    }
}
