//! Uniform tabular result shape.

use serde::Serialize;
use serde_json::{Map, Value};

/// Normalized query result: raw driver rows keyed by the command's declared
/// table and primary-key metadata.
#[derive(Debug, Clone, Serialize)]
pub struct DataTable {
    pub name: String,
    pub primary_key: Vec<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl DataTable {
    /// Build a table from raw rows. Column order is taken from the first
    /// row; rows missing a column simply serialize without it.
    #[must_use]
    pub fn from_rows(name: &str, primary_key: &[String], rows: Vec<Map<String, Value>>) -> Self {
        let columns = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        Self {
            name: name.to_owned(),
            primary_key: primary_key.to_vec(),
            columns,
            rows,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Compose a row's primary-key value, joining multi-column keys with
    /// `|`. `None` when any key column is absent.
    #[must_use]
    pub fn key_of(&self, row: &Map<String, Value>) -> Option<String> {
        let mut parts = Vec::with_capacity(self.primary_key.len());
        for column in &self.primary_key {
            let value = row.get(column)?;
            match value {
                Value::String(s) => parts.push(s.clone()),
                other => parts.push(other.to_string()),
            }
        }
        if parts.is_empty() { None } else { Some(parts.join("|")) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
    }

    #[test]
    fn columns_come_from_first_row() {
        let table = DataTable::from_rows(
            "users",
            &["user_id".to_owned()],
            vec![row(&[("user_id", json!(1)), ("name", json!("ada"))])],
        );
        assert_eq!(table.columns, vec!["name", "user_id"]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn empty_result_has_no_columns() {
        let table = DataTable::from_rows("users", &[], vec![]);
        assert!(table.is_empty());
        assert!(table.columns.is_empty());
    }

    #[test]
    fn key_of_joins_composite_keys() {
        let table = DataTable::from_rows(
            "memberships",
            &["org".to_owned(), "user_id".to_owned()],
            vec![],
        );
        let key = table.key_of(&row(&[("org", json!("acme")), ("user_id", json!(7))]));
        assert_eq!(key.as_deref(), Some("acme|7"));
    }

    #[test]
    fn key_of_missing_column_is_none() {
        let table = DataTable::from_rows("users", &["user_id".to_owned()], vec![]);
        assert!(table.key_of(&row(&[("name", json!("ada"))])).is_none());
    }

    #[test]
    fn serializes_with_rows_inline() {
        let table = DataTable::from_rows(
            "users",
            &["user_id".to_owned()],
            vec![row(&[("user_id", json!(1))])],
        );
        let value = serde_json::to_value(&table).unwrap();
        assert_eq!(value["name"], json!("users"));
        assert_eq!(value["rows"][0]["user_id"], json!(1));
    }
}
