//! Driver boundary for relational stores, plus the Postgres adapter.

use async_trait::async_trait;
use serde_json::{Map, Number, Value};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row, TypeInfo};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("query failed: {0}")]
    Query(String),
}

/// Executes one parameterized statement and returns generic rows. The `?`
/// placeholder convention of the filter layer is the trait's contract;
/// adapters translate to their driver's syntax.
#[async_trait]
pub trait RelationStore: Send + Sync {
    async fn query(
        &self,
        statement: &str,
        params: &[Value],
    ) -> Result<Vec<Map<String, Value>>, StoreError>;
}

// =============================================================================
// POSTGRES ADAPTER
// =============================================================================

pub struct PgRelationStore {
    pool: PgPool,
}

impl PgRelationStore {
    /// Connect a pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connect`] when the pool cannot be established.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RelationStore for PgRelationStore {
    async fn query(
        &self,
        statement: &str,
        params: &[Value],
    ) -> Result<Vec<Map<String, Value>>, StoreError> {
        let sql = number_placeholders(statement);
        let mut query = sqlx::query(&sql);
        for param in params {
            query = match param {
                Value::Null => query.bind(Option::<String>::None),
                Value::Bool(b) => query.bind(*b),
                Value::Number(n) if n.is_i64() => query.bind(n.as_i64()),
                Value::Number(n) => query.bind(n.as_f64()),
                Value::String(s) => query.bind(s.clone()),
                other => query.bind(other.clone()),
            };
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        rows.iter().map(row_to_map).collect()
    }
}

/// Rewrite `?` placeholders to Postgres `$1`, `$2`… numbering, leaving
/// quoted literals untouched.
fn number_placeholders(statement: &str) -> String {
    let mut out = String::with_capacity(statement.len() + 8);
    let mut index = 0usize;
    let mut in_string = false;
    for ch in statement.chars() {
        match ch {
            '\'' => {
                in_string = !in_string;
                out.push(ch);
            }
            '?' if !in_string => {
                index += 1;
                out.push('$');
                out.push_str(&index.to_string());
            }
            _ => out.push(ch),
        }
    }
    out
}

fn row_to_map(row: &PgRow) -> Result<Map<String, Value>, StoreError> {
    let mut out = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, i, column.type_info().name())
            .map_err(|e| StoreError::Query(format!("column [{}]: {e}", column.name())))?;
        out.insert(column.name().to_owned(), value);
    }
    Ok(out)
}

fn decode_column(row: &PgRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    let value = match type_name {
        "INT2" => row
            .try_get::<Option<i16>, _>(index)?
            .map(|v| Value::Number(Number::from(v))),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)?
            .map(|v| Value::Number(Number::from(v))),
        "INT8" => row
            .try_get::<Option<i64>, _>(index)?
            .map(|v| Value::Number(Number::from(v))),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)?
            .and_then(|v| Number::from_f64(f64::from(v)).map(Value::Number)),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)?
            .and_then(|v| Number::from_f64(v).map(Value::Number)),
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(Value::Bool),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(index)?,
        "TIMESTAMPTZ" => row
            .try_get::<Option<OffsetDateTime>, _>(index)?
            .and_then(|v| v.format(&Rfc3339).ok())
            .map(Value::String),
        _ => row.try_get::<Option<String>, _>(index)?.map(Value::String),
    };
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered_in_order() {
        assert_eq!(
            number_placeholders("SELECT * FROM t WHERE a = ? AND b = ?"),
            "SELECT * FROM t WHERE a = $1 AND b = $2"
        );
    }

    #[test]
    fn placeholders_inside_string_literals_survive() {
        assert_eq!(
            number_placeholders("SELECT '?' AS q FROM t WHERE a = ?"),
            "SELECT '?' AS q FROM t WHERE a = $1"
        );
    }

    #[test]
    fn statement_without_placeholders_is_unchanged() {
        assert_eq!(number_placeholders("SELECT 1"), "SELECT 1");
    }

    #[cfg(feature = "live-db-tests")]
    #[tokio::test]
    async fn live_select_one() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let store = PgRelationStore::connect(&url, 2).await.unwrap();
        let rows = store.query("SELECT 1 AS one", &[]).await.unwrap();
        assert_eq!(rows[0]["one"], Value::Number(Number::from(1)));
    }
}
