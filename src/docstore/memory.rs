//! In-process document store.
//!
//! Implements the driver boundary over a shared map of collections. Supports
//! the condition shapes the filter layer emits: field equality, `$or`,
//! ordering operators, and canonical `$date` values.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;

use crate::docstore::filter::extract_date;
use crate::docstore::store::{DocumentConnection, DocumentPool, StoreError};

type Collections = Arc<RwLock<HashMap<String, Vec<Value>>>>;

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: Collections,
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a collection's contents. Bootstrap/test helper.
    pub fn seed(&self, collection: &str, documents: Vec<Value>) {
        let mut collections =
            self.collections.write().unwrap_or_else(PoisonError::into_inner);
        collections.insert(collection.to_owned(), documents);
    }
}

#[async_trait]
impl DocumentPool for MemoryDocumentStore {
    async fn acquire(&self) -> Result<Box<dyn DocumentConnection>, StoreError> {
        Ok(Box::new(MemoryConnection { collections: Arc::clone(&self.collections) }))
    }
}

struct MemoryConnection {
    collections: Collections,
}

#[async_trait]
impl DocumentConnection for MemoryConnection {
    async fn select(
        &self,
        collection: &str,
        condition: &Value,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        let rows = collections.get(collection).cloned().unwrap_or_default();
        let matched = rows.into_iter().filter(|doc| matches(doc, condition));
        let skipped = matched.skip(usize::try_from(skip).unwrap_or(usize::MAX));
        let bounded: Vec<Value> = if limit == 0 {
            skipped.collect()
        } else {
            skipped.take(usize::try_from(limit).unwrap_or(usize::MAX)).collect()
        };
        Ok(bounded)
    }

    async fn count(&self, collection: &str, condition: &Value) -> Result<u64, StoreError> {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        let count = collections
            .get(collection)
            .map(|rows| rows.iter().filter(|doc| matches(doc, condition)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn insert(&self, collection: &str, documents: Vec<Value>) -> Result<u64, StoreError> {
        let inserted = documents.len() as u64;
        let mut collections =
            self.collections.write().unwrap_or_else(PoisonError::into_inner);
        collections.entry(collection.to_owned()).or_default().extend(documents);
        Ok(inserted)
    }

    async fn update(
        &self,
        collection: &str,
        condition: &Value,
        document: &Value,
    ) -> Result<u64, StoreError> {
        let Value::Object(patch) = document else {
            return Err(StoreError::Query("update document must be an object".into()));
        };
        let mut collections =
            self.collections.write().unwrap_or_else(PoisonError::into_inner);
        let Some(rows) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let mut updated = 0;
        for row in rows.iter_mut() {
            if !matches(row, condition) {
                continue;
            }
            if let Value::Object(fields) = row {
                for (k, v) in patch {
                    fields.insert(k.clone(), v.clone());
                }
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn close(&self) {}
}

// =============================================================================
// CONDITION MATCHING
// =============================================================================

fn matches(doc: &Value, condition: &Value) -> bool {
    let Value::Object(clauses) = condition else {
        return true;
    };
    clauses.iter().all(|(key, expected)| match key.as_str() {
        "$or" => expected
            .as_array()
            .is_some_and(|alternatives| alternatives.iter().any(|alt| matches(doc, alt))),
        field => field_matches(doc.get(field), expected),
    })
}

fn field_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match expected {
        Value::Object(spec) if is_operator_spec(spec) => spec
            .iter()
            .all(|(op, operand)| operator_matches(actual, op, operand)),
        _ => actual.is_some_and(|actual| values_equal(actual, expected)),
    }
}

fn is_operator_spec(spec: &serde_json::Map<String, Value>) -> bool {
    !spec.is_empty() && spec.keys().all(|k| k.starts_with('$') && k != "$date")
}

fn operator_matches(actual: Option<&Value>, op: &str, operand: &Value) -> bool {
    let Some(actual) = actual else {
        return false;
    };
    let Some(ordering) = compare(actual, operand) else {
        return false;
    };
    match op {
        "$gt" => ordering.is_gt(),
        "$gte" => ordering.is_ge(),
        "$lt" => ordering.is_lt(),
        "$lte" => ordering.is_le(),
        "$ne" => ordering.is_ne(),
        "$eq" => ordering.is_eq(),
        _ => false,
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    compare(actual, expected).is_some_and(std::cmp::Ordering::is_eq) || actual == expected
}

/// Order two values when they share a comparable shape: dates, numbers, or
/// strings.
fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(l), Some(r)) = (date_of(left), date_of(right)) {
        return Some(l.cmp(&r));
    }
    if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
        return l.partial_cmp(&r);
    }
    if let (Some(l), Some(r)) = (left.as_str(), right.as_str()) {
        return Some(l.cmp(r));
    }
    None
}

fn date_of(value: &Value) -> Option<OffsetDateTime> {
    extract_date(value)
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
