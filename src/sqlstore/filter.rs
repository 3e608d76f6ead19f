//! Composable SQL filter fragments.
//!
//! DESIGN
//! ======
//! Each node renders to an optional [`SqlFragment`] — SQL text plus the
//! positional arguments for its placeholders, produced by one traversal so
//! text and arguments can never drift apart. A clause whose parameter is
//! absent contributes nothing; a composite with no contributing child
//! renders to `None`; two or more contributions are parenthesized.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Rendered filter output: SQL text and its positional arguments, in
/// placeholder order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<Value>,
}

/// One node of a SQL filter tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SqlFilter {
    /// Parameterized clause bound to one bag key, e.g.
    /// `{ key: "name", sql: "user_name = ?" }`.
    Clause { key: String, sql: String },
    /// Unconditional fragment with no parameters — group-by, having, limit.
    Raw { sql: String },
    And { filters: Vec<SqlFilter> },
    Or { filters: Vec<SqlFilter> },
}

impl SqlFilter {
    /// Render against a parameter bag. `None` means no contribution.
    #[must_use]
    pub fn fragment(&self, params: &Map<String, Value>) -> Option<SqlFragment> {
        match self {
            Self::Clause { key, sql } => clause_fragment(key, sql, params),
            Self::Raw { sql } => Some(SqlFragment { sql: sql.clone(), params: Vec::new() }),
            Self::And { filters } => composite_fragment(filters, "AND", params),
            Self::Or { filters } => composite_fragment(filters, "OR", params),
        }
    }

    /// Wrap `filters` in an AND composite and append it as a child.
    #[must_use]
    pub fn and(mut self, filters: Vec<SqlFilter>) -> Self {
        self.push_child(Self::And { filters });
        self
    }

    /// Wrap `filters` in an OR composite and append it as a child.
    #[must_use]
    pub fn or(mut self, filters: Vec<SqlFilter>) -> Self {
        self.push_child(Self::Or { filters });
        self
    }

    /// Append `filters` verbatim, without a wrapping composite. Used for
    /// non-boolean clauses appended after the where tree.
    #[must_use]
    pub fn add(mut self, filters: Vec<SqlFilter>) -> Self {
        for filter in filters {
            self.push_child(filter);
        }
        self
    }

    /// Appending to a leaf first promotes it to an AND composite over
    /// itself, the default composition.
    fn push_child(&mut self, child: SqlFilter) {
        match self {
            Self::And { filters } | Self::Or { filters } => filters.push(child),
            Self::Clause { .. } | Self::Raw { .. } => {
                let leaf = self.clone();
                *self = Self::And { filters: vec![leaf, child] };
            }
        }
    }
}

fn clause_fragment(key: &str, sql: &str, params: &Map<String, Value>) -> Option<SqlFragment> {
    let value = params.get(key)?;
    match value {
        Value::Null => None,
        Value::Array(_) | Value::Object(_) => {
            // A broken clause must not abort the rest of the tree.
            tracing::warn!(key, "filter parameter is not a scalar; clause skipped");
            None
        }
        scalar => Some(SqlFragment { sql: sql.to_owned(), params: vec![scalar.clone()] }),
    }
}

fn composite_fragment(
    children: &[SqlFilter],
    sign: &str,
    params: &Map<String, Value>,
) -> Option<SqlFragment> {
    let mut sql = String::new();
    let mut bound: Vec<Value> = Vec::new();
    let mut contributors = 0usize;
    for child in children {
        let Some(fragment) = child.fragment(params) else {
            continue;
        };
        if contributors > 0 {
            sql.push(' ');
            sql.push_str(sign);
            sql.push(' ');
        }
        sql.push_str(&fragment.sql);
        bound.extend(fragment.params);
        contributors += 1;
    }
    match contributors {
        0 => None,
        1 => Some(SqlFragment { sql, params: bound }),
        _ => Some(SqlFragment { sql: format!("({sql})"), params: bound }),
    }
}

#[cfg(test)]
#[path = "filter_test.rs"]
mod tests;
