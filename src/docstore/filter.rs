//! Composable document query filters.
//!
//! DESIGN
//! ======
//! A filter is a tree of leaves and AND/OR composites. Evaluation takes a
//! parameter bag and produces a partial condition: a leaf whose parameter is
//! absent contributes nothing, and a composite with no contributing child
//! evaluates to `None` rather than an empty clause. Dates travel through
//! leaf templates behind the `$Date$` marker and come out as canonical
//! `{"$date": <rfc3339>}` values, so a date survives the template round trip
//! exactly.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Marker prefix tagging a string as a date literal inside a template.
pub const DATE_MARKER: &str = "$Date$";

/// Key under which revived dates appear in a condition.
pub const DATE_KEY: &str = "$date";

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("condition is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("bad date literal [{0}]")]
    Date(String),
}

// =============================================================================
// FILTER TREE
// =============================================================================

/// One node of a document filter tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocFilter {
    /// Templated condition bound to one parameter key. `{0}` in the template
    /// is replaced by the bag value for `key`.
    Leaf { key: String, condition: String },
    And { filters: Vec<DocFilter> },
    Or { filters: Vec<DocFilter> },
}

enum Logic {
    And,
    Or,
}

impl DocFilter {
    /// Evaluate the tree against a parameter bag. `None` means the node
    /// contributes no condition at all.
    #[must_use]
    pub fn condition(&self, params: &Map<String, Value>) -> Option<Value> {
        match self {
            Self::Leaf { key, condition } => leaf_condition(key, condition, params),
            Self::And { filters } => composite_condition(filters, &Logic::And, params),
            Self::Or { filters } => composite_condition(filters, &Logic::Or, params),
        }
    }
}

fn composite_condition(
    children: &[DocFilter],
    logic: &Logic,
    params: &Map<String, Value>,
) -> Option<Value> {
    let mut and = Map::new();
    let mut or: Vec<Value> = Vec::new();
    for child in children {
        let Some(condition) = child.condition(params) else {
            continue;
        };
        match logic {
            Logic::And => merge_into(&mut and, condition),
            Logic::Or => or.push(condition),
        }
    }
    if !or.is_empty() {
        and.insert("$or".to_owned(), Value::Array(or));
    }
    if and.is_empty() { None } else { Some(Value::Object(and)) }
}

/// Merge `addition` into `target`, recursing where both sides hold objects
/// under the same key so sibling leaves can extend one field's operators.
fn merge_into(target: &mut Map<String, Value>, addition: Value) {
    let Value::Object(addition) = addition else {
        return;
    };
    for (key, value) in addition {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                for (k, v) in incoming {
                    existing.insert(k, v);
                }
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

fn leaf_condition(key: &str, template: &str, params: &Map<String, Value>) -> Option<Value> {
    let value = params.get(key)?;
    if value.is_null() {
        return None;
    }
    let rendered = render_template(template, value);
    match parse_condition(&rendered) {
        Ok(condition) => Some(condition),
        Err(error) => {
            // One malformed leaf must not abort the rest of the tree.
            tracing::warn!(key, %error, "filter condition skipped");
            None
        }
    }
}

fn render_template(template: &str, value: &Value) -> String {
    let inline = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    template.replace("{0}", &inline)
}

fn parse_condition(rendered: &str) -> Result<Value, FilterError> {
    let value: Value = serde_json::from_str(rendered)?;
    revive_dates(value)
}

/// Walk a parsed condition, replacing every `$Date$`-tagged string with the
/// canonical date form.
fn revive_dates(value: Value) -> Result<Value, FilterError> {
    match value {
        Value::String(s) if s.starts_with(DATE_MARKER) => {
            let raw = &s[DATE_MARKER.len()..];
            let parsed =
                OffsetDateTime::parse(raw, &Rfc3339).map_err(|_| FilterError::Date(s.clone()))?;
            let canonical =
                parsed.format(&Rfc3339).map_err(|_| FilterError::Date(s.clone()))?;
            let mut date = Map::new();
            date.insert(DATE_KEY.to_owned(), Value::String(canonical));
            Ok(Value::Object(date))
        }
        Value::Array(items) => Ok(Value::Array(
            items.into_iter().map(revive_dates).collect::<Result<Vec<_>, _>>()?,
        )),
        Value::Object(map) => Ok(Value::Object(
            map.into_iter()
                .map(|(k, v)| revive_dates(v).map(|v| (k, v)))
                .collect::<Result<Map<String, Value>, _>>()?,
        )),
        other => Ok(other),
    }
}

// =============================================================================
// DATE HELPERS
// =============================================================================

/// Encode a date as a marker-tagged parameter value for leaf templates.
///
/// # Errors
///
/// Returns [`FilterError::Date`] if the instant cannot be formatted.
pub fn date_param(instant: OffsetDateTime) -> Result<Value, FilterError> {
    let formatted = instant
        .format(&Rfc3339)
        .map_err(|e| FilterError::Date(e.to_string()))?;
    Ok(Value::String(format!("{DATE_MARKER}{formatted}")))
}

/// Read a canonical `{"$date": …}` value back into an instant.
#[must_use]
pub fn extract_date(value: &Value) -> Option<OffsetDateTime> {
    let raw = value.as_object()?.get(DATE_KEY)?.as_str()?;
    OffsetDateTime::parse(raw, &Rfc3339).ok()
}

#[cfg(test)]
#[path = "filter_test.rs"]
mod tests;
