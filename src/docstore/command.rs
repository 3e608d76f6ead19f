//! A named binding of a filter tree to a collection.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::docstore::filter::DocFilter;

/// Declarative query command, loaded from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocCommand {
    pub id: String,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub filter: Option<DocFilter>,
}

impl DocCommand {
    /// Resolve the command's condition for a parameter bag. An empty bag or
    /// a command without a filter matches everything.
    #[must_use]
    pub fn condition(&self, params: &Map<String, Value>) -> Value {
        let Some(filter) = &self.filter else {
            return Value::Object(Map::new());
        };
        if params.is_empty() {
            return Value::Object(Map::new());
        }
        filter.condition(params).unwrap_or_else(|| Value::Object(Map::new()))
    }
}
