//! Raw-statement commands with positional filter slots.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dispatch::DispatchError;
use crate::sqlstore::filter::SqlFilter;

/// Inert filler substituted for a filter that contributes nothing, so the
/// statement stays well-formed and the slot count stays stable.
pub const TRUE_FILTER: &str = "1=1";

/// A rendered, executable statement: text plus positional arguments in
/// placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub text: String,
    pub params: Vec<Value>,
}

/// Declarative relational command, loaded from configuration. The statement
/// is a template whose `{0}`, `{1}`… slots are filled, in declared order, by
/// the fragments of `filters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlCommand {
    pub id: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub primary_key_fields: Vec<String>,
    pub statement: String,
    #[serde(default)]
    pub filters: Vec<SqlFilter>,
}

impl SqlCommand {
    /// Render the statement for a parameter bag.
    ///
    /// # Errors
    ///
    /// [`DispatchError::CommandTemplate`] when the statement's slots do not
    /// line up one-to-one with the declared filters. The check runs here,
    /// at first use, not at construction — templates are config, and config
    /// is validated when it is exercised.
    pub fn render(&self, params: &Map<String, Value>) -> Result<SqlStatement, DispatchError> {
        let mut fragments: Vec<String> = Vec::with_capacity(self.filters.len());
        let mut bound: Vec<Value> = Vec::new();
        for filter in &self.filters {
            match filter.fragment(params) {
                Some(fragment) => {
                    bound.extend(fragment.params);
                    fragments.push(fragment.sql);
                }
                None => fragments.push(TRUE_FILTER.to_owned()),
            }
        }
        let text = self.substitute(&fragments)?;
        Ok(SqlStatement { text, params: bound })
    }

    fn substitute(&self, fragments: &[String]) -> Result<String, DispatchError> {
        let mut out = String::with_capacity(self.statement.len());
        let mut seen = vec![false; fragments.len()];
        let mut rest = self.statement.as_str();

        while let Some(open) = rest.find('{') {
            let (head, tail) = rest.split_at(open);
            out.push_str(head);
            let Some(close) = tail.find('}') else {
                // No closing brace: not a slot, keep the text as-is.
                out.push_str(tail);
                rest = "";
                break;
            };
            let slot = &tail[1..close];
            match slot.parse::<usize>() {
                Ok(index) if index < fragments.len() => {
                    if seen[index] {
                        return Err(self.template_error(format!("slot {{{index}}} used twice")));
                    }
                    seen[index] = true;
                    out.push_str(&fragments[index]);
                }
                Ok(index) => {
                    return Err(self.template_error(format!(
                        "slot {{{index}}} exceeds the {} declared filter(s)",
                        fragments.len()
                    )));
                }
                Err(_) => {
                    // Braced text that is not a number passes through.
                    out.push_str(&tail[..=close]);
                }
            }
            rest = &tail[close + 1..];
        }
        out.push_str(rest);

        if let Some(unused) = seen.iter().position(|used| !used) {
            return Err(self.template_error(format!(
                "filter {unused} has no matching slot in the statement"
            )));
        }
        Ok(out)
    }

    fn template_error(&self, detail: String) -> DispatchError {
        DispatchError::CommandTemplate(format!("command [{}]: {detail}", self.id))
    }
}

#[cfg(test)]
#[path = "command_test.rs"]
mod tests;
