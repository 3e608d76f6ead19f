//! Relational data service — command resolution, execution, normalization.

use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::dispatch::{self, CallContext, DispatchError, Service};
use crate::sqlstore::command::{SqlCommand, SqlStatement};
use crate::sqlstore::store::{RelationStore, StoreError};
use crate::sqlstore::table::DataTable;

const OPERATIONS: &[&str] = &["query", "count"];

/// Query service over a relational store: a driver handle plus an ordered
/// list of commands with unique ids.
pub struct SqlDataService {
    store: Option<Arc<dyn RelationStore>>,
    commands: Vec<SqlCommand>,
}

impl SqlDataService {
    #[must_use]
    pub fn new(store: Option<Arc<dyn RelationStore>>) -> Self {
        Self { store, commands: Vec::new() }
    }

    #[must_use]
    pub fn with_commands(mut self, commands: Vec<SqlCommand>) -> Self {
        self.commands = commands;
        self
    }

    fn resolve(&self, command_id: &str) -> Result<(&SqlCommand, &str, &Arc<dyn RelationStore>), DispatchError> {
        let store = self.store.as_ref().ok_or(DispatchError::NoStorageBound)?;
        let command = self
            .commands
            .iter()
            .find(|c| c.id == command_id)
            .ok_or_else(|| DispatchError::CommandNotFound(command_id.to_owned()))?;
        let table = command
            .table
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DispatchError::MissingCollectionOrTable(command_id.to_owned()))?;
        Ok((command, table, store))
    }

    /// Run a command and return the normalized table. `max_count = 0` means
    /// unbounded.
    ///
    /// # Errors
    ///
    /// The wiring family (`CommandNotFound`, `NoStorageBound`,
    /// `MissingCollectionOrTable`), `CommandTemplate` for slot mismatches,
    /// and `Driver` for execution failures.
    pub async fn query(
        &self,
        command_id: &str,
        params: &Map<String, Value>,
        start_index: u64,
        max_count: u64,
    ) -> Result<DataTable, DispatchError> {
        let (command, table, store) = self.resolve(command_id)?;
        let statement = paginate(command.render(params)?, start_index, max_count);
        let rows = store
            .query(&statement.text, &statement.params)
            .await
            .map_err(|e| driver(&statement.text, e))?;
        Ok(DataTable::from_rows(table, &command.primary_key_fields, rows))
    }

    /// Run a command and return only the matching cardinality.
    ///
    /// # Errors
    ///
    /// Same family as [`SqlDataService::query`].
    pub async fn count(
        &self,
        command_id: &str,
        params: &Map<String, Value>,
    ) -> Result<u64, DispatchError> {
        let (command, _, store) = self.resolve(command_id)?;
        let statement = command.render(params)?;
        let text = format!("SELECT COUNT(*) AS count FROM ({}) AS t", statement.text);
        let rows = store
            .query(&text, &statement.params)
            .await
            .map_err(|e| driver(&text, e))?;
        let count = rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_u64)
            .ok_or_else(|| DispatchError::Driver("count query returned no cardinality".into()))?;
        Ok(count)
    }
}

fn paginate(mut statement: SqlStatement, start_index: u64, max_count: u64) -> SqlStatement {
    if max_count > 0 {
        let _ = write!(statement.text, " LIMIT {max_count}");
    }
    if start_index > 0 {
        let _ = write!(statement.text, " OFFSET {start_index}");
    }
    statement
}

fn driver(statement: &str, error: StoreError) -> DispatchError {
    DispatchError::Driver(format!("statement [{statement}] failed: {error}"))
}

#[async_trait]
impl Service for SqlDataService {
    fn operations(&self) -> &[&str] {
        OPERATIONS
    }

    async fn invoke(
        &self,
        _ctx: &CallContext,
        function: &str,
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        match function {
            "query" => {
                let command_id = dispatch::arg_str(args, 0, "command")?;
                let params = dispatch::arg_object(args, 1, "params")?;
                let start_index = dispatch::arg_u64(args, 2, "start_index", 0)?;
                let max_count = dispatch::arg_u64(args, 3, "max_count", 0)?;
                let table = self.query(command_id, &params, start_index, max_count).await?;
                serde_json::to_value(table).map_err(|e| DispatchError::Driver(e.to_string()))
            }
            "count" => {
                let command_id = dispatch::arg_str(args, 0, "command")?;
                let params = dispatch::arg_object(args, 1, "params")?;
                let count = self.count(command_id, &params).await?;
                Ok(Value::from(count))
            }
            other => Err(DispatchError::FunctionNotFound(other.to_owned())),
        }
    }
}

#[cfg(test)]
#[path = "service_test.rs"]
mod tests;
