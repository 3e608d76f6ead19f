//! Document data service — command resolution and query execution.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::dispatch::{self, CallContext, DispatchError, Service};
use crate::docstore::command::DocCommand;
use crate::docstore::store::{DocumentPool, StoreError};

const OPERATIONS: &[&str] = &["query", "count"];

/// Query service over a document store: a connection pool plus an ordered
/// list of commands with unique ids.
pub struct DocDataService {
    pool: Option<Arc<dyn DocumentPool>>,
    commands: Vec<DocCommand>,
}

impl DocDataService {
    #[must_use]
    pub fn new(pool: Option<Arc<dyn DocumentPool>>) -> Self {
        Self { pool, commands: Vec::new() }
    }

    #[must_use]
    pub fn with_commands(mut self, commands: Vec<DocCommand>) -> Self {
        self.commands = commands;
        self
    }

    /// Check the service/command wiring and hand back what a call needs.
    fn resolve(&self, command_id: &str) -> Result<(&DocCommand, &str, &Arc<dyn DocumentPool>), DispatchError> {
        let pool = self.pool.as_ref().ok_or(DispatchError::NoStorageBound)?;
        let command = self
            .commands
            .iter()
            .find(|c| c.id == command_id)
            .ok_or_else(|| DispatchError::CommandNotFound(command_id.to_owned()))?;
        let collection = command
            .collection
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| DispatchError::MissingCollectionOrTable(command_id.to_owned()))?;
        Ok((command, collection, pool))
    }

    /// Run a command and return matching documents. `max_count = 0` means
    /// unbounded.
    ///
    /// # Errors
    ///
    /// `CommandNotFound`, `NoStorageBound`, `MissingCollectionOrTable` for
    /// wiring problems; `Driver` for store failures.
    pub async fn query(
        &self,
        command_id: &str,
        params: &Map<String, Value>,
        start_index: u64,
        max_count: u64,
    ) -> Result<Vec<Value>, DispatchError> {
        let (command, collection, pool) = self.resolve(command_id)?;
        let condition = command.condition(params);
        let connection = pool.acquire().await.map_err(driver)?;
        // Connection must go back on failure paths too.
        let result = connection.select(collection, &condition, start_index, max_count).await;
        connection.close().await;
        result.map_err(driver)
    }

    /// Run a command and return only the matching cardinality.
    ///
    /// # Errors
    ///
    /// Same family as [`DocDataService::query`].
    pub async fn count(
        &self,
        command_id: &str,
        params: &Map<String, Value>,
    ) -> Result<u64, DispatchError> {
        let (command, collection, pool) = self.resolve(command_id)?;
        let condition = command.condition(params);
        let connection = pool.acquire().await.map_err(driver)?;
        let result = connection.count(collection, &condition).await;
        connection.close().await;
        result.map_err(driver)
    }
}

fn driver(error: StoreError) -> DispatchError {
    DispatchError::Driver(error.to_string())
}

#[async_trait]
impl Service for DocDataService {
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
                let rows = self.query(command_id, &params, start_index, max_count).await?;
                Ok(Value::Array(rows))
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
