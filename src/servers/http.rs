//! HTTP transport server.
//!
//! Serving happens on a spawned task so `start` returns as soon as the
//! listener is bound; `stop` aborts the task. `reset` comes from the trait.

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::dispatch::{Server, ServerError};
use crate::routes;
use crate::state::AppState;

pub struct HttpServer {
    port: u16,
    state: AppState,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl HttpServer {
    #[must_use]
    pub fn new(port: u16, state: AppState) -> Self {
        Self { port, state, handle: Mutex::new(None) }
    }
}

#[async_trait]
impl Server for HttpServer {
    async fn start(&self) -> Result<(), ServerError> {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            tracing::debug!(port = self.port, "http server already running");
            return Ok(());
        }

        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .map_err(ServerError::Bind)?;
        tracing::info!(port = self.port, "http server listening");

        let app = routes::app(self.state.clone());
        let task = tokio::spawn(async move {
            if let Err(error) = axum::serve(listener, app).await {
                tracing::error!(%error, "http server terminated");
            }
        });
        *handle = Some(task);
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServerError> {
        let mut handle = self.handle.lock().await;
        let Some(task) = handle.take() else {
            return Err(ServerError::NotRunning);
        };
        task.abort();
        tracing::info!(port = self.port, "http server stopped");
        Ok(())
    }
}
