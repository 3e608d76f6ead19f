//! TCP passthrough server.
//!
//! A plain accept loop: every inbound connection is proxied byte-for-byte to
//! the configured upstream. No state beyond the running task.

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::dispatch::{Server, ServerError};

pub struct PassthroughServer {
    port: u16,
    upstream: String,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PassthroughServer {
    #[must_use]
    pub fn new(port: u16, upstream: impl Into<String>) -> Self {
        Self { port, upstream: upstream.into(), handle: Mutex::new(None) }
    }
}

async fn relay(mut inbound: TcpStream, upstream: String) {
    match TcpStream::connect(&upstream).await {
        Ok(mut outbound) => {
            if let Err(error) = tokio::io::copy_bidirectional(&mut inbound, &mut outbound).await {
                tracing::debug!(%error, upstream = %upstream, "passthrough relay closed");
            }
        }
        Err(error) => {
            tracing::warn!(%error, upstream = %upstream, "upstream connect failed");
        }
    }
}

#[async_trait]
impl Server for PassthroughServer {
    async fn start(&self) -> Result<(), ServerError> {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            tracing::debug!(port = self.port, "passthrough server already running");
            return Ok(());
        }

        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .map_err(ServerError::Bind)?;
        tracing::info!(port = self.port, upstream = %self.upstream, "passthrough listening");

        let upstream = self.upstream.clone();
        let task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((inbound, peer)) => {
                        tracing::info!(%peer, "connection accepted");
                        tokio::spawn(relay(inbound, upstream.clone()));
                    }
                    Err(error) => {
                        tracing::warn!(%error, "accept failed");
                    }
                }
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
        tracing::info!(port = self.port, "passthrough stopped");
        Ok(())
    }
}
