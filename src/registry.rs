//! Process-wide name → instance tables for services and servers.
//!
//! DESIGN
//! ======
//! Two independent namespaces, both append-only: first registration for a
//! name wins and later duplicates are ignored, so concurrent registration
//! races are benign. Lookups return `None` for unknown names — turning that
//! into a user-facing error is the protocol boundary's job.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::dispatch::{Server, Service};

/// A named service ready for registration.
pub struct ServiceEntry {
    pub name: String,
    pub service: Arc<dyn Service>,
}

/// A named server ready for registration.
pub struct ServerEntry {
    pub name: String,
    pub server: Arc<dyn Server>,
}

#[derive(Default)]
pub struct Registry {
    services: RwLock<HashMap<String, Arc<dyn Service>>>,
    servers: RwLock<HashMap<String, Arc<dyn Server>>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under `name`. First writer wins; a duplicate
    /// registration is a logged no-op.
    pub fn register_service(&self, name: &str, service: Arc<dyn Service>) {
        let mut services = self.services.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if services.contains_key(name) {
            tracing::debug!(service = %name, "duplicate service registration ignored");
            return;
        }
        tracing::info!(service = %name, "service registered");
        services.insert(name.to_owned(), service);
    }

    /// Register a server under `name`. First writer wins.
    pub fn register_server(&self, name: &str, server: Arc<dyn Server>) {
        let mut servers = self.servers.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if servers.contains_key(name) {
            tracing::debug!(server = %name, "duplicate server registration ignored");
            return;
        }
        tracing::info!(server = %name, "server registered");
        servers.insert(name.to_owned(), server);
    }

    pub fn register_services(&self, entries: Vec<ServiceEntry>) {
        for entry in entries {
            self.register_service(&entry.name, entry.service);
        }
    }

    pub fn register_servers(&self, entries: Vec<ServerEntry>) {
        for entry in entries {
            self.register_server(&entry.name, entry.server);
        }
    }

    #[must_use]
    pub fn service_by_name(&self, name: &str) -> Option<Arc<dyn Service>> {
        let services = self.services.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        services.get(name).cloned()
    }

    #[must_use]
    pub fn server_by_name(&self, name: &str) -> Option<Arc<dyn Server>> {
        let servers = self.servers.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        servers.get(name).cloned()
    }

    /// Snapshot of all registered servers, for lifecycle sweeps at bootstrap
    /// and shutdown.
    #[must_use]
    pub fn servers(&self) -> Vec<(String, Arc<dyn Server>)> {
        let servers = self.servers.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        servers.iter().map(|(name, server)| (name.clone(), Arc::clone(server))).collect()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
