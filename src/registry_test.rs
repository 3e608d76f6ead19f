use super::*;
use crate::dispatch::{CallContext, DispatchError, ServerError};
use serde_json::{Value, json};

// =============================================================================
// fixtures
// =============================================================================

struct TagService {
    tag: &'static str,
}

#[async_trait::async_trait]
impl crate::dispatch::Service for TagService {
    fn operations(&self) -> &[&str] {
        &["tag"]
    }

    async fn invoke(
        &self,
        _ctx: &CallContext,
        _function: &str,
        _args: &[Value],
    ) -> Result<Value, DispatchError> {
        Ok(json!(self.tag))
    }
}

struct NoopServer;

#[async_trait::async_trait]
impl crate::dispatch::Server for NoopServer {
    async fn start(&self) -> Result<(), ServerError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServerError> {
        Ok(())
    }
}

async fn tag_of(service: &Arc<dyn crate::dispatch::Service>) -> Value {
    service.invoke(&CallContext::anonymous(), "tag", &[]).await.unwrap()
}

// =============================================================================
// services
// =============================================================================

#[tokio::test]
async fn duplicate_service_registration_is_ignored() {
    let registry = Registry::new();
    registry.register_service("users", Arc::new(TagService { tag: "first" }));
    registry.register_service("users", Arc::new(TagService { tag: "second" }));

    let resolved = registry.service_by_name("users").unwrap();
    assert_eq!(tag_of(&resolved).await, json!("first"));
}

#[test]
fn unknown_service_lookup_returns_none() {
    let registry = Registry::new();
    assert!(registry.service_by_name("nope").is_none());
}

#[tokio::test]
async fn register_services_batch() {
    let registry = Registry::new();
    registry.register_services(vec![
        ServiceEntry { name: "a".into(), service: Arc::new(TagService { tag: "a" }) },
        ServiceEntry { name: "b".into(), service: Arc::new(TagService { tag: "b" }) },
    ]);
    assert_eq!(tag_of(&registry.service_by_name("a").unwrap()).await, json!("a"));
    assert_eq!(tag_of(&registry.service_by_name("b").unwrap()).await, json!("b"));
}

// =============================================================================
// servers
// =============================================================================

#[test]
fn duplicate_server_registration_is_ignored() {
    let registry = Registry::new();
    let first: Arc<dyn crate::dispatch::Server> = Arc::new(NoopServer);
    registry.register_server("http", Arc::clone(&first));
    registry.register_server("http", Arc::new(NoopServer));

    let resolved = registry.server_by_name("http").unwrap();
    assert!(Arc::ptr_eq(&resolved, &first));
}

#[test]
fn unknown_server_lookup_returns_none() {
    let registry = Registry::new();
    assert!(registry.server_by_name("nope").is_none());
}

#[test]
fn servers_snapshot_lists_registrations() {
    let registry = Registry::new();
    registry.register_servers(vec![
        ServerEntry { name: "http".into(), server: Arc::new(NoopServer) },
        ServerEntry { name: "tcp".into(), server: Arc::new(NoopServer) },
    ]);
    let mut names: Vec<String> = registry.servers().into_iter().map(|(n, _)| n).collect();
    names.sort();
    assert_eq!(names, vec!["http".to_owned(), "tcp".to_owned()]);
}
