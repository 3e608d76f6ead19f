use super::*;
use crate::security::{self, UserToken};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

const KEY: &[u8] = b"dispatch-test-key";

// =============================================================================
// CountingService — records invocations, denies "secured"
// =============================================================================

struct CountingService {
    invocations: AtomicUsize,
    seen_subject: std::sync::Mutex<Option<String>>,
}

impl CountingService {
    fn new() -> Self {
        Self { invocations: AtomicUsize::new(0), seen_subject: std::sync::Mutex::new(None) }
    }
}

#[async_trait::async_trait]
impl Service for CountingService {
    fn operations(&self) -> &[&str] {
        &["ping", "secured"]
    }

    async fn authorize(
        &self,
        _token: Option<&str>,
        function: &str,
        _args: &[Value],
    ) -> Result<bool, DispatchError> {
        Ok(function != "secured")
    }

    async fn invoke(
        &self,
        ctx: &CallContext,
        function: &str,
        _args: &[Value],
    ) -> Result<Value, DispatchError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        *self.seen_subject.lock().unwrap() = ctx.subject().map(str::to_owned);
        Ok(json!({ "function": function }))
    }
}

fn signed_token(subject: &str) -> String {
    security::sign(&UserToken::new(subject, 3600, vec![]), KEY).unwrap()
}

// =============================================================================
// call — state machine
// =============================================================================

#[tokio::test]
async fn unknown_function_fails_without_invoking() {
    let service = CountingService::new();
    let err = call(&service, Caller::default(), "missing", &[], KEY).await.unwrap_err();
    assert!(matches!(err, DispatchError::FunctionNotFound(name) if name == "missing"));
    assert_eq!(service.invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn denied_call_never_reaches_target() {
    let service = CountingService::new();
    let token = signed_token("alice");
    let caller = Caller { auth_token: Some(&token), user_token: None };
    let err = call(&service, caller, "secured", &[], KEY).await.unwrap_err();
    assert!(matches!(err, DispatchError::NotAuthorized));
    assert_eq!(service.invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn authorized_call_invokes_and_returns() {
    let service = CountingService::new();
    let token = signed_token("alice");
    let caller = Caller { auth_token: Some(&token), user_token: None };
    let value = call(&service, caller, "ping", &[], KEY).await.unwrap();
    assert_eq!(value, json!({ "function": "ping" }));
    assert_eq!(service.invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn anonymous_call_has_no_principal() {
    let service = CountingService::new();
    call(&service, Caller::default(), "ping", &[], KEY).await.unwrap();
    assert_eq!(*service.seen_subject.lock().unwrap(), None);
}

#[tokio::test]
async fn user_token_identity_wins_over_auth_token() {
    let service = CountingService::new();
    let auth = signed_token("session-user");
    let user = signed_token("envelope-user");
    let caller = Caller { auth_token: Some(&auth), user_token: Some(&user) };
    call(&service, caller, "ping", &[], KEY).await.unwrap();
    assert_eq!(service.seen_subject.lock().unwrap().as_deref(), Some("envelope-user"));
}

#[tokio::test]
async fn invalid_identity_token_fails_the_call() {
    let service = CountingService::new();
    let caller = Caller { auth_token: None, user_token: Some("garbage") };
    let err = call(&service, caller, "ping", &[], KEY).await.unwrap_err();
    assert!(matches!(err, DispatchError::InvalidToken(_)));
    assert_eq!(service.invocations.load(Ordering::SeqCst), 0);
}

// =============================================================================
// argument helpers
// =============================================================================

#[test]
fn arg_str_present() {
    let args = vec![json!("hello")];
    assert_eq!(arg_str(&args, 0, "word").unwrap(), "hello");
}

#[test]
fn arg_str_missing_is_bad_arguments() {
    let err = arg_str(&[], 0, "word").unwrap_err();
    assert!(matches!(err, DispatchError::BadArguments(_)));
}

#[test]
fn arg_object_defaults_to_empty() {
    assert!(arg_object(&[], 1, "params").unwrap().is_empty());
    assert!(arg_object(&[json!("x"), json!(null)], 1, "params").unwrap().is_empty());
}

#[test]
fn arg_object_rejects_scalar() {
    let err = arg_object(&[json!(5)], 0, "params").unwrap_err();
    assert!(matches!(err, DispatchError::BadArguments(_)));
}

#[test]
fn arg_u64_default_and_value() {
    assert_eq!(arg_u64(&[], 2, "start", 0).unwrap(), 0);
    assert_eq!(arg_u64(&[json!("a"), json!("b"), json!(10)], 2, "start", 0).unwrap(), 10);
}

#[test]
fn arg_u64_rejects_negative() {
    let err = arg_u64(&[json!(-3)], 0, "start", 0).unwrap_err();
    assert!(matches!(err, DispatchError::BadArguments(_)));
}
