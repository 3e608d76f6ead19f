//! Authorized dispatch — the single path every service call goes through.
//!
//! ARCHITECTURE
//! ============
//! A [`Service`] exposes a fixed operation table (built at construction, no
//! reflective lookup) plus an overridable authorization hook. [`call`] drives
//! the per-call state machine:
//!
//! `Start → AuthCheck → (Authorized → Invoke → Return) | (Unauthorized → Fail)`
//!
//! Identity is never ambient: the verified [`Principal`] rides in a
//! [`CallContext`] value handed to `invoke`, so concurrent calls cannot leak
//! identity across each other.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::security::{Principal, TokenError};

// =============================================================================
// ERRORS
// =============================================================================

/// Everything that can go wrong between receiving a call and returning its
/// value. The remote layer maps each variant onto a transport status.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no service registered under [{0}]")]
    ServiceNotFound(String),
    #[error("service has no [{0}] operation")]
    FunctionNotFound(String),
    #[error("not authorized")]
    NotAuthorized,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),
    #[error("no [{0}] command on this service")]
    CommandNotFound(String),
    #[error("service has no storage bound")]
    NoStorageBound,
    #[error("command [{0}] names no collection or table")]
    MissingCollectionOrTable(String),
    #[error("bad arguments: {0}")]
    BadArguments(String),
    #[error("command template: {0}")]
    CommandTemplate(String),
    #[error("driver error: {0}")]
    Driver(String),
}

// =============================================================================
// CALL CONTEXT
// =============================================================================

/// Call-scoped state threaded through dispatch instead of living in a
/// process-wide slot.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub principal: Option<Principal>,
}

impl CallContext {
    #[must_use]
    pub fn anonymous() -> Self {
        Self { principal: None }
    }

    #[must_use]
    pub fn with_principal(principal: Principal) -> Self {
        Self { principal: Some(principal) }
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.subject.as_str())
    }
}

// =============================================================================
// SERVICE
// =============================================================================

/// An addressable unit of business logic exposing named, authorized
/// operations with the uniform signature `(context, args) -> value`.
#[async_trait]
pub trait Service: Send + Sync {
    /// The operation names this service answers to. Fixed at construction.
    fn operations(&self) -> &[&str];

    /// Authorization hook, run before every invoke with the transport-level
    /// token. The default authorizes everything; derived services supply
    /// policy by overriding.
    ///
    /// # Errors
    ///
    /// Implementations may fail the call outright (e.g. on a backend error
    /// while loading policy); the error propagates to the caller.
    async fn authorize(
        &self,
        _token: Option<&str>,
        _function: &str,
        _args: &[Value],
    ) -> Result<bool, DispatchError> {
        Ok(true)
    }

    /// Run the named operation. Only reached after [`call`] has checked the
    /// operation table and the authorization hook.
    async fn invoke(
        &self,
        ctx: &CallContext,
        function: &str,
        args: &[Value],
    ) -> Result<Value, DispatchError>;
}

/// The two tokens a call may carry. They are independent trust inputs: the
/// auth token is what the authorization hook checks, the user token is who
/// the caller claims to act as.
#[derive(Debug, Clone, Copy, Default)]
pub struct Caller<'a> {
    /// Transport-level credential (session cookie or bearer header).
    pub auth_token: Option<&'a str>,
    /// Envelope identity. Falls back to the auth token when absent.
    pub user_token: Option<&'a str>,
}

/// Dispatch one call against a service.
///
/// The principal is bound from the caller's identity token even when the
/// authorization hook denies the call (identity is fail-open, authorization
/// is fail-closed), so a denied call still knows who was refused.
///
/// # Errors
///
/// [`DispatchError::FunctionNotFound`] for an operation outside the service's
/// table, [`DispatchError::InvalidToken`] when the identity token does not
/// verify, [`DispatchError::NotAuthorized`] when the hook denies, plus
/// whatever the invoked operation returns.
pub async fn call(
    service: &dyn Service,
    caller: Caller<'_>,
    function: &str,
    args: &[Value],
    signing_key: &[u8],
) -> Result<Value, DispatchError> {
    if !service.operations().contains(&function) {
        return Err(DispatchError::FunctionNotFound(function.to_owned()));
    }

    let authorized = service.authorize(caller.auth_token, function, args).await?;

    let ctx = match caller.user_token.or(caller.auth_token) {
        Some(raw) => CallContext::with_principal(Principal::from_token(raw, signing_key)?),
        None => CallContext::anonymous(),
    };

    if !authorized {
        tracing::warn!(function, subject = ?ctx.subject(), "call denied");
        return Err(DispatchError::NotAuthorized);
    }

    service.invoke(&ctx, function, args).await
}

// =============================================================================
// SERVER
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),
    #[error("server is not running")]
    NotRunning,
}

/// A startable/stoppable long-running component (a listening transport).
/// Servers must not block the caller: `start` returns once listening begins.
#[async_trait]
pub trait Server: Send + Sync {
    /// Begin serving.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] when the listen socket cannot be bound.
    async fn start(&self) -> Result<(), ServerError>;

    /// Stop serving.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotRunning`] when the server is not running.
    async fn stop(&self) -> Result<(), ServerError>;

    /// Stop, then start again.
    ///
    /// # Errors
    ///
    /// Propagates the first failure from either half.
    async fn reset(&self) -> Result<(), ServerError> {
        self.stop().await?;
        self.start().await
    }
}

// =============================================================================
// ARGUMENT HELPERS
// =============================================================================

/// Positional string argument, required.
///
/// # Errors
///
/// [`DispatchError::BadArguments`] naming the missing slot.
pub fn arg_str<'a>(args: &'a [Value], index: usize, name: &str) -> Result<&'a str, DispatchError> {
    args.get(index).and_then(Value::as_str).ok_or_else(|| {
        DispatchError::BadArguments(format!("argument {index} ({name}) must be a string"))
    })
}

/// Positional parameter-bag argument; absent or null means an empty bag.
///
/// # Errors
///
/// [`DispatchError::BadArguments`] when present but not an object.
pub fn arg_object(args: &[Value], index: usize, name: &str) -> Result<Map<String, Value>, DispatchError> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(DispatchError::BadArguments(format!(
            "argument {index} ({name}) must be an object"
        ))),
    }
}

/// Positional non-negative integer argument with a default.
///
/// # Errors
///
/// [`DispatchError::BadArguments`] when present but not a non-negative integer.
pub fn arg_u64(args: &[Value], index: usize, name: &str, default: u64) -> Result<u64, DispatchError> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v.as_u64().ok_or_else(|| {
            DispatchError::BadArguments(format!(
                "argument {index} ({name}) must be a non-negative integer"
            ))
        }),
    }
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;
