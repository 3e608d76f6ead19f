//! Remote-call protocol — one HTTP endpoint, one envelope, one dispatch.
//!
//! ARCHITECTURE
//! ============
//! `POST /remote` carries a serialized [`RemoteRequest`]. The handler
//! buffers the body, decodes the envelope, resolves the target service from
//! the registry, and dispatches through the authorized call path. Success is
//! serialized as `{"d": <value>}`; failure is the raw error message with the
//! error's status code.
//!
//! ERROR HANDLING
//! ==============
//! Every path out of the handler produces a response — envelope decode
//! failures, unknown services, denied calls, driver errors, and even a
//! failure while serializing the success envelope. A single bad request must
//! never take the process down.
//!
//! The transport token (session cookie or bearer header) and the envelope's
//! `userToken` are deliberately independent inputs: the first is what
//! authorization checks, the second is who the call runs as.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::strip_bom;
use crate::dispatch::{self, Caller, DispatchError};
use crate::state::AppState;

// =============================================================================
// ENVELOPES
// =============================================================================

/// Inbound request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRequest {
    pub id: String,
    pub service_name: String,
    pub function_name: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub user_token: Option<String>,
}

/// Outbound success envelope.
#[derive(Debug, Serialize)]
pub struct RemoteResponse {
    pub d: Value,
}

// =============================================================================
// HANDLER
// =============================================================================

/// `POST /remote` — decode, resolve, dispatch, respond.
pub async fn remote_call(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match handle(&state, &jar, &headers, &body).await {
        Ok(value) => success_response(&value),
        Err(error) => error_response(&error),
    }
}

async fn handle(
    state: &AppState,
    jar: &CookieJar,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Value, DispatchError> {
    let request: RemoteRequest = serde_json::from_slice(strip_bom(body))
        .map_err(|e| DispatchError::BadArguments(format!("bad request envelope: {e}")))?;

    // Server-side correlation id; the envelope id is client-chosen and not
    // guaranteed unique across callers.
    let call_id = Uuid::new_v4();
    tracing::info!(
        %call_id,
        id = %request.id,
        service = %request.service_name,
        function = %request.function_name,
        "remote call received"
    );

    let service = state
        .registry
        .service_by_name(&request.service_name)
        .ok_or_else(|| DispatchError::ServiceNotFound(request.service_name.clone()))?;

    let auth_token = transport_token(state, jar, headers);
    let caller = Caller {
        auth_token: auth_token.as_deref(),
        user_token: request.user_token.as_deref(),
    };

    let result = dispatch::call(
        service.as_ref(),
        caller,
        &request.function_name,
        &request.args,
        &state.signing_key,
    )
    .await;

    match &result {
        Ok(_) => tracing::info!(%call_id, id = %request.id, "remote call completed"),
        Err(error) => tracing::warn!(%call_id, id = %request.id, %error, "remote call failed"),
    }
    result
}

/// Resolve the transport-level token: bearer header first, session cookie
/// second.
fn transport_token(state: &AppState, jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(raw) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(raw.to_owned());
    }
    jar.get(&state.session_cookie).map(|cookie| cookie.value().to_owned())
}

fn success_response(value: &Value) -> Response {
    match serde_json::to_vec(&RemoteResponse { d: value.clone() }) {
        Ok(rendered) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            rendered,
        )
            .into_response(),
        Err(error) => {
            // The response writer itself must not bring the handler down.
            tracing::error!(%error, "response serialization failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "response serialization failed").into_response()
        }
    }
}

fn error_response(error: &DispatchError) -> Response {
    (error_status(error), error.to_string()).into_response()
}

/// Transport status for each failure, defaulting to the generic
/// service-error code.
fn error_status(error: &DispatchError) -> StatusCode {
    match error {
        DispatchError::ServiceNotFound(_)
        | DispatchError::FunctionNotFound(_)
        | DispatchError::CommandNotFound(_) => StatusCode::NOT_FOUND,
        DispatchError::NotAuthorized | DispatchError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
        DispatchError::BadArguments(_) => StatusCode::BAD_REQUEST,
        DispatchError::NoStorageBound
        | DispatchError::MissingCollectionOrTable(_)
        | DispatchError::CommandTemplate(_)
        | DispatchError::Driver(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "remote_test.rs"]
mod tests;
