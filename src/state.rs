//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! carries the registry plus the few transport-level settings the remote
//! layer needs. All fields are cheap to clone.

use std::path::PathBuf;
use std::sync::Arc;

use crate::registry::Registry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    /// HMAC key tokens are signed and verified with.
    pub signing_key: Arc<Vec<u8>>,
    /// Cookie the transport-level session token is read from.
    pub session_cookie: String,
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        signing_key: impl Into<Vec<u8>>,
        session_cookie: impl Into<String>,
        static_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            registry,
            signing_key: Arc::new(signing_key.into()),
            session_cookie: session_cookie.into(),
            static_dir,
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_clones_share_the_registry() {
        let state = test_helpers::test_app_state();
        let clone = state.clone();
        assert!(Arc::ptr_eq(&state.registry, &clone.registry));
        assert_eq!(clone.session_cookie, "session_token");
    }
}
