//! Configuration loading and persistence.
//!
//! Config objects round-trip through JSON files with a UTF-8 BOM tolerated
//! on the way in. `prepare_config` mirrors the bootstrap convention: load
//! the file when asked, otherwise fall back to the default and optionally
//! write it out so the next start has a file to edit.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::docstore::DocCommand;
use crate::services::login::UserInfo;
use crate::sqlstore::SqlCommand;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Strip a UTF-8 byte-order mark, if present.
#[must_use]
pub fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes)
}

/// Serialize `value` to `path` as pretty JSON.
///
/// # Errors
///
/// Propagates IO and serialization failures.
pub fn save_object<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let rendered = serde_json::to_vec_pretty(value)?;
    std::fs::write(path, rendered)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

/// Read and deserialize a JSON object from `path`.
///
/// # Errors
///
/// Propagates IO and parse failures.
pub fn load_object<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let bytes = std::fs::read(path)?;
    let value = serde_json::from_slice(strip_bom(&bytes))?;
    tracing::info!(path = %path.display(), "config loaded");
    Ok(value)
}

/// Resolve the effective config: load it from `path` when `load` is set,
/// otherwise take `default` and persist it when `save` is set.
///
/// # Errors
///
/// Propagates failures from the chosen branch.
pub fn prepare_config<T: Serialize + DeserializeOwned>(
    default: T,
    path: &Path,
    load: bool,
    save: bool,
) -> Result<T, ConfigError> {
    if load {
        return load_object(path);
    }
    if save {
        save_object(path, &default)?;
    }
    Ok(default)
}

// =============================================================================
// APP CONFIG
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassthroughConfig {
    pub port: u16,
    /// Upstream address connections are proxied to, e.g. `"127.0.0.1:9000"`.
    pub upstream: String,
}

/// Top-level application configuration. Command lists are the externally
/// loaded query surface of the data services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub port: u16,
    pub static_dir: Option<PathBuf>,
    pub signing_key: String,
    pub session_cookie: String,
    pub token_expire_seconds: i64,
    pub database_url: Option<String>,
    pub passthrough: Option<PassthroughConfig>,
    pub users: Vec<UserInfo>,
    pub doc_commands: Vec<DocCommand>,
    pub sql_commands: Vec<SqlCommand>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            static_dir: None,
            signing_key: "change-me".into(),
            session_cookie: "session_token".into(),
            token_expire_seconds: crate::services::login::DEFAULT_EXPIRE_SECONDS,
            database_url: None,
            passthrough: None,
            users: Vec::new(),
            doc_commands: Vec::new(),
            sql_commands: Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
