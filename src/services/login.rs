//! User/password login service.
//!
//! Issues signed tokens against a configured user list. The list is supplied
//! by configuration, not computed — this service holds no storage of its own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dispatch::{self, CallContext, DispatchError, Service};
use crate::security::{self, UserToken};

const OPERATIONS: &[&str] = &["login", "logout", "is_login"];

/// Default token lifetime: one hour.
pub const DEFAULT_EXPIRE_SECONDS: i64 = 60 * 60;

/// One configured account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_name: String,
    pub user_id: String,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

pub struct LoginService {
    users: Vec<UserInfo>,
    expire_seconds: i64,
    signing_key: Vec<u8>,
}

impl LoginService {
    #[must_use]
    pub fn new(users: Vec<UserInfo>, expire_seconds: i64, signing_key: impl Into<Vec<u8>>) -> Self {
        Self { users, expire_seconds, signing_key: signing_key.into() }
    }

    /// Exchange a user name and password for a signed token.
    ///
    /// # Errors
    ///
    /// [`DispatchError::NotAuthorized`] when no configured user matches both
    /// name and password.
    pub fn login(&self, user_name: &str, password: &str) -> Result<String, DispatchError> {
        let Some(user) = self
            .users
            .iter()
            .find(|u| u.user_name == user_name && u.password == password)
        else {
            tracing::warn!(user = %user_name, "login rejected");
            return Err(DispatchError::NotAuthorized);
        };
        let claims = UserToken::new(&user.user_id, self.expire_seconds, user.roles.clone());
        let token = security::sign(&claims, &self.signing_key)?;
        tracing::info!(user = %user_name, subject = %user.user_id, "login accepted");
        Ok(token)
    }
}

#[async_trait]
impl Service for LoginService {
    fn operations(&self) -> &[&str] {
        OPERATIONS
    }

    async fn invoke(
        &self,
        ctx: &CallContext,
        function: &str,
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        match function {
            "login" => {
                let user_name = dispatch::arg_str(args, 0, "user_name")?;
                let password = dispatch::arg_str(args, 1, "password")?;
                let token = self.login(user_name, password)?;
                Ok(Value::String(token))
            }
            "logout" => Ok(Value::Bool(true)),
            "is_login" => Ok(Value::Bool(ctx.principal.is_some())),
            other => Err(DispatchError::FunctionNotFound(other.to_owned())),
        }
    }
}

#[cfg(test)]
#[path = "login_test.rs"]
mod tests;
