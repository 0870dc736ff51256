//! Authentication state and the pluggable source of identity credentials.

use std::env;

use crate::error::{Error, Result};
use crate::types::AuthUser;

/// Environment variable read by [`EnvCredential`] by default.
pub const CREDENTIAL_ENV: &str = "PARLEY_CREDENTIAL";

/// Supplies the opaque identity credential exchanged at `POST /auth/google`.
///
/// The backend verifies the credential; the client never inspects it.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Produces a credential, or fails if none is available.
    async fn credential(&self) -> Result<String>;
}

/// A credential fixed up front, e.g. from a command-line flag.
#[derive(Clone)]
pub struct StaticCredential(String);

impl StaticCredential {
    /// Wraps `credential`.
    pub fn new(credential: impl Into<String>) -> Self {
        Self(credential.into())
    }
}

impl std::fmt::Debug for StaticCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StaticCredential").field(&"<redacted>").finish()
    }
}

#[async_trait::async_trait]
impl IdentityProvider for StaticCredential {
    async fn credential(&self) -> Result<String> {
        non_empty(self.0.clone(), "credential")
    }
}

/// A credential read from an environment variable at login time.
#[derive(Debug, Clone)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    /// Reads from [`CREDENTIAL_ENV`].
    pub fn new() -> Self {
        Self::from_var(CREDENTIAL_ENV)
    }

    /// Reads from `var`.
    pub fn from_var(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvCredential {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IdentityProvider for EnvCredential {
    async fn credential(&self) -> Result<String> {
        let value = env::var(&self.var).map_err(|_| {
            Error::validation(format!("{} is not set", self.var), Some(self.var.clone()))
        })?;
        non_empty(value, &self.var)
    }
}

fn non_empty(credential: String, param: &str) -> Result<String> {
    if credential.trim().is_empty() {
        return Err(Error::validation(
            "identity credential is empty",
            Some(param.to_string()),
        ));
    }
    Ok(credential)
}

/// Where the user stands with the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    /// No login attempted yet.  Requests may still succeed if a cookie is
    /// already held.
    #[default]
    Anonymous,
    /// The backend answered 401; the user must log in again.
    LoginRequired,
    /// Logged in as this user.
    Authenticated(AuthUser),
}

impl AuthState {
    /// Returns true when the user must log in before continuing.
    pub fn login_required(&self) -> bool {
        matches!(self, AuthState::LoginRequired)
    }

    /// The logged-in user, if any.
    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_credential() {
        let provider = StaticCredential::new("token-123");
        assert_eq!(provider.credential().await.unwrap(), "token-123");
        assert!(!format!("{provider:?}").contains("token-123"));

        let err = StaticCredential::new("  ").credential().await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn env_credential_missing() {
        let provider = EnvCredential::from_var("PARLEY_TEST_CREDENTIAL_THAT_IS_NEVER_SET");
        let err = provider.credential().await.unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("PARLEY_TEST_CREDENTIAL_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn auth_state_accessors() {
        assert!(!AuthState::Anonymous.login_required());
        assert!(AuthState::LoginRequired.login_required());
        let user = AuthUser {
            username: "ada".to_string(),
            email: None,
            full_name: None,
        };
        let state = AuthState::Authenticated(user.clone());
        assert_eq!(state.user(), Some(&user));
        assert_eq!(AuthState::default(), AuthState::Anonymous);
    }
}
