use serde::{Deserialize, Serialize};

/// The identity the backend established after a credential exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    /// Username; the backend uses the account email.
    pub username: String,

    /// Account email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl AuthUser {
    /// The friendliest name available for display.
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.username)
    }
}

/// Response to `POST /auth/google`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    /// Bearer token; also set as the `access-token` cookie.
    pub access_token: String,

    /// Token type, normally `bearer`.
    pub token_type: String,

    /// The authenticated user.
    pub user: AuthUser,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_response_deserialization() {
        let json = r#"{
            "access_token": "abc",
            "token_type": "bearer",
            "user": {"username": "ada@example.com", "email": "ada@example.com", "full_name": "Ada"}
        }"#;
        let login: LoginResponse = serde_json::from_str(json).unwrap();
        assert_eq!(login.user.display_name(), "Ada");
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let user = AuthUser {
            username: "ada@example.com".to_string(),
            email: None,
            full_name: None,
        };
        assert_eq!(user.display_name(), "ada@example.com");
    }
}
