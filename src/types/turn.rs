use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::Part;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A user-originated turn (`kind: "request"` on the wire).
    User,
    /// An agent-originated turn (`kind: "response"` on the wire).
    Agent,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Agent => write!(f, "agent"),
        }
    }
}

/// One entry in a session's conversation log.
///
/// The wire records carry no timestamp of their own, so the client stamps each
/// turn when it is decoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    /// The originator of the turn.
    pub role: Role,

    /// When this client received the turn.
    #[serde(with = "crate::utils::time")]
    pub timestamp: OffsetDateTime,

    /// The ordered parts of the turn; possibly empty.
    pub parts: Vec<Part>,
}

impl Turn {
    /// Creates a turn stamped with the current time.
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            role,
            timestamp: OffsetDateTime::now_utc(),
            parts,
        }
    }

    /// Creates a synthetic agent turn carrying a single human-readable notice.
    pub fn notice(text: impl Into<String>) -> Self {
        Self::new(Role::Agent, vec![Part::text(text)])
    }

    /// Returns true if the turn has no parts to display.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Agent).unwrap(), r#""agent""#);
        assert_eq!(Role::User.to_string(), "user");
    }

    #[test]
    fn notice_is_agent_text() {
        let turn = Turn::notice("something went wrong");
        assert_eq!(turn.role, Role::Agent);
        assert_eq!(turn.parts, vec![Part::text("something went wrong")]);
        assert!(!turn.is_empty());
    }
}
