use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Agent used when the backend does not name one.
pub const DEFAULT_AGENT_NAME: &str = "search_bot";

fn default_agent_name() -> String {
    DEFAULT_AGENT_NAME.to_string()
}

/// A chat session as listed by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Opaque, server-assigned identifier.
    pub id: String,

    /// Display title.
    #[serde(default)]
    pub title: String,

    /// When the session was created.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,

    /// When the last message was added; advances server-side.
    #[serde(with = "crate::utils::time")]
    pub last_message_at: OffsetDateTime,

    /// The agent variant serving this session.
    #[serde(default = "default_agent_name")]
    pub agent_name: String,
}

/// Response to `POST /sessions/new`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewSession {
    /// The minted session id.
    pub session_id: String,

    /// The agent the session was created for.
    #[serde(default = "default_agent_name")]
    pub agent_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn backend_session_deserialization() {
        let json = r#"{
            "id": "session-1714566600.5-1a2b3c4d",
            "title": "search_bot 2024-05-01 12:30",
            "created_at": "2024-05-01T12:30:00.500000",
            "last_message_at": "2024-05-01T12:31:00",
            "agent_name": "search_bot"
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.id, "session-1714566600.5-1a2b3c4d");
        assert_eq!(session.last_message_at, datetime!(2024-05-01 12:31 UTC));
        assert_eq!(session.agent_name, "search_bot");
    }

    #[test]
    fn missing_agent_name_defaults() {
        let json = r#"{"id":"s","title":"t","created_at":"2024-05-01T12:30:00Z","last_message_at":"2024-05-01T12:30:00Z"}"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.agent_name, DEFAULT_AGENT_NAME);
    }

    #[test]
    fn new_session_response() {
        let created: NewSession =
            serde_json::from_str(r#"{"session_id":"session-1-abcdef01","agent_name":"databot"}"#)
                .unwrap();
        assert_eq!(created.session_id, "session-1-abcdef01");
        assert_eq!(created.agent_name, "databot");
    }
}
