//! The session directory: the remote session list and the current session.
//!
//! [`SessionDirectory`] holds state and its pure transitions.  The network
//! half of create/delete/refresh lives on
//! [`ChatContext`](crate::chat::ChatContext), which fetches first and then
//! applies the result here under its lock.

use time::OffsetDateTime;

use crate::types::Session;

/// A session created on behalf of the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    /// The session id.
    pub id: String,
    /// The agent the session was requested for.
    pub agent_name: String,
    /// True when the backend could not mint an id and a client-local
    /// placeholder was used instead.  Such ids do not round-trip with the
    /// backend.
    pub provisional: bool,
}

/// The result of a delete request.
#[derive(Debug, Clone)]
pub enum DeleteOutcome {
    /// The user declined; nothing was sent.
    Cancelled,
    /// The backend deleted the session.
    Deleted {
        /// Whether the deleted session was current (and was cleared).
        was_current: bool,
    },
    /// The backend answered but reported that nothing was deleted.
    Rejected,
    /// The request failed.
    Failed(crate::Error),
}

/// Sessions as last reported by the backend, plus the current selection.
#[derive(Debug, Default, Clone)]
pub struct SessionDirectory {
    sessions: Vec<Session>,
    current: Option<String>,
}

impl SessionDirectory {
    /// Creates an empty directory with nothing selected.
    pub fn new() -> Self {
        Self::default()
    }

    /// The sessions, in the order the backend listed them.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// The current session id, if any.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Looks up a listed session.
    pub fn find(&self, session_id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == session_id)
    }

    /// Resolves a user-supplied selector: a 1-based position in the list, or
    /// an id.  Ids that are not listed are passed through unchanged.
    pub fn resolve(&self, selector: &str) -> Option<String> {
        let selector = selector.trim();
        if selector.is_empty() {
            return None;
        }
        if let Ok(index) = selector.parse::<usize>()
            && let Some(session) = index.checked_sub(1).and_then(|i| self.sessions.get(i))
        {
            return Some(session.id.clone());
        }
        Some(selector.to_string())
    }

    /// Replaces the whole list with a fresh fetch.  Never touches the current
    /// selection.
    pub fn replace_sessions(&mut self, sessions: Vec<Session>) {
        self.sessions = sessions;
    }

    /// Makes `session_id` current.
    pub fn select(&mut self, session_id: impl Into<String>) {
        self.current = Some(session_id.into());
    }

    /// Clears the selection if it is `session_id`; returns whether it was.
    pub fn forget(&mut self, session_id: &str) -> bool {
        if self.current.as_deref() == Some(session_id) {
            self.current = None;
            true
        } else {
            false
        }
    }
}

/// A client-local session id shaped like the backend's
/// (`session-<unix seconds>-<8 hex>`).
pub fn placeholder_session_id() -> String {
    let now = OffsetDateTime::now_utc().unix_timestamp_nanos() as f64 / 1e9;
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("session-{now:.6}-{}", &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn session(id: &str) -> Session {
        Session {
            id: id.to_string(),
            title: format!("title {id}"),
            created_at: datetime!(2024-05-01 12:00 UTC),
            last_message_at: datetime!(2024-05-01 12:00 UTC),
            agent_name: "search_bot".to_string(),
        }
    }

    #[test]
    fn refresh_does_not_touch_selection() {
        let mut directory = SessionDirectory::new();
        directory.select("a");
        directory.replace_sessions(vec![session("b")]);
        assert_eq!(directory.current(), Some("a"));
        assert_eq!(directory.sessions().len(), 1);
        assert!(directory.find("b").is_some());
        assert!(directory.find("a").is_none());
    }

    #[test]
    fn forget_only_clears_matching() {
        let mut directory = SessionDirectory::new();
        directory.select("a");
        assert!(!directory.forget("b"));
        assert_eq!(directory.current(), Some("a"));
        assert!(directory.forget("a"));
        assert_eq!(directory.current(), None);
    }

    #[test]
    fn resolve_by_position_or_id() {
        let mut directory = SessionDirectory::new();
        directory.replace_sessions(vec![session("a"), session("b")]);
        assert_eq!(directory.resolve("2").as_deref(), Some("b"));
        assert_eq!(directory.resolve("a").as_deref(), Some("a"));
        assert_eq!(directory.resolve("9").as_deref(), Some("9"));
        assert_eq!(directory.resolve("0").as_deref(), Some("0"));
        assert_eq!(directory.resolve("  "), None);
    }

    #[test]
    fn placeholder_ids_look_like_backend_ids() {
        let id = placeholder_session_id();
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts[0], "session");
        let stamp: f64 = parts[1].parse().unwrap();
        let now = OffsetDateTime::now_utc().unix_timestamp() as f64;
        assert!((now - stamp).abs() < 60.0, "{stamp} is not near {now}");
        assert_eq!(parts[2].len(), 8);
        assert_ne!(placeholder_session_id(), id);
    }
}
