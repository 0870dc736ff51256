use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Value, json};
use time::OffsetDateTime;

use crate::types::{Part, Role, Turn};

/// One line of the chat protocol.
///
/// Records are discriminated by `kind`.  Only `request` and `response` map to
/// conversation turns; every other record (missing kind, non-string kind, or a
/// kind this client does not display) is [`ProtocolRecord::Other`].  Fields
/// beyond `kind` and `parts` are ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolRecord {
    /// A user-originated record.
    Request {
        /// The parts of the record.
        parts: Vec<Part>,
    },

    /// An agent-originated record.
    Response {
        /// The parts of the record.
        parts: Vec<Part>,
    },

    /// A record the client does not display.
    Other {
        /// The kind, when the record carried a string one.
        kind: Option<String>,
    },
}

impl ProtocolRecord {
    /// Parses a single line of the stream.
    pub fn parse(line: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(line)?)
    }

    /// The record's `kind`, if any.
    pub fn kind(&self) -> Option<&str> {
        match self {
            ProtocolRecord::Request { .. } => Some("request"),
            ProtocolRecord::Response { .. } => Some("response"),
            ProtocolRecord::Other { kind } => kind.as_deref(),
        }
    }

    /// The role of the turn this record becomes, if it becomes one.
    pub fn role(&self) -> Option<Role> {
        match self {
            ProtocolRecord::Request { .. } => Some(Role::User),
            ProtocolRecord::Response { .. } => Some(Role::Agent),
            ProtocolRecord::Other { .. } => None,
        }
    }

    /// Converts the record into a turn stamped with the current time.
    pub fn into_turn(self) -> Option<Turn> {
        self.into_turn_at(OffsetDateTime::now_utc())
    }

    /// Converts the record into a turn stamped with `timestamp`.
    pub fn into_turn_at(self, timestamp: OffsetDateTime) -> Option<Turn> {
        let (role, parts) = match self {
            ProtocolRecord::Request { parts } => (Role::User, parts),
            ProtocolRecord::Response { parts } => (Role::Agent, parts),
            ProtocolRecord::Other { .. } => return None,
        };
        Some(Turn {
            role,
            timestamp,
            parts,
        })
    }
}

impl<'de> Deserialize<'de> for ProtocolRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let kind = value.get("kind").and_then(Value::as_str);
        let parts = || -> Result<Vec<Part>, D::Error> {
            match value.get("parts") {
                None | Some(Value::Null) => Ok(Vec::new()),
                Some(parts) => Vec::<Part>::deserialize(parts).map_err(D::Error::custom),
            }
        };
        match kind {
            Some("request") => Ok(ProtocolRecord::Request { parts: parts()? }),
            Some("response") => Ok(ProtocolRecord::Response { parts: parts()? }),
            other => Ok(ProtocolRecord::Other {
                kind: other.map(str::to_string),
            }),
        }
    }
}

impl Serialize for ProtocolRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let value = match self {
            ProtocolRecord::Request { parts } => json!({"kind": "request", "parts": parts}),
            ProtocolRecord::Response { parts } => json!({"kind": "response", "parts": parts}),
            ProtocolRecord::Other { kind: Some(kind) } => json!({"kind": kind}),
            ProtocolRecord::Other { kind: None } => json!({}),
        };
        value.serialize(serializer)
    }
}
