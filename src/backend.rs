//! The remote collaborator the chat components talk to.
//!
//! [`ChatBackend`] is the seam between conversation logic and transport.
//! [`AgentsClient`](crate::AgentsClient) implements it over HTTP; tests drive
//! the state machines with scripted implementations.

use crate::Result;
use crate::ndjson::ByteStream;
use crate::types::{AuthUser, NewSession, ProtocolRecord, Session};

/// Operations the agents backend exposes.
///
/// Every method returns [`Error::Authentication`](crate::Error::Authentication)
/// when the backend answers 401, before any other handling.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// `GET /sessions/`: the authenticated user's sessions.
    async fn list_sessions(&self) -> Result<Vec<Session>>;

    /// `POST /sessions/new`: mint a session for the named agent.
    async fn create_session(&self, agent_name: &str) -> Result<NewSession>;

    /// `DELETE /sessions/{id}`: returns the backend's success flag.
    async fn delete_session(&self, session_id: &str) -> Result<bool>;

    /// `GET /chat/?session_id=...`: the full history of a session.
    async fn history(&self, session_id: &str) -> Result<Vec<ProtocolRecord>>;

    /// `POST /chat/`: submit a prompt and return the NDJSON response body.
    async fn submit_prompt(&self, session_id: &str, prompt: &str) -> Result<ByteStream>;

    /// `GET /agents/`: names of the available agents.
    async fn agents(&self) -> Result<Vec<String>>;

    /// `POST /auth/google`: exchange an identity credential for a session cookie.
    async fn login(&self, credential: &str) -> Result<AuthUser>;

    /// `POST /logout`: drop the session cookie.
    async fn logout(&self) -> Result<()>;
}
