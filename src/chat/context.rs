//! Shared conversation state and the operations that change it.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::auth::{AuthState, IdentityProvider};
use crate::backend::ChatBackend;
use crate::chat::consumer::{
    ConsumerState, StreamSummary, StreamTag, SubmitGuard, SubmitOutcome, TurnSink,
    consume_stream,
};
use crate::chat::directory::{
    CreatedSession, DeleteOutcome, SessionDirectory, placeholder_session_id,
};
use crate::chat::view::ConversationView;
use crate::error::{Error, Result};
use crate::observability::{
    SESSION_PLACEHOLDER_IDS, SESSION_REFRESHES, STREAM_DURATION, STREAM_STALE_TURNS,
    STREAM_TRANSPORT_FAILURES,
};
use crate::render::{Renderer, render_turn};
use crate::types::{AuthUser, DEFAULT_AGENT_NAME, ProtocolRecord, Session, Turn};

#[derive(Debug, Default)]
struct ChatState {
    directory: SessionDirectory,
    view: ConversationView,
    auth: AuthState,
    consumers: HashMap<String, ConsumerState>,
    agents: Vec<String>,
    agent_name: String,
}

/// The client side of a chat with the agents backend.
///
/// One context owns the session directory, the visible turn log, and the
/// authentication state.  All methods take `&self`; state sits behind a mutex
/// that is never held across an await, so a context wrapped in an `Arc` can
/// stream a response on one task while another switches sessions.
///
/// Every operation that gets a 401 from the backend flips the auth state to
/// [`AuthState::LoginRequired`] and changes nothing else.
pub struct ChatContext<B: ChatBackend> {
    backend: B,
    state: Mutex<ChatState>,
}

impl<B: ChatBackend> ChatContext<B> {
    /// Creates a context with nothing selected.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: Mutex::new(ChatState {
                agent_name: DEFAULT_AGENT_NAME.to_string(),
                ..ChatState::default()
            }),
        }
    }

    /// Sets the agent new sessions are created for.
    pub fn with_agent(self, agent_name: impl Into<String>) -> Self {
        self.lock().agent_name = agent_name.into();
        self
    }

    /// The backend this context talks to.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Notes a 401 in the auth state; passes the result through unchanged.
    fn check_auth<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.require_login_on(err);
        }
        result
    }

    fn require_login_on(&self, err: &Error) -> bool {
        if !err.is_authentication() {
            return false;
        }
        tracing::info!(error = %err, "backend requires a new login");
        self.lock().auth = AuthState::LoginRequired;
        true
    }

    ///////////////////////////////////////// Snapshots ////////////////////////////////////////

    /// The session list as of the last refresh.
    pub fn sessions(&self) -> Vec<Session> {
        self.lock().directory.sessions().to_vec()
    }

    /// The current session id.
    pub fn current_session(&self) -> Option<String> {
        self.lock().directory.current().map(str::to_string)
    }

    /// The turns on screen.
    pub fn turns(&self) -> Vec<Turn> {
        self.lock().view.turns().to_vec()
    }

    /// The authentication state.
    pub fn auth_state(&self) -> AuthState {
        self.lock().auth.clone()
    }

    /// The agent new sessions are created for.
    pub fn agent_name(&self) -> String {
        self.lock().agent_name.clone()
    }

    /// Changes the agent new sessions are created for.
    pub fn set_agent_name(&self, agent_name: impl Into<String>) {
        self.lock().agent_name = agent_name.into();
    }

    /// Agents as of the last [`ChatContext::load_agents`].
    pub fn known_agents(&self) -> Vec<String> {
        self.lock().agents.clone()
    }

    /// Where a submission for `session_id` stands.
    pub fn consumer_state(&self, session_id: &str) -> ConsumerState {
        self.lock()
            .consumers
            .get(session_id)
            .copied()
            .unwrap_or_default()
    }

    /// Resolves a 1-based list position or an id to a session id.
    pub fn resolve_session(&self, selector: &str) -> Option<String> {
        self.lock().directory.resolve(selector)
    }

    ///////////////////////////////////////// Directory ////////////////////////////////////////

    /// Replaces the session list with a fresh fetch.
    ///
    /// The current selection is kept even when the fetch no longer lists it.
    /// On failure the previous list stays.
    pub async fn refresh_sessions(&self) -> Result<()> {
        SESSION_REFRESHES.click();
        let sessions = self.check_auth(self.backend.list_sessions().await)?;
        self.lock().directory.replace_sessions(sessions);
        Ok(())
    }

    async fn refresh_quietly(&self) {
        if let Err(err) = self.refresh_sessions().await {
            tracing::warn!(error = %err, "could not refresh sessions");
        }
    }

    /// Creates a session and makes it current with an empty log.
    ///
    /// When the backend fails for any reason but authentication, a
    /// placeholder id is minted locally and the result is marked
    /// provisional.
    pub async fn create_session(&self, agent_name: Option<&str>) -> Result<CreatedSession> {
        let agent_name = match agent_name {
            Some(name) => name.to_string(),
            None => self.agent_name(),
        };
        let created = match self.check_auth(self.backend.create_session(&agent_name).await) {
            Ok(new) => CreatedSession {
                id: new.session_id,
                agent_name: new.agent_name,
                provisional: false,
            },
            Err(err) if err.is_authentication() => return Err(err),
            Err(err) => {
                SESSION_PLACEHOLDER_IDS.click();
                let id = placeholder_session_id();
                tracing::warn!(error = %err, session_id = %id, "session creation failed; using a placeholder id");
                CreatedSession {
                    id,
                    agent_name,
                    provisional: true,
                }
            }
        };
        {
            let mut state = self.lock();
            state.directory.select(created.id.clone());
            state.view.replace(Some(created.id.clone()), Vec::new());
        }
        self.refresh_quietly().await;
        Ok(created)
    }

    /// Makes `session_id` current and loads its history.
    ///
    /// The log is cleared before the fetch, so nothing from the previous
    /// session stays on screen, and any stream still running for it stops
    /// appending.
    pub async fn select_session(&self, session_id: &str) -> Result<usize> {
        {
            let mut state = self.lock();
            state.directory.select(session_id);
            state.view.replace(Some(session_id.to_string()), Vec::new());
        }
        self.load_history(session_id).await
    }

    /// Replaces the log with the backend's history for `session_id`.
    ///
    /// Returns the number of turns loaded.  A history that arrives after the
    /// user moved on, or after the log was reset again, is dropped.  Any
    /// stream running for the session stops appending once the new log is
    /// installed.
    pub async fn load_history(&self, session_id: &str) -> Result<usize> {
        let generation = self.lock().view.generation();
        let records = self.check_auth(self.backend.history(session_id).await)?;
        let turns: Vec<Turn> = records
            .into_iter()
            .filter_map(ProtocolRecord::into_turn)
            .collect();
        let mut state = self.lock();
        if state.directory.current() != Some(session_id)
            || state.view.generation() != generation
        {
            tracing::debug!(session_id, "dropping history for a session no longer shown");
            return Ok(0);
        }
        let loaded = turns.len();
        state.view.replace(Some(session_id.to_string()), turns);
        Ok(loaded)
    }

    /// Deletes a session after `confirm` agrees.
    ///
    /// Deleting the current session clears the selection and the log.  The
    /// list is refreshed afterwards whether or not the delete worked; only a
    /// 401 is returned as an error.
    pub async fn delete_session(
        &self,
        session_id: &str,
        confirm: impl FnOnce(&str) -> bool,
    ) -> Result<DeleteOutcome> {
        if !confirm(session_id) {
            return Ok(DeleteOutcome::Cancelled);
        }
        let outcome = match self.check_auth(self.backend.delete_session(session_id).await) {
            Ok(true) => {
                let mut state = self.lock();
                let was_current = state.directory.forget(session_id);
                if was_current {
                    state.view.clear();
                }
                DeleteOutcome::Deleted { was_current }
            }
            Ok(false) => {
                tracing::warn!(session_id, "backend reported the session was not deleted");
                DeleteOutcome::Rejected
            }
            Err(err) if err.is_authentication() => return Err(err),
            Err(err) => {
                tracing::warn!(session_id, error = %err, "could not delete session");
                DeleteOutcome::Failed(err)
            }
        };
        self.refresh_quietly().await;
        Ok(outcome)
    }

    /// Fetches the agent names and remembers them.
    pub async fn load_agents(&self) -> Result<Vec<String>> {
        let agents = self.check_auth(self.backend.agents().await)?;
        self.lock().agents = agents.clone();
        Ok(agents)
    }

    /////////////////////////////////////////// Auth ///////////////////////////////////////////

    /// Exchanges a credential from `identity` for a backend session.
    ///
    /// On failure the user stays unauthenticated.
    pub async fn login(&self, identity: &dyn IdentityProvider) -> Result<AuthUser> {
        let result = match identity.credential().await {
            Ok(credential) => self.backend.login(&credential).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(user) => {
                tracing::info!(username = %user.username, "logged in");
                self.lock().auth = AuthState::Authenticated(user.clone());
                self.refresh_quietly().await;
                Ok(user)
            }
            Err(err) => {
                self.lock().auth = AuthState::LoginRequired;
                Err(err)
            }
        }
    }

    /// Logs out and resets the state fetched on the user's behalf.
    ///
    /// Sessions, the log, and the agent list are dropped even when the
    /// backend call fails.  The agent name is client configuration and is
    /// kept for the next login.
    pub async fn logout(&self) -> Result<()> {
        let result = self.backend.logout().await;
        {
            let mut state = self.lock();
            state.directory = SessionDirectory::new();
            state.view.clear();
            state.agents.clear();
            state.auth = AuthState::Anonymous;
        }
        result
    }

    ////////////////////////////////////////// Submit //////////////////////////////////////////

    /// Sends `prompt` to the current session and streams the response in.
    ///
    /// Submissions are serialized per session: while one is in flight further
    /// prompts for the same session are ignored.  The session list is
    /// refreshed once the stream ends, successfully or not.
    ///
    /// Turns land only in the log that was on screen at submission.  Selecting
    /// another session, or reloading this one, starts a new log and the rest
    /// of the stream is drained without being shown.
    pub async fn submit(&self, prompt: &str, renderer: &mut dyn Renderer) -> SubmitOutcome {
        if prompt.trim().is_empty() {
            return SubmitOutcome::Ignored(SubmitGuard::EmptyPrompt);
        }
        let tag = {
            let mut state = self.lock();
            let Some(session_id) = state.directory.current().map(str::to_string) else {
                return SubmitOutcome::Ignored(SubmitGuard::NoSession);
            };
            if state.consumers.contains_key(&session_id) {
                return SubmitOutcome::Ignored(SubmitGuard::InFlight);
            }
            state
                .consumers
                .insert(session_id.clone(), ConsumerState::Submitting);
            StreamTag {
                session_id,
                generation: state.view.generation(),
            }
        };

        let start = Instant::now();
        let outcome = match self.backend.submit_prompt(&tag.session_id, prompt).await {
            Ok(body) => {
                self.set_consumer(&tag.session_id, ConsumerState::Streaming);
                let summary = consume_stream(body, &tag, self, renderer).await;
                self.finish_stream(&tag, summary, renderer)
            }
            Err(err) => self.fail_stream(&tag, err, 0, renderer),
        };
        STREAM_DURATION.add(start.elapsed().as_secs_f64());
        self.lock().consumers.remove(&tag.session_id);
        renderer.finish_response();

        if matches!(outcome, SubmitOutcome::LoginRequired) {
            renderer.print_login_required();
        } else {
            self.refresh_quietly().await;
        }
        outcome
    }

    fn set_consumer(&self, session_id: &str, state: ConsumerState) {
        self.lock().consumers.insert(session_id.to_string(), state);
    }

    fn finish_stream(
        &self,
        tag: &StreamTag,
        mut summary: StreamSummary,
        renderer: &mut dyn Renderer,
    ) -> SubmitOutcome {
        match summary.error.take() {
            None => {
                tracing::debug!(
                    session_id = %tag.session_id,
                    appended = summary.appended,
                    discarded = summary.discarded,
                    "response stream complete"
                );
                SubmitOutcome::Completed(summary)
            }
            Some(err) => self.fail_stream(tag, err, summary.appended, renderer),
        }
    }

    fn fail_stream(
        &self,
        tag: &StreamTag,
        error: Error,
        appended: usize,
        renderer: &mut dyn Renderer,
    ) -> SubmitOutcome {
        self.set_consumer(&tag.session_id, ConsumerState::Failed);
        if self.require_login_on(&error) {
            return SubmitOutcome::LoginRequired;
        }
        STREAM_TRANSPORT_FAILURES.click();
        tracing::warn!(session_id = %tag.session_id, error = %error, "chat request failed");
        let notice = Turn::notice(format!(
            "Sorry, something went wrong while talking to the agent: {error}"
        ));
        let view = render_turn(&notice);
        if self.append_turn(tag, notice) {
            renderer.print_turn(&view);
        }
        SubmitOutcome::Failed { error, appended }
    }
}

impl<B: ChatBackend> TurnSink for ChatContext<B> {
    fn append_turn(&self, tag: &StreamTag, turn: Turn) -> bool {
        let appended = self.lock().view.append(tag.generation, turn);
        if !appended {
            STREAM_STALE_TURNS.click();
        }
        appended
    }
}
