//! Scripted collaborators for exercising the chat state machines.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use bytes::Bytes;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use futures::stream;
use time::macros::datetime;

use crate::backend::ChatBackend;
use crate::ndjson::ByteStream;
use crate::render::{Renderer, TurnView};
use crate::types::{AuthUser, NewSession, ProtocolRecord, Session};
use crate::{Error, Result};

pub(crate) fn session(id: &str) -> Session {
    Session {
        id: id.to_string(),
        title: format!("title {id}"),
        created_at: datetime!(2024-05-01 12:00 UTC),
        last_message_at: datetime!(2024-05-01 12:00 UTC),
        agent_name: "search_bot".to_string(),
    }
}

pub(crate) fn byte_chunks(chunks: &[&str]) -> ByteStream {
    let chunks: Vec<Result<Bytes>> = chunks
        .iter()
        .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
        .collect();
    Box::pin(stream::iter(chunks))
}

pub(crate) fn failing_after(chunks: &[&str], error: Error) -> ByteStream {
    let mut items: Vec<Result<Bytes>> = chunks
        .iter()
        .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
        .collect();
    items.push(Err(error));
    Box::pin(stream::iter(items))
}

/// A body the test feeds by hand; dropping the sender ends it.
pub(crate) fn channel_stream() -> (UnboundedSender<Result<Bytes>>, ByteStream) {
    let (tx, rx) = unbounded();
    (tx, Box::pin(rx))
}

pub(crate) fn line(tx: &UnboundedSender<Result<Bytes>>, text: &str) {
    tx.unbounded_send(Ok(Bytes::copy_from_slice(text.as_bytes())))
        .unwrap();
}

/// A backend whose answers are set by the test.  Every call is recorded.
pub(crate) struct ScriptedBackend {
    pub sessions: Mutex<Result<Vec<Session>>>,
    pub created: Mutex<Result<NewSession>>,
    pub deleted: Mutex<Result<bool>>,
    pub histories: Mutex<HashMap<String, Result<Vec<ProtocolRecord>>>>,
    pub streams: Mutex<VecDeque<Result<ByteStream>>>,
    pub agents: Mutex<Result<Vec<String>>>,
    pub login: Mutex<Result<AuthUser>>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(Ok(Vec::new())),
            created: Mutex::new(Ok(NewSession {
                session_id: "session-new".to_string(),
                agent_name: "search_bot".to_string(),
            })),
            deleted: Mutex::new(Ok(true)),
            histories: Mutex::new(HashMap::new()),
            streams: Mutex::new(VecDeque::new()),
            agents: Mutex::new(Ok(vec!["search_bot".to_string()])),
            login: Mutex::new(Ok(AuthUser {
                username: "ada@example.com".to_string(),
                email: Some("ada@example.com".to_string()),
                full_name: Some("Ada".to_string()),
            })),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_sessions(self, ids: &[&str]) -> Self {
        self.set_sessions(Ok(ids.iter().map(|id| session(id)).collect()));
        self
    }

    pub fn set_sessions(&self, sessions: Result<Vec<Session>>) {
        *self.sessions.lock().unwrap() = sessions;
    }

    pub fn set_history(&self, session_id: &str, history: Result<Vec<ProtocolRecord>>) {
        self.histories
            .lock()
            .unwrap()
            .insert(session_id.to_string(), history);
    }

    pub fn push_stream(&self, body: Result<ByteStream>) {
        self.streams.lock().unwrap().push_back(body);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl ChatBackend for ScriptedBackend {
    async fn list_sessions(&self) -> Result<Vec<Session>> {
        self.record("list".to_string());
        self.sessions.lock().unwrap().clone()
    }

    async fn create_session(&self, agent_name: &str) -> Result<NewSession> {
        self.record(format!("create:{agent_name}"));
        self.created.lock().unwrap().clone()
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool> {
        self.record(format!("delete:{session_id}"));
        self.deleted.lock().unwrap().clone()
    }

    async fn history(&self, session_id: &str) -> Result<Vec<ProtocolRecord>> {
        self.record(format!("history:{session_id}"));
        self.histories
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn submit_prompt(&self, session_id: &str, prompt: &str) -> Result<ByteStream> {
        self.record(format!("submit:{session_id}:{prompt}"));
        self.streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::connection("no scripted stream", None)))
    }

    async fn agents(&self) -> Result<Vec<String>> {
        self.record("agents".to_string());
        self.agents.lock().unwrap().clone()
    }

    async fn login(&self, credential: &str) -> Result<AuthUser> {
        self.record(format!("login:{credential}"));
        self.login.lock().unwrap().clone()
    }

    async fn logout(&self) -> Result<()> {
        self.record("logout".to_string());
        Ok(())
    }
}

/// Captures everything a renderer is asked to show.
#[derive(Default)]
pub(crate) struct RecordingRenderer {
    pub turns: Vec<TurnView>,
    pub errors: Vec<String>,
    pub infos: Vec<String>,
    pub login_required: usize,
    pub finished: usize,
}

impl Renderer for RecordingRenderer {
    fn print_turn(&mut self, turn: &TurnView) {
        self.turns.push(turn.clone());
    }

    fn print_error(&mut self, error: &str) {
        self.errors.push(error.to_string());
    }

    fn print_info(&mut self, info: &str) {
        self.infos.push(info.to_string());
    }

    fn print_sessions(&mut self, _: &[Session], _: Option<&str>) {}

    fn print_agents(&mut self, _: &[String], _: &str) {}

    fn print_login_required(&mut self) {
        self.login_required += 1;
    }

    fn finish_response(&mut self) {
        self.finished += 1;
    }
}
