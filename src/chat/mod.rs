//! Conversation logic for the agents backend.
//!
//! # Architecture
//!
//! - [`directory`]: the session list and the current selection
//! - [`view`]: the turn log of the session on screen
//! - [`consumer`]: draining one NDJSON response into turns
//! - [`context`]: [`ChatContext`], which owns the state above and runs every
//!   backend operation against it
//! - [`config`] and [`commands`]: the REPL's arguments and slash commands

pub mod commands;
pub mod config;
pub mod consumer;
pub mod context;
pub mod directory;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use consumer::{
    ConsumerState, StreamSummary, StreamTag, SubmitGuard, SubmitOutcome, TurnSink,
    consume_stream,
};
pub use context::ChatContext;
pub use directory::{CreatedSession, DeleteOutcome, SessionDirectory, placeholder_session_id};
pub use view::ConversationView;
