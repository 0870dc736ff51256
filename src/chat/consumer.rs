//! Consuming one chat response stream.
//!
//! A submission moves a session through [`ConsumerState`].  The body of the
//! response is drained by [`consume_stream`], which frames it into records and
//! hands every decoded turn to a [`TurnSink`] along with the [`StreamTag`] the
//! stream was opened under.  The sink decides whether the log that tag names
//! is still on screen; the stream is drained to the end either way so the
//! backend gets to persist the exchange.

use std::fmt;

use futures::StreamExt;

use crate::Error;
use crate::ndjson::{ByteStream, LineOutcome, process_ndjson};
use crate::observability::{STREAM_IGNORED_RECORDS, STREAM_MALFORMED_LINES, STREAM_TURNS};
use crate::render::{Renderer, render_turn};
use crate::types::Turn;

const LOGGED_LINE_LIMIT: usize = 200;

/// Where a session's submission stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConsumerState {
    /// Nothing in flight.
    #[default]
    Idle,
    /// The request is out; no response body yet.
    Submitting,
    /// The response body is being read.
    Streaming,
    /// The request or the stream failed; a notice is being appended.
    Failed,
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumerState::Idle => write!(f, "idle"),
            ConsumerState::Submitting => write!(f, "submitting"),
            ConsumerState::Streaming => write!(f, "streaming"),
            ConsumerState::Failed => write!(f, "failed"),
        }
    }
}

/// Why a submission was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitGuard {
    /// The prompt was empty or whitespace.
    EmptyPrompt,
    /// No session is selected.
    NoSession,
    /// The current session already has a submission in flight.
    InFlight,
}

impl fmt::Display for SubmitGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitGuard::EmptyPrompt => write!(f, "prompt is empty"),
            SubmitGuard::NoSession => write!(f, "no session selected"),
            SubmitGuard::InFlight => write!(f, "a response is still streaming for this session"),
        }
    }
}

/// How a submission ended.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Nothing was sent.
    Ignored(SubmitGuard),
    /// The stream ran to completion.
    Completed(StreamSummary),
    /// The request or the stream failed; a notice turn was appended if the
    /// session was still current.
    Failed {
        /// What went wrong.
        error: Error,
        /// Turns appended before the failure.
        appended: usize,
    },
    /// The backend answered 401.  Nothing was appended.
    LoginRequired,
}

/// Names the log a stream writes into: a session, and the generation of the
/// conversation view that was on screen when the stream started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTag {
    /// The session the prompt was submitted to.
    pub session_id: String,
    /// [`ConversationView::generation`](crate::chat::ConversationView::generation)
    /// at submission time.
    pub generation: u64,
}

/// Receives turns decoded from a stream.
pub trait TurnSink: Send + Sync {
    /// Appends `turn` if the log `tag` names is still on screen.
    ///
    /// Returns false when the turn was discarded.  Reselecting or reloading
    /// the same session counts as a different log.
    fn append_turn(&self, tag: &StreamTag, turn: Turn) -> bool;
}

/// Counts of what a drained stream contained.
#[derive(Debug, Default, Clone)]
pub struct StreamSummary {
    /// Turns appended to the log.
    pub appended: usize,
    /// Turns decoded after their session stopped being current.
    pub discarded: usize,
    /// Records of kinds that are not displayed.
    pub ignored: usize,
    /// Lines that were not valid JSON records.
    pub malformed: usize,
    /// The transport error that cut the stream short, if any.
    pub error: Option<Error>,
}

/// Drains `body`, appending the turns it carries to the log `tag` names.
///
/// Appended turns are printed as they arrive.  Malformed lines and unknown
/// record kinds are logged and skipped.  A transport error stops reading and
/// is reported in the summary; it is not turned into a notice here.
pub async fn consume_stream(
    body: ByteStream,
    tag: &StreamTag,
    sink: &dyn TurnSink,
    renderer: &mut dyn Renderer,
) -> StreamSummary {
    let session_id = tag.session_id.as_str();
    let mut summary = StreamSummary::default();
    let mut outcomes = Box::pin(process_ndjson(body));
    while let Some(outcome) = outcomes.next().await {
        match outcome {
            Ok(LineOutcome::Blank) => {}
            Ok(LineOutcome::Turn(turn)) => {
                STREAM_TURNS.click();
                let view = render_turn(&turn);
                if sink.append_turn(tag, turn) {
                    summary.appended += 1;
                    renderer.print_turn(&view);
                } else {
                    summary.discarded += 1;
                    tracing::debug!(session_id, "discarding turn for a log no longer shown");
                }
            }
            Ok(LineOutcome::Ignored { kind }) => {
                STREAM_IGNORED_RECORDS.click();
                summary.ignored += 1;
                tracing::debug!(session_id, kind = ?kind, "ignoring record");
            }
            Ok(LineOutcome::Malformed { error, line }) => {
                STREAM_MALFORMED_LINES.click();
                summary.malformed += 1;
                tracing::warn!(
                    session_id,
                    error = %error,
                    line = %truncate(&line, LOGGED_LINE_LIMIT),
                    "skipping malformed stream line"
                );
            }
            Err(error) => {
                tracing::warn!(session_id, error = %error, "response stream failed");
                summary.error = Some(error);
            }
        }
    }
    summary
}

fn truncate(line: &str, limit: usize) -> &str {
    match line.char_indices().nth(limit) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}
