//! Projection of conversation turns into displayable form, and output.
//!
//! [`render_part`] and [`render_turn`] are pure and total: every [`Part`],
//! including kinds this client has never heard of, maps to a [`PartView`].
//! A [`Renderer`] then puts views on a screen; [`PlainTextRenderer`] writes
//! them to a terminal with optional ANSI styling.

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::types::{Part, Role, Session, Turn};
use crate::utils::time::format_short;

/// ANSI escape code for dim text (used for timestamps and placeholders).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for turn headers).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for tool names).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for tool arguments).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for green text (used for the user's turns).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for unknown parts and errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for magenta text (used for tool return bodies).
const ANSI_MAGENTA: &str = "\x1b[35m";

/// Text shown in place of a turn without parts.
pub const EMPTY_TURN_PLACEHOLDER: &str = "(nothing to display)";

///////////////////////////////////////////// Views ////////////////////////////////////////////

/// Render-agnostic form of a single part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartView {
    /// Text to show verbatim, line breaks preserved.
    Preformatted {
        /// The text.
        text: String,
    },

    /// A tool invocation.
    ToolCall {
        /// The tool's name.
        tool_name: String,
        /// Pretty-printed arguments, when the call had any.
        args: Option<String>,
    },

    /// A tool's result.
    ToolReturn {
        /// The tool's name, when known.
        tool_name: Option<String>,
        /// The result, verbatim for strings and pretty-printed otherwise.
        body: String,
        /// Whether `body` is a dump of a structured value.
        structured: bool,
    },

    /// A part of a kind this client does not recognize.
    Unknown {
        /// Label naming the unrecognized kind.
        kind: String,
        /// Pretty-printed dump of the entire part.
        dump: String,
    },
}

/// The displayable content of a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnBody {
    /// The turn's parts, in order.
    Parts(Vec<PartView>),
    /// The turn had no parts.
    Empty,
}

/// Render-agnostic form of a whole turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnView {
    /// Who produced the turn.
    pub role: Role,
    /// When the turn was received.
    pub timestamp: OffsetDateTime,
    /// What to show.
    pub body: TurnBody,
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Projects one part into its view.
pub fn render_part(part: &Part) -> PartView {
    match part {
        Part::Text(text) | Part::UserPrompt(text) => PartView::Preformatted {
            text: text.content.clone(),
        },
        Part::ToolCall(call) => PartView::ToolCall {
            tool_name: call.tool_name.clone(),
            args: call.structured_args().map(|args| match args {
                Value::String(s) => s,
                other => pretty(&other),
            }),
        },
        Part::ToolReturn(ret) => {
            let (body, structured) = match &ret.content {
                Value::String(s) => (s.clone(), false),
                other => (pretty(other), true),
            };
            PartView::ToolReturn {
                tool_name: ret.tool_name.clone(),
                body,
                structured,
            }
        }
        Part::Unknown(unknown) => PartView::Unknown {
            kind: unknown
                .kind()
                .map(str::to_string)
                .unwrap_or_else(|| "(missing part_kind)".to_string()),
            dump: pretty(&unknown.raw),
        },
    }
}

/// Projects a sequence of parts; an empty sequence becomes [`TurnBody::Empty`].
pub fn render_parts(parts: &[Part]) -> TurnBody {
    if parts.is_empty() {
        TurnBody::Empty
    } else {
        TurnBody::Parts(parts.iter().map(render_part).collect())
    }
}

/// Projects a turn.
pub fn render_turn(turn: &Turn) -> TurnView {
    TurnView {
        role: turn.role,
        timestamp: turn.timestamp,
        body: render_parts(&turn.parts),
    }
}

/////////////////////////////////////////// Renderers //////////////////////////////////////////

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Recording views in tests
pub trait Renderer: Send {
    /// Print one conversation turn.
    ///
    /// Called once per turn as the turn is appended, so streamed responses
    /// show up progressively.
    fn print_turn(&mut self, turn: &TurnView);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print the session directory, marking the current session.
    fn print_sessions(&mut self, sessions: &[Session], current: Option<&str>);

    /// Print the available agents, marking the one new sessions will use.
    fn print_agents(&mut self, agents: &[String], selected: &str);

    /// Tell the user they must authenticate again.
    fn print_login_required(&mut self);

    /// Called when a response stream is complete.
    fn finish_response(&mut self) {}

    /// Called when the user stops waiting for a stream.
    fn print_interrupted(&mut self) {}

    /// Returns true if output should stop because the user interrupted.
    fn should_interrupt(&self) -> bool {
        false
    }
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    interrupted: Option<Arc<AtomicBool>>,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a new PlainTextRenderer on stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer on stdout with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl Default for PlainTextRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer writing to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            interrupted: None,
        }
    }

    /// Attaches an interrupt flag; once set, turns are no longer printed.
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(interrupted);
        self
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn style(&self, code: &'static str) -> &'static str {
        if self.use_color { code } else { "" }
    }

    fn reset(&self) -> &'static str {
        self.style(ANSI_RESET)
    }

    /// Writes text with every line prefixed by two spaces.
    fn write_indented(&mut self, color: &'static str, text: &str) {
        let color = self.style(color);
        let reset = if color.is_empty() { "" } else { ANSI_RESET };
        for line in text.lines() {
            let _ = writeln!(self.out, "  {color}{line}{reset}");
        }
        if text.is_empty() {
            let _ = writeln!(self.out);
        }
    }

    fn write_part(&mut self, part: &PartView) {
        let reset = self.reset();
        match part {
            PartView::Preformatted { text } => {
                let _ = writeln!(self.out, "{text}");
            }
            PartView::ToolCall { tool_name, args } => {
                let cyan = self.style(ANSI_CYAN);
                let _ = writeln!(self.out, "{cyan}[tool call: {tool_name}]{reset}");
                if let Some(args) = args {
                    self.write_indented(ANSI_YELLOW, args);
                }
            }
            PartView::ToolReturn {
                tool_name, body, ..
            } => {
                let green = self.style(ANSI_GREEN);
                match tool_name {
                    Some(name) => {
                        let _ = writeln!(self.out, "{green}[tool return: {name}]{reset}");
                    }
                    None => {
                        let _ = writeln!(self.out, "{green}[tool return]{reset}");
                    }
                }
                self.write_indented(ANSI_MAGENTA, body);
            }
            PartView::Unknown { kind, dump } => {
                let red = self.style(ANSI_RED);
                let _ = writeln!(self.out, "{red}[unknown part: {kind}]{reset}");
                self.write_indented(ANSI_RED, dump);
            }
        }
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_turn(&mut self, turn: &TurnView) {
        if self.should_interrupt() {
            return;
        }
        let (bold, dim, reset) = (self.style(ANSI_BOLD), self.style(ANSI_DIM), self.reset());
        let role_color = match turn.role {
            Role::User => self.style(ANSI_GREEN),
            Role::Agent => self.style(ANSI_CYAN),
        };
        let clock = turn
            .timestamp
            .format(format_description!("[hour]:[minute]:[second]"))
            .unwrap_or_default();
        let _ = writeln!(
            self.out,
            "{bold}{role_color}{}{reset} {dim}{clock}{reset}",
            turn.role
        );
        match &turn.body {
            TurnBody::Empty => {
                let _ = writeln!(self.out, "{dim}{EMPTY_TURN_PLACEHOLDER}{reset}");
            }
            TurnBody::Parts(parts) => {
                for part in parts {
                    self.write_part(part);
                }
            }
        }
        let _ = self.out.flush();
    }

    fn print_error(&mut self, error: &str) {
        let (red, reset) = (self.style(ANSI_RED), self.reset());
        let _ = writeln!(self.out, "{red}Error: {error}{reset}");
        let _ = self.out.flush();
    }

    fn print_info(&mut self, info: &str) {
        let _ = writeln!(self.out, "{info}");
        let _ = self.out.flush();
    }

    fn print_sessions(&mut self, sessions: &[Session], current: Option<&str>) {
        if sessions.is_empty() {
            let _ = writeln!(self.out, "(no sessions)");
        }
        let (dim, reset) = (self.style(ANSI_DIM), self.reset());
        for (index, session) in sessions.iter().enumerate() {
            let marker = if current == Some(session.id.as_str()) {
                '*'
            } else {
                ' '
            };
            let _ = writeln!(
                self.out,
                "{marker} {:>2}. {} [{}] {dim}last {} ({}){reset}",
                index + 1,
                session.title,
                session.agent_name,
                format_short(&session.last_message_at),
                session.id,
            );
        }
        let _ = self.out.flush();
    }

    fn print_agents(&mut self, agents: &[String], selected: &str) {
        for agent in agents {
            let marker = if agent == selected { '*' } else { ' ' };
            let _ = writeln!(self.out, "{marker} {agent}");
        }
        let _ = self.out.flush();
    }

    fn print_login_required(&mut self) {
        if self.should_interrupt() {
            return;
        }
        let (red, reset) = (self.style(ANSI_RED), self.reset());
        let _ = writeln!(
            self.out,
            "{red}Not authenticated.{reset} Use /login [credential] to sign in."
        );
        let _ = self.out.flush();
    }

    fn finish_response(&mut self) {
        if self.should_interrupt() {
            return;
        }
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }

    fn print_interrupted(&mut self) {
        let _ = writeln!(self.out, "\n[interrupted]");
        let _ = self.out.flush();
    }

    fn should_interrupt(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}
