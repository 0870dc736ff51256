//! Interactive chat with the agents backend.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a backend on localhost
//! parley-chat
//!
//! # Another backend, logging in up front
//! parley-chat --base-url https://agents.example.com/ --credential "$TOKEN"
//!
//! # Disable colors (useful for piping output)
//! parley-chat --no-color
//! ```
//!
//! Logging goes to stderr and is controlled by `PARLEY_LOG` (default `warn`).
//! Type `/help` at the prompt for commands.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use parley::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatContext, DeleteOutcome, PlainTextRenderer, Renderer,
    SubmitOutcome, help_text, parse_command,
};
use parley::render::render_turn;
use parley::{AgentsClient, AuthState, EnvCredential, Error, IdentityProvider, StaticCredential};

const LOG_ENV: &str = "PARLEY_LOG";

type Context = ChatContext<AgentsClient>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("parley-chat [OPTIONS]");
    let config = ChatConfig::from(args);
    let use_color = config.use_color;

    let client = AgentsClient::with_options(config.base_url.clone(), config.connect_timeout)?;
    let base_url = client.base_url().to_string();
    let context = Arc::new(ChatContext::new(client).with_agent(config.agent_name.clone()));
    let mut renderer = PlainTextRenderer::with_color(use_color);
    let mut rl = DefaultEditor::new()?;

    // Set by Ctrl+C while a reply is streaming.
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    println!("parley ({base_url}, agent: {})", context.agent_name());
    println!("Type /help for commands, /quit to exit\n");

    if config.credential.is_some() || std::env::var(parley::auth::CREDENTIAL_ENV).is_ok() {
        login(&context, &config, None, &mut renderer).await;
    }
    match context.refresh_sessions().await {
        Ok(()) => renderer.print_sessions(&context.sessions(), None),
        Err(err) => report(&mut renderer, &err),
    }

    loop {
        interrupted.store(false, Ordering::Relaxed);

        let prompt = match context.current_session() {
            Some(id) => format!("[{}] > ", short_id(&id)),
            None => "> ".to_string(),
        };
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line);

        let Some(command) = parse_command(line) else {
            submit(&context, line, use_color, &interrupted, &mut renderer).await;
            continue;
        };
        match command {
            ChatCommand::Quit => {
                println!("Goodbye!");
                break;
            }
            ChatCommand::Help => {
                for line in help_text().lines() {
                    println!("    {line}");
                }
            }
            ChatCommand::New(agent) => match context.create_session(agent.as_deref()).await {
                Ok(created) if created.provisional => renderer.print_error(&format!(
                    "The backend did not create a session; using local id {}",
                    created.id
                )),
                Ok(created) => renderer.print_info(&format!(
                    "Started session {} with {}",
                    created.id, created.agent_name
                )),
                Err(err) => report(&mut renderer, &err),
            },
            ChatCommand::Sessions => {
                renderer.print_sessions(&context.sessions(), context.current_session().as_deref())
            }
            ChatCommand::Refresh => match context.refresh_sessions().await {
                Ok(()) => renderer
                    .print_sessions(&context.sessions(), context.current_session().as_deref()),
                Err(err) => report(&mut renderer, &err),
            },
            ChatCommand::Select(selector) => {
                let Some(id) = context.resolve_session(&selector) else {
                    renderer.print_error("No such session");
                    continue;
                };
                match context.select_session(&id).await {
                    Ok(_) => print_history(&context, &mut renderer),
                    Err(err) => report(&mut renderer, &err),
                }
            }
            ChatCommand::Delete(selector) => {
                let Some(id) = context.resolve_session(&selector) else {
                    renderer.print_error("No such session");
                    continue;
                };
                let outcome = context
                    .delete_session(&id, |id| confirm(&mut rl, &format!("Delete session {id}?")))
                    .await;
                match outcome {
                    Ok(DeleteOutcome::Cancelled) => renderer.print_info("Not deleted."),
                    Ok(DeleteOutcome::Deleted { was_current }) => {
                        renderer.print_info(&format!("Deleted {id}."));
                        if was_current {
                            renderer.print_info("No session selected; use /new or /select.");
                        }
                    }
                    Ok(DeleteOutcome::Rejected) => {
                        renderer.print_error(&format!("The backend did not delete {id}."))
                    }
                    Ok(DeleteOutcome::Failed(err)) | Err(err) => report(&mut renderer, &err),
                }
            }
            ChatCommand::Agents => match context.load_agents().await {
                Ok(agents) => renderer.print_agents(&agents, &context.agent_name()),
                Err(err) => report(&mut renderer, &err),
            },
            ChatCommand::Agent(name) => {
                let known = context.known_agents();
                if !known.is_empty() && !known.contains(&name) {
                    renderer.print_error(&format!("Unknown agent {name}; see /agents"));
                    continue;
                }
                context.set_agent_name(name.clone());
                renderer.print_info(&format!("New sessions will use {name}."));
            }
            ChatCommand::History => print_history(&context, &mut renderer),
            ChatCommand::Login(credential) => {
                login(&context, &config, credential, &mut renderer).await;
            }
            ChatCommand::Logout => {
                if let Err(err) = context.logout().await {
                    renderer.print_error(&format!("Logout request failed: {err}"));
                }
                renderer.print_info("Logged out.");
            }
            ChatCommand::WhoAmI => match context.auth_state() {
                AuthState::Authenticated(user) => renderer.print_info(&format!(
                    "{} <{}>",
                    user.display_name(),
                    user.email.as_deref().unwrap_or(&user.username)
                )),
                AuthState::LoginRequired => renderer.print_login_required(),
                AuthState::Anonymous => renderer.print_info("Not logged in."),
            },
            ChatCommand::Invalid(message) => renderer.print_error(&message),
        }
    }

    Ok(())
}

/// Streams a reply on a background task so Ctrl+C can return to the prompt.
///
/// An interrupted reply keeps draining in the background with its output
/// muted; the backend still records it.
async fn submit(
    context: &Arc<Context>,
    prompt: &str,
    use_color: bool,
    interrupted: &Arc<AtomicBool>,
    renderer: &mut PlainTextRenderer,
) {
    if context.current_session().is_none() {
        renderer.print_info("No session selected; use /new or /select.");
        return;
    }
    let muted = Arc::new(AtomicBool::new(false));
    let mut handle = {
        let context = Arc::clone(context);
        let prompt = prompt.to_string();
        let mut task_renderer =
            PlainTextRenderer::with_color(use_color).with_interrupt(Arc::clone(&muted));
        tokio::spawn(async move { context.submit(&prompt, &mut task_renderer).await })
    };

    loop {
        tokio::select! {
            joined = &mut handle => {
                match joined {
                    Ok(SubmitOutcome::Ignored(reason)) => {
                        renderer.print_info(&format!("Not sent: {reason}"))
                    }
                    Ok(_) => {}
                    Err(err) => renderer.print_error(&format!("Reply task failed: {err}")),
                }
                return;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                if interrupted.swap(false, Ordering::Relaxed) {
                    muted.store(true, Ordering::Relaxed);
                    renderer.print_interrupted();
                    return;
                }
            }
        }
    }
}

async fn login(
    context: &Context,
    config: &ChatConfig,
    credential: Option<String>,
    renderer: &mut PlainTextRenderer,
) {
    let identity: Box<dyn IdentityProvider> = match credential.or_else(|| config.credential.clone())
    {
        Some(credential) => Box::new(StaticCredential::new(credential)),
        None => Box::new(EnvCredential::new()),
    };
    match context.login(identity.as_ref()).await {
        Ok(user) => renderer.print_info(&format!("Logged in as {}.", user.display_name())),
        Err(err) => renderer.print_error(&format!("Login failed: {err}")),
    }
}

fn print_history(context: &Context, renderer: &mut PlainTextRenderer) {
    let turns = context.turns();
    if turns.is_empty() {
        renderer.print_info("(no messages yet)");
    }
    for turn in &turns {
        renderer.print_turn(&render_turn(turn));
    }
}

fn report(renderer: &mut PlainTextRenderer, err: &Error) {
    if err.is_authentication() {
        renderer.print_login_required();
    } else if err.is_connection() || err.is_timeout() {
        renderer.print_error(&format!("{err} (is the backend running? see --base-url)"));
    } else {
        renderer.print_error(&err.to_string());
    }
}

fn confirm(rl: &mut DefaultEditor, question: &str) -> bool {
    let _ = std::io::stdout().flush();
    match rl.readline(&format!("{question} [y/N] ")) {
        Ok(answer) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

fn short_id(id: &str) -> &str {
    match id.char_indices().nth(24) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
