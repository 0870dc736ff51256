//! Configuration types for the chat application.
//!
//! Command-line arguments are parsed with `arrrg` into [`ChatArgs`] and
//! resolved into a [`ChatConfig`].

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::types::DEFAULT_AGENT_NAME;

/// Command-line arguments for the parley-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Backend base URL.
    #[arrrg(optional, "Backend URL (default: $PARLEY_BASE_URL or http://localhost:8000/)", "URL")]
    pub base_url: Option<String>,

    /// Agent for new sessions.
    #[arrrg(optional, "Agent for new sessions (default: search_bot)", "AGENT")]
    pub agent: Option<String>,

    /// Identity credential to log in with at startup.
    #[arrrg(optional, "Identity credential (default: $PARLEY_CREDENTIAL)", "TOKEN")]
    pub credential: Option<String>,

    /// Seconds to wait for a connection.
    #[arrrg(optional, "Connect timeout in seconds (default: 30)", "SECONDS")]
    pub connect_timeout: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Resolved settings for a chat run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Backend base URL; `None` defers to the environment.
    pub base_url: Option<String>,

    /// Agent new sessions are created for.
    pub agent_name: String,

    /// Credential given on the command line, if any.
    pub credential: Option<String>,

    /// Connect timeout; `None` uses the client default.
    pub connect_timeout: Option<Duration>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a config with the default agent and color enabled.
    pub fn new() -> Self {
        Self {
            base_url: None,
            agent_name: DEFAULT_AGENT_NAME.to_string(),
            credential: None,
            connect_timeout: None,
            use_color: true,
        }
    }

    /// Sets the backend base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the agent for new sessions.
    pub fn with_agent(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = agent_name.into();
        self
    }

    /// Sets the login credential.
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let agent_name = args
            .agent
            .map(|agent| agent.trim().to_string())
            .filter(|agent| !agent.is_empty())
            .unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string());

        ChatConfig {
            base_url: args.base_url,
            agent_name,
            credential: args.credential,
            connect_timeout: args.connect_timeout.map(Duration::from_secs),
            use_color: !args.no_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.agent_name, "search_bot");
        assert!(config.base_url.is_none());
        assert!(config.credential.is_none());
        assert!(config.connect_timeout.is_none());
        assert!(config.use_color);
        assert_eq!(ChatConfig::from(ChatArgs::default()), config);
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            base_url: Some("http://agents.internal:9000".to_string()),
            agent: Some(" math_bot ".to_string()),
            credential: Some("token".to_string()),
            connect_timeout: Some(5),
            no_color: true,
        };
        let config = ChatConfig::from(args);
        assert_eq!(config.base_url.as_deref(), Some("http://agents.internal:9000"));
        assert_eq!(config.agent_name, "math_bot");
        assert_eq!(config.credential.as_deref(), Some("token"));
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(5)));
        assert!(!config.use_color);
    }

    #[test]
    fn blank_agent_falls_back_to_default() {
        let args = ChatArgs {
            agent: Some("  ".to_string()),
            ..ChatArgs::default()
        };
        assert_eq!(ChatConfig::from(args).agent_name, "search_bot");
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_base_url("https://example.com/api/")
            .with_agent("math_bot")
            .with_credential("abc")
            .with_connect_timeout(Duration::from_secs(2))
            .without_color();
        assert_eq!(config.base_url.as_deref(), Some("https://example.com/api/"));
        assert_eq!(config.agent_name, "math_bot");
        assert_eq!(config.credential.as_deref(), Some("abc"));
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(2)));
        assert!(!config.use_color);
    }
}
