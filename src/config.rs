//! Configuration types for the chat client.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved configuration that the
//! client, controller and terminal front end are built from.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::pacing::PACING_INTERVAL;

/// Server used when neither the command line nor the environment names one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/";

/// Environment variable that overrides the default server.
pub const BASE_URL_ENV: &str = "STREAMCHAT_BASE_URL";

/// Path of the welcome endpoint, relative to the base URL.
pub const DEFAULT_WELCOME_PATH: &str = "api/v1/chat/welcome";

/// Path of the chat endpoint, relative to the base URL.
pub const DEFAULT_CHAT_PATH: &str = "api/v1/chat/";

/// Request header that carries the session identifier.
pub const DEFAULT_SESSION_HEADER: &str = "X-Session-ID";

/// Longest message the server accepts, in characters.
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 1000;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Command-line arguments for the streamchat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the chat server.
    #[arrrg(optional, "Chat server base URL (default: $STREAMCHAT_BASE_URL or http://localhost:8000/)", "URL")]
    pub base_url: Option<String>,

    /// File that persists the session identifier across runs.
    #[arrrg(optional, "File to persist the session id in (default: keep it in memory)", "PATH")]
    pub session_file: Option<String>,

    /// Delay before each streamed text fragment, in milliseconds.
    #[arrrg(optional, "Delay before each text fragment in ms (default: 20)", "MS")]
    pub pacing_ms: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat client.
///
/// This struct holds the resolved configuration values after processing command-line arguments
/// and the environment with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Base URL of the chat server, always ending in `/`.
    pub base_url: String,

    /// Welcome endpoint path, relative to `base_url`.
    pub welcome_path: String,

    /// Chat endpoint path, relative to `base_url`.
    pub chat_path: String,

    /// Name of the header that carries the session identifier.
    pub session_header: String,

    /// Delay before each text fragment.
    pub pacing_interval: Duration,

    /// Messages longer than this many characters are rejected before sending.
    pub max_message_chars: Option<usize>,

    /// Connect timeout for both calls and whole-request timeout for the welcome call.
    pub timeout: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// File that persists the session identifier; `None` keeps it in memory.
    pub session_file: Option<PathBuf>,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Base URL: `http://localhost:8000/`
    /// - Endpoints: `api/v1/chat/welcome` and `api/v1/chat/`
    /// - Session header: `X-Session-ID`
    /// - Pacing: 20 ms
    /// - Max message length: 1000 characters
    /// - Color: enabled
    /// - Session file: none
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            welcome_path: DEFAULT_WELCOME_PATH.to_string(),
            chat_path: DEFAULT_CHAT_PATH.to_string(),
            session_header: DEFAULT_SESSION_HEADER.to_string(),
            pacing_interval: PACING_INTERVAL,
            max_message_chars: Some(DEFAULT_MAX_MESSAGE_CHARS),
            timeout: DEFAULT_TIMEOUT,
            use_color: true,
            session_file: None,
        }
    }

    /// Creates the default configuration with `STREAMCHAT_BASE_URL` applied when set.
    pub fn from_env() -> Self {
        match env::var(BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::new().with_base_url(url.trim()),
            _ => Self::new(),
        }
    }

    /// Sets the base URL, appending a trailing `/` so endpoint paths join beneath it.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    /// Sets the welcome endpoint path.
    pub fn with_welcome_path(mut self, path: impl Into<String>) -> Self {
        self.welcome_path = path.into();
        self
    }

    /// Sets the chat endpoint path.
    pub fn with_chat_path(mut self, path: impl Into<String>) -> Self {
        self.chat_path = path.into();
        self
    }

    /// Sets the session header name.
    pub fn with_session_header(mut self, header: impl Into<String>) -> Self {
        self.session_header = header.into();
        self
    }

    /// Sets the pacing interval.
    pub fn with_pacing_interval(mut self, interval: Duration) -> Self {
        self.pacing_interval = interval;
        self
    }

    /// Sets the maximum message length; `None` disables the check.
    pub fn with_max_message_chars(mut self, max: Option<usize>) -> Self {
        self.max_message_chars = max;
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sets the session file.
    pub fn with_session_file(mut self, path: Option<PathBuf>) -> Self {
        self.session_file = path;
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
        let mut config = match args.base_url {
            Some(url) => ChatConfig::new().with_base_url(url),
            None => ChatConfig::from_env(),
        };
        if let Some(ms) = args.pacing_ms {
            config.pacing_interval = Duration::from_millis(ms);
        }
        config.session_file = args.session_file.map(PathBuf::from);
        config.use_color = !args.no_color;
        config
    }
}
