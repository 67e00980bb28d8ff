//! Error types for the streamchat client.
//!
//! Low-level failures (transport, HTTP status, decoding) are represented by their own variants.
//! The controller folds them into the two user-facing failures, [`Error::WelcomeFetchFailed`]
//! and [`Error::ChatStreamFailed`], keeping the low-level error as the source.

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

/// Fixed user-visible message shown when a chat request or its stream fails.
pub const CHAT_ERROR_MESSAGE: &str = "오류가 발생했습니다. 다시 시도해주세요.";

/// Fixed user-visible message shown when the welcome message cannot be loaded.
pub const WELCOME_ERROR_MESSAGE: &str = "웰컴 메시지를 불러오는데 실패했습니다.";

/// The main error type for streamchat.
#[derive(Clone, Debug)]
pub enum Error {
    /// The server answered with a non-success status.
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Response body or the `detail` field of a JSON error body.
        message: String,
    },

    /// Connection error.
    Connection {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Request timed out.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// Duration of the timeout in seconds.
        duration: Option<f64>,
    },

    /// HTTP client error.
    HttpClient {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// A URL parsing or joining error.
    Url {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<url::ParseError>,
    },

    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },

    /// Error during JSON serialization or deserialization outside the event stream.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The response body failed while it was being read.
    Streaming {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// A `data:` line whose payload is not a valid event object.
    MalformedEvent {
        /// Human-readable error message.
        message: String,
        /// The offending payload, without the `data: ` prefix.
        line: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Input rejected before any request was made.
    Validation {
        /// Human-readable error message.
        message: String,
        /// Parameter that failed validation.
        param: Option<String>,
    },

    /// The welcome call failed (transport error or non-success status).
    WelcomeFetchFailed {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<Error>>,
    },

    /// Sending a message or reading its reply stream failed.
    ChatStreamFailed {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<Error>>,
    },
}

impl Error {
    /// Creates a new API error.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Error::Api {
            status_code,
            message: message.into(),
        }
    }

    /// Creates a new connection error.
    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new streaming error.
    pub fn streaming(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new malformed event error.
    pub fn malformed_event(
        message: impl Into<String>,
        line: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::MalformedEvent {
            message: message.into(),
            line: line.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            param,
        }
    }

    /// Wraps `cause` as a welcome failure.
    pub fn welcome_fetch_failed(cause: Error) -> Self {
        if cause.is_welcome_fetch_failed() {
            return cause;
        }
        Error::WelcomeFetchFailed {
            message: cause.to_string(),
            source: Some(Arc::new(cause)),
        }
    }

    /// Wraps `cause` as a chat stream failure.
    pub fn chat_stream_failed(cause: Error) -> Self {
        if cause.is_chat_stream_failed() {
            return cause;
        }
        Error::ChatStreamFailed {
            message: cause.to_string(),
            source: Some(Arc::new(cause)),
        }
    }

    /// Returns true if this error is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// Returns true if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Returns true if this error happened while reading a response body.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Error::Streaming { .. })
    }

    /// Returns true if this error is a malformed stream event.
    pub fn is_malformed_event(&self) -> bool {
        matches!(self, Error::MalformedEvent { .. })
    }

    /// Returns true if this error is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Returns true if this error is a welcome failure.
    pub fn is_welcome_fetch_failed(&self) -> bool {
        matches!(self, Error::WelcomeFetchFailed { .. })
    }

    /// Returns true if this error is a chat stream failure.
    pub fn is_chat_stream_failed(&self) -> bool {
        matches!(self, Error::ChatStreamFailed { .. })
    }

    /// Returns the status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. } => Some(*status_code),
            Error::WelcomeFetchFailed {
                source: Some(source),
                ..
            }
            | Error::ChatStreamFailed {
                source: Some(source),
                ..
            } => source.status_code(),
            _ => None,
        }
    }

    /// Returns the fixed message shown to the user for this error.
    ///
    /// No structured detail reaches the user: welcome failures map to [`WELCOME_ERROR_MESSAGE`]
    /// and everything else to [`CHAT_ERROR_MESSAGE`].
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::WelcomeFetchFailed { .. } => WELCOME_ERROR_MESSAGE,
            _ => CHAT_ERROR_MESSAGE,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api {
                status_code,
                message,
            } => {
                write!(f, "API error ({status_code}): {message}")
            }
            Error::Connection { message, .. } => {
                write!(f, "Connection error: {message}")
            }
            Error::Timeout { message, duration } => {
                if let Some(duration) = duration {
                    write!(f, "Timeout error: {message} ({duration} seconds)")
                } else {
                    write!(f, "Timeout error: {message}")
                }
            }
            Error::HttpClient { message, .. } => {
                write!(f, "HTTP client error: {message}")
            }
            Error::Url { message, .. } => {
                write!(f, "URL error: {message}")
            }
            Error::Io { message, .. } => {
                write!(f, "I/O error: {message}")
            }
            Error::Serialization { message, .. } => {
                write!(f, "Serialization error: {message}")
            }
            Error::Streaming { message, .. } => {
                write!(f, "Streaming error: {message}")
            }
            Error::MalformedEvent { message, line, .. } => {
                write!(f, "Malformed event: {message} in '{line}'")
            }
            Error::Validation { message, param } => {
                if let Some(param) = param {
                    write!(f, "Validation error: {message} (parameter: {param})")
                } else {
                    write!(f, "Validation error: {message}")
                }
            }
            Error::WelcomeFetchFailed { message, .. } => {
                write!(f, "Welcome fetch failed: {message}")
            }
            Error::ChatStreamFailed { message, .. } => {
                write!(f, "Chat stream failed: {message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Connection { source, .. }
            | Error::HttpClient { source, .. }
            | Error::Serialization { source, .. }
            | Error::Streaming { source, .. }
            | Error::MalformedEvent { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            Error::WelcomeFetchFailed { source, .. } | Error::ChatStreamFailed { source, .. } => {
                source
                    .as_ref()
                    .map(|e| e.as_ref() as &(dyn error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

/// A specialized Result type for streamchat operations.
pub type Result<T> = std::result::Result<T, Error>;
