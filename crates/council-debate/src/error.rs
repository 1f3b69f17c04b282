//! Error types for debate operations

use council_llm::LLMError;
use std::fmt;
use thiserror::Error;

/// Debate engine errors
#[derive(Debug, Error)]
pub enum DebateError {
    /// Fatal setup problem, e.g. no agent has a usable provider
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Market data could not be fetched for the subject
    #[error("Market data unavailable for {symbol}: {reason}")]
    UpstreamData { symbol: String, reason: String },

    /// A provider call failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A provider response could not be turned into an agent output
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Debate store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Reading configuration or writing output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for debate operations
pub type Result<T> = std::result::Result<T, DebateError>;

impl From<council_utils::EnvError> for DebateError {
    fn from(err: council_utils::EnvError) -> Self {
        DebateError::Configuration(err.to_string())
    }
}

impl From<LLMError> for DebateError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::ConfigurationError(msg) => DebateError::Configuration(msg),
            other => DebateError::Provider(other.into()),
        }
    }
}

/// How a single provider call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The call did not finish within its time budget
    Timeout,
    /// Connection, HTTP or decoding failure
    TransportFailure,
    /// The provider answered but refused or produced nothing usable
    Rejected,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Timeout => "timeout",
            Self::TransportFailure => "transport failure",
            Self::Rejected => "rejected",
        };
        f.write_str(label)
    }
}

/// Failure of one outbound provider call
#[derive(Debug, Clone, Error)]
#[error("provider {kind}: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Timeout,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::TransportFailure,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Rejected,
            message: message.into(),
        }
    }
}

impl From<LLMError> for ProviderError {
    fn from(err: LLMError) -> Self {
        let message = err.to_string();
        match err {
            e if e.is_timeout() => Self::timeout(message),
            LLMError::HttpError(_)
            | LLMError::ServerError { .. }
            | LLMError::SerializationError(_)
            | LLMError::UnexpectedResponse(_) => Self::transport(message),
            LLMError::RequestFailed(_)
            | LLMError::AuthenticationFailed
            | LLMError::RateLimitExceeded(_)
            | LLMError::InvalidRequest(_)
            | LLMError::ModelNotFound(_)
            | LLMError::EmptyCompletion(_)
            | LLMError::ConfigurationError(_) => Self::rejected(message),
        }
    }
}

/// A response that no extraction strategy could parse, or that parsed into
/// something other than a usable agent output
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct ParseError {
    pub reason: String,
    /// Cleaned primary candidate, kept for diagnostics
    pub cleaned: String,
}

impl ParseError {
    pub fn new(reason: impl Into<String>, cleaned: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            cleaned: cleaned.into(),
        }
    }
}
