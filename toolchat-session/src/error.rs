//! Session error type.

use thiserror::Error;
use toolchat_adapters::traits::AdapterError;
use toolchat_primitives::ErrorCategory;
use toolchat_tools::RegistryError;

/// Result alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Failures raised while opening, using or closing a tool session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Every launch candidate failed to spawn or complete the handshake.
    #[error("could not connect to backend `{label}`: {}\nHint: {hint}", attempts.join("; "))]
    Connection {
        /// Backend label.
        label: String,
        /// One message per attempted launch command, in order.
        attempts: Vec<String>,
        /// Suggested fix for the operator.
        hint: String,
    },

    /// The pipe or socket to the backend broke mid-exchange.
    #[error("connection error with `{label}`: {reason}")]
    Transport {
        /// Backend label.
        label: String,
        /// Underlying cause.
        reason: String,
    },

    /// The backend answered with something other than the expected shape.
    #[error("protocol error with `{label}`: {reason}")]
    Protocol {
        /// Backend label.
        label: String,
        /// What was wrong with the response.
        reason: String,
    },

    /// A remote backend answered with a non-success status.
    #[error("{status}, {body}")]
    Status {
        /// Backend label.
        label: String,
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The tool ran and reported failure itself.
    #[error("tool `{tool}` on `{label}` failed: {message}")]
    Tool {
        /// Backend label.
        label: String,
        /// Tool name.
        tool: String,
        /// Text returned by the tool.
        message: String,
    },

    /// Backend lookup failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Connection parameters could not be used.
    #[error("backend `{label}` is misconfigured: {reason}")]
    Configuration {
        /// Backend label.
        label: String,
        /// Why the parameters were rejected.
        reason: String,
    },
}

impl SessionError {
    pub(crate) fn transport(label: &str, reason: impl Into<String>) -> Self {
        Self::Transport {
            label: label.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn protocol(label: &str, reason: impl Into<String>) -> Self {
        Self::Protocol {
            label: label.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn from_adapter(label: &str, err: AdapterError) -> Self {
        match err {
            AdapterError::Configuration { reason } | AdapterError::InvalidRequest { reason } => {
                Self::Configuration {
                    label: label.to_owned(),
                    reason,
                }
            }
            AdapterError::Transport { reason } => Self::transport(label, reason),
            AdapterError::Status { status, body } => Self::Status {
                label: label.to_owned(),
                status,
                body,
            },
            AdapterError::Response { reason } => Self::protocol(label, reason),
        }
    }

    /// Maps the error onto the shared taxonomy.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Transport { .. } => ErrorCategory::Transport,
            Self::Protocol { .. } | Self::Status { .. } => ErrorCategory::Protocol,
            Self::Tool { .. } => ErrorCategory::Tool,
            Self::Registry(_) | Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }
}
