//! Shared error definitions for toolchat primitives.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used by primitive constructors.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// Backend label failed validation.
    #[error("invalid backend label `{label}`: {reason}")]
    InvalidLabel {
        /// The offending label string.
        label: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}

/// Coarse classification of every failure the orchestration layer reports.
///
/// Each crate keeps its own error enum; `category()` on those enums maps onto
/// this taxonomy so audit entries and traces can be filtered uniformly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Network or process-level failure.
    Transport,
    /// Malformed or unexpected response shape.
    Protocol,
    /// The provider itself reported failure.
    Tool,
    /// Backend not registered or a runtime prerequisite is missing.
    Configuration,
    /// A backend could not be launched or refused the handshake.
    Connection,
    /// A required field was absent from a structured plan.
    Argument,
    /// Planner output was not recognizable as structured data.
    Parse,
}

impl ErrorCategory {
    /// Returns the stable lowercase name of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::Tool => "tool",
            Self::Configuration => "configuration",
            Self::Connection => "connection",
            Self::Argument => "argument",
            Self::Parse => "parse",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorCategory::Configuration).unwrap();
        assert_eq!(json, "\"configuration\"");
        assert_eq!(ErrorCategory::Argument.to_string(), "argument");
    }
}
