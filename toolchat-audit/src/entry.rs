//! Audit log entry type.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use toolchat_primitives::ErrorCategory;
use uuid::Uuid;

/// Timestamp format used when rendering entries.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Record of a single external interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    id: Uuid,
    timestamp: DateTime<Local>,
    backend: String,
    request: String,
    response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure: Option<ErrorCategory>,
}

impl LogEntry {
    /// Records a successful interaction.
    #[must_use]
    pub fn success(
        backend: impl Into<String>,
        request: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self::build(backend.into(), request.into(), response.into(), None)
    }

    /// Records a failed interaction together with its category.
    #[must_use]
    pub fn failure(
        backend: impl Into<String>,
        request: impl Into<String>,
        response: impl Into<String>,
        category: ErrorCategory,
    ) -> Self {
        Self::build(
            backend.into(),
            request.into(),
            response.into(),
            Some(category),
        )
    }

    fn build(
        backend: String,
        request: String,
        response: String,
        failure: Option<ErrorCategory>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Local::now(),
            backend,
            request,
            response,
            failure,
        }
    }

    /// Unique identifier of the entry.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Local time at which the entry was created.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    /// Label of the backend (or `LLM`) that was contacted.
    #[must_use]
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Summary of what was requested.
    #[must_use]
    pub fn request(&self) -> &str {
        &self.request
    }

    /// Text returned to the user.
    #[must_use]
    pub fn response(&self) -> &str {
        &self.response
    }

    /// Whether the interaction failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.failure.is_some()
    }

    /// Category of the failure, if any.
    #[must_use]
    pub fn category(&self) -> Option<ErrorCategory> {
        self.failure
    }

    /// Renders the entry in the log-dump layout.
    #[must_use]
    pub fn render(&self) -> String {
        let status = match self.failure {
            Some(category) => format!("ERROR/{category}"),
            None => "OK".to_owned(),
        };
        format!(
            "[{}] ({}) [{status}]\n -> Request: {}\n <- Response: {}\n",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.backend,
            self.request,
            self.response,
        )
    }
}
