//! Per-call session lifecycle: open, one invocation, close.

use std::fmt;

use serde_json::{Map, Value};
use toolchat_audit::{AuditLog, LogEntry};
use toolchat_primitives::ErrorCategory;
use toolchat_tools::{BackendDescriptor, BackendRegistry, Transport};
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::hint;
use crate::remote::RemoteSession;
use crate::session::ToolSession;
use crate::stdio::StdioSession;

/// Text result of a tool invocation, successful or not.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolOutcome {
    text: String,
    failure: Option<ErrorCategory>,
}

impl ToolOutcome {
    /// Successful outcome.
    #[must_use]
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            failure: None,
        }
    }

    /// Failed outcome with a user-facing description.
    #[must_use]
    pub fn failure(text: impl Into<String>, category: ErrorCategory) -> Self {
        Self {
            text: text.into(),
            failure: Some(category),
        }
    }

    pub(crate) fn from_error(err: &SessionError) -> Self {
        Self::failure(format!("Error: {err}"), err.category())
    }

    /// Text to show the user.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the invocation failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.failure.is_some()
    }

    /// Failure category, if any.
    #[must_use]
    pub fn category(&self) -> Option<ErrorCategory> {
        self.failure
    }

    /// Consumes the outcome, returning its text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

impl fmt::Display for ToolOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Opens sessions against registered backends and records every call.
#[derive(Clone, Debug)]
pub struct SessionManager {
    registry: BackendRegistry,
    audit: AuditLog,
}

impl SessionManager {
    /// Creates a manager over an immutable registry.
    #[must_use]
    pub fn new(registry: BackendRegistry, audit: AuditLog) -> Self {
        Self { registry, audit }
    }

    /// Backend catalogue used for lookups.
    #[must_use]
    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Audit log every invocation is written to.
    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Resolves `label` and opens a session to it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Registry`] for an unknown label and
    /// [`SessionError::Connection`] when no launch candidate comes up.
    pub async fn open(&self, label: &str) -> SessionResult<Box<dyn ToolSession>> {
        let descriptor = self.registry.resolve(label)?;
        Self::open_descriptor(descriptor).await
    }

    /// Opens a session to `descriptor`.
    ///
    /// Local candidates are tried in order; the first that completes the
    /// handshake wins.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Connection`] listing every failed attempt
    /// together with a remediation hint.
    pub async fn open_descriptor(
        descriptor: &BackendDescriptor,
    ) -> SessionResult<Box<dyn ToolSession>> {
        let label = descriptor.label();
        match descriptor.transport() {
            Transport::RemoteHttp { base_url } => {
                Ok(Box::new(RemoteSession::open(label.clone(), base_url)?))
            }
            Transport::LocalProcess { candidates } => {
                let mut failures = Vec::with_capacity(candidates.len());
                for command in candidates {
                    match StdioSession::launch(label.clone(), command).await {
                        Ok(session) => {
                            if !failures.is_empty() {
                                info!(backend = %label, command = %command, "connected with fallback command");
                            }
                            return Ok(Box::new(session));
                        }
                        Err(failure) => {
                            warn!(backend = %label, %failure, "launch attempt failed");
                            failures.push(failure);
                        }
                    }
                }

                Err(SessionError::Connection {
                    label: label.to_string(),
                    attempts: failures.iter().map(ToString::to_string).collect(),
                    hint: hint::combine(
                        failures
                            .iter()
                            .map(|f| hint::remediation(f.command.program(), &f.stderr)),
                    ),
                })
            }
        }
    }

    /// Runs one call on an open session and records exactly one log entry.
    pub async fn invoke(
        &self,
        session: &mut dyn ToolSession,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> ToolOutcome {
        let label = session.label().to_string();
        let request = summarize(tool, &arguments);
        match session.call(tool, arguments).await {
            Ok(text) => {
                self.audit
                    .append(LogEntry::success(label.as_str(), request, text.as_str()));
                ToolOutcome::success(text)
            }
            Err(err) => self.record_failure(&label, request, &err),
        }
    }

    /// Tears a session down.
    pub async fn close(&self, session: Box<dyn ToolSession>) {
        let label = session.label().to_string();
        session.close().await;
        debug!(backend = %label, "session closed");
    }

    /// Opens `label`, calls `tool` once and closes the session again.
    ///
    /// Never fails: errors are turned into a failed [`ToolOutcome`] and
    /// exactly one log entry is appended either way.
    pub async fn call_once(
        &self,
        label: &str,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> ToolOutcome {
        let mut session = match self.open(label).await {
            Ok(session) => session,
            Err(err) => return self.record_failure(label, summarize(tool, &arguments), &err),
        };
        let outcome = self.invoke(session.as_mut(), tool, arguments).await;
        self.close(session).await;
        outcome
    }

    /// Opens `label` and reports the tools it advertises.
    pub async fn list_tools(&self, label: &str) -> ToolOutcome {
        const REQUEST: &str = "tools/list";
        let session = match self.open(label).await {
            Ok(session) => session,
            Err(err) => return self.record_failure(label, REQUEST.to_owned(), &err),
        };

        let tools = session.tools();
        let text = if tools.is_empty() {
            format!("Backend `{label}` advertises no tools.")
        } else {
            let mut text = format!("Tools available on `{label}`:");
            for tool in tools {
                text.push_str(&format!("\n- {}", tool.name));
                if let Some(description) = &tool.description {
                    text.push_str(&format!(": {description}"));
                }
            }
            text
        };
        self.close(session).await;

        self.audit
            .append(LogEntry::success(label, REQUEST, text.as_str()));
        ToolOutcome::success(text)
    }

    fn record_failure(&self, label: &str, request: String, err: &SessionError) -> ToolOutcome {
        let outcome = ToolOutcome::from_error(err);
        warn!(backend = %label, category = %err.category(), error = %err, "tool invocation failed");
        self.audit.append(LogEntry::failure(
            label,
            request,
            outcome.text(),
            err.category(),
        ));
        outcome
    }
}

fn summarize(tool: &str, arguments: &Map<String, Value>) -> String {
    format!("{tool} {}", Value::Object(arguments.clone()))
}
