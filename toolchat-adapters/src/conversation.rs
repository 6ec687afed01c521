//! Stateful conversation client.
//!
//! [`ConversationClient`] owns the turn history for the whole process and
//! records every round trip in the [`AuditLog`]. History only grows on a
//! fully successful exchange, and always by one user turn plus one assistant
//! turn.

use std::fmt;
use std::sync::Arc;

use toolchat_audit::{AuditLog, LogEntry};
use toolchat_primitives::ErrorCategory;
use tracing::{debug, warn};

use crate::traits::{AdapterError, InferenceRequest, MessageRole, ModelAdapter, PromptMessage};

/// Audit label used for LLM round trips.
pub const LLM_LABEL: &str = "LLM";

/// Returned when the provider answers without any content blocks.
pub const EMPTY_RESPONSE: &str = "(empty or unexpected response)";

/// Ordered (role, text) turns exchanged so far.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationState {
    turns: Vec<PromptMessage>,
}

impl ConversationState {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the turns in insertion order.
    #[must_use]
    pub fn turns(&self) -> &[PromptMessage] {
        &self.turns
    }

    /// Number of recorded turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no exchange has completed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn outgoing(&self, prompt: &str) -> Vec<PromptMessage> {
        let mut messages = self.turns.clone();
        messages.push(PromptMessage::new(MessageRole::User, prompt));
        messages
    }

    fn record_exchange(&mut self, prompt: &str, reply: &str) {
        self.turns.push(PromptMessage::new(MessageRole::User, prompt));
        self.turns
            .push(PromptMessage::new(MessageRole::Assistant, reply));
    }
}

/// Text produced by one [`ConversationClient`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    text: String,
    failure: Option<ErrorCategory>,
}

impl Reply {
    /// The text shown to the user (model answer or error description).
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the round trip failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.failure.is_some()
    }

    /// Failure category when the round trip failed.
    #[must_use]
    pub fn category(&self) -> Option<ErrorCategory> {
        self.failure
    }

    /// Consumes the reply, returning its text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Wraps a [`ModelAdapter`] with turn history and auditing.
pub struct ConversationClient {
    adapter: Arc<dyn ModelAdapter>,
    history: ConversationState,
    audit: AuditLog,
    max_tokens: u32,
}

impl fmt::Debug for ConversationClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metadata = self.adapter.metadata();
        f.debug_struct("ConversationClient")
            .field("provider", &metadata.provider())
            .field("model", &metadata.model())
            .field("turns", &self.history.len())
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl ConversationClient {
    /// Creates a client with an empty history and a 256 token cap.
    #[must_use]
    pub fn new(adapter: Arc<dyn ModelAdapter>, audit: AuditLog) -> Self {
        Self {
            adapter,
            history: ConversationState::new(),
            audit,
            max_tokens: 256,
        }
    }

    /// Overrides the token cap sent with every request.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Returns the conversation history.
    #[must_use]
    pub fn history(&self) -> &ConversationState {
        &self.history
    }

    /// Returns the audit log this client writes to.
    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Sends `prompt` after the existing history.
    pub async fn ask(&mut self, prompt: &str) -> Reply {
        self.round_trip(None, prompt).await
    }

    /// Same as [`ask`](Self::ask) with a top-level system instruction.
    pub async fn ask_with_system(&mut self, system: &str, prompt: &str) -> Reply {
        self.round_trip(Some(system), prompt).await
    }

    async fn round_trip(&mut self, system: Option<&str>, prompt: &str) -> Reply {
        let outcome = match InferenceRequest::new(self.history.outgoing(prompt)) {
            Ok(request) => {
                let mut request = request.with_max_output_tokens(self.max_tokens);
                if let Some(system) = system {
                    request = request.with_system_prompt(system);
                }
                self.adapter.complete(request).await
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(completion) if completion.is_empty() => {
                warn!("LLM answered without content blocks");
                self.audit
                    .append(LogEntry::success(LLM_LABEL, prompt, EMPTY_RESPONSE));
                Reply {
                    text: EMPTY_RESPONSE.to_owned(),
                    failure: None,
                }
            }
            Ok(completion) => {
                let text = completion.text();
                self.history.record_exchange(prompt, &text);
                debug!(turns = self.history.len(), "conversation history extended");
                self.audit
                    .append(LogEntry::success(LLM_LABEL, prompt, text.as_str()));
                Reply {
                    text,
                    failure: None,
                }
            }
            Err(err) => {
                let text = describe_failure(&err);
                let category = err.category();
                warn!(error = %err, %category, "LLM round trip failed");
                self.audit
                    .append(LogEntry::failure(LLM_LABEL, prompt, text.as_str(), category));
                Reply {
                    text,
                    failure: Some(category),
                }
            }
        }
    }
}

fn describe_failure(err: &AdapterError) -> String {
    match err {
        AdapterError::Transport { reason } => format!("Connection error: {reason}"),
        AdapterError::Status { status, body } => format!("Error: {status}, {body}"),
        other => format!("Error: {other}"),
    }
}
