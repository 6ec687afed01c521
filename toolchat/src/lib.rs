//! Chat front end that routes requests to MCP tool providers.
//!
//! This crate re-exports the workspace crates under short names and ships
//! the `toolchat` REPL binary (behind the default `cli` feature).

#![warn(missing_docs, clippy::pedantic)]

/// Labels and the error taxonomy shared by every crate.
pub use toolchat_primitives as primitives;

/// Process configuration read from the environment.
pub use toolchat_config as config;

/// Append-only record of external interactions.
pub use toolchat_audit as audit;

/// Model adapters and the conversation client.
pub use toolchat_adapters as adapters;

/// Backend descriptors and the registry.
pub use toolchat_tools as tools;

/// Stdio and HTTP tool sessions.
pub use toolchat_session as session;

/// Planner, dispatcher and the per-line orchestrator.
pub use toolchat_kernel as kernel;
