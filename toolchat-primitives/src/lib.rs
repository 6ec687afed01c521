//! Core shared types for the toolchat orchestration layer.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod label;

/// Error taxonomy and result alias shared across the workspace.
pub use error::{Error, ErrorCategory, Result};
/// Identifier under which a tool backend is registered.
pub use label::BackendLabel;
