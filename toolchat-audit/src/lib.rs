//! Audit trail for toolchat.
//!
//! Every LLM round trip and backend invocation appends exactly one
//! [`LogEntry`] to the shared [`AuditLog`]. Entries live in memory for the
//! lifetime of the process and are never modified after being appended.

#![warn(missing_docs, clippy::pedantic)]

mod entry;
mod trail;

pub use entry::LogEntry;
pub use trail::AuditLog;
