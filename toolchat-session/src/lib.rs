//! Tool sessions for toolchat.
//!
//! A session is bound to one backend and lives for exactly one invocation.
//! Local providers are child processes speaking MCP (newline-delimited
//! JSON-RPC 2.0) on stdio; remote providers are plain HTTP endpoints. Both are
//! driven through [`ToolSession`], and [`SessionManager::call_once`] ties the
//! open/call/close sequence together.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod hint;
mod manager;
mod protocol;
mod remote;
mod session;
mod stdio;

pub use error::{SessionError, SessionResult};
pub use manager::{SessionManager, ToolOutcome};
pub use protocol::{PROTOCOL_VERSION, ToolInfo};
pub use remote::{REMOTE_TIMEOUT, RemoteSession};
pub use session::ToolSession;
pub use stdio::{CLOSE_GRACE, LaunchFailure, StdioSession};
