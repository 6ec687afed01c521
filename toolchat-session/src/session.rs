//! Contract shared by every transport.

use async_trait::async_trait;
use serde_json::{Map, Value};
use toolchat_primitives::BackendLabel;

use crate::error::SessionResult;
use crate::protocol::ToolInfo;

/// Single-use connection to one backend.
///
/// A session is opened for exactly one invocation and must be handed back to
/// [`close`](ToolSession::close) afterwards, whether the call succeeded or
/// not.
#[async_trait]
pub trait ToolSession: Send {
    /// Label of the backend this session is bound to.
    fn label(&self) -> &BackendLabel;

    /// Tools advertised during the handshake. Empty for stateless backends.
    fn tools(&self) -> &[ToolInfo];

    /// Invokes `tool` with named arguments and returns its text output.
    async fn call(&mut self, tool: &str, arguments: Map<String, Value>) -> SessionResult<String>;

    /// Releases every resource held by the session.
    async fn close(self: Box<Self>);
}
