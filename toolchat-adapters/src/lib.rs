//! Model adapters and the conversation client used by toolchat.
//!
//! The [`traits`] module defines the provider-agnostic request/response
//! types, [`anthropic`] implements them over HTTPS, and [`conversation`]
//! layers turn history and auditing on top.

#![warn(missing_docs, clippy::pedantic)]

pub mod anthropic;
pub mod conversation;
pub mod http_client;
pub mod traits;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;
