//! Configuration management for toolchat.
//!
//! Everything is read once at process start from environment-style
//! `NAME=value` pairs and is immutable afterwards.

#![warn(missing_docs, clippy::pedantic)]

mod command;
mod schema;

pub use command::CommandSpec;
pub use schema::{
    AppConfig, ConfigError, ConfigResult, ExternalBackendConfig, DEFAULT_MAX_TOKENS,
    DEFAULT_MODEL,
};
