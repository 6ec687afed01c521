//! Backend catalogue for toolchat.
//!
//! The registry is assembled once from [`toolchat_config::AppConfig`] and is
//! read-only afterwards. Sessions are opened against the descriptors it
//! hands out.

#![warn(missing_docs, clippy::pedantic)]

mod registry;

pub use registry::{
    BackendDescriptor, BackendRegistry, FILESYSTEM_LABEL, GIT_LABEL, QR_LABEL, RegistryError,
    RegistryResult, Transport, UNITS_LABEL, git_fallback,
};
