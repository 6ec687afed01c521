//! Static registry of tool backends keyed by label.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;
use toolchat_config::{AppConfig, CommandSpec};
use toolchat_primitives::{BackendLabel, ErrorCategory};
use tracing::debug;

/// Label of the QR codec provider.
pub const QR_LABEL: &str = "qr";
/// Label of the file-system provider.
pub const FILESYSTEM_LABEL: &str = "filesystem";
/// Label of the version-control provider.
pub const GIT_LABEL: &str = "git";
/// Label of the remote unit-conversion service.
pub const UNITS_LABEL: &str = "units";

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Launch command tried when the configured git provider cannot start.
#[must_use]
pub fn git_fallback() -> CommandSpec {
    CommandSpec::new("python", ["-m", "mcp_server_git"])
}

/// How a backend is reached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transport {
    /// Spawned child process speaking JSON-RPC on stdio.
    LocalProcess {
        /// Launch commands tried in order until one completes the handshake.
        candidates: Vec<CommandSpec>,
    },
    /// Stateless HTTP service.
    RemoteHttp {
        /// Base URL without the `/tools/...` suffix.
        base_url: String,
    },
}

/// One registered backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BackendDescriptor {
    label: BackendLabel,
    transport: Transport,
}

impl BackendDescriptor {
    /// Describes a local process backend.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidLabel`] for a malformed label and
    /// [`RegistryError::NoCandidates`] when `candidates` is empty.
    pub fn local(label: &str, candidates: Vec<CommandSpec>) -> RegistryResult<Self> {
        let label = BackendLabel::new(label)?;
        if candidates.is_empty() {
            return Err(RegistryError::NoCandidates {
                label: label.to_string(),
            });
        }
        Ok(Self {
            label,
            transport: Transport::LocalProcess { candidates },
        })
    }

    /// Describes a remote HTTP backend.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidLabel`] for a malformed label.
    pub fn remote(label: &str, base_url: impl Into<String>) -> RegistryResult<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_owned();
        Ok(Self {
            label: BackendLabel::new(label)?,
            transport: Transport::RemoteHttp { base_url },
        })
    }

    /// Registered label.
    #[must_use]
    pub fn label(&self) -> &BackendLabel {
        &self.label
    }

    /// Connection parameters.
    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Launch candidates; empty for remote backends.
    #[must_use]
    pub fn candidates(&self) -> &[CommandSpec] {
        match &self.transport {
            Transport::LocalProcess { candidates } => candidates,
            Transport::RemoteHttp { .. } => &[],
        }
    }
}

impl fmt::Display for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.transport {
            Transport::LocalProcess { candidates } => {
                write!(f, "{} (local:", self.label)?;
                for (idx, candidate) in candidates.iter().enumerate() {
                    let sep = if idx == 0 { " " } else { " | " };
                    write!(f, "{sep}{candidate}")?;
                }
                f.write_str(")")
            }
            Transport::RemoteHttp { base_url } => write!(f, "{} (remote: {base_url})", self.label),
        }
    }
}

/// Read-only catalogue of backends with O(1) lookup.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<BackendLabel, BackendDescriptor>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("registered", &self.labels())
            .finish()
    }
}

impl BackendRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry for a loaded configuration.
    ///
    /// Registers `qr`, `filesystem`, `git` (with the Python module fallback
    /// unless it is already the configured command), `units`, then every
    /// external backend.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateBackend`] if an external label
    /// collides with another backend, or [`RegistryError::InvalidLabel`] for
    /// malformed external labels.
    pub fn from_config(config: &AppConfig) -> RegistryResult<Self> {
        let mut registry = Self::new();
        registry.register(BackendDescriptor::local(QR_LABEL, vec![config.qr().clone()])?)?;
        registry.register(BackendDescriptor::local(
            FILESYSTEM_LABEL,
            vec![config.filesystem().clone()],
        )?)?;

        let mut git = vec![config.git().clone()];
        let fallback = git_fallback();
        if git[0] != fallback {
            git.push(fallback);
        }
        registry.register(BackendDescriptor::local(GIT_LABEL, git)?)?;

        registry.register(BackendDescriptor::remote(
            UNITS_LABEL,
            config.units_base_url(),
        )?)?;

        for external in config.external() {
            registry.register(BackendDescriptor::local(
                external.label(),
                vec![external.command().clone()],
            )?)?;
        }

        debug!(backends = ?registry.labels(), "backend registry built");
        Ok(registry)
    }

    /// Adds a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateBackend`] if the label is taken.
    pub fn register(&mut self, descriptor: BackendDescriptor) -> RegistryResult<()> {
        if self.backends.contains_key(descriptor.label()) {
            return Err(RegistryError::DuplicateBackend {
                label: descriptor.label().to_string(),
            });
        }
        self.backends.insert(descriptor.label().clone(), descriptor);
        Ok(())
    }

    /// Looks up a backend by label.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&BackendDescriptor> {
        self.backends.get(label.trim())
    }

    /// Looks up a backend, reporting the known labels when it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownBackend`] if no backend has `label`.
    pub fn resolve(&self, label: &str) -> RegistryResult<&BackendDescriptor> {
        self.get(label).ok_or_else(|| RegistryError::UnknownBackend {
            label: label.to_owned(),
            known: self.labels().into_iter().map(str::to_owned).collect(),
        })
    }

    /// Registered labels in lexical order.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<_> = self.backends.keys().map(BackendLabel::as_str).collect();
        labels.sort_unstable();
        labels
    }

    /// Number of backends.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether no backend is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

/// Errors produced while building or querying the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Label failed validation.
    #[error(transparent)]
    InvalidLabel(#[from] toolchat_primitives::Error),

    /// A local backend was declared without launch commands.
    #[error("backend `{label}` has no launch command")]
    NoCandidates {
        /// Offending label.
        label: String,
    },

    /// Two backends share a label.
    #[error("backend `{label}` is already registered")]
    DuplicateBackend {
        /// Offending label.
        label: String,
    },

    /// Lookup of a label that was never registered.
    #[error("unknown backend `{label}` (configured: {})", known.join(", "))]
    UnknownBackend {
        /// Requested label.
        label: String,
        /// Labels that are registered.
        known: Vec<String>,
    },
}

impl RegistryError {
    /// Every registry error is a configuration problem.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        AppConfig::from_vars(vars.iter().copied()).unwrap()
    }

    #[test]
    fn builds_fixed_and_external_backends() {
        let registry = BackendRegistry::from_config(&config(&[
            ("TOOLCHAT_WORKSPACE", "/tmp/ws"),
            ("EXT_SERVER_WEATHER_CMD", "weather-mcp"),
            ("EXT_SERVER_WEATHER_ARGS", "--stdio"),
            ("EXT_SERVER_NOTES_CMD", "notes"),
            ("EXT_SERVER_NOTES_LABEL", "my-notes"),
        ]))
        .unwrap();

        assert_eq!(
            registry.labels(),
            ["filesystem", "git", "my-notes", "qr", "units", "weather"]
        );

        let weather = registry.resolve("weather").unwrap();
        assert_eq!(
            weather.candidates(),
            [CommandSpec::new("weather-mcp", ["--stdio"])]
        );

        let units = registry.resolve("units").unwrap();
        assert_eq!(
            units.transport(),
            &Transport::RemoteHttp {
                base_url: "http://127.0.0.1:8080".into()
            }
        );
        assert!(units.candidates().is_empty());
    }

    #[test]
    fn git_gets_python_fallback_once() {
        let registry = BackendRegistry::from_config(&config(&[])).unwrap();
        let git = registry.resolve(GIT_LABEL).unwrap();
        assert_eq!(
            git.candidates(),
            [CommandSpec::new("uvx", ["mcp-server-git"]), git_fallback()]
        );

        let registry = BackendRegistry::from_config(&config(&[
            ("GIT_MCP_CMD", "python"),
            ("GIT_MCP_ARGS", "-m mcp_server_git"),
        ]))
        .unwrap();
        assert_eq!(
            registry.resolve(GIT_LABEL).unwrap().candidates(),
            [git_fallback()]
        );
    }

    #[test]
    fn unknown_label_names_known_backends() {
        let registry = BackendRegistry::from_config(&config(&[])).unwrap();
        let err = registry.resolve("UNCONFIGURED").expect_err("absent");
        let message = err.to_string();
        assert!(message.contains("UNCONFIGURED"));
        assert!(message.contains("filesystem, git, qr, units"));
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn external_label_cannot_shadow_builtin() {
        let err = BackendRegistry::from_config(&config(&[
            ("EXT_SERVER_X_CMD", "fake"),
            ("EXT_SERVER_X_LABEL", "git"),
        ]))
        .expect_err("duplicate");
        assert!(matches!(err, RegistryError::DuplicateBackend { label } if label == "git"));
    }

    #[test]
    fn descriptors_validate_inputs() {
        assert!(matches!(
            BackendDescriptor::local("x", Vec::new()),
            Err(RegistryError::NoCandidates { .. })
        ));
        assert!(matches!(
            BackendDescriptor::local("  ", vec![git_fallback()]),
            Err(RegistryError::InvalidLabel(_))
        ));

        let remote = BackendDescriptor::remote(" units ", "http://host:1/").unwrap();
        assert_eq!(remote.label().as_str(), "units");
        assert_eq!(remote.to_string(), "units (remote: http://host:1)");
    }

    #[test]
    fn lookup_trims_label() {
        let mut registry = BackendRegistry::new();
        registry
            .register(BackendDescriptor::local("qr", vec![CommandSpec::new("python", ["s.py"])]).unwrap())
            .unwrap();
        assert!(registry.get(" qr ").is_some());
        assert_eq!(registry.len(), 1);
    }
}
