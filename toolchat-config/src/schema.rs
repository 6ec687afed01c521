//! Strongly typed configuration schema.

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;
use toolchat_primitives::ErrorCategory;
use tracing::{debug, warn};

use crate::command::CommandSpec;

/// Model used when `TOOLCHAT_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

/// Token cap used when `TOOLCHAT_MAX_TOKENS` is not set.
pub const DEFAULT_MAX_TOKENS: u32 = 256;

const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
const MODEL_VAR: &str = "TOOLCHAT_MODEL";
const MAX_TOKENS_VAR: &str = "TOOLCHAT_MAX_TOKENS";
const WORKSPACE_VAR: &str = "TOOLCHAT_WORKSPACE";
const QR_PATH_VAR: &str = "QR_MCP_PATH";
const QR_PYTHON_VAR: &str = "QR_MCP_PYTHON";
const FS_CMD_VAR: &str = "FS_MCP_CMD";
const FS_ARGS_VAR: &str = "FS_MCP_ARGS";
const GIT_CMD_VAR: &str = "GIT_MCP_CMD";
const GIT_ARGS_VAR: &str = "GIT_MCP_ARGS";
const UNITS_URL_VAR: &str = "UNITS_BASE_URL";

const EXTERNAL_PREFIX: &str = "EXT_SERVER_";
const EXTERNAL_CMD_SUFFIX: &str = "_CMD";
const EXTERNAL_ARGS_SUFFIX: &str = "_ARGS";
const EXTERNAL_LABEL_SUFFIX: &str = "_LABEL";

const DEFAULT_UNITS_URL: &str = "http://127.0.0.1:8080";

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is absent or empty.
    #[error("missing required configuration `{name}`")]
    Missing {
        /// Variable name.
        name: String,
    },

    /// A variable is present but cannot be interpreted.
    #[error("invalid configuration `{name}`: {reason}")]
    Invalid {
        /// Variable name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Convenience constructor for invalid values.
    #[must_use]
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Maps the error onto the shared taxonomy.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// One operator-labelled external backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalBackendConfig {
    label: String,
    command: CommandSpec,
}

impl ExternalBackendConfig {
    /// Creates an external backend entry.
    #[must_use]
    pub fn new(label: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            label: label.into(),
            command,
        }
    }

    /// Display label used to address the backend.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Launch command.
    #[must_use]
    pub fn command(&self) -> &CommandSpec {
        &self.command
    }
}

/// Complete process configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    workspace_root: PathBuf,
    qr: CommandSpec,
    filesystem: CommandSpec,
    filesystem_overridden: bool,
    git: CommandSpec,
    units_base_url: String,
    external: Vec<ExternalBackendConfig>,
}

impl AppConfig {
    /// Loads configuration from the process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable cannot be interpreted.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_vars(utf8_vars(env::vars_os()))
    }

    /// Loads configuration from explicit `NAME=value` pairs.
    ///
    /// Empty values are treated as unset. External backends are discovered
    /// from `EXT_SERVER_<KEY>_CMD` entries and returned in key order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable cannot be interpreted.
    pub fn from_vars<I, K, V>(vars: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: BTreeMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        let get = |name: &str| vars.get(name).map(|v| v.trim().to_owned());

        let workspace_root = get(WORKSPACE_VAR).map_or_else(
            || env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            PathBuf::from,
        );

        let max_tokens = match get(MAX_TOKENS_VAR) {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|tokens| *tokens > 0)
                .ok_or_else(|| {
                    ConfigError::invalid(MAX_TOKENS_VAR, "expected a positive integer")
                })?,
            None => DEFAULT_MAX_TOKENS,
        };

        let qr = CommandSpec::new(
            get(QR_PYTHON_VAR).unwrap_or_else(|| "python".to_owned()),
            [get(QR_PATH_VAR).unwrap_or_else(|| "server_mcp.py".to_owned())],
        );

        let filesystem = match get(FS_CMD_VAR) {
            Some(program) => CommandSpec::new(
                program,
                CommandSpec::parse_args(FS_ARGS_VAR, &get(FS_ARGS_VAR).unwrap_or_default())?,
            ),
            None => default_filesystem(&workspace_root),
        };

        let git = CommandSpec::new(
            get(GIT_CMD_VAR).unwrap_or_else(|| "uvx".to_owned()),
            match get(GIT_ARGS_VAR) {
                Some(raw) => CommandSpec::parse_args(GIT_ARGS_VAR, &raw)?,
                None if get(GIT_CMD_VAR).is_none() => vec!["mcp-server-git".to_owned()],
                None => Vec::new(),
            },
        );

        let units_base_url = get(UNITS_URL_VAR).unwrap_or_else(|| DEFAULT_UNITS_URL.to_owned());
        if !(units_base_url.starts_with("http://") || units_base_url.starts_with("https://")) {
            return Err(ConfigError::invalid(
                UNITS_URL_VAR,
                "must start with http:// or https://",
            ));
        }

        let external = collect_external(&vars)?;
        debug!(
            external = external.len(),
            workspace = %workspace_root.display(),
            "configuration loaded"
        );

        Ok(Self {
            api_key: get(API_KEY_VAR),
            model: get(MODEL_VAR).unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            max_tokens,
            workspace_root,
            qr,
            filesystem,
            filesystem_overridden: get(FS_CMD_VAR).is_some(),
            git,
            units_base_url,
            external,
        })
    }

    /// Overrides the model identifier.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the token cap.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Overrides the workspace root.
    ///
    /// The default file-system provider is re-pointed at the new root; an
    /// explicit `FS_MCP_CMD` is left untouched.
    #[must_use]
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        if !self.filesystem_overridden {
            self.filesystem = default_filesystem(&self.workspace_root);
        }
        self
    }

    /// Returns the API key, failing when it was not configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `ANTHROPIC_API_KEY` is unset.
    pub fn require_api_key(&self) -> ConfigResult<&str> {
        self.api_key.as_deref().ok_or_else(|| ConfigError::Missing {
            name: API_KEY_VAR.to_owned(),
        })
    }

    /// Returns the configured API key if any.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Returns the model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the LLM token cap.
    #[must_use]
    pub const fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Returns the workspace root used for file-system and repository work.
    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Returns the QR provider launch command.
    #[must_use]
    pub fn qr(&self) -> &CommandSpec {
        &self.qr
    }

    /// Returns the file-system provider launch command.
    #[must_use]
    pub fn filesystem(&self) -> &CommandSpec {
        &self.filesystem
    }

    /// Returns the primary version-control provider launch command.
    #[must_use]
    pub fn git(&self) -> &CommandSpec {
        &self.git
    }

    /// Returns the base URL of the remote unit-conversion service.
    #[must_use]
    pub fn units_base_url(&self) -> &str {
        &self.units_base_url
    }

    /// Returns the operator-labelled external backends.
    #[must_use]
    pub fn external(&self) -> &[ExternalBackendConfig] {
        &self.external
    }
}

fn utf8_vars(vars: impl IntoIterator<Item = (OsString, OsString)>) -> Vec<(String, String)> {
    vars.into_iter()
        .filter_map(|(name, value)| match (name.into_string(), value.into_string()) {
            (Ok(name), Ok(value)) => Some((name, value)),
            (Ok(name), Err(_)) => {
                warn!(variable = %name, "ignoring environment variable with a non UTF-8 value");
                None
            }
            (Err(name), _) => {
                warn!(variable = %name.to_string_lossy(), "ignoring environment variable with a non UTF-8 name");
                None
            }
        })
        .collect()
}

fn default_filesystem(root: &Path) -> CommandSpec {
    CommandSpec::new(
        "npx",
        [
            "-y".to_owned(),
            "@modelcontextprotocol/server-filesystem".to_owned(),
            root.display().to_string(),
        ],
    )
}

fn collect_external(vars: &BTreeMap<String, String>) -> ConfigResult<Vec<ExternalBackendConfig>> {
    let mut external = Vec::new();
    for (name, value) in vars {
        let Some(rest) = name.strip_prefix(EXTERNAL_PREFIX) else {
            continue;
        };

        if let Some(key) = rest.strip_suffix(EXTERNAL_CMD_SUFFIX) {
            if key.is_empty() {
                return Err(ConfigError::invalid(name.as_str(), "missing backend key"));
            }
            let args_name = format!("{EXTERNAL_PREFIX}{key}{EXTERNAL_ARGS_SUFFIX}");
            let label_name = format!("{EXTERNAL_PREFIX}{key}{EXTERNAL_LABEL_SUFFIX}");
            let args = match vars.get(&args_name) {
                Some(raw) => CommandSpec::parse_args(&args_name, raw)?,
                None => Vec::new(),
            };
            let label = vars
                .get(&label_name)
                .map_or_else(|| key.to_ascii_lowercase(), |l| l.trim().to_owned());
            external.push(ExternalBackendConfig::new(
                label,
                CommandSpec::new(value.trim(), args),
            ));
        } else if let Some(key) = rest
            .strip_suffix(EXTERNAL_ARGS_SUFFIX)
            .or_else(|| rest.strip_suffix(EXTERNAL_LABEL_SUFFIX))
        {
            let cmd_name = format!("{EXTERNAL_PREFIX}{key}{EXTERNAL_CMD_SUFFIX}");
            if !vars.contains_key(&cmd_name) {
                warn!(variable = %name, "external backend entry without a command; ignoring");
            }
        }
    }
    Ok(external)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![("ANTHROPIC_API_KEY", "sk-test"), ("TOOLCHAT_WORKSPACE", "/srv/work")]
    }

    #[test]
    fn applies_defaults() {
        let cfg = AppConfig::from_vars(base()).unwrap();
        assert_eq!(cfg.model(), DEFAULT_MODEL);
        assert_eq!(cfg.max_tokens(), DEFAULT_MAX_TOKENS);
        assert_eq!(cfg.require_api_key().unwrap(), "sk-test");
        assert_eq!(cfg.git().to_string(), "uvx mcp-server-git");
        assert_eq!(cfg.qr().to_string(), "python server_mcp.py");
        assert_eq!(
            cfg.filesystem().args().last().map(String::as_str),
            Some("/srv/work")
        );
        assert_eq!(cfg.units_base_url(), DEFAULT_UNITS_URL);
        assert!(cfg.external().is_empty());
    }

    #[test]
    fn missing_api_key_is_reported() {
        let cfg = AppConfig::from_vars([("ANTHROPIC_API_KEY", "   ")]).unwrap();
        let err = cfg.require_api_key().expect_err("blank key");
        assert!(matches!(err, ConfigError::Missing { name } if name == "ANTHROPIC_API_KEY"));
    }

    #[test]
    fn discovers_external_backends() {
        let mut vars = base();
        vars.extend([
            ("EXT_SERVER_TIME_CMD", "python"),
            ("EXT_SERVER_TIME_ARGS", "remote_time.py --stdio"),
            ("EXT_SERVER_ECHO_CMD", "echo-mcp"),
            ("EXT_SERVER_ECHO_LABEL", "Echo"),
            ("EXT_SERVER_ORPHAN_ARGS", "x"),
        ]);
        let cfg = AppConfig::from_vars(vars).unwrap();
        let external = cfg.external();
        assert_eq!(external.len(), 2);
        assert_eq!(external[0].label(), "Echo");
        assert!(external[0].command().args().is_empty());
        assert_eq!(external[1].label(), "time");
        assert_eq!(external[1].command().args(), ["remote_time.py", "--stdio"]);
    }

    #[test]
    fn git_command_override_drops_default_args() {
        let mut vars = base();
        vars.push(("GIT_MCP_CMD", "mcp-git"));
        let cfg = AppConfig::from_vars(vars).unwrap();
        assert_eq!(cfg.git().program(), "mcp-git");
        assert!(cfg.git().args().is_empty());
    }

    #[test]
    fn workspace_override_moves_default_filesystem_root() {
        let cfg = AppConfig::from_vars(base())
            .unwrap()
            .with_workspace_root("/tmp/elsewhere");
        assert_eq!(cfg.workspace_root(), Path::new("/tmp/elsewhere"));
        assert_eq!(
            cfg.filesystem().args().last().map(String::as_str),
            Some("/tmp/elsewhere")
        );

        let mut vars = base();
        vars.extend([("FS_MCP_CMD", "fs-mcp"), ("FS_MCP_ARGS", "/data")]);
        let cfg = AppConfig::from_vars(vars)
            .unwrap()
            .with_workspace_root("/tmp/elsewhere");
        assert_eq!(cfg.filesystem().args(), ["/data"]);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_environment_entries_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let vars = utf8_vars([
            (OsString::from("TOOLCHAT_MODEL"), OsString::from("claude-test")),
            (OsString::from("BROKEN_VALUE"), OsString::from_vec(vec![0x66, 0xff])),
            (OsString::from_vec(vec![0xfe, 0x41]), OsString::from("x")),
        ]);
        assert_eq!(vars, [("TOOLCHAT_MODEL".to_owned(), "claude-test".to_owned())]);

        let cfg = AppConfig::from_vars(vars).unwrap();
        assert_eq!(cfg.model(), "claude-test");
    }

    #[test]
    fn rejects_bad_values() {
        let mut vars = base();
        vars.push(("TOOLCHAT_MAX_TOKENS", "zero"));
        let err = AppConfig::from_vars(vars).expect_err("bad token cap");
        assert!(matches!(err, ConfigError::Invalid { name, .. } if name == MAX_TOKENS_VAR));

        let mut vars = base();
        vars.push(("UNITS_BASE_URL", "localhost:9000"));
        let err = AppConfig::from_vars(vars).expect_err("scheme required");
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }
}
