//! Launch command descriptions for local tool providers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{ConfigError, ConfigResult};

/// Program plus argument list used to spawn a local provider process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    program: String,
    #[serde(default)]
    args: Vec<String>,
}

impl CommandSpec {
    /// Creates a command from a program and its arguments.
    #[must_use]
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses an argument string as configured in the environment.
    ///
    /// A value starting with `[` is decoded as a JSON array of strings, which
    /// allows arguments containing spaces; anything else is split on
    /// whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a JSON array fails to decode.
    pub fn parse_args(name: &str, raw: &str) -> ConfigResult<Vec<String>> {
        let trimmed = raw.trim();
        if trimmed.starts_with('[') {
            return serde_json::from_str::<Vec<String>>(trimmed).map_err(|err| {
                ConfigError::invalid(name, format!("expected a JSON array of strings: {err}"))
            });
        }
        Ok(trimmed.split_whitespace().map(ToOwned::to_owned).collect())
    }

    /// Returns the program to execute.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the argument list.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plain_arguments() {
        let args = CommandSpec::parse_args("X", "  -y  server-filesystem /tmp ").unwrap();
        assert_eq!(args, ["-y", "server-filesystem", "/tmp"]);
    }

    #[test]
    fn decodes_json_arguments() {
        let args = CommandSpec::parse_args("X", r#"["--repository", "/home/me/my repo"]"#).unwrap();
        assert_eq!(args, ["--repository", "/home/me/my repo"]);

        let err = CommandSpec::parse_args("X", "[1, 2").expect_err("bad json");
        assert!(matches!(err, ConfigError::Invalid { name, .. } if name == "X"));
    }

    #[test]
    fn display_joins_program_and_args() {
        let cmd = CommandSpec::new("uvx", ["mcp-server-git"]);
        assert_eq!(cmd.to_string(), "uvx mcp-server-git");
    }
}
