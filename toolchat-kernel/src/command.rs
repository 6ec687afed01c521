//! Line-oriented command surface.

use serde_json::{Map, Value};

use crate::plan::{ActionPlan, ToolKind};

/// Text printed by `help`.
pub const HELP: &str = "\
Commands:
  help                                 show this message
  log                                  print every recorded interaction
  exit | quit | salir                  leave
  bootstrap-repo <name>                create a repository with a README and first commit
  qr-url <url>                         QR code for a URL
  qr-text <text>                       QR code for text
  qr-wifi <ssid> [password] [auth]     QR code with Wi-Fi credentials
  qr-vcard <name> | <tel> [| <email>]  QR code with a contact card
  qr-decode <image-path>               read a QR image
  convert <value> <C|F>                temperature conversion
  call <server> [tool] [json-args]     call (or list) tools on a configured server
  ask <text>                           talk to the model directly
  run <json-plan>                      run {\"tool\": ..., \"args\": {...}} as is
Anything else is interpreted by the model.";

/// One parsed input line.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Blank line.
    Empty,
    /// Show usage.
    Help,
    /// Leave the loop.
    Exit,
    /// Print the audit log.
    Log,
    /// Create a repository in the workspace.
    BootstrapRepo(String),
    /// Run a plan without consulting the planner.
    Plan(ActionPlan),
    /// Free text for the planner.
    Natural(String),
    /// The line was recognised but cannot be used.
    Invalid(String),
}

impl Command {
    /// Parses one line of input.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }

        let (keyword, rest) = match line.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (line, ""),
        };

        match keyword.to_ascii_lowercase().as_str() {
            "help" if rest.is_empty() => Self::Help,
            "exit" | "quit" | "salir" if rest.is_empty() => Self::Exit,
            "log" if rest.is_empty() => Self::Log,
            "bootstrap-repo" => Self::BootstrapRepo(rest.to_owned()),
            "qr-url" => Self::plan(ToolKind::QrUrl, [("url", rest)]),
            "qr-text" => Self::plan(ToolKind::QrText, [("text", rest)]),
            "qr-wifi" => {
                let mut parts = rest.split_whitespace();
                Self::plan(
                    ToolKind::QrWifi,
                    [
                        ("ssid", parts.next().unwrap_or_default()),
                        ("password", parts.next().unwrap_or_default()),
                        ("auth", parts.next().unwrap_or_default()),
                    ],
                )
            }
            "qr-vcard" => {
                let mut parts = rest.split('|').map(str::trim);
                Self::plan(
                    ToolKind::QrVcard,
                    [
                        ("name", parts.next().unwrap_or_default()),
                        ("tel", parts.next().unwrap_or_default()),
                        ("email", parts.next().unwrap_or_default()),
                    ],
                )
            }
            "qr-decode" => Self::plan(ToolKind::QrDecode, [("image_path", rest)]),
            "convert" => {
                let mut parts = rest.split_whitespace();
                Self::plan(
                    ToolKind::UnitConversion,
                    [
                        ("value", parts.next().unwrap_or_default()),
                        ("unit", parts.next().unwrap_or_default()),
                    ],
                )
            }
            "call" => Self::external_call(rest),
            "ask" => Self::Plan(ActionPlan::chat(rest)),
            "run" => match serde_json::from_str::<ActionPlan>(rest) {
                Ok(plan) => Self::Plan(plan),
                Err(err) => Self::Invalid(format!("run expects a JSON plan: {err}")),
            },
            _ => Self::Natural(line.to_owned()),
        }
    }

    /// Builds a plan, leaving empty fields out so validation can name them.
    fn plan<const N: usize>(tool: ToolKind, fields: [(&str, &str); N]) -> Self {
        let args = fields
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, value)| (name.to_owned(), Value::String(value.to_owned())))
            .collect();
        Self::Plan(ActionPlan::new(tool, args))
    }

    fn external_call(rest: &str) -> Self {
        let mut args = Map::new();
        let mut remaining = rest;
        for field in ["server", "tool"] {
            if remaining.is_empty() || remaining.starts_with('{') {
                break;
            }
            let (word, tail) = remaining
                .split_once(char::is_whitespace)
                .unwrap_or((remaining, ""));
            args.insert(field.into(), Value::String(word.to_owned()));
            remaining = tail.trim();
        }

        if !remaining.is_empty() {
            match serde_json::from_str::<Value>(remaining) {
                Ok(Value::Object(arguments)) => {
                    args.insert("arguments".into(), Value::Object(arguments));
                }
                _ => return Self::Invalid(format!("call arguments must be a JSON object, got `{remaining}`")),
            }
        }
        Self::Plan(ActionPlan::new(ToolKind::ExternalCall, args))
    }
}
