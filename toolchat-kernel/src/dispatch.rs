//! Routes validated actions to backends or to the LLM.

use std::path::{Component, Path, PathBuf};

use serde_json::{Map, Value, json};
use toolchat_adapters::conversation::ConversationClient;
use toolchat_audit::LogEntry;
use toolchat_session::{SessionManager, ToolOutcome};
use toolchat_tools::{FILESYSTEM_LABEL, GIT_LABEL, QR_LABEL, UNITS_LABEL};
use tracing::{info, warn};

use crate::error::DispatchError;
use crate::plan::{Action, ActionPlan, QrStyle};

/// Audit label for failures detected before any backend is contacted.
pub const DISPATCHER_LABEL: &str = "dispatcher";

/// Executes plans against the configured backends.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    sessions: SessionManager,
    workspace_root: PathBuf,
}

impl Dispatcher {
    /// Creates a dispatcher; `bootstrap-repo` creates repositories under
    /// `workspace_root`.
    #[must_use]
    pub fn new(sessions: SessionManager, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            sessions,
            workspace_root: workspace_root.into(),
        }
    }

    /// Session manager used for backend calls.
    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Root directory for new repositories.
    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Validates `plan` and runs it.
    ///
    /// Never fails: argument problems and backend failures come back as a
    /// failed [`ToolOutcome`] after being logged once.
    pub async fn dispatch(&self, client: &mut ConversationClient, plan: &ActionPlan) -> ToolOutcome {
        let action = match Action::try_from(plan) {
            Ok(action) => action,
            Err(err) => return self.reject(&plan.to_string(), &err),
        };
        info!(tool = %plan.tool, "dispatching plan");
        self.run(client, action).await
    }

    async fn run(&self, client: &mut ConversationClient, action: Action) -> ToolOutcome {
        match action {
            Action::QrUrl { url, style } => {
                self.sessions
                    .call_once(QR_LABEL, "generate_qr", qr_arguments(url, &style))
                    .await
            }
            Action::QrText { text, style } => {
                self.sessions
                    .call_once(QR_LABEL, "generate_qr", qr_arguments(text, &style))
                    .await
            }
            Action::QrWifi {
                ssid,
                password,
                auth,
                hidden,
                filename,
            } => {
                let mut args = object(
                    json!({"ssid": ssid, "password": password, "auth": auth, "hidden": hidden}),
                );
                if let Some(filename) = filename {
                    args.insert("filename".into(), Value::String(filename));
                }
                self.sessions
                    .call_once(QR_LABEL, "generate_wifi_qr", args)
                    .await
            }
            Action::QrVcard {
                name,
                tel,
                email,
                filename,
            } => {
                let mut args = object(json!({"name": name, "tel": tel}));
                for (field, value) in [("email", email), ("filename", filename)] {
                    if let Some(value) = value {
                        args.insert(field.into(), Value::String(value));
                    }
                }
                self.sessions
                    .call_once(QR_LABEL, "generate_vcard_qr", args)
                    .await
            }
            Action::QrDecode { image_path } => {
                self.sessions
                    .call_once(QR_LABEL, "read_qr", object(json!({"image_path": image_path})))
                    .await
            }
            Action::ExternalCall {
                server,
                tool: Some(tool),
                arguments,
            } => self.sessions.call_once(&server, &tool, arguments).await,
            Action::ExternalCall {
                server, tool: None, ..
            } => self.sessions.list_tools(&server).await,
            Action::UnitConversion { value, unit } => {
                self.sessions
                    .call_once(
                        UNITS_LABEL,
                        "convert_temperature",
                        object(json!({"value": value, "unit": unit.code()})),
                    )
                    .await
            }
            Action::Chat { prompt } => {
                let reply = client.ask(&prompt).await;
                match reply.category() {
                    Some(category) => ToolOutcome::failure(reply.into_text(), category),
                    None => ToolOutcome::success(reply.into_text()),
                }
            }
        }
    }

    /// Creates `<workspace>/<name>` with a README and an initial commit.
    ///
    /// Steps run in order and stop at the first failure; the report lists
    /// every step, including those skipped.
    pub async fn bootstrap_repo(&self, name: &str) -> ToolOutcome {
        let name = name.trim();
        if let Err(reason) = validate_repo_name(name) {
            let err = DispatchError::InvalidRepositoryName {
                name: name.to_owned(),
                reason,
            };
            return self.reject(&format!("bootstrap-repo {name}"), &err);
        }

        let repo = self.workspace_root.join(name);
        let repo_path = repo.display().to_string();
        let readme = repo.join("README.md").display().to_string();
        let steps: [(&str, &str, Value); 6] = [
            (FILESYSTEM_LABEL, "create_directory", json!({"path": repo_path})),
            (
                FILESYSTEM_LABEL,
                "write_file",
                json!({"path": readme, "content": format!("# {name}\n")}),
            ),
            (GIT_LABEL, "git_init", json!({"repo_path": repo_path})),
            (
                GIT_LABEL,
                "git_add",
                json!({"repo_path": repo_path, "files": ["README.md"]}),
            ),
            (
                GIT_LABEL,
                "git_commit",
                json!({"repo_path": repo_path, "message": "Initial commit"}),
            ),
            (GIT_LABEL, "git_status", json!({"repo_path": repo_path})),
        ];

        let mut report = format!("Bootstrapping repository at {repo_path}");
        let mut failure = None;
        for (label, tool, args) in steps {
            if failure.is_some() {
                report.push_str(&format!("\n[SKIPPED] {label}.{tool}"));
                continue;
            }
            let outcome = self.sessions.call_once(label, tool, object(args)).await;
            let status = if outcome.is_error() { "ERROR" } else { "OK" };
            report.push_str(&format!("\n[{status}] {label}.{tool}: {}", outcome.text()));
            if let Some(category) = outcome.category() {
                warn!(step = tool, "bootstrap stopped");
                failure = Some(category);
            }
        }

        match failure {
            Some(category) => ToolOutcome::failure(report, category),
            None => ToolOutcome::success(report),
        }
    }

    fn reject(&self, request: &str, err: &DispatchError) -> ToolOutcome {
        let text = format!("Error: {err}");
        warn!(error = %err, "plan rejected");
        self.sessions.audit().append(LogEntry::failure(
            DISPATCHER_LABEL,
            request,
            text.as_str(),
            err.category(),
        ));
        ToolOutcome::failure(text, err.category())
    }
}

fn qr_arguments(data: String, style: &QrStyle) -> Map<String, Value> {
    let mut args = style.to_arguments();
    args.insert("data".into(), Value::String(data));
    args
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn validate_repo_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("a name is required".into());
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(format!("`{name}` must be a single directory name")),
    }
}
