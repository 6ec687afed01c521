//! Per-line driver tying commands, planning and dispatch together.

use std::fmt;
use std::sync::Arc;

use toolchat_adapters::conversation::ConversationClient;
use toolchat_adapters::traits::ModelAdapter;
use toolchat_audit::AuditLog;
use toolchat_config::AppConfig;
use toolchat_session::SessionManager;
use toolchat_tools::{BackendRegistry, RegistryResult};

use crate::command::{Command, HELP};
use crate::dispatch::Dispatcher;
use crate::planner::PlanExtractor;

/// What the front end should do after a line has been handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Print the text and read the next line.
    Reply(String),
    /// Nothing to print.
    Silent,
    /// Stop reading input.
    Exit,
}

/// Owns the process-wide state: history, audit log and backends.
pub struct Orchestrator {
    client: ConversationClient,
    dispatcher: Dispatcher,
    planner: PlanExtractor,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("client", &self.client)
            .field("backends", &self.dispatcher.sessions().registry())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Builds the registry, session manager and conversation client from
    /// `config`, all sharing one audit log.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`](toolchat_tools::RegistryError) when the
    /// configured backends cannot form a registry (for example an external
    /// label that shadows a built-in one).
    pub fn from_config(config: &AppConfig, adapter: Arc<dyn ModelAdapter>) -> RegistryResult<Self> {
        let audit = AuditLog::new();
        let registry = BackendRegistry::from_config(config)?;

        let client =
            ConversationClient::new(adapter, audit.clone()).with_max_tokens(config.max_tokens());
        let sessions = SessionManager::new(registry, audit);
        Ok(Self::from_parts(
            client,
            Dispatcher::new(sessions, config.workspace_root()),
        ))
    }

    /// Assembles an orchestrator from prepared parts.
    ///
    /// The client and the dispatcher's session manager are expected to share
    /// one audit log.
    #[must_use]
    pub fn from_parts(client: ConversationClient, dispatcher: Dispatcher) -> Self {
        Self {
            client,
            dispatcher,
            planner: PlanExtractor::new(),
        }
    }

    /// Conversation client and its history.
    #[must_use]
    pub fn client(&self) -> &ConversationClient {
        &self.client
    }

    /// Dispatcher used for every plan.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Shared audit log.
    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        self.dispatcher.sessions().audit()
    }

    /// Handles one line of user input to completion.
    pub async fn handle_line(&mut self, line: &str) -> Step {
        match Command::parse(line) {
            Command::Empty => Step::Silent,
            Command::Exit => Step::Exit,
            Command::Help => Step::Reply(HELP.to_owned()),
            Command::Log => Step::Reply(self.audit().render()),
            Command::Invalid(message) => Step::Reply(format!("Error: {message}")),
            Command::BootstrapRepo(name) => {
                Step::Reply(self.dispatcher.bootstrap_repo(&name).await.into_text())
            }
            Command::Plan(plan) => Step::Reply(
                self.dispatcher
                    .dispatch(&mut self.client, &plan)
                    .await
                    .into_text(),
            ),
            Command::Natural(text) => {
                let plan = self.planner.extract(&mut self.client, &text).await;
                Step::Reply(
                    self.dispatcher
                        .dispatch(&mut self.client, &plan)
                        .await
                        .into_text(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use toolchat_adapters::testing::ScriptedAdapter;

    use super::*;

    fn orchestrator() -> (Orchestrator, Arc<ScriptedAdapter>) {
        let adapter = Arc::new(ScriptedAdapter::new());
        let config = AppConfig::from_vars([("TOOLCHAT_WORKSPACE", "/tmp")]).unwrap();
        let orchestrator = Orchestrator::from_config(&config, adapter.clone()).unwrap();
        (orchestrator, adapter)
    }

    #[tokio::test]
    async fn control_lines_do_not_touch_backends() {
        let (mut orchestrator, adapter) = orchestrator();
        assert_eq!(orchestrator.handle_line("").await, Step::Silent);
        assert_eq!(orchestrator.handle_line("EXIT").await, Step::Exit);
        assert_eq!(
            orchestrator.handle_line("help").await,
            Step::Reply(HELP.to_owned())
        );
        let Step::Reply(log) = orchestrator.handle_line("log").await else {
            panic!("log prints");
        };
        assert!(log.contains("(no interactions yet)"));
        assert!(adapter.requests().is_empty());
    }

    #[tokio::test]
    async fn free_text_is_planned_then_dispatched() {
        let (mut orchestrator, adapter) = orchestrator();
        adapter.push_text(r#"{"tool": "chat", "args": {"prompt": "hola"}}"#);
        adapter.push_text("Hola, que tal?");

        let step = orchestrator.handle_line("hola").await;
        assert_eq!(step, Step::Reply("Hola, que tal?".into()));
        assert_eq!(adapter.requests().len(), 2);
        assert_eq!(orchestrator.client().history().len(), 4);
        assert_eq!(orchestrator.audit().len(), 2);
    }

    #[tokio::test]
    async fn explicit_commands_skip_the_planner() {
        let (mut orchestrator, adapter) = orchestrator();
        let Step::Reply(text) = orchestrator.handle_line("qr-wifi").await else {
            panic!("reply expected");
        };
        assert!(text.contains("ssid"));
        assert!(adapter.requests().is_empty());

        let Step::Reply(text) = orchestrator.handle_line("run [1, 2]").await else {
            panic!("reply expected");
        };
        assert!(text.starts_with("Error: run expects a JSON plan"));
    }
}
