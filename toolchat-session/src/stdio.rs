//! Local tool providers spoken to over newline-delimited JSON-RPC on stdio.

use std::fmt;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use toolchat_config::CommandSpec;
use toolchat_primitives::BackendLabel;
use tracing::{debug, trace, warn};

use crate::error::{SessionError, SessionResult};
use crate::protocol::{
    RpcMessage, RpcRequest, ToolInfo, call_params, decode_tool_list, initialize_params,
    render_call_result,
};
use crate::session::ToolSession;

/// How long a closing provider gets to exit on its own before it is killed.
pub const CLOSE_GRACE: Duration = Duration::from_millis(500);

const STDERR_DRAIN: Duration = Duration::from_millis(250);
const STDERR_LIMIT: usize = 8 * 1024;

/// Why one launch candidate could not be brought up.
#[derive(Clone, Debug)]
pub struct LaunchFailure {
    /// Command that was tried.
    pub command: CommandSpec,
    /// Spawn or handshake error.
    pub reason: String,
    /// Captured stderr of the child, possibly truncated at the front.
    pub stderr: String,
}

impl fmt::Display for LaunchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`: {}", self.command, self.reason)?;
        if let Some(last) = self.stderr.lines().rev().find(|line| !line.trim().is_empty()) {
            write!(f, " (stderr: {})", last.trim())?;
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
struct StderrTail(Arc<Mutex<String>>);

impl StderrTail {
    fn push(&self, line: &str) {
        let mut buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        buf.push_str(line);
        buf.push('\n');
        if buf.len() > STDERR_LIMIT {
            let mut cut = buf.len() - STDERR_LIMIT;
            while !buf.is_char_boundary(cut) {
                cut += 1;
            }
            buf.drain(..cut);
        }
    }

    fn snapshot(&self) -> String {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn drain(self, stderr: ChildStderr, label: BackendLabel) {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            trace!(backend = %label, "{line}");
            self.push(&line);
        }
    }
}

/// Session with a spawned provider process.
pub struct StdioSession {
    label: BackendLabel,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    stderr: StderrTail,
    stderr_task: Option<JoinHandle<()>>,
    next_id: u64,
    tools: Vec<ToolInfo>,
}

impl fmt::Debug for StdioSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdioSession")
            .field("label", &self.label)
            .field("pid", &self.child.id())
            .field("tools", &self.tools.len())
            .finish_non_exhaustive()
    }
}

impl StdioSession {
    /// Spawns `command` and completes the MCP handshake.
    ///
    /// The child is killed when the session is dropped, so an abandoned
    /// session never outlives its owner.
    ///
    /// # Errors
    ///
    /// Returns a [`LaunchFailure`] if the process cannot be spawned or the
    /// handshake does not complete. The child is torn down before returning.
    pub async fn launch(label: BackendLabel, command: &CommandSpec) -> Result<Self, LaunchFailure> {
        let failure = |reason: String, stderr: String| LaunchFailure {
            command: command.clone(),
            reason,
            stderr,
        };

        let mut child = Command::new(command.program())
            .args(command.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| failure(format!("failed to start: {err}"), String::new()))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(failure("standard streams were not captured".into(), String::new()));
        };

        let stderr = StderrTail::default();
        let stderr_task = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(stderr.clone().drain(pipe, label.clone())));

        debug!(backend = %label, command = %command, pid = ?child.id(), "provider spawned");

        let mut session = Self {
            label,
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            stderr,
            stderr_task,
            next_id: 1,
            tools: Vec::new(),
        };

        match session.handshake().await {
            Ok(()) => Ok(session),
            Err(err) => {
                let stderr = session.shutdown().await;
                Err(failure(err.to_string(), stderr))
            }
        }
    }

    /// OS process id of the provider, while it is running.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn handshake(&mut self) -> SessionResult<()> {
        self.request("initialize", initialize_params()).await?;
        self.send(&RpcRequest::notification("notifications/initialized"))
            .await?;
        let listed = self
            .request("tools/list", Value::Object(Map::new()))
            .await?;
        self.tools = decode_tool_list(self.label.as_str(), listed)?;
        debug!(
            backend = %self.label,
            tools = self.tools.len(),
            "handshake complete"
        );
        Ok(())
    }

    async fn send(&mut self, message: &RpcRequest<'_>) -> SessionResult<()> {
        let label = self.label.as_str();
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| SessionError::transport(label, "stdin already closed"))?;
        let mut line = serde_json::to_string(message)
            .map_err(|err| SessionError::protocol(label, format!("failed to encode request: {err}")))?;
        line.push('\n');
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|err| SessionError::transport(label, format!("write failed: {err}")))?;
        stdin
            .flush()
            .await
            .map_err(|err| SessionError::transport(label, format!("flush failed: {err}")))
    }

    async fn request(&mut self, method: &str, params: Value) -> SessionResult<Value> {
        let id = self.next_id;
        self.next_id += 1;
        self.send(&RpcRequest::call(id, method, params)).await?;

        let label = self.label.as_str();
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .stdout
                .read_line(&mut line)
                .await
                .map_err(|err| SessionError::transport(label, format!("read failed: {err}")))?;
            if read == 0 {
                return Err(SessionError::transport(
                    label,
                    format!("provider closed its output while awaiting `{method}`"),
                ));
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let message: RpcMessage = match serde_json::from_str(trimmed) {
                Ok(message) => message,
                Err(err) => {
                    debug!(backend = %label, error = %err, "ignoring non JSON-RPC output line");
                    continue;
                }
            };
            if !message.answers(id) {
                trace!(backend = %label, method = ?message.method, "skipping unrelated message");
                continue;
            }

            if let Some(error) = message.error {
                return Err(SessionError::protocol(
                    label,
                    format!("`{method}` failed ({}): {}", error.code, error.message),
                ));
            }
            return message.result.ok_or_else(|| {
                SessionError::protocol(label, format!("`{method}` response carried no result"))
            });
        }
    }

    /// Closes stdin, waits [`CLOSE_GRACE`], then kills the child. Returns the
    /// captured stderr.
    async fn shutdown(&mut self) -> String {
        drop(self.stdin.take());

        match timeout(CLOSE_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!(backend = %self.label, %status, "provider exited"),
            Ok(Err(err)) => warn!(backend = %self.label, error = %err, "failed to reap provider"),
            Err(_) => {
                if let Err(err) = self.child.kill().await {
                    warn!(backend = %self.label, error = %err, "failed to kill provider");
                } else {
                    debug!(backend = %self.label, "provider killed after grace period");
                }
            }
        }

        if let Some(mut task) = self.stderr_task.take() {
            if timeout(STDERR_DRAIN, &mut task).await.is_err() {
                task.abort();
            }
        }
        self.stderr.snapshot()
    }
}

#[async_trait]
impl ToolSession for StdioSession {
    fn label(&self) -> &BackendLabel {
        &self.label
    }

    fn tools(&self) -> &[ToolInfo] {
        &self.tools
    }

    async fn call(&mut self, tool: &str, arguments: Map<String, Value>) -> SessionResult<String> {
        let result = self
            .request("tools/call", call_params(tool, arguments))
            .await?;
        render_call_result(self.label.as_str(), tool, &result)
    }

    async fn close(mut self: Box<Self>) {
        self.shutdown().await;
    }
}
