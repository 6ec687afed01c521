//! Stateless HTTP tool backends.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use toolchat_adapters::http_client::{HyperClient, build_https_client, parse_url, post_json};
use toolchat_primitives::BackendLabel;
use tracing::debug;

use crate::error::{SessionError, SessionResult};
use crate::protocol::ToolInfo;
use crate::session::ToolSession;

/// Deadline for one remote tool call.
pub const REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Session over `POST {base}/tools/{tool}/call`.
pub struct RemoteSession {
    label: BackendLabel,
    base_url: String,
    client: HyperClient,
    timeout: Duration,
}

impl fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSession")
            .field("label", &self.label)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RemoteSession {
    /// Prepares a session; no network traffic happens until [`ToolSession::call`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if `base_url` is not an
    /// absolute http(s) URL.
    pub fn open(label: BackendLabel, base_url: &str) -> SessionResult<Self> {
        parse_url(base_url).map_err(|err| SessionError::from_adapter(label.as_str(), err))?;
        let client =
            build_https_client().map_err(|err| SessionError::from_adapter(label.as_str(), err))?;
        Ok(Self {
            label,
            base_url: base_url.trim_end_matches('/').to_owned(),
            client,
            timeout: REMOTE_TIMEOUT,
        })
    }

    /// Overrides the per-call deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ToolSession for RemoteSession {
    fn label(&self) -> &BackendLabel {
        &self.label
    }

    fn tools(&self) -> &[ToolInfo] {
        &[]
    }

    async fn call(&mut self, tool: &str, arguments: Map<String, Value>) -> SessionResult<String> {
        let label = self.label.as_str();
        let uri = parse_url(&format!("{}/tools/{tool}/call", self.base_url))
            .map_err(|err| SessionError::from_adapter(label, err))?;
        let body = serde_json::to_vec(&json!({ "arguments": arguments }))
            .map_err(|err| SessionError::protocol(label, format!("failed to encode arguments: {err}")))?;

        debug!(backend = %label, %uri, "remote tool call");
        let reply = post_json(&self.client, &uri, &[], body, self.timeout)
            .await
            .map_err(|err| SessionError::from_adapter(label, err))?;

        if reply.status != 200 {
            return Err(SessionError::Status {
                label: label.to_owned(),
                status: reply.status,
                body: reply.text(),
            });
        }

        let payload: Value = serde_json::from_slice(&reply.body)
            .map_err(|err| SessionError::protocol(label, format!("response is not JSON: {err}")))?;
        Ok(payload
            .pointer("/content/0/text")
            .and_then(Value::as_str)
            .map_or_else(|| payload.to_string(), ToOwned::to_owned))
    }

    async fn close(self: Box<Self>) {
        debug!(backend = %self.label, "remote session released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::SessionManager;
    use toolchat_adapters::testing::serve_once;
    use toolchat_audit::AuditLog;
    use toolchat_primitives::ErrorCategory;
    use toolchat_tools::{BackendDescriptor, BackendRegistry};

    fn label() -> BackendLabel {
        BackendLabel::new("units").unwrap()
    }

    #[tokio::test]
    async fn posts_arguments_and_reads_first_text_block() {
        let (base, request) = serve_once(
            200,
            r#"{"content":[{"type":"text","text":"25.00 C = 77.00 F"}]}"#,
        )
        .await;
        let mut session = RemoteSession::open(label(), &format!("{base}/")).unwrap();

        let mut args = Map::new();
        args.insert("value".into(), json!(25.0));
        args.insert("unit".into(), json!("C"));
        let text = session.call("convert_temperature", args).await.unwrap();
        assert_eq!(text, "25.00 C = 77.00 F");

        let raw = request.await.unwrap();
        assert!(raw.starts_with("POST /tools/convert_temperature/call HTTP/1.1"));
        assert!(raw.contains(r#"{"arguments":{"#));
        assert!(raw.contains(r#""unit":"C""#));
    }

    #[tokio::test]
    async fn body_without_text_is_rendered_as_json() {
        let (base, _request) = serve_once(200, r#"{"result":77.0}"#).await;
        let mut session = RemoteSession::open(label(), &base).unwrap();
        let text = session.call("convert_temperature", Map::new()).await.unwrap();
        assert_eq!(text, r#"{"result":77.0}"#);
    }

    #[tokio::test]
    async fn non_200_keeps_raw_body() {
        let (base, _request) = serve_once(404, "no such tool").await;
        let mut registry = BackendRegistry::new();
        registry
            .register(BackendDescriptor::remote("units", &base).unwrap())
            .unwrap();
        let audit = AuditLog::new();
        let manager = SessionManager::new(registry, audit.clone());

        let outcome = manager.call_once("units", "missing", Map::new()).await;
        assert_eq!(outcome.text(), "Error: 404, no such tool");
        assert_eq!(outcome.category(), Some(ErrorCategory::Protocol));
        assert_eq!(audit.dump()[0].response(), "Error: 404, no such tool");
    }

    #[test]
    fn rejects_relative_base() {
        let err = RemoteSession::open(label(), "localhost:8080").expect_err("no scheme");
        assert!(matches!(err, SessionError::Configuration { .. }));
    }
}
