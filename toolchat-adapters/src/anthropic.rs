//! Anthropic Messages API adapter.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use hyper::Uri;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http_client::{HyperClient, build_https_client, parse_url, post_json};
use crate::traits::{
    AdapterError, AdapterMetadata, AdapterResult, Completion, ContentBlock, InferenceRequest,
    ModelAdapter, PromptMessage,
};

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Fixed deadline for one LLM round trip.
pub const LLM_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for the Anthropic adapter.
#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
    default_max_tokens: u32,
}

impl AnthropicConfig {
    /// Creates a configuration using the supplied model identifier.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            model: model.into(),
            base_url: "https://api.anthropic.com/".to_owned(),
            timeout: LLM_TIMEOUT,
            default_max_tokens: 256,
        }
    }

    /// Overrides the base URL used for API calls.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the supplied URL is invalid.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> AdapterResult<Self> {
        let mut base = base_url.as_ref().trim().to_owned();
        if !base.ends_with('/') {
            base.push('/');
        }
        parse_url(&base)?;
        self.base_url = base;
        Ok(self)
    }

    /// Sets the default max tokens for completions.
    #[must_use]
    pub fn with_default_max_tokens(mut self, max_tokens: u32) -> Self {
        self.default_max_tokens = max_tokens;
        self
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Supplies an explicit API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// Anthropic Claude adapter that calls the Messages API over HTTPS.
pub struct AnthropicAdapter {
    client: HyperClient,
    endpoint: Uri,
    metadata: AdapterMetadata,
    api_key: String,
    timeout: Duration,
    default_max_tokens: u32,
}

impl fmt::Debug for AnthropicAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicAdapter")
            .field("model", &self.metadata.model())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl AnthropicAdapter {
    /// Constructs a new adapter with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the API key is missing or the
    /// endpoint cannot be built.
    pub fn new(config: AnthropicConfig) -> AdapterResult<Self> {
        let api_key = config
            .api_key
            .ok_or_else(|| AdapterError::configuration("Anthropic adapter requires an API key"))?;

        let metadata = AdapterMetadata::new("anthropic", config.model);
        let endpoint = parse_url(&format!("{}v1/messages", config.base_url))?;
        let client = build_https_client()?;

        Ok(Self {
            client,
            endpoint,
            metadata,
            api_key,
            timeout: config.timeout,
            default_max_tokens: config.default_max_tokens,
        })
    }

    fn build_request(&self, request: &InferenceRequest) -> MessagesRequest {
        MessagesRequest {
            model: self.metadata.model().to_owned(),
            system: request.system_prompt().map(ToOwned::to_owned),
            messages: request.messages().iter().map(map_prompt_message).collect(),
            max_tokens: request
                .max_output_tokens()
                .unwrap_or(self.default_max_tokens),
        }
    }
}

#[async_trait]
impl ModelAdapter for AnthropicAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn complete(&self, request: InferenceRequest) -> AdapterResult<Completion> {
        let payload = self.build_request(&request);
        let body = serde_json::to_vec(&payload).map_err(|err| {
            AdapterError::invalid_request(format!("failed to encode Anthropic request: {err}"))
        })?;

        debug!(
            model = %payload.model,
            turns = payload.messages.len(),
            "sending Anthropic request"
        );

        let reply = post_json(
            &self.client,
            &self.endpoint,
            &[
                ("x-api-key", self.api_key.as_str()),
                ("anthropic-version", ANTHROPIC_VERSION),
            ],
            body,
            self.timeout,
        )
        .await?;

        if !reply.is_success() {
            return Err(AdapterError::Status {
                status: reply.status,
                body: reply.text(),
            });
        }

        let response: MessagesResponse =
            serde_json::from_slice(&reply.body).map_err(|err| AdapterError::Response {
                reason: format!("failed to decode Anthropic response: {err}"),
            })?;

        Ok(Completion::new(response.content.unwrap_or_default()))
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Option<Vec<ContentBlock>>,
}

fn map_prompt_message(message: &PromptMessage) -> AnthropicMessage {
    AnthropicMessage {
        role: message.role().to_string(),
        content: message.content().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve_once;
    use crate::traits::MessageRole;

    fn adapter_for(base: &str) -> AnthropicAdapter {
        let config = AnthropicConfig::new("claude-3-haiku-20240307")
            .with_api_key("test_key")
            .with_base_url(base)
            .expect("valid URL");
        AnthropicAdapter::new(config).expect("adapter")
    }

    #[test]
    fn base_url_requires_scheme() {
        let err = AnthropicConfig::new("claude-3-haiku-20240307")
            .with_base_url("api.anthropic.com")
            .expect_err("missing scheme should error");

        assert!(matches!(err, AdapterError::Configuration { .. }));
    }

    #[test]
    fn sanitize_allows_trailing_slash() {
        let cfg = AnthropicConfig::new("claude-3-haiku-20240307")
            .with_base_url("https://example.com/anthropic")
            .expect("valid URL");
        assert_eq!(cfg.base_url, "https://example.com/anthropic/");
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let err = AnthropicAdapter::new(AnthropicConfig::new("m")).expect_err("no key");
        assert!(matches!(err, AdapterError::Configuration { .. }));
    }

    #[test]
    fn build_request_carries_system_and_token_cap() {
        let adapter = adapter_for("https://api.anthropic.com");
        let request = InferenceRequest::new(vec![
            PromptMessage::new(MessageRole::User, "hello"),
            PromptMessage::new(MessageRole::Assistant, "hi"),
            PromptMessage::new(MessageRole::User, "again"),
        ])
        .unwrap()
        .with_system_prompt("You are helpful");

        let payload = adapter.build_request(&request);
        assert_eq!(payload.system.as_deref(), Some("You are helpful"));
        assert_eq!(payload.max_tokens, 256);
        let roles: Vec<_> = payload.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["user", "assistant", "user"]);
    }

    #[tokio::test]
    async fn complete_sends_headers_and_decodes_text() {
        let (base, request) = serve_once(
            200,
            r#"{"id":"msg_1","content":[{"type":"text","text":"Hola"}],"stop_reason":"end_turn"}"#,
        )
        .await;
        let adapter = adapter_for(&base);

        let completion = adapter
            .complete(
                InferenceRequest::new(vec![PromptMessage::new(MessageRole::User, "hi")]).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(completion.text(), "Hola");

        let raw = request.await.unwrap();
        let lower = raw.to_ascii_lowercase();
        assert!(lower.starts_with("post /v1/messages"));
        assert!(lower.contains("x-api-key: test_key"));
        assert!(lower.contains("anthropic-version: 2023-06-01"));
        assert!(raw.contains(r#""max_tokens":256"#));
    }

    #[tokio::test]
    async fn complete_reports_status_with_body() {
        let (base, _request) =
            serve_once(401, r#"{"type":"error","error":{"type":"authentication_error"}}"#).await;
        let adapter = adapter_for(&base);

        let err = adapter
            .complete(
                InferenceRequest::new(vec![PromptMessage::new(MessageRole::User, "hi")]).unwrap(),
            )
            .await
            .expect_err("401 should fail");
        assert!(
            matches!(err, AdapterError::Status { status: 401, ref body } if body.contains("authentication_error"))
        );
    }

    #[tokio::test]
    async fn complete_treats_missing_content_as_empty() {
        let (base, _request) = serve_once(200, r#"{"id":"msg_2"}"#).await;
        let adapter = adapter_for(&base);

        let completion = adapter
            .complete(
                InferenceRequest::new(vec![PromptMessage::new(MessageRole::User, "hi")]).unwrap(),
            )
            .await
            .unwrap();
        assert!(completion.is_empty());
    }
}
