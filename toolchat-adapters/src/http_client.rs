//! Outbound HTTP plumbing shared by the LLM adapter and remote tool sessions.

use std::sync::Arc;
use std::time::Duration;

use hyper::body::to_bytes;
use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Client, Request, Uri};
use hyper_rustls::HttpsConnector;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore};
use tokio::time::timeout;
use webpki_roots::TLS_SERVER_ROOTS;

use crate::traits::{AdapterError, AdapterResult};

/// Client type used for every outbound exchange.
///
/// Plain `http://` URLs are accepted too; local services depend on that.
pub type HyperClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Status and raw body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpReply {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded lossily as UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Builds a client trusting the bundled web PKI roots.
///
/// # Errors
///
/// Currently infallible; the result type leaves room for custom root stores.
#[allow(clippy::unnecessary_wraps)]
pub fn build_https_client() -> AdapterResult<HyperClient> {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|anchor| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            anchor.subject,
            anchor.spki,
            anchor.name_constraints,
        )
    }));

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let mut http = HttpConnector::new();
    http.enforce_http(false);

    let connector = HttpsConnector::from((http, Arc::new(config)));
    Ok(Client::builder().build::<_, Body>(connector))
}

/// Parses an absolute URL into a [`Uri`].
///
/// # Errors
///
/// Returns [`AdapterError::Configuration`] when the URL does not parse or has
/// no `http`/`https` scheme.
pub fn parse_url(url: &str) -> AdapterResult<Uri> {
    let trimmed = url.trim();
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(AdapterError::configuration(format!(
            "URL `{trimmed}` must start with http:// or https://"
        )));
    }
    trimmed
        .parse::<Uri>()
        .map_err(|err| AdapterError::configuration(format!("invalid URL `{trimmed}`: {err}")))
}

/// Sends a JSON `POST` and collects the full response within `deadline`.
///
/// Any status is returned as an [`HttpReply`]; only failures to connect,
/// send or read the body become errors.
///
/// # Errors
///
/// Returns [`AdapterError::Transport`] on connection failure, timeout, or
/// body read failure.
pub async fn post_json(
    client: &HyperClient,
    uri: &Uri,
    headers: &[(&'static str, &str)],
    body: Vec<u8>,
    deadline: Duration,
) -> AdapterResult<HttpReply> {
    let mut builder = Request::post(uri.clone()).header(CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder
        .body(Body::from(body))
        .map_err(|err| AdapterError::transport(format!("failed to build request: {err}")))?;

    let exchange = async {
        let response = client
            .request(request)
            .await
            .map_err(|err| AdapterError::transport(format!("request to {uri} failed: {err}")))?;
        let status = response.status().as_u16();
        let bytes = to_bytes(response.into_body()).await.map_err(|err| {
            AdapterError::transport(format!("failed to read response from {uri}: {err}"))
        })?;
        Ok::<_, AdapterError>(HttpReply {
            status,
            body: bytes.to_vec(),
        })
    };

    timeout(deadline, exchange).await.map_err(|_| {
        AdapterError::transport(format!(
            "request to {uri} timed out after {}s",
            deadline.as_secs()
        ))
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve_once;

    #[test]
    fn parse_url_requires_scheme() {
        let err = parse_url("example.com/tools").expect_err("scheme required");
        assert!(matches!(err, AdapterError::Configuration { .. }));
        assert!(parse_url(" http://127.0.0.1:9000/x ").is_ok());
    }

    #[tokio::test]
    async fn post_json_returns_non_success_status() {
        let (base, request) = serve_once(503, "busy").await;
        let client = build_https_client().unwrap();
        let uri = parse_url(&format!("{base}/ping")).unwrap();

        let reply = post_json(
            &client,
            &uri,
            &[("x-probe", "1")],
            b"{}".to_vec(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(reply.status, 503);
        assert!(!reply.is_success());
        assert_eq!(reply.text(), "busy");

        let raw = request.await.unwrap().to_ascii_lowercase();
        assert!(raw.starts_with("post /ping http/1.1"));
        assert!(raw.contains("x-probe: 1"));
        assert!(raw.ends_with("{}"));
    }

    #[tokio::test]
    async fn post_json_reports_unreachable_host() {
        let client = build_https_client().unwrap();
        // Port 9 (discard) is closed on loopback in test environments.
        let uri = parse_url("http://127.0.0.1:9/").unwrap();
        let err = post_json(&client, &uri, &[], Vec::new(), Duration::from_secs(5))
            .await
            .expect_err("connection refused");
        assert!(matches!(err, AdapterError::Transport { .. }));
    }
}
