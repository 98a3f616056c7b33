use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;

use crate::endpoints::Endpoints;
use crate::error::{OutreachError, Result};
use crate::query::Query;
use crate::tls::TrustPolicy;

/// Header used to tunnel PATCH through POST
pub const METHOD_OVERRIDE_HEADER: &str = "X-HTTP-Method-Override";

/// Request verb for a resource call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Patch,
    Delete,
}

impl Verb {
    /// Wire method and optional override header value
    fn wire(self, method_override: bool) -> (Method, Option<&'static str>) {
        match self {
            Verb::Get => (Method::GET, None),
            Verb::Post => (Method::POST, None),
            Verb::Delete => (Method::DELETE, None),
            Verb::Patch if method_override => (Method::POST, Some("PATCH")),
            Verb::Patch => (Method::PATCH, None),
        }
    }
}

/// Connection settings for the authorized transport
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub max_connections: usize,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,

    /// Send PATCH as POST with `X-HTTP-Method-Override`
    pub method_override: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            max_connections: 20,
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            method_override: true,
        }
    }
}

/// HTTP client for resource calls carrying a bearer token
///
/// The same underlying client, and so the same trust policy, is used for
/// token exchange.
pub struct AuthorizedTransport {
    /// Shared HTTP client with connection pooling
    client: Client,

    endpoints: Endpoints,

    method_override: bool,
}

impl AuthorizedTransport {
    /// Create a new transport, pinned to `trust` when given
    pub fn new(
        endpoints: Endpoints,
        settings: &TransportSettings,
        trust: Option<&TrustPolicy>,
    ) -> Result<Self> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(settings.max_connections)
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .user_agent(concat!("outreach-client/", env!("CARGO_PKG_VERSION")));

        if let Some(policy) = trust {
            tracing::info!(
                anchors = policy.len(),
                hostname_policy = ?policy.hostname_policy(),
                "Using pinned trust anchors instead of default roots"
            );
            builder = builder.use_preconfigured_tls(policy.client_config()?);
        }

        let client = builder
            .build()
            .map_err(|e| OutreachError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoints,
            method_override: settings.method_override,
        })
    }

    /// Execute a single authorized call and parse the JSON response
    ///
    /// The caller is expected to have obtained `token` from the token
    /// manager. No retries are attempted.
    pub async fn call(
        &self,
        verb: Verb,
        path: &str,
        query: &Query,
        body: Option<&Value>,
        token: &str,
    ) -> Result<Value> {
        let url = self.endpoints.resource_url(path, query)?;
        let (method, override_value) = verb.wire(self.method_override);

        tracing::debug!(
            method = %method,
            verb = ?verb,
            url = %url,
            "Sending HTTP request"
        );

        let mut request = self
            .client
            .request(method, url.clone())
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/json");

        if let Some(value) = override_value {
            request = request.header(METHOD_OVERRIDE_HEADER, value);
        }

        if let Some(body) = body {
            request = request.body(body.to_string());
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, url = %url, "HTTP request error");
            OutreachError::from(e)
        })?;

        let status = response.status();
        let text = response.text().await?;

        tracing::debug!(status = %status, "Received HTTP response");

        if !status.is_success() {
            tracing::error!(
                status = status.as_u16(),
                url = %url,
                response_body = %text,
                "HTTP request failed with error response"
            );
            return Err(OutreachError::status_error(status.as_u16(), text));
        }

        parse_body(&text)
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }
}

/// Empty bodies (e.g. 204) map to `Value::Null`
fn parse_body(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(text)
        .map_err(|e| OutreachError::Protocol(format!("Failed to parse response body: {}", e)))
}
