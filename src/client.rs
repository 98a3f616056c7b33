// Outreach API client
// Every call obtains a valid token first, then goes through the authorized transport

use chrono::Duration;
use serde_json::Value;
use std::sync::Arc;

use crate::auth::{
    ApplicationCredentials, AuthorizationGrant, Clock, SystemClock, TokenManager,
    DEFAULT_SKEW_SECS,
};
use crate::endpoints::{Endpoints, DEFAULT_API_VERSION, DEFAULT_ENDPOINT};
use crate::error::Result;
use crate::http_client::{AuthorizedTransport, TransportSettings, Verb};
use crate::query::{ProspectQuery, Query};
use crate::tls::TrustPolicy;

/// Client for the Outreach REST API
///
/// Safe to share behind an `Arc`; concurrent calls share one token state.
pub struct OutreachClient {
    tokens: TokenManager,
    transport: AuthorizedTransport,
}

impl OutreachClient {
    pub fn builder(
        credentials: ApplicationCredentials,
        grant: AuthorizationGrant,
    ) -> OutreachClientBuilder {
        OutreachClientBuilder::new(credentials, grant)
    }

    /// Client against the default endpoint with default settings
    pub fn new(credentials: ApplicationCredentials, grant: AuthorizationGrant) -> Result<Self> {
        Self::builder(credentials, grant).build()
    }

    /// Authorized call to an arbitrary resource path
    pub async fn call(
        &self,
        verb: Verb,
        path: &str,
        query: &Query,
        body: Option<&Value>,
    ) -> Result<Value> {
        let token = self.tokens.ensure_valid_token().await?;
        self.transport.call(verb, path, query, body, &token).await
    }

    /// Create a prospect
    pub async fn add_prospect(&self, prospect: &Value) -> Result<Value> {
        self.call(Verb::Post, "prospects", &Query::new(), Some(prospect))
            .await
    }

    /// Update attributes of an existing prospect
    pub async fn modify_prospect(&self, prospect_id: u64, attributes: &Value) -> Result<Value> {
        self.call(
            Verb::Patch,
            &format!("prospects/{}", prospect_id),
            &Query::new(),
            Some(attributes),
        )
        .await
    }

    pub async fn get_prospect(&self, prospect_id: u64) -> Result<Value> {
        self.call(
            Verb::Get,
            &format!("prospects/{}", prospect_id),
            &Query::new(),
            None,
        )
        .await
    }

    /// List prospects matching the given filters
    pub async fn get_prospects(&self, filter: &ProspectQuery) -> Result<Value> {
        self.call(Verb::Get, "prospects", &filter.to_query(), None)
            .await
    }

    /// List sequences, sorted by name ascending on the server side
    pub async fn get_sequences(&self, page: u32) -> Result<Value> {
        self.call(Verb::Get, "sequences", &Query::new().page(page), None)
            .await
    }

    /// Additively associate prospects with a sequence
    pub async fn add_prospects_to_sequence(&self, sequence_id: u64, payload: &Value) -> Result<Value> {
        self.call(
            Verb::Patch,
            &format!("sequences/{}", sequence_id),
            &Query::new(),
            Some(payload),
        )
        .await
    }

    /// Metadata bound to the authorization (user email, application)
    pub async fn get_info(&self) -> Result<Value> {
        self.call(Verb::Get, "info", &Query::new(), None).await
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn endpoints(&self) -> &Endpoints {
        self.transport.endpoints()
    }
}

/// Builder for [`OutreachClient`]
pub struct OutreachClientBuilder {
    credentials: ApplicationCredentials,
    grant: AuthorizationGrant,
    endpoints: Option<Endpoints>,
    settings: TransportSettings,
    trust: Option<TrustPolicy>,
    skew: Duration,
    clock: Arc<dyn Clock>,
}

impl OutreachClientBuilder {
    fn new(credentials: ApplicationCredentials, grant: AuthorizationGrant) -> Self {
        Self {
            credentials,
            grant,
            endpoints: None,
            settings: TransportSettings::default(),
            trust: None,
            skew: Duration::seconds(DEFAULT_SKEW_SECS),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    pub fn transport_settings(mut self, settings: TransportSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Pin TLS to a custom anchor set instead of the default roots
    pub fn trust_policy(mut self, policy: TrustPolicy) -> Self {
        self.trust = Some(policy);
        self
    }

    pub fn skew(mut self, skew: Duration) -> Self {
        self.skew = skew;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<OutreachClient> {
        let endpoints = match self.endpoints {
            Some(endpoints) => endpoints,
            None => Endpoints::single(DEFAULT_ENDPOINT, DEFAULT_API_VERSION)?,
        };
        let token_url = endpoints.token_url()?;

        let transport = AuthorizedTransport::new(endpoints, &self.settings, self.trust.as_ref())?;

        // Token exchange goes through the same client, so the trust policy applies there too
        let tokens = TokenManager::new(
            self.credentials,
            self.grant,
            token_url,
            transport.client().clone(),
        )
        .with_clock(self.clock)
        .with_skew(self.skew);

        Ok(OutreachClient { tokens, transport })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints() {
        let client = OutreachClient::new(
            ApplicationCredentials::new("id", "secret", "https://example.com/cb"),
            AuthorizationGrant::new("code"),
        )
        .unwrap();

        assert_eq!(client.endpoints().api_base().as_str(), "https://api.outreach.io/v1");
        assert_eq!(client.tokens().skew(), Duration::seconds(DEFAULT_SKEW_SECS));
    }

    #[test]
    fn test_client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OutreachClient>();
    }
}
