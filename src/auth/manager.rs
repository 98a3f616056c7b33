use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

use super::clock::{Clock, SystemClock};
use super::credentials::{redact, ApplicationCredentials, AuthorizationGrant};
use super::exchange;
use super::types::{GrantType, TokenState};
use crate::error::Result;

/// Default leeway subtracted from the token expiry
pub const DEFAULT_SKEW_SECS: i64 = 5;

/// Token lifecycle manager
/// Owns the token state for one client and exchanges tokens on demand
pub struct TokenManager {
    /// Current token state
    state: RwLock<TokenState>,

    /// Application credentials sent with every exchange
    credentials: ApplicationCredentials,

    /// One-time authorization code, used only while no refresh token exists
    grant: AuthorizationGrant,

    /// Token endpoint
    token_url: Url,

    /// HTTP client for exchange requests
    client: Client,

    clock: Arc<dyn Clock>,

    /// Expiry leeway
    skew: Duration,
}

impl TokenManager {
    pub fn new(
        credentials: ApplicationCredentials,
        grant: AuthorizationGrant,
        token_url: Url,
        client: Client,
    ) -> Self {
        Self {
            state: RwLock::new(TokenState::default()),
            credentials,
            grant,
            token_url,
            client,
            clock: Arc::new(SystemClock),
            skew: Duration::seconds(DEFAULT_SKEW_SECS),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_skew(mut self, skew: Duration) -> Self {
        self.skew = skew;
        self
    }

    pub fn skew(&self) -> Duration {
        self.skew
    }

    /// Get a valid access token, exchanging if necessary
    ///
    /// Returns the cached token without any network call while
    /// `expires_at - skew > now`. Otherwise performs exactly one exchange:
    /// the authorization code on first use, the refresh token afterwards.
    /// Concurrent callers wait for an in-flight exchange and reuse its
    /// result. On failure the token state is left untouched.
    ///
    /// A freshly exchanged token is returned even when the server issued an
    /// `expires_in` shorter than the skew; only a warning is logged, and the
    /// next call exchanges again.
    pub async fn ensure_valid_token(&self) -> Result<String> {
        {
            let state = self.state.read().await;
            if let Some(token) = state.valid_token(self.clock.now(), self.skew) {
                return Ok(token.to_string());
            }
        }

        let mut state = self.state.write().await;

        // Another caller may have finished an exchange while we waited for the lock
        if let Some(token) = state.valid_token(self.clock.now(), self.skew) {
            tracing::debug!("Token refreshed by a concurrent caller");
            return Ok(token.to_string());
        }

        let (grant, credential) = match state.refresh_token.clone() {
            Some(refresh_token) => (GrantType::RefreshToken, refresh_token),
            None => (GrantType::AuthorizationCode, self.grant.code().to_string()),
        };

        tracing::debug!(
            grant_type = grant.as_str(),
            expired_at = ?state.expires_at,
            "Access token missing or expiring, exchanging"
        );

        let data = exchange::exchange_token(
            &self.client,
            &self.token_url,
            &self.credentials,
            grant,
            &credential,
        )
        .await
        .inspect_err(|e| tracing::error!("Token exchange failed: {}", e))?;

        let token = data.access_token.clone();
        let new_state = data
            .into_state(self.clock.now())
            .inspect_err(|e| tracing::error!("Rejected token response: {}", e))?;

        if new_state.valid_token(self.clock.now(), self.skew).is_none() {
            tracing::warn!(
                skew_secs = self.skew.num_seconds(),
                "Server issued a token that expires within the skew window"
            );
        }

        tracing::info!(
            "Access token ready ({}), expires: {}",
            redact(&token),
            new_state
                .expires_at
                .map(|e| e.to_rfc3339())
                .unwrap_or_default()
        );

        *state = new_state;
        Ok(token)
    }

    /// Whether a token has ever been obtained
    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.access_token.is_some()
    }

    /// Expiry of the current token
    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.expires_at
    }

    /// Whether the current token is usable without an exchange
    pub async fn has_token(&self) -> bool {
        self.state
            .read()
            .await
            .valid_token(self.clock.now(), self.skew)
            .is_some()
    }

    /// Snapshot of the token state
    pub async fn snapshot(&self) -> TokenState {
        self.state.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use chrono::TimeZone;
    use mockito::{Matcher, Mock, ServerGuard};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 12, 10, 30, 0).unwrap()
    }

    fn manager(server: &ServerGuard, clock: &ManualClock) -> TokenManager {
        let token_url = Url::parse(&format!("{}/oauth/token", server.url())).unwrap();
        TokenManager::new(
            ApplicationCredentials::new("app-id", "app-secret", "https://example.com/callback"),
            AuthorizationGrant::new("C0DE"),
            token_url,
            Client::new(),
        )
        .with_clock(Arc::new(clock.clone()))
    }

    async fn token_mock(server: &mut ServerGuard, matcher: Matcher, body: &str, hits: usize) -> Mock {
        server
            .mock("POST", "/oauth/token")
            .match_body(matcher)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }

    fn code_grant() -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("code".into(), "C0DE".into()),
        ])
    }

    fn refresh_grant(token: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), token.into()),
        ])
    }

    #[tokio::test]
    async fn test_first_call_exchanges_code() {
        let mut server = mockito::Server::new_async().await;
        let clock = ManualClock::new(start());
        let mock = token_mock(
            &mut server,
            code_grant(),
            r#"{"access_token":"A1","refresh_token":"R1","expires_in":3600}"#,
            1,
        )
        .await;

        let manager = manager(&server, &clock);
        assert!(!manager.is_authenticated().await);

        assert_eq!(manager.ensure_valid_token().await.unwrap(), "A1");
        assert_eq!(
            manager.expires_at().await,
            Some(start() + Duration::seconds(3600))
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_exchange_while_valid() {
        let mut server = mockito::Server::new_async().await;
        let clock = ManualClock::new(start());
        let mock = token_mock(
            &mut server,
            code_grant(),
            r#"{"access_token":"A1","refresh_token":"R1","expires_in":3600}"#,
            1,
        )
        .await;

        let manager = manager(&server, &clock);
        manager.ensure_valid_token().await.unwrap();

        clock.advance(Duration::seconds(10));
        assert_eq!(manager.ensure_valid_token().await.unwrap(), "A1");
        assert!(manager.has_token().await);

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_inside_skew_window() {
        let mut server = mockito::Server::new_async().await;
        let clock = ManualClock::new(start());
        let first = token_mock(
            &mut server,
            code_grant(),
            r#"{"access_token":"A1","refresh_token":"R1","expires_in":3600}"#,
            1,
        )
        .await;
        let refresh = token_mock(
            &mut server,
            refresh_grant("R1"),
            r#"{"access_token":"A2","refresh_token":"R2","expires_in":1800}"#,
            1,
        )
        .await;

        let manager = manager(&server, &clock);
        manager.ensure_valid_token().await.unwrap();

        clock.set(start() + Duration::seconds(3600 - 2));
        assert!(!manager.has_token().await);
        assert_eq!(manager.ensure_valid_token().await.unwrap(), "A2");

        let state = manager.snapshot().await;
        assert_eq!(state.refresh_token.as_deref(), Some("R2"));
        assert_eq!(
            state.expires_at,
            Some(start() + Duration::seconds(3600 - 2 + 1800))
        );

        first.assert_async().await;
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_leaves_state_untouched() {
        let mut server = mockito::Server::new_async().await;
        let clock = ManualClock::new(start());
        let mock = server
            .mock("POST", "/oauth/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .expect(2)
            .create_async()
            .await;

        let manager = manager(&server, &clock);

        let err = manager.ensure_valid_token().await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Authorization);
        assert!(!manager.is_authenticated().await);

        // Next call starts a fresh attempt with the same grant
        assert!(manager.ensure_valid_token().await.is_err());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_unauthorized_keeps_previous_tokens() {
        let mut server = mockito::Server::new_async().await;
        let clock = ManualClock::new(start());
        let first = token_mock(
            &mut server,
            code_grant(),
            r#"{"access_token":"A1","refresh_token":"R1","expires_in":3600}"#,
            1,
        )
        .await;
        let refresh = server
            .mock("POST", "/oauth/token")
            .match_body(refresh_grant("R1"))
            .with_status(401)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .expect(1)
            .create_async()
            .await;

        let manager = manager(&server, &clock);
        manager.ensure_valid_token().await.unwrap();

        clock.advance(Duration::seconds(3600));
        let err = manager.ensure_valid_token().await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Authorization);

        let state = manager.snapshot().await;
        assert_eq!(state.access_token.as_deref(), Some("A1"));
        assert_eq!(state.refresh_token.as_deref(), Some("R1"));
        assert_eq!(state.expires_at, Some(start() + Duration::seconds(3600)));

        first.assert_async().await;
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_out_of_range_expiry_is_protocol_error() {
        let mut server = mockito::Server::new_async().await;
        let clock = ManualClock::new(start());
        let mock = token_mock(
            &mut server,
            code_grant(),
            r#"{"access_token":"A1","refresh_token":"R1","expires_in":9000000000000000}"#,
            1,
        )
        .await;

        let manager = manager(&server, &clock);
        let err = manager.ensure_valid_token().await.unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::Protocol);
        assert!(!manager.is_authenticated().await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_skew_is_configurable() {
        let mut server = mockito::Server::new_async().await;
        let clock = ManualClock::new(start());
        let mock = token_mock(
            &mut server,
            code_grant(),
            r#"{"access_token":"A1","refresh_token":"R1","expires_in":3600}"#,
            1,
        )
        .await;

        let manager = manager(&server, &clock).with_skew(Duration::seconds(1));
        assert_eq!(manager.skew(), Duration::seconds(1));
        manager.ensure_valid_token().await.unwrap();

        clock.set(start() + Duration::seconds(3600 - 2));
        assert!(manager.has_token().await);
        mock.assert_async().await;
    }
}
