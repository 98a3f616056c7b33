// Authentication types

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{OutreachError, Result};

/// OAuth2 grant used for a token exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    /// First exchange, consumes the one-time authorization code
    AuthorizationCode,

    /// Every later exchange
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::RefreshToken => "refresh_token",
        }
    }

    /// Name of the form field carrying the grant credential
    pub fn parameter(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "code",
            GrantType::RefreshToken => "refresh_token",
        }
    }
}

/// In-memory token state, one per client instance
///
/// When `access_token` is set, `refresh_token` and `expires_at` are set too.
/// The whole value is replaced on a successful exchange and left untouched
/// on failure.
#[derive(Debug, Clone, Default)]
pub struct TokenState {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenState {
    /// Token usable at `now` with `skew` of leeway
    pub fn valid_token(&self, now: DateTime<Utc>, skew: Duration) -> Option<&str> {
        match (&self.access_token, self.expires_at) {
            (Some(token), Some(exp)) if exp - skew > now => Some(token.as_str()),
            _ => None,
        }
    }
}

/// Token data from a successful exchange
#[derive(Debug, Clone, PartialEq)]
pub struct TokenData {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

impl TokenData {
    /// Fails with `Protocol` when the expiry is not representable
    pub fn into_state(self, now: DateTime<Utc>) -> Result<TokenState> {
        let expires_at = Duration::try_seconds(self.expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| OutreachError::Protocol("expires_in out of range".into()))?;

        Ok(TokenState {
            access_token: Some(self.access_token),
            refresh_token: Some(self.refresh_token),
            expires_at: Some(expires_at),
        })
    }
}

/// Raw token endpoint response
///
/// Fields are optional here so that a missing field is reported as a
/// protocol error rather than a generic decode failure.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<Value>,
}

impl TokenResponse {
    pub fn into_token_data(self) -> Result<TokenData> {
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| OutreachError::Protocol("response does not contain access_token".into()))?;

        let refresh_token = self
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| OutreachError::Protocol("response does not contain refresh_token".into()))?;

        let expires_in = self
            .expires_in
            .as_ref()
            .and_then(parse_expires_in)
            .ok_or_else(|| OutreachError::Protocol("response does not contain a valid expires_in".into()))?;

        Ok(TokenData {
            access_token,
            refresh_token,
            expires_in,
        })
    }
}

/// Accepts either a JSON integer or a string holding one
fn parse_expires_in(value: &Value) -> Option<i64> {
    let secs = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    (secs >= 0).then_some(secs)
}
