// Token exchange against the OAuth2 token endpoint

use reqwest::{Client, StatusCode};
use url::Url;

use super::credentials::{redact, ApplicationCredentials};
use super::types::{GrantType, TokenData, TokenResponse};
use crate::error::{OutreachError, Result};

/// POST a form-encoded grant to the token endpoint
///
/// `credential` is the authorization code or the refresh token, depending
/// on `grant`. Nothing is retried here.
pub async fn exchange_token(
    client: &Client,
    token_url: &Url,
    creds: &ApplicationCredentials,
    grant: GrantType,
    credential: &str,
) -> Result<TokenData> {
    tracing::info!(grant_type = grant.as_str(), "Exchanging token...");

    tracing::debug!(
        "Token exchange request: url={}, client_id={}, {}={}",
        token_url,
        redact(creds.client_id()),
        grant.parameter(),
        redact(credential)
    );

    let form = [
        ("client_id", creds.client_id()),
        ("client_secret", creds.client_secret()),
        ("redirect_uri", creds.redirect_uri()),
        ("grant_type", grant.as_str()),
        (grant.parameter(), credential),
    ];

    let response = client
        .post(token_url.clone())
        .form(&form)
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to send token exchange request");
            OutreachError::from(e)
        })?;

    let status = response.status();
    let text = response.text().await?;

    if status == StatusCode::UNAUTHORIZED {
        tracing::error!(
            "Token endpoint returned unauthorized, verify that the authorization code hasn't already been used"
        );
        log_oauth_error(&text);
        return Err(OutreachError::Authorization(format!(
            "token endpoint returned {} for grant_type={}",
            status,
            grant.as_str()
        )));
    }

    if !status.is_success() {
        tracing::error!(
            "Token exchange failed: status={}, body={}",
            status,
            text
        );
        log_oauth_error(&text);
        return Err(OutreachError::status_error(status.as_u16(), text));
    }

    let data: TokenResponse = serde_json::from_str(&text).map_err(|e| {
        OutreachError::Protocol(format!("Failed to parse token response: {}", e))
    })?;
    let data = data.into_token_data()?;

    tracing::info!(
        grant_type = grant.as_str(),
        expires_in = data.expires_in,
        "Token exchange succeeded"
    );

    Ok(data)
}

/// Log `error`/`error_description` from an OAuth2 error body, if present
fn log_oauth_error(body: &str) {
    if let Ok(error_json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(error_code) = error_json.get("error").and_then(|v| v.as_str()) {
            let error_desc = error_json
                .get("error_description")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            tracing::error!(
                "OAuth error details: error={}, description={}",
                error_code,
                error_desc
            );
        }
    }
}
