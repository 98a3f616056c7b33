// Application credentials and the one-time authorization grant

use std::fmt;

/// Credentials representing the registered application
///
/// Generated when the client application is provisioned on the platform.
#[derive(Clone, PartialEq, Eq)]
pub struct ApplicationCredentials {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl ApplicationCredentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }
}

impl fmt::Debug for ApplicationCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Authorization code returned by the redirect-based authorize step
///
/// Exchanged once; later exchanges use the refresh token.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationGrant(String);

impl AuthorizationGrant {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthorizationGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthorizationGrant(<redacted>)")
    }
}

/// First few characters of a secret, for logs
pub(crate) fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(8).collect();
    format!("{}...", prefix)
}
