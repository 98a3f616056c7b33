// Error handling module
// Single failure surface for token exchange, transport and configuration

use thiserror::Error;

/// Coarse classification of an [`OutreachError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Authorization,
    Protocol,
    Config,
}

/// Errors surfaced by the client
///
/// Token exchange and resource calls both fail with this type. The underlying
/// cause is kept as the error source for diagnostics.
#[derive(Error, Debug)]
pub enum OutreachError {
    /// Network/IO failure or a non-success status from the remote side
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Token endpoint rejected the grant (401)
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// Response body could not be parsed or lacks required fields
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl OutreachError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OutreachError::Transport { .. } => ErrorKind::Transport,
            OutreachError::Authorization(_) => ErrorKind::Authorization,
            OutreachError::Protocol(_) => ErrorKind::Protocol,
            OutreachError::Config(_) => ErrorKind::Config,
        }
    }

    /// HTTP status attached to a transport failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            OutreachError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    pub(crate) fn status_error(status: u16, body: String) -> Self {
        OutreachError::Transport {
            message: format!("{} - {}", status, body),
            status: Some(status),
            source: None,
        }
    }
}

impl From<reqwest::Error> for OutreachError {
    fn from(err: reqwest::Error) -> Self {
        // Categorize the error for better debugging
        let error_kind = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connection_failed"
        } else if err.is_request() {
            "request_error"
        } else if err.is_body() {
            "body_error"
        } else if err.is_decode() {
            "decode_error"
        } else {
            "unknown"
        };

        OutreachError::Transport {
            message: format!("{} (kind: {})", err, error_kind),
            status: err.status().map(|s| s.as_u16()),
            source: Some(err),
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, OutreachError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_messages() {
        let err = OutreachError::Authorization("code already used".to_string());
        assert_eq!(err.to_string(), "Authorization failed: code already used");

        let err = OutreachError::Protocol("missing access_token".to_string());
        assert_eq!(err.to_string(), "Protocol error: missing access_token");

        let err = OutreachError::status_error(503, "Service unavailable".to_string());
        assert_eq!(err.to_string(), "Transport error: 503 - Service unavailable");
    }

    #[test]
    fn test_config_error_message() {
        let err = OutreachError::Config("Missing client id".to_string());
        assert_eq!(err.to_string(), "Configuration error: Missing client id");
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(
            OutreachError::Authorization(String::new()).kind(),
            ErrorKind::Authorization
        );
        assert_eq!(OutreachError::Protocol(String::new()).kind(), ErrorKind::Protocol);
        assert_eq!(OutreachError::Config(String::new()).kind(), ErrorKind::Config);
        assert_eq!(
            OutreachError::status_error(500, String::new()).kind(),
            ErrorKind::Transport
        );
    }

    #[test]
    fn test_status_only_on_transport() {
        assert_eq!(OutreachError::status_error(404, "nope".into()).status(), Some(404));
        assert_eq!(OutreachError::Authorization("x".into()).status(), None);
    }

    #[test]
    fn test_status_error_has_no_source() {
        let err = OutreachError::status_error(500, "boom".into());
        assert!(err.source().is_none());
    }
}
