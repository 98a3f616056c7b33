use anyhow::{Context, Result};
use chrono::Duration as TokenDuration;
use clap::{Parser, Subcommand, ValueEnum};
use dialoguer::{Confirm, Input, Password};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::{ApplicationCredentials, AuthorizationGrant, DEFAULT_SKEW_SECS};
use crate::client::OutreachClient;
use crate::endpoints::{Endpoints, DEFAULT_API_VERSION, DEFAULT_ENDPOINT};
use crate::http_client::TransportSettings;
use crate::tls::{HostnamePolicy, TrustPolicy};

/// Outreach API client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Base URL of the platform (token endpoint and, by default, the API)
    #[arg(short = 'e', long, env = "OUTREACH_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Base URL of the resource API, if different from the endpoint
    #[arg(long, env = "OUTREACH_API_ENDPOINT")]
    pub api_endpoint: Option<String>,

    /// API version path segment
    #[arg(long, env = "OUTREACH_API_VERSION", default_value = DEFAULT_API_VERSION)]
    pub api_version: String,

    /// Application identifier
    #[arg(long, env = "OUTREACH_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Application secret
    #[arg(long, env = "OUTREACH_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Redirect URI registered for the application
    #[arg(long, env = "OUTREACH_REDIRECT_URI")]
    pub redirect_uri: Option<String>,

    /// One-time authorization code from the authorize redirect
    #[arg(short = 'c', long, env = "OUTREACH_AUTH_CODE", hide_env_values = true)]
    pub auth_code: Option<String>,

    /// PEM bundle of trust anchors replacing the default roots
    #[arg(long, env = "OUTREACH_CA_BUNDLE")]
    pub ca_bundle: Option<String>,

    /// Hostname check for pinned anchors
    #[arg(long, env = "OUTREACH_HOSTNAME_POLICY", value_enum, default_value_t = HostnameCheck::Pinned)]
    pub hostname_policy: HostnameCheck,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "60")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

/// Command-line spelling of [`HostnamePolicy`]
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostnameCheck {
    /// Accept a pinned end-entity certificate for any hostname
    Pinned,
    /// Always verify the hostname
    Strict,
}

impl From<HostnameCheck> for HostnamePolicy {
    fn from(check: HostnameCheck) -> Self {
        match check {
            HostnameCheck::Pinned => HostnamePolicy::AcceptPinned,
            HostnameCheck::Strict => HostnamePolicy::Strict,
        }
    }
}

/// Upper bound for `TOKEN_REFRESH_SKEW`, in seconds
const MAX_TOKEN_SKEW_SECS: i64 = 86_400;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show metadata bound to the authorization
    Info,

    /// Fetch a single prospect
    Prospect { id: u64 },

    /// List prospects matching filters
    Prospects {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        page: Option<u32>,
    },

    /// List sequences
    Sequences {
        #[arg(long, default_value = "1")]
        page: u32,
    },

    /// Create a prospect from a JSON file
    AddProspect { file: String },

    /// Update a prospect from a JSON file
    ModifyProspect { id: u64, file: String },

    /// Add prospects to a sequence from a JSON file
    AddToSequence { id: u64, file: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    // Endpoints
    pub auth_endpoint: String,
    pub api_endpoint: String,
    pub api_version: String,

    // Application credentials
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorization_code: String,

    // Trust
    pub ca_bundle: Option<PathBuf>,
    pub hostname_policy: HostnamePolicy,

    // Token lifecycle
    pub token_skew: i64,

    // HTTP client
    pub http_max_connections: usize,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,
    pub http_method_override: bool,

    pub log_level: String,
}

impl Config {
    /// Build configuration with priority: CLI > ENV > defaults
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let config = Config {
            auth_endpoint: args.endpoint.clone(),
            api_endpoint: args
                .api_endpoint
                .clone()
                .unwrap_or_else(|| args.endpoint.clone()),
            api_version: args.api_version.clone(),

            client_id: args.client_id.clone().context(
                "OUTREACH_CLIENT_ID is required (use --client-id or set OUTREACH_CLIENT_ID env var)",
            )?,
            client_secret: args.client_secret.clone().context(
                "OUTREACH_CLIENT_SECRET is required (use --client-secret or set OUTREACH_CLIENT_SECRET env var)",
            )?,
            redirect_uri: args.redirect_uri.clone().context(
                "OUTREACH_REDIRECT_URI is required (use --redirect-uri or set OUTREACH_REDIRECT_URI env var)",
            )?,
            authorization_code: args.auth_code.clone().context(
                "OUTREACH_AUTH_CODE is required (use -c or set OUTREACH_AUTH_CODE env var)",
            )?,

            ca_bundle: args.ca_bundle.as_deref().map(expand_tilde),
            hostname_policy: args.hostname_policy.into(),

            token_skew: env_or("TOKEN_REFRESH_SKEW", DEFAULT_SKEW_SECS),

            http_max_connections: env_or("HTTP_MAX_CONNECTIONS", 20),
            http_connect_timeout: env_or("HTTP_CONNECT_TIMEOUT", 30),
            http_request_timeout: args.http_timeout,
            http_method_override: parse_bool(
                &std::env::var("HTTP_METHOD_OVERRIDE").unwrap_or_default(),
                true,
            ),

            log_level: args.log_level.clone(),
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.endpoints()?;

        if let Some(ref bundle) = self.ca_bundle {
            if !bundle.exists() {
                anyhow::bail!("OUTREACH_CA_BUNDLE does not exist: {}", bundle.display());
            }
        }

        if !(0..=MAX_TOKEN_SKEW_SECS).contains(&self.token_skew) {
            anyhow::bail!(
                "TOKEN_REFRESH_SKEW must be between 0 and {} seconds",
                MAX_TOKEN_SKEW_SECS
            );
        }

        if self.http_connect_timeout == 0 || self.http_request_timeout == 0 {
            anyhow::bail!("HTTP timeouts must be greater than zero");
        }

        Ok(())
    }

    pub fn endpoints(&self) -> Result<Endpoints> {
        Endpoints::new(&self.auth_endpoint, &self.api_endpoint, &self.api_version)
            .context("Invalid endpoint configuration")
    }

    pub fn trust_policy(&self) -> Result<Option<TrustPolicy>> {
        match self.ca_bundle {
            Some(ref path) => {
                let policy = TrustPolicy::from_pem_file(path)
                    .context("Failed to load trust anchors")?
                    .with_hostname_policy(self.hostname_policy);
                Ok(Some(policy))
            }
            None => Ok(None),
        }
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            max_connections: self.http_max_connections,
            connect_timeout: Duration::from_secs(self.http_connect_timeout),
            request_timeout: Duration::from_secs(self.http_request_timeout),
            method_override: self.http_method_override,
        }
    }

    /// Build a client from this configuration
    pub fn build_client(&self) -> Result<OutreachClient> {
        let credentials =
            ApplicationCredentials::new(&self.client_id, &self.client_secret, &self.redirect_uri);
        let grant = AuthorizationGrant::new(&self.authorization_code);

        let skew = TokenDuration::try_seconds(self.token_skew)
            .context("TOKEN_REFRESH_SKEW out of range")?;

        let mut builder = OutreachClient::builder(credentials, grant)
            .endpoints(self.endpoints()?)
            .transport_settings(self.transport_settings())
            .skew(skew);

        if let Some(policy) = self.trust_policy()? {
            builder = builder.trust_policy(policy);
        }

        builder.build().context("Failed to create Outreach client")
    }
}

/// Expand tilde (~) in file paths to user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

// === Interactive Setup ===

/// Check if interactive setup is needed (no .env file and missing required values)
pub fn needs_interactive_setup(args: &CliArgs) -> bool {
    let env_file_exists = std::path::Path::new(".env").exists();

    let missing = args.client_id.is_none()
        || args.client_secret.is_none()
        || args.redirect_uri.is_none()
        || args.auth_code.is_none();

    // Without a .env the app credentials are prompted; the code is always prompted when missing
    missing && (!env_file_exists || args.auth_code.is_none())
}

/// Prompt for the values missing from `args`
pub fn run_interactive_setup(args: &mut CliArgs) -> Result<()> {
    println!();
    println!("Outreach client setup");
    println!();

    let mut saved_credentials = false;

    if args.client_id.is_none() {
        let client_id: String = Input::new()
            .with_prompt("Application identifier (OUTREACH_CLIENT_ID)")
            .interact_text()
            .context("Failed to read OUTREACH_CLIENT_ID")?;
        args.client_id = Some(client_id);
        saved_credentials = true;
    }

    if args.client_secret.is_none() {
        let client_secret: String = Password::new()
            .with_prompt("Application secret (OUTREACH_CLIENT_SECRET)")
            .interact()
            .context("Failed to read OUTREACH_CLIENT_SECRET")?;
        args.client_secret = Some(client_secret);
        saved_credentials = true;
    }

    if args.redirect_uri.is_none() {
        let redirect_uri: String = Input::new()
            .with_prompt("Redirect URI (OUTREACH_REDIRECT_URI)")
            .interact_text()
            .context("Failed to read OUTREACH_REDIRECT_URI")?;
        args.redirect_uri = Some(redirect_uri);
        saved_credentials = true;
    }

    if args.auth_code.is_none() {
        println!();
        println!("Authorize the application in a browser and paste the `code` from the redirect:");
        println!("  {}/oauth/authorize", args.endpoint.trim_end_matches('/'));
        println!();

        let code: String = Password::new()
            .with_prompt("Authorization code (OUTREACH_AUTH_CODE)")
            .interact()
            .context("Failed to read OUTREACH_AUTH_CODE")?;

        if code.is_empty() {
            anyhow::bail!("Authorization code cannot be empty");
        }
        args.auth_code = Some(code);
    }

    if saved_credentials {
        println!();
        let save_to_env = Confirm::new()
            .with_prompt("Save application credentials to .env file?")
            .default(true)
            .interact()
            .context("Failed to read save confirmation")?;

        if save_to_env {
            save_env_file(args)?;
            println!("Configuration saved to .env file");
        }
    }

    println!();
    Ok(())
}

/// Save application credentials to .env file
///
/// The authorization code is single-use and is never written.
fn save_env_file(args: &CliArgs) -> Result<()> {
    let env_content = render_env_file(args);

    let mut file = std::fs::File::create(".env").context("Failed to create .env file")?;
    file.write_all(env_content.as_bytes())
        .context("Failed to write .env file")?;

    Ok(())
}

fn render_env_file(args: &CliArgs) -> String {
    format!(
        r#"# Outreach client configuration
# Generated by interactive setup

OUTREACH_ENDPOINT={}
OUTREACH_CLIENT_ID={}
OUTREACH_CLIENT_SECRET={}
OUTREACH_REDIRECT_URI={}

# Logging (trace, debug, info, warn, error)
LOG_LEVEL={}
"#,
        args.endpoint,
        args.client_id.as_deref().unwrap_or_default(),
        args.client_secret.as_deref().unwrap_or_default(),
        args.redirect_uri.as_deref().unwrap_or_default(),
        args.log_level,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec![
            "outreach-client",
            "--client-id",
            "app-id",
            "--client-secret",
            "app-secret",
            "--redirect-uri",
            "https://example.com/callback",
            "-c",
            "C0DE",
        ];
        argv.extend_from_slice(extra);
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/certs/ca.pem");
        assert!(path.to_string_lossy().contains("certs/ca.pem"));
        assert!(!path.to_string_lossy().starts_with("~"));

        let path = expand_tilde("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_tilde_just_tilde() {
        // Just "~" without slash should not expand
        let path = expand_tilde("~");
        assert_eq!(path, PathBuf::from("~"));
    }

    #[test]
    fn test_hostname_policy_values() {
        let config = Config::from_args(&args(&["info"])).unwrap();
        assert_eq!(config.hostname_policy, HostnamePolicy::AcceptPinned);

        let config = Config::from_args(&args(&["--hostname-policy", "pinned", "info"])).unwrap();
        assert_eq!(config.hostname_policy, HostnamePolicy::AcceptPinned);

        let config = Config::from_args(&args(&["--hostname-policy", "strict", "info"])).unwrap();
        assert_eq!(config.hostname_policy, HostnamePolicy::Strict);
    }

    #[test]
    fn test_unknown_hostname_policy_rejected() {
        let result = CliArgs::try_parse_from([
            "outreach-client",
            "--client-id",
            "app-id",
            "--hostname-policy",
            "stict",
            "info",
        ]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn test_validate_token_skew_bounds() {
        let mut config = Config::from_args(&args(&["info"])).unwrap();

        config.token_skew = i64::MAX;
        assert!(config.validate().is_err());
        assert!(config.build_client().is_err());

        config.token_skew = -1;
        assert!(config.validate().is_err());

        config.token_skew = MAX_TOKEN_SKEW_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true", false));
        assert!(parse_bool("YES", false));
        assert!(!parse_bool("off", true));
        assert!(parse_bool("", true));
        assert!(!parse_bool("maybe", false));
    }

    #[test]
    fn test_subcommands() {
        assert_eq!(args(&["info"]).command, Command::Info);
        assert_eq!(args(&["prospect", "42"]).command, Command::Prospect { id: 42 });
        assert_eq!(
            args(&["prospects", "--email", "a@b.c", "--page", "2"]).command,
            Command::Prospects {
                first_name: None,
                last_name: None,
                company: None,
                email: Some("a@b.c".into()),
                page: Some(2),
            }
        );
        assert_eq!(args(&["sequences"]).command, Command::Sequences { page: 1 });
    }

    #[test]
    fn test_from_args() {
        let config = Config::from_args(&args(&[
            "--endpoint",
            "https://auth.example.com",
            "--api-endpoint",
            "https://api.example.com",
            "--hostname-policy",
            "strict",
            "info",
        ]))
        .unwrap();

        assert_eq!(config.client_id, "app-id");
        assert_eq!(config.authorization_code, "C0DE");
        assert_eq!(config.hostname_policy, HostnamePolicy::Strict);

        let endpoints = config.endpoints().unwrap();
        assert_eq!(
            endpoints.token_url().unwrap().as_str(),
            "https://auth.example.com/oauth/token"
        );
        assert_eq!(endpoints.api_base().as_str(), "https://api.example.com/v1");
    }

    #[test]
    fn test_validate_missing_bundle() {
        let mut config = Config::from_args(&args(&["info"])).unwrap();
        config.ca_bundle = Some(PathBuf::from("/nonexistent/ca.pem"));
        assert!(config.validate().is_err());

        config.ca_bundle = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_trust_policy_from_bundle() {
        let mut config = Config::from_args(&args(&["info"])).unwrap();
        config.ca_bundle = Some(PathBuf::from(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/pinned_ca.pem"
        )));
        config.hostname_policy = HostnamePolicy::Strict;

        let policy = config.trust_policy().unwrap().unwrap();
        assert_eq!(policy.len(), 1);
        assert_eq!(policy.hostname_policy(), HostnamePolicy::Strict);
        assert!(config.build_client().is_ok());
    }

    #[test]
    fn test_env_file_omits_auth_code() {
        let rendered = render_env_file(&args(&["info"]));
        assert!(rendered.contains("OUTREACH_CLIENT_ID=app-id"));
        assert!(!rendered.contains("C0DE"));
    }

    #[test]
    fn test_needs_interactive_setup_when_code_missing() {
        let mut cli = args(&["info"]);
        assert!(!needs_interactive_setup(&cli));

        cli.auth_code = None;
        assert!(needs_interactive_setup(&cli));
    }
}
