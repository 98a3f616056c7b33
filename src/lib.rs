// Outreach client - Library root

pub mod auth;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod http_client;
pub mod query;
pub mod tls;

pub use client::{OutreachClient, OutreachClientBuilder};
pub use endpoints::Endpoints;
pub use error::{ErrorKind, OutreachError, Result};
pub use http_client::{TransportSettings, Verb};
pub use query::{ProspectQuery, Query};
pub use tls::{HostnamePolicy, TrustPolicy};
