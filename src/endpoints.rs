// Endpoint URLs for the token and resource APIs

use url::Url;

use crate::error::{OutreachError, Result};
use crate::query::Query;

pub const DEFAULT_ENDPOINT: &str = "https://api.outreach.io";
pub const DEFAULT_API_VERSION: &str = "v1";

/// Base URLs for token exchange and resource calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    auth: Url,
    api: Url,
}

impl Endpoints {
    /// `api` is joined with `version` to form the resource base
    pub fn new(auth: &str, api: &str, version: &str) -> Result<Self> {
        let auth = parse_base(auth)?;
        let api = append_path(&parse_base(api)?, version)?;
        Ok(Self { auth, api })
    }

    /// Auth and API share one host
    pub fn single(endpoint: &str, version: &str) -> Result<Self> {
        Self::new(endpoint, endpoint, version)
    }

    pub fn auth_base(&self) -> &Url {
        &self.auth
    }

    pub fn api_base(&self) -> &Url {
        &self.api
    }

    /// `{auth}/oauth/token`
    pub fn token_url(&self) -> Result<Url> {
        append_path(&self.auth, "oauth/token")
    }

    /// `{api}/{version}/{path}?{query}`
    pub fn resource_url(&self, path: &str, query: &Query) -> Result<Url> {
        let mut url = append_path(&self.api, path)?;
        if !query.is_empty() {
            url.set_query(Some(&query.encode()));
        }
        Ok(url)
    }
}

fn parse_base(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| OutreachError::Config(format!("Invalid endpoint URL '{}': {}", raw, e)))?;

    match url.scheme() {
        "https" | "http" => {}
        other => {
            return Err(OutreachError::Config(format!(
                "Unsupported endpoint scheme '{}' in {}",
                other, raw
            )))
        }
    }

    if url.cannot_be_a_base() {
        return Err(OutreachError::Config(format!(
            "Endpoint URL cannot be used as a base: {}",
            raw
        )));
    }

    Ok(url)
}

/// Append `/`-separated segments, each percent-encoded on its own
fn append_path(base: &Url, path: &str) -> Result<Url> {
    let mut url = base.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|_| OutreachError::Config(format!("Endpoint URL cannot be used as a base: {}", base)))?
        .pop_if_empty()
        .extend(path.split('/').filter(|s| !s.is_empty()));
    Ok(url)
}
