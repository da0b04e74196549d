//! Keystone v3 password authentication and service catalog lookup.

use std::time::Duration;

use log::{debug, info};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{AuditError, Result};

const TOKEN_HEADER: &str = "X-Subject-Token";

/// Password credentials scoped to a project
#[derive(Debug, Clone)]
pub struct Credentials {
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub project_name: String,
    pub user_domain_name: String,
    pub project_domain_name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TokenBody {
    token: Token,
}

#[derive(Debug, Clone, Deserialize)]
struct Token {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    pub interface: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
    pub url: String,
}

/// An authenticated session: HTTP client, token and service catalog.
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
    token: String,
    catalog: Vec<CatalogEntry>,
}

impl Session {
    /// Authenticate against Keystone.
    pub fn authenticate(credentials: &Credentials, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let url = tokens_url(&credentials.auth_url);
        info!("Authenticating {} against {}", credentials.username, url);

        let response = client.post(&url).json(&auth_body(credentials)).send()?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(AuditError::Auth(format!("{}: {}", status, message.trim())));
        }

        let token = response
            .headers()
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AuditError::Auth(format!("response has no {} header", TOKEN_HEADER)))?;
        let body: TokenBody = response.json()?;
        debug!("Service catalog has {} entries", body.token.catalog.len());

        Ok(Self {
            client,
            token,
            catalog: body.token.catalog,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// URL of the first catalog entry matching one of `service_types`, in order of preference.
    pub fn endpoint(&self, service_types: &[&str], interface: &str, region: Option<&str>) -> Result<String> {
        find_endpoint(&self.catalog, service_types, interface, region)
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| AuditError::Catalog {
                service: service_types.first().copied().unwrap_or_default().to_string(),
            })
    }
}

fn find_endpoint<'a>(
    catalog: &'a [CatalogEntry],
    service_types: &[&str],
    interface: &str,
    region: Option<&str>,
) -> Option<&'a str> {
    service_types.iter().find_map(|wanted| {
        catalog
            .iter()
            .filter(|entry| entry.service_type == *wanted)
            .flat_map(|entry| entry.endpoints.iter())
            .find(|ep| {
                ep.interface == interface
                    && region.is_none_or(|r| {
                        ep.region.as_deref() == Some(r) || ep.region_id.as_deref() == Some(r)
                    })
            })
            .map(|ep| ep.url.as_str())
    })
}

/// `<auth_url>/v3/auth/tokens`, tolerating an auth url that already ends in `/v3`
fn tokens_url(auth_url: &str) -> String {
    let base = auth_url.trim_end_matches('/');
    if base.ends_with("/v3") {
        format!("{}/auth/tokens", base)
    } else {
        format!("{}/v3/auth/tokens", base)
    }
}

fn auth_body(credentials: &Credentials) -> Value {
    json!({
        "auth": {
            "identity": {
                "methods": ["password"],
                "password": {
                    "user": {
                        "name": credentials.username,
                        "domain": { "name": credentials.user_domain_name },
                        "password": credentials.password
                    }
                }
            },
            "scope": {
                "project": {
                    "name": credentials.project_name,
                    "domain": { "name": credentials.project_domain_name }
                }
            }
        }
    })
}
