use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::clouds::CloudProfile;

/// Authenticated handle to one cloud: an HTTP client, a Keystone token and
/// the resolved Image API endpoint.
#[derive(Debug, Clone)]
pub struct OsClient {
    pub(super) http: Client,
    pub(super) token: String,
    pub(super) image_endpoint: Url,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    interface: String,
    url: String,
    #[serde(default)]
    region: Option<String>,
}

impl OsClient {
    /// Password-authenticate against Keystone v3 and resolve the public
    /// Image endpoint from the service catalog. Any failure here is fatal
    /// to the whole run; there is nothing useful to do without a token.
    pub async fn connect(profile: &CloudProfile) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("cloud-image-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build HTTP client")?;

        let auth = &profile.auth;
        let tokens_url = format!("{}/auth/tokens", auth.auth_url.trim_end_matches('/'));
        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": auth.username,
                            "domain": {"name": auth.user_domain_name},
                            "password": auth.password,
                        }
                    }
                },
                "scope": {
                    "project": {
                        "name": auth.project_name,
                        "domain": {"name": auth.project_domain_name},
                    }
                }
            }
        });

        let res = http
            .post(&tokens_url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {tokens_url}"))?;

        let status = res.status();
        if !status.is_success() {
            let detail = res.text().await.unwrap_or_default();
            bail!("authentication failed: HTTP {status}: {detail}");
        }

        let token = res
            .headers()
            .get("x-subject-token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .context("Keystone response carried no X-Subject-Token header")?;

        let parsed: TokenResponse = res.json().await.context("parse token response")?;
        let endpoint = find_image_endpoint(&parsed.token.catalog, profile.region_name.as_deref())
            .context("no public image endpoint in the service catalog")?;
        let image_endpoint = Url::parse(&endpoint)
            .with_context(|| format!("invalid image endpoint '{endpoint}'"))?;

        tracing::debug!(endpoint = %image_endpoint, "authenticated");
        Ok(Self {
            http,
            token,
            image_endpoint,
        })
    }

    /// Build a client from pre-resolved parts. Used by tests to point the
    /// image operations at a local server without a Keystone round-trip.
    pub fn from_parts(token: impl Into<String>, image_endpoint: Url) -> Self {
        Self {
            http: Client::new(),
            token: token.into(),
            image_endpoint,
        }
    }

    pub(super) fn image_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.image_endpoint.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn find_image_endpoint(catalog: &[CatalogEntry], region: Option<&str>) -> Option<String> {
    let mut candidates = catalog
        .iter()
        .filter(|e| e.service_type == "image")
        .flat_map(|e| e.endpoints.iter())
        .filter(|ep| ep.interface == "public");
    match region {
        Some(region) => candidates
            .find(|ep| ep.region.as_deref() == Some(region))
            .map(|ep| ep.url.clone()),
        None => candidates.next().map(|ep| ep.url.clone()),
    }
}
