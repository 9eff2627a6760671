use reqwest::{header, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::{self, OrcidConfig};

use super::error::OrcidError;
use super::identifier::OrcidId;
use super::types::{ExpandedSearchResult, Funding, Fundings, Person, Record, TokenResponse, Work, Works};

/// Thin typed client over the ORCID public API and OAuth token endpoint.
#[derive(Clone)]
pub struct OrcidClient {
    http: reqwest::Client,
    public_api_url: String,
    oauth_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl OrcidClient {
    pub fn new(settings: &OrcidConfig) -> Result<Self, OrcidError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("orcid-plus-plus/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .gzip(true)
            .build()?;

        Ok(Self {
            http,
            public_api_url: settings.public_api_url.trim_end_matches('/').to_string(),
            oauth_url: settings.oauth_url.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
        })
    }

    /// Process-wide client built from the global config.
    pub fn shared() -> Result<&'static OrcidClient, OrcidError> {
        static INSTANCE: OnceLock<OrcidClient> = OnceLock::new();
        if let Some(client) = INSTANCE.get() {
            return Ok(client);
        }
        let client = OrcidClient::new(&config::config().orcid)?;
        Ok(INSTANCE.get_or_init(|| client))
    }

    pub async fn record(&self, id: &OrcidId) -> Result<Record, OrcidError> {
        self.get_json(&format!("{}/record", id), id).await
    }

    pub async fn person(&self, id: &OrcidId) -> Result<Person, OrcidError> {
        self.get_json(&format!("{}/person", id), id).await
    }

    pub async fn works(&self, id: &OrcidId) -> Result<Works, OrcidError> {
        self.get_json(&format!("{}/works", id), id).await
    }

    pub async fn work(&self, id: &OrcidId, put_code: i64) -> Result<Work, OrcidError> {
        self.get_json(&format!("{}/work/{}", id, put_code), id).await
    }

    pub async fn fundings(&self, id: &OrcidId) -> Result<Fundings, OrcidError> {
        self.get_json(&format!("{}/fundings", id), id).await
    }

    pub async fn funding(&self, id: &OrcidId, put_code: i64) -> Result<Funding, OrcidError> {
        self.get_json(&format!("{}/funding/{}", id, put_code), id).await
    }

    pub async fn expanded_search(&self, query: &str, start: u64, rows: u32) -> Result<ExpandedSearchResult, OrcidError> {
        let mut url = Url::parse(&format!("{}/expanded-search/", self.public_api_url))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("start", &start.to_string())
            .append_pair("rows", &rows.to_string());

        debug!("ORCID search: {}", url);
        let response = self.http.get(url).send().await?;
        Self::decode(response, query).await
    }

    /// Exchanges an OAuth authorization code for a token (three-legged `/authenticate` flow).
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse, OrcidError> {
        let (client_id, client_secret) = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => (id.as_str(), secret.as_str()),
            _ => return Err(OrcidError::NotConfigured),
        };

        let form = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        debug!("ORCID token exchange at {}", self.oauth_url);
        let response = self.http.post(&self.oauth_url).form(&form).send().await?;
        Self::decode(response, "oauth").await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, id: &OrcidId) -> Result<T, OrcidError> {
        let url = format!("{}/{}", self.public_api_url, path);
        debug!("ORCID GET {}", url);
        let response = self.http.get(&url).send().await?;
        Self::decode(response, id.as_str()).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response, subject: &str) -> Result<T, OrcidError> {
        let status = response.status();
        debug!("ORCID responded {} for {}", status, subject);
        match status {
            s if s.is_success() => {
                let bytes = response.bytes().await?;
                Ok(serde_json::from_slice(&bytes)?)
            }
            StatusCode::NOT_FOUND => Err(OrcidError::NotFound(subject.to_string())),
            StatusCode::CONFLICT | StatusCode::GONE => Err(OrcidError::Gone(subject.to_string())),
            other => {
                let body = response.text().await.unwrap_or_default();
                Err(OrcidError::Upstream {
                    status: other.as_u16(),
                    body: body.chars().take(500).collect(),
                })
            }
        }
    }
}
