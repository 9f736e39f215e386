// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings handed out by the trusted backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StoreCredentials {
    pub api_key: String,
    #[serde(default)]
    pub auth_domain: String,
    pub project_id: String,
    #[serde(default)]
    pub storage_bucket: String,
    #[serde(default)]
    pub messaging_sender_id: String,
    #[serde(default)]
    pub app_id: String,
}

impl StoreCredentials {
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            bail!("store config is missing projectId -- check the backend settings");
        }
        if self.api_key.trim().is_empty() {
            bail!("store config is missing apiKey -- check the backend settings");
        }
        Ok(())
    }
}

// Keeps the key out of logs.
impl fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("api_key", &"<redacted>")
            .field("auth_domain", &self.auth_domain)
            .field("project_id", &self.project_id)
            .field("storage_bucket", &self.storage_bucket)
            .field("messaging_sender_id", &self.messaging_sender_id)
            .field("app_id", &self.app_id)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    config_url: Url,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(config_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = config_url.trim();
        if trimmed.is_empty() {
            bail!("remote.config_url must not be empty");
        }
        let config_url = Url::parse(trimmed)
            .with_context(|| format!("remote.config_url {trimmed:?} is not a valid URL"))?;
        if !matches!(config_url.scheme(), "http" | "https") {
            bail!(
                "remote.config_url must use http or https, got {}://",
                config_url.scheme()
            );
        }
        if timeout.is_zero() {
            bail!("remote.timeout must be positive");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            config_url,
            timeout,
            http,
        })
    }

    pub fn config_url(&self) -> &str {
        self.config_url.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// One GET against the backend. Any failure here means the store cannot
    /// be reached this session.
    pub fn fetch_store_config(&self) -> Result<StoreCredentials> {
        debug!(url = %self.config_url, "fetching store config");
        let response = self
            .http
            .get(self.config_url.clone())
            .header("Accept", "application/json")
            .send()
            .map_err(|error| connection_error(self.config_url.as_str(), error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(status = status.as_u16(), "store config request rejected");
            return Err(clean_error_response(status, &body));
        }

        let credentials: StoreCredentials = response.json().context("decode store config")?;
        credentials.validate()?;
        info!(project = %credentials.project_id, "store config loaded");
        Ok(credentials)
    }
}

fn connection_error(url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check that the backend is running and remote.config_url is right ({})",
        url,
        error
    )
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(message) = parsed.error.or(parsed.detail)
        && !message.is_empty()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), message);
    }

    if body.len() < 100 && !body.contains('{') && !body.contains('<') {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::{Client, StoreCredentials, clean_error_response};
    use reqwest::StatusCode;
    use std::time::Duration;

    #[test]
    fn client_rejects_bad_urls() {
        for url in ["", "   ", "not a url", "ftp://example.com/config"] {
            assert!(
                Client::new(url, Duration::from_secs(1)).is_err(),
                "url {url:?}"
            );
        }
        assert!(Client::new("http://127.0.0.1:8000/cfg", Duration::ZERO).is_err());
    }

    #[test]
    fn credentials_require_project_and_key() {
        let mut credentials = StoreCredentials {
            api_key: "k".to_owned(),
            project_id: "shop".to_owned(),
            ..StoreCredentials::default()
        };
        assert!(credentials.validate().is_ok());

        credentials.project_id = " ".to_owned();
        assert!(credentials.validate().is_err());
    }

    #[test]
    fn debug_output_hides_api_key() {
        let credentials = StoreCredentials {
            api_key: "super-secret".to_owned(),
            project_id: "shop".to_owned(),
            ..StoreCredentials::default()
        };
        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("shop"));
    }

    #[test]
    fn error_bodies_are_condensed() {
        let json = clean_error_response(StatusCode::FORBIDDEN, r#"{"detail":"nope"}"#);
        assert_eq!(json.to_string(), "server error (403): nope");

        let plain = clean_error_response(StatusCode::BAD_GATEWAY, "upstream down\n");
        assert_eq!(plain.to_string(), "server error (502): upstream down");

        let html = clean_error_response(StatusCode::NOT_FOUND, "<html>missing</html>");
        assert_eq!(html.to_string(), "server returned 404");
    }
}
