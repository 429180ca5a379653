use std::env;
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};
use reqwest::Url;

/// Browser-like user agent; the catalog rejects obvious bots.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Status and body of one GET request.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Performs exactly one network call.
///
/// Implementations MUST NOT retry, sleep or interpret status
/// codes. Pacing, throttling and retries live in `FetchClient`
/// and the collectors above it.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<RawResponse>;
}

// ------------------------------------------------------------
// Proxy settings
// ------------------------------------------------------------
//
// Read from the environment:
// - USE_PROXY=true enables the proxy
// - PROXY_ENDPOINT / PROXY_USERNAME / PROXY_PASSWORD
//
// An incomplete configuration logs a warning and the run
// proceeds without a proxy.
//
#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub endpoint: String,
    pub username: String,
    pub password: String,
}

impl ProxySettings {
    pub fn from_env() -> Option<Self> {
        let enabled = env::var("USE_PROXY")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if !enabled {
            info!("Proxy disabled");
            return None;
        }

        match (
            env::var("PROXY_ENDPOINT"),
            env::var("PROXY_USERNAME"),
            env::var("PROXY_PASSWORD"),
        ) {
            (Ok(endpoint), Ok(username), Ok(password))
                if !endpoint.is_empty() && !username.is_empty() && !password.is_empty() =>
            {
                info!("Proxy enabled");
                Some(Self {
                    endpoint,
                    username,
                    password,
                })
            }
            _ => {
                warn!("Proxy configuration incomplete, proceeding without proxy");
                None
            }
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}@{}", self.username, self.password, self.endpoint)
    }
}

/// `Transport` backed by a shared `reqwest::Client`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, proxy: Option<ProxySettings>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT);

        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.url())?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<RawResponse> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(RawResponse { status, body })
    }
}
