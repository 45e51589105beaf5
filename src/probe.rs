use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, LOCATION};
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::debug;

use crate::error::{QaError, Result};
use crate::settings::Settings;

/// What an archive answered to a single GET.
#[derive(Debug, Clone, Default)]
pub struct ProbeResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl ProbeResponse {
    /// Header value as text, empty when absent or not valid UTF-8.
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    /// Non-empty `Location` of a redirect response.
    pub fn redirect_target(&self) -> Option<&str> {
        if !(300..400).contains(&self.status) {
            return None;
        }
        let location = self.header(LOCATION.as_str()).trim();
        (!location.is_empty()).then_some(location)
    }
}

/// GET without following redirects. Used for the timemap fetch and for
/// every timegate probe.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn get(&self, url: &str) -> Result<ProbeResponse>;
}

pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .redirect(Policy::none())
            .user_agent(settings.user_agent.clone())
            .timeout(settings.probe_timeout())
            .build()
            .map_err(|e| QaError::probe("<client>", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn get(&self, url: &str) -> Result<ProbeResponse> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "*/*")
            .send()
            .await
            .map_err(|e| QaError::probe(url, e))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| QaError::probe(url, e))?;
        debug!(url, status, bytes = body.len(), "probe answered");

        Ok(ProbeResponse {
            status,
            headers,
            body,
        })
    }
}
