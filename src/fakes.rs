//! In-memory stand-ins for the network and screenshot capabilities.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, LOCATION};

use crate::capture::Capturer;
use crate::error::{QaError, Result};
use crate::probe::{ProbeResponse, Prober};

/// Answers from a fixed table; unknown URLs fail like a refused connection.
#[derive(Default)]
pub struct FakeProber {
    responses: HashMap<String, ProbeResponse>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl FakeProber {
    pub fn with_body(mut self, url: &str, body: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            ProbeResponse {
                status: 200,
                headers: HeaderMap::new(),
                body: body.to_string(),
            },
        );
        self
    }

    pub fn with_redirect(mut self, url: &str, location: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_str(location).unwrap());
        self.responses.insert(
            url.to_string(),
            ProbeResponse {
                status: 302,
                headers,
                body: String::new(),
            },
        );
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses.insert(
            url.to_string(),
            ProbeResponse {
                status,
                ..Default::default()
            },
        );
        self
    }

    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn get(&self, url: &str) -> Result<ProbeResponse> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| QaError::probe(url, "connection refused"))
    }
}

/// Captures everything except the URLs it was told to fail on.
#[derive(Default)]
pub struct FakeCapturer {
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeCapturer {
    pub fn failing_on(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

#[async_trait]
impl Capturer for FakeCapturer {
    async fn capture(&self, url: &str) -> Result<String> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.failing.contains(url) {
            return Err(QaError::capture(url, "renderer crashed"));
        }
        Ok(format!("shot:{}", url))
    }
}
