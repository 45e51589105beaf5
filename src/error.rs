use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QaError>;

/// Failures raised while answering one timegate request.
///
/// Only `TimemapFetch` and `Decode` abort a request once the pipeline has
/// started. The rest are absorbed into per-record state by the stage that hit
/// them.
#[derive(Debug, Error)]
pub enum QaError {
    #[error("failed to fetch timemap {url}: {reason}")]
    TimemapFetch { url: String, reason: String },

    #[error("timemap is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("probe of {url} failed: {reason}")]
    Probe { url: String, reason: String },

    #[error("{what} timed out after {:.1}s", .after.as_secs_f64())]
    Timeout { what: String, after: Duration },

    #[error("capture of {url} failed: {reason}")]
    Capture { url: String, reason: String },

    #[error("capture capability unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("invalid timestamp {0:?}, expected 14 digits (YYYYMMDDhhmmss)")]
    InvalidTimestamp(String),

    #[error("invalid url {0:?}")]
    InvalidUrl(String),

    #[error("no subject url given and no default_url configured")]
    MissingSubject,
}

impl QaError {
    pub fn probe(url: &str, reason: impl ToString) -> Self {
        Self::Probe {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn capture(url: &str, reason: impl ToString) -> Self {
        Self::Capture {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            after,
        }
    }
}
