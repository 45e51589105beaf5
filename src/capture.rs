use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::{QaError, Result};
use crate::pipeline::StageLimits;
use crate::record::ArchiveRecord;
use crate::settings::Settings;
use crate::utils::progress_bar;

/// Produces a visual record of a page, returned as an opaque reference.
#[async_trait]
pub trait Capturer: Send + Sync {
    async fn capture(&self, url: &str) -> Result<String>;
}

/// Screenshots through an external headless browser.
#[derive(Debug, Clone)]
pub struct CommandCapturer {
    bin: PathBuf,
    args: String,
    timeout: Duration,
}

impl CommandCapturer {
    /// Locate the browser binary. Run once at startup: an error here turns
    /// capture off for the life of the process.
    pub fn detect(settings: &Settings) -> Result<Self> {
        if !settings.capture_enabled {
            return Err(QaError::CaptureUnavailable("disabled by configuration".into()));
        }
        let bin = which::which(&settings.capture_bin).map_err(|e| {
            QaError::CaptureUnavailable(format!("{}: {}", settings.capture_bin, e))
        })?;
        info!("Capture capability available: {}", bin.display());
        Ok(Self {
            bin,
            args: settings.capture_args.clone(),
            timeout: settings.capture_timeout(),
        })
    }
}

#[async_trait]
impl Capturer for CommandCapturer {
    async fn capture(&self, url: &str) -> Result<String> {
        let dir = tempfile::tempdir().map_err(|e| QaError::capture(url, e))?;
        let output = dir.path().join("snapshot.png");

        let mut cmd = Command::new(&self.bin);
        cmd.args(expand_args(&self.args, &output, url))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let out = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| QaError::timeout(format!("capture of {}", url), self.timeout))?
            .map_err(|e| QaError::capture(url, e))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(QaError::capture(url, format!("{}: {}", out.status, stderr.trim())));
        }

        let bytes = tokio::fs::read(&output)
            .await
            .map_err(|e| QaError::capture(url, format!("no screenshot written: {}", e)))?;
        if bytes.is_empty() {
            return Err(QaError::capture(url, "empty screenshot"));
        }
        Ok(png_data_uri(&bytes))
    }
}

fn expand_args(template: &str, output: &Path, url: &str) -> Vec<String> {
    let output = output.to_string_lossy();
    template
        .split_whitespace()
        .map(|arg| arg.replace("{output}", &output).replace("{url}", url))
        .collect()
}

fn png_data_uri(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStats {
    pub attempted: usize,
    pub captured: usize,
    pub failed: usize,
    pub abandoned: usize,
}

/// Capture every compliant, resolved record. With no capturer nothing is
/// attempted and every such record stays "not captured".
pub async fn capture_snapshots(
    records: &mut [ArchiveRecord],
    capturer: Option<Arc<dyn Capturer>>,
    limits: &StageLimits,
) -> CaptureStats {
    let Some(capturer) = capturer else {
        info!("Capture capability unavailable, snapshots will be reported as not captured");
        return CaptureStats::default();
    };

    info!("making screenshots");
    let semaphore = Arc::new(Semaphore::new(limits.workers.max(1)));
    let mut jobs = JoinSet::new();

    for (idx, record) in records.iter().enumerate() {
        if !record.wants_capture() {
            continue;
        }
        let url = record.current_url.clone();
        let capturer = Arc::clone(&capturer);
        let sem = Arc::clone(&semaphore);
        let per_call = limits.per_call;

        jobs.spawn(async move {
            let _permit = sem.acquire().await.ok();
            let outcome = match tokio::time::timeout(per_call, capturer.capture(&url)).await {
                Ok(result) => result,
                Err(_) => Err(QaError::timeout(format!("capture of {}", url), per_call)),
            };
            (idx, outcome)
        });
    }

    let mut stats = CaptureStats {
        attempted: jobs.len(),
        ..Default::default()
    };
    let pb = progress_bar(stats.attempted, "capturing");

    loop {
        let next = match tokio::time::timeout_at(limits.deadline, jobs.join_next()).await {
            Ok(next) => next,
            Err(_) => {
                stats.abandoned = jobs.len();
                warn!("request deadline reached, abandoning {} captures", stats.abandoned);
                jobs.abort_all();
                break;
            }
        };

        match next {
            None => break,
            Some(Ok((idx, Ok(reference)))) => {
                if records[idx].mark_captured(reference) {
                    stats.captured += 1;
                }
            }
            Some(Ok((idx, Err(e)))) => {
                warn!("error creating screenshot for {}: {}", records[idx].current_url, e);
                stats.failed += 1;
            }
            Some(Err(e)) => {
                warn!("capture task failed: {}", e);
                stats.failed += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "{} screenshots made ({} attempted, {} failed, {} abandoned)",
        stats.captured, stats.attempted, stats.failed, stats.abandoned
    );
    stats
}
