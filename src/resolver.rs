use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use url::{Position, Url};

use crate::error::{QaError, Result};
use crate::normalize::normalize;
use crate::pipeline::StageLimits;
use crate::probe::Prober;
use crate::record::ArchiveRecord;
use crate::utils::progress_bar;

/// Counts reported after a resolution pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolveStats {
    pub probed: usize,
    pub resolved: usize,
    pub failed: usize,
    pub abandoned: usize,
}

/// Timegate probe for one archive: everything before the `timemap` segment
/// of its memento URI, then the timestamp, then the subject URL.
pub fn probe_url(memento_uri: &str, timestamp: &str, subject: &str) -> String {
    format!("{}{}/{}", timegate_base(memento_uri), timestamp, subject)
}

/// Scheme, authority and path segments up to the first `timemap` segment,
/// with a trailing `/`. The whole URI when there is no such segment.
fn timegate_base(memento_uri: &str) -> String {
    let Ok(url) = Url::parse(memento_uri) else {
        return memento_uri.to_string();
    };
    let Some(segments) = url.path_segments() else {
        return memento_uri.to_string();
    };

    let mut base = format!("{}/", &url[..Position::BeforePath]);
    for segment in segments {
        if segment == "timemap" {
            return base;
        }
        base.push_str(segment);
        base.push('/');
    }
    memento_uri.to_string()
}

/// Point every compliant record at the snapshot nearest `timestamp`.
///
/// Probes run concurrently, bounded by `limits.workers`. A failed probe only
/// affects its own record. Probes still running at `limits.deadline` are
/// abandoned and their records stay unresolved.
pub async fn resolve_snapshots(
    records: &mut [ArchiveRecord],
    prober: Arc<dyn Prober>,
    timestamp: &str,
    subject_override: Option<&str>,
    limits: &StageLimits,
) -> ResolveStats {
    let semaphore = Arc::new(Semaphore::new(limits.workers.max(1)));
    let mut jobs = JoinSet::new();

    for (idx, record) in records.iter().enumerate() {
        if !record.wants_resolution() {
            continue;
        }
        let subject = match subject_override {
            Some(s) => s,
            None if !record.source_url.is_empty() => record.source_url.as_str(),
            None => {
                warn!(archive = %record.archive_id, "no subject url to probe for, skipping");
                continue;
            }
        };

        let url = probe_url(&record.current_url, timestamp, subject);
        let prober = Arc::clone(&prober);
        let sem = Arc::clone(&semaphore);
        let per_call = limits.per_call;

        jobs.spawn(async move {
            let _permit = sem.acquire().await.ok();
            let outcome = probe_one(prober.as_ref(), &url, per_call).await;
            (idx, outcome)
        });
    }

    let mut stats = ResolveStats {
        probed: jobs.len(),
        ..Default::default()
    };
    let pb = progress_bar(stats.probed, "probing");

    loop {
        let next = match tokio::time::timeout_at(limits.deadline, jobs.join_next()).await {
            Ok(next) => next,
            Err(_) => {
                stats.abandoned = jobs.len();
                warn!("request deadline reached, abandoning {} probes", stats.abandoned);
                jobs.abort_all();
                break;
            }
        };

        match next {
            None => break,
            Some(Ok((idx, Ok(snapshot)))) => {
                if records[idx].mark_resolved(snapshot) {
                    stats.resolved += 1;
                }
            }
            Some(Ok((idx, Err(e)))) => {
                warn!(archive = %records[idx].archive_id, "error probing archival uri: {}", e);
                stats.failed += 1;
            }
            Some(Err(e)) => {
                warn!("probe task failed: {}", e);
                stats.failed += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "Results for: {} potential mementos ({} probed, {} resolved, {} failed, {} abandoned)",
        records.len(),
        stats.probed,
        stats.resolved,
        stats.failed,
        stats.abandoned
    );
    stats
}

async fn probe_one(prober: &dyn Prober, url: &str, per_call: Duration) -> Result<String> {
    let response = tokio::time::timeout(per_call, prober.get(url))
        .await
        .map_err(|_| QaError::timeout(format!("probe of {}", url), per_call))??;

    match response.redirect_target() {
        Some(target) => Ok(normalize(url, target)),
        None => Err(QaError::probe(
            url,
            format!("status {} without a redirect Location", response.status),
        )),
    }
}
