use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};
use url::Url;

use crate::capture::{capture_snapshots, CaptureStats, Capturer, CommandCapturer};
use crate::error::{QaError, Result};
use crate::probe::{HttpProber, Prober};
use crate::report::Report;
use crate::resolver::{resolve_snapshots, ResolveStats};
use crate::settings::Settings;
use crate::timemap::{fetch_timemap, timemap_url};
use crate::utils::validate_timestamp;

/// Bounds for one fan-out stage of a request.
#[derive(Debug, Clone, Copy)]
pub struct StageLimits {
    pub workers: usize,
    pub per_call: Duration,
    /// Shared by every stage of the request.
    pub deadline: Instant,
}

/// Everything a single request produced.
#[derive(Debug)]
pub struct Outcome {
    pub report: Report,
    pub resolve: ResolveStats,
    pub capture: CaptureStats,
}

/// Decode → resolve → capture → classify, for one subject at a time.
///
/// Holds only process-wide collaborators; the record collection lives and
/// dies inside `run_timegate`.
pub struct Pipeline {
    settings: Settings,
    prober: Arc<dyn Prober>,
    capturer: Option<Arc<dyn Capturer>>,
}

impl Pipeline {
    pub fn new(
        settings: Settings,
        prober: Arc<dyn Prober>,
        capturer: Option<Arc<dyn Capturer>>,
    ) -> Self {
        Self {
            settings,
            prober,
            capturer,
        }
    }

    /// Real network prober, and a screenshot capturer if one is installed.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let prober: Arc<dyn Prober> = Arc::new(HttpProber::new(&settings)?);
        let capturer: Option<Arc<dyn Capturer>> = match CommandCapturer::detect(&settings) {
            Ok(c) => Some(Arc::new(c)),
            Err(e) => {
                warn!("{}; snapshots will not be captured", e);
                None
            }
        };
        Ok(Self::new(settings, prober, capturer))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn capture_available(&self) -> bool {
        self.capturer.is_some()
    }

    pub fn prober(&self) -> &dyn Prober {
        self.prober.as_ref()
    }

    /// Subject URL for a request, falling back to `default_url`.
    pub fn subject(&self, requested: Option<&str>) -> Result<String> {
        let raw = requested
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or(self.settings.default_url.as_deref())
            .ok_or(QaError::MissingSubject)?;
        Url::parse(raw).map_err(|_| QaError::InvalidUrl(raw.to_string()))?;
        Ok(raw.to_string())
    }

    /// Run one request. Only an unusable timemap (or bad input) is an
    /// error; probe and capture failures show up in the report instead.
    pub async fn run_timegate(
        &self,
        subject: Option<&str>,
        timestamp: Option<&str>,
    ) -> Result<Outcome> {
        let subject = self.subject(subject)?;
        let timestamp = validate_timestamp(timestamp.unwrap_or(&self.settings.default_date))?;
        let deadline = Instant::now() + self.settings.request_timeout();

        let mut records = tokio::time::timeout_at(
            deadline,
            fetch_timemap(self.prober.as_ref(), &self.settings.timemap_base, &subject),
        )
        .await
        .map_err(|_| QaError::TimemapFetch {
            url: timemap_url(&self.settings.timemap_base, &subject),
            reason: "request deadline reached".into(),
        })??;

        let resolve = resolve_snapshots(
            &mut records,
            Arc::clone(&self.prober),
            &timestamp,
            Some(&subject),
            &StageLimits {
                workers: self.settings.workers(),
                per_call: self.settings.probe_timeout(),
                deadline,
            },
        )
        .await;

        let capture = capture_snapshots(
            &mut records,
            self.capturer.clone(),
            &StageLimits {
                workers: self.settings.workers(),
                per_call: self.settings.capture_timeout(),
                deadline,
            },
        )
        .await;

        let report = Report::build(&subject, &timestamp, &records);
        info!(
            "Report for {}: {} good, {} without resource, {} noncompliant",
            subject,
            report.good.len(),
            report.no_resource.len(),
            report.noncompliant.len()
        );

        Ok(Outcome {
            report,
            resolve,
            capture,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::TIMETRAVEL_BASE;
    use crate::fakes::{FakeCapturer, FakeProber};
    use crate::report::ReportFormat;

    const SUBJECT: &str = "http://www.archives.govt.nz/";
    const TS: &str = "20060102150405";
    const TIMEMAP: &str = r#"{
        "original_uri": "http://www.archives.govt.nz/",
        "timemap_uri": [
            {
                "archive_id": "ia",
                "uri": "http://web.archive.org/web/timemap/link/http://www.archives.govt.nz/",
                "memento_compliant": "yes"
            },
            {
                "archive_id": "nla",
                "uri": "http://webarchive.nla.gov.au/gov/timemap/http://www.archives.govt.nz/",
                "memento_compliant": "no"
            },
            {
                "archive_id": "archive-it",
                "uri": "http://wayback.archive-it.org/all/timemap/link/http://www.archives.govt.nz/",
                "memento_compliant": "yes"
            }
        ]
    }"#;
    const IA_PROBE: &str = "http://web.archive.org/web/20060102150405/http://www.archives.govt.nz/";
    const IA_SNAPSHOT: &str = "http://web.archive.org/web/20060110093211/http://www.archives.govt.nz/";

    fn subject_timemap() -> String {
        timemap_url(TIMETRAVEL_BASE, SUBJECT)
    }

    fn archive_prober() -> FakeProber {
        FakeProber::default()
            .with_body(&subject_timemap(), TIMEMAP)
            .with_redirect(IA_PROBE, IA_SNAPSHOT)
    }

    fn pipeline(prober: FakeProber, capturer: Option<Arc<FakeCapturer>>) -> Pipeline {
        Pipeline::new(
            Settings::default(),
            Arc::new(prober),
            capturer.map(|c| c as Arc<dyn Capturer>),
        )
    }

    #[tokio::test]
    async fn full_request() {
        let capturer = Arc::new(FakeCapturer::default());
        let p = pipeline(archive_prober(), Some(capturer.clone()));

        let outcome = p.run_timegate(Some(SUBJECT), Some(TS)).await.unwrap();
        let report = outcome.report;

        assert_eq!(report.total(), 3);
        assert_eq!(report.noncompliant, vec!["nla"]);
        assert_eq!(report.no_resource, vec!["archive-it"]);
        assert_eq!(report.good.len(), 1);
        assert_eq!(report.good[0].url, IA_SNAPSHOT);
        assert_eq!(report.good[0].capture, Some(format!("shot:{}", IA_SNAPSHOT)));
        assert_eq!(capturer.calls(), vec![IA_SNAPSHOT]);
        assert_eq!(outcome.resolve.probed, 2);
        assert_eq!(outcome.capture.captured, 1);
    }

    #[tokio::test]
    async fn noncompliant_archives_are_never_probed() {
        let prober = Arc::new(archive_prober());
        let p = Pipeline::new(Settings::default(), prober.clone(), None);
        p.run_timegate(Some(SUBJECT), Some(TS)).await.unwrap();

        let calls = prober.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.contains(&subject_timemap()));
        assert!(calls.iter().all(|c| !c.contains("nla.gov.au")));
    }

    #[tokio::test]
    async fn capture_unavailable_marks_not_captured() {
        let p = pipeline(archive_prober(), None);
        assert!(!p.capture_available());

        let outcome = p.run_timegate(Some(SUBJECT), Some(TS)).await.unwrap();
        assert_eq!(outcome.report.captured(), 0);
        assert_eq!(outcome.report.good.len(), 1);
        assert!(outcome.report.good[0].capture.is_none());
        assert!(outcome.report.render(ReportFormat::Html).contains("<b>not captured</b>"));
    }

    #[tokio::test]
    async fn archive_it_redirect_is_rewritten() {
        let prober = archive_prober().with_redirect(
            "http://wayback.archive-it.org/all/20060102150405/http://www.archives.govt.nz/",
            "/1079/20060315000000/http://www.archives.govt.nz/",
        );
        let p = pipeline(prober, None);

        let report = p.run_timegate(Some(SUBJECT), Some(TS)).await.unwrap().report;
        assert!(report.no_resource.is_empty());
        assert!(report.good.iter().any(|r| r.archive_id == "archive-it"
            && r.url == "http://wayback.archive-it.org/1079/20060315000000/http://www.archives.govt.nz/"));
    }

    #[tokio::test]
    async fn slow_timemap_hits_request_deadline() {
        let prober = archive_prober().with_delay(&subject_timemap(), Duration::from_secs(5));
        let settings = Settings {
            request_timeout_secs: 1,
            ..Default::default()
        };
        let p = Pipeline::new(settings, Arc::new(prober), None);

        match p.run_timegate(Some(SUBJECT), Some(TS)).await {
            Err(QaError::TimemapFetch { url, reason }) => {
                assert_eq!(url, subject_timemap());
                assert_eq!(reason, "request deadline reached");
            }
            other => panic!("expected deadline error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_timemap_fails_request() {
        let prober = FakeProber::default().with_body(&subject_timemap(), "<html>busy</html>");
        let p = pipeline(prober, None);
        let err = p.run_timegate(Some(SUBJECT), Some(TS)).await.unwrap_err();
        assert!(matches!(err, QaError::Decode(_)));
    }

    #[tokio::test]
    async fn requests_do_not_share_records() {
        let p = pipeline(archive_prober(), Some(Arc::new(FakeCapturer::default())));
        let first = p.run_timegate(Some(SUBJECT), Some(TS)).await.unwrap().report;
        let second = p.run_timegate(Some(SUBJECT), Some(TS)).await.unwrap().report;
        assert_eq!(first.total(), 3);
        assert_eq!(second.total(), 3);
        assert_eq!(first.to_html(), second.to_html());
    }

    #[tokio::test]
    async fn defaults_fill_missing_inputs() {
        let prober = FakeProber::default()
            .with_body(&subject_timemap(), TIMEMAP)
            .with_redirect(
                "http://web.archive.org/web/19000831231300/http://www.archives.govt.nz/",
                "http://web.archive.org/web/19961105000000/http://www.archives.govt.nz/",
            );
        let settings = Settings {
            default_url: Some(SUBJECT.to_string()),
            ..Default::default()
        };
        let p = Pipeline::new(settings, Arc::new(prober), None);

        let report = p.run_timegate(None, None).await.unwrap().report;
        assert_eq!(report.subject, SUBJECT);
        assert_eq!(report.timestamp, "19000831231300");
        assert_eq!(report.good.len(), 1);
    }

    #[tokio::test]
    async fn bad_inputs_are_rejected() {
        let p = pipeline(archive_prober(), None);
        assert!(matches!(p.run_timegate(None, Some(TS)).await, Err(QaError::MissingSubject)));
        assert!(matches!(
            p.run_timegate(Some("not a url"), Some(TS)).await,
            Err(QaError::InvalidUrl(_))
        ));
        assert!(matches!(
            p.run_timegate(Some(SUBJECT), Some("2006")).await,
            Err(QaError::InvalidTimestamp(_))
        ));
    }
}
