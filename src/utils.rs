use std::sync::LazyLock;
use std::time::Duration;

use chrono::NaiveDateTime;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;

use crate::error::{QaError, Result};

/// Memento datetime layout: year, month, day, hour, minute, second.
pub const DATE_LAYOUT: &str = "%Y%m%d%H%M%S";

static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{14}$").unwrap());

/// Accepts only 14-digit timestamps naming a real calendar instant.
pub fn validate_timestamp(raw: &str) -> Result<String> {
    let ts = raw.trim();
    if !TIMESTAMP_RE.is_match(ts) || NaiveDateTime::parse_from_str(ts, DATE_LAYOUT).is_err() {
        return Err(QaError::InvalidTimestamp(raw.to_string()));
    }
    Ok(ts.to_string())
}

pub fn progress_bar(len: usize, label: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec})")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_message(label);
    pb
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
