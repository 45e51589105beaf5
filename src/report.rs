use clap::ValueEnum;
use serde::Serialize;

use crate::record::ArchiveRecord;

/// Where a record lands in the report. Every record gets exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    Good,
    GoodUncaptured,
    NoResource,
    Noncompliant,
}

/// First matching rule wins.
pub fn classify(record: &ArchiveRecord) -> Group {
    match (record.is_compliant(), record.is_resolved(), record.is_captured()) {
        (true, true, true) => Group::Good,
        (true, true, false) => Group::GoodUncaptured,
        (true, false, _) => Group::NoResource,
        (false, _, _) => Group::Noncompliant,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Html,
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRow {
    pub archive_id: String,
    pub url: String,
    /// `None` renders as "not captured".
    pub capture: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub subject: String,
    pub timestamp: String,
    pub noncompliant: Vec<String>,
    pub no_resource: Vec<String>,
    pub good: Vec<SnapshotRow>,
}

impl Report {
    pub fn build(subject: &str, timestamp: &str, records: &[ArchiveRecord]) -> Self {
        let mut report = Report {
            subject: subject.to_string(),
            timestamp: timestamp.to_string(),
            ..Default::default()
        };

        for record in records {
            match classify(record) {
                Group::Good => report.good.push(SnapshotRow {
                    archive_id: record.archive_id.clone(),
                    url: record.current_url.clone(),
                    capture: Some(record.capture_ref().to_string()),
                }),
                Group::GoodUncaptured => report.good.push(SnapshotRow {
                    archive_id: record.archive_id.clone(),
                    url: record.current_url.clone(),
                    capture: None,
                }),
                Group::NoResource => report.no_resource.push(record.archive_id.clone()),
                Group::Noncompliant => report.noncompliant.push(record.archive_id.clone()),
            }
        }
        report
    }

    pub fn total(&self) -> usize {
        self.noncompliant.len() + self.no_resource.len() + self.good.len()
    }

    pub fn captured(&self) -> usize {
        self.good.iter().filter(|r| r.capture.is_some()).count()
    }

    pub fn render(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Html => self.to_html(),
            ReportFormat::Text => self.to_text(),
            ReportFormat::Json => serde_json::to_string_pretty(self).unwrap_or_default(),
        }
    }

    /// Noncompliant list, then compliant-without-resource, then the snapshot
    /// table. The order is part of the output contract.
    pub fn to_html(&self) -> String {
        let mut out = String::from("<b>Noncompliant Timegates</b><pre>");
        for id in &self.noncompliant {
            out.push_str(&escape_html(id));
            out.push_str("<br/>");
        }
        out.push_str("</pre><br/><b>Compliant but no resource</b><pre>");
        for id in &self.no_resource {
            out.push_str(&escape_html(id));
            out.push_str("<br/>");
        }
        out.push_str("</pre><br/><b>Good Timegates</b><br/>");

        out.push_str("<table><tr><th>uri</th><th>snapshot</th></tr>");
        for row in &self.good {
            let url = escape_html(&row.url);
            out.push_str(&format!(
                "<tr><td><a href='{}' target='_blank'>{}</a></td>",
                url, url
            ));
            match &row.capture {
                Some(capture) => {
                    out.push_str(&format!("<td><img src='{}'/></td></tr>", escape_html(capture)))
                }
                None => out.push_str("<td><b>not captured</b></td></tr>"),
            }
        }
        out.push_str("</table>");
        out
    }

    pub fn to_text(&self) -> String {
        let mut lines = vec![format!(
            "Timegates for {} at {} ({} archives, {} captured)",
            self.subject,
            self.timestamp,
            self.total(),
            self.captured()
        )];

        lines.push(String::new());
        lines.push(format!("Noncompliant Timegates ({})", self.noncompliant.len()));
        lines.extend(self.noncompliant.iter().map(|id| format!("  {}", id)));

        lines.push(String::new());
        lines.push(format!("Compliant but no resource ({})", self.no_resource.len()));
        lines.extend(self.no_resource.iter().map(|id| format!("  {}", id)));

        lines.push(String::new());
        lines.push(format!("Good Timegates ({})", self.good.len()));
        for row in &self.good {
            let status = if row.capture.is_some() {
                "captured"
            } else {
                "not captured"
            };
            lines.push(format!("  {:<16} {} [{}]", row.archive_id, row.url, status));
        }

        lines.join("\n")
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
