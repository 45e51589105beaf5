use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{QaError, Result};
use crate::probe::Prober;
use crate::record::{ArchiveRecord, Compliance};

/// Timemap location for `subject` under an aggregator base.
pub fn timemap_url(base: &str, subject: &str) -> String {
    format!("{}{}", base, subject)
}

/// Fetch and decode the timemap for `subject`. Network failures and
/// non-JSON bodies fail the request.
pub async fn fetch_timemap(
    prober: &dyn Prober,
    base: &str,
    subject: &str,
) -> Result<Vec<ArchiveRecord>> {
    let url = timemap_url(base, subject);
    info!("Fetching timemap: {}", url);

    let response = prober.get(&url).await.map_err(|e| QaError::TimemapFetch {
        url: url.clone(),
        reason: e.to_string(),
    })?;

    let records = decode(&response.body)?;
    info!("Timemap listed {} archive records", records.len());
    Ok(records)
}

/// Parse raw timemap text into a flat list of records.
pub fn decode(raw: &str) -> Result<Vec<ArchiveRecord>> {
    let tree: Value = serde_json::from_str(raw)?;
    Ok(flatten(&tree))
}

/// Depth-first walk over an already-parsed tree.
pub fn flatten(tree: &Value) -> Vec<ArchiveRecord> {
    let mut out = Vec::new();
    visit(tree, &mut out);
    out
}

fn visit(node: &Value, out: &mut Vec<ArchiveRecord>) {
    match node {
        Value::Object(map) => visit_object(map, out),
        Value::Array(items) => {
            for item in items {
                visit(item, out);
            }
        }
        Value::Number(n) => debug!("number {} outside an archive entry, ignored", n),
        Value::String(_) | Value::Bool(_) | Value::Null => {}
    }
}

const KNOWN_FIELDS: &[&str] = &[
    "uri",
    "archive_id",
    "memento_compliant",
    "original_uri",
    "timegate_uri",
];

/// Builds at most one record from the object's own string fields; nested
/// arrays are walked as independent sub-trees. Nested objects are not.
fn visit_object(map: &Map<String, Value>, out: &mut Vec<ArchiveRecord>) {
    let mut record = ArchiveRecord::default();

    for (key, value) in map {
        match value {
            Value::String(s) => apply_field(&mut record, key, s),
            Value::Array(_) => visit(value, out),
            Value::Number(n) => debug!(field = %key, "numeric value {} ignored", n),
            Value::Object(_) | Value::Bool(_) | Value::Null => {
                warn!(field = %key, "{}, check memento version", field_problem(key))
            }
        }
    }

    if !record.current_url.is_empty() {
        out.push(record);
    }
}

/// A non-string value under `key` is malformed if the key is one we read.
fn field_problem(key: &str) -> &'static str {
    if KNOWN_FIELDS.contains(&key) {
        "malformed API field"
    } else {
        "unknown API field"
    }
}

fn apply_field(record: &mut ArchiveRecord, key: &str, value: &str) {
    match key {
        "uri" => match Url::parse(value) {
            Ok(u) => record.current_url = u.to_string(),
            Err(e) => {
                warn!("Problem parsing URI sent by time travel, URI will be blank: {} ({})", value, e);
                record.current_url.clear();
            }
        },
        "archive_id" => record.archive_id = value.to_string(),
        "memento_compliant" => match Compliance::parse(value) {
            Some(c) => record.compliance = c,
            None => warn!(value, "unknown compliance status"),
        },
        "original_uri" => record.source_url = value.to_string(),
        "timegate_uri" => record.timegate_url = value.to_string(),
        other => warn!(field = other, value, "unknown API field, check memento version"),
    }
}
