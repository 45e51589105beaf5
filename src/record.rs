use serde::Serialize;

/// Upstream `memento_compliant` flag, decoded once at the timemap boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Compliance {
    Compliant,
    NotCompliant,
    #[default]
    Unknown,
}

impl Compliance {
    /// Maps `"yes"` / `"no"`; anything else is `None` so the caller can log it.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "yes" => Some(Self::Compliant),
            "no" => Some(Self::NotCompliant),
            _ => None,
        }
    }

    pub fn is_compliant(self) -> bool {
        self == Self::Compliant
    }
}

/// One archive's entry in a timemap, plus the state the pipeline adds to it.
///
/// `resolved` and `captured` only ever move from false to true, and a record
/// is only captured once it is both compliant and resolved.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveRecord {
    pub archive_id: String,
    pub source_url: String,
    pub timegate_url: String,
    /// Memento URI from the timemap, replaced by the snapshot URL on resolution.
    pub current_url: String,
    pub compliance: Compliance,
    resolved: bool,
    capture_ref: String,
    captured: bool,
}

impl ArchiveRecord {
    pub fn new(archive_id: &str, memento_uri: &str, compliance: Compliance) -> Self {
        Self {
            archive_id: archive_id.to_string(),
            current_url: memento_uri.to_string(),
            compliance,
            ..Default::default()
        }
    }

    pub fn is_compliant(&self) -> bool {
        self.compliance.is_compliant()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn is_captured(&self) -> bool {
        self.captured
    }

    pub fn capture_ref(&self) -> &str {
        &self.capture_ref
    }

    /// Worth probing: compliant and carrying a URL.
    pub fn wants_resolution(&self) -> bool {
        self.is_compliant() && !self.current_url.is_empty()
    }

    /// Worth capturing: compliant, resolved and not yet captured.
    pub fn wants_capture(&self) -> bool {
        self.is_compliant() && self.resolved && !self.captured
    }

    /// Records the snapshot URL. Empty targets are ignored.
    pub fn mark_resolved(&mut self, snapshot_url: String) -> bool {
        if snapshot_url.is_empty() {
            return false;
        }
        self.current_url = snapshot_url;
        self.resolved = true;
        true
    }

    /// Attaches a capture reference. Refused unless the record is compliant
    /// and resolved.
    pub fn mark_captured(&mut self, reference: String) -> bool {
        if !self.is_compliant() || !self.resolved || reference.is_empty() {
            return false;
        }
        self.capture_ref = reference;
        self.captured = true;
        true
    }
}
