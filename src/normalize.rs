use tracing::debug;
use url::Url;

/// Archive whose timegate answers relative to a shared "all captures"
/// namespace. The redirect target is re-rooted on the archive's own base.
pub struct ArchiveRule {
    pub name: &'static str,
    /// Host and path prefix of the probe URL, without scheme.
    pub prefix: &'static str,
    /// Path segment that separates the archive base from the namespace.
    pub marker: &'static str,
}

/// New quirks go here as extra entries; the fallthrough stays untouched.
pub const RULES: &[ArchiveRule] = &[ArchiveRule {
    name: "archive-it",
    prefix: "wayback.archive-it.org/all/",
    marker: "/all/",
}];

impl ArchiveRule {
    pub fn matches(&self, probe_url: &str) -> bool {
        strip_scheme(probe_url).starts_with(self.prefix)
    }

    pub fn rewrite(&self, probe_url: &str, target: &str) -> String {
        let base = probe_url.split(self.marker).next().unwrap_or(probe_url);
        let remainder = path_and_query(target);
        if remainder.starts_with('/') {
            format!("{}{}", base, remainder)
        } else {
            format!("{}/{}", base, remainder)
        }
    }
}

/// The URL to record for a probe whose timegate redirected to `target`.
pub fn normalize(probe_url: &str, target: &str) -> String {
    normalize_with(RULES, probe_url, target)
}

pub fn normalize_with(rules: &[ArchiveRule], probe_url: &str, target: &str) -> String {
    match rules.iter().find(|r| r.matches(probe_url)) {
        Some(rule) => {
            let rewritten = rule.rewrite(probe_url, target);
            debug!(rule = rule.name, target, rewritten = %rewritten, "redirect target re-rooted");
            rewritten
        }
        None => target.to_string(),
    }
}

fn strip_scheme(url: &str) -> &str {
    url.split_once("://").map(|(_, rest)| rest).unwrap_or(url)
}

fn path_and_query(target: &str) -> String {
    match Url::parse(target) {
        Ok(u) => match u.query() {
            Some(q) => format!("{}?{}", u.path(), q),
            None => u.path().to_string(),
        },
        Err(_) => target.to_string(),
    }
}
