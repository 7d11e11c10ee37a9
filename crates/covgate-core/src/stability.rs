//! Version stability classification for dependency upgrade candidates.
//!
//! A version is stable when it carries a release keyword (`RELEASE`, `FINAL`,
//! `GA`, case-insensitive) or consists only of digits, dots, commas, `v` and
//! hyphens, optionally ending in `-r`. Everything else (alpha, beta, rc,
//! snapshot, arbitrary qualifiers) is a pre-release.

use std::sync::OnceLock;

use regex::Regex;

const STABLE_KEYWORDS: [&str; 3] = ["RELEASE", "FINAL", "GA"];

fn numeric_version() -> Option<&'static Regex> {
    static NUMERIC: OnceLock<Option<Regex>> = OnceLock::new();
    NUMERIC
        .get_or_init(|| Regex::new(r"^[0-9,.v-]+(-r)?$").ok())
        .as_ref()
}

/// Whether `version` is release-grade.
pub fn is_stable(version: &str) -> bool {
    let upper = version.to_uppercase();
    let has_keyword = STABLE_KEYWORDS.iter().any(|k| upper.contains(k));
    has_keyword || numeric_version().is_some_and(|re| re.is_match(version))
}

/// Negation of [`is_stable`]; the rejection filter for upgrade proposals.
pub fn is_non_stable(version: &str) -> bool {
    !is_stable(version)
}
