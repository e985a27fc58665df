//! Release requests encoded in issue titles.
//!
//! An issue titled `release plotly vX.Y.Z` (any letter case, `v` optional)
//! asks the mirror to publish that version. Any other title is ignored.

use std::sync::LazyLock;

use regex::Regex;

/// Human-readable form of the accepted title, for log hints.
pub const TITLE_FORMAT: &str = "release plotly vX.Y.Z";

// ASCII digits only; `\d` would also accept other scripts' digits.
static RELEASE_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^release plotly (v?[0-9]+\.[0-9]+\.[0-9]+)$")
        .expect("release title pattern is a valid regex")
});

/// Extracts the requested version from an issue title.
///
/// The version is returned as written (`"v2.10.0"` or `"2.10.0"`); callers
/// validate and normalize it.
pub fn requested_version(title: &str) -> Option<String> {
    RELEASE_TITLE
        .captures(title)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_any_letter_case() {
        assert_eq!(
            requested_version("Release Plotly v2.10.0").as_deref(),
            Some("v2.10.0")
        );
        assert_eq!(
            requested_version("RELEASE PLOTLY 2.10.0").as_deref(),
            Some("2.10.0")
        );
    }

    #[test]
    fn ignores_unrelated_titles() {
        assert_eq!(requested_version("fix bug"), None);
        assert_eq!(requested_version("release plotly"), None);
        assert_eq!(requested_version("release plotly v2.10"), None);
    }

    #[test]
    fn requires_the_whole_title_to_match() {
        assert_eq!(requested_version("please release plotly v2.10.0"), None);
        assert_eq!(requested_version("release plotly v2.10.0 soon"), None);
    }

    #[test]
    fn rejects_non_ascii_digits() {
        assert_eq!(requested_version("release plotly v\u{662}.\u{661}\u{660}.\u{660}"), None);
        assert_eq!(requested_version("release plotly \u{ff12}.5.0"), None);
    }
}
