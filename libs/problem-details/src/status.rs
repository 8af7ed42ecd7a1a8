//! Status code helpers: reason phrases and canonical problem type URIs

use http::StatusCode;

/// Base URI used for the `type` member when nothing else is configured.
pub const DEFAULT_TYPE_BASE_URI: &str = "https://httpstatuses.io";

/// Standard reason phrase for `status`, or an empty string for unknown codes.
#[must_use]
pub fn reason_phrase(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or_default()
}

/// Canonical type URI for `status`: `<base>/<status>`.
#[must_use]
pub fn type_uri(base: &str, status: u16) -> String {
    format!("{}/{status}", base.trim_end_matches('/'))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn reason_phrase_for_known_codes() {
        assert_eq!(reason_phrase(500), "Internal Server Error");
        assert_eq!(reason_phrase(404), "Not Found");
        assert_eq!(reason_phrase(409), "Conflict");
    }

    #[test]
    fn reason_phrase_is_empty_for_unknown_codes() {
        assert_eq!(reason_phrase(0), "");
        assert_eq!(reason_phrase(599), "");
        assert_eq!(reason_phrase(1000), "");
    }

    #[test]
    fn type_uri_joins_base_and_status() {
        assert_eq!(
            type_uri(DEFAULT_TYPE_BASE_URI, 400),
            "https://httpstatuses.io/400"
        );
        assert_eq!(
            type_uri("https://errors.example.com/", 502),
            "https://errors.example.com/502"
        );
    }
}
