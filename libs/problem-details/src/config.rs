//! Resolver configuration
//!
//! `ResolverConfig` is meant to be embedded in the host application's typed
//! configuration section; every field has a default so an empty section works.

use http::Uri;
use serde::{Deserialize, Serialize};

use crate::status::DEFAULT_TYPE_BASE_URI;

/// Errors reported by [`ResolverConfig::validate`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("type base URI must not be empty")]
    EmptyTypeBaseUri,
    #[error("invalid type base URI '{uri}': {source}")]
    InvalidTypeBaseUri {
        uri: String,
        #[source]
        source: http::uri::InvalidUri,
    },
    #[error("type base URI '{0}' must be absolute")]
    RelativeTypeBaseUri(String),
}

/// Which member records the occurrence of a problem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceField {
    /// The request URI, in `instance`.
    #[default]
    Instance,
    /// The time of resolution, in `timestamp`.
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Prefix of the canonical `type` URI; the status code is appended.
    pub type_base_uri: String,
    pub occurrence: OccurrenceField,
    /// Fill `stackTrace` with the error chain.
    pub capture_stack_trace: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            type_base_uri: DEFAULT_TYPE_BASE_URI.to_owned(),
            occurrence: OccurrenceField::Instance,
            capture_stack_trace: false,
        }
    }
}

impl ResolverConfig {
    /// Validate the configuration for consistency
    ///
    /// # Errors
    /// Returns `ConfigError` if the type base URI is empty, malformed or relative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.type_base_uri.is_empty() {
            return Err(ConfigError::EmptyTypeBaseUri);
        }
        let uri: Uri =
            self.type_base_uri
                .parse()
                .map_err(|source| ConfigError::InvalidTypeBaseUri {
                    uri: self.type_base_uri.clone(),
                    source,
                })?;
        if uri.scheme().is_none() {
            return Err(ConfigError::RelativeTypeBaseUri(self.type_base_uri.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_section_uses_defaults() {
        let config: ResolverConfig = serde_json::from_value(json!({})).unwrap();

        assert_eq!(config, ResolverConfig::default());
        assert_eq!(config.type_base_uri, "https://httpstatuses.io");
        assert_eq!(config.occurrence, OccurrenceField::Instance);
        assert!(!config.capture_stack_trace);
    }

    #[test]
    fn full_section_parses() {
        let config: ResolverConfig = serde_json::from_value(json!({
            "type_base_uri": "https://errors.example.com",
            "occurrence": "timestamp",
            "capture_stack_trace": true
        }))
        .unwrap();

        assert_eq!(config.type_base_uri, "https://errors.example.com");
        assert_eq!(config.occurrence, OccurrenceField::Timestamp);
        assert!(config.capture_stack_trace);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<ResolverConfig, _> =
            serde_json::from_value(json!({ "type_base": "https://x" }));
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_bad_base_uris() {
        let empty = ResolverConfig {
            type_base_uri: String::new(),
            ..ResolverConfig::default()
        };
        assert!(matches!(empty.validate(), Err(ConfigError::EmptyTypeBaseUri)));

        let malformed = ResolverConfig {
            type_base_uri: "http://exa mple.com".to_owned(),
            ..ResolverConfig::default()
        };
        assert!(matches!(
            malformed.validate(),
            Err(ConfigError::InvalidTypeBaseUri { .. })
        ));

        let relative = ResolverConfig {
            type_base_uri: "/problems".to_owned(),
            ..ResolverConfig::default()
        };
        assert!(matches!(
            relative.validate(),
            Err(ConfigError::RelativeTypeBaseUri(_))
        ));
    }
}
