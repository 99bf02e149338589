//! Fragment sources: how a fetch key becomes a URL and a body becomes a fragment.
//!
//! A [`FragmentSource`] is the small capability interface a data source
//! implements. The fetcher owns the network and retry concerns; the source
//! only knows its URL layout and wire format.

use serde::Deserialize;
use url::Url;

use super::FetchError;
use crate::fragment::Fragment;

/// URL building and response parsing for one kind of fragment source.
pub trait FragmentSource: Send + Sync + std::fmt::Debug {
    /// Builds the fetch URL for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidKey`] if `key` cannot be requested.
    fn build_fetch_url(&self, key: i64) -> Result<Url, FetchError>;

    /// Parses a 200 body into a fragment.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Malformed`] if the body does not match the schema.
    fn parse_response(&self, url: &Url, body: &[u8]) -> Result<Fragment, FetchError>;
}

/// Settings for the JSON fragment endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Host of the fragment service, with or without scheme.
    pub base_url: String,
    /// Endpoint path appended to the base URL.
    pub endpoint: String,
    /// Per-request timeout in milliseconds (0 leaves only the session timeouts).
    pub request_timeout_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://puzzle-server:8080".to_string(),
            endpoint: "/fragment".to_string(),
            request_timeout_ms: 500,
        }
    }
}

impl SourceConfig {
    /// Base URL plus endpoint. A base URL without scheme is treated as HTTPS.
    #[must_use]
    pub fn full_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            format!("{base}{}", self.endpoint)
        } else {
            format!("https://{base}{}", self.endpoint)
        }
    }
}

/// `GET <base><endpoint>?id=<key>` returning `{id, index, text}`.
#[derive(Debug, Clone)]
pub struct JsonFragmentSource {
    endpoint: Url,
}

impl JsonFragmentSource {
    /// Creates a source for `config`.
    ///
    /// # Errors
    ///
    /// Returns the URL parse error if the configured endpoint is not a valid URL.
    pub fn new(config: &SourceConfig) -> Result<Self, url::ParseError> {
        Ok(Self {
            endpoint: Url::parse(&config.full_url())?,
        })
    }

    /// The endpoint URL without query.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl FragmentSource for JsonFragmentSource {
    fn build_fetch_url(&self, key: i64) -> Result<Url, FetchError> {
        if key < 0 {
            return Err(FetchError::invalid_key(
                key,
                "fetch keys must be non-negative",
            ));
        }
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("id", &key.to_string());
        Ok(url)
    }

    fn parse_response(&self, url: &Url, body: &[u8]) -> Result<Fragment, FetchError> {
        serde_json::from_slice(body).map_err(|e| FetchError::malformed(url.as_str(), e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn source(base_url: &str) -> JsonFragmentSource {
        JsonFragmentSource::new(&SourceConfig {
            base_url: base_url.to_string(),
            ..SourceConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_full_url_keeps_explicit_scheme() {
        let config = SourceConfig {
            base_url: "http://puzzle-server:8080/".to_string(),
            ..SourceConfig::default()
        };
        assert_eq!(config.full_url(), "http://puzzle-server:8080/fragment");
    }

    #[test]
    fn test_full_url_defaults_to_https() {
        let config = SourceConfig {
            base_url: "test.com".to_string(),
            ..SourceConfig::default()
        };
        assert_eq!(config.full_url(), "https://test.com/fragment");
    }

    #[test]
    fn test_build_fetch_url_appends_id() {
        let url = source("https://test.com").build_fetch_url(123).unwrap();
        assert_eq!(url.as_str(), "https://test.com/fragment?id=123");
    }

    #[test]
    fn test_build_fetch_url_rejects_negative_key() {
        let result = source("https://test.com").build_fetch_url(-1);
        assert!(matches!(result, Err(FetchError::InvalidKey { key: -1, .. })));
    }

    #[test]
    fn test_parse_response_valid() {
        let source = source("https://test.com");
        let url = source.build_fetch_url(1).unwrap();
        let fragment = source
            .parse_response(&url, br#"{"id": 1, "index": 0, "text": "Hello"}"#)
            .unwrap();
        assert_eq!(fragment, Fragment::new(1, 0, "Hello"));
    }

    #[test]
    fn test_parse_response_schema_violation_is_malformed() {
        let source = source("https://test.com");
        let url = source.build_fetch_url(1).unwrap();
        for body in [
            &br#"{"invalid": "data"}"#[..],
            br#"{"id": "one", "index": 0, "text": "x"}"#,
            b"not json",
        ] {
            let result = source.parse_response(&url, body);
            assert!(matches!(result, Err(FetchError::Malformed { .. })));
        }
    }
}
