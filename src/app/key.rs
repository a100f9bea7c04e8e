use crate::error::ArchiveError;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use url::Url;

/// How a URL maps to its storage key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// The URL's path component. Distinct hosts sharing a path collide.
    #[default]
    Path,
    /// Content-addressed layout over the sha256 of the full URL.
    UrlSha256,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KeyDeriver {
    strategy: KeyStrategy,
}

impl KeyDeriver {
    pub fn new(strategy: KeyStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> KeyStrategy {
        self.strategy
    }

    pub fn derive(&self, url: &str) -> Result<String, ArchiveError> {
        match self.strategy {
            KeyStrategy::Path => derive_key(url),
            KeyStrategy::UrlSha256 => {
                parse_absolute(url)?;
                let mut hasher = Sha256::new();
                hasher.update(url.as_bytes());
                let hex = hex::encode(hasher.finalize());
                Ok(format!("/sha256/{}/{}/{}", &hex[0..2], &hex[2..4], hex))
            }
        }
    }
}

/// Derives the storage key for `url`: its path component.
pub fn derive_key(url: &str) -> Result<String, ArchiveError> {
    let parsed = parse_absolute(url)?;
    let path = parsed.path();
    if path.is_empty() || path == "/" {
        return Err(invalid(url, "url has no path"));
    }
    Ok(path.to_string())
}

/// Parses `url` as an absolute URI that can carry a path.
///
/// The input is taken verbatim: surrounding whitespace and control characters
/// are rejected rather than stripped, since the raw string is what gets cached
/// and recorded.
pub fn parse_absolute(url: &str) -> Result<Url, ArchiveError> {
    if url.trim() != url {
        return Err(invalid(url, "url has surrounding whitespace"));
    }
    if url.chars().any(|c| c.is_control()) {
        return Err(invalid(url, "url contains control characters"));
    }
    let parsed = Url::parse(url).map_err(|e| invalid(url, &e.to_string()))?;
    if parsed.cannot_be_a_base() {
        return Err(invalid(url, "url is not hierarchical"));
    }
    Ok(parsed)
}

fn invalid(url: &str, reason: &str) -> ArchiveError {
    ArchiveError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_uses_path() {
        assert_eq!(derive_key("http://a.com/1234").unwrap(), "/1234");
        assert_eq!(derive_key("http://a.com/1/2/3/4").unwrap(), "/1/2/3/4");
        assert_eq!(
            derive_key("https://images.craigslist.org/00I0I_1gOqlQZz2O7_600x450.jpg?x=1#f").unwrap(),
            "/00I0I_1gOqlQZz2O7_600x450.jpg"
        );
    }

    #[test]
    fn test_derive_key_rejects_bad_input() {
        for url in [
            "",
            "not-a-url",
            "/relative/path",
            "mailto:someone@example.com",
            "http://a.com",
            "http://a.com/",
            " http://a.com/img.jpg",
            "http://a.com/img.jpg\n",
            "http://a.com/im\tg.jpg",
            "http://a.com/\u{7f}x",
        ] {
            let err = derive_key(url).unwrap_err();
            assert!(
                matches!(err, ArchiveError::InvalidUrl { .. }),
                "expected InvalidUrl for {:?}, got {:?}",
                url,
                err
            );
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn test_derive_key_keeps_percent_encoding() {
        assert_eq!(derive_key("http://a.com/a%20b.jpg").unwrap(), "/a%20b.jpg");
        // Raw spaces inside the path are encoded, not stripped
        assert_eq!(derive_key("http://a.com/a b.jpg").unwrap(), "/a%20b.jpg");
    }

    #[test]
    fn test_same_path_on_distinct_hosts_collides() {
        assert_eq!(
            derive_key("http://a.com/img.jpg").unwrap(),
            derive_key("http://b.org/img.jpg").unwrap()
        );
    }

    #[test]
    fn test_sha256_strategy_separates_hosts() {
        let deriver = KeyDeriver::new(KeyStrategy::UrlSha256);
        let a = deriver.derive("http://a.com/img.jpg").unwrap();
        let b = deriver.derive("http://b.org/img.jpg").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("/sha256/"));
        assert_eq!(a, deriver.derive("http://a.com/img.jpg").unwrap());
        // Host-only urls are addressable when hashing
        assert!(deriver.derive("http://a.com").is_ok());
        assert!(deriver.derive("").is_err());
    }
}
