//! Origin normalization.

use tracing::{debug, warn};
use url::Url;

use ezpass_protocols::OriginKey;

const FILE_SCHEME: &str = "file://";

/// Reduce a page address to its [`OriginKey`].
///
/// Total: never fails. `file://` addresses map to the `file` sentinel, a
/// missing scheme defaults to `http`, and an unparsable address falls back to
/// everything before the first `/`. The result may be empty; use
/// [`effective_origin`] where an empty key is not acceptable.
pub fn normalize(address: &str) -> OriginKey {
    if address.starts_with(FILE_SCHEME) {
        return OriginKey::file();
    }

    let candidate = if address.starts_with("http") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };

    match Url::parse(&candidate) {
        Ok(url) => {
            let host = url.host_str().unwrap_or_default().to_lowercase();
            let mut trimmed = host.as_str();
            while let Some(rest) = trimmed.strip_prefix("www.") {
                trimmed = rest;
            }
            OriginKey::from_normalized(trimmed)
        }
        Err(e) => {
            debug!("Address {:?} is not a URL ({}), using its first segment", address, e);
            let head = address.split('/').next().unwrap_or_default();
            OriginKey::from_normalized(head.to_lowercase())
        }
    }
}

/// [`normalize`], substituting the `file` sentinel for an empty result.
pub fn effective_origin(address: &str) -> OriginKey {
    let origin = normalize(address);
    if origin.is_empty() {
        warn!("Origin is empty for address {:?}, defaulting to 'file'", address);
        return OriginKey::file();
    }
    origin
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_www_and_lowercases() {
        assert_eq!(normalize("https://WWW.Example.com/x").as_str(), "example.com");
    }

    #[test]
    fn test_file_scheme_is_sentinel() {
        assert_eq!(normalize("file:///tmp/x.html").as_str(), "file");
        assert!(normalize("file:///tmp/x.html").is_file());
    }

    #[test]
    fn test_missing_scheme_defaults_to_http() {
        assert_eq!(normalize("example.com/login").as_str(), "example.com");
        assert_eq!(normalize("www.Shop.example.org").as_str(), "shop.example.org");
    }

    #[test]
    fn test_keeps_subdomains_and_drops_port() {
        assert_eq!(
            normalize("https://accounts.example.com:8443/signin?next=/").as_str(),
            "accounts.example.com"
        );
    }

    #[test]
    fn test_repeated_www_is_removed() {
        assert_eq!(normalize("https://www.www.example.com/x").as_str(), "example.com");
    }

    #[test]
    fn test_only_leading_www_is_removed() {
        assert_eq!(normalize("http://wwwexample.com").as_str(), "wwwexample.com");
        assert_eq!(normalize("http://a.www.example.com").as_str(), "a.www.example.com");
    }

    #[test]
    fn test_unparsable_falls_back_to_first_segment() {
        // `http` prefix but not a valid URL.
        assert_eq!(normalize("httpFoo Bar/path").as_str(), "httpfoo bar");
        assert_eq!(normalize("http://[::1/x").as_str(), "http:");
    }

    #[test]
    fn test_idempotent() {
        for address in [
            "https://WWW.Example.com/x",
            "example.com",
            "http://localhost:3000/app",
            "file:///tmp/a.html",
            "https://sub.domain.example.co.uk/",
            "https://www.www.example.com/x",
            "WWW.www.Example.com",
        ] {
            let once = normalize(address);
            let twice = normalize(once.as_str());
            assert_eq!(once, twice, "not idempotent for {}", address);
        }
    }

    #[test]
    fn test_empty_is_substituted() {
        assert!(normalize("").is_empty());
        assert_eq!(effective_origin("").as_str(), "file");
        assert_eq!(effective_origin("https://example.com").as_str(), "example.com");
    }
}
