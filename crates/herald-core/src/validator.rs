//! Accept/reject decisions for fetched feed sources.

use url::Url;

use crate::error::AppError;
use crate::models::{FetchResult, ParsedFeed};

/// Check the shape of a feed URL before any network traffic.
///
/// Only absolute `http`/`https` URLs with a host are accepted.
pub fn validate_feed_url(raw: &str) -> Result<Url, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidFeedSource("feed URL is empty".into()));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| AppError::InvalidFeedSource(format!("malformed URL '{trimmed}': {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(AppError::InvalidFeedSource(format!(
                "unsupported URL scheme '{other}'"
            )));
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(AppError::InvalidFeedSource(format!(
            "URL '{trimmed}' has no host"
        )));
    }

    Ok(url)
}

/// Decide whether a fetch result is an acceptable feed.
///
/// Accepted only when the status is exactly 200, the content type contains
/// the substring `xml`, and the body parsed. The first failing rule wins.
pub fn check(result: &FetchResult) -> Result<&ParsedFeed, AppError> {
    if result.status != 200 {
        return Err(AppError::InvalidFeedSource(format!(
            "HTTP status {} (expected 200)",
            result.status
        )));
    }

    match result.content_type.as_deref() {
        Some(content_type) if content_type.contains("xml") => {}
        Some(content_type) => {
            return Err(AppError::InvalidFeedSource(format!(
                "content type '{content_type}' is not XML"
            )));
        }
        None => {
            return Err(AppError::InvalidFeedSource(
                "response has no content type".into(),
            ));
        }
    }

    result
        .document
        .as_ref()
        .map_err(|e| AppError::ParseError(e.clone()))
}

/// Boolean form of [`check`].
pub fn validate(result: &FetchResult) -> bool {
    check(result).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: u16, content_type: Option<&str>) -> FetchResult {
        FetchResult {
            status,
            content_type: content_type.map(String::from),
            document: Ok(ParsedFeed {
                title: "Sample Feed".into(),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn accepts_200_with_xml_content_type() {
        assert!(validate(&result(200, Some("application/rss+xml; charset=utf-8"))));
        assert!(validate(&result(200, Some("text/xml"))));
        assert!(validate(&result(200, Some("xml"))));
        assert_eq!(
            check(&result(200, Some("application/atom+xml"))).unwrap().title,
            "Sample Feed"
        );
    }

    #[test]
    fn rejects_non_200_status() {
        for status in [201, 204, 301, 404, 500] {
            let err = check(&result(status, Some("application/xml"))).unwrap_err();
            assert!(matches!(err, AppError::InvalidFeedSource(_)), "{status}");
        }
    }

    #[test]
    fn rejects_non_xml_content_type() {
        assert!(!validate(&result(200, Some("application/json"))));
        assert!(!validate(&result(200, Some("text/html"))));
    }

    #[test]
    fn content_type_match_is_case_sensitive() {
        assert!(!validate(&result(200, Some("application/RSS+XML"))));
    }

    #[test]
    fn rejects_missing_content_type() {
        let err = check(&result(200, None)).unwrap_err();
        assert!(err.to_string().contains("no content type"));
    }

    #[test]
    fn status_is_checked_before_content_type() {
        let err = check(&result(404, Some("application/json"))).unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn rejects_unparseable_body() {
        let fetched = FetchResult {
            status: 200,
            content_type: Some("application/xml".into()),
            document: Err("unexpected end of document".into()),
        };
        let err = check(&fetched).unwrap_err();
        assert_eq!(err, AppError::ParseError("unexpected end of document".into()));
    }

    #[test]
    fn feed_url_shape() {
        assert!(validate_feed_url("http://example.org/rss").is_ok());
        assert!(validate_feed_url("  https://example.org/feed.xml ").is_ok());
        assert!(validate_feed_url("").is_err());
        assert!(validate_feed_url("not a url").is_err());
        assert!(validate_feed_url("ftp://example.org/rss").is_err());
        assert!(validate_feed_url("file:///etc/passwd").is_err());
    }
}
