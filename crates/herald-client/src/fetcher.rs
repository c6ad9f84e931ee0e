use std::net::IpAddr;
use std::time::Duration;

use herald_core::error::AppError;
use herald_core::models::FetchResult;
use herald_core::traits::FeedSource;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use url::Url;

use crate::parser::parse_feed;

/// Upper bound on a feed body (5 MiB).
pub const MAX_FEED_BYTES: usize = 5 * 1024 * 1024;

const ACCEPT_FEEDS: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.9, */*;q=0.8";

/// Feed source using reqwest.
///
/// Downloads and parses feed documents with a configurable timeout.
/// By default, SSRF protection is **enabled**: requests to private/reserved
/// IP ranges are blocked. Use [`allow_private_urls`](Self::allow_private_urls)
/// to disable this (e.g., for CLI usage where the user controls the machine).
#[derive(Clone)]
pub struct ReqwestFeedSource {
    client: Client,
    timeout_ms: u64,
    max_body_bytes: usize,
    ssrf_protection: bool,
}

impl ReqwestFeedSource {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(10))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let timeout_ms = herald_core::error::duration_ms(timeout);
        let client = Client::builder()
            .user_agent(concat!("Herald/", env!("CARGO_PKG_VERSION"), " (Feed Reader)"))
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::FetchError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_ms,
            max_body_bytes: MAX_FEED_BYTES,
            ssrf_protection: true,
        })
    }

    /// Disable SSRF protection, allowing requests to private/reserved IPs.
    ///
    /// Only use this for CLI usage where the user controls the machine.
    pub fn allow_private_urls(mut self) -> Self {
        self.ssrf_protection = false;
        self
    }

    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    fn map_send_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout_ms)
        } else if e.is_connect() {
            AppError::FetchError(format!("Connection failed: {e}"))
        } else {
            AppError::FetchError(e.to_string())
        }
    }
}

impl FeedSource for ReqwestFeedSource {
    async fn fetch(&self, url: &str) -> Result<FetchResult, AppError> {
        if self.ssrf_protection {
            validate_url(url).await?;
        }

        let mut response = self
            .client
            .get(url)
            .header(ACCEPT, ACCEPT_FEEDS)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        tracing::debug!(%url, %status, ?content_type, "Feed response received");

        if status != 200 {
            return Ok(FetchResult {
                status,
                content_type,
                document: Err(format!("HTTP {status} for {url}")),
            });
        }

        let too_large = || format!("Feed body exceeds {} bytes", self.max_body_bytes);
        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes as u64)
        {
            return Ok(FetchResult {
                status,
                content_type,
                document: Err(too_large()),
            });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.map_send_error(e))? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Ok(FetchResult {
                    status,
                    content_type,
                    document: Err(too_large()),
                });
            }
            body.extend_from_slice(&chunk);
        }

        let document = parse_feed(&body).map_err(|e| e.to_string());
        if let Err(error) = &document {
            tracing::debug!(%url, %error, "Feed body did not parse");
        }

        Ok(FetchResult {
            status,
            content_type,
            document,
        })
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Validate a URL to prevent server-side request forgery (SSRF).
///
/// 1. Only allow `http` and `https` schemes.
/// 2. Resolve the hostname via DNS.
/// 3. Reject if any resolved IP is private/reserved.
async fn validate_url(url: &str) -> Result<(), AppError> {
    let parsed =
        Url::parse(url).map_err(|e| AppError::InvalidFeedSource(format!("Invalid URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::InvalidFeedSource(format!(
                "URL scheme '{scheme}' is not allowed (only http/https)"
            )));
        }
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| AppError::InvalidFeedSource("URL has no host".to_string()))?;

    // IPv6 literals come back bracketed from host_str().
    let literal = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = literal.parse::<IpAddr>() {
        if is_private_ip(ip) {
            return Err(AppError::InvalidFeedSource(format!(
                "SSRF blocked: {host} resolves to private/reserved IP"
            )));
        }
        return Ok(());
    }

    let port = parsed.port_or_known_default().unwrap_or(80);
    let addrs: Vec<_> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| AppError::FetchError(format!("DNS resolution failed for {host}: {e}")))?
        .collect();

    if addrs.is_empty() {
        return Err(AppError::FetchError(format!(
            "DNS resolution returned no addresses for {host}"
        )));
    }

    for socket_addr in &addrs {
        if is_private_ip(socket_addr.ip()) {
            return Err(AppError::InvalidFeedSource(format!(
                "SSRF blocked: {host} resolves to private/reserved IP {}",
                socket_addr.ip()
            )));
        }
    }

    Ok(())
}

/// Check if an IP address is in a private/reserved/link-local range.
fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()           // 127.0.0.0/8
                || v4.is_private()     // 10/8, 172.16/12, 192.168/16
                || v4.is_link_local()  // 169.254.0.0/16
                || v4.is_unspecified() // 0.0.0.0
                || v4.is_broadcast()   // 255.255.255.255
                || v4.is_documentation()
                || v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64 // 100.64.0.0/10 (CGN)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fe80::/10
                || (v6.segments()[0] & 0xFFC0) == 0xFE80
                // fc00::/7
                || (v6.segments()[0] & 0xFE00) == 0xFC00
                || match v6.to_ipv4_mapped() {
                    Some(v4) => is_private_ip(IpAddr::V4(v4)),
                    None => false,
                }
        }
    }
}
