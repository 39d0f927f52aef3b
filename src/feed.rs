//! HTTP fetcher for the published AWS IP range feed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use ipnet::Ipv4Net;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::error::SyncError;

/// Published AWS IP range document
pub const AWS_IP_RANGES_URL: &str = "https://ip-ranges.amazonaws.com/ip-ranges.json";

/// Service tag of CloudFront edge ranges in the feed
pub const CLOUDFRONT_SERVICE: &str = "CLOUDFRONT";

const TIMEOUT_SECS: u64 = 30;

/// Maximum feed size (10 MB)
/// The AWS document is ~2 MB today
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024;

/// Source of the CIDR blocks that should be allowed in
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// Fetch the current set of qualifying CIDR blocks
    async fn fetch(&self) -> Result<BTreeSet<Ipv4Net>, SyncError>;
}

/// HTTP client for the AWS IP range feed
pub struct Fetcher {
    client: Client,
    url: String,
}

impl Fetcher {
    /// Create a fetcher for the given feed URL
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(format!("cfsync/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Download the feed document with size validation
    async fn fetch_document(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", self.url))?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP {} from {}", response.status(), self.url);
        }

        if let Some(content_length) = response.content_length() {
            if exceeds_feed_limit(content_length) {
                anyhow::bail!(
                    "Response too large: {} bytes (max: {} bytes)",
                    content_length,
                    MAX_FEED_SIZE
                );
            }
        }

        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        // Content-Length may be absent
        if exceeds_feed_limit(body.len() as u64) {
            anyhow::bail!(
                "Downloaded content too large: {} bytes (max: {} bytes)",
                body.len(),
                MAX_FEED_SIZE
            );
        }

        debug!("Downloaded {} bytes from {}", body.len(), self.url);
        Ok(body)
    }
}

fn exceeds_feed_limit(len: u64) -> bool {
    len > MAX_FEED_SIZE as u64
}

#[async_trait]
impl RangeSource for Fetcher {
    async fn fetch(&self) -> Result<BTreeSet<Ipv4Net>, SyncError> {
        info!("Fetching IP ranges from {}...", self.url);

        let body = self
            .fetch_document()
            .await
            .map_err(|e| SyncError::FeedUnavailable(format!("{:#}", e)))?;

        let cidrs = parse_ip_ranges(&body, CLOUDFRONT_SERVICE)?;
        info!("Fetched {} {} ranges", cidrs.len(), CLOUDFRONT_SERVICE);
        Ok(cidrs)
    }
}

/// Parse the AWS `ip-ranges.json` document, keeping IPv4 prefixes tagged with `service`.
///
/// Entries with another service tag, a missing field, or a prefix that is not
/// an IPv4 CIDR are skipped. Only a document that is not a JSON object is an error.
pub fn parse_ip_ranges(content: &str, service: &str) -> Result<BTreeSet<Ipv4Net>, SyncError> {
    let document: Value = serde_json::from_str(content)
        .map_err(|e| SyncError::FeedUnavailable(format!("Invalid JSON: {}", e)))?;

    let object = document
        .as_object()
        .ok_or_else(|| SyncError::FeedUnavailable("Document is not a JSON object".to_string()))?;

    let prefixes = object
        .get("prefixes")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let cidrs = prefixes
        .iter()
        .filter(|entry| entry.get("service").and_then(Value::as_str) == Some(service))
        .filter_map(|entry| entry.get("ip_prefix").and_then(Value::as_str))
        .filter_map(|prefix| prefix.parse::<Ipv4Net>().ok())
        .collect();

    Ok(cidrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "syncToken": "1700000000",
        "createDate": "2024-01-01-00-00-00",
        "prefixes": [
            {"ip_prefix": "13.32.0.0/15", "region": "GLOBAL", "service": "CLOUDFRONT"},
            {"ip_prefix": "13.32.0.0/15", "region": "GLOBAL", "service": "AMAZON"},
            {"ip_prefix": "52.84.0.0/15", "region": "GLOBAL", "service": "CLOUDFRONT"},
            {"ip_prefix": "3.5.140.0/22", "region": "ap-northeast-2", "service": "S3"}
        ],
        "ipv6_prefixes": [
            {"ipv6_prefix": "2600:9000::/28", "region": "GLOBAL", "service": "CLOUDFRONT"}
        ]
    }"#;

    fn net(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_keeps_only_service() {
        let cidrs = parse_ip_ranges(SAMPLE, CLOUDFRONT_SERVICE).unwrap();
        assert_eq!(cidrs.len(), 2);
        assert!(cidrs.contains(&net("13.32.0.0/15")));
        assert!(cidrs.contains(&net("52.84.0.0/15")));
    }

    #[test]
    fn test_parse_drops_invalid_prefix() {
        let content = r#"{"prefixes": [
            {"ip_prefix": "not-an-ip", "service": "CLOUDFRONT"},
            {"ip_prefix": "13.32.0.0", "service": "CLOUDFRONT"},
            {"ip_prefix": "300.1.1.1/16", "service": "CLOUDFRONT"},
            {"ip_prefix": "1.2.3.0/24", "service": "CLOUDFRONT"}
        ]}"#;
        let cidrs = parse_ip_ranges(content, CLOUDFRONT_SERVICE).unwrap();
        assert_eq!(cidrs.len(), 1);
        assert!(cidrs.contains(&net("1.2.3.0/24")));
    }

    #[test]
    fn test_parse_drops_malformed_entries() {
        let content = r#"{"prefixes": [
            {"service": "CLOUDFRONT"},
            {"ip_prefix": "1.2.3.0/24"},
            {"ip_prefix": 42, "service": "CLOUDFRONT"},
            {"ip_prefix": "1.2.3.0/24", "service": ["CLOUDFRONT"]},
            "garbage",
            null
        ]}"#;
        let cidrs = parse_ip_ranges(content, CLOUDFRONT_SERVICE).unwrap();
        assert!(cidrs.is_empty());
    }

    #[test]
    fn test_parse_missing_prefixes_is_empty() {
        let cidrs = parse_ip_ranges(r#"{"syncToken": "1"}"#, CLOUDFRONT_SERVICE).unwrap();
        assert!(cidrs.is_empty());
    }

    #[test]
    fn test_parse_deduplicates() {
        let content = r#"{"prefixes": [
            {"ip_prefix": "1.2.3.0/24", "service": "CLOUDFRONT"},
            {"ip_prefix": "1.2.3.0/24", "service": "CLOUDFRONT"}
        ]}"#;
        assert_eq!(parse_ip_ranges(content, CLOUDFRONT_SERVICE).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_invalid_json_is_feed_error() {
        let result = parse_ip_ranges("<html>502 Bad Gateway</html>", CLOUDFRONT_SERVICE);
        assert!(matches!(result, Err(SyncError::FeedUnavailable(_))));
    }

    #[test]
    fn test_parse_non_object_is_feed_error() {
        let result = parse_ip_ranges("[]", CLOUDFRONT_SERVICE);
        assert!(matches!(result, Err(SyncError::FeedUnavailable(_))));
    }

    #[test]
    fn test_feed_limit() {
        assert!(!exceeds_feed_limit(2 * 1024 * 1024));
        assert!(!exceeds_feed_limit(MAX_FEED_SIZE as u64));
        assert!(exceeds_feed_limit(MAX_FEED_SIZE as u64 + 1));
        // Would wrap to 1 if narrowed to a 32-bit usize
        assert!(exceeds_feed_limit((1u64 << 32) + 1));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_is_feed_error() {
        // Nothing listens on the discard port of localhost
        let fetcher = Fetcher::new("http://127.0.0.1:9/ip-ranges.json").unwrap();
        let result = fetcher.fetch().await;
        assert!(matches!(result, Err(SyncError::FeedUnavailable(_))));
    }
}
