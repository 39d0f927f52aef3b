//! Feed parsing through the public API.

use cfsync::feed::{parse_ip_ranges, CLOUDFRONT_SERVICE};
use cfsync::reconciler::plan;
use cfsync::rule::desired_rules;
use cfsync::SyncError;
use std::collections::BTreeSet;

const FEED: &str = r#"{
  "syncToken": "1712345678",
  "createDate": "2024-04-05-12-00-00",
  "prefixes": [
    {"ip_prefix": "3.2.34.0/26", "region": "af-south-1", "service": "AMAZON", "network_border_group": "af-south-1"},
    {"ip_prefix": "13.32.0.0/15", "region": "GLOBAL", "service": "CLOUDFRONT", "network_border_group": "GLOBAL"},
    {"ip_prefix": "52.46.0.0/18", "region": "GLOBAL", "service": "CLOUDFRONT", "network_border_group": "GLOBAL"},
    {"ip_prefix": "not-an-ip", "region": "GLOBAL", "service": "CLOUDFRONT", "network_border_group": "GLOBAL"}
  ],
  "ipv6_prefixes": []
}"#;

#[test]
fn test_feed_to_desired_rules() {
    let cidrs = parse_ip_ranges(FEED, CLOUDFRONT_SERVICE).unwrap();
    assert_eq!(cidrs.len(), 2);

    let desired = desired_rules(&cidrs, &[80, 443]);
    assert_eq!(desired.len(), 4);
    let rendered: Vec<String> = desired.iter().map(|r| r.to_string()).collect();
    assert_eq!(
        rendered,
        vec![
            "13.32.0.0/15:80",
            "13.32.0.0/15:443",
            "52.46.0.0/18:80",
            "52.46.0.0/18:443"
        ]
    );
}

#[test]
fn test_feed_without_cloudfront_removes_everything() {
    let feed = r#"{"prefixes": [{"ip_prefix": "3.2.34.0/26", "service": "AMAZON"}]}"#;
    let cidrs = parse_ip_ranges(feed, CLOUDFRONT_SERVICE).unwrap();
    let desired = desired_rules(&cidrs, &[443]);
    assert!(desired.is_empty());

    let existing = desired_rules(&parse_ip_ranges(FEED, CLOUDFRONT_SERVICE).unwrap(), &[443]);
    let changes = plan(&desired, vec![("sg-1".to_string(), existing.clone())]);
    assert_eq!(changes[0].removed, existing);
    assert_eq!(changes[0].rule_count, 0);
}

#[test]
fn test_truncated_feed_is_unavailable() {
    let truncated = &FEED[..FEED.len() / 2];
    let result = parse_ip_ranges(truncated, CLOUDFRONT_SERVICE);
    assert!(matches!(result, Err(SyncError::FeedUnavailable(_))));
}

#[test]
fn test_empty_prefix_list() {
    let cidrs = parse_ip_ranges(r#"{"prefixes": []}"#, CLOUDFRONT_SERVICE).unwrap();
    assert_eq!(cidrs, BTreeSet::new());
}
