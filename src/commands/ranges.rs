//! Ranges command implementation.

use anyhow::Result;

use crate::feed::{Fetcher, RangeSource};

/// Print the CIDR blocks the feed currently publishes for CloudFront
pub async fn run(feed_url: &str) -> Result<()> {
    let fetcher = Fetcher::new(feed_url)?;
    let cidrs = fetcher.fetch().await?;

    for cidr in &cidrs {
        println!("{}", cidr);
    }

    Ok(())
}
