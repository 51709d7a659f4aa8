pub mod exchange_rate;
pub mod oecd;
pub mod world_bank;

use anyhow::{Context, Result, anyhow};
use reqwest::Url;

pub const USER_AGENT: &str = "econmap/1.0";

pub(crate) fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().user_agent(USER_AGENT).build()?)
}

/// Appends `segments` to `base_url` as individually percent-encoded path
/// segments, so caller-supplied codes cannot alter the request path or query.
pub(crate) fn endpoint(base_url: &str, segments: &[&str], query: &str) -> Result<Url> {
    let mut url =
        Url::parse(base_url).with_context(|| format!("Invalid base URL: {base_url}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("Base URL cannot carry a path: {base_url}"))?
        .pop_if_empty()
        .extend(segments);
    url.set_query(Some(query));
    Ok(url)
}
