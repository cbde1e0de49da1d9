mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result, bail};
use reqwest::header::HeaderMap;

/// Downloads `url` with `headers` attached and returns the body bytes.
///
/// Any non-success status is an error carrying the response body. Errors
/// never include the query string of `url`.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    headers: &HeaderMap,
) -> Result<Vec<u8>> {
    let mut req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);
    req.headers_mut().extend(headers.clone());

    let resp = client
        .execute(req)
        .await
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("GET {} failed", redact_query(url)))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("GET {} returned status {}: {}", redact_query(url), status, body);
    }
    Ok(resp.bytes().await?.to_vec())
}

/// Strips the query string, which for presigned URLs holds credentials.
fn redact_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
