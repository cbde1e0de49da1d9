use crate::fetch::client::HttpClient;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};

/// An [`HttpClient`] wrapper that authenticates every request with a
/// Snowflake session token (`Authorization: Snowflake Token="<token>"`).
///
/// `inner` stays reachable for requests that must go out without the token,
/// such as presigned result-chunk downloads.
pub struct SessionToken<C> {
    pub inner: C,
    header: HeaderValue,
}

impl<C> SessionToken<C> {
    pub fn new(inner: C, token: &str) -> Result<Self> {
        let mut header = HeaderValue::from_str(&format!("Snowflake Token=\"{token}\""))?;
        header.set_sensitive(true);
        Ok(Self { inner, header })
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for SessionToken<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut().insert(AUTHORIZATION, self.header.clone());
        self.inner.execute(req).await
    }
}
