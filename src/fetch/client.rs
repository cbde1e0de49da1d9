use async_trait::async_trait;
use reqwest::{Request, Response};

/// The single HTTP seam of the crate: everything that talks to the
/// warehouse goes through an implementation of this trait.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
