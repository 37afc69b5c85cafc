pub mod http;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::Post;

pub use http::HttpRemote;

/// Authoritative origin for posts.
#[async_trait]
pub trait RemoteSource {
    /// Fetch the full current collection in a single attempt
    async fn fetch_all(&self) -> Result<Vec<Post>>;
}
