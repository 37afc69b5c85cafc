use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::app::Result;
use crate::config::RemoteConfig;
use crate::domain::Post;
use crate::remote::RemoteSource;

/// Wire shape of `GET {base_url}/posts`
#[derive(Debug, Deserialize)]
struct RemotePost {
    id: i64,
    title: String,
    body: String,
}

impl From<RemotePost> for Post {
    fn from(remote: RemotePost) -> Self {
        Post {
            id: remote.id,
            title: remote.title,
            body: remote.body,
            read: false,
            fetched_at: Utc::now(),
        }
    }
}

pub struct HttpRemote {
    client: Client,
    posts_url: Url,
}

impl HttpRemote {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            posts_url: posts_url(&config.base_url)?,
        })
    }
}

/// Resolve the posts endpoint below `base`, keeping any path prefix.
pub fn posts_url(base: &str) -> Result<Url> {
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join("posts")?)
}

#[async_trait]
impl RemoteSource for HttpRemote {
    async fn fetch_all(&self) -> Result<Vec<Post>> {
        tracing::debug!("Fetching posts from {}", self.posts_url);

        let response = self.client.get(self.posts_url.clone()).send().await?;
        response.error_for_status_ref()?;

        let posts: Vec<RemotePost> = response.json().await?;
        Ok(posts.into_iter().map(Post::from).collect())
    }
}
