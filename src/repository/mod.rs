//! Cache-aside mediation between the local store and the remote source.
//!
//! The store is the single source of truth. The repository keeps no copy of
//! the data; it decides when the store needs filling from the remote and
//! relays the store's live views to observers.

mod feed;

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::app::Result;
use crate::config::SyncConfig;
use crate::domain::Post;
use crate::remote::RemoteSource;
use crate::store::{LiveView, PostStore, Snapshot};

pub use feed::PostFeed;

/// Live view of a single post
pub type PostWatch = LiveView<Post>;

/// Result of a fetch started on behalf of a live feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FetchOutcome {
    Committed(usize),
    /// A newer store snapshot arrived first; nothing was written
    Superseded,
}

pub struct PostRepository<S> {
    store: Arc<S>,
    remote: Arc<dyn RemoteSource + Send + Sync>,
    config: SyncConfig,
}

impl<S> Clone for PostRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            remote: self.remote.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: PostStore + 'static> PostRepository<S> {
    pub fn new(store: Arc<S>, remote: Arc<dyn RemoteSource + Send + Sync>) -> Self {
        Self::with_config(store, remote, SyncConfig::default())
    }

    pub fn with_config(
        store: Arc<S>,
        remote: Arc<dyn RemoteSource + Send + Sync>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            remote,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Live view of every post. Nothing happens until the feed is first
    /// polled; each call gives an independent subscription.
    ///
    /// Whenever the store reports an empty collection the feed fetches from
    /// the remote, persists the result and follows the store again. An error
    /// from either side is delivered as the feed's last item.
    pub fn observe_posts(&self) -> PostFeed<S> {
        PostFeed::new(self.clone())
    }

    /// Live view of one post. Yields nothing while the post is absent and
    /// never triggers a remote fetch.
    pub async fn observe_post(&self, id: i64) -> Result<PostWatch> {
        self.with_store(move |store| store.post_live(id)).await
    }

    /// Fetch everything from the remote and upsert it into the store.
    pub async fn fetch_and_persist(&self) -> Result<usize> {
        let posts = self.remote.fetch_all().await?;
        info!(count = posts.len(), "Fetched posts from remote");

        let inserted = self.persist(posts, None).await?;
        info!(inserted, "Persisted remote posts");
        Ok(inserted)
    }

    pub async fn mark_read(&self, ids: &[i64]) -> Result<()> {
        let ids = ids.to_vec();
        let updated = self.with_store(move |store| store.mark_read(&ids)).await?;
        debug!(updated, "Marked posts read");
        Ok(())
    }

    pub async fn mark_post_read(&self, id: i64) -> Result<()> {
        self.mark_read(&[id]).await
    }

    pub async fn delete_posts(&self, ids: &[i64]) -> Result<()> {
        let ids = ids.to_vec();
        let deleted = self.with_store(move |store| store.delete_posts(&ids)).await?;
        debug!(deleted, "Deleted posts");
        Ok(())
    }

    pub async fn delete_post(&self, id: i64) -> Result<()> {
        self.delete_posts(&[id]).await
    }

    /// Whether an upstream snapshot should be replaced by a remote fetch
    fn needs_fetch(&self, snapshot: &Snapshot) -> bool {
        if !snapshot.is_empty() {
            return false;
        }
        // Known limitation: by default a store emptied by the user looks the
        // same as one that was never filled.
        self.config.refetch_when_emptied || !snapshot.populated
    }

    async fn subscribe_all(&self) -> Result<LiveView<Snapshot>> {
        self.with_store(|store| store.all_posts_live()).await
    }

    /// Fetch on behalf of a feed. The write only happens if `generation` is
    /// still current once the gate is held, and the gate stays held until
    /// the write is done.
    pub(crate) async fn fetch_for_generation(
        &self,
        gate: Arc<Mutex<u64>>,
        generation: u64,
    ) -> Result<FetchOutcome> {
        let posts = self.remote.fetch_all().await?;
        debug!(count = posts.len(), generation, "Fetched posts for feed");

        let guard = gate.lock_owned().await;
        if *guard != generation {
            debug!(generation, current = *guard, "Dropping superseded fetch result");
            return Ok(FetchOutcome::Superseded);
        }

        let inserted = self.persist(posts, Some(guard)).await?;
        info!(inserted, generation, "Persisted remote posts");
        Ok(FetchOutcome::Committed(inserted))
    }

    /// Write on the blocking pool. `guard`, if any, is released only after
    /// the write finishes, even if the calling task is aborted meanwhile.
    async fn persist(&self, posts: Vec<Post>, guard: Option<OwnedMutexGuard<u64>>) -> Result<usize> {
        self.with_store(move |store| {
            let _guard = guard;
            store.insert_posts(&posts)
        })
        .await
    }

    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&S) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(&store)).await?
    }
}
