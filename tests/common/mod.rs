#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};

use postsync::app::{Result, SyncError};
use postsync::config::SyncConfig;
use postsync::domain::Post;
use postsync::remote::RemoteSource;
use postsync::repository::{PostFeed, PostRepository};
use postsync::store::{LiveView, PostStore, Snapshot, SqliteStore};

pub const WAIT: Duration = Duration::from_secs(5);
pub const QUIET: Duration = Duration::from_millis(150);

/// Remote double. Replies are consumed in order; the last one repeats.
pub struct ScriptedRemote {
    replies: Mutex<VecDeque<std::result::Result<Vec<Post>, String>>>,
    calls: AtomicUsize,
    hold: Option<Semaphore>,
    pub entered: Notify,
}

impl ScriptedRemote {
    fn build(replies: Vec<std::result::Result<Vec<Post>, String>>, held: bool) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            hold: held.then(|| Semaphore::new(0)),
            entered: Notify::new(),
        })
    }

    pub fn returning(posts: Vec<Post>) -> Arc<Self> {
        Self::build(vec![Ok(posts)], false)
    }

    pub fn sequence(replies: Vec<Vec<Post>>) -> Arc<Self> {
        Self::build(replies.into_iter().map(Ok).collect(), false)
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::build(vec![Err(message.to_string())], false)
    }

    /// Every fetch blocks until [`ScriptedRemote::release`]
    pub fn held(posts: Vec<Post>) -> Arc<Self> {
        Self::build(vec![Ok(posts)], true)
    }

    pub fn release(&self) {
        if let Some(hold) = &self.hold {
            hold.add_permits(1);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSource for ScriptedRemote {
    async fn fetch_all(&self) -> Result<Vec<Post>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();

        if let Some(hold) = &self.hold {
            hold.acquire()
                .await
                .map_err(|e| SyncError::Other(e.to_string()))?
                .forget();
        }

        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };
        reply
            .unwrap_or_else(|| Ok(Vec::new()))
            .map_err(SyncError::Other)
    }
}

/// What [`HookedStore`] does around writes made through the trait
pub enum InsertHook {
    /// Block every insert until [`HookedStore::release`]
    Hold,
    /// Delete everything right after the first insert commits
    ClearOnce,
}

/// Store double around a real in-memory store. Writes made on `inner`
/// directly skip the hook.
pub struct HookedStore {
    pub inner: SqliteStore,
    hook: InsertHook,
    fired: AtomicBool,
    pub entered: Notify,
    release_tx: Mutex<mpsc::Sender<()>>,
    release_rx: Mutex<mpsc::Receiver<()>>,
}

impl HookedStore {
    pub fn new(hook: InsertHook) -> Arc<Self> {
        let (release_tx, release_rx) = mpsc::channel();
        Arc::new(Self {
            inner: SqliteStore::in_memory().unwrap(),
            hook,
            fired: AtomicBool::new(false),
            entered: Notify::new(),
            release_tx: Mutex::new(release_tx),
            release_rx: Mutex::new(release_rx),
        })
    }

    pub fn release(&self) {
        self.release_tx.lock().unwrap().send(()).unwrap();
    }
}

impl PostStore for HookedStore {
    fn get_all_posts(&self) -> Result<Vec<Post>> {
        self.inner.get_all_posts()
    }

    fn get_post(&self, id: i64) -> Result<Option<Post>> {
        self.inner.get_post(id)
    }

    fn count_posts(&self) -> Result<i64> {
        self.inner.count_posts()
    }

    fn was_populated(&self) -> Result<bool> {
        self.inner.was_populated()
    }

    fn all_posts_live(&self) -> Result<LiveView<Snapshot>> {
        self.inner.all_posts_live()
    }

    fn post_live(&self, id: i64) -> Result<LiveView<Post>> {
        self.inner.post_live(id)
    }

    fn insert_posts(&self, posts: &[Post]) -> Result<usize> {
        match self.hook {
            InsertHook::Hold => {
                self.entered.notify_one();
                self.release_rx
                    .lock()
                    .unwrap()
                    .recv()
                    .map_err(|e| SyncError::Other(e.to_string()))?;
                self.inner.insert_posts(posts)
            }
            InsertHook::ClearOnce => {
                let inserted = self.inner.insert_posts(posts)?;
                if !self.fired.swap(true, Ordering::SeqCst) {
                    let stored = ids(&self.inner.get_all_posts()?);
                    self.inner.delete_posts(&stored)?;
                }
                Ok(inserted)
            }
        }
    }

    fn mark_read(&self, ids: &[i64]) -> Result<usize> {
        self.inner.mark_read(ids)
    }

    fn delete_posts(&self, ids: &[i64]) -> Result<usize> {
        self.inner.delete_posts(ids)
    }
}

pub fn post(id: i64) -> Post {
    Post::new(id, format!("Post {}", id), format!("Body of post {}", id))
}

pub fn posts(ids: &[i64]) -> Vec<Post> {
    ids.iter().copied().map(post).collect()
}

pub fn ids(posts: &[Post]) -> Vec<i64> {
    posts.iter().map(|p| p.id).collect()
}

pub fn repository(
    stored: &[i64],
    remote: Arc<ScriptedRemote>,
    config: SyncConfig,
) -> PostRepository<SqliteStore> {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    store.insert_posts(&posts(stored)).unwrap();
    PostRepository::with_config(store, remote, config)
}

pub fn hooked_repository(
    hook: InsertHook,
    remote: Arc<ScriptedRemote>,
    config: SyncConfig,
) -> PostRepository<HookedStore> {
    PostRepository::with_config(HookedStore::new(hook), remote, config)
}

pub fn no_refetch() -> SyncConfig {
    SyncConfig {
        refetch_when_emptied: false,
        ..SyncConfig::default()
    }
}

/// Next snapshot, failing the test on timeout, end of feed or error
pub async fn next_posts<S: PostStore + 'static>(feed: &mut PostFeed<S>) -> Vec<Post> {
    tokio::time::timeout(WAIT, feed.next())
        .await
        .expect("timed out waiting for snapshot")
        .expect("feed ended")
        .expect("feed failed")
}

/// Whether the feed stays silent for a short while
pub async fn stays_quiet<S: PostStore + 'static>(feed: &mut PostFeed<S>) -> bool {
    tokio::time::timeout(QUIET, feed.next()).await.is_err()
}
