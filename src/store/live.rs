//! Push-updated views over committed store state.
//!
//! Every successful write publishes one [`Snapshot`] of the whole collection
//! while the writer still holds the store lock, so subscribers observe
//! commits in the order they happened. A subscriber that falls behind the
//! channel capacity skips straight to the oldest snapshot still retained;
//! it never sees state older than what it already received.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::domain::Post;

pub const DEFAULT_CAPACITY: usize = 64;

/// What produced a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCause {
    /// Current state handed to a new subscriber
    Initial,
    Insert,
    MarkRead,
    Delete,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Commit sequence number, strictly increasing per store
    pub seq: u64,
    pub cause: ChangeCause,
    pub posts: Arc<Vec<Post>>,
    /// The store has held posts at some point, even if it is empty now
    pub populated: bool,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

/// Broadcast side of the store's live views.
pub struct ChangeFeed {
    sender: broadcast::Sender<Snapshot>,
    seq: AtomicU64,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            seq: AtomicU64::new(0),
        }
    }

    /// Publish the state left behind by a commit. Must be called while the
    /// writer still holds the store lock.
    pub fn publish(&self, cause: ChangeCause, posts: Vec<Post>, populated: bool) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let count = posts.len();
        let snapshot = Snapshot {
            seq,
            cause,
            posts: Arc::new(posts),
            populated,
        };

        match self.sender.send(snapshot) {
            Ok(subscribers) => {
                debug!(seq, ?cause, posts = count, subscribers, "Published snapshot");
            }
            Err(_) => {
                debug!(seq, ?cause, posts = count, "Published snapshot with no subscribers");
            }
        }
        seq
    }

    /// Open a view seeded with `current`. Must be called while holding the
    /// same lock writers publish under, otherwise a commit could slip in
    /// between the read of `current` and the subscription.
    pub fn subscribe<T, F>(&self, current: Vec<Post>, populated: bool, project: F) -> LiveView<T>
    where
        F: FnMut(&Snapshot) -> Option<T> + Send + 'static,
    {
        let initial = Snapshot {
            seq: self.seq.load(Ordering::SeqCst),
            cause: ChangeCause::Initial,
            posts: Arc::new(current),
            populated,
        };
        LiveView {
            initial: Some(initial),
            receiver: self.sender.subscribe(),
            project: Box::new(project),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// One subscriber's view. Snapshots the projection maps to `None` are
/// skipped. Dropping the view unsubscribes.
pub struct LiveView<T> {
    initial: Option<Snapshot>,
    receiver: broadcast::Receiver<Snapshot>,
    project: Box<dyn FnMut(&Snapshot) -> Option<T> + Send>,
}

impl<T> LiveView<T> {
    /// Wait for the next value. Returns `None` once the store is gone.
    ///
    /// Cancel safe: dropping the future loses no snapshot.
    pub async fn next(&mut self) -> Option<T> {
        if let Some(initial) = self.initial.take() {
            if let Some(value) = (self.project)(&initial) {
                return Some(value);
            }
        }

        loop {
            match self.receiver.recv().await {
                Ok(snapshot) => {
                    if let Some(value) = (self.project)(&snapshot) {
                        return Some(value);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Live view lagged behind store commits");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = T> + Send
    where
        T: Send + 'static,
    {
        futures::stream::unfold(self, |mut view| async move {
            view.next().await.map(|value| (value, view))
        })
    }
}
