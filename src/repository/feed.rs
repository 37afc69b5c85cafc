use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::app::Result;
use crate::domain::Post;
use crate::repository::{FetchOutcome, PostRepository};
use crate::store::{LiveView, PostStore, Snapshot};

/// Observer handle for [`PostRepository::observe_posts`].
///
/// The driver task starts on the first call to [`PostFeed::next`] and is
/// stopped, together with any fetch it started, when the feed is dropped.
pub struct PostFeed<S: PostStore + 'static> {
    repository: Option<PostRepository<S>>,
    receiver: Option<mpsc::Receiver<Result<Vec<Post>>>>,
    driver: Option<JoinHandle<()>>,
}

impl<S: PostStore + 'static> PostFeed<S> {
    pub(crate) fn new(repository: PostRepository<S>) -> Self {
        Self {
            repository: Some(repository),
            receiver: None,
            driver: None,
        }
    }

    /// Next committed collection, or the error that ended the feed.
    /// Returns `None` after an error or once the store is gone.
    pub async fn next(&mut self) -> Option<Result<Vec<Post>>> {
        if let Some(repository) = self.repository.take() {
            let (tx, rx) = mpsc::channel(repository.config().feed_buffer.max(1));
            self.driver = Some(tokio::spawn(drive(repository, tx)));
            self.receiver = Some(rx);
        }

        self.receiver.as_mut()?.recv().await
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<Post>>> + Send {
        futures::stream::unfold(self, |mut feed| async move {
            feed.next().await.map(|item| (item, feed))
        })
    }
}

impl<S: PostStore + 'static> Drop for PostFeed<S> {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

/// Fetch task spawned for one empty snapshot. Aborted when dropped.
struct PendingFetch {
    handle: JoinHandle<Result<FetchOutcome>>,
    generation: u64,
}

impl PendingFetch {
    fn spawn<S: PostStore + 'static>(
        repository: PostRepository<S>,
        gate: Arc<Mutex<u64>>,
        generation: u64,
    ) -> Self {
        let handle = tokio::spawn(async move {
            repository.fetch_for_generation(gate, generation).await
        });
        Self { handle, generation }
    }
}

impl Drop for PendingFetch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn join_pending(pending: &mut Option<PendingFetch>) -> Result<FetchOutcome> {
    match pending {
        Some(fetch) => (&mut fetch.handle).await?,
        None => std::future::pending().await,
    }
}

async fn drive<S: PostStore + 'static>(
    repository: PostRepository<S>,
    tx: mpsc::Sender<Result<Vec<Post>>>,
) {
    if let Err(e) = run(&repository, &tx).await {
        error!("Post feed failed: {}", e);
        let _ = tx.send(Err(e)).await;
    }
}

/// Follow the store, swapping empty snapshots for a fetch. Each upstream
/// snapshot supersedes whatever fetch an earlier one started.
async fn run<S: PostStore + 'static>(
    repository: &PostRepository<S>,
    tx: &mpsc::Sender<Result<Vec<Post>>>,
) -> Result<()> {
    let gate = Arc::new(Mutex::new(0u64));
    let mut upstream: LiveView<Snapshot> = repository.subscribe_all().await?;
    let mut pending: Option<PendingFetch> = None;
    // Set after a fetch that wrote nothing: the next snapshot is forwarded
    // even if empty instead of fetching again
    let mut forward_next = false;

    loop {
        tokio::select! {
            biased;

            _ = tx.closed() => {
                debug!("Post feed observer went away");
                return Ok(());
            }

            snapshot = upstream.next() => {
                let Some(snapshot) = snapshot else {
                    debug!("Store closed, ending post feed");
                    return Ok(());
                };

                if let Some(stale) = pending.take() {
                    // Waits out a write already in progress
                    let mut current = gate.lock().await;
                    *current += 1;
                    debug!(
                        generation = stale.generation,
                        seq = snapshot.seq,
                        "Newer snapshot superseded pending fetch"
                    );
                    drop(stale);
                }

                let forward = std::mem::take(&mut forward_next) || !repository.needs_fetch(&snapshot);
                if forward {
                    debug!(seq = snapshot.seq, posts = snapshot.posts.len(), "Forwarding snapshot");
                    if tx.send(Ok(snapshot.posts.to_vec())).await.is_err() {
                        return Ok(());
                    }
                } else {
                    let generation = *gate.lock().await;
                    debug!(seq = snapshot.seq, generation, "Store empty, fetching from remote");
                    pending = Some(PendingFetch::spawn(repository.clone(), gate.clone(), generation));
                }
            }

            // Polled after upstream so a queued snapshot supersedes a fetch
            // that finished, or failed, at the same time
            outcome = join_pending(&mut pending) => {
                let generation = pending.take().map(|p| p.generation);
                match outcome? {
                    FetchOutcome::Committed(inserted) => {
                        debug!(inserted, ?generation, "Fetch committed, resubscribing");
                        upstream = repository.subscribe_all().await?;
                        forward_next = inserted == 0;
                    }
                    FetchOutcome::Superseded => {
                        debug!(?generation, "Fetch superseded");
                    }
                }
            }
        }
    }
}
