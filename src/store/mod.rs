pub mod live;
pub mod sqlite;

use crate::app::Result;
use crate::domain::Post;

pub use live::{ChangeCause, ChangeFeed, LiveView, Snapshot};
pub use sqlite::SqliteStore;

/// Durable post storage with push-updated views.
///
/// Writers are serialized by the implementation. Every write that changes
/// at least one row publishes exactly one [`Snapshot`] to live views.
pub trait PostStore: Send + Sync {
    // Point queries
    fn get_all_posts(&self) -> Result<Vec<Post>>;
    fn get_post(&self, id: i64) -> Result<Option<Post>>;
    fn count_posts(&self) -> Result<i64>;
    /// Whether any post was ever stored, even if all were deleted since
    fn was_populated(&self) -> Result<bool>;

    // Live views
    fn all_posts_live(&self) -> Result<LiveView<Snapshot>>;
    /// Yields the post whenever it changes; nothing while it is absent
    fn post_live(&self, id: i64) -> Result<LiveView<Post>>;

    // Writes
    /// Upsert: a post with an existing id replaces the stored row
    fn insert_posts(&self, posts: &[Post]) -> Result<usize>;
    fn mark_read(&self, ids: &[i64]) -> Result<usize>;
    fn delete_posts(&self, ids: &[i64]) -> Result<usize>;
}
