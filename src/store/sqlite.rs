use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, SyncError};
use crate::domain::Post;
use crate::store::live::{ChangeCause, ChangeFeed, LiveView, Snapshot};
use crate::store::PostStore;

const SELECT_POSTS: &str = "SELECT id, title, body, is_read, fetched_at FROM posts";

pub struct SqliteStore {
    conn: Mutex<Connection>,
    changes: ChangeFeed,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
            changes: ChangeFeed::new(),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![
            M::up(include_str!("../../migrations/001-initial/up.sql")),
            M::up(include_str!("../../migrations/002-sync-state/up.sql")),
        ]);

        let mut conn = self.lock()?;
        migrations.to_latest(&mut conn)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            SyncError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn row_to_post(row: &Row<'_>) -> rusqlite::Result<Post> {
        Ok(Post {
            id: row.get(0)?,
            title: row.get(1)?,
            body: row.get(2)?,
            read: row.get::<_, i32>(3)? != 0,
            fetched_at: row
                .get::<_, String>(4)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
        })
    }

    fn query_all(conn: &Connection) -> Result<Vec<Post>> {
        let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_POSTS))?;
        let posts = stmt
            .query_map([], Self::row_to_post)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    fn query_populated(conn: &Connection) -> Result<bool> {
        let populated = conn.query_row("SELECT EXISTS (SELECT 1 FROM sync_state)", [], |row| {
            row.get(0)
        })?;
        Ok(populated)
    }

    /// Run `write` in a transaction and publish the resulting state if it
    /// changed anything. The snapshot is read inside the transaction so a
    /// failed commit publishes nothing.
    fn commit_with<F>(&self, cause: ChangeCause, write: F) -> Result<usize>
    where
        F: FnOnce(&Connection) -> Result<usize>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let changed = write(&tx)?;
        if changed == 0 {
            tx.commit()?;
            return Ok(0);
        }

        let snapshot = Self::query_all(&tx)?;
        let populated = Self::query_populated(&tx)?;
        tx.commit()?;
        self.changes.publish(cause, snapshot, populated);

        Ok(changed)
    }
}

impl PostStore for SqliteStore {
    fn get_all_posts(&self) -> Result<Vec<Post>> {
        let conn = self.lock()?;
        Self::query_all(&conn)
    }

    fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let conn = self.lock()?;

        let result = conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_POSTS),
                params![id],
                Self::row_to_post,
            )
            .optional()?;

        Ok(result)
    }

    fn count_posts(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        Ok(count)
    }

    fn was_populated(&self) -> Result<bool> {
        let conn = self.lock()?;
        Self::query_populated(&conn)
    }

    fn all_posts_live(&self) -> Result<LiveView<Snapshot>> {
        let conn = self.lock()?;
        let current = Self::query_all(&conn)?;
        let populated = Self::query_populated(&conn)?;
        Ok(self
            .changes
            .subscribe(current, populated, |snapshot| Some(snapshot.clone())))
    }

    fn post_live(&self, id: i64) -> Result<LiveView<Post>> {
        let conn = self.lock()?;
        let current = Self::query_all(&conn)?;
        let populated = Self::query_populated(&conn)?;

        let mut last: Option<Post> = None;
        Ok(self.changes.subscribe(current, populated, move |snapshot| {
            match snapshot.posts.iter().find(|p| p.id == id) {
                None => {
                    last = None;
                    None
                }
                Some(post) if last.as_ref() == Some(post) => None,
                Some(post) => {
                    last = Some(post.clone());
                    Some(post.clone())
                }
            }
        }))
    }

    fn insert_posts(&self, posts: &[Post]) -> Result<usize> {
        if posts.is_empty() {
            return Ok(0);
        }

        self.commit_with(ChangeCause::Insert, |tx| {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO posts (id, title, body, is_read, read_at, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
            )?;

            let mut count = 0;
            for post in posts {
                count += stmt.execute(params![
                    post.id,
                    post.title,
                    post.body,
                    post.read as i32,
                    post.fetched_at.to_rfc3339()
                ])?;
            }

            if count > 0 {
                tx.execute(
                    "INSERT OR IGNORE INTO sync_state (id, populated_at) VALUES (1, ?1)",
                    params![Utc::now().to_rfc3339()],
                )?;
            }
            Ok(count)
        })
    }

    fn mark_read(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let read_at = Utc::now().to_rfc3339();
        self.commit_with(ChangeCause::MarkRead, |tx| {
            let mut stmt =
                tx.prepare("UPDATE posts SET is_read = 1, read_at = ?2 WHERE id = ?1 AND is_read = 0")?;

            let mut count = 0;
            for id in ids {
                count += stmt.execute(params![id, read_at])?;
            }
            Ok(count)
        })
    }

    fn delete_posts(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        self.commit_with(ChangeCause::Delete, |tx| {
            let mut stmt = tx.prepare("DELETE FROM posts WHERE id = ?1")?;

            let mut count = 0;
            for id in ids {
                count += stmt.execute(params![id])?;
            }
            Ok(count)
        })
    }
}
