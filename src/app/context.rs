use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{Result, SyncError};
use crate::config::Config;
use crate::remote::{HttpRemote, RemoteSource};
use crate::repository::PostRepository;
use crate::store::SqliteStore;

pub struct AppContext {
    pub store: Arc<SqliteStore>,
    pub repository: PostRepository<SqliteStore>,
    pub config: Config,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match config.store.path.clone() {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);
        tracing::debug!("Opened post store at {}", db_path.display());
        Self::with_store(store, config)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::with_store(store, config)
    }

    fn with_store(store: Arc<SqliteStore>, config: Config) -> Result<Self> {
        let remote: Arc<dyn RemoteSource + Send + Sync> = Arc::new(HttpRemote::new(&config.remote)?);
        let repository = PostRepository::with_config(store.clone(), remote, config.sync.clone());

        Ok(Self {
            store,
            repository,
            config,
        })
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| SyncError::Config("Could not find data directory".into()))?;
        let postsync_dir = data_dir.join("postsync");
        std::fs::create_dir_all(&postsync_dir)?;
        Ok(postsync_dir.join("posts.db"))
    }
}
