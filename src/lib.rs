//! # postsync
//!
//! Cache-aside synchronization between a local SQLite post store and a
//! remote post source, with live views that follow every committed change.
//!
//! ## Architecture
//!
//! ```text
//! RemoteSource → PostRepository → PostStore → live views → observers
//!                      ↑
//!          mark read / delete (callers)
//! ```
//!
//! Observers subscribe to [`PostRepository::observe_posts`]. While the store
//! has posts, every committed snapshot is forwarded. When it is empty the
//! repository fetches everything from the remote, persists it, and follows the
//! store again. A newer store snapshot always wins over a fetch that is still
//! in flight.
//!
//! ## Quick Start
//!
//! ```bash
//! # Follow the collection (fetches on first run)
//! postsync watch
//!
//! # Mark posts read, delete one
//! postsync read 1 2
//! postsync delete 3
//! ```
//!
//! [`PostRepository::observe_posts`]: repository::PostRepository::observe_posts

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together store, remote
/// and repository.
pub mod app;

/// Command-line interface using clap.
pub mod cli;

/// Configuration loaded from `~/.config/postsync/config.toml`.
pub mod config;

/// Core domain model ([`Post`](domain::Post)).
pub mod domain;

/// Remote post source.
///
/// - [`RemoteSource`](remote::RemoteSource): async trait for fetch-all
/// - [`HttpRemote`](remote::HttpRemote): reqwest-based implementation
pub mod remote;

/// The synchronization repository and its live feeds.
pub mod repository;

/// SQLite persistence with push-updated views.
///
/// - [`PostStore`](store::PostStore): trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
/// - [`LiveView`](store::LiveView): one subscriber's view of committed state
pub mod store;
