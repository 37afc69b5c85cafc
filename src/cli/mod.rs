pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "postsync")]
#[command(about = "Keep a local post store in sync with a remote source", long_about = None)]
pub struct Cli {
    /// Path to the SQLite database (overrides the config file)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Remote base URL (overrides the config file)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Do not refetch when deleting empties the store
    #[arg(long, global = true)]
    pub no_refetch_when_emptied: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Follow the post collection, printing every change
    Watch,
    /// Follow a single post
    Show {
        /// ID of the post
        id: i64,
    },
    /// Print the posts currently stored
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch all posts from the remote and store them
    Sync,
    /// Mark posts as read
    Read {
        /// IDs of the posts
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Delete posts from the local store
    Delete {
        /// IDs of the posts
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}
