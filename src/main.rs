use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use postsync::app::AppContext;
use postsync::cli::{commands, Cli, Commands};
use postsync::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(db) = cli.db {
        config.store.path = Some(db);
    }
    if let Some(base_url) = cli.base_url {
        config.remote.base_url = base_url;
    }
    if cli.no_refetch_when_emptied {
        config.sync.refetch_when_emptied = false;
    }

    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Watch => {
            commands::watch_posts(&ctx).await?;
        }
        Commands::Show { id } => {
            commands::show_post(&ctx, id).await?;
        }
        Commands::List { json } => {
            commands::list_posts(&ctx, json)?;
        }
        Commands::Sync => {
            commands::sync_posts(&ctx).await?;
        }
        Commands::Read { ids } => {
            commands::mark_read(&ctx, &ids).await?;
        }
        Commands::Delete { ids } => {
            commands::delete_posts(&ctx, &ids).await?;
        }
    }

    Ok(())
}
