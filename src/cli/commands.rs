use crate::app::{AppContext, Result, SyncError};
use crate::domain::Post;
use crate::store::PostStore;

pub async fn watch_posts(ctx: &AppContext) -> Result<()> {
    let mut feed = ctx.repository.observe_posts();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            item = feed.next() => match item {
                Some(Ok(posts)) => print_snapshot(&posts),
                Some(Err(e)) => return Err(e),
                None => break,
            },
        }
    }

    Ok(())
}

pub async fn show_post(ctx: &AppContext, id: i64) -> Result<()> {
    if ctx.store.get_post(id)?.is_none() {
        println!("Post {} is not stored yet, waiting...", id);
    }

    let mut watch = ctx.repository.observe_post(id).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            post = watch.next() => match post {
                Some(post) => print_post(&post),
                None => break,
            },
        }
    }

    Ok(())
}

pub fn list_posts(ctx: &AppContext, json: bool) -> Result<()> {
    let posts = ctx.store.get_all_posts()?;

    if json {
        let out = serde_json::to_string_pretty(&posts)
            .map_err(|e| SyncError::Other(format!("Failed to encode posts: {}", e)))?;
        println!("{}", out);
        return Ok(());
    }

    if posts.is_empty() {
        println!("No posts");
        return Ok(());
    }

    print_snapshot(&posts);
    Ok(())
}

pub async fn sync_posts(ctx: &AppContext) -> Result<()> {
    let count = ctx.repository.fetch_and_persist().await?;
    println!("Stored {} posts", count);
    Ok(())
}

pub async fn mark_read(ctx: &AppContext, ids: &[i64]) -> Result<()> {
    ctx.repository.mark_read(ids).await?;
    println!("Marked {} post(s) read", ids.len());
    Ok(())
}

pub async fn delete_posts(ctx: &AppContext, ids: &[i64]) -> Result<()> {
    ctx.repository.delete_posts(ids).await?;
    println!("Deleted {} post(s)", ids.len());
    Ok(())
}

fn print_snapshot(posts: &[Post]) {
    let unread = posts.iter().filter(|p| !p.read).count();
    println!("-- {} posts ({} unread)", posts.len(), unread);
    for post in posts {
        println!("{}", format_entry(post));
    }
}

fn print_post(post: &Post) {
    println!("{}", format_line(post));
    println!();
    println!("{}", post.body);
    println!();
}

fn format_line(post: &Post) -> String {
    let read_marker = if post.read { " " } else { "●" };
    format!("{} {:>4} {}", read_marker, post.id, post.display_title())
}

/// Listing line followed by the body's first line, if any
fn format_entry(post: &Post) -> String {
    match post.excerpt().trim() {
        "" => format_line(post),
        excerpt => format!("{}\n       {}", format_line(post), excerpt),
    }
}
