use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub body: String,
    /// Only ever set through the store's mark-read operation
    pub read: bool,
    pub fetched_at: DateTime<Utc>,
}

impl Post {
    pub fn new(id: i64, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            read: false,
            fetched_at: Utc::now(),
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "(Untitled)"
        } else {
            &self.title
        }
    }

    /// First line of the body, for one-line listings
    pub fn excerpt(&self) -> &str {
        self.body.lines().next().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_post_is_unread() {
        let post = Post::new(1, "Title", "Body");
        assert!(!post.read);
        assert_eq!(post.id, 1);
    }

    #[test]
    fn test_display_title_with_title() {
        let post = Post::new(1, "My Post", "");
        assert_eq!(post.display_title(), "My Post");
    }

    #[test]
    fn test_display_title_blank() {
        let post = Post::new(1, "   ", "");
        assert_eq!(post.display_title(), "(Untitled)");
    }

    #[test]
    fn test_excerpt_takes_first_line() {
        let post = Post::new(1, "t", "first line\nsecond line");
        assert_eq!(post.excerpt(), "first line");
    }
}
