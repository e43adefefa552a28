use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
    pub created_at: String,
}

/// Aggregate like/dislike totals for a post or comment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCounts {
    pub likes: i64,
    pub dislikes: i64,
}

/// Post projected for display: author name, totals, and the viewer's own
/// reaction if any. Not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub username: String,
    pub likes: i64,
    pub dislikes: i64,
    pub comment_count: i64,
    pub viewer_reaction: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentDetail {
    #[serde(flatten)]
    pub comment: Comment,
    pub username: String,
    pub likes: i64,
    pub dislikes: i64,
    pub viewer_reaction: Option<i64>,
}
