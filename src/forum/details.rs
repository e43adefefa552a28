//! Read-only projections composing posts/comments with author names,
//! reaction totals, and the viewing user's own reaction.

use rusqlite::{params, OptionalExtension};

use crate::db::models::{CommentDetail, PostDetail};
use crate::error::AppResult;
use crate::forum::comments::list_comments;
use crate::forum::posts::{get_post, list_posts, PostFilter};
use crate::forum::reactions::{count_reactions, viewer_reaction, ReactionTarget};
use crate::state::DbPool;

pub fn get_post_detail(pool: &DbPool, post_id: i64, viewer: Option<i64>) -> AppResult<PostDetail> {
    let post = get_post(pool, post_id)?;

    let conn = pool.get()?;
    let username = author_username(&conn, post.author_id)?;
    let comment_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
        params![post_id],
        |row| row.get(0),
    )?;
    drop(conn);

    let counts = count_reactions(pool, ReactionTarget::Post, post_id)?;
    let own = match viewer {
        Some(user_id) => viewer_reaction(pool, ReactionTarget::Post, user_id, post_id)?,
        None => None,
    };

    Ok(PostDetail {
        post,
        username,
        likes: counts.likes,
        dislikes: counts.dislikes,
        comment_count,
        viewer_reaction: own,
    })
}

pub fn list_posts_with_details(
    pool: &DbPool,
    filter: &PostFilter,
    viewer: Option<i64>,
) -> AppResult<Vec<PostDetail>> {
    let posts = list_posts(pool, filter)?;
    let mut details = Vec::with_capacity(posts.len());
    for post in posts {
        details.push(get_post_detail(pool, post.id, viewer)?);
    }
    Ok(details)
}

pub fn list_comments_with_details(
    pool: &DbPool,
    post_id: i64,
    viewer: Option<i64>,
) -> AppResult<Vec<CommentDetail>> {
    let comments = list_comments(pool, post_id)?;

    let mut details = Vec::with_capacity(comments.len());
    for comment in comments {
        let conn = pool.get()?;
        let username = author_username(&conn, comment.author_id)?;
        drop(conn);

        let counts = count_reactions(pool, ReactionTarget::Comment, comment.id)?;
        let own = match viewer {
            Some(user_id) => viewer_reaction(pool, ReactionTarget::Comment, user_id, comment.id)?,
            None => None,
        };

        details.push(CommentDetail {
            comment,
            username,
            likes: counts.likes,
            dislikes: counts.dislikes,
            viewer_reaction: own,
        });
    }
    Ok(details)
}

fn author_username(conn: &rusqlite::Connection, author_id: i64) -> AppResult<String> {
    let username: Option<String> = conn
        .query_row(
            "SELECT username FROM users WHERE id = ?1",
            params![author_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(username.unwrap_or_else(|| "unknown".to_string()))
}
