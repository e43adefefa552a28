use rusqlite::{params, OptionalExtension};

use crate::db::models::Comment;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

const COMMENT_PAGE_SIZE: i64 = 100;

pub fn create_comment(pool: &DbPool, post_id: i64, author_id: i64, content: &str) -> AppResult<i64> {
    let content = content.trim();
    if post_id <= 0 || author_id <= 0 || content.is_empty() {
        return Err(AppError::InvalidInput(
            "comment content cannot be empty".into(),
        ));
    }

    let conn = pool.get()?;

    let post_exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
        params![post_id],
        |row| row.get(0),
    )?;
    if !post_exists {
        return Err(AppError::NotFound);
    }

    conn.execute(
        "INSERT INTO comments (post_id, author_id, content) VALUES (?1, ?2, ?3)",
        params![post_id, author_id, content],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Comments for a post in thread order (oldest first), capped at 100.
pub fn list_comments(pool: &DbPool, post_id: i64) -> AppResult<Vec<Comment>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, post_id, author_id, content, created_at
         FROM comments
         WHERE post_id = ?1
         ORDER BY created_at ASC, id ASC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![post_id, COMMENT_PAGE_SIZE], |row| {
        Ok(Comment {
            id: row.get(0)?,
            post_id: row.get(1)?,
            author_id: row.get(2)?,
            content: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<Result<_, _>>()?)
}

/// Delete a comment and its reactions, author-only, in one transaction.
pub fn delete_comment(pool: &DbPool, comment_id: i64, user_id: i64) -> AppResult<()> {
    if comment_id <= 0 || user_id <= 0 {
        return Err(AppError::InvalidInput("invalid comment or user id".into()));
    }

    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    let author_id: i64 = tx
        .query_row(
            "SELECT author_id FROM comments WHERE id = ?1",
            params![comment_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(AppError::NotFound)?;

    if author_id != user_id {
        return Err(AppError::Forbidden);
    }

    tx.execute(
        "DELETE FROM comment_likes WHERE comment_id = ?1",
        params![comment_id],
    )?;
    tx.execute("DELETE FROM comments WHERE id = ?1", params![comment_id])?;

    tx.commit()?;
    Ok(())
}
