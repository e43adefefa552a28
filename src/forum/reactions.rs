use rusqlite::{params, OptionalExtension};

use crate::db::models::ReactionCounts;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

/// What a reaction attaches to. Posts and comments share one reaction
/// implementation; the target picks the backing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionTarget {
    Post,
    Comment,
}

impl ReactionTarget {
    fn table(self) -> &'static str {
        match self {
            ReactionTarget::Post => "post_likes",
            ReactionTarget::Comment => "comment_likes",
        }
    }

    fn id_column(self) -> &'static str {
        match self {
            ReactionTarget::Post => "post_id",
            ReactionTarget::Comment => "comment_id",
        }
    }
}

/// Set a user's reaction on a target: +1 like, -1 dislike, 0 clears.
///
/// Neutral is stored as row absence, so 0 deletes. ±1 upserts through the
/// (user, target) uniqueness constraint, which also makes concurrent
/// toggles race-safe and repeated identical calls idempotent.
pub fn set_reaction(
    pool: &DbPool,
    target: ReactionTarget,
    user_id: i64,
    target_id: i64,
    value: i64,
) -> AppResult<()> {
    if user_id <= 0 || target_id <= 0 {
        return Err(AppError::InvalidInput("invalid ids".into()));
    }
    if !matches!(value, -1 | 0 | 1) {
        return Err(AppError::InvalidInput("invalid reaction value".into()));
    }

    let conn = pool.get()?;

    if value == 0 {
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE user_id = ?1 AND {} = ?2",
                target.table(),
                target.id_column()
            ),
            params![user_id, target_id],
        )?;
        return Ok(());
    }

    conn.execute(
        &format!(
            "INSERT INTO {table} (user_id, {id_col}, reaction) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, {id_col}) DO UPDATE SET reaction = excluded.reaction",
            table = target.table(),
            id_col = target.id_column()
        ),
        params![user_id, target_id, value],
    )?;
    Ok(())
}

/// Like/dislike totals for a target. An unknown target counts as {0,0}.
pub fn count_reactions(
    pool: &DbPool,
    target: ReactionTarget,
    target_id: i64,
) -> AppResult<ReactionCounts> {
    let conn = pool.get()?;
    let counts = conn.query_row(
        &format!(
            "SELECT
                COUNT(CASE WHEN reaction = 1 THEN 1 END),
                COUNT(CASE WHEN reaction = -1 THEN 1 END)
             FROM {} WHERE {} = ?1",
            target.table(),
            target.id_column()
        ),
        params![target_id],
        |row| {
            Ok(ReactionCounts {
                likes: row.get(0)?,
                dislikes: row.get(1)?,
            })
        },
    )?;
    Ok(counts)
}

/// The viewer's own stored reaction on a target, if any.
pub fn viewer_reaction(
    pool: &DbPool,
    target: ReactionTarget,
    user_id: i64,
    target_id: i64,
) -> AppResult<Option<i64>> {
    let conn = pool.get()?;
    let reaction = conn
        .query_row(
            &format!(
                "SELECT reaction FROM {} WHERE user_id = ?1 AND {} = ?2",
                target.table(),
                target.id_column()
            ),
            params![user_id, target_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(reaction)
}
