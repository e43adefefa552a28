use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::db::models::{Category, Post};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

/// Options for `list_posts`. All predicates combine with AND.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    /// Exact, case-sensitive category name.
    pub category: Option<String>,
    pub author_id: Option<i64>,
    /// Restrict to posts the given user reacted +1 to.
    pub liked_by: Option<i64>,
    /// Case-insensitive substring match on title or content.
    pub search: Option<String>,
    /// Newest first when set; oldest first otherwise.
    pub order_desc: bool,
    /// Clamped to (0, 100]; out-of-range values fall back to 20.
    pub limit: i64,
    pub offset: i64,
}

/// Create a post and associate its categories in one transaction.
///
/// Missing categories are created on the fly; names match exactly and
/// case-sensitively. Any failure rolls the post insert back too.
pub fn create_post(
    pool: &DbPool,
    author_id: i64,
    title: &str,
    content: &str,
    category_names: &[String],
) -> AppResult<i64> {
    let title = title.trim();
    let content = content.trim();
    if author_id <= 0 || title.is_empty() || content.is_empty() {
        return Err(AppError::InvalidInput(
            "post title and content cannot be empty".into(),
        ));
    }

    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO posts (author_id, title, content) VALUES (?1, ?2, ?3)",
        params![author_id, title, content],
    )?;
    let post_id = tx.last_insert_rowid();

    for raw in category_names {
        let name = raw.trim();
        if name.is_empty() {
            continue;
        }
        let category_id = get_or_create_category(&tx, name)?;
        tx.execute(
            "INSERT OR IGNORE INTO post_categories (post_id, category_id) VALUES (?1, ?2)",
            params![post_id, category_id],
        )?;
    }

    tx.commit()?;
    Ok(post_id)
}

fn get_or_create_category(conn: &Connection, name: &str) -> AppResult<i64> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM categories WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        Some(id) => Ok(id),
        None => {
            conn.execute("INSERT INTO categories (name) VALUES (?1)", params![name])?;
            Ok(conn.last_insert_rowid())
        }
    }
}

pub fn get_post(pool: &DbPool, post_id: i64) -> AppResult<Post> {
    let conn = pool.get()?;

    let post = conn
        .query_row(
            "SELECT id, author_id, title, content, created_at FROM posts WHERE id = ?1",
            params![post_id],
            row_to_post,
        )
        .optional()?
        .ok_or(AppError::NotFound)?;

    attach_categories(&conn, post)
}

/// List posts matching a filter, each annotated with its category names.
pub fn list_posts(pool: &DbPool, filter: &PostFilter) -> AppResult<Vec<Post>> {
    let conn = pool.get()?;

    let mut sql = String::from(
        "SELECT DISTINCT p.id, p.author_id, p.title, p.content, p.created_at
         FROM posts p
         LEFT JOIN post_categories pc ON pc.post_id = p.id
         LEFT JOIN categories c ON c.id = pc.category_id ",
    );
    let mut args: Vec<Value> = Vec::new();

    if let Some(user_id) = filter.liked_by {
        sql.push_str(" JOIN post_likes pl ON pl.post_id = p.id AND pl.user_id = ? AND pl.reaction = 1 ");
        args.push(Value::Integer(user_id));
    }

    let mut predicates: Vec<&str> = Vec::new();
    if let Some(ref name) = filter.category {
        predicates.push("c.name = ?");
        args.push(Value::Text(name.clone()));
    }
    if let Some(author_id) = filter.author_id {
        predicates.push("p.author_id = ?");
        args.push(Value::Integer(author_id));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim) {
        if !search.is_empty() {
            predicates.push("(p.title LIKE ? OR p.content LIKE ?)");
            let pattern = format!("%{}%", search);
            args.push(Value::Text(pattern.clone()));
            args.push(Value::Text(pattern));
        }
    }

    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }

    if filter.order_desc {
        sql.push_str(" ORDER BY p.created_at DESC, p.id DESC ");
    } else {
        sql.push_str(" ORDER BY p.created_at ASC, p.id ASC ");
    }

    let limit = if filter.limit <= 0 || filter.limit > 100 {
        20
    } else {
        filter.limit
    };
    let offset = filter.offset.max(0);
    sql.push_str(" LIMIT ? OFFSET ?");
    args.push(Value::Integer(limit));
    args.push(Value::Integer(offset));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), row_to_post)?;

    let mut posts = Vec::new();
    for row in rows {
        posts.push(attach_categories(&conn, row?)?);
    }
    Ok(posts)
}

/// Delete a post and everything hanging off it, author-only.
///
/// Children go first so the whole unit succeeds or rolls back as one:
/// post_likes, likes on its comments, comments, category links, post.
pub fn delete_post(pool: &DbPool, post_id: i64, user_id: i64) -> AppResult<()> {
    if post_id <= 0 || user_id <= 0 {
        return Err(AppError::InvalidInput("invalid post or user id".into()));
    }

    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    let author_id: i64 = tx
        .query_row(
            "SELECT author_id FROM posts WHERE id = ?1",
            params![post_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(AppError::NotFound)?;

    if author_id != user_id {
        return Err(AppError::Forbidden);
    }

    tx.execute("DELETE FROM post_likes WHERE post_id = ?1", params![post_id])?;
    tx.execute(
        "DELETE FROM comment_likes
         WHERE comment_id IN (SELECT id FROM comments WHERE post_id = ?1)",
        params![post_id],
    )?;
    tx.execute("DELETE FROM comments WHERE post_id = ?1", params![post_id])?;
    tx.execute(
        "DELETE FROM post_categories WHERE post_id = ?1",
        params![post_id],
    )?;
    tx.execute("DELETE FROM posts WHERE id = ?1", params![post_id])?;

    tx.commit()?;
    Ok(())
}

pub fn list_categories(pool: &DbPool) -> AppResult<Vec<Category>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok(Category {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<Result<_, _>>()?)
}

fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        author_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        categories: Vec::new(),
    })
}

fn attach_categories(conn: &Connection, mut post: Post) -> AppResult<Post> {
    let mut stmt = conn.prepare(
        "SELECT c.name FROM post_categories pc
         JOIN categories c ON c.id = pc.category_id
         WHERE pc.post_id = ?1
         ORDER BY c.name",
    )?;
    let rows = stmt.query_map(params![post.id], |row| row.get(0))?;
    post.categories = rows.collect::<Result<_, _>>()?;
    Ok(post)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::register;
    use crate::db::test_pool;
    use crate::forum::comments::{create_comment, list_comments};
    use crate::forum::reactions::{set_reaction, ReactionTarget};
    use crate::state::DbPool;

    fn seed_user(pool: &DbPool, email: &str, username: &str) -> i64 {
        register(pool, email, username, "secret1").unwrap()
    }

    #[test]
    fn create_then_get_round_trips() {
        let pool = test_pool();
        let alice = seed_user(&pool, "a@x.com", "alice");

        let post_id = create_post(&pool, alice, "Hello", "World", &[]).unwrap();
        let post = get_post(&pool, post_id).unwrap();
        assert_eq!(post.title, "Hello");
        assert_eq!(post.content, "World");
        assert_eq!(post.author_id, alice);
        assert!(post.categories.is_empty());
    }

    #[test]
    fn create_trims_and_rejects_empty() {
        let pool = test_pool();
        let alice = seed_user(&pool, "a@x.com", "alice");

        let post_id = create_post(&pool, alice, "  Hello  ", "  World  ", &[]).unwrap();
        let post = get_post(&pool, post_id).unwrap();
        assert_eq!(post.title, "Hello");
        assert_eq!(post.content, "World");

        assert!(matches!(
            create_post(&pool, alice, "   ", "body", &[]),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            create_post(&pool, alice, "title", "", &[]),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            create_post(&pool, 0, "title", "body", &[]),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn categories_are_created_on_demand_and_reused() {
        let pool = test_pool();
        let alice = seed_user(&pool, "a@x.com", "alice");

        let first = create_post(
            &pool,
            alice,
            "One",
            "body",
            &["General".into(), "rustlang".into()],
        )
        .unwrap();
        let second = create_post(&pool, alice, "Two", "body", &["rustlang".into()]).unwrap();

        assert_eq!(
            get_post(&pool, first).unwrap().categories,
            vec!["General", "rustlang"]
        );
        assert_eq!(get_post(&pool, second).unwrap().categories, vec!["rustlang"]);

        // "rustlang" was created once; seed categories still present
        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM categories WHERE name = 'rustlang'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn category_matching_is_case_sensitive() {
        let pool = test_pool();
        let alice = seed_user(&pool, "a@x.com", "alice");

        create_post(&pool, alice, "One", "body", &["tech".into()]).unwrap();
        create_post(&pool, alice, "Two", "body", &["Tech".into()]).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM categories WHERE name IN ('tech', 'Tech')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn duplicate_category_names_collapse_to_one_link() {
        let pool = test_pool();
        let alice = seed_user(&pool, "a@x.com", "alice");

        let post_id = create_post(
            &pool,
            alice,
            "One",
            "body",
            &["General".into(), "General".into(), "  ".into()],
        )
        .unwrap();
        assert_eq!(get_post(&pool, post_id).unwrap().categories, vec!["General"]);
    }

    #[test]
    fn get_missing_post_is_not_found() {
        let pool = test_pool();
        assert!(matches!(get_post(&pool, 42), Err(AppError::NotFound)));
    }

    #[test]
    fn list_filters_by_category_and_author() {
        let pool = test_pool();
        let alice = seed_user(&pool, "a@x.com", "alice");
        let bob = seed_user(&pool, "b@x.com", "bob");

        create_post(&pool, alice, "Alice tech", "body", &["Technology".into()]).unwrap();
        create_post(&pool, alice, "Alice general", "body", &["General".into()]).unwrap();
        create_post(&pool, bob, "Bob tech", "body", &["Technology".into()]).unwrap();

        let tech = list_posts(
            &pool,
            &PostFilter {
                category: Some("Technology".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(tech.len(), 2);

        let alice_tech = list_posts(
            &pool,
            &PostFilter {
                category: Some("Technology".into()),
                author_id: Some(alice),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(alice_tech.len(), 1);
        assert_eq!(alice_tech[0].title, "Alice tech");
    }

    #[test]
    fn list_filters_by_liked_posts() {
        let pool = test_pool();
        let alice = seed_user(&pool, "a@x.com", "alice");
        let bob = seed_user(&pool, "b@x.com", "bob");

        let liked = create_post(&pool, alice, "Liked", "body", &[]).unwrap();
        let disliked = create_post(&pool, alice, "Disliked", "body", &[]).unwrap();
        create_post(&pool, alice, "Ignored", "body", &[]).unwrap();

        set_reaction(&pool, ReactionTarget::Post, bob, liked, 1).unwrap();
        set_reaction(&pool, ReactionTarget::Post, bob, disliked, -1).unwrap();

        let posts = list_posts(
            &pool,
            &PostFilter {
                liked_by: Some(bob),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "Liked");
    }

    #[test]
    fn list_search_is_case_insensitive_substring() {
        let pool = test_pool();
        let alice = seed_user(&pool, "a@x.com", "alice");

        create_post(&pool, alice, "Rust tips", "borrow checker", &[]).unwrap();
        create_post(&pool, alice, "Gardening", "growing rust-colored roses", &[]).unwrap();
        create_post(&pool, alice, "Cooking", "pasta", &[]).unwrap();

        let posts = list_posts(
            &pool,
            &PostFilter {
                search: Some("RUST".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(posts.len(), 2);
    }

    #[test]
    fn list_clamps_limit_and_offset() {
        let pool = test_pool();
        let alice = seed_user(&pool, "a@x.com", "alice");
        for i in 0..25 {
            create_post(&pool, alice, &format!("Post {}", i), "body", &[]).unwrap();
        }

        // Out-of-range limit falls back to the default of 20
        let defaulted = list_posts(
            &pool,
            &PostFilter {
                limit: 500,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(defaulted.len(), 20);

        let paged = list_posts(
            &pool,
            &PostFilter {
                limit: 10,
                offset: 20,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(paged.len(), 5);

        // Negative offset is treated as zero
        let clamped = list_posts(
            &pool,
            &PostFilter {
                limit: 10,
                offset: -5,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(clamped.len(), 10);
    }

    #[test]
    fn list_order_descending_reverses() {
        let pool = test_pool();
        let alice = seed_user(&pool, "a@x.com", "alice");
        let first = create_post(&pool, alice, "first", "body", &[]).unwrap();
        let last = create_post(&pool, alice, "last", "body", &[]).unwrap();

        let asc = list_posts(&pool, &PostFilter::default()).unwrap();
        assert_eq!(asc.first().unwrap().id, first);

        let desc = list_posts(
            &pool,
            &PostFilter {
                order_desc: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(desc.first().unwrap().id, last);
    }

    #[test]
    fn delete_by_non_author_is_forbidden_and_leaves_everything() {
        let pool = test_pool();
        let alice = seed_user(&pool, "a@x.com", "alice");
        let bob = seed_user(&pool, "b@x.com", "bob");

        let post_id = create_post(&pool, alice, "Hello", "World", &["General".into()]).unwrap();
        let comment_id = create_comment(&pool, post_id, bob, "nice").unwrap();
        set_reaction(&pool, ReactionTarget::Post, bob, post_id, 1).unwrap();
        set_reaction(&pool, ReactionTarget::Comment, alice, comment_id, 1).unwrap();

        assert!(matches!(
            delete_post(&pool, post_id, bob),
            Err(AppError::Forbidden)
        ));

        // Everything still in place
        assert!(get_post(&pool, post_id).is_ok());
        assert_eq!(list_comments(&pool, post_id).unwrap().len(), 1);
        let conn = pool.get().unwrap();
        let likes: i64 = conn
            .query_row("SELECT COUNT(*) FROM post_likes", [], |row| row.get(0))
            .unwrap();
        assert_eq!(likes, 1);
    }

    #[test]
    fn delete_missing_post_is_not_found() {
        let pool = test_pool();
        let alice = seed_user(&pool, "a@x.com", "alice");
        assert!(matches!(
            delete_post(&pool, 42, alice),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn delete_by_author_cascades() {
        let pool = test_pool();
        let alice = seed_user(&pool, "a@x.com", "alice");
        let bob = seed_user(&pool, "b@x.com", "bob");

        let post_id = create_post(&pool, alice, "Hello", "World", &["General".into()]).unwrap();
        let comment_id = create_comment(&pool, post_id, bob, "nice").unwrap();
        set_reaction(&pool, ReactionTarget::Post, bob, post_id, 1).unwrap();
        set_reaction(&pool, ReactionTarget::Comment, alice, comment_id, -1).unwrap();

        delete_post(&pool, post_id, alice).unwrap();

        assert!(matches!(get_post(&pool, post_id), Err(AppError::NotFound)));
        assert!(list_comments(&pool, post_id).unwrap().is_empty());

        let conn = pool.get().unwrap();
        for table in ["post_likes", "comment_likes", "post_categories", "comments"] {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })
                .unwrap();
            assert_eq!(count, 0, "{} not emptied", table);
        }
        // The category itself survives; only the link is gone
        let cats: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM categories WHERE name = 'General'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(cats, 1);
    }

    #[test]
    fn list_categories_includes_seeds_sorted() {
        let pool = test_pool();
        let names: Vec<String> = list_categories(&pool)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(
            names,
            vec!["Entertainment", "Gaming", "General", "Sports", "Technology"]
        );
    }
}
