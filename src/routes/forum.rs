use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::forum::details::{get_post_detail, list_comments_with_details, list_posts_with_details};
use crate::forum::posts::{self, PostFilter};
use crate::forum::comments;
use crate::forum::reactions::{count_reactions, set_reaction, viewer_reaction, ReactionTarget};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Deserialize)]
pub struct ReactionRequest {
    pub value: i64,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ListQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    /// Only the requesting user's own posts.
    pub mine: bool,
    /// Only posts the requesting user liked.
    pub liked: bool,
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/{id}", get(get_post).delete(delete_post))
        .route(
            "/posts/{id}/comments",
            get(list_comments).post(create_comment),
        )
        .route("/posts/{id}/reaction", post(react_to_post))
        .route("/comments/{id}", delete(delete_comment))
        .route("/comments/{id}/reaction", post(react_to_comment))
}

async fn list_categories(State(state): State<AppState>) -> AppResult<Response> {
    let categories = posts::list_categories(&state.db)?;
    Ok(Json(categories).into_response())
}

async fn list_posts(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Response> {
    let viewer = user.as_ref().map(|u| u.id);

    // "mine" and "liked" are resolved against the session, never a
    // caller-supplied user id
    let mut filter = PostFilter {
        category: query.category,
        search: query.search,
        order_desc: query.order.as_deref() != Some("asc"),
        limit: query.limit.unwrap_or(0),
        offset: query.offset.unwrap_or(0),
        ..Default::default()
    };
    if query.mine {
        filter.author_id = Some(viewer.ok_or(AppError::InvalidSession)?);
    }
    if query.liked {
        filter.liked_by = Some(viewer.ok_or(AppError::InvalidSession)?);
    }

    let details = list_posts_with_details(&state.db, &filter, viewer)?;
    Ok(Json(details).into_response())
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<Response> {
    let post_id = posts::create_post(&state.db, user.id, &req.title, &req.content, &req.categories)?;
    Ok((StatusCode::CREATED, Json(json!({ "id": post_id }))).into_response())
}

async fn get_post(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let viewer = user.as_ref().map(|u| u.id);
    let detail = get_post_detail(&state.db, id, viewer)?;
    Ok(Json(detail).into_response())
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    posts::delete_post(&state.db, id, user.id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn list_comments(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(post_id): Path<i64>,
) -> AppResult<Response> {
    let viewer = user.as_ref().map(|u| u.id);
    let details = list_comments_with_details(&state.db, post_id, viewer)?;
    Ok(Json(details).into_response())
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<Response> {
    let comment_id = comments::create_comment(&state.db, post_id, user.id, &req.content)?;
    Ok((StatusCode::CREATED, Json(json!({ "id": comment_id }))).into_response())
}

async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    comments::delete_comment(&state.db, id, user.id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn react_to_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
    Json(req): Json<ReactionRequest>,
) -> AppResult<Response> {
    react(&state, ReactionTarget::Post, user.id, post_id, req.value)
}

async fn react_to_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(comment_id): Path<i64>,
    Json(req): Json<ReactionRequest>,
) -> AppResult<Response> {
    react(&state, ReactionTarget::Comment, user.id, comment_id, req.value)
}

fn react(
    state: &AppState,
    target: ReactionTarget,
    user_id: i64,
    target_id: i64,
    value: i64,
) -> AppResult<Response> {
    set_reaction(&state.db, target, user_id, target_id, value)?;
    let counts = count_reactions(&state.db, target, target_id)?;
    let own = viewer_reaction(&state.db, target, user_id, target_id)?;
    Ok(Json(json!({
        "likes": counts.likes,
        "dislikes": counts.dislikes,
        "viewer_reaction": own,
    }))
    .into_response())
}
