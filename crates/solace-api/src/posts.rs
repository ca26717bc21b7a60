use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use solace_types::api::{Claims, CommentView, FeedPost, LikeState, PostContentRequest, SetLikeRequest};
use solace_types::events::{ChangeEvent, ChangeKind, Record};
use solace_types::models::{Like, Post};

use crate::error::ApiError;
use crate::{AppState, blocking, validate_content};

pub async fn get_feed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<FeedPost>>, ApiError> {
    let feed = blocking(&state, move |db| db.feed(claims.sub)).await?;
    Ok(Json(feed))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PostContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = validate_content(&req.content)?;
    let post = blocking(&state, move |db| db.insert_post(Uuid::new_v4(), claims.sub, &content)).await?;

    state
        .dispatcher
        .publish(ChangeEvent::new(ChangeKind::Insert, Record::Post(post.clone())));

    Ok((StatusCode::CREATED, Json(post)))
}

/// Owner-only. The check runs here regardless of what the client showed.
pub async fn edit_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PostContentRequest>,
) -> Result<Json<Post>, ApiError> {
    let content = validate_content(&req.content)?;
    owned_post(&state, post_id, claims.sub).await?;

    let post = blocking(&state, move |db| db.update_post_content(post_id, &content))
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    state
        .dispatcher
        .publish(ChangeEvent::new(ChangeKind::Update, Record::Post(post.clone())));

    Ok(Json(post))
}

/// Owner-only. Comments and likes are removed with the post.
pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let post = owned_post(&state, post_id, claims.sub).await?;

    let removed = blocking(&state, move |db| db.delete_post(post_id)).await?;
    if !removed {
        return Err(ApiError::NotFound("Post"));
    }

    info!("{} deleted post {}", claims.sub, post_id);
    state
        .dispatcher
        .publish(ChangeEvent::new(ChangeKind::Delete, Record::Post(post)));

    Ok(StatusCode::NO_CONTENT)
}

/// Mark a post for moderation review. Any signed-in user may report.
pub async fn flag_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Post>, ApiError> {
    let post = blocking(&state, move |db| db.flag_post(post_id))
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    info!("{} flagged post {}", claims.sub, post_id);
    state
        .dispatcher
        .publish(ChangeEvent::new(ChangeKind::Update, Record::Post(post.clone())));

    Ok(Json(post))
}

/// Bring the caller's like to the requested state. Idempotent.
pub async fn set_like(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetLikeRequest>,
) -> Result<Json<LikeState>, ApiError> {
    let user_id = claims.sub;
    let liked = req.liked;
    let (changed, like_state) = blocking(&state, move |db| {
        if db.get_post(post_id)?.is_none() {
            return Ok(None);
        }
        let changed = db.set_like(post_id, user_id, liked)?;
        Ok(Some((changed, db.like_state(post_id, user_id)?)))
    })
    .await?
    .ok_or(ApiError::NotFound("Post"))?;

    if changed {
        publish_like(&state, post_id, user_id, liked);
    }

    Ok(Json(like_state))
}

/// Flip the caller's like in one transaction.
pub async fn toggle_like(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<LikeState>, ApiError> {
    let user_id = claims.sub;
    let like_state = blocking(&state, move |db| {
        if db.get_post(post_id)?.is_none() {
            return Ok(None);
        }
        db.toggle_like(post_id, user_id)?;
        db.like_state(post_id, user_id).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound("Post"))?;

    publish_like(&state, post_id, user_id, like_state.liked);

    Ok(Json(like_state))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PostContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = validate_content(&req.content)?;
    let comment: CommentView = blocking(&state, move |db| {
        if db.get_post(post_id)?.is_none() {
            return Ok(None);
        }
        db.insert_comment(Uuid::new_v4(), post_id, claims.sub, &content).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound("Post"))?;

    state
        .dispatcher
        .publish(ChangeEvent::new(ChangeKind::Insert, Record::Comment(comment.clone())));

    Ok((StatusCode::CREATED, Json(comment)))
}

/// Load a post and require that `user_id` wrote it.
async fn owned_post(state: &AppState, post_id: Uuid, user_id: Uuid) -> Result<Post, ApiError> {
    let post = blocking(state, move |db| db.get_post(post_id))
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    if post.user_id != user_id {
        warn!("{} attempted to modify post {} owned by {}", user_id, post_id, post.user_id);
        return Err(ApiError::Forbidden("Only the author can modify this post"));
    }
    Ok(post)
}

fn publish_like(state: &AppState, post_id: Uuid, user_id: Uuid, liked: bool) {
    let kind = if liked { ChangeKind::Insert } else { ChangeKind::Delete };
    state
        .dispatcher
        .publish(ChangeEvent::new(kind, Record::Like(Like { post_id, user_id })));
}
