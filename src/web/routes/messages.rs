use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ChatError;
use crate::services::message_service::{self, PostMessageRequest};
use crate::web::middleware::auth::AuthenticatedUser;
use crate::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct ForUserQuery {
    pub for_user: Option<String>,
}

pub async fn post_message_handler(
    Extension(auth): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Query(query): Query<ForUserQuery>,
    Json(body): Json<PostMessageRequest>,
) -> Result<Json<Value>, ChatError> {
    let message = message_service::post_message(
        &state.pool,
        &state.registry,
        &auth,
        &chat_id,
        query.for_user.as_deref(),
        &body,
    )
    .await?;

    Ok(Json(serde_json::json!({
        "post_id": message.post_id,
        "chat_id": message.chat_id,
        "author_id": message.author_id,
        "text": message.text,
        "image": message.image,
        "created_at": message.created_at,
    })))
}

pub async fn delete_message_handler(
    Extension(auth): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Query(query): Query<ForUserQuery>,
) -> Result<Json<Value>, ChatError> {
    message_service::delete_message(&state.pool, &auth, post_id, query.for_user.as_deref())
        .await?;
    Ok(Json(serde_json::json!({ "status": "deleted" })))
}

pub async fn pin_message_handler(
    Extension(auth): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<Value>, ChatError> {
    message_service::set_message_pinned(&state.pool, &auth, post_id, true).await?;
    Ok(Json(serde_json::json!({ "status": "pinned" })))
}

pub async fn unpin_message_handler(
    Extension(auth): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<Value>, ChatError> {
    message_service::set_message_pinned(&state.pool, &auth, post_id, false).await?;
    Ok(Json(serde_json::json!({ "status": "unpinned" })))
}
