use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde_json::Value;

use crate::error::ChatError;
use crate::services::chat_service;
use crate::web::middleware::auth::AuthenticatedUser;
use crate::web::routes::chats::ForUserQuery;
use crate::AppState;

fn member_summary(chat: &crate::models::ChatRow) -> Value {
    let (seated, waitlisted) = chat.seated_split();
    serde_json::json!({
        "chat_id": chat.chat_id,
        "seated": seated,
        "waitlisted": waitlisted,
    })
}

pub async fn join_chat_handler(
    Extension(auth): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Json<Value>, ChatError> {
    let chat = chat_service::join_chat(&state.pool, &state.registry, &auth, &chat_id).await?;
    Ok(Json(member_summary(&chat)))
}

pub async fn unjoin_chat_handler(
    Extension(auth): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Json<Value>, ChatError> {
    let chat = chat_service::unjoin_chat(&state.pool, &state.registry, &auth, &chat_id).await?;
    Ok(Json(member_summary(&chat)))
}

pub async fn add_member_handler(
    Extension(auth): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Path((chat_id, user_id)): Path<(String, String)>,
    Query(query): Query<ForUserQuery>,
) -> Result<Json<Value>, ChatError> {
    let chat = chat_service::add_member(
        &state.pool,
        &state.registry,
        &auth,
        &chat_id,
        &user_id,
        query.for_user.as_deref(),
    )
    .await?;
    Ok(Json(member_summary(&chat)))
}

pub async fn remove_member_handler(
    Extension(auth): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Path((chat_id, user_id)): Path<(String, String)>,
    Query(query): Query<ForUserQuery>,
) -> Result<Json<Value>, ChatError> {
    let chat = chat_service::remove_member(
        &state.pool,
        &state.registry,
        &auth,
        &chat_id,
        &user_id,
        query.for_user.as_deref(),
    )
    .await?;
    Ok(Json(member_summary(&chat)))
}

pub async fn mute_chat_handler(
    Extension(auth): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Json<Value>, ChatError> {
    chat_service::set_chat_muted(&state.pool, &auth, &chat_id, true).await?;
    Ok(Json(serde_json::json!({ "status": "muted" })))
}

pub async fn unmute_chat_handler(
    Extension(auth): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Json<Value>, ChatError> {
    chat_service::set_chat_muted(&state.pool, &auth, &chat_id, false).await?;
    Ok(Json(serde_json::json!({ "status": "unmuted" })))
}
