use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;
use sqlx::SqlitePool;

use crate::error::ChatError;
use crate::models::ChatRow;
use crate::services::chat_service::{
    self, ChatDetail, ChatListItem, ChatsQuery, CreateChatRequest, UpdateChatRequest,
};
use crate::services::pagination::PageParams;
use crate::web::middleware::auth::AuthenticatedUser;
use crate::AppState;

fn chat_summary(chat: &ChatRow) -> Value {
    let (seated, waitlisted) = chat.seated_split();
    serde_json::json!({
        "chat_id": chat.chat_id,
        "chat_type": chat.chat_type,
        "owner_id": chat.owner_id,
        "title": chat.title,
        "cancelled": chat.is_cancelled(),
        "seated_count": seated.len(),
        "waitlist_count": waitlisted.len(),
        "post_count": chat.post_count,
    })
}

pub async fn open_chats_handler(
    Extension(auth): Extension<AuthenticatedUser>,
    State(pool): State<SqlitePool>,
    Query(query): Query<ChatsQuery>,
) -> Result<Json<Vec<ChatListItem>>, ChatError> {
    chat_service::list_open(&pool, &auth, &query).await.map(Json)
}

pub async fn joined_chats_handler(
    Extension(auth): Extension<AuthenticatedUser>,
    State(pool): State<SqlitePool>,
    Query(query): Query<ChatsQuery>,
) -> Result<Json<Vec<ChatListItem>>, ChatError> {
    chat_service::list_joined(&pool, &auth, &query)
        .await
        .map(Json)
}

pub async fn owner_chats_handler(
    Extension(auth): Extension<AuthenticatedUser>,
    State(pool): State<SqlitePool>,
    Query(query): Query<ChatsQuery>,
) -> Result<Json<Vec<ChatListItem>>, ChatError> {
    chat_service::list_owner(&pool, &auth, &query)
        .await
        .map(Json)
}

#[derive(Debug, Deserialize, Default)]
pub struct ForUserQuery {
    pub for_user: Option<String>,
}

pub async fn create_chat_handler(
    Extension(auth): Extension<AuthenticatedUser>,
    State(pool): State<SqlitePool>,
    Query(query): Query<ForUserQuery>,
    Json(body): Json<CreateChatRequest>,
) -> Result<Json<Value>, ChatError> {
    let chat = chat_service::create_chat(&pool, &auth, query.for_user.as_deref(), &body).await?;
    Ok(Json(chat_summary(&chat)))
}

#[derive(Debug, Deserialize, Default)]
pub struct ChatDetailQuery {
    pub limit: Option<i64>,
    pub start: Option<i64>,
    pub start_message_id: Option<i64>,
    pub for_user: Option<String>,
}

pub async fn chat_detail_handler(
    Extension(auth): Extension<AuthenticatedUser>,
    State(pool): State<SqlitePool>,
    Path(chat_id): Path<String>,
    Query(query): Query<ChatDetailQuery>,
) -> Result<Json<ChatDetail>, ChatError> {
    let page = PageParams {
        limit: query.limit,
        start: query.start,
        start_message_id: query.start_message_id,
    };
    chat_service::chat_detail(&pool, &auth, &chat_id, query.for_user.as_deref(), &page)
        .await
        .map(Json)
}

pub async fn update_chat_handler(
    Extension(auth): Extension<AuthenticatedUser>,
    State(pool): State<SqlitePool>,
    Path(chat_id): Path<String>,
    Query(query): Query<ForUserQuery>,
    Json(body): Json<UpdateChatRequest>,
) -> Result<Json<Value>, ChatError> {
    let chat =
        chat_service::update_chat(&pool, &auth, &chat_id, query.for_user.as_deref(), &body)
            .await?;
    Ok(Json(chat_summary(&chat)))
}

pub async fn cancel_chat_handler(
    Extension(auth): Extension<AuthenticatedUser>,
    State(pool): State<SqlitePool>,
    Path(chat_id): Path<String>,
    Query(query): Query<ForUserQuery>,
) -> Result<Json<Value>, ChatError> {
    let chat =
        chat_service::cancel_chat(&pool, &auth, &chat_id, query.for_user.as_deref()).await?;
    Ok(Json(chat_summary(&chat)))
}

pub async fn delete_chat_handler(
    Extension(auth): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Json<Value>, ChatError> {
    chat_service::delete_chat(&state.pool, &auth, &chat_id).await?;
    Ok(Json(serde_json::json!({ "status": "deleted" })))
}
