use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::StreamExt;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::database::{chat_repo, membership_repo};
use crate::error::ChatError;
use crate::services::fanout::ChatEvent;
use crate::services::visibility::VisibilityFilter;
use crate::web::middleware::auth::AuthenticatedUser;
use crate::AppState;

/// Per-chat live update stream. Push-only: new-message and membership-change
/// events flow out; the only inbound frames honored are ping and close.
pub async fn chat_socket_handler(
    Extension(auth): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, ChatError> {
    let chat = chat_repo::get_chat(&state.pool, &chat_id)
        .await?
        .ok_or(ChatError::NotFound)?;
    let member = membership_repo::get_active(&state.pool, &chat.chat_id, &auth.id).await?;
    if member.is_none() && !auth.access_level.is_moderator() {
        return Err(ChatError::NotFound);
    }

    let rx = state.registry.subscribe(&chat_id);
    Ok(ws.on_upgrade(move |socket| run_socket(socket, state.pool.clone(), chat_id, auth, rx)))
}

async fn run_socket(
    mut socket: WebSocket,
    pool: SqlitePool,
    chat_id: String,
    viewer: AuthenticatedUser,
    mut rx: broadcast::Receiver<ChatEvent>,
) {
    debug!(chat_id = %chat_id, user_id = %viewer.id, "live viewer connected");

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    match should_deliver(&pool, &chat_id, &viewer, &event).await {
                        Ok(true) => {}
                        Ok(false) => continue,
                        Err(e) => {
                            warn!(chat_id = %chat_id, error = %e, "delivery check failed; dropping event");
                            continue;
                        }
                    }
                    let Ok(json) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if socket.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Best-effort channel; the durable counters cover the gap.
                    warn!(chat_id = %chat_id, user_id = %viewer.id, skipped, "viewer lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            frame = socket.next() => match frame {
                Some(Ok(Message::Ping(data))) => {
                    if socket.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(other)) => {
                    debug!(chat_id = %chat_id, frame = ?other, "ignoring client frame on push-only socket");
                }
                Some(Err(e)) => {
                    debug!(chat_id = %chat_id, error = %e, "socket error");
                    break;
                }
            },
        }
    }

    debug!(chat_id = %chat_id, user_id = %viewer.id, "live viewer disconnected");
}

/// Re-checks the viewer at send time rather than trusting subscribe-time
/// state: membership may have been revoked and block/mute sets change while
/// the socket is open.
async fn should_deliver(
    pool: &SqlitePool,
    chat_id: &str,
    viewer: &AuthenticatedUser,
    event: &ChatEvent,
) -> Result<bool, ChatError> {
    let Some(chat) = chat_repo::get_chat(pool, chat_id).await? else {
        return Ok(false);
    };

    let member = membership_repo::get_active(pool, &chat.chat_id, &viewer.id).await?;
    if member.is_none() && !viewer.access_level.is_moderator() {
        return Ok(false);
    }

    let filter = VisibilityFilter::for_viewer(pool, &viewer.id).await?;
    Ok(filter.is_visible(event.actor_id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    use crate::database;
    use crate::models::AccessLevel;
    use crate::services::chat_service::{self, CreateChatRequest};
    use crate::services::fanout::ChatRegistry;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        database::init_schema(&pool).await.unwrap();
        pool
    }

    async fn seed_user(pool: &SqlitePool, id: &str, level: i64) {
        sqlx::query(
            "INSERT INTO users (user_id, username, display_name, access_level) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(id)
        .bind(id)
        .bind(level)
        .execute(pool)
        .await
        .unwrap();
    }

    fn viewer(id: &str, level: AccessLevel) -> AuthenticatedUser {
        AuthenticatedUser {
            id: id.to_string(),
            access_level: level,
        }
    }

    async fn seeded_chat(pool: &SqlitePool) -> String {
        seed_user(pool, "alice", AccessLevel::Verified.as_i64()).await;
        seed_user(pool, "bob", AccessLevel::Verified.as_i64()).await;
        let chat = chat_service::create_chat(
            pool,
            &viewer("alice", AccessLevel::Verified),
            None,
            &CreateChatRequest {
                chat_type: "lfgGaming".to_string(),
                title: "night watch trivia".to_string(),
                info: String::new(),
                location: None,
                start_time: None,
                end_time: None,
                min_capacity: 0,
                max_capacity: 0,
                initial_users: vec!["bob".to_string()],
            },
        )
        .await
        .unwrap();
        chat.chat_id
    }

    fn message_from(chat_id: &str, author: &str) -> ChatEvent {
        ChatEvent::NewMessage {
            chat_id: chat_id.to_string(),
            post_id: 1,
            author_id: author.to_string(),
        }
    }

    #[tokio::test]
    async fn delivery_respects_blocks_added_after_subscribe() {
        let pool = test_pool().await;
        let chat_id = seeded_chat(&pool).await;
        let bob = viewer("bob", AccessLevel::Verified);
        let event = message_from(&chat_id, "alice");

        assert!(should_deliver(&pool, &chat_id, &bob, &event).await.unwrap());

        sqlx::query(
            "INSERT INTO user_relations (user_id, target_user_id, relation) VALUES (?, ?, ?)",
        )
        .bind("bob")
        .bind("alice")
        .bind("block")
        .execute(&pool)
        .await
        .unwrap();

        assert!(!should_deliver(&pool, &chat_id, &bob, &event).await.unwrap());
    }

    #[tokio::test]
    async fn delivery_stops_when_membership_is_revoked() {
        let pool = test_pool().await;
        let chat_id = seeded_chat(&pool).await;
        let bob = viewer("bob", AccessLevel::Verified);
        let event = message_from(&chat_id, "alice");

        assert!(should_deliver(&pool, &chat_id, &bob, &event).await.unwrap());

        let registry = ChatRegistry::new();
        chat_service::unjoin_chat(&pool, &registry, &bob, &chat_id)
            .await
            .unwrap();
        assert!(!should_deliver(&pool, &chat_id, &bob, &event).await.unwrap());

        // Moderators keep the feed without holding a membership row.
        seed_user(&pool, "modcat", AccessLevel::Moderator.as_i64()).await;
        let moderator = viewer("modcat", AccessLevel::Moderator);
        assert!(should_deliver(&pool, &chat_id, &moderator, &event)
            .await
            .unwrap());
    }
}
