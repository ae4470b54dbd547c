use sqlx::SqlitePool;
use tracing::warn;

use crate::database::notification_repo;
use crate::models::ChatType;

/// Unread-badge counter key per chat group. Clients subscribe to these keys.
pub fn counter_key(chat_type: ChatType) -> &'static str {
    if chat_type.is_seamail() {
        "seamail_unread"
    } else if chat_type.is_event() {
        "event_unread"
    } else {
        "lfg_unread"
    }
}

// The wrappers below never propagate storage errors: badge counters are
// secondary to the message/chat write of record, and drift is repaired by
// read-time clamping.

pub async fn increment(pool: &SqlitePool, user_id: &str, chat_type: ChatType) {
    let key = counter_key(chat_type);
    if let Err(e) = notification_repo::increment(pool, user_id, key).await {
        warn!(user_id = %user_id, counter_key = %key, error = %e, "notification increment failed");
    }
}

pub async fn decrement(pool: &SqlitePool, user_id: &str, chat_type: ChatType, amount: i64) {
    let key = counter_key(chat_type);
    if let Err(e) = notification_repo::decrement(pool, user_id, key, amount).await {
        warn!(user_id = %user_id, counter_key = %key, error = %e, "notification decrement failed");
    }
}

pub async fn mark_viewed(pool: &SqlitePool, user_id: &str, chat_type: ChatType) {
    let key = counter_key(chat_type);
    if let Err(e) = notification_repo::mark_viewed(pool, user_id, key).await {
        warn!(user_id = %user_id, counter_key = %key, error = %e, "notification mark-viewed failed");
    }
}
