use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::warn;

use crate::database::{membership_repo, message_repo, user_repo};
use crate::error::ChatError;
use crate::models::{ChatRow, MemberRow, MessageRow};
use crate::services::effective_user::EffectiveUser;
use crate::services::notifications;
use crate::services::visibility::VisibilityFilter;

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 200;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub start: Option<i64>,
    pub start_message_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct Paginator {
    pub start: i64,
    pub limit: i64,
    pub total: i64,
}

pub struct MessagePage {
    pub messages: Vec<MessageRow>,
    pub paginator: Paginator,
    /// The viewer's read counter after this fetch; `None` for non-members.
    pub read_count: Option<i64>,
}

/// Default page start: the viewer's read position rounded down to a page
/// boundary, so repeated calls with no new posts land on the same page.
pub fn page_start(read_count: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    (read_count.max(0) / limit) * limit
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Fetches one page of visible messages and advances the viewer's read
/// counter. The index space is the viewer's own visible sequence, so a block
/// added later never re-indexes already-read history.
pub async fn fetch_page(
    pool: &SqlitePool,
    chat: &ChatRow,
    member: Option<&MemberRow>,
    filter: &VisibilityFilter,
    effective: &EffectiveUser,
    params: &PageParams,
) -> Result<MessagePage, ChatError> {
    let limit = clamp_limit(params.limit);
    let now = Utc::now().to_rfc3339();

    // Counter drift is repaired here, never surfaced as an error.
    let (mut read_count, hidden_count) = match member {
        Some(m) => {
            let mut read = m.read_count;
            if m.read_count + m.hidden_count > chat.post_count {
                read = (chat.post_count - m.hidden_count).max(0);
                warn!(
                    chat_id = %chat.chat_id,
                    user_id = %m.user_id,
                    read_count = m.read_count,
                    hidden_count = m.hidden_count,
                    post_count = chat.post_count,
                    "clamping drifted read counter"
                );
                membership_repo::set_read_count(pool, &chat.chat_id, &m.user_id, read, &now)
                    .await?;
            }
            (read, m.hidden_count)
        }
        None => {
            let mut conn = pool.acquire().await?;
            let hidden =
                message_repo::count_hidden(&mut conn, &chat.chat_id, filter.exclusion_json())
                    .await?;
            (0, hidden)
        }
    };
    let total_visible = (chat.post_count - hidden_count).max(0);

    let start = if let Some(start) = params.start {
        start.max(0)
    } else if let Some(post_id) = params.start_message_id {
        message_repo::count_visible_before(pool, &chat.chat_id, filter.exclusion_json(), post_id)
            .await?
    } else {
        page_start(read_count, limit)
    };

    let messages =
        message_repo::visible_window(pool, &chat.chat_id, filter.exclusion_json(), start, limit)
            .await?;

    if let Some(m) = member {
        // An empty window (a start past the visible tail) advances nothing.
        if !messages.is_empty() {
            let new_read = (start + messages.len() as i64).min(total_visible);
            if new_read > read_count {
                membership_repo::set_read_count(pool, &chat.chat_id, &m.user_id, new_read, &now)
                    .await?;
                read_count = new_read;
            }
        }
        if read_count + hidden_count >= chat.post_count {
            mark_caught_up(pool, chat, effective).await?;
        }
    }

    Ok(MessagePage {
        messages,
        paginator: Paginator {
            start,
            limit,
            total: total_visible,
        },
        read_count: member.map(|_| read_count),
    })
}

/// Fully caught up: lower the viewer's badge. A shared mailbox read counts as
/// read-for-everyone at that privilege level, so every qualifying account
/// gets its badge lowered too; a second team member opening the inbox must
/// not see a stale unread count.
async fn mark_caught_up(
    pool: &SqlitePool,
    chat: &ChatRow,
    effective: &EffectiveUser,
) -> Result<(), ChatError> {
    let chat_type = chat.chat_type();
    notifications::mark_viewed(pool, effective.user_id(), chat_type).await;

    if let Some(mailbox) = effective.shared_mailbox() {
        let peers =
            user_repo::user_ids_at_level(pool, mailbox.required_level().as_i64()).await?;
        for peer in peers {
            if peer != effective.user_id() {
                notifications::mark_viewed(pool, &peer, chat_type).await;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_start_rounds_down_to_page_boundary() {
        assert_eq!(page_start(120, 50), 100);
        assert_eq!(page_start(0, 50), 0);
        assert_eq!(page_start(49, 50), 0);
        assert_eq!(page_start(50, 50), 50);
        assert_eq!(page_start(149, 50), 100);
    }

    #[test]
    fn page_start_tolerates_degenerate_inputs() {
        assert_eq!(page_start(100, 0), 0);
        assert_eq!(page_start(-5, 50), 0);
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(10_000)), MAX_LIMIT);
        assert_eq!(clamp_limit(Some(25)), 25);
    }
}
