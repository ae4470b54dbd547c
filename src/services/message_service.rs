use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::database::{chat_repo, membership_repo, message_repo, user_repo};
use crate::error::ChatError;
use crate::models::{AccessLevel, ChatRow, MemberRow, MessageRow};
use crate::services::effective_user;
use crate::services::fanout::{ChatEvent, ChatRegistry};
use crate::services::notifications;
use crate::services::visibility::VisibilityFilter;
use crate::web::middleware::auth::AuthenticatedUser;

const MAX_TEXT_LEN: usize = 2048;

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub text: String,
    pub image: Option<String>,
}

fn member_ids_json(members: &[MemberRow]) -> String {
    let ids: Vec<&str> = members.iter().map(|m| m.user_id.as_str()).collect();
    serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string())
}

/// Posts a message. The message row and the chat's cached counters are the
/// operation of record (one transaction); the per-member counter fan-out that
/// follows is best-effort, with failures logged and repaired at read time.
pub async fn post_message(
    pool: &SqlitePool,
    registry: &ChatRegistry,
    auth: &AuthenticatedUser,
    chat_id: &str,
    for_user: Option<&str>,
    req: &PostMessageRequest,
) -> Result<MessageRow, ChatError> {
    let chat = chat_repo::get_chat(pool, chat_id)
        .await?
        .ok_or(ChatError::NotFound)?;

    if auth.access_level == AccessLevel::Quarantined {
        return Err(ChatError::permission("account is quarantined"));
    }

    let effective = effective_user::resolve_for_chat(pool, auth, for_user, &chat).await?;
    let author_id = effective.user_id().to_string();

    let member = membership_repo::get_active(pool, chat_id, &author_id).await?;
    if member.is_none() && !auth.access_level.is_moderator() {
        // Non-members never learn that a private chat exists.
        if chat.chat_type().is_lfg() {
            return Err(ChatError::permission("not a member of this chat"));
        }
        return Err(ChatError::NotFound);
    }

    let text = req.text.trim();
    if text.is_empty() {
        return Err(ChatError::validation("message text must not be empty"));
    }
    if text.len() > MAX_TEXT_LEN {
        return Err(ChatError::validation("message text too long"));
    }
    if req.image.is_some() && chat.chat_type().is_seamail() {
        return Err(ChatError::validation(
            "images are not allowed in this chat type",
        ));
    }

    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;
    let post_id =
        message_repo::insert(&mut tx, chat_id, &author_id, text, req.image.as_deref(), &now)
            .await?;
    chat_repo::record_post(&mut tx, chat_id, post_id, &now).await?;
    tx.commit().await?;

    let new_post_count = chat.post_count + 1;

    // Writing implies having read everything posted so far.
    if let Some(m) = &member {
        let caught_up = (new_post_count - m.hidden_count).max(0);
        if let Err(e) =
            membership_repo::set_read_count(pool, chat_id, &author_id, caught_up, &now).await
        {
            warn!(chat_id = %chat_id, user_id = %author_id, error = %e, "poster read-count update failed");
        }
    }

    fan_out_post(pool, &chat, &author_id, &now).await;

    registry.publish(
        chat_id,
        ChatEvent::NewMessage {
            chat_id: chat_id.to_string(),
            post_id,
            author_id: author_id.clone(),
        },
    );
    info!(chat_id = %chat_id, post_id, author = %author_id, "message posted");

    message_repo::get(pool, post_id)
        .await?
        .ok_or(ChatError::NotFound)
}

/// Per-member accounting for a new post: members who block or mute the author
/// get a hidden-count bump (the post is invisible to them); everyone else
/// gets an unread-badge increment unless they muted the chat. Each row is an
/// isolated update; one failure is logged and the rest proceed.
async fn fan_out_post(pool: &SqlitePool, chat: &ChatRow, author_id: &str, now: &str) {
    let members = match membership_repo::list_active(pool, &chat.chat_id).await {
        Ok(members) => members,
        Err(e) => {
            warn!(chat_id = %chat.chat_id, error = %e, "post fan-out: member listing failed");
            return;
        }
    };
    let others: Vec<MemberRow> = members
        .into_iter()
        .filter(|m| m.user_id != author_id)
        .collect();
    if others.is_empty() {
        return;
    }

    let hiders = match user_repo::members_hiding_author(pool, author_id, &member_ids_json(&others))
        .await
    {
        Ok(hiders) => hiders,
        Err(e) => {
            warn!(chat_id = %chat.chat_id, error = %e, "post fan-out: relation lookup failed");
            return;
        }
    };

    let chat_type = chat.chat_type();
    for m in &others {
        if hiders.iter().any(|h| h == &m.user_id) {
            if let Err(e) =
                membership_repo::bump_hidden(pool, &chat.chat_id, &m.user_id, 1, now).await
            {
                warn!(chat_id = %chat.chat_id, user_id = %m.user_id, error = %e, "post fan-out: hidden-count bump failed");
            }
        } else if !m.is_muted() {
            for user_id in badge_targets(pool, &m.user_id, author_id).await {
                notifications::increment(pool, &user_id, chat_type).await;
            }
        }
    }
}

/// A personal member gets their own badge raised; a shared-mailbox member
/// stands in for every account at or above the mailbox's gating level.
async fn badge_targets(pool: &SqlitePool, member_id: &str, author_id: &str) -> Vec<String> {
    match effective_user::mailbox_for_user_id(pool, member_id).await {
        Ok(Some(mailbox)) => {
            match user_repo::user_ids_at_level(pool, mailbox.required_level().as_i64()).await {
                Ok(peers) => peers
                    .into_iter()
                    .filter(|p| p != author_id && p != member_id)
                    .collect(),
                Err(e) => {
                    warn!(member_id = %member_id, error = %e, "mailbox peer lookup failed");
                    Vec::new()
                }
            }
        }
        Ok(None) => vec![member_id.to_string()],
        Err(e) => {
            warn!(member_id = %member_id, error = %e, "mailbox lookup failed");
            vec![member_id.to_string()]
        }
    }
}

/// Deletes a message and walks every member's counters back: hidden-count for
/// members the post was invisible to, read-count for members who had read
/// past it, unread badge for members who had not.
pub async fn delete_message(
    pool: &SqlitePool,
    auth: &AuthenticatedUser,
    post_id: i64,
    for_user: Option<&str>,
) -> Result<(), ChatError> {
    let message = message_repo::get(pool, post_id)
        .await?
        .ok_or(ChatError::NotFound)?;
    let chat = chat_repo::get_chat(pool, &message.chat_id)
        .await?
        .ok_or(ChatError::NotFound)?;

    let effective = effective_user::resolve_for_chat(pool, auth, for_user, &chat).await?;
    let is_author = message.author_id == effective.user_id();
    if !is_author && !auth.access_level.is_moderator() {
        return Err(ChatError::permission("not the author of this message"));
    }

    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;
    message_repo::soft_delete(&mut tx, post_id, &now).await?;
    chat_repo::record_post_delete(&mut tx, &chat.chat_id, &now).await?;
    tx.commit().await?;

    fan_out_delete(pool, &chat, &message, &now).await;
    info!(chat_id = %chat.chat_id, post_id, deleted_by = %auth.id, "message deleted");
    Ok(())
}

async fn fan_out_delete(pool: &SqlitePool, chat: &ChatRow, message: &MessageRow, now: &str) {
    let members = match membership_repo::list_active(pool, &chat.chat_id).await {
        Ok(members) => members,
        Err(e) => {
            warn!(chat_id = %chat.chat_id, error = %e, "delete fan-out: member listing failed");
            return;
        }
    };

    let chat_type = chat.chat_type();
    for m in &members {
        let result = adjust_member_for_delete(pool, chat, message, m, chat_type, now).await;
        if let Err(e) = result {
            warn!(chat_id = %chat.chat_id, user_id = %m.user_id, error = %e, "delete fan-out: member adjustment failed");
        }
    }
}

async fn adjust_member_for_delete(
    pool: &SqlitePool,
    chat: &ChatRow,
    message: &MessageRow,
    member: &MemberRow,
    chat_type: crate::models::ChatType,
    now: &str,
) -> Result<(), ChatError> {
    let filter = VisibilityFilter::for_viewer(pool, &member.user_id).await?;

    if !filter.is_visible(&message.author_id) {
        // The post never counted toward this member's visible sequence.
        membership_repo::bump_hidden(pool, &chat.chat_id, &member.user_id, -1, now).await?;
        return Ok(());
    }

    let position = message_repo::count_visible_before(
        pool,
        &chat.chat_id,
        filter.exclusion_json(),
        message.post_id,
    )
    .await?;

    if member.read_count > position {
        // The member had consumed this message; keep them from ending up
        // ahead of the true sequence.
        membership_repo::decrement_read(pool, &chat.chat_id, &member.user_id, now).await?;
    } else if !member.is_muted() && member.user_id != message.author_id {
        for user_id in badge_targets(pool, &member.user_id, &message.author_id).await {
            notifications::decrement(pool, &user_id, chat_type, 1).await;
        }
    }
    Ok(())
}

/// Moderator highlight, independent of read state.
pub async fn set_message_pinned(
    pool: &SqlitePool,
    auth: &AuthenticatedUser,
    post_id: i64,
    pinned: bool,
) -> Result<(), ChatError> {
    if !auth.access_level.is_moderator() {
        return Err(ChatError::permission("moderators only"));
    }
    let affected = message_repo::set_pinned(pool, post_id, pinned).await?;
    if affected == 0 {
        return Err(ChatError::NotFound);
    }
    Ok(())
}
