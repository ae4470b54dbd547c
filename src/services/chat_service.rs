use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::database::{
    chat_edit_repo, chat_repo, membership_repo, message_repo, user_repo,
};
use crate::error::ChatError;
use crate::models::{ChatRow, ChatType, UserHeader};
use crate::services::effective_user::{self, EffectiveUser};
use crate::services::fanout::{ChatEvent, ChatRegistry};
use crate::services::notifications;
use crate::services::pagination::{self, PageParams, Paginator};
use crate::services::visibility::VisibilityFilter;
use crate::web::middleware::auth::AuthenticatedUser;

const MAX_TITLE_LEN: usize = 100;
const MAX_INFO_LEN: usize = 2048;
const LIST_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub chat_type: String,
    pub title: String,
    #[serde(default)]
    pub info: String,
    pub location: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(default)]
    pub min_capacity: i64,
    #[serde(default)]
    pub max_capacity: i64,
    #[serde(default)]
    pub initial_users: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateChatRequest {
    pub chat_type: String,
    pub title: String,
    #[serde(default)]
    pub info: String,
    pub location: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(default)]
    pub min_capacity: i64,
    #[serde(default)]
    pub max_capacity: i64,
}

fn validate_content(
    chat_type: &str,
    title: &str,
    min_capacity: i64,
    max_capacity: i64,
) -> Result<ChatType, ChatError> {
    let chat_type = ChatType::from_str(chat_type)
        .ok_or_else(|| ChatError::validation(format!("unknown chat type '{chat_type}'")))?;
    if title.trim().is_empty() {
        return Err(ChatError::validation("title must not be empty"));
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(ChatError::validation("title too long"));
    }
    if min_capacity < 0 || max_capacity < 0 {
        return Err(ChatError::validation("capacities must not be negative"));
    }
    if max_capacity != 0 && min_capacity > max_capacity {
        return Err(ChatError::validation("min capacity exceeds max capacity"));
    }
    Ok(chat_type)
}

/// Creates a chat with the acting identity seated first. Initial members are
/// filtered against the owner's block relations; blocked entries are dropped
/// silently so the relationship is not revealed.
pub async fn create_chat(
    pool: &SqlitePool,
    auth: &AuthenticatedUser,
    for_user: Option<&str>,
    req: &CreateChatRequest,
) -> Result<ChatRow, ChatError> {
    let chat_type = validate_content(&req.chat_type, &req.title, req.min_capacity, req.max_capacity)?;
    if req.info.len() > MAX_INFO_LEN {
        return Err(ChatError::validation("info too long"));
    }

    let effective = effective_user::resolve(pool, auth, for_user).await?;
    let owner_id = effective.user_id().to_string();

    let mut participants: Vec<String> = vec![owner_id.clone()];
    for candidate in &req.initial_users {
        if participants.iter().any(|p| p == candidate) {
            continue;
        }
        // Posting as a shared mailbox excludes the real caller.
        if matches!(effective, EffectiveUser::Shared { .. }) && candidate == &auth.id {
            continue;
        }
        if user_repo::get_user(pool, candidate).await?.is_none() {
            return Err(ChatError::NotFound);
        }
        if user_repo::block_exists_between(pool, &owner_id, candidate).await? {
            continue;
        }
        participants.push(candidate.clone());
    }

    let minimum = if chat_type == ChatType::Closed { 2 } else { 1 };
    if participants.len() < minimum {
        return Err(ChatError::validation(
            "not enough members for this chat type",
        ));
    }

    let chat_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let participants_json =
        serde_json::to_string(&participants).map_err(|_| ChatError::validation("bad members"))?;

    let mut tx = pool.begin().await?;
    chat_repo::insert_chat(
        &mut tx,
        chat_repo::NewChat {
            chat_id: &chat_id,
            chat_type: chat_type.as_str(),
            owner_id: &owner_id,
            title: req.title.trim(),
            info: &req.info,
            location: req.location.as_deref(),
            start_time: req.start_time.as_deref(),
            end_time: req.end_time.as_deref(),
            min_capacity: req.min_capacity,
            max_capacity: req.max_capacity,
            participants_json: &participants_json,
            now: &now,
        },
    )
    .await?;
    for member in &participants {
        membership_repo::insert(&mut tx, &chat_id, member, 0, &now).await?;
    }
    tx.commit().await?;

    info!(chat_id = %chat_id, chat_type = %chat_type.as_str(), owner = %owner_id, members = participants.len(), "chat created");

    chat_repo::get_chat(pool, &chat_id)
        .await?
        .ok_or(ChatError::NotFound)
}

async fn load_chat(pool: &SqlitePool, chat_id: &str) -> Result<ChatRow, ChatError> {
    chat_repo::get_chat(pool, chat_id)
        .await?
        .ok_or(ChatError::NotFound)
}

/// Create-or-restore transition for the member pivot. Restores keep the
/// historical read count (clamped against the re-seeded hidden count).
async fn attach_member(
    pool: &SqlitePool,
    chat: &ChatRow,
    user_id: &str,
    now: &str,
) -> Result<(), ChatError> {
    let filter = VisibilityFilter::for_viewer(pool, user_id).await?;

    let mut tx = pool.begin().await?;
    let hidden =
        message_repo::count_hidden(&mut tx, &chat.chat_id, filter.exclusion_json()).await?;

    let mut participants = chat.participant_ids();
    participants.push(user_id.to_string());
    let participants_json =
        serde_json::to_string(&participants).map_err(|_| ChatError::validation("bad members"))?;
    chat_repo::set_participants(&mut tx, &chat.chat_id, &participants_json, now).await?;

    match membership_repo::get_any(&mut tx, &chat.chat_id, user_id).await? {
        Some(prior) => {
            let read = prior.read_count.min((chat.post_count - hidden).max(0));
            membership_repo::restore(&mut tx, &chat.chat_id, user_id, hidden, read, now).await?;
        }
        None => {
            membership_repo::insert(&mut tx, &chat.chat_id, user_id, hidden, now).await?;
        }
    }
    tx.commit().await?;
    Ok(())
}

/// Removal transition: audit snapshot of the pre-removal member list, then
/// participant-array and pivot updates in one transaction.
async fn detach_member(
    pool: &SqlitePool,
    chat: &ChatRow,
    editor_id: &str,
    user_id: &str,
    now: &str,
) -> Result<(), ChatError> {
    let mut tx = pool.begin().await?;
    chat_edit_repo::insert_edit(
        &mut tx,
        chat_edit_repo::NewChatEdit {
            edit_id: &Uuid::new_v4().to_string(),
            chat_id: &chat.chat_id,
            editor_id,
            title: &chat.title,
            info: &chat.info,
            location: chat.location.as_deref(),
            participants_snapshot: &chat.participants,
            now,
        },
    )
    .await?;

    let participants: Vec<String> = chat
        .participant_ids()
        .into_iter()
        .filter(|p| p != user_id)
        .collect();
    let participants_json =
        serde_json::to_string(&participants).map_err(|_| ChatError::validation("bad members"))?;
    chat_repo::set_participants(&mut tx, &chat.chat_id, &participants_json, now).await?;
    membership_repo::soft_delete(&mut tx, &chat.chat_id, user_id, now).await?;
    tx.commit().await?;
    Ok(())
}

/// Self-service join. Already-a-member is an idempotent success.
pub async fn join_chat(
    pool: &SqlitePool,
    registry: &ChatRegistry,
    auth: &AuthenticatedUser,
    chat_id: &str,
) -> Result<ChatRow, ChatError> {
    let chat = load_chat(pool, chat_id).await?;
    if !chat.chat_type().allows_self_join() {
        return Err(ChatError::conflict("this chat type cannot be joined"));
    }
    if user_repo::block_exists_between(pool, &auth.id, &chat.owner_id).await? {
        return Err(ChatError::NotFound);
    }
    if chat.is_participant(&auth.id) {
        return Ok(chat);
    }

    let now = Utc::now().to_rfc3339();
    attach_member(pool, &chat, &auth.id, &now).await?;
    registry.publish(
        chat_id,
        ChatEvent::MembershipChange {
            chat_id: chat_id.to_string(),
            user_id: auth.id.clone(),
            joined: true,
        },
    );
    info!(chat_id = %chat_id, user_id = %auth.id, "user joined chat");
    load_chat(pool, chat_id).await
}

pub async fn unjoin_chat(
    pool: &SqlitePool,
    registry: &ChatRegistry,
    auth: &AuthenticatedUser,
    chat_id: &str,
) -> Result<ChatRow, ChatError> {
    let chat = load_chat(pool, chat_id).await?;
    if chat.chat_type() == ChatType::Closed {
        return Err(ChatError::conflict("cannot leave a closed chat"));
    }
    if !chat.is_participant(&auth.id) {
        return Err(ChatError::conflict("not a member of this chat"));
    }
    if chat.owner_id == auth.id {
        return Err(ChatError::conflict("the owner cannot leave their own chat"));
    }

    let now = Utc::now().to_rfc3339();
    detach_member(pool, &chat, &auth.id, &auth.id, &now).await?;
    registry.publish(
        chat_id,
        ChatEvent::MembershipChange {
            chat_id: chat_id.to_string(),
            user_id: auth.id.clone(),
            joined: false,
        },
    );
    info!(chat_id = %chat_id, user_id = %auth.id, "user left chat");
    load_chat(pool, chat_id).await
}

pub async fn add_member(
    pool: &SqlitePool,
    registry: &ChatRegistry,
    auth: &AuthenticatedUser,
    chat_id: &str,
    user_id: &str,
    for_user: Option<&str>,
) -> Result<ChatRow, ChatError> {
    let chat = load_chat(pool, chat_id).await?;
    let effective = effective_user::resolve_for_chat(pool, auth, for_user, &chat).await?;
    if chat.owner_id != effective.user_id() {
        return Err(ChatError::permission("only the owner can add members"));
    }
    if !chat.chat_type().allows_member_management() {
        return Err(ChatError::conflict(
            "this chat type does not support member management",
        ));
    }
    if user_repo::get_user(pool, user_id).await?.is_none() {
        return Err(ChatError::NotFound);
    }
    if user_repo::block_exists_between(pool, user_id, &chat.owner_id).await? {
        return Err(ChatError::NotFound);
    }
    if chat.is_participant(user_id) {
        return Err(ChatError::conflict("user is already a member"));
    }

    let now = Utc::now().to_rfc3339();
    attach_member(pool, &chat, user_id, &now).await?;
    registry.publish(
        chat_id,
        ChatEvent::MembershipChange {
            chat_id: chat_id.to_string(),
            user_id: user_id.to_string(),
            joined: true,
        },
    );
    info!(chat_id = %chat_id, user_id = %user_id, added_by = %auth.id, "member added");
    load_chat(pool, chat_id).await
}

pub async fn remove_member(
    pool: &SqlitePool,
    registry: &ChatRegistry,
    auth: &AuthenticatedUser,
    chat_id: &str,
    user_id: &str,
    for_user: Option<&str>,
) -> Result<ChatRow, ChatError> {
    let chat = load_chat(pool, chat_id).await?;
    let effective = effective_user::resolve_for_chat(pool, auth, for_user, &chat).await?;
    if chat.owner_id != effective.user_id() {
        return Err(ChatError::permission("only the owner can remove members"));
    }
    if !chat.chat_type().allows_member_management() {
        return Err(ChatError::conflict(
            "this chat type does not support member management",
        ));
    }
    if user_id == chat.owner_id {
        return Err(ChatError::conflict("the owner cannot remove themselves"));
    }
    if !chat.is_participant(user_id) {
        return Err(ChatError::NotFound);
    }

    let now = Utc::now().to_rfc3339();
    detach_member(pool, &chat, &auth.id, user_id, &now).await?;
    registry.publish(
        chat_id,
        ChatEvent::MembershipChange {
            chat_id: chat_id.to_string(),
            user_id: user_id.to_string(),
            joined: false,
        },
    );
    info!(chat_id = %chat_id, user_id = %user_id, removed_by = %auth.id, "member removed");
    load_chat(pool, chat_id).await
}

/// Cancellation keeps the chat visible and postable; it only leaves the
/// joinable listings and pings the seated members.
pub async fn cancel_chat(
    pool: &SqlitePool,
    auth: &AuthenticatedUser,
    chat_id: &str,
    for_user: Option<&str>,
) -> Result<ChatRow, ChatError> {
    let chat = load_chat(pool, chat_id).await?;
    let effective = effective_user::resolve_for_chat(pool, auth, for_user, &chat).await?;
    if chat.owner_id != effective.user_id() {
        return Err(ChatError::permission("only the owner can cancel"));
    }

    let now = Utc::now().to_rfc3339();
    chat_repo::set_cancelled(pool, chat_id, true, &now).await?;

    let chat_type = chat.chat_type();
    let (seated, _) = chat.seated_split();
    for member in seated.iter().filter(|m| *m != &chat.owner_id) {
        notifications::increment(pool, member, chat_type).await;
    }
    info!(chat_id = %chat_id, caller = %effective.caller(), "chat cancelled");
    load_chat(pool, chat_id).await
}

pub async fn update_chat(
    pool: &SqlitePool,
    auth: &AuthenticatedUser,
    chat_id: &str,
    for_user: Option<&str>,
    req: &UpdateChatRequest,
) -> Result<ChatRow, ChatError> {
    let chat = load_chat(pool, chat_id).await?;
    let effective = effective_user::resolve_for_chat(pool, auth, for_user, &chat).await?;
    if chat.owner_id != effective.user_id() {
        return Err(ChatError::permission("only the owner can update"));
    }
    let new_type = validate_content(&req.chat_type, &req.title, req.min_capacity, req.max_capacity)?;
    if req.info.len() > MAX_INFO_LEN {
        return Err(ChatError::validation("info too long"));
    }
    let old_type = chat.chat_type();
    if new_type != old_type && !(new_type.is_lfg() && old_type.is_lfg()) {
        return Err(ChatError::validation(
            "chat type can only change among LFG types",
        ));
    }

    let now = Utc::now().to_rfc3339();
    let content_changed = chat.title != req.title.trim()
        || chat.info != req.info
        || chat.location.as_deref() != req.location.as_deref();
    if content_changed {
        let mut conn = pool.acquire().await?;
        chat_edit_repo::insert_edit(
            &mut conn,
            chat_edit_repo::NewChatEdit {
                edit_id: &Uuid::new_v4().to_string(),
                chat_id: &chat.chat_id,
                editor_id: &auth.id,
                title: &chat.title,
                info: &chat.info,
                location: chat.location.as_deref(),
                participants_snapshot: &chat.participants,
                now: &now,
            },
        )
        .await?;
    }

    // Updating puts a cancelled chat back into circulation.
    chat_repo::update_content(
        pool,
        chat_id,
        new_type.as_str(),
        req.title.trim(),
        &req.info,
        req.location.as_deref(),
        req.start_time.as_deref(),
        req.end_time.as_deref(),
        req.min_capacity,
        req.max_capacity,
        &now,
    )
    .await?;
    info!(chat_id = %chat_id, caller = %effective.caller(), "chat updated");
    load_chat(pool, chat_id).await
}

/// Soft-deletes the chat and detaches all member rows. Messages are kept for
/// audit purposes.
pub async fn delete_chat(
    pool: &SqlitePool,
    auth: &AuthenticatedUser,
    chat_id: &str,
) -> Result<(), ChatError> {
    let chat = load_chat(pool, chat_id).await?;
    let allowed = if chat.chat_type() == ChatType::PersonalEvent {
        chat.owner_id == auth.id || auth.access_level.is_moderator()
    } else {
        auth.access_level.is_moderator()
    };
    if !allowed {
        return Err(ChatError::permission("not allowed to delete this chat"));
    }

    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;
    chat_repo::soft_delete(&mut tx, chat_id, &now).await?;
    let detached = membership_repo::detach_all(&mut tx, chat_id, &now).await?;
    tx.commit().await?;
    info!(chat_id = %chat_id, detached, deleted_by = %auth.id, "chat deleted");
    Ok(())
}

/// Membership mute toggle; idempotent in both directions.
pub async fn set_chat_muted(
    pool: &SqlitePool,
    auth: &AuthenticatedUser,
    chat_id: &str,
    muted: bool,
) -> Result<(), ChatError> {
    load_chat(pool, chat_id).await?;
    let now = Utc::now().to_rfc3339();
    let affected = membership_repo::set_muted(pool, chat_id, &auth.id, muted, &now).await?;
    if affected == 0 {
        return Err(ChatError::NotFound);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Default)]
pub struct ChatsQuery {
    #[serde(rename = "type")]
    pub type_filter: Option<String>,
    #[serde(rename = "excludetype")]
    pub exclude_type: Option<String>,
    pub search: Option<String>,
    /// Calendar-day filter for scheduled chats, `YYYY-MM-DD`.
    pub day: Option<String>,
    #[serde(rename = "hidefull", default)]
    pub hide_full: bool,
    #[serde(rename = "onlynew", default)]
    pub only_new: bool,
    pub for_user: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessagePreview {
    pub post_id: i64,
    pub author_id: String,
    pub text: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct ChatListItem {
    pub chat_id: String,
    pub chat_type: String,
    pub owner_id: String,
    pub title: String,
    pub info: String,
    pub location: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub min_capacity: i64,
    pub max_capacity: i64,
    pub cancelled: bool,
    pub participant_count: usize,
    pub seated_count: usize,
    pub waitlist_count: usize,
    /// Visible post total for the requesting viewer.
    pub post_count: i64,
    pub read_count: Option<i64>,
    pub muted: Option<bool>,
    pub last_message: Option<MessagePreview>,
}

fn q_like(search: &Option<String>) -> String {
    match search.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => format!("%{}%", s.to_lowercase()),
        _ => String::new(),
    }
}

fn preview_of(message: Option<crate::models::MessageRow>) -> Option<MessagePreview> {
    message.map(|m| MessagePreview {
        post_id: m.post_id,
        author_id: m.author_id,
        text: m.text,
        created_at: m.created_at,
    })
}

/// Joinable-LFG discovery listing.
pub async fn list_open(
    pool: &SqlitePool,
    auth: &AuthenticatedUser,
    query: &ChatsQuery,
) -> Result<Vec<ChatListItem>, ChatError> {
    let filter = VisibilityFilter::for_viewer(pool, &auth.id).await?;
    let rows = chat_repo::list_open(
        pool,
        filter.exclusion_json(),
        query.type_filter.as_deref().unwrap_or(""),
        query.exclude_type.as_deref().unwrap_or(""),
        query.day.as_deref().unwrap_or(""),
        &q_like(&query.search),
        query.hide_full,
        LIST_LIMIT,
    )
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    for chat in rows {
        let last =
            message_repo::latest_visible(pool, &chat.chat_id, filter.exclusion_json()).await?;
        let (seated, waitlisted) = chat.seated_split();
        items.push(ChatListItem {
            post_count: chat.post_count,
            participant_count: seated.len() + waitlisted.len(),
            seated_count: seated.len(),
            waitlist_count: waitlisted.len(),
            read_count: None,
            muted: None,
            last_message: preview_of(last),
            chat_id: chat.chat_id,
            chat_type: chat.chat_type,
            owner_id: chat.owner_id,
            title: chat.title,
            info: chat.info,
            location: chat.location,
            start_time: chat.start_time,
            end_time: chat.end_time,
            min_capacity: chat.min_capacity,
            max_capacity: chat.max_capacity,
            cancelled: chat.cancelled != 0,
        });
    }
    Ok(items)
}

/// Everything the effective user belongs to, with per-chat unread state.
pub async fn list_joined(
    pool: &SqlitePool,
    auth: &AuthenticatedUser,
    query: &ChatsQuery,
) -> Result<Vec<ChatListItem>, ChatError> {
    let effective = effective_user::resolve(pool, auth, query.for_user.as_deref()).await?;
    let filter = VisibilityFilter::for_viewer(pool, effective.user_id()).await?;

    let rows = chat_repo::list_joined(
        pool,
        effective.user_id(),
        query.type_filter.as_deref().unwrap_or(""),
        query.exclude_type.as_deref().unwrap_or(""),
        &q_like(&query.search),
        query.only_new,
        LIST_LIMIT,
    )
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let chat = row.chat;
        let last =
            message_repo::latest_visible(pool, &chat.chat_id, filter.exclusion_json()).await?;
        let (seated, waitlisted) = chat.seated_split();
        items.push(ChatListItem {
            post_count: (chat.post_count - row.member_hidden_count).max(0),
            participant_count: seated.len() + waitlisted.len(),
            seated_count: seated.len(),
            waitlist_count: waitlisted.len(),
            read_count: Some(row.member_read_count),
            muted: Some(row.member_muted != 0),
            last_message: preview_of(last),
            chat_id: chat.chat_id,
            chat_type: chat.chat_type,
            owner_id: chat.owner_id,
            title: chat.title,
            info: chat.info,
            location: chat.location,
            start_time: chat.start_time,
            end_time: chat.end_time,
            min_capacity: chat.min_capacity,
            max_capacity: chat.max_capacity,
            cancelled: chat.cancelled != 0,
        });
    }
    Ok(items)
}

pub async fn list_owner(
    pool: &SqlitePool,
    auth: &AuthenticatedUser,
    query: &ChatsQuery,
) -> Result<Vec<ChatListItem>, ChatError> {
    let effective = effective_user::resolve(pool, auth, query.for_user.as_deref()).await?;
    let filter = VisibilityFilter::for_viewer(pool, effective.user_id()).await?;
    let rows = chat_repo::list_owner(
        pool,
        effective.user_id(),
        query.type_filter.as_deref().unwrap_or(""),
        &q_like(&query.search),
        LIST_LIMIT,
    )
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    for chat in rows {
        let last =
            message_repo::latest_visible(pool, &chat.chat_id, filter.exclusion_json()).await?;
        let (seated, waitlisted) = chat.seated_split();
        items.push(ChatListItem {
            post_count: chat.post_count,
            participant_count: seated.len() + waitlisted.len(),
            seated_count: seated.len(),
            waitlist_count: waitlisted.len(),
            read_count: None,
            muted: None,
            last_message: preview_of(last),
            chat_id: chat.chat_id,
            chat_type: chat.chat_type,
            owner_id: chat.owner_id,
            title: chat.title,
            info: chat.info,
            location: chat.location,
            start_time: chat.start_time,
            end_time: chat.end_time,
            min_capacity: chat.min_capacity,
            max_capacity: chat.max_capacity,
            cancelled: chat.cancelled != 0,
        });
    }
    Ok(items)
}

#[derive(Debug, Serialize)]
pub struct MessageData {
    pub post_id: i64,
    pub author: UserHeader,
    pub text: String,
    pub image: Option<String>,
    pub pinned: bool,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct ChatDetail {
    pub chat_id: String,
    pub chat_type: String,
    pub owner: UserHeader,
    pub title: String,
    pub info: String,
    pub location: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub min_capacity: i64,
    pub max_capacity: i64,
    pub cancelled: bool,
    pub seated: Vec<UserHeader>,
    pub waitlisted: Vec<UserHeader>,
    /// Visible post total for this viewer.
    pub post_count: i64,
    pub read_count: Option<i64>,
    pub messages: Vec<MessageData>,
    pub paginator: Paginator,
}

async fn headers_for(
    pool: &SqlitePool,
    user_ids: &[String],
) -> Result<Vec<UserHeader>, ChatError> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }
    let json = serde_json::to_string(user_ids).unwrap_or_else(|_| "[]".to_string());
    let rows = user_repo::list_users(pool, &json).await?;
    // Preserve join order.
    let mut headers = Vec::with_capacity(user_ids.len());
    for id in user_ids {
        if let Some(row) = rows.iter().find(|r| &r.user_id == id) {
            headers.push(UserHeader::from(row.clone()));
        }
    }
    Ok(headers)
}

/// One chat with a page of its messages, advancing the viewer's read state.
/// Non-members may look at LFG-type chats (they are discoverable); anything
/// else is a 404 to outsiders.
pub async fn chat_detail(
    pool: &SqlitePool,
    auth: &AuthenticatedUser,
    chat_id: &str,
    for_user: Option<&str>,
    page: &PageParams,
) -> Result<ChatDetail, ChatError> {
    let chat = load_chat(pool, chat_id).await?;
    let effective = effective_user::resolve_for_chat(pool, auth, for_user, &chat).await?;

    let member = membership_repo::get_active(pool, chat_id, effective.user_id()).await?;
    if member.is_none() && !auth.access_level.is_moderator() {
        if !chat.chat_type().is_lfg() {
            return Err(ChatError::NotFound);
        }
        if user_repo::block_exists_between(pool, &auth.id, &chat.owner_id).await? {
            return Err(ChatError::NotFound);
        }
    }

    let filter = VisibilityFilter::for_viewer(pool, effective.user_id()).await?;
    let message_page =
        pagination::fetch_page(pool, &chat, member.as_ref(), &filter, &effective, page).await?;

    let (seated_ids, waitlisted_ids) = chat.seated_split();
    let seated = headers_for(pool, &seated_ids).await?;
    let waitlisted = headers_for(pool, &waitlisted_ids).await?;

    let author_ids: Vec<String> = {
        let mut ids: Vec<String> = message_page
            .messages
            .iter()
            .map(|m| m.author_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    };
    let author_headers = headers_for(pool, &author_ids).await?;
    let messages = message_page
        .messages
        .into_iter()
        .filter_map(|m| {
            let author = author_headers.iter().find(|h| h.user_id == m.author_id)?;
            Some(MessageData {
                post_id: m.post_id,
                author: author.clone(),
                pinned: m.is_pinned(),
                text: m.text,
                image: m.image,
                created_at: m.created_at,
            })
        })
        .collect();

    let owner = headers_for(pool, std::slice::from_ref(&chat.owner_id))
        .await?
        .into_iter()
        .next()
        .ok_or(ChatError::NotFound)?;

    let hidden_count = match &member {
        Some(m) => m.hidden_count,
        None => chat.post_count - message_page.paginator.total,
    };

    Ok(ChatDetail {
        chat_id: chat.chat_id.clone(),
        chat_type: chat.chat_type.clone(),
        owner,
        title: chat.title.clone(),
        info: chat.info.clone(),
        location: chat.location.clone(),
        start_time: chat.start_time.clone(),
        end_time: chat.end_time.clone(),
        min_capacity: chat.min_capacity,
        max_capacity: chat.max_capacity,
        cancelled: chat.is_cancelled(),
        seated,
        waitlisted,
        post_count: (chat.post_count - hidden_count).max(0),
        read_count: message_page.read_count,
        messages,
        paginator: message_page.paginator,
    })
}
