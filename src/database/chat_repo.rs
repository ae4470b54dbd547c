use sqlx::{SqliteConnection, SqlitePool};

use crate::models::ChatRow;

pub struct NewChat<'a> {
    pub chat_id: &'a str,
    pub chat_type: &'a str,
    pub owner_id: &'a str,
    pub title: &'a str,
    pub info: &'a str,
    pub location: Option<&'a str>,
    pub start_time: Option<&'a str>,
    pub end_time: Option<&'a str>,
    pub min_capacity: i64,
    pub max_capacity: i64,
    pub participants_json: &'a str,
    pub now: &'a str,
}

const SQL_INSERT_CHAT: &str = r#"
INSERT INTO chats (
  chat_id, chat_type, owner_id, title, info, location,
  start_time, end_time, min_capacity, max_capacity,
  participants, created_at, updated_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

pub async fn insert_chat(conn: &mut SqliteConnection, chat: NewChat<'_>) -> sqlx::Result<()> {
    sqlx::query(SQL_INSERT_CHAT)
        .bind(chat.chat_id)
        .bind(chat.chat_type)
        .bind(chat.owner_id)
        .bind(chat.title)
        .bind(chat.info)
        .bind(chat.location)
        .bind(chat.start_time)
        .bind(chat.end_time)
        .bind(chat.min_capacity)
        .bind(chat.max_capacity)
        .bind(chat.participants_json)
        .bind(chat.now)
        .bind(chat.now)
        .execute(conn)
        .await?;
    Ok(())
}

const SQL_GET_CHAT: &str = r#"
SELECT * FROM chats WHERE chat_id = ? AND deleted_at IS NULL
"#;

pub async fn get_chat(pool: &SqlitePool, chat_id: &str) -> sqlx::Result<Option<ChatRow>> {
    sqlx::query_as::<_, ChatRow>(SQL_GET_CHAT)
        .bind(chat_id)
        .fetch_optional(pool)
        .await
}

const SQL_SET_PARTICIPANTS: &str = r#"
UPDATE chats SET participants = ?, updated_at = ? WHERE chat_id = ?
"#;

pub async fn set_participants(
    conn: &mut SqliteConnection,
    chat_id: &str,
    participants_json: &str,
    now: &str,
) -> sqlx::Result<()> {
    sqlx::query(SQL_SET_PARTICIPANTS)
        .bind(participants_json)
        .bind(now)
        .bind(chat_id)
        .execute(conn)
        .await?;
    Ok(())
}

const SQL_RECORD_POST: &str = r#"
UPDATE chats
SET post_count = post_count + 1, last_post_id = ?, updated_at = ?
WHERE chat_id = ?
"#;

pub async fn record_post(
    conn: &mut SqliteConnection,
    chat_id: &str,
    post_id: i64,
    now: &str,
) -> sqlx::Result<()> {
    sqlx::query(SQL_RECORD_POST)
        .bind(post_id)
        .bind(now)
        .bind(chat_id)
        .execute(conn)
        .await?;
    Ok(())
}

const SQL_RECORD_POST_DELETE: &str = r#"
UPDATE chats
SET post_count = MAX(post_count - 1, 0), updated_at = ?
WHERE chat_id = ?
"#;

pub async fn record_post_delete(
    conn: &mut SqliteConnection,
    chat_id: &str,
    now: &str,
) -> sqlx::Result<()> {
    sqlx::query(SQL_RECORD_POST_DELETE)
        .bind(now)
        .bind(chat_id)
        .execute(conn)
        .await?;
    Ok(())
}

const SQL_SET_CANCELLED: &str = r#"
UPDATE chats SET cancelled = ?, updated_at = ? WHERE chat_id = ?
"#;

pub async fn set_cancelled(
    pool: &SqlitePool,
    chat_id: &str,
    cancelled: bool,
    now: &str,
) -> sqlx::Result<()> {
    sqlx::query(SQL_SET_CANCELLED)
        .bind(cancelled as i64)
        .bind(now)
        .bind(chat_id)
        .execute(pool)
        .await?;
    Ok(())
}

const SQL_UPDATE_CONTENT: &str = r#"
UPDATE chats
SET chat_type = ?, title = ?, info = ?, location = ?,
    start_time = ?, end_time = ?, min_capacity = ?, max_capacity = ?,
    cancelled = 0, updated_at = ?
WHERE chat_id = ?
"#;

#[allow(clippy::too_many_arguments)]
pub async fn update_content(
    pool: &SqlitePool,
    chat_id: &str,
    chat_type: &str,
    title: &str,
    info: &str,
    location: Option<&str>,
    start_time: Option<&str>,
    end_time: Option<&str>,
    min_capacity: i64,
    max_capacity: i64,
    now: &str,
) -> sqlx::Result<()> {
    sqlx::query(SQL_UPDATE_CONTENT)
        .bind(chat_type)
        .bind(title)
        .bind(info)
        .bind(location)
        .bind(start_time)
        .bind(end_time)
        .bind(min_capacity)
        .bind(max_capacity)
        .bind(now)
        .bind(chat_id)
        .execute(pool)
        .await?;
    Ok(())
}

const SQL_SOFT_DELETE: &str = r#"
UPDATE chats SET deleted_at = ?, updated_at = ? WHERE chat_id = ?
"#;

pub async fn soft_delete(conn: &mut SqliteConnection, chat_id: &str, now: &str) -> sqlx::Result<()> {
    sqlx::query(SQL_SOFT_DELETE)
        .bind(now)
        .bind(now)
        .bind(chat_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Chat row joined with the requesting member's own counters.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JoinedChatRow {
    #[sqlx(flatten)]
    pub chat: ChatRow,
    pub member_read_count: i64,
    pub member_hidden_count: i64,
    pub member_muted: i64,
}

// Discovery query for joinable LFGs. Cancelled and deleted chats drop out
// here but stay visible to their members via the joined listing. Owner
// exclusion implements the viewer's block/mute pushdown.
const SQL_LIST_OPEN: &str = r#"
SELECT *
FROM chats
WHERE deleted_at IS NULL
  AND cancelled = 0
  AND chat_type IN (
    'lfgActivity', 'lfgDining', 'lfgGaming', 'lfgMeetup',
    'lfgMusic', 'lfgShore', 'lfgOther'
  )
  AND (? = '' OR chat_type = ?)
  AND (? = '' OR chat_type != ?)
  AND owner_id NOT IN (SELECT value FROM json_each(?))
  AND (? = '' OR date(COALESCE(start_time, '')) = ?)
  AND (
    ? = ''
    OR lower(title) LIKE ?
    OR lower(info) LIKE ?
    OR lower(COALESCE(location, '')) LIKE ?
  )
  AND (
    ? = 0
    OR max_capacity = 0
    OR json_array_length(participants) < max_capacity
  )
ORDER BY COALESCE(start_time, created_at) ASC
LIMIT ?
"#;

#[allow(clippy::too_many_arguments)]
pub async fn list_open(
    pool: &SqlitePool,
    exclusion_json: &str,
    type_filter: &str,
    exclude_type: &str,
    day: &str,
    q_like: &str,
    hide_full: bool,
    limit: i64,
) -> sqlx::Result<Vec<ChatRow>> {
    sqlx::query_as::<_, ChatRow>(SQL_LIST_OPEN)
        .bind(type_filter)
        .bind(type_filter)
        .bind(exclude_type)
        .bind(exclude_type)
        .bind(exclusion_json)
        .bind(day)
        .bind(day)
        .bind(q_like)
        .bind(q_like)
        .bind(q_like)
        .bind(q_like)
        .bind(hide_full as i64)
        .bind(limit)
        .fetch_all(pool)
        .await
}

const SQL_LIST_JOINED: &str = r#"
SELECT
  c.*,
  m.read_count   AS member_read_count,
  m.hidden_count AS member_hidden_count,
  m.muted        AS member_muted
FROM chats c
JOIN chat_members m
  ON m.chat_id = c.chat_id
 AND m.user_id = ?
 AND m.deleted_at IS NULL
WHERE c.deleted_at IS NULL
  AND (? = '' OR c.chat_type = ?)
  AND (? = '' OR c.chat_type != ?)
  AND (
    ? = ''
    OR lower(c.title) LIKE ?
    OR lower(c.info) LIKE ?
    OR lower(COALESCE(c.location, '')) LIKE ?
  )
  AND (? = 0 OR m.read_count + m.hidden_count < c.post_count)
ORDER BY c.updated_at DESC
LIMIT ?
"#;

#[allow(clippy::too_many_arguments)]
pub async fn list_joined(
    pool: &SqlitePool,
    user_id: &str,
    type_filter: &str,
    exclude_type: &str,
    q_like: &str,
    only_new: bool,
    limit: i64,
) -> sqlx::Result<Vec<JoinedChatRow>> {
    sqlx::query_as::<_, JoinedChatRow>(SQL_LIST_JOINED)
        .bind(user_id)
        .bind(type_filter)
        .bind(type_filter)
        .bind(exclude_type)
        .bind(exclude_type)
        .bind(q_like)
        .bind(q_like)
        .bind(q_like)
        .bind(q_like)
        .bind(only_new as i64)
        .bind(limit)
        .fetch_all(pool)
        .await
}

const SQL_LIST_OWNER: &str = r#"
SELECT *
FROM chats
WHERE deleted_at IS NULL
  AND owner_id = ?
  AND (? = '' OR chat_type = ?)
  AND (
    ? = ''
    OR lower(title) LIKE ?
    OR lower(info) LIKE ?
  )
ORDER BY updated_at DESC
LIMIT ?
"#;

pub async fn list_owner(
    pool: &SqlitePool,
    owner_id: &str,
    type_filter: &str,
    q_like: &str,
    limit: i64,
) -> sqlx::Result<Vec<ChatRow>> {
    sqlx::query_as::<_, ChatRow>(SQL_LIST_OWNER)
        .bind(owner_id)
        .bind(type_filter)
        .bind(type_filter)
        .bind(q_like)
        .bind(q_like)
        .bind(q_like)
        .bind(limit)
        .fetch_all(pool)
        .await
}
