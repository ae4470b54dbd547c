use sqlx::{SqliteConnection, SqlitePool};

use crate::models::MemberRow;

const SQL_GET_ACTIVE: &str = r#"
SELECT * FROM chat_members
WHERE chat_id = ? AND user_id = ? AND deleted_at IS NULL
"#;

pub async fn get_active(
    pool: &SqlitePool,
    chat_id: &str,
    user_id: &str,
) -> sqlx::Result<Option<MemberRow>> {
    sqlx::query_as::<_, MemberRow>(SQL_GET_ACTIVE)
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

// Includes soft-deleted rows, for the join/restore transition.
const SQL_GET_ANY: &str = r#"
SELECT * FROM chat_members WHERE chat_id = ? AND user_id = ?
"#;

pub async fn get_any(
    conn: &mut SqliteConnection,
    chat_id: &str,
    user_id: &str,
) -> sqlx::Result<Option<MemberRow>> {
    sqlx::query_as::<_, MemberRow>(SQL_GET_ANY)
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await
}

const SQL_LIST_ACTIVE: &str = r#"
SELECT * FROM chat_members WHERE chat_id = ? AND deleted_at IS NULL
"#;

pub async fn list_active(pool: &SqlitePool, chat_id: &str) -> sqlx::Result<Vec<MemberRow>> {
    sqlx::query_as::<_, MemberRow>(SQL_LIST_ACTIVE)
        .bind(chat_id)
        .fetch_all(pool)
        .await
}

const SQL_INSERT: &str = r#"
INSERT INTO chat_members (
  chat_id, user_id, read_count, hidden_count, muted, created_at, updated_at
) VALUES (?, ?, 0, ?, 0, ?, ?)
"#;

pub async fn insert(
    conn: &mut SqliteConnection,
    chat_id: &str,
    user_id: &str,
    hidden_count: i64,
    now: &str,
) -> sqlx::Result<()> {
    sqlx::query(SQL_INSERT)
        .bind(chat_id)
        .bind(user_id)
        .bind(hidden_count)
        .bind(now)
        .bind(now)
        .execute(conn)
        .await?;
    Ok(())
}

// Rejoin: historical read_count survives (clamped by the caller against the
// freshly computed hidden_count); hidden_count is re-seeded so the counts
// invariant holds immediately.
const SQL_RESTORE: &str = r#"
UPDATE chat_members
SET deleted_at = NULL, hidden_count = ?, read_count = ?, updated_at = ?
WHERE chat_id = ? AND user_id = ?
"#;

pub async fn restore(
    conn: &mut SqliteConnection,
    chat_id: &str,
    user_id: &str,
    hidden_count: i64,
    read_count: i64,
    now: &str,
) -> sqlx::Result<()> {
    sqlx::query(SQL_RESTORE)
        .bind(hidden_count)
        .bind(read_count)
        .bind(now)
        .bind(chat_id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

const SQL_SOFT_DELETE: &str = r#"
UPDATE chat_members SET deleted_at = ?, updated_at = ? WHERE chat_id = ? AND user_id = ?
"#;

pub async fn soft_delete(
    conn: &mut SqliteConnection,
    chat_id: &str,
    user_id: &str,
    now: &str,
) -> sqlx::Result<()> {
    sqlx::query(SQL_SOFT_DELETE)
        .bind(now)
        .bind(now)
        .bind(chat_id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

const SQL_DETACH_ALL: &str = r#"
UPDATE chat_members SET deleted_at = ?, updated_at = ?
WHERE chat_id = ? AND deleted_at IS NULL
"#;

/// Soft-deletes every active member row of a chat (chat deletion cascade).
pub async fn detach_all(
    conn: &mut SqliteConnection,
    chat_id: &str,
    now: &str,
) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_DETACH_ALL)
        .bind(now)
        .bind(now)
        .bind(chat_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

const SQL_BUMP_HIDDEN: &str = r#"
UPDATE chat_members
SET hidden_count = MAX(hidden_count + ?, 0), updated_at = ?
WHERE chat_id = ? AND user_id = ? AND deleted_at IS NULL
"#;

pub async fn bump_hidden(
    pool: &SqlitePool,
    chat_id: &str,
    user_id: &str,
    delta: i64,
    now: &str,
) -> sqlx::Result<()> {
    sqlx::query(SQL_BUMP_HIDDEN)
        .bind(delta)
        .bind(now)
        .bind(chat_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

const SQL_SET_READ_COUNT: &str = r#"
UPDATE chat_members
SET read_count = ?, updated_at = ?
WHERE chat_id = ? AND user_id = ? AND deleted_at IS NULL
"#;

pub async fn set_read_count(
    pool: &SqlitePool,
    chat_id: &str,
    user_id: &str,
    read_count: i64,
    now: &str,
) -> sqlx::Result<()> {
    sqlx::query(SQL_SET_READ_COUNT)
        .bind(read_count)
        .bind(now)
        .bind(chat_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

const SQL_DECREMENT_READ: &str = r#"
UPDATE chat_members
SET read_count = MAX(read_count - 1, 0), updated_at = ?
WHERE chat_id = ? AND user_id = ? AND deleted_at IS NULL
"#;

pub async fn decrement_read(
    pool: &SqlitePool,
    chat_id: &str,
    user_id: &str,
    now: &str,
) -> sqlx::Result<()> {
    sqlx::query(SQL_DECREMENT_READ)
        .bind(now)
        .bind(chat_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

const SQL_SET_MUTED: &str = r#"
UPDATE chat_members
SET muted = ?, updated_at = ?
WHERE chat_id = ? AND user_id = ? AND deleted_at IS NULL
"#;

pub async fn set_muted(
    pool: &SqlitePool,
    chat_id: &str,
    user_id: &str,
    muted: bool,
    now: &str,
) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_SET_MUTED)
        .bind(muted as i64)
        .bind(now)
        .bind(chat_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}
