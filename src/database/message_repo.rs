use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::models::MessageRow;

const SQL_INSERT: &str = r#"
INSERT INTO chat_messages (chat_id, author_id, text, image, created_at)
VALUES (?, ?, ?, ?, ?)
RETURNING post_id
"#;

pub async fn insert(
    conn: &mut SqliteConnection,
    chat_id: &str,
    author_id: &str,
    text: &str,
    image: Option<&str>,
    now: &str,
) -> sqlx::Result<i64> {
    let row = sqlx::query(SQL_INSERT)
        .bind(chat_id)
        .bind(author_id)
        .bind(text)
        .bind(image)
        .bind(now)
        .fetch_one(conn)
        .await?;
    row.try_get("post_id")
}

const SQL_GET: &str = r#"
SELECT * FROM chat_messages WHERE post_id = ? AND deleted_at IS NULL
"#;

pub async fn get(pool: &SqlitePool, post_id: i64) -> sqlx::Result<Option<MessageRow>> {
    sqlx::query_as::<_, MessageRow>(SQL_GET)
        .bind(post_id)
        .fetch_optional(pool)
        .await
}

const SQL_SOFT_DELETE: &str = r#"
UPDATE chat_messages SET deleted_at = ? WHERE post_id = ?
"#;

pub async fn soft_delete(
    conn: &mut SqliteConnection,
    post_id: i64,
    now: &str,
) -> sqlx::Result<()> {
    sqlx::query(SQL_SOFT_DELETE)
        .bind(now)
        .bind(post_id)
        .execute(conn)
        .await?;
    Ok(())
}

const SQL_SET_PINNED: &str = r#"
UPDATE chat_messages SET pinned = ? WHERE post_id = ? AND deleted_at IS NULL
"#;

pub async fn set_pinned(pool: &SqlitePool, post_id: i64, pinned: bool) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_SET_PINNED)
        .bind(pinned as i64)
        .bind(post_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

// The exclusion set is the viewer's block ∪ mute authors, passed as a JSON
// array so the filter runs inside SQLite. The OFFSET is an index into this
// viewer's *visible* sequence, which is what keeps pagination stable when
// blocks change.
const SQL_VISIBLE_WINDOW: &str = r#"
SELECT *
FROM chat_messages
WHERE chat_id = ?
  AND deleted_at IS NULL
  AND author_id NOT IN (SELECT value FROM json_each(?))
ORDER BY post_id ASC
LIMIT ? OFFSET ?
"#;

pub async fn visible_window(
    pool: &SqlitePool,
    chat_id: &str,
    exclusion_json: &str,
    start: i64,
    limit: i64,
) -> sqlx::Result<Vec<MessageRow>> {
    sqlx::query_as::<_, MessageRow>(SQL_VISIBLE_WINDOW)
        .bind(chat_id)
        .bind(exclusion_json)
        .bind(limit)
        .bind(start)
        .fetch_all(pool)
        .await
}

const SQL_COUNT_VISIBLE_BEFORE: &str = r#"
SELECT COUNT(*) AS n
FROM chat_messages
WHERE chat_id = ?
  AND deleted_at IS NULL
  AND author_id NOT IN (SELECT value FROM json_each(?))
  AND post_id < ?
"#;

/// Index of a message in the viewer's visible sequence.
pub async fn count_visible_before(
    pool: &SqlitePool,
    chat_id: &str,
    exclusion_json: &str,
    post_id: i64,
) -> sqlx::Result<i64> {
    let row = sqlx::query(SQL_COUNT_VISIBLE_BEFORE)
        .bind(chat_id)
        .bind(exclusion_json)
        .bind(post_id)
        .fetch_one(pool)
        .await?;
    row.try_get("n")
}

const SQL_COUNT_HIDDEN: &str = r#"
SELECT COUNT(*) AS n
FROM chat_messages
WHERE chat_id = ?
  AND deleted_at IS NULL
  AND author_id IN (SELECT value FROM json_each(?))
"#;

/// Messages a viewer with the given exclusion set cannot see; used to seed
/// `hidden_count` at join time.
pub async fn count_hidden(
    conn: &mut SqliteConnection,
    chat_id: &str,
    exclusion_json: &str,
) -> sqlx::Result<i64> {
    let row = sqlx::query(SQL_COUNT_HIDDEN)
        .bind(chat_id)
        .bind(exclusion_json)
        .fetch_one(conn)
        .await?;
    row.try_get("n")
}

const SQL_LATEST_VISIBLE: &str = r#"
SELECT *
FROM chat_messages
WHERE chat_id = ?
  AND deleted_at IS NULL
  AND author_id NOT IN (SELECT value FROM json_each(?))
ORDER BY post_id DESC
LIMIT 1
"#;

pub async fn latest_visible(
    pool: &SqlitePool,
    chat_id: &str,
    exclusion_json: &str,
) -> sqlx::Result<Option<MessageRow>> {
    sqlx::query_as::<_, MessageRow>(SQL_LATEST_VISIBLE)
        .bind(chat_id)
        .bind(exclusion_json)
        .fetch_optional(pool)
        .await
}
