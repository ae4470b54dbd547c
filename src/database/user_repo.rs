use sqlx::{Row, SqlitePool};

use crate::models::UserRow;

const SQL_GET_USER: &str = r#"
SELECT * FROM users WHERE user_id = ? AND deleted_at IS NULL
"#;

pub async fn get_user(pool: &SqlitePool, user_id: &str) -> sqlx::Result<Option<UserRow>> {
    sqlx::query_as::<_, UserRow>(SQL_GET_USER)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

const SQL_GET_BY_USERNAME: &str = r#"
SELECT * FROM users WHERE username = ? AND deleted_at IS NULL
"#;

pub async fn get_by_username(pool: &SqlitePool, username: &str) -> sqlx::Result<Option<UserRow>> {
    sqlx::query_as::<_, UserRow>(SQL_GET_BY_USERNAME)
        .bind(username)
        .fetch_optional(pool)
        .await
}

const SQL_LIST_HEADERS: &str = r#"
SELECT * FROM users
WHERE deleted_at IS NULL
  AND user_id IN (SELECT value FROM json_each(?))
"#;

pub async fn list_users(pool: &SqlitePool, user_ids_json: &str) -> sqlx::Result<Vec<UserRow>> {
    sqlx::query_as::<_, UserRow>(SQL_LIST_HEADERS)
        .bind(user_ids_json)
        .fetch_all(pool)
        .await
}

// Block ∪ mute targets of the viewer, the raw material of the visibility
// filter.
const SQL_EXCLUDED_AUTHORS: &str = r#"
SELECT DISTINCT target_user_id FROM user_relations WHERE user_id = ?
"#;

pub async fn excluded_authors(pool: &SqlitePool, user_id: &str) -> sqlx::Result<Vec<String>> {
    let rows = sqlx::query(SQL_EXCLUDED_AUTHORS)
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| row.get("target_user_id"))
        .collect())
}

const SQL_BLOCK_EXISTS: &str = r#"
SELECT COUNT(*) AS n FROM user_relations
WHERE relation = 'block'
  AND ((user_id = ? AND target_user_id = ?) OR (user_id = ? AND target_user_id = ?))
"#;

/// True when either user blocks the other.
pub async fn block_exists_between(pool: &SqlitePool, a: &str, b: &str) -> sqlx::Result<bool> {
    let row = sqlx::query(SQL_BLOCK_EXISTS)
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_one(pool)
        .await?;
    let n: i64 = row.try_get("n")?;
    Ok(n > 0)
}

// Given a candidate set, which of them hide the given author? One query per
// post instead of one per member.
const SQL_MEMBERS_HIDING_AUTHOR: &str = r#"
SELECT DISTINCT user_id FROM user_relations
WHERE target_user_id = ?
  AND user_id IN (SELECT value FROM json_each(?))
"#;

pub async fn members_hiding_author(
    pool: &SqlitePool,
    author_id: &str,
    member_ids_json: &str,
) -> sqlx::Result<Vec<String>> {
    let rows = sqlx::query(SQL_MEMBERS_HIDING_AUTHOR)
        .bind(author_id)
        .bind(member_ids_json)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|row| row.get("user_id")).collect())
}

const SQL_USERS_AT_LEVEL: &str = r#"
SELECT user_id FROM users
WHERE deleted_at IS NULL AND access_level >= ?
"#;

/// All user ids at or above an access level, for the shared-mailbox bulk
/// mark-viewed.
pub async fn user_ids_at_level(pool: &SqlitePool, min_level: i64) -> sqlx::Result<Vec<String>> {
    let rows = sqlx::query(SQL_USERS_AT_LEVEL)
        .bind(min_level)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|row| row.get("user_id")).collect())
}
