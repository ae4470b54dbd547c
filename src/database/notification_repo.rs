use sqlx::{Row, SqlitePool};

// Durable unread-badge counters. The live socket push is best-effort; these
// rows are what clients reconcile against.

const SQL_INCREMENT: &str = r#"
INSERT INTO notification_counts (user_id, counter_key, count, viewed_count)
VALUES (?, ?, 1, 0)
ON CONFLICT (user_id, counter_key) DO UPDATE SET count = count + 1
"#;

pub async fn increment(pool: &SqlitePool, user_id: &str, counter_key: &str) -> sqlx::Result<()> {
    sqlx::query(SQL_INCREMENT)
        .bind(user_id)
        .bind(counter_key)
        .execute(pool)
        .await?;
    Ok(())
}

const SQL_DECREMENT: &str = r#"
UPDATE notification_counts
SET count = MAX(count - ?, 0),
    viewed_count = MIN(viewed_count, MAX(count - ?, 0))
WHERE user_id = ? AND counter_key = ?
"#;

pub async fn decrement(
    pool: &SqlitePool,
    user_id: &str,
    counter_key: &str,
    amount: i64,
) -> sqlx::Result<()> {
    sqlx::query(SQL_DECREMENT)
        .bind(amount)
        .bind(amount)
        .bind(user_id)
        .bind(counter_key)
        .execute(pool)
        .await?;
    Ok(())
}

const SQL_MARK_VIEWED: &str = r#"
UPDATE notification_counts
SET viewed_count = count
WHERE user_id = ? AND counter_key = ?
"#;

pub async fn mark_viewed(pool: &SqlitePool, user_id: &str, counter_key: &str) -> sqlx::Result<()> {
    sqlx::query(SQL_MARK_VIEWED)
        .bind(user_id)
        .bind(counter_key)
        .execute(pool)
        .await?;
    Ok(())
}

const SQL_UNSEEN: &str = r#"
SELECT MAX(count - viewed_count, 0) AS n
FROM notification_counts
WHERE user_id = ? AND counter_key = ?
"#;

/// Badge value: notifications counted but not yet viewed.
pub async fn unseen(pool: &SqlitePool, user_id: &str, counter_key: &str) -> sqlx::Result<i64> {
    let row = sqlx::query(SQL_UNSEEN)
        .bind(user_id)
        .bind(counter_key)
        .fetch_optional(pool)
        .await?;
    Ok(row.and_then(|r| r.try_get("n").ok()).unwrap_or(0))
}
