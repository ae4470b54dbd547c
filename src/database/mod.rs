pub mod chat_edit_repo;
pub mod chat_repo;
pub mod membership_repo;
pub mod message_repo;
pub mod notification_repo;
pub mod user_repo;

use sqlx::SqlitePool;

const SQL_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
  user_id      TEXT PRIMARY KEY,
  username     TEXT NOT NULL UNIQUE,
  display_name TEXT,
  access_level INTEGER NOT NULL DEFAULT 1,
  deleted_at   TEXT
);

CREATE TABLE IF NOT EXISTS user_relations (
  user_id        TEXT NOT NULL,
  target_user_id TEXT NOT NULL,
  relation       TEXT NOT NULL CHECK (relation IN ('block', 'mute')),
  PRIMARY KEY (user_id, target_user_id, relation)
);

CREATE TABLE IF NOT EXISTS chats (
  chat_id      TEXT PRIMARY KEY,
  chat_type    TEXT NOT NULL,
  owner_id     TEXT NOT NULL,
  title        TEXT NOT NULL,
  info         TEXT NOT NULL DEFAULT '',
  location     TEXT,
  start_time   TEXT,
  end_time     TEXT,
  min_capacity INTEGER NOT NULL DEFAULT 0,
  max_capacity INTEGER NOT NULL DEFAULT 0,
  participants TEXT NOT NULL DEFAULT '[]',
  post_count   INTEGER NOT NULL DEFAULT 0,
  last_post_id INTEGER NOT NULL DEFAULT 0,
  cancelled    INTEGER NOT NULL DEFAULT 0,
  created_at   TEXT NOT NULL,
  updated_at   TEXT NOT NULL,
  deleted_at   TEXT
);

CREATE TABLE IF NOT EXISTS chat_members (
  chat_id      TEXT NOT NULL,
  user_id      TEXT NOT NULL,
  read_count   INTEGER NOT NULL DEFAULT 0,
  hidden_count INTEGER NOT NULL DEFAULT 0,
  muted        INTEGER NOT NULL DEFAULT 0,
  created_at   TEXT NOT NULL,
  updated_at   TEXT NOT NULL,
  deleted_at   TEXT,
  PRIMARY KEY (chat_id, user_id)
);

CREATE TABLE IF NOT EXISTS chat_messages (
  post_id    INTEGER PRIMARY KEY AUTOINCREMENT,
  chat_id    TEXT NOT NULL,
  author_id  TEXT NOT NULL,
  text       TEXT NOT NULL,
  image      TEXT,
  pinned     INTEGER NOT NULL DEFAULT 0,
  created_at TEXT NOT NULL,
  deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_chat_messages_chat
  ON chat_messages (chat_id, post_id);

CREATE TABLE IF NOT EXISTS chat_edits (
  edit_id               TEXT PRIMARY KEY,
  chat_id               TEXT NOT NULL,
  editor_id             TEXT NOT NULL,
  title                 TEXT NOT NULL,
  info                  TEXT NOT NULL,
  location              TEXT,
  participants_snapshot TEXT NOT NULL,
  created_at            TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notification_counts (
  user_id      TEXT NOT NULL,
  counter_key  TEXT NOT NULL,
  count        INTEGER NOT NULL DEFAULT 0,
  viewed_count INTEGER NOT NULL DEFAULT 0,
  PRIMARY KEY (user_id, counter_key)
);
"#;

// Shared-mailbox pseudo accounts. Real accounts at or above the gating level
// operate on these inboxes via the effective-user resolver.
const SQL_SEED_MAILBOXES: &str = r#"
INSERT OR IGNORE INTO users (user_id, username, display_name, access_level)
VALUES
  ('mailbox-moderator', 'moderator', 'Moderator Team', 2),
  ('mailbox-team', 'team', 'Crew Team', 3)
"#;

/// Idempotent schema bootstrap, run on startup and by every test pool.
pub async fn init_schema(pool: &SqlitePool) -> sqlx::Result<()> {
    sqlx::raw_sql(SQL_SCHEMA).execute(pool).await?;
    sqlx::query(SQL_SEED_MAILBOXES).execute(pool).await?;
    Ok(())
}
