use serde::Serialize;

/// Access levels, ordered. Stored as integers in the users table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessLevel {
    Quarantined,
    Verified,
    Moderator,
    Team,
    Admin,
}

impl AccessLevel {
    pub fn from_i64(value: i64) -> AccessLevel {
        match value {
            0 => AccessLevel::Quarantined,
            1 => AccessLevel::Verified,
            2 => AccessLevel::Moderator,
            3 => AccessLevel::Team,
            _ => AccessLevel::Admin,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            AccessLevel::Quarantined => 0,
            AccessLevel::Verified => 1,
            AccessLevel::Moderator => 2,
            AccessLevel::Team => 3,
            AccessLevel::Admin => 4,
        }
    }

    pub fn is_moderator(self) -> bool {
        self >= AccessLevel::Moderator
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub access_level: i64,
    pub deleted_at: Option<String>,
}

impl UserRow {
    pub fn access_level(&self) -> AccessLevel {
        AccessLevel::from_i64(self.access_level)
    }
}

/// Compact identity block embedded in chat and message payloads.
#[derive(Debug, Clone, Serialize)]
pub struct UserHeader {
    pub user_id: String,
    pub username: String,
    pub display_name: Option<String>,
}

impl From<UserRow> for UserHeader {
    fn from(row: UserRow) -> Self {
        UserHeader {
            user_id: row.user_id,
            username: row.username,
            display_name: row.display_name,
        }
    }
}
