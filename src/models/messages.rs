/// A chat message. `post_id` is an AUTOINCREMENT rowid, so creation order is
/// total and monotonic; the pagination engine counts against this order.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRow {
    pub post_id: i64,
    pub chat_id: String,
    pub author_id: String,
    pub text: String,
    pub image: Option<String>,
    pub pinned: i64,
    pub created_at: String,
    pub deleted_at: Option<String>,
}

impl MessageRow {
    pub fn is_pinned(&self) -> bool {
        self.pinned != 0
    }
}
