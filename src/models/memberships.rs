/// Per (chat, user) counter pivot. Existence is tri-state: no row at all,
/// an active row (`deleted_at` NULL), or a soft-deleted row that a rejoin
/// restores with its counters intact.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MemberRow {
    pub chat_id: String,
    pub user_id: String,
    /// Messages consumed, counted in this member's visible-message order.
    pub read_count: i64,
    /// Messages invisible to this member because their author is in the
    /// member's block or mute set. `read_count + hidden_count` never exceeds
    /// the chat's post_count for an active member.
    pub hidden_count: i64,
    pub muted: i64,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

impl MemberRow {
    pub fn is_muted(&self) -> bool {
        self.muted != 0
    }
}
