use serde::{Deserialize, Serialize};

/// Conversation kind. The LFG subtypes only differ for discovery filtering;
/// permission checks operate on the three groups below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatType {
    /// Private n:n seamail. Membership is fixed at creation.
    Closed,
    /// Broadcast-style direct message group. No self-join, but the owner may
    /// add and remove members.
    Open,
    LfgActivity,
    LfgDining,
    LfgGaming,
    LfgMeetup,
    LfgMusic,
    LfgShore,
    LfgOther,
    PrivateEvent,
    PersonalEvent,
}

impl ChatType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatType::Closed => "closed",
            ChatType::Open => "open",
            ChatType::LfgActivity => "lfgActivity",
            ChatType::LfgDining => "lfgDining",
            ChatType::LfgGaming => "lfgGaming",
            ChatType::LfgMeetup => "lfgMeetup",
            ChatType::LfgMusic => "lfgMusic",
            ChatType::LfgShore => "lfgShore",
            ChatType::LfgOther => "lfgOther",
            ChatType::PrivateEvent => "privateEvent",
            ChatType::PersonalEvent => "personalEvent",
        }
    }

    pub fn from_str(input: &str) -> Option<ChatType> {
        Some(match input {
            "closed" => ChatType::Closed,
            "open" => ChatType::Open,
            "lfgActivity" => ChatType::LfgActivity,
            "lfgDining" => ChatType::LfgDining,
            "lfgGaming" => ChatType::LfgGaming,
            "lfgMeetup" => ChatType::LfgMeetup,
            "lfgMusic" => ChatType::LfgMusic,
            "lfgShore" => ChatType::LfgShore,
            "lfgOther" => ChatType::LfgOther,
            "privateEvent" => ChatType::PrivateEvent,
            "personalEvent" => ChatType::PersonalEvent,
            _ => return None,
        })
    }

    pub fn is_lfg(self) -> bool {
        matches!(
            self,
            ChatType::LfgActivity
                | ChatType::LfgDining
                | ChatType::LfgGaming
                | ChatType::LfgMeetup
                | ChatType::LfgMusic
                | ChatType::LfgShore
                | ChatType::LfgOther
        )
    }

    pub fn is_seamail(self) -> bool {
        matches!(self, ChatType::Closed | ChatType::Open)
    }

    pub fn is_event(self) -> bool {
        matches!(self, ChatType::PrivateEvent | ChatType::PersonalEvent)
    }

    /// Types where users may join/leave on their own.
    pub fn allows_self_join(self) -> bool {
        self.is_lfg()
    }

    /// Types where the owner may add/remove members.
    pub fn allows_member_management(self) -> bool {
        !matches!(self, ChatType::Closed | ChatType::PersonalEvent)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChatRow {
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
    /// JSON array of member user ids, in join order. The first
    /// `max_capacity` entries are seated; the remainder are the waitlist.
    pub participants: String,
    pub post_count: i64,
    pub last_post_id: i64,
    pub cancelled: i64,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

impl ChatRow {
    pub fn chat_type(&self) -> ChatType {
        // Rows are only ever written through ChatType::as_str.
        ChatType::from_str(&self.chat_type).unwrap_or(ChatType::LfgOther)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled != 0
    }

    pub fn participant_ids(&self) -> Vec<String> {
        serde_json::from_str(&self.participants).unwrap_or_default()
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participant_ids().iter().any(|p| p == user_id)
    }

    /// Positional seated/waitlist split. `max_capacity == 0` means unlimited,
    /// so everyone is seated.
    pub fn seated_split(&self) -> (Vec<String>, Vec<String>) {
        let members = self.participant_ids();
        if self.max_capacity == 0 || members.len() <= self.max_capacity as usize {
            return (members, Vec::new());
        }
        let mut seated = members;
        let waitlisted = seated.split_off(self.max_capacity as usize);
        (seated, waitlisted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_with(participants: &[&str], max_capacity: i64) -> ChatRow {
        ChatRow {
            chat_id: "c1".to_string(),
            chat_type: "lfgGaming".to_string(),
            owner_id: participants.first().unwrap_or(&"o").to_string(),
            title: "t".to_string(),
            info: String::new(),
            location: None,
            start_time: None,
            end_time: None,
            min_capacity: 0,
            max_capacity,
            participants: serde_json::to_string(participants).unwrap(),
            post_count: 0,
            last_post_id: 0,
            cancelled: 0,
            created_at: String::new(),
            updated_at: String::new(),
            deleted_at: None,
        }
    }

    #[test]
    fn waitlist_split_is_positional() {
        let chat = chat_with(&["a", "b", "c", "d", "e"], 3);
        let (seated, waitlisted) = chat.seated_split();
        assert_eq!(seated, vec!["a", "b", "c"]);
        assert_eq!(waitlisted, vec!["d", "e"]);
    }

    #[test]
    fn zero_capacity_means_unlimited() {
        let chat = chat_with(&["a", "b", "c"], 0);
        let (seated, waitlisted) = chat.seated_split();
        assert_eq!(seated.len(), 3);
        assert!(waitlisted.is_empty());
    }

    #[test]
    fn type_groups() {
        assert!(ChatType::LfgGaming.is_lfg());
        assert!(ChatType::LfgGaming.allows_self_join());
        assert!(!ChatType::Closed.allows_self_join());
        assert!(!ChatType::PrivateEvent.allows_self_join());
        assert!(!ChatType::Closed.allows_member_management());
        assert!(!ChatType::PersonalEvent.allows_member_management());
        assert!(ChatType::Open.allows_member_management());
        assert_eq!(ChatType::from_str("lfgDining"), Some(ChatType::LfgDining));
        assert_eq!(ChatType::from_str("bogus"), None);
    }
}
