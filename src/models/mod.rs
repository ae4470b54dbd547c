pub mod chats;
pub mod memberships;
pub mod messages;
pub mod users;

pub use chats::{ChatRow, ChatType};
pub use memberships::MemberRow;
pub use messages::MessageRow;
pub use users::{AccessLevel, UserHeader, UserRow};
