pub mod chat_service;
pub mod effective_user;
pub mod fanout;
pub mod message_service;
pub mod notifications;
pub mod pagination;
pub mod visibility;
