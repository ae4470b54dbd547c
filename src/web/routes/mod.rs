pub mod chats;
pub mod members;
pub mod messages;
pub mod socket;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::AppState;

/// All chat endpoints, mounted under `/api/v3/chats` by the caller.
pub fn chat_router() -> Router<AppState> {
    Router::new()
        .route("/open", get(chats::open_chats_handler))
        .route("/joined", get(chats::joined_chats_handler))
        .route("/owner", get(chats::owner_chats_handler))
        .route("/create", post(chats::create_chat_handler))
        .route(
            "/:chat_id",
            get(chats::chat_detail_handler).delete(chats::delete_chat_handler),
        )
        .route("/:chat_id/update", post(chats::update_chat_handler))
        .route("/:chat_id/cancel", post(chats::cancel_chat_handler))
        .route("/:chat_id/delete", post(chats::delete_chat_handler))
        .route("/:chat_id/join", post(members::join_chat_handler))
        .route("/:chat_id/unjoin", post(members::unjoin_chat_handler))
        .route(
            "/:chat_id/user/:user_id/add",
            post(members::add_member_handler),
        )
        .route(
            "/:chat_id/user/:user_id/remove",
            post(members::remove_member_handler),
        )
        .route("/:chat_id/mute", post(members::mute_chat_handler))
        .route("/:chat_id/unmute", post(members::unmute_chat_handler))
        .route("/:chat_id/post", post(messages::post_message_handler))
        .route(
            "/post/:post_id/delete",
            post(messages::delete_message_handler),
        )
        .route("/post/:post_id", delete(messages::delete_message_handler))
        .route("/post/:post_id/pin", post(messages::pin_message_handler))
        .route(
            "/post/:post_id/unpin",
            post(messages::unpin_message_handler),
        )
        .route("/:chat_id/socket", get(socket::chat_socket_handler))
}
