use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::broadcast;

/// Push events for live chat viewers. Push-only: mutations always go through
/// the request path, which publishes here as a side effect.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChatEvent {
    #[serde(rename_all = "camelCase")]
    NewMessage {
        chat_id: String,
        post_id: i64,
        author_id: String,
    },
    #[serde(rename_all = "camelCase")]
    MembershipChange {
        chat_id: String,
        user_id: String,
        joined: bool,
    },
}

impl ChatEvent {
    /// The user whose action produced the event; receivers suppress events
    /// from actors they block or mute.
    pub fn actor_id(&self) -> &str {
        match self {
            ChatEvent::NewMessage { author_id, .. } => author_id,
            ChatEvent::MembershipChange { user_id, .. } => user_id,
        }
    }
}

const CHANNEL_CAPACITY: usize = 64;

/// Process-wide chat-id → live-viewer channel map. The map mutex is held only
/// for lookup/insert/prune; delivery goes through the per-chat broadcast
/// channel, so one busy chat never blocks another. Slow or dead receivers lag
/// out of the broadcast buffer and are dropped (best-effort delivery; the
/// notification counters remain the durable record).
pub struct ChatRegistry {
    channels: Mutex<HashMap<String, broadcast::Sender<ChatEvent>>>,
}

impl ChatRegistry {
    pub fn new() -> ChatRegistry {
        ChatRegistry {
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a live viewer; the receiver side is owned by the socket
    /// task and dropped on disconnect.
    pub fn subscribe(&self, chat_id: &str) -> broadcast::Receiver<ChatEvent> {
        let mut channels = self.channels.lock().expect("registry mutex poisoned");
        channels
            .entry(chat_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Fire-and-forget publish. A chat whose last viewer has disconnected is
    /// pruned from the map here.
    pub fn publish(&self, chat_id: &str, event: ChatEvent) {
        let mut channels = self.channels.lock().expect("registry mutex poisoned");
        if let Some(sender) = channels.get(chat_id) {
            if sender.send(event).is_err() {
                channels.remove(chat_id);
            }
        }
    }

    pub fn live_chat_count(&self) -> usize {
        self.channels.lock().expect("registry mutex poisoned").len()
    }
}

impl Default for ChatRegistry {
    fn default() -> Self {
        ChatRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_all_subscribers() {
        let registry = ChatRegistry::new();
        let mut rx1 = registry.subscribe("c1");
        let mut rx2 = registry.subscribe("c1");

        registry.publish(
            "c1",
            ChatEvent::NewMessage {
                chat_id: "c1".to_string(),
                post_id: 7,
                author_id: "alice".to_string(),
            },
        );

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                ChatEvent::NewMessage { post_id, .. } => assert_eq!(post_id, 7),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn publish_without_viewers_is_a_no_op_and_prunes() {
        let registry = ChatRegistry::new();
        {
            let _rx = registry.subscribe("c1");
            assert_eq!(registry.live_chat_count(), 1);
        }
        // Receiver dropped; the next publish finds no viewers and prunes.
        registry.publish(
            "c1",
            ChatEvent::MembershipChange {
                chat_id: "c1".to_string(),
                user_id: "bob".to_string(),
                joined: true,
            },
        );
        assert_eq!(registry.live_chat_count(), 0);

        // Publishing to an unknown chat is silently ignored.
        registry.publish(
            "never-subscribed",
            ChatEvent::MembershipChange {
                chat_id: "never-subscribed".to_string(),
                user_id: "bob".to_string(),
                joined: false,
            },
        );
    }

    #[test]
    fn events_serialize_with_type_tags() {
        let event = ChatEvent::NewMessage {
            chat_id: "c1".to_string(),
            post_id: 1,
            author_id: "a".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "newMessage");
        assert_eq!(json["chatId"], "c1");
    }
}
