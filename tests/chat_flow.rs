use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use shipchat::database::{self, membership_repo, notification_repo};
use shipchat::models::AccessLevel;
use shipchat::services::chat_service::{self, CreateChatRequest};
use shipchat::services::fanout::ChatRegistry;
use shipchat::services::message_service::{self, PostMessageRequest};
use shipchat::services::pagination::PageParams;
use shipchat::web::middleware::auth::AuthenticatedUser;

async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    database::init_schema(&pool).await.expect("schema");
    pool
}

async fn seed_user(pool: &SqlitePool, id: &str, level: i64) {
    sqlx::query("INSERT INTO users (user_id, username, display_name, access_level) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(id)
        .bind(id)
        .bind(level)
        .execute(pool)
        .await
        .expect("seed user");
}

async fn add_relation(pool: &SqlitePool, user: &str, target: &str, relation: &str) {
    sqlx::query("INSERT INTO user_relations (user_id, target_user_id, relation) VALUES (?, ?, ?)")
        .bind(user)
        .bind(target)
        .bind(relation)
        .execute(pool)
        .await
        .expect("seed relation");
}

fn auth(id: &str, level: AccessLevel) -> AuthenticatedUser {
    AuthenticatedUser {
        id: id.to_string(),
        access_level: level,
    }
}

fn verified(id: &str) -> AuthenticatedUser {
    auth(id, AccessLevel::Verified)
}

fn lfg_request(max_capacity: i64, initial_users: Vec<String>) -> CreateChatRequest {
    CreateChatRequest {
        chat_type: "lfgGaming".to_string(),
        title: "Catan at the pool deck".to_string(),
        info: String::new(),
        location: Some("Deck 9".to_string()),
        start_time: None,
        end_time: None,
        min_capacity: 0,
        max_capacity,
        initial_users,
    }
}

fn post_req(text: &str) -> PostMessageRequest {
    PostMessageRequest {
        text: text.to_string(),
        image: None,
    }
}

async fn assert_count_invariant(pool: &SqlitePool, chat_id: &str) {
    let chat = shipchat::database::chat_repo::get_chat(pool, chat_id)
        .await
        .unwrap()
        .expect("chat");
    for member in membership_repo::list_active(pool, chat_id).await.unwrap() {
        assert!(
            member.read_count + member.hidden_count <= chat.post_count,
            "count invariant violated for {}: {} + {} > {}",
            member.user_id,
            member.read_count,
            member.hidden_count,
            chat.post_count
        );
    }
}

// The waitlist is positional and promotion is implicit.
#[tokio::test]
async fn third_joiner_is_waitlisted_and_promoted_on_unjoin() {
    let pool = test_pool().await;
    let registry = ChatRegistry::new();
    for u in ["alice", "bob", "cindy"] {
        seed_user(&pool, u, 1).await;
    }

    let chat = chat_service::create_chat(
        &pool,
        &verified("alice"),
        None,
        &lfg_request(2, vec!["bob".to_string()]),
    )
    .await
    .unwrap();

    let chat = chat_service::join_chat(&pool, &registry, &verified("cindy"), &chat.chat_id)
        .await
        .unwrap();
    assert_eq!(chat.participant_ids().len(), 3);
    let (seated, waitlisted) = chat.seated_split();
    assert_eq!(seated, vec!["alice", "bob"]);
    assert_eq!(waitlisted, vec!["cindy"]);

    // A seated member leaves; the waitlisted member becomes seated purely by
    // position.
    let chat = chat_service::unjoin_chat(&pool, &registry, &verified("bob"), &chat.chat_id)
        .await
        .unwrap();
    let (seated, waitlisted) = chat.seated_split();
    assert_eq!(seated, vec!["alice", "cindy"]);
    assert!(waitlisted.is_empty());

    // Bob's pivot row is soft-deleted, not gone.
    assert!(
        membership_repo::get_active(&pool, &chat.chat_id, "bob")
            .await
            .unwrap()
            .is_none()
    );
    assert_count_invariant(&pool, &chat.chat_id).await;
}

// A post from a blocked author lands in hidden_count, not in the member's
// message list or badge.
#[tokio::test]
async fn post_by_blocked_author_is_hidden_from_blocker() {
    let pool = test_pool().await;
    let registry = ChatRegistry::new();
    seed_user(&pool, "alice", 1).await;
    seed_user(&pool, "bob", 1).await;

    let chat = chat_service::create_chat(
        &pool,
        &verified("alice"),
        None,
        &lfg_request(0, vec!["bob".to_string()]),
    )
    .await
    .unwrap();

    // Block added after joining; membership is unaffected.
    add_relation(&pool, "bob", "alice", "block").await;

    message_service::post_message(
        &pool,
        &registry,
        &verified("alice"),
        &chat.chat_id,
        None,
        &post_req("anyone up for a game?"),
    )
    .await
    .unwrap();

    let chat = shipchat::database::chat_repo::get_chat(&pool, &chat.chat_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(chat.post_count, 1);

    let bob = membership_repo::get_active(&pool, &chat.chat_id, "bob")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bob.hidden_count, 1);
    assert_eq!(bob.read_count, 0);

    // Bob's message list is empty even though post_count advanced.
    let detail = chat_service::chat_detail(
        &pool,
        &verified("bob"),
        &chat.chat_id,
        None,
        &PageParams::default(),
    )
    .await
    .unwrap();
    assert!(detail.messages.is_empty());
    assert_eq!(detail.post_count, 0);

    // No badge for a message bob cannot see.
    let unseen = notification_repo::unseen(&pool, "bob", "lfg_unread")
        .await
        .unwrap();
    assert_eq!(unseen, 0);

    // Posting implies reading: alice is immediately caught up.
    let alice = membership_repo::get_active(&pool, &chat.chat_id, "alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alice.read_count, chat.post_count - alice.hidden_count);
    assert_count_invariant(&pool, &chat.chat_id).await;
}

// Deleting the hidden message walks both counters back.
#[tokio::test]
async fn deleting_hidden_message_reverts_counters() {
    let pool = test_pool().await;
    let registry = ChatRegistry::new();
    seed_user(&pool, "alice", 1).await;
    seed_user(&pool, "bob", 1).await;

    let chat = chat_service::create_chat(
        &pool,
        &verified("alice"),
        None,
        &lfg_request(0, vec!["bob".to_string()]),
    )
    .await
    .unwrap();
    add_relation(&pool, "bob", "alice", "block").await;

    let message = message_service::post_message(
        &pool,
        &registry,
        &verified("alice"),
        &chat.chat_id,
        None,
        &post_req("soon deleted"),
    )
    .await
    .unwrap();

    message_service::delete_message(&pool, &verified("alice"), message.post_id, None)
        .await
        .unwrap();

    let chat = shipchat::database::chat_repo::get_chat(&pool, &chat.chat_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(chat.post_count, 0);

    let bob = membership_repo::get_active(&pool, &chat.chat_id, "bob")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bob.hidden_count, 0);

    let alice = membership_repo::get_active(&pool, &chat.chat_id, "alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alice.read_count, 0);
    assert_count_invariant(&pool, &chat.chat_id).await;
}

// One team member reading the shared inbox clears the badge for every
// account at that level.
#[tokio::test]
async fn shared_mailbox_read_marks_viewed_for_all_peers() {
    let pool = test_pool().await;
    let registry = ChatRegistry::new();
    seed_user(&pool, "u1", 3).await;
    seed_user(&pool, "u2", 3).await;
    seed_user(&pool, "sam", 1).await;

    // u1 opens a seamail to the team inbox; the shared identity owns it and
    // u1 personally is not a participant.
    let chat = chat_service::create_chat(
        &pool,
        &auth("u1", AccessLevel::Team),
        Some("team"),
        &CreateChatRequest {
            chat_type: "closed".to_string(),
            title: "question for the crew".to_string(),
            info: String::new(),
            location: None,
            start_time: None,
            end_time: None,
            min_capacity: 0,
            max_capacity: 0,
            initial_users: vec!["sam".to_string()],
        },
    )
    .await
    .unwrap();
    assert_eq!(chat.owner_id, "mailbox-team");
    assert!(!chat.is_participant("u1"));

    message_service::post_message(
        &pool,
        &registry,
        &verified("sam"),
        &chat.chat_id,
        None,
        &post_req("hello crew"),
    )
    .await
    .unwrap();

    // Both team members got a badge.
    assert_eq!(
        notification_repo::unseen(&pool, "u1", "seamail_unread").await.unwrap(),
        1
    );
    assert_eq!(
        notification_repo::unseen(&pool, "u2", "seamail_unread").await.unwrap(),
        1
    );

    // u1 reads the shared inbox to full catch-up.
    let detail = chat_service::chat_detail(
        &pool,
        &auth("u1", AccessLevel::Team),
        &chat.chat_id,
        Some("team"),
        &PageParams::default(),
    )
    .await
    .unwrap();
    assert_eq!(detail.messages.len(), 1);

    // The shared pivot row advanced, not u1's personal one.
    let shared = membership_repo::get_active(&pool, &chat.chat_id, "mailbox-team")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shared.read_count, 1);

    // u2 never issued a read, but their badge is down too.
    assert_eq!(
        notification_repo::unseen(&pool, "u2", "seamail_unread").await.unwrap(),
        0
    );
    assert_count_invariant(&pool, &chat.chat_id).await;
}

// Default starts round down to page boundaries, and repeated reads with no
// new posts return the same page.
#[tokio::test]
async fn default_pagination_resumes_at_page_boundary() {
    let pool = test_pool().await;
    let registry = ChatRegistry::new();
    seed_user(&pool, "alice", 1).await;
    seed_user(&pool, "bob", 1).await;

    let chat = chat_service::create_chat(
        &pool,
        &verified("alice"),
        None,
        &lfg_request(0, vec!["bob".to_string()]),
    )
    .await
    .unwrap();

    for i in 0..7 {
        message_service::post_message(
            &pool,
            &registry,
            &verified("alice"),
            &chat.chat_id,
            None,
            &post_req(&format!("message {i}")),
        )
        .await
        .unwrap();
    }

    let page = |limit: Option<i64>| PageParams {
        limit,
        ..Default::default()
    };

    // First page: start 0, three messages, read_count -> 3.
    let d1 = chat_service::chat_detail(&pool, &verified("bob"), &chat.chat_id, None, &page(Some(3)))
        .await
        .unwrap();
    assert_eq!(d1.paginator.start, 0);
    assert_eq!(d1.messages.len(), 3);

    // Second page resumes at floor(3/3)*3 = 3.
    let d2 = chat_service::chat_detail(&pool, &verified("bob"), &chat.chat_id, None, &page(Some(3)))
        .await
        .unwrap();
    assert_eq!(d2.paginator.start, 3);
    assert_eq!(d2.messages.len(), 3);

    // Third page: the tail.
    let d3 = chat_service::chat_detail(&pool, &verified("bob"), &chat.chat_id, None, &page(Some(3)))
        .await
        .unwrap();
    assert_eq!(d3.paginator.start, 6);
    assert_eq!(d3.messages.len(), 1);

    // Fully caught up now; with no new posts, repeated reads are stable.
    let d4 = chat_service::chat_detail(&pool, &verified("bob"), &chat.chat_id, None, &page(Some(3)))
        .await
        .unwrap();
    assert_eq!(d4.paginator.start, 6);
    assert_eq!(
        d4.messages.iter().map(|m| m.post_id).collect::<Vec<_>>(),
        d3.messages.iter().map(|m| m.post_id).collect::<Vec<_>>()
    );
    assert_count_invariant(&pool, &chat.chat_id).await;
}

#[tokio::test]
async fn start_message_id_counts_only_visible_messages() {
    let pool = test_pool().await;
    let registry = ChatRegistry::new();
    for u in ["alice", "bob", "carol"] {
        seed_user(&pool, u, 1).await;
    }

    let chat = chat_service::create_chat(
        &pool,
        &verified("alice"),
        None,
        &lfg_request(0, vec!["bob".to_string(), "carol".to_string()]),
    )
    .await
    .unwrap();

    // Interleave posts, then have carol mute alice: alice's posts no longer
    // count toward carol's index space.
    let mut ids = Vec::new();
    for (author, text) in [("alice", "a1"), ("bob", "b1"), ("alice", "a2"), ("bob", "b2")] {
        let m = message_service::post_message(
            &pool,
            &registry,
            &verified(author),
            &chat.chat_id,
            None,
            &post_req(text),
        )
        .await
        .unwrap();
        ids.push(m.post_id);
    }
    add_relation(&pool, "carol", "alice", "mute").await;

    // For carol, b2 is preceded by exactly one visible message (b1).
    let detail = chat_service::chat_detail(
        &pool,
        &verified("carol"),
        &chat.chat_id,
        None,
        &PageParams {
            limit: Some(10),
            start: None,
            start_message_id: Some(ids[3]),
        },
    )
    .await
    .unwrap();
    assert_eq!(detail.paginator.start, 1);
    assert_eq!(detail.messages.len(), 1);
    assert_eq!(detail.messages[0].text, "b2");
}

#[tokio::test]
async fn join_and_mute_are_idempotent() {
    let pool = test_pool().await;
    let registry = ChatRegistry::new();
    seed_user(&pool, "alice", 1).await;
    seed_user(&pool, "bob", 1).await;

    let chat = chat_service::create_chat(&pool, &verified("alice"), None, &lfg_request(0, vec![]))
        .await
        .unwrap();

    chat_service::join_chat(&pool, &registry, &verified("bob"), &chat.chat_id)
        .await
        .unwrap();
    // Joining again succeeds and does not duplicate the participant entry.
    let chat = chat_service::join_chat(&pool, &registry, &verified("bob"), &chat.chat_id)
        .await
        .unwrap();
    assert_eq!(chat.participant_ids(), vec!["alice", "bob"]);

    chat_service::set_chat_muted(&pool, &verified("bob"), &chat.chat_id, true)
        .await
        .unwrap();
    chat_service::set_chat_muted(&pool, &verified("bob"), &chat.chat_id, true)
        .await
        .unwrap();
    let bob = membership_repo::get_active(&pool, &chat.chat_id, "bob")
        .await
        .unwrap()
        .unwrap();
    assert!(bob.is_muted());
}

#[tokio::test]
async fn rejoin_restores_counters_and_reseeds_hidden() {
    let pool = test_pool().await;
    let registry = ChatRegistry::new();
    for u in ["alice", "bob", "troll"] {
        seed_user(&pool, u, 1).await;
    }

    let chat = chat_service::create_chat(
        &pool,
        &verified("alice"),
        None,
        &lfg_request(0, vec!["bob".to_string(), "troll".to_string()]),
    )
    .await
    .unwrap();
    add_relation(&pool, "bob", "troll", "block").await;

    message_service::post_message(&pool, &registry, &verified("alice"), &chat.chat_id, None, &post_req("one"))
        .await
        .unwrap();

    // Bob reads, leaves, misses a blocked post and a visible post, rejoins.
    chat_service::chat_detail(&pool, &verified("bob"), &chat.chat_id, None, &PageParams::default())
        .await
        .unwrap();
    chat_service::unjoin_chat(&pool, &registry, &verified("bob"), &chat.chat_id)
        .await
        .unwrap();
    message_service::post_message(&pool, &registry, &verified("troll"), &chat.chat_id, None, &post_req("two"))
        .await
        .unwrap();
    message_service::post_message(&pool, &registry, &verified("alice"), &chat.chat_id, None, &post_req("three"))
        .await
        .unwrap();
    chat_service::join_chat(&pool, &registry, &verified("bob"), &chat.chat_id)
        .await
        .unwrap();

    let bob = membership_repo::get_active(&pool, &chat.chat_id, "bob")
        .await
        .unwrap()
        .unwrap();
    // The troll's post is pre-hidden; the historical read position survives.
    assert_eq!(bob.hidden_count, 1);
    assert_eq!(bob.read_count, 1);
    assert_count_invariant(&pool, &chat.chat_id).await;
}

#[tokio::test]
async fn membership_rules_are_enforced() {
    let pool = test_pool().await;
    let registry = ChatRegistry::new();
    for u in ["alice", "bob", "eve"] {
        seed_user(&pool, u, 1).await;
    }

    // Closed chats cannot be joined or left.
    let seamail = chat_service::create_chat(
        &pool,
        &verified("alice"),
        None,
        &CreateChatRequest {
            chat_type: "closed".to_string(),
            title: "private".to_string(),
            info: String::new(),
            location: None,
            start_time: None,
            end_time: None,
            min_capacity: 0,
            max_capacity: 0,
            initial_users: vec!["bob".to_string()],
        },
    )
    .await
    .unwrap();
    assert!(chat_service::join_chat(&pool, &registry, &verified("eve"), &seamail.chat_id)
        .await
        .is_err());
    assert!(chat_service::unjoin_chat(&pool, &registry, &verified("bob"), &seamail.chat_id)
        .await
        .is_err());

    // Closed chats need a second member after block filtering.
    add_relation(&pool, "alice", "eve", "block").await;
    let result = chat_service::create_chat(
        &pool,
        &verified("alice"),
        None,
        &CreateChatRequest {
            chat_type: "closed".to_string(),
            title: "to a blocked user".to_string(),
            info: String::new(),
            location: None,
            start_time: None,
            end_time: None,
            min_capacity: 0,
            max_capacity: 0,
            initial_users: vec!["eve".to_string()],
        },
    )
    .await;
    assert!(result.is_err());

    // An unknown initial member is an absent target, not malformed input.
    assert!(matches!(
        chat_service::create_chat(
            &pool,
            &verified("alice"),
            None,
            &lfg_request(0, vec!["ghost".to_string()])
        )
        .await,
        Err(shipchat::error::ChatError::NotFound)
    ));

    // Owners stay seated: no self-removal, no unjoin.
    let lfg = chat_service::create_chat(&pool, &verified("alice"), None, &lfg_request(0, vec![]))
        .await
        .unwrap();
    assert!(chat_service::unjoin_chat(&pool, &registry, &verified("alice"), &lfg.chat_id)
        .await
        .is_err());
    assert!(
        chat_service::remove_member(&pool, &registry, &verified("alice"), &lfg.chat_id, "alice", None)
            .await
            .is_err()
    );

    // A blocked user cannot find the chat to join it.
    assert!(matches!(
        chat_service::join_chat(&pool, &registry, &verified("eve"), &lfg.chat_id).await,
        Err(shipchat::error::ChatError::NotFound)
    ));
}

#[tokio::test]
async fn cancel_keeps_chat_postable_but_out_of_open_listing() {
    let pool = test_pool().await;
    let registry = ChatRegistry::new();
    seed_user(&pool, "alice", 1).await;
    seed_user(&pool, "bob", 1).await;

    let chat = chat_service::create_chat(
        &pool,
        &verified("alice"),
        None,
        &lfg_request(0, vec!["bob".to_string()]),
    )
    .await
    .unwrap();

    let open = chat_service::list_open(&pool, &verified("bob"), &Default::default())
        .await
        .unwrap();
    assert_eq!(open.len(), 1);

    chat_service::cancel_chat(&pool, &verified("alice"), &chat.chat_id, None)
        .await
        .unwrap();

    let open = chat_service::list_open(&pool, &verified("bob"), &Default::default())
        .await
        .unwrap();
    assert!(open.is_empty());

    // Still postable and still listed for members.
    message_service::post_message(
        &pool,
        &registry,
        &verified("bob"),
        &chat.chat_id,
        None,
        &post_req("still here"),
    )
    .await
    .unwrap();
    let joined = chat_service::list_joined(&pool, &verified("bob"), &Default::default())
        .await
        .unwrap();
    assert_eq!(joined.len(), 1);
    assert!(joined[0].cancelled);

    // Update clears the cancellation and it reappears in discovery.
    chat_service::update_chat(
        &pool,
        &verified("alice"),
        &chat.chat_id,
        None,
        &shipchat::services::chat_service::UpdateChatRequest {
            chat_type: "lfgGaming".to_string(),
            title: "Catan at the pool deck".to_string(),
            info: "back on".to_string(),
            location: Some("Deck 9".to_string()),
            start_time: None,
            end_time: None,
            min_capacity: 0,
            max_capacity: 0,
        },
    )
    .await
    .unwrap();
    let open = chat_service::list_open(&pool, &verified("bob"), &Default::default())
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
}

#[tokio::test]
async fn open_listing_honors_day_and_hidefull_filters() {
    let pool = test_pool().await;
    seed_user(&pool, "alice", 1).await;
    seed_user(&pool, "bob", 1).await;

    let mut monday = lfg_request(0, vec![]);
    monday.start_time = Some("2026-09-07T14:00:00Z".to_string());
    monday.title = "monday game".to_string();
    chat_service::create_chat(&pool, &verified("alice"), None, &monday)
        .await
        .unwrap();

    // Full chat: capacity 1, owner already seated.
    let mut full = lfg_request(1, vec![]);
    full.start_time = Some("2026-09-08T14:00:00Z".to_string());
    full.title = "tuesday game".to_string();
    chat_service::create_chat(&pool, &verified("alice"), None, &full)
        .await
        .unwrap();

    let query = |day: Option<&str>, hide_full: bool| chat_service::ChatsQuery {
        day: day.map(str::to_string),
        hide_full,
        ..Default::default()
    };

    let all = chat_service::list_open(&pool, &verified("bob"), &query(None, false))
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let monday_only =
        chat_service::list_open(&pool, &verified("bob"), &query(Some("2026-09-07"), false))
            .await
            .unwrap();
    assert_eq!(monday_only.len(), 1);
    assert_eq!(monday_only[0].title, "monday game");

    let with_seats = chat_service::list_open(&pool, &verified("bob"), &query(None, true))
        .await
        .unwrap();
    assert_eq!(with_seats.len(), 1);
    assert_eq!(with_seats[0].title, "monday game");
}

#[tokio::test]
async fn delete_chat_detaches_members_and_keeps_messages() {
    let pool = test_pool().await;
    let registry = ChatRegistry::new();
    seed_user(&pool, "alice", 1).await;
    seed_user(&pool, "mod", 2).await;

    let chat = chat_service::create_chat(&pool, &verified("alice"), None, &lfg_request(0, vec![]))
        .await
        .unwrap();
    let message = message_service::post_message(
        &pool,
        &registry,
        &verified("alice"),
        &chat.chat_id,
        None,
        &post_req("evidence"),
    )
    .await
    .unwrap();

    // Owners of plain LFGs cannot delete; moderators can.
    assert!(chat_service::delete_chat(&pool, &verified("alice"), &chat.chat_id)
        .await
        .is_err());
    chat_service::delete_chat(&pool, &auth("mod", AccessLevel::Moderator), &chat.chat_id)
        .await
        .unwrap();

    assert!(shipchat::database::chat_repo::get_chat(&pool, &chat.chat_id)
        .await
        .unwrap()
        .is_none());
    assert!(membership_repo::list_active(&pool, &chat.chat_id)
        .await
        .unwrap()
        .is_empty());
    // The message row survives for audit.
    assert!(shipchat::database::message_repo::get(&pool, message.post_id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn effective_user_gate_rejects_underprivileged_callers() {
    let pool = test_pool().await;
    seed_user(&pool, "sam", 1).await;

    let err = shipchat::services::effective_user::resolve(
        &pool,
        &verified("sam"),
        Some("moderator"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, shipchat::error::ChatError::Permission(_)));

    let err = shipchat::services::effective_user::resolve(&pool, &verified("sam"), Some("bogus"))
        .await
        .unwrap_err();
    assert!(matches!(err, shipchat::error::ChatError::Validation(_)));
}

// A chat owned by a shared mailbox is managed by anyone allowed to act as
// that mailbox, and by nobody acting personally.
#[tokio::test]
async fn shared_mailbox_owner_can_manage_its_chats() {
    let pool = test_pool().await;
    let registry = ChatRegistry::new();
    seed_user(&pool, "u1", 3).await;
    seed_user(&pool, "u2", 3).await;
    seed_user(&pool, "sam", 1).await;
    seed_user(&pool, "pat", 1).await;

    let chat = chat_service::create_chat(
        &pool,
        &auth("u1", AccessLevel::Team),
        Some("team"),
        &CreateChatRequest {
            chat_type: "open".to_string(),
            title: "crew notices".to_string(),
            info: String::new(),
            location: None,
            start_time: None,
            end_time: None,
            min_capacity: 0,
            max_capacity: 0,
            initial_users: vec!["sam".to_string()],
        },
    )
    .await
    .unwrap();
    assert_eq!(chat.owner_id, "mailbox-team");

    let update = shipchat::services::chat_service::UpdateChatRequest {
        chat_type: "open".to_string(),
        title: "crew notices".to_string(),
        info: "pinned schedule inside".to_string(),
        location: None,
        start_time: None,
        end_time: None,
        min_capacity: 0,
        max_capacity: 0,
    };

    // Acting personally, even the creator is not the owner.
    assert!(matches!(
        chat_service::update_chat(
            &pool,
            &auth("u1", AccessLevel::Team),
            &chat.chat_id,
            None,
            &update
        )
        .await,
        Err(shipchat::error::ChatError::Permission(_))
    ));

    // Acting as the mailbox, any account at the gating level manages it.
    chat_service::update_chat(
        &pool,
        &auth("u1", AccessLevel::Team),
        &chat.chat_id,
        Some("team"),
        &update,
    )
    .await
    .unwrap();
    chat_service::add_member(
        &pool,
        &registry,
        &auth("u2", AccessLevel::Team),
        &chat.chat_id,
        "pat",
        Some("team"),
    )
    .await
    .unwrap();
    chat_service::remove_member(
        &pool,
        &registry,
        &auth("u2", AccessLevel::Team),
        &chat.chat_id,
        "pat",
        Some("team"),
    )
    .await
    .unwrap();
    chat_service::cancel_chat(
        &pool,
        &auth("u2", AccessLevel::Team),
        &chat.chat_id,
        Some("team"),
    )
    .await
    .unwrap();

    // The privilege gate on the mailbox itself still applies.
    assert!(
        chat_service::cancel_chat(&pool, &verified("sam"), &chat.chat_id, Some("team"))
            .await
            .is_err()
    );
}

// Paging far past the visible tail must not touch read state or badges.
#[tokio::test]
async fn out_of_range_page_does_not_advance_read_state() {
    let pool = test_pool().await;
    let registry = ChatRegistry::new();
    seed_user(&pool, "alice", 1).await;
    seed_user(&pool, "bob", 1).await;

    let chat = chat_service::create_chat(
        &pool,
        &verified("alice"),
        None,
        &lfg_request(0, vec!["bob".to_string()]),
    )
    .await
    .unwrap();
    message_service::post_message(
        &pool,
        &registry,
        &verified("alice"),
        &chat.chat_id,
        None,
        &post_req("one"),
    )
    .await
    .unwrap();

    let detail = chat_service::chat_detail(
        &pool,
        &verified("bob"),
        &chat.chat_id,
        None,
        &PageParams {
            limit: Some(10),
            start: Some(500),
            start_message_id: None,
        },
    )
    .await
    .unwrap();
    assert!(detail.messages.is_empty());
    assert_eq!(detail.read_count, Some(0));

    let member = membership_repo::get_active(&pool, &chat.chat_id, "bob")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(member.read_count, 0);
    assert_eq!(
        notification_repo::unseen(&pool, "bob", "lfg_unread").await.unwrap(),
        1
    );

    // A default read still advances and clears the badge.
    let detail = chat_service::chat_detail(
        &pool,
        &verified("bob"),
        &chat.chat_id,
        None,
        &PageParams::default(),
    )
    .await
    .unwrap();
    assert_eq!(detail.read_count, Some(1));
    assert_eq!(
        notification_repo::unseen(&pool, "bob", "lfg_unread").await.unwrap(),
        0
    );
    assert_count_invariant(&pool, &chat.chat_id).await;
}
