//! Integration tests for the engine's merge guarantees.
//!
//! Every test drives a `SyncEngine` wired to in-memory ports. No network or
//! real clock is involved.
//!
//! # What is tested
//!
//! - Messages stay ordered by `created_at` whatever the arrival order
//! - Replaying a payload or seeing it in history and live never duplicates it
//! - A send and its echo collapse into one CONFIRMED message
//! - Unread counters only move for inactive conversations
//! - A page response arriving after a conversation switch changes nothing
//! - Older pages are merged at the head, re-sorting on overlap
//! - Random seed/live/older sequences keep the list sorted with unique ids

mod common;

use std::collections::HashSet;

use chatsync_core::domain::{
    ConversationFilters, ConversationSummary, DeliveryState, Participant, ParticipantRole,
};
use chatsync_engine::{
    Classification, ConversationStore, LiveOutcome, Message, SyncEvent, SyncSettings,
};
use chrono::Duration;
use common::{Harness, ME, epoch, history, payload};
use proptest::prelude::*;

// ── Ordering ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_out_of_order_arrivals_stay_sorted() {
    let (h, _transport) = Harness::loopback();
    h.history.insert_history("p", history("p", 10));
    h.engine.select_conversation("p").await.unwrap();

    // Scrambled offsets, some before the loaded history, some interleaved.
    let mut seed: i64 = 17;
    for n in 0..40 {
        seed = (seed * 1_103_515_245 + 12_345) % 2_147_483_648;
        let offset_ms = seed % 1_200_000 - 900_000;
        let raw = payload(
            &format!("live-{n}"),
            "p",
            ME,
            &format!("live body {n}"),
            h.at_ms(offset_ms),
        );
        h.engine.handle_live_event(&raw).await;
    }

    let view = h.engine.view();
    assert_eq!(view.messages.len(), 50);
    assert!(
        view.messages
            .windows(2)
            .all(|w| w[0].created_at <= w[1].created_at),
        "messages must be ordered by created_at"
    );
}

#[tokio::test]
async fn test_equal_timestamps_keep_arrival_order() {
    let (h, _transport) = Harness::loopback();
    h.engine.select_conversation("p").await.unwrap();

    let at = h.now();
    for id in ["a", "b", "c"] {
        h.engine
            .handle_live_event(&payload(id, "p", ME, &format!("body {id}"), at))
            .await;
    }
    assert_eq!(h.ids(), ["a", "b", "c"]);
}

// ── Dedup idempotence ──────────────────────────────────────────────

#[tokio::test]
async fn test_replayed_payload_is_applied_once() {
    let (h, _transport) = Harness::loopback();
    h.engine.select_conversation("p").await.unwrap();

    let raw = payload("42", "p", ME, "hello", h.now());
    let first = h.engine.handle_live_event(&raw).await;
    let second = h.engine.handle_live_event(&raw).await;

    assert_eq!(
        first,
        LiveOutcome::Accepted {
            participant_id: "p".into(),
            classification: Classification::New
        }
    );
    assert_eq!(
        second,
        LiveOutcome::Accepted {
            participant_id: "p".into(),
            classification: Classification::Duplicate
        }
    );
    assert_eq!(h.ids(), ["42"]);
}

#[tokio::test]
async fn test_live_then_history_is_one_message() {
    let (h, _transport) = Harness::loopback();
    let at = epoch() - Duration::seconds(30);
    h.history
        .insert_history("p", [Message::new("77", "p", ME, "both paths", at)]);

    // The live copy lands first, the page fetched afterwards contains it too.
    h.engine
        .handle_live_event(&payload("77", "p", ME, "both paths", at))
        .await;
    h.engine.select_conversation("p").await.unwrap();

    assert_eq!(h.ids(), ["77"]);
}

#[tokio::test]
async fn test_same_content_without_id_within_window_is_dropped() {
    let (h, _transport) = Harness::loopback();
    h.engine.select_conversation("p").await.unwrap();

    let at = h.now();
    h.engine
        .handle_live_event(&payload("9", "p", ME, "ping", at))
        .await;
    let raw = serde_json::json!({
        "fromId": "p", "toId": ME, "body": "  ping ", "createdAt": (at + Duration::seconds(1)).to_rfc3339()
    });
    h.engine.handle_live_event(&raw).await;

    assert_eq!(h.ids(), ["9"]);
}

// ── Reconciliation ─────────────────────────────────────────────────

#[tokio::test]
async fn test_send_and_echo_collapse() {
    let (h, transport) = Harness::loopback();
    h.engine.select_conversation("p").await.unwrap();

    let sent = h.engine.send_message("hi").await.unwrap();
    assert_eq!(sent.delivery_state, DeliveryState::Pending);
    assert_eq!(transport.sent().len(), 1);

    h.engine
        .handle_live_event(&payload("srv-9", ME, "p", "hi", h.at_ms(1_200)))
        .await;

    let view = h.engine.view();
    assert_eq!(view.messages.len(), 1);
    assert_eq!(view.messages[0].id, "srv-9");
    assert_eq!(view.messages[0].delivery_state, DeliveryState::Confirmed);
    assert!(h.emitter.names().contains(&"message:reconciled"));

    // A late sweep has nothing left to fail.
    h.clock.advance_ms(60_000);
    assert_eq!(h.engine.sweep_pending_timeouts().await, 0);
}

#[tokio::test]
async fn test_identical_sends_reconcile_in_order() {
    let (h, _transport) = Harness::loopback();
    h.engine.select_conversation("p").await.unwrap();

    let first = h.engine.send_message("ok").await.unwrap();
    h.clock.advance_ms(1_000);
    let second = h.engine.send_message("ok").await.unwrap();

    h.engine
        .handle_live_event(&payload("srv-1", ME, "p", "ok", h.at_ms(1_100)))
        .await;
    h.engine
        .handle_live_event(&payload("srv-2", ME, "p", "ok", h.at_ms(1_900)))
        .await;

    let view = h.engine.view();
    assert_eq!(h.ids(), ["srv-1", "srv-2"]);
    assert!(
        view.messages
            .iter()
            .all(|m| m.delivery_state == DeliveryState::Confirmed)
    );
    assert_eq!(view.messages[0].created_at, first.created_at);
    assert_eq!(view.messages[1].created_at, second.created_at);
}

#[tokio::test]
async fn test_history_page_confirms_pending_send() {
    let (h, _transport) = Harness::loopback();
    h.engine.select_conversation("p").await.unwrap();
    let sent = h.engine.send_message("via history").await.unwrap();

    h.history.insert_history(
        "p",
        [Message::new("srv-5", ME, "p", "via history", h.at_ms(800))],
    );
    // Reselecting reloads page 1, which already holds the server copy.
    h.engine.select_conversation("p").await.unwrap();

    assert_eq!(h.ids(), ["srv-5"]);
    let reconciled = h.emitter.events().into_iter().any(|e| match e {
        SyncEvent::MessageReconciled { provisional_id, .. } => provisional_id == sent.id,
        _ => false,
    });
    assert!(reconciled);
}

// ── Unread counting ────────────────────────────────────────────────

#[tokio::test]
async fn test_unread_counts_follow_selection() {
    let (h, _transport) = Harness::loopback();
    h.engine.select_conversation("a").await.unwrap();

    for n in 0..3 {
        h.engine
            .handle_live_event(&payload(&format!("b{n}"), "b", ME, &format!("hey {n}"), h.at_ms(n)))
            .await;
    }
    h.engine
        .handle_live_event(&payload("a0", "a", ME, "in view", h.at_ms(10)))
        .await;

    let view = h.engine.view();
    assert_eq!(view.total_unread(), 3);
    assert_eq!(view.summaries[0].participant_id, "a");

    h.engine.select_conversation("b").await.unwrap();
    let view = h.engine.view();
    assert_eq!(view.total_unread(), 0);
    assert_eq!(view.messages.len(), 3);
}

#[tokio::test]
async fn test_own_messages_never_count_as_unread() {
    let (h, _transport) = Harness::loopback();
    h.engine
        .handle_live_event(&payload("x", ME, "b", "sent elsewhere", h.now()))
        .await;
    assert_eq!(h.engine.view().total_unread(), 0);
}

// ── Pagination ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_stale_older_page_is_discarded() {
    let (h, _transport) = Harness::loopback();
    h.history.insert_history("a", history("a", 30));
    h.history.insert_history("b", history("b", 5));

    h.engine.select_conversation("a").await.unwrap();
    assert_eq!(h.engine.view().messages.len(), 20);

    h.history.hold("a");
    let engine = h.engine.clone();
    let older = tokio::spawn(async move { engine.load_older_messages().await });
    h.history.wait_for_requests(2).await;

    h.engine.select_conversation("b").await.unwrap();
    h.history.release_one();
    older.await.unwrap().unwrap();

    let view = h.engine.view();
    assert_eq!(view.active_participant.as_deref(), Some("b"));
    assert_eq!(view.messages.len(), 5);
    assert!(view.messages.iter().all(|m| m.from_id == "b"));
    assert!(h.emitter.names().contains(&"page:stale_discarded"));

    // A kept only its first page.
    h.engine.close_conversation("b").await;
    h.history.release_one();
    h.engine.select_conversation("a").await.unwrap();
    assert_eq!(h.engine.view().messages.len(), 20);
}

#[tokio::test]
async fn test_load_older_until_exhausted() {
    let (h, _transport) = Harness::loopback();
    h.history.insert_history("p", history("p", 45));
    h.engine.select_conversation("p").await.unwrap();

    h.engine.load_older_messages().await.unwrap();
    h.engine.load_older_messages().await.unwrap();
    let view = h.engine.view();
    assert_eq!(view.messages.len(), 45);
    assert!(!view.pagination.has_more);
    assert!(!view.pagination.can_load_older());

    // Further calls are no-ops.
    h.engine.load_older_messages().await.unwrap();
    assert_eq!(h.history.requests().len(), 3);
}

#[tokio::test]
async fn test_load_older_without_conversation() {
    let (h, _transport) = Harness::loopback();
    assert!(h.engine.load_older_messages().await.is_err());
}

#[test]
fn test_prepend_overlapping_page_resorts() {
    let settings = SyncSettings::with_defaults();
    let mut store = ConversationStore::new("p", &settings);
    let at = |secs: i64| epoch() + Duration::seconds(secs);
    let msg = |id: &str, secs: i64| Message::new(id, "p", ME, format!("m{id}"), at(secs));

    store.seed(vec![msg("1", 100), msg("2", 200)]);
    store.prepend_older(vec![msg("0", 50)]);
    store.prepend_older(vec![msg("3", 150)]);

    let ids: Vec<&str> = store.messages().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["0", "1", "3", "2"]);
}

// ── Randomized merge sequences ─────────────────────────────────────

#[derive(Debug, Clone)]
enum StoreOp {
    Seed(Vec<Message>),
    Live(Message),
    Older(Vec<Message>),
}

/// Small id and body spaces so sequences hit id and content collisions.
fn arb_message() -> impl Strategy<Value = Message> {
    (0u8..24, -600i64..600, 0u8..4, any::<bool>()).prop_map(|(id, secs, body, inbound)| {
        let (from, to) = if inbound { ("p", ME) } else { (ME, "p") };
        Message::new(
            format!("srv-{id}"),
            from,
            to,
            format!("body {body}"),
            epoch() + Duration::seconds(secs),
        )
    })
}

fn arb_op() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        prop::collection::vec(arb_message(), 0..8).prop_map(StoreOp::Seed),
        arb_message().prop_map(StoreOp::Live),
        prop::collection::vec(arb_message(), 0..8).prop_map(StoreOp::Older),
    ]
}

proptest! {
    #[test]
    fn test_random_merge_sequences_stay_ordered_and_unique(
        ops in prop::collection::vec(arb_op(), 1..40)
    ) {
        let settings = SyncSettings::with_defaults();
        let mut store = ConversationStore::new("p", &settings);

        for op in ops {
            match op {
                StoreOp::Seed(page) => {
                    store.seed(page);
                }
                StoreOp::Live(message) => {
                    store.append_live(message);
                }
                StoreOp::Older(page) => {
                    store.prepend_older(page);
                }
            }

            prop_assert!(store.is_ordered());
            let mut ids = HashSet::new();
            prop_assert!(store.messages().iter().all(|m| ids.insert(m.id.as_str())));
        }
    }
}

// ── Conversation list ──────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_summaries_applies_filters() {
    let (h, _transport) = Harness::loopback();
    let mut seller = ConversationSummary::empty(Participant::new("s", "Shop", ParticipantRole::Seller));
    seller.unread_count = 1;
    let buyer = ConversationSummary::empty(Participant::new("b", "Bea", ParticipantRole::Buyer));
    h.conversations.set(vec![seller, buyer]);

    let filters = ConversationFilters {
        role: Some(ParticipantRole::Seller),
        ..ConversationFilters::default()
    };
    assert_eq!(h.engine.refresh_summaries(&filters).await.unwrap(), 1);

    let view = h.engine.view();
    assert_eq!(view.summaries.len(), 1);
    assert_eq!(view.summaries[0].participant_name, "Shop");
    assert_eq!(view.total_unread(), 1);
}

#[tokio::test]
async fn test_refresh_keeps_active_conversation_read() {
    let (h, _transport) = Harness::loopback();
    h.engine.select_conversation("s").await.unwrap();

    let mut remote = ConversationSummary::empty(Participant::new("s", "Shop", ParticipantRole::Seller));
    remote.unread_count = 4;
    h.engine.seed_summaries(vec![remote]).await;

    let view = h.engine.view();
    assert_eq!(view.summaries[0].participant_name, "Shop");
    assert_eq!(view.total_unread(), 0);
}
