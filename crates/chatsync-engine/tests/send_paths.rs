//! Integration tests for optimistic sends and background tasks.
//!
//! The live transport is mocked with `mockall` so each test states exactly
//! which send outcome it expects.
//!
//! # What is tested
//!
//! - A rejected send removes the provisional entry and hands back the text
//! - An offline transport falls through to the REST path
//! - Unconfirmed sends become FAILED after the timeout, then retry/discard
//! - The watchdog and live listener tasks stop on shutdown

mod common;

use std::sync::Arc;

use chatsync_core::domain::DeliveryState;
use chatsync_core::errors::SendError;
use chatsync_core::ports::{LiveSubscription, TransportError, TransportPort};
use chatsync_engine::testing::LoopbackTransport;
use common::{Harness, ME, payload};
use mockall::mock;
use mockall::predicate::eq;

mock! {
    Transport {}

    impl TransportPort for Transport {
        fn send(&self, from_id: &str, to_id: &str, body: &str) -> Result<(), TransportError>;
        fn subscribe(&self) -> LiveSubscription;
    }
}

fn rejecting_transport() -> Arc<MockTransport> {
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .times(1)
        .returning(|_, _, _| Err(TransportError::Rejected("blocked by moderation".into())));
    Arc::new(transport)
}

fn offline_transport(sends: usize) -> Arc<MockTransport> {
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .times(sends)
        .returning(|_, _, _| Err(TransportError::NotConnected));
    Arc::new(transport)
}

// ── Failure paths ──────────────────────────────────────────────────

#[tokio::test]
async fn test_rejected_send_restores_text() {
    let h = Harness::with_transport(rejecting_transport());
    h.engine.select_conversation("p").await.unwrap();

    let err = h.engine.send_message("  draft with spacing ").await.unwrap_err();
    assert_eq!(err.restorable_body(), Some("  draft with spacing "));

    let view = h.engine.view();
    assert!(view.messages.is_empty());
    assert!(view.last_error.is_some());
    assert!(view.summaries[0].last_message.is_none());
    assert_eq!(h.fallback.calls(), 0);
    assert!(h.emitter.names().contains(&"send:failed"));
}

#[tokio::test]
async fn test_offline_and_fallback_failure_restores_text() {
    let h = Harness::with_transport(offline_transport(1));
    h.fallback.fail_with(TransportError::Fallback("HTTP 502".into()));
    h.engine.select_conversation("p").await.unwrap();

    let err = h.engine.send_message("keep this").await.unwrap_err();
    assert_eq!(
        err,
        SendError::failed("keep this", "Fallback send failed: HTTP 502")
    );
    assert!(h.engine.view().messages.is_empty());
}

#[tokio::test]
async fn test_offline_send_confirms_over_rest() {
    let h = Harness::with_transport(offline_transport(1));
    h.engine.select_conversation("p").await.unwrap();

    let stored = h.engine.send_message("via rest").await.unwrap();
    assert_eq!(stored.id, "rest-1");
    assert_eq!(stored.delivery_state, DeliveryState::Confirmed);

    let view = h.engine.view();
    assert_eq!(view.messages.len(), 1);
    assert_eq!(
        view.summaries[0].last_message.as_ref().map(|m| m.id.as_str()),
        Some("rest-1")
    );

    // The socket echo arriving later is recognised by id.
    h.engine
        .handle_live_event(&payload("rest-1", ME, "p", "via rest", h.at_ms(300)))
        .await;
    assert_eq!(h.engine.view().messages.len(), 1);
}

#[tokio::test]
async fn test_send_goes_to_selected_participant() {
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .with(eq(ME), eq("seller-7"), eq("is it available?"))
        .times(1)
        .returning(|_, _, _| Ok(()));
    let h = Harness::with_transport(Arc::new(transport));

    h.engine.select_conversation("seller-7").await.unwrap();
    h.engine.send_message("is it available?").await.unwrap();
}

// ── Timeouts ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_timeout_retry_and_discard() {
    let (h, transport) = Harness::loopback();
    h.engine.select_conversation("p").await.unwrap();
    let sent = h.engine.send_message("are you there").await.unwrap();

    h.clock.advance_ms(9_999);
    assert_eq!(h.engine.sweep_pending_timeouts().await, 0);
    h.clock.advance_ms(1);
    assert_eq!(h.engine.sweep_pending_timeouts().await, 1);

    let view = h.engine.view();
    let failed = &view.messages[0];
    assert_eq!(failed.id, sent.id);
    assert_eq!(failed.delivery_state, DeliveryState::Failed);

    // Only FAILED entries can be retried.
    let retried = h.engine.retry_failed(&sent.id).await.unwrap();
    assert!(retried.is_pending());
    assert!(matches!(
        h.engine.retry_failed(&retried.id).await,
        Err(SendError::NotRetryable { .. })
    ));
    assert_eq!(transport.sent().len(), 2);

    h.clock.advance_ms(10_000);
    h.engine.sweep_pending_timeouts().await;
    let body = h.engine.discard_failed(&retried.id).await.unwrap();
    assert_eq!(body, "are you there");
    assert!(h.engine.view().messages.is_empty());
}

#[tokio::test]
async fn test_late_echo_confirms_failed_message() {
    let (h, _transport) = Harness::loopback();
    h.engine.select_conversation("p").await.unwrap();
    h.engine.send_message("slow network").await.unwrap();

    h.clock.advance_ms(10_000);
    h.engine.sweep_pending_timeouts().await;
    h.engine
        .handle_live_event(&payload("srv-late", ME, "p", "slow network", h.at_ms(2_000)))
        .await;

    let view = h.engine.view();
    assert_eq!(view.messages.len(), 1);
    assert_eq!(view.messages[0].id, "srv-late");
    assert_eq!(view.messages[0].delivery_state, DeliveryState::Confirmed);
}

// ── Background tasks ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_watchdog_fails_expired_sends() {
    let (h, _transport) = Harness::loopback();
    h.engine.select_conversation("p").await.unwrap();
    h.engine.send_message("tick").await.unwrap();

    let watchdog = h.engine.spawn_timeout_watchdog();
    let mut view = h.engine.subscribe();
    h.clock.advance_ms(10_000);

    view.wait_for(|v| {
        v.messages
            .first()
            .is_some_and(|m| m.delivery_state == DeliveryState::Failed)
    })
    .await
    .unwrap();

    h.engine.shutdown();
    watchdog.await.unwrap();
}

#[tokio::test]
async fn test_live_listener_applies_in_order_until_shutdown() {
    let transport = Arc::new(LoopbackTransport::new());
    let h = Harness::with_transport(transport.clone());
    h.engine.select_conversation("p").await.unwrap();

    let listener = h.engine.spawn_live_listener();
    let mut view = h.engine.subscribe();
    for n in 0..3 {
        transport.push(payload(&format!("{n}"), "p", ME, &format!("live {n}"), h.at_ms(n)));
    }
    view.wait_for(|v| v.messages.len() == 3).await.unwrap();
    assert_eq!(h.ids(), ["0", "1", "2"]);

    h.engine.shutdown();
    listener.await.unwrap();
}
