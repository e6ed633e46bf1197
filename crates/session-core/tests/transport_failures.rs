// Tests for transport failure paths: authentication and connection
// failures at start, unacknowledged state updates, rejected closes, and
// the protocol-violation case of an open response without a channel
// session id.

use std::sync::Arc;

use clearmeter_channel_core::client::MockChannelTransport;
use clearmeter_channel_core::{Address, Amount};
use clearmeter_session_core::api::builder::SessionManagerBuilder;
use clearmeter_session_core::{SessionError, SessionEvent};

const ALICE: &str = "0x1111111111111111111111111111111111111111";
const BOB: &str = "0x2222222222222222222222222222222222222222";

fn addr(s: &str) -> Address {
    Address::parse(s).unwrap()
}

fn amount(s: &str) -> Amount {
    s.parse().unwrap()
}

#[tokio::test]
async fn authentication_failure_leaves_no_partial_session() {
    let transport = Arc::new(MockChannelTransport::new().with_authentication_failure());
    let coordinator = SessionManagerBuilder::new()
        .with_counterparty(addr(BOB))
        .build_with_transport(transport)
        .await
        .unwrap();

    let err = coordinator
        .start_session(addr(ALICE))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::AuthenticationFailed { .. }));

    // Start is all-or-nothing: nothing entered the registry.
    assert_eq!(coordinator.stats().active_sessions, 0);
    assert_eq!(coordinator.stats().total_created, 0);
}

#[tokio::test]
async fn connection_failure_surfaces_as_connection_failed() {
    let transport = Arc::new(MockChannelTransport::new().with_connection_failure());
    let coordinator = SessionManagerBuilder::new()
        .with_counterparty(addr(BOB))
        .build_with_transport(transport)
        .await
        .unwrap();

    let err = coordinator
        .start_session(addr(ALICE))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::ConnectionFailed { .. }));
    assert_eq!(coordinator.stats().active_sessions, 0);
}

#[tokio::test]
async fn open_without_channel_session_id_is_a_protocol_violation() {
    let transport = Arc::new(MockChannelTransport::new().with_missing_session_id());
    let coordinator = SessionManagerBuilder::new()
        .with_counterparty(addr(BOB))
        .build_with_transport(transport)
        .await
        .unwrap();

    let err = coordinator
        .start_session(addr(ALICE))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::ProtocolViolation { .. }));
    assert_eq!(coordinator.stats().active_sessions, 0);
}

#[tokio::test]
async fn failed_state_update_keeps_local_accounting() {
    let transport = Arc::new(MockChannelTransport::new().with_submit_failure());
    let coordinator = SessionManagerBuilder::new()
        .with_counterparty(addr(BOB))
        .build_with_transport(transport)
        .await
        .unwrap();

    let started = coordinator
        .start_session(addr(ALICE))
        .await
        .unwrap();

    let receipt = coordinator
        .increment_usage(&started.session_id, amount("0.001"))
        .await
        .unwrap();

    // The increment stands even though the clearing node never saw it.
    assert!(!receipt.state_synced);
    assert_eq!(receipt.usage_count, 1);
    assert_eq!(receipt.total_cost, amount("0.001"));

    let sessions = coordinator.list_sessions();
    assert_eq!(sessions[0].usage_count, 1);
    assert_eq!(sessions[0].total_cost, amount("0.001"));
}

#[tokio::test]
async fn rejected_close_still_removes_the_session() {
    let transport = Arc::new(MockChannelTransport::new().with_close_rejection());
    let coordinator = SessionManagerBuilder::new()
        .with_counterparty(addr(BOB))
        .build_with_transport(transport)
        .await
        .unwrap();

    let started = coordinator
        .start_session(addr(ALICE))
        .await
        .unwrap();

    // Cleanup is unconditional once the close has been submitted.
    let summary = coordinator.end_session(&started.session_id).await.unwrap();
    assert_eq!(summary.usage_count, 0);
    assert_eq!(coordinator.stats().active_sessions, 0);

    let err = coordinator.end_session(&started.session_id).await.unwrap_err();
    assert!(matches!(err, SessionError::NotFound { .. }));
}

#[tokio::test]
async fn lifecycle_milestones_are_published_as_events() {
    let transport = Arc::new(MockChannelTransport::new());
    let coordinator = SessionManagerBuilder::new()
        .with_counterparty(addr(BOB))
        .build_with_transport(transport)
        .await
        .unwrap();
    let mut events = coordinator.subscribe().await.unwrap();

    let started = coordinator
        .start_session(addr(ALICE))
        .await
        .unwrap();
    coordinator
        .increment_usage(&started.session_id, amount("0.001"))
        .await
        .unwrap();
    coordinator
        .increment_usage(&started.session_id, amount("0.02"))
        .await
        .unwrap_err();
    coordinator.end_session(&started.session_id).await.unwrap();

    let mut opened = 0;
    let mut incremented = 0;
    let mut rejected = 0;
    let mut closed = 0;
    while let Ok(Some(event)) = events.try_receive() {
        match event {
            SessionEvent::SessionOpened { session_id, .. } => {
                assert_eq!(session_id, started.session_id);
                opened += 1;
            }
            SessionEvent::UsageIncremented { usage_count, .. } => {
                assert_eq!(usage_count, 1);
                incremented += 1;
            }
            SessionEvent::BalanceRejected {
                requested,
                available,
                shortfall,
                ..
            } => {
                assert_eq!(requested, amount("0.02"));
                assert_eq!(available, amount("0.009"));
                assert_eq!(shortfall, amount("0.011"));
                rejected += 1;
            }
            SessionEvent::SessionClosed { total_cost, .. } => {
                assert_eq!(total_cost, amount("0.001"));
                closed += 1;
            }
            _ => {}
        }
    }
    assert_eq!(opened, 1);
    assert_eq!(incremented, 1);
    assert_eq!(rejected, 1);
    assert_eq!(closed, 1);
}
