// Tests for the core session lifecycle: start, increment, end.
//
// Everything runs against the in-memory mock transport; the clearing
// node's quorum rule on close is enforced by the mock, so these tests
// exercise the full signing path as well.

use std::sync::Arc;

use clearmeter_channel_core::client::MockChannelTransport;
use clearmeter_channel_core::{Address, Amount};
use clearmeter_session_core::api::builder::SessionManagerBuilder;
use clearmeter_session_core::{SessionCoordinator, SessionError, SessionId};

const ALICE: &str = "0x1111111111111111111111111111111111111111";
const BOB: &str = "0x2222222222222222222222222222222222222222";

fn addr(s: &str) -> Address {
    Address::parse(s).unwrap()
}

fn amount(s: &str) -> Amount {
    s.parse().unwrap()
}

async fn coordinator_with(
    transport: Arc<MockChannelTransport>,
) -> Arc<SessionCoordinator> {
    SessionManagerBuilder::new()
        .with_counterparty(addr(BOB))
        .build_with_transport(transport)
        .await
        .unwrap()
}

async fn test_coordinator() -> (Arc<SessionCoordinator>, Arc<MockChannelTransport>) {
    let transport = Arc::new(MockChannelTransport::new());
    (coordinator_with(transport.clone()).await, transport)
}

#[tokio::test]
async fn start_session_returns_channel_and_local_ids() {
    let (coordinator, _) = test_coordinator().await;

    let started = coordinator
        .start_session(addr(ALICE))
        .await
        .unwrap();

    assert!(started.session_id.as_str().starts_with("sess-"));
    assert!(!started.channel_session_id.as_str().is_empty());
    assert_eq!(started.initial_allocation.participant, amount("0.01"));
    assert_eq!(started.initial_allocation.counterparty, Amount::ZERO);
    assert_eq!(coordinator.stats().active_sessions, 1);
}

#[tokio::test]
async fn second_start_for_same_participant_reports_existing_session() {
    let (coordinator, _) = test_coordinator().await;

    let first = coordinator
        .start_session(addr("0xabcdef0123456789abcdef0123456789abcdef01"))
        .await
        .unwrap();

    // Same address with different casing: still one session per
    // participant.
    let err = coordinator
        .start_session(addr("0xABCDEF0123456789ABCDEF0123456789ABCDEF01"))
        .await
        .unwrap_err();

    match err {
        SessionError::AlreadyActive {
            existing_session_id,
            ..
        } => assert_eq!(existing_session_id, first.session_id),
        other => panic!("expected AlreadyActive, got {other:?}"),
    }
    assert_eq!(coordinator.stats().active_sessions, 1);
}

#[tokio::test]
async fn increment_updates_usage_and_allocation() {
    let (coordinator, transport) = test_coordinator().await;
    let started = coordinator
        .start_session(addr(ALICE))
        .await
        .unwrap();

    let receipt = coordinator
        .increment_usage(&started.session_id, amount("0.001"))
        .await
        .unwrap();

    assert_eq!(receipt.usage_count, 1);
    assert_eq!(receipt.total_cost, amount("0.001"));
    assert_eq!(receipt.remaining_balance, amount("0.009"));
    assert_eq!(receipt.allocation.participant, amount("0.009"));
    assert_eq!(receipt.allocation.counterparty, amount("0.001"));
    assert!(receipt.state_synced);

    // One open, one state update on the wire.
    assert_eq!(transport.submission_count("create_app_session"), 1);
    assert_eq!(transport.submission_count("submit_app_state"), 1);
}

#[tokio::test]
async fn conservation_holds_at_every_step() {
    let (coordinator, _) = test_coordinator().await;
    let started = coordinator
        .start_session(addr(ALICE))
        .await
        .unwrap();
    let initial = started.initial_allocation.participant;

    for _ in 0..7 {
        let receipt = coordinator
            .increment_usage(&started.session_id, amount("0.001"))
            .await
            .unwrap();
        let total = receipt
            .allocation
            .participant
            .checked_add(receipt.allocation.counterparty)
            .unwrap();
        assert_eq!(total, initial);
    }
}

#[tokio::test]
async fn increment_rejects_costs_above_balance_without_mutating() {
    let (coordinator, transport) = test_coordinator().await;
    let started = coordinator
        .start_session(addr(ALICE))
        .await
        .unwrap();

    let err = coordinator
        .increment_usage(&started.session_id, amount("0.02"))
        .await
        .unwrap_err();

    match err {
        SessionError::InsufficientBalance {
            requested,
            available,
            shortfall,
        } => {
            assert_eq!(requested, amount("0.02"));
            assert_eq!(available, amount("0.01"));
            assert_eq!(shortfall, amount("0.01"));
        }
        other => panic!("expected InsufficientBalance, got {other:?}"),
    }

    // No usage, no cost, no state update hit the wire.
    let sessions = coordinator.list_sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].usage_count, 0);
    assert_eq!(sessions[0].total_cost, Amount::ZERO);
    assert_eq!(transport.submission_count("submit_app_state"), 0);
}

#[tokio::test]
async fn metered_session_spends_down_to_zero_then_rejects() {
    let (coordinator, _) = test_coordinator().await;
    let started = coordinator
        .start_session(addr(ALICE))
        .await
        .unwrap();

    // Reference scenario: 0.01 cap, ten 0.001 increments.
    let mut last = None;
    for _ in 0..10 {
        last = Some(
            coordinator
                .increment_usage(&started.session_id, amount("0.001"))
                .await
                .unwrap(),
        );
    }
    let last = last.unwrap();
    assert_eq!(last.usage_count, 10);
    assert_eq!(last.total_cost, amount("0.01"));
    assert_eq!(last.remaining_balance, Amount::ZERO);
    assert_eq!(last.allocation.participant, Amount::ZERO);
    assert_eq!(last.allocation.counterparty, amount("0.01"));

    // The eleventh increment fails with an exhausted balance.
    let err = coordinator
        .increment_usage(&started.session_id, amount("0.001"))
        .await
        .unwrap_err();
    match err {
        SessionError::InsufficientBalance { available, .. } => {
            assert_eq!(available, Amount::ZERO);
        }
        other => panic!("expected InsufficientBalance, got {other:?}"),
    }
}

#[tokio::test]
async fn end_session_settles_and_removes() {
    let (coordinator, transport) = test_coordinator().await;
    let started = coordinator
        .start_session(addr(ALICE))
        .await
        .unwrap();

    for _ in 0..3 {
        coordinator
            .increment_usage(&started.session_id, amount("0.001"))
            .await
            .unwrap();
    }

    let summary = coordinator.end_session(&started.session_id).await.unwrap();
    assert_eq!(summary.usage_count, 3);
    assert_eq!(summary.total_cost, amount("0.003"));
    assert_eq!(summary.final_allocation.participant, amount("0.007"));
    assert_eq!(summary.final_allocation.counterparty, amount("0.003"));

    // The close envelope carried the 2-of-2 quorum (the mock rejects
    // anything less).
    let closes = transport.submitted("close_app_session");
    assert_eq!(closes.len(), 1);
    assert_eq!(closes[0].sig.len(), 2);

    assert_eq!(coordinator.stats().active_sessions, 0);
    assert_eq!(coordinator.stats().total_closed, 1);
}

#[tokio::test]
async fn end_session_twice_fails_with_not_found() {
    let (coordinator, _) = test_coordinator().await;
    let started = coordinator
        .start_session(addr(ALICE))
        .await
        .unwrap();

    coordinator.end_session(&started.session_id).await.unwrap();
    let err = coordinator.end_session(&started.session_id).await.unwrap_err();
    assert!(matches!(err, SessionError::NotFound { .. }));
}

#[tokio::test]
async fn participant_can_start_again_after_ending() {
    let (coordinator, _) = test_coordinator().await;
    let first = coordinator
        .start_session(addr(ALICE))
        .await
        .unwrap();
    coordinator.end_session(&first.session_id).await.unwrap();

    let second = coordinator
        .start_session(addr(ALICE))
        .await
        .unwrap();
    assert_ne!(second.session_id, first.session_id);
}

#[tokio::test]
async fn operations_on_unknown_ids_fail_with_not_found() {
    let (coordinator, _) = test_coordinator().await;
    let missing = SessionId::new();

    assert!(matches!(
        coordinator.increment_usage(&missing, amount("0.001")).await,
        Err(SessionError::NotFound { .. })
    ));
    assert!(matches!(
        coordinator.end_session(&missing).await,
        Err(SessionError::NotFound { .. })
    ));
}

#[tokio::test]
async fn sessions_for_different_participants_are_independent() {
    let (coordinator, _) = test_coordinator().await;
    let carol = "0x3333333333333333333333333333333333333333";

    let a = coordinator
        .start_session(addr(ALICE))
        .await
        .unwrap();
    let b = coordinator
        .start_session(addr(carol))
        .await
        .unwrap();

    coordinator
        .increment_usage(&a.session_id, amount("0.004"))
        .await
        .unwrap();

    let snapshots = coordinator.list_sessions();
    let snap_b = snapshots
        .iter()
        .find(|s| s.session_id == b.session_id)
        .unwrap();
    assert_eq!(snap_b.total_cost, Amount::ZERO);
    assert_eq!(snap_b.remaining_balance, amount("0.01"));
}

#[tokio::test]
async fn default_cost_increment_uses_config() {
    let transport = Arc::new(MockChannelTransport::new());
    let coordinator = SessionManagerBuilder::new()
        .with_counterparty(addr(BOB))
        .with_default_cost(amount("0.002"))
        .build_with_transport(transport)
        .await
        .unwrap();

    let started = coordinator
        .start_session(addr(ALICE))
        .await
        .unwrap();
    let receipt = coordinator
        .increment_usage_default(&started.session_id)
        .await
        .unwrap();
    assert_eq!(receipt.total_cost, amount("0.002"));
}
