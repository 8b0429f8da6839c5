mod common;

use common::Harness;
use ledgerflow::application::transfer::TransferRequest;
use ledgerflow::domain::entity::{EntityId, LedgerEntity};
use ledgerflow::domain::money::Balance;
use ledgerflow::domain::operation::OperationStatus;
use rust_decimal_macros::dec;
use std::time::Duration;

#[tokio::test]
async fn test_transfer_between_active_cards() {
    let h = Harness::new();
    let x = h.card(dec!(100)).await;
    let y = h.card(dec!(10)).await;

    let record = h
        .engine
        .transfer(TransferRequest::new(x, y, dec!(50)))
        .await
        .unwrap();

    assert_eq!(record.status, OperationStatus::Completed);
    assert_eq!(record.error_message, None);
    assert_eq!(h.balance(x).await, dec!(50));
    assert_eq!(h.balance(y).await, dec!(60));
}

#[tokio::test]
async fn test_transfer_from_inactive_card() {
    let h = Harness::new();
    let owner = h.account(dec!(0)).await;
    let x = h
        .seed(LedgerEntity::card("x", owner, Balance::new(dec!(100))).deactivated())
        .await;
    let y = h.card(dec!(10)).await;

    let record = h
        .engine
        .transfer(TransferRequest::new(x, y, dec!(50)))
        .await
        .unwrap();

    assert_eq!(record.status, OperationStatus::Failed);
    assert_eq!(record.error_message.as_deref(), Some("source card is not active"));
    assert_eq!(h.balance(x).await, dec!(100));
    assert_eq!(h.balance(y).await, dec!(10));

    let records = h.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, OperationStatus::Failed);
}

#[tokio::test]
async fn test_transfer_to_inactive_destination() {
    let h = Harness::new();
    let x = h.account(dec!(100)).await;
    let y = h
        .seed(LedgerEntity::account("y", Balance::ZERO).deactivated())
        .await;

    let record = h
        .engine
        .transfer(TransferRequest::new(x, y, dec!(1)))
        .await
        .unwrap();

    assert_eq!(
        record.error_message.as_deref(),
        Some("destination account is not active")
    );
    assert_eq!(h.balance(x).await, dec!(100));
}

#[tokio::test]
async fn test_transfer_rejects_non_positive_amounts() {
    let h = Harness::new();
    let x = h.account(dec!(100)).await;
    let y = h.account(dec!(0)).await;

    for amount in [dec!(0), dec!(-5), dec!(-0.01)] {
        let record = h
            .engine
            .transfer(TransferRequest::new(x, y, amount))
            .await
            .unwrap();
        assert_eq!(record.status, OperationStatus::Failed);
        assert_eq!(record.error_message.as_deref(), Some("invalid amount"));
    }
    assert_eq!(h.balance(x).await, dec!(100));
    assert_eq!(h.balance(y).await, dec!(0));
}

#[tokio::test]
async fn test_self_transfer_fails_regardless_of_balance() {
    let h = Harness::new();
    let x = h.account(dec!(1000)).await;

    let record = h
        .engine
        .transfer(TransferRequest::new(x, x, dec!(1)))
        .await
        .unwrap();

    assert_eq!(record.status, OperationStatus::Failed);
    assert_eq!(
        record.error_message.as_deref(),
        Some("self-transfer is not allowed")
    );
    assert_eq!(h.balance(x).await, dec!(1000));
}

#[tokio::test]
async fn test_transfer_insufficient_balance() {
    let h = Harness::new();
    let x = h.account(dec!(49.99)).await;
    let y = h.account(dec!(0)).await;

    let record = h
        .engine
        .transfer(TransferRequest::new(x, y, dec!(50)))
        .await
        .unwrap();

    assert_eq!(record.error_message.as_deref(), Some("insufficient balance"));
    assert_eq!(h.balance(x).await, dec!(49.99));
    assert_eq!(h.balance(y).await, dec!(0));
}

#[tokio::test]
async fn test_transfer_exact_balance_leaves_zero() {
    let h = Harness::new();
    let x = h.account(dec!(50)).await;
    let y = h.account(dec!(0)).await;

    let record = h
        .engine
        .transfer(TransferRequest::new(x, y, dec!(50)))
        .await
        .unwrap();

    assert_eq!(record.status, OperationStatus::Completed);
    assert_eq!(h.balance(x).await, dec!(0));
    assert_eq!(h.balance(y).await, dec!(50));
}

#[tokio::test]
async fn test_transfer_unknown_entities() {
    let h = Harness::new();
    let x = h.account(dec!(100)).await;

    let record = h
        .engine
        .transfer(TransferRequest::new(EntityId::new(), x, dec!(1)))
        .await
        .unwrap();
    assert_eq!(record.error_message.as_deref(), Some("source not found"));

    let record = h
        .engine
        .transfer(TransferRequest::new(x, EntityId::new(), dec!(1)))
        .await
        .unwrap();
    assert_eq!(record.error_message.as_deref(), Some("destination not found"));
    assert_eq!(h.balance(x).await, dec!(100));
}

#[tokio::test]
async fn test_store_failure_becomes_failed_record() {
    let h = Harness::new();
    let x = h.account(dec!(100)).await;
    let y = h.account(dec!(0)).await;

    h.entities.set_unavailable(true);
    let record = h
        .engine
        .transfer(TransferRequest::new(x, y, dec!(10)))
        .await
        .unwrap();
    h.entities.set_unavailable(false);

    assert_eq!(record.status, OperationStatus::Failed);
    assert!(
        record
            .error_message
            .as_deref()
            .unwrap()
            .contains("entity store is unavailable")
    );
    assert_eq!(h.balance(x).await, dec!(100));
}

#[tokio::test]
async fn test_commit_failure_rolls_back() {
    let h = Harness::new();
    let x = h.account(dec!(100)).await;
    let y = h.account(dec!(0)).await;

    h.entities.fail_commits(true);
    let record = h
        .engine
        .transfer(TransferRequest::new(x, y, dec!(10)))
        .await
        .unwrap();
    h.entities.fail_commits(false);

    assert_eq!(record.status, OperationStatus::Failed);
    assert_eq!(h.balance(x).await, dec!(100));
    assert_eq!(h.balance(y).await, dec!(0));

    // Row locks were released with the failed transaction
    let record = h
        .engine
        .transfer(TransferRequest::new(x, y, dec!(10)))
        .await
        .unwrap();
    assert_eq!(record.status, OperationStatus::Completed);
}

#[tokio::test]
async fn test_failing_record_write_is_a_hard_error() {
    let h = Harness::new();
    let x = h.account(dec!(100)).await;
    let y = h.account(dec!(0)).await;

    h.operations.fail_creates(true);
    let result = h
        .engine
        .transfer(TransferRequest::new(x, y, dec!(10)))
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_one_record_per_call() {
    let h = Harness::new();
    let x = h.account(dec!(100)).await;
    let y = h.account(dec!(0)).await;

    let requests = [
        TransferRequest::new(x, y, dec!(10)),
        TransferRequest::new(x, y, dec!(0)),
        TransferRequest::new(x, x, dec!(10)),
        TransferRequest::new(x, y, dec!(1000)),
        TransferRequest::new(y, x, dec!(5)),
        TransferRequest::new(EntityId::new(), y, dec!(5)),
    ];
    let calls = requests.len();
    for request in requests {
        h.engine.transfer(request).await.unwrap();
    }

    assert_eq!(h.records().await.len(), calls);
    h.engine.shutdown().await;
    assert_eq!(h.attempt_count().await, calls);
}

#[tokio::test]
async fn test_transfer_waits_out_deadline_on_held_entity() {
    let h = Harness::new();
    let x = h.account(dec!(100)).await;
    let y = h.account(dec!(0)).await;

    let token = h.engine.coordinator().acquire(y).await;
    let record = h
        .engine
        .transfer(TransferRequest::new(x, y, dec!(10)).with_timeout(Duration::from_millis(50)))
        .await
        .unwrap();
    drop(token);

    assert_eq!(record.status, OperationStatus::Failed);
    assert_eq!(record.error_message.as_deref(), Some("operation timed out"));
    assert_eq!(h.balance(x).await, dec!(100));

    // The timed out operation released x's token
    let record = h
        .engine
        .transfer(TransferRequest::new(x, y, dec!(10)))
        .await
        .unwrap();
    assert_eq!(record.status, OperationStatus::Completed);
}

#[tokio::test]
async fn test_cached_balance_is_invalidated_after_transfer() {
    let h = Harness::new();
    let x = h.account(dec!(100)).await;
    let y = h.account(dec!(0)).await;

    // Warm the cache
    assert_eq!(h.balance(x).await, dec!(100));
    assert!(h.cache.contains(&format!("entity:{x}")).await);

    h.engine
        .transfer(TransferRequest::new(x, y, dec!(25)))
        .await
        .unwrap();

    assert!(!h.cache.contains(&format!("entity:{x}")).await);
    assert_eq!(h.balance(x).await, dec!(75));
    assert_eq!(h.balance(y).await, dec!(25));
}
