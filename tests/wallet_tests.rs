mod common;

use common::{assert_reconciled, harness, ledger_balance};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use backend_wallet_engine::db::models::{TxKind, TxStatus};
use backend_wallet_engine::db::store::WithdrawalOutcome;
use backend_wallet_engine::error::EngineError;

#[tokio::test]
async fn deposit_credits_wallet_and_ledger_together() {
    let h = harness();
    let user = Uuid::new_v4();

    let tx = h.wallets.deposit(user, dec!(1000)).await.unwrap();
    assert_eq!(tx.kind, TxKind::Credit);
    assert_eq!(tx.status, TxStatus::Completed);

    let wallet = h.wallets.wallet(user).await.unwrap();
    assert_eq!(wallet.balance, dec!(1000));
    assert_reconciled(&h.store, user).await;
}

#[tokio::test]
async fn deposit_rejects_non_positive_amounts() {
    let h = harness();
    let user = Uuid::new_v4();

    for amount in [Decimal::ZERO, dec!(-5)] {
        let err = h.wallets.deposit(user, amount).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount));
    }
}

#[tokio::test]
async fn transfer_commits_both_legs_together() {
    let h = harness();
    let sender = Uuid::new_v4();
    let recipient = Uuid::new_v4();
    h.wallets.deposit(sender, dec!(500)).await.unwrap();

    let receipt = h
        .wallets
        .transfer(sender, recipient, dec!(200), Some("first week".into()))
        .await
        .unwrap();

    assert_eq!(receipt.debit.kind, TxKind::Debit);
    assert_eq!(receipt.credit.kind, TxKind::Credit);
    assert_eq!(receipt.debit.status, TxStatus::Completed);
    assert_eq!(receipt.credit.status, TxStatus::Completed);

    // The two legs reference each other.
    assert_eq!(
        receipt.debit.metadata["counterpart"],
        serde_json::json!(receipt.credit.id)
    );
    assert_eq!(
        receipt.credit.metadata["counterpart"],
        serde_json::json!(receipt.debit.id)
    );

    assert_eq!(h.wallets.wallet(sender).await.unwrap().balance, dec!(300));
    assert_eq!(h.wallets.wallet(recipient).await.unwrap().balance, dec!(200));
    assert_reconciled(&h.store, sender).await;
    assert_reconciled(&h.store, recipient).await;
}

#[tokio::test]
async fn transfer_with_insufficient_funds_leaves_no_trace() {
    let h = harness();
    let sender = Uuid::new_v4();
    let recipient = Uuid::new_v4();
    h.wallets.deposit(sender, dec!(100)).await.unwrap();

    let err = h
        .wallets
        .transfer(sender, recipient, dec!(250), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds { .. }));
    assert!(err.to_string().contains("short by 150"));

    assert_eq!(h.wallets.wallet(sender).await.unwrap().balance, dec!(100));
    assert_eq!(ledger_balance(&h.store, recipient).await, Decimal::ZERO);
}

#[tokio::test]
async fn transfer_to_self_is_rejected() {
    let h = harness();
    let user = Uuid::new_v4();
    h.wallets.deposit(user, dec!(100)).await.unwrap();

    let err = h.wallets.transfer(user, user, dec!(50), None).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    assert_eq!(h.wallets.wallet(user).await.unwrap().balance, dec!(100));
}

#[tokio::test]
async fn withdrawal_reserves_funds_until_the_rail_settles() {
    let h = harness();
    let user = Uuid::new_v4();
    h.wallets.deposit(user, dec!(500)).await.unwrap();

    let pending = h.wallets.request_withdrawal(user, dec!(200)).await.unwrap();
    assert_eq!(pending.kind, TxKind::Withdrawal);
    assert_eq!(pending.status, TxStatus::Pending);
    // Funds are reserved immediately, not available for double-spend.
    assert_eq!(h.wallets.wallet(user).await.unwrap().balance, dec!(300));
    assert_reconciled(&h.store, user).await;

    let settled = h
        .wallets
        .confirm_withdrawal(pending.id, WithdrawalOutcome::Settled)
        .await
        .unwrap();
    assert_eq!(settled.status, TxStatus::Completed);
    assert_eq!(h.wallets.wallet(user).await.unwrap().balance, dec!(300));
    assert_reconciled(&h.store, user).await;
}

#[tokio::test]
async fn failed_withdrawal_credits_the_reservation_back() {
    let h = harness();
    let user = Uuid::new_v4();
    h.wallets.deposit(user, dec!(500)).await.unwrap();

    let pending = h.wallets.request_withdrawal(user, dec!(200)).await.unwrap();
    let failed = h
        .wallets
        .confirm_withdrawal(
            pending.id,
            WithdrawalOutcome::Failed {
                reason: "bank account closed".into(),
            },
        )
        .await
        .unwrap();

    assert_eq!(failed.status, TxStatus::Failed);
    assert_eq!(failed.metadata["failure_reason"], "bank account closed");
    assert_eq!(h.wallets.wallet(user).await.unwrap().balance, dec!(500));

    // A settled withdrawal is terminal; the callback cannot replay.
    let err = h
        .wallets
        .confirm_withdrawal(pending.id, WithdrawalOutcome::Settled)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    assert_eq!(h.wallets.wallet(user).await.unwrap().balance, dec!(500));
}

#[tokio::test]
async fn withdrawal_cannot_exceed_balance() {
    let h = harness();
    let user = Uuid::new_v4();
    h.wallets.deposit(user, dec!(100)).await.unwrap();

    let err = h
        .wallets
        .request_withdrawal(user, dec!(100.01))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds { .. }));
    assert_eq!(h.wallets.wallet(user).await.unwrap().balance, dec!(100));
}

#[tokio::test]
async fn no_sequence_of_operations_drives_balance_negative() {
    let h = harness();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    h.wallets.deposit(a, dec!(50)).await.unwrap();

    let _ = h.wallets.transfer(a, b, dec!(40), None).await;
    let _ = h.wallets.transfer(a, b, dec!(40), None).await; // must fail
    let _ = h.wallets.request_withdrawal(a, dec!(40)).await; // must fail
    let _ = h.wallets.request_withdrawal(a, dec!(10)).await;

    let wallet_a = h.wallets.wallet(a).await.unwrap();
    let wallet_b = h.wallets.wallet(b).await.unwrap();
    assert!(wallet_a.balance >= Decimal::ZERO);
    assert!(wallet_b.balance >= Decimal::ZERO);
    assert_eq!(wallet_a.balance, Decimal::ZERO);
    assert_eq!(wallet_b.balance, dec!(40));
}
