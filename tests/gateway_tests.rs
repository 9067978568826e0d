mod common;

use common::{assert_reconciled, harness};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use backend_wallet_engine::db::models::TxStatus;
use backend_wallet_engine::db::store::{LedgerStore, Page, TxFilter};
use backend_wallet_engine::error::EngineError;

#[tokio::test]
async fn topup_amount_must_be_within_bounds() {
    let h = harness();
    let user = Uuid::new_v4();

    let err = h.wallets.begin_topup(user, dec!(99)).await.unwrap_err();
    assert!(matches!(err, EngineError::AmountOutOfBounds { .. }));
    let err = h.wallets.begin_topup(user, dec!(100001)).await.unwrap_err();
    assert!(matches!(err, EngineError::AmountOutOfBounds { .. }));
    let err = h.wallets.begin_topup(user, Decimal::ZERO).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount));

    // Nothing was recorded for any of the rejected requests.
    let txs = h
        .store
        .transactions_for_user(user, &TxFilter::default(), Page::default())
        .await
        .unwrap();
    assert!(txs.is_empty());
}

#[tokio::test]
async fn verified_topup_credits_the_wallet_once() {
    let h = harness();
    let user = Uuid::new_v4();

    let order = h.wallets.begin_topup(user, dec!(500)).await.unwrap();
    assert_eq!(order.transaction.status, TxStatus::Pending);
    // Pending gateway credits have no balance effect.
    assert_eq!(h.wallets.wallet(user).await.unwrap().balance, Decimal::ZERO);

    let signature = h.gateway.sign(&order.order_id, "pay_1");
    let tx = h
        .wallets
        .confirm_topup(user, &order.order_id, "pay_1", &signature)
        .await
        .unwrap();
    assert_eq!(tx.status, TxStatus::Completed);
    assert_eq!(h.wallets.wallet(user).await.unwrap().balance, dec!(500));
    assert_reconciled(&h.store, user).await;
}

#[tokio::test]
async fn replayed_confirmation_is_a_no_op() {
    let h = harness();
    let user = Uuid::new_v4();

    let order = h.wallets.begin_topup(user, dec!(500)).await.unwrap();
    let signature = h.gateway.sign(&order.order_id, "pay_1");

    let first = h
        .wallets
        .confirm_topup(user, &order.order_id, "pay_1", &signature)
        .await
        .unwrap();
    let second = h
        .wallets
        .confirm_topup(user, &order.order_id, "pay_1", &signature)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    // Credited exactly once despite the duplicate delivery.
    assert_eq!(h.wallets.wallet(user).await.unwrap().balance, dec!(500));
    assert_reconciled(&h.store, user).await;
}

#[tokio::test]
async fn bad_signature_fails_the_topup_without_crediting() {
    let h = harness();
    let user = Uuid::new_v4();

    let order = h.wallets.begin_topup(user, dec!(500)).await.unwrap();
    let err = h
        .wallets
        .confirm_topup(user, &order.order_id, "pay_1", "deadbeef")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SignatureMismatch));
    assert_eq!(h.wallets.wallet(user).await.unwrap().balance, Decimal::ZERO);

    let failed = h
        .store
        .find_by_gateway_order(&order.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.status, TxStatus::Failed);

    // The order is burned; a later confirmation with a valid signature
    // cannot resurrect it.
    let signature = h.gateway.sign(&order.order_id, "pay_1");
    let err = h
        .wallets
        .confirm_topup(user, &order.order_id, "pay_1", &signature)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    assert_eq!(h.wallets.wallet(user).await.unwrap().balance, Decimal::ZERO);
}

#[tokio::test]
async fn confirmation_is_scoped_to_the_ordering_user() {
    let h = harness();
    let user = Uuid::new_v4();
    let attacker = Uuid::new_v4();

    let order = h.wallets.begin_topup(user, dec!(500)).await.unwrap();
    let signature = h.gateway.sign(&order.order_id, "pay_1");

    let err = h
        .wallets
        .confirm_topup(attacker, &order.order_id, "pay_1", &signature)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::TransactionNotFound));

    // The rightful owner can still confirm.
    h.wallets
        .confirm_topup(user, &order.order_id, "pay_1", &signature)
        .await
        .unwrap();
    assert_eq!(h.wallets.wallet(user).await.unwrap().balance, dec!(500));
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let h = harness();
    let user = Uuid::new_v4();
    let err = h
        .wallets
        .confirm_topup(user, "order_missing", "pay_1", "sig")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::TransactionNotFound));
}
