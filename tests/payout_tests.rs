mod common;

use common::{assert_reconciled, harness};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use backend_wallet_engine::db::models::{TxKind, TxStatus};
use backend_wallet_engine::db::store::{LedgerStore, Page, TxFilter};
use backend_wallet_engine::engine::notify::NotificationKind;

#[tokio::test]
async fn sweep_zeroes_only_funded_wallets() {
    let h = harness();
    let funded = Uuid::new_v4();
    let empty = Uuid::new_v4();
    h.wallets.deposit(funded, dec!(300)).await.unwrap();
    h.wallets.wallet(empty).await.unwrap(); // exists with zero balance

    let report = h.payouts.process_weekly_payouts().await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped, 0);

    assert_eq!(h.wallets.wallet(funded).await.unwrap().balance, Decimal::ZERO);
    let txs = h
        .store
        .transactions_for_user(funded, &TxFilter::default(), Page::default())
        .await
        .unwrap();
    let sweep = txs.iter().find(|t| t.kind == TxKind::Withdrawal).unwrap();
    assert_eq!(sweep.amount, dec!(300));
    assert_eq!(sweep.status, TxStatus::Completed);
    assert_reconciled(&h.store, funded).await;

    assert_eq!(
        h.notifier.kinds_for(funded),
        vec![NotificationKind::PayoutProcessed]
    );
    assert!(h.notifier.kinds_for(empty).is_empty());
}

#[tokio::test]
async fn one_wallet_failure_does_not_abort_the_sweep() {
    let h = harness();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    h.wallets.deposit(a, dec!(300)).await.unwrap();
    h.wallets.deposit(b, dec!(200)).await.unwrap();

    let wallet_b = h.wallets.wallet(b).await.unwrap();
    h.store.fail_sweep_of(wallet_b.id);

    let report = h.payouts.process_weekly_payouts().await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped, 1);

    assert_eq!(h.wallets.wallet(a).await.unwrap().balance, Decimal::ZERO);
    // The failed wallet kept its funds and its ledger is untouched.
    assert_eq!(h.wallets.wallet(b).await.unwrap().balance, dec!(200));
    assert_reconciled(&h.store, b).await;

    // The next run picks it up.
    let report = h.payouts.process_weekly_payouts().await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(h.wallets.wallet(b).await.unwrap().balance, Decimal::ZERO);
}

#[tokio::test]
async fn sweep_with_no_funded_wallets_is_empty() {
    let h = harness();
    let user = Uuid::new_v4();
    h.wallets.wallet(user).await.unwrap();

    let report = h.payouts.process_weekly_payouts().await.unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(report.skipped, 0);
}

#[tokio::test]
async fn repeated_sweeps_are_idempotent_on_zero_balances() {
    let h = harness();
    let user = Uuid::new_v4();
    h.wallets.deposit(user, dec!(300)).await.unwrap();

    h.payouts.process_weekly_payouts().await.unwrap();
    let report = h.payouts.process_weekly_payouts().await.unwrap();
    assert_eq!(report.processed, 0);

    // Exactly one withdrawal was ever recorded.
    let txs = h
        .store
        .transactions_for_user(user, &TxFilter::default(), Page::default())
        .await
        .unwrap();
    assert_eq!(
        txs.iter().filter(|t| t.kind == TxKind::Withdrawal).count(),
        1
    );
}
