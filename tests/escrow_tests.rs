mod common;

use common::{application, assert_reconciled, harness};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use backend_wallet_engine::db::models::{ContractStatus, TxKind, TxStatus};
use backend_wallet_engine::db::store::{LedgerStore, Page, TxFilter};
use backend_wallet_engine::engine::notify::NotificationKind;
use backend_wallet_engine::error::EngineError;

#[tokio::test]
async fn contract_creation_locks_employer_funds() {
    let h = harness();
    let employer = Uuid::new_v4();
    let employee = Uuid::new_v4();
    h.wallets.deposit(employer, dec!(10000)).await.unwrap();

    let app = application(employer, employee, dec!(100), "20 hours", "4 weeks");
    h.board.insert_application(app.clone());

    let created = h
        .escrow
        .create_from_application(app.application_id, employer)
        .await
        .unwrap();
    let contract = &created.contract;

    assert_eq!(contract.total_estimated_cost, dec!(8000));
    assert_eq!(contract.weekly_payment, dec!(2000));
    assert_eq!(contract.locked_amount, contract.total_estimated_cost);
    assert_eq!(contract.paid_amount, Decimal::ZERO);
    assert_eq!(contract.remaining_amount, dec!(8000));
    assert_eq!(contract.status, ContractStatus::Active);

    assert_eq!(h.wallets.wallet(employer).await.unwrap().balance, dec!(2000));
    assert_eq!(created.lock_tx.kind, TxKind::Debit);
    assert_eq!(created.lock_tx.status, TxStatus::Completed);
    assert_eq!(created.lock_tx.amount, dec!(8000));
    assert_eq!(created.lock_tx.job_id, Some(app.job_id));
    assert_reconciled(&h.store, employer).await;

    // Collaborator bookkeeping after the funds committed.
    assert!(h.board.is_accepted(app.application_id));
    assert!(h.board.is_job_closed(app.job_id));
    let experience = h.board.experience_of(employee);
    assert_eq!(experience.len(), 1);
    assert!(experience[0].current);
    assert_eq!(
        h.notifier.kinds_for(employee),
        vec![NotificationKind::ContractFunded]
    );
}

#[tokio::test]
async fn insufficient_balance_rejects_creation_untouched() {
    let h = harness();
    let employer = Uuid::new_v4();
    let employee = Uuid::new_v4();
    h.wallets.deposit(employer, dec!(5000)).await.unwrap();

    let app = application(employer, employee, dec!(100), "20 hours", "4 weeks");
    h.board.insert_application(app.clone());

    let err = h
        .escrow
        .create_from_application(app.application_id, employer)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds { .. }));
    assert!(err.to_string().contains("short by 3000"), "{err}");

    assert_eq!(h.wallets.wallet(employer).await.unwrap().balance, dec!(5000));
    let txs = h
        .store
        .transactions_for_user(employer, &TxFilter::default(), Page::default())
        .await
        .unwrap();
    // Only the seed deposit exists; the failed lock left nothing behind.
    assert_eq!(txs.len(), 1);
    assert!(!h.board.is_accepted(app.application_id));
}

#[tokio::test]
async fn only_the_jobs_employer_may_create_the_contract() {
    let h = harness();
    let employer = Uuid::new_v4();
    let imposter = Uuid::new_v4();
    let employee = Uuid::new_v4();
    h.wallets.deposit(imposter, dec!(10000)).await.unwrap();

    let app = application(employer, employee, dec!(100), "20", "4 weeks");
    h.board.insert_application(app.clone());

    let err = h
        .escrow
        .create_from_application(app.application_id, imposter)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized));
    assert_eq!(h.wallets.wallet(imposter).await.unwrap().balance, dec!(10000));
}

#[tokio::test]
async fn one_contract_per_job_and_employee() {
    let h = harness();
    let employer = Uuid::new_v4();
    let employee = Uuid::new_v4();
    h.wallets.deposit(employer, dec!(20000)).await.unwrap();

    let app = application(employer, employee, dec!(100), "20", "4 weeks");
    h.board.insert_application(app.clone());

    h.escrow
        .create_from_application(app.application_id, employer)
        .await
        .unwrap();
    let err = h
        .escrow
        .create_from_application(app.application_id, employer)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateContract));

    // Debited exactly once.
    assert_eq!(h.wallets.wallet(employer).await.unwrap().balance, dec!(12000));
    assert_reconciled(&h.store, employer).await;
}

#[tokio::test]
async fn completion_releases_remaining_funds_exactly_once() {
    let h = harness();
    let employer = Uuid::new_v4();
    let employee = Uuid::new_v4();
    h.wallets.deposit(employer, dec!(10000)).await.unwrap();

    let app = application(employer, employee, dec!(100), "20", "4 weeks");
    h.board.insert_application(app.clone());
    let created = h
        .escrow
        .create_from_application(app.application_id, employer)
        .await
        .unwrap();

    let settlement = h
        .escrow
        .complete(created.contract.id, employer)
        .await
        .unwrap();
    assert_eq!(settlement.unlocked, dec!(8000));
    let contract = &settlement.contract;
    assert_eq!(contract.status, ContractStatus::Completed);
    assert_eq!(contract.remaining_amount, Decimal::ZERO);
    // Escrow conservation: paid + remaining == locked, locked unchanged.
    assert_eq!(
        contract.paid_amount + contract.remaining_amount,
        contract.locked_amount
    );
    assert_eq!(contract.locked_amount, dec!(8000));
    assert!(contract.actual_end_date.is_some());

    let release = settlement.release_tx.as_ref().expect("release transaction");
    assert_eq!(release.kind, TxKind::Credit);
    assert_eq!(release.amount, dec!(8000));
    assert_eq!(h.wallets.wallet(employer).await.unwrap().balance, dec!(10000));
    assert_reconciled(&h.store, employer).await;

    // Experience entry is closed out.
    let experience = h.board.experience_of(employee);
    assert!(!experience[0].current);
    assert!(experience[0].to.is_some());

    // Terminal: the second completion fails and releases nothing.
    let err = h
        .escrow
        .complete(created.contract.id, employer)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    assert_eq!(h.wallets.wallet(employer).await.unwrap().balance, dec!(10000));
}

#[tokio::test]
async fn only_the_employer_completes_but_either_party_terminates() {
    let h = harness();
    let employer = Uuid::new_v4();
    let employee = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    h.wallets.deposit(employer, dec!(10000)).await.unwrap();

    let app = application(employer, employee, dec!(100), "20", "4 weeks");
    h.board.insert_application(app.clone());
    let created = h
        .escrow
        .create_from_application(app.application_id, employer)
        .await
        .unwrap();
    let contract_id = created.contract.id;

    let err = h.escrow.complete(contract_id, employee).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized));
    let err = h.escrow.terminate(contract_id, stranger).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized));

    let settlement = h.escrow.terminate(contract_id, employee).await.unwrap();
    assert_eq!(settlement.contract.status, ContractStatus::Terminated);
    assert_eq!(settlement.unlocked, dec!(8000));
    assert_eq!(h.wallets.wallet(employer).await.unwrap().balance, dec!(10000));
    assert_eq!(
        h.notifier.kinds_for(employee),
        vec![
            NotificationKind::ContractFunded,
            NotificationKind::ContractTerminated
        ]
    );

    // Terminal both ways: no transition out of terminated.
    let err = h.escrow.complete(contract_id, employer).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn storage_fault_during_creation_rolls_the_debit_back() {
    let h = harness();
    let employer = Uuid::new_v4();
    let employee = Uuid::new_v4();
    h.wallets.deposit(employer, dec!(10000)).await.unwrap();

    let app = application(employer, employee, dec!(100), "20", "4 weeks");
    h.board.insert_application(app.clone());

    h.store.fail_next_contract_write();
    let err = h
        .escrow
        .create_from_application(app.application_id, employer)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Internal(_)));

    // Neither the debit nor its ledger entry survived the fault.
    assert_eq!(h.wallets.wallet(employer).await.unwrap().balance, dec!(10000));
    let txs = h
        .store
        .transactions_for_user(employer, &TxFilter::default(), Page::default())
        .await
        .unwrap();
    assert_eq!(txs.len(), 1); // the seed deposit
    assert_reconciled(&h.store, employer).await;

    // A retry without the fault succeeds.
    h.escrow
        .create_from_application(app.application_id, employer)
        .await
        .unwrap();
    assert_eq!(h.wallets.wallet(employer).await.unwrap().balance, dec!(2000));
}

#[tokio::test]
async fn malformed_terms_fall_back_to_defaults() {
    let h = harness();
    let employer = Uuid::new_v4();
    let employee = Uuid::new_v4();
    h.wallets.deposit(employer, dec!(50000)).await.unwrap();

    let app = application(employer, employee, dec!(10), "flexible", "until the season ends");
    h.board.insert_application(app.clone());

    let created = h
        .escrow
        .create_from_application(app.application_id, employer)
        .await
        .unwrap();
    // 10/hr * 20 h default * 12 week default
    assert_eq!(created.contract.hours_per_week, dec!(20));
    assert_eq!(created.contract.duration_weeks, 12);
    assert_eq!(created.contract.total_estimated_cost, dec!(2400));
}
