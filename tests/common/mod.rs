use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use uuid::Uuid;

use backend_wallet_engine::db::mem::MemStore;
use backend_wallet_engine::db::models::{TxKind, TxStatus};
use backend_wallet_engine::db::store::{LedgerStore, Page, TxFilter};
use backend_wallet_engine::engine::board::{ApplicationTerms, InMemoryJobBoard, JobBoard};
use backend_wallet_engine::engine::escrow::EscrowService;
use backend_wallet_engine::engine::gateway::{HmacGateway, PaymentGateway};
use backend_wallet_engine::engine::notify::{NotificationKind, Notifier};
use backend_wallet_engine::engine::payout::PayoutService;
use backend_wallet_engine::engine::wallet::{TopupLimits, WalletService};

pub const GATEWAY_SECRET: &str = "test-gateway-secret";
pub const CURRENCY: &str = "INR";

/// Captures notification requests so tests can assert on them.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(Uuid, NotificationKind, serde_json::Value)>>,
}

impl RecordingNotifier {
    pub fn kinds_for(&self, recipient: Uuid) -> Vec<NotificationKind> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _, _)| *r == recipient)
            .map(|(_, k, _)| *k)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, recipient: Uuid, kind: NotificationKind, payload: serde_json::Value) {
        self.events.lock().unwrap().push((recipient, kind, payload));
    }
}

pub struct Harness {
    pub store: Arc<MemStore>,
    pub board: Arc<InMemoryJobBoard>,
    pub notifier: Arc<RecordingNotifier>,
    pub gateway: Arc<HmacGateway>,
    pub wallets: WalletService,
    pub escrow: EscrowService,
    pub payouts: PayoutService,
}

pub fn harness() -> Harness {
    let store = Arc::new(MemStore::new());
    let board = Arc::new(InMemoryJobBoard::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let gateway = Arc::new(HmacGateway::new(GATEWAY_SECRET));

    let wallets = WalletService::new(
        store.clone() as Arc<dyn LedgerStore>,
        gateway.clone() as Arc<dyn PaymentGateway>,
        notifier.clone() as Arc<dyn Notifier>,
        TopupLimits::default(),
        CURRENCY,
    );
    let escrow = EscrowService::new(
        store.clone() as Arc<dyn LedgerStore>,
        board.clone() as Arc<dyn JobBoard>,
        notifier.clone() as Arc<dyn Notifier>,
        CURRENCY,
    );
    let payouts = PayoutService::new(
        store.clone() as Arc<dyn LedgerStore>,
        notifier.clone() as Arc<dyn Notifier>,
    );

    Harness {
        store,
        board,
        notifier,
        gateway,
        wallets,
        escrow,
        payouts,
    }
}

/// Seeds an application the employer can accept.
pub fn application(
    employer_id: Uuid,
    employee_id: Uuid,
    hourly_rate: Decimal,
    hours_per_week: &str,
    duration: &str,
) -> ApplicationTerms {
    ApplicationTerms {
        application_id: Uuid::new_v4(),
        job_id: Uuid::new_v4(),
        job_title: "Weekend barista".to_string(),
        employer_id,
        employee_id,
        hourly_rate,
        hours_per_week: hours_per_week.to_string(),
        duration: duration.to_string(),
    }
}

/// Recomputes a user's balance from their ledger: completed credits and
/// refunds in, completed debits and withdrawals out. Pending withdrawals
/// count as out because the reservation deducts the balance at request time.
pub async fn ledger_balance(store: &MemStore, user_id: Uuid) -> Decimal {
    let txs = store
        .transactions_for_user(
            user_id,
            &TxFilter::default(),
            Page {
                limit: 200,
                offset: 0,
            },
        )
        .await
        .unwrap();
    txs.iter().fold(Decimal::ZERO, |acc, tx| match (tx.kind, tx.status) {
        (TxKind::Credit | TxKind::Refund, TxStatus::Completed) => acc + tx.amount,
        (TxKind::Debit | TxKind::Payment, TxStatus::Completed) => acc - tx.amount,
        (TxKind::Withdrawal, TxStatus::Completed | TxStatus::Pending) => acc - tx.amount,
        _ => acc,
    })
}

/// Asserts the reconciliation invariant for one user.
pub async fn assert_reconciled(store: &MemStore, user_id: Uuid) {
    let wallet = store
        .wallet_for_user(user_id)
        .await
        .unwrap()
        .expect("wallet exists");
    let expected = ledger_balance(store, user_id).await;
    assert_eq!(
        wallet.balance, expected,
        "wallet balance diverged from ledger for user {user_id}"
    );
}
