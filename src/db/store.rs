use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::models::{Contract, ContractStatus, Transaction, TxKind, TxStatus, Wallet};
use crate::error::EngineError;

/// Everything needed to open an escrow contract, with the money figures
/// already computed from the application's terms.
#[derive(Debug, Clone)]
pub struct NewContract {
    pub job_id: Uuid,
    pub employer_id: Uuid,
    pub employee_id: Uuid,
    pub application_id: Uuid,
    pub job_title: String,
    pub currency: String,
    pub hourly_rate: Decimal,
    pub hours_per_week: Decimal,
    pub duration_weeks: u32,
    pub weekly_payment: Decimal,
    pub total_estimated_cost: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl NewContract {
    /// Materializes the contract row. Locked amount equals the total estimate,
    /// nothing is paid yet, everything remains.
    pub fn into_contract(self) -> Contract {
        let now = Utc::now();
        Contract {
            id: Uuid::new_v4(),
            job_id: self.job_id,
            employer_id: self.employer_id,
            employee_id: self.employee_id,
            application_id: self.application_id,
            hourly_rate: self.hourly_rate,
            hours_per_week: self.hours_per_week,
            duration_weeks: self.duration_weeks,
            weekly_payment: self.weekly_payment,
            total_estimated_cost: self.total_estimated_cost,
            locked_amount: self.total_estimated_cost,
            paid_amount: Decimal::ZERO,
            remaining_amount: self.total_estimated_cost,
            status: ContractStatus::Active,
            start_date: self.start_date,
            end_date: self.end_date,
            actual_end_date: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// How an active contract is being closed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractClosing {
    Complete,
    Terminate,
}

impl ContractClosing {
    pub fn final_status(&self) -> ContractStatus {
        match self {
            Self::Complete => ContractStatus::Completed,
            Self::Terminate => ContractStatus::Terminated,
        }
    }
}

/// Result of closing a contract: the terminal contract, the amount released
/// back to the employer, and the release transaction when funds moved.
#[derive(Debug, Clone)]
pub struct ContractSettlement {
    pub contract: Contract,
    pub unlocked: Decimal,
    pub release_tx: Option<Transaction>,
}

/// Both legs of a peer transfer, committed together.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub debit: Transaction,
    pub credit: Transaction,
}

/// Outcome reported by the external payout rail for a pending withdrawal.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum WithdrawalOutcome {
    Settled,
    Failed { reason: String },
}

/// Gateway top-up settlement as seen by the store.
#[derive(Debug, Clone)]
pub enum TopupOutcome {
    Credited(Transaction),
    /// Replayed confirmation; the wallet was already credited once.
    AlreadyCompleted(Transaction),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxFilter {
    pub status: Option<TxStatus>,
    pub kind: Option<TxKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TxFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        self.status.map_or(true, |s| tx.status == s)
            && self.kind.map_or(true, |k| tx.kind == k)
            && self.from.map_or(true, |f| tx.created_at >= f)
            && self.to.map_or(true, |t| tx.created_at <= t)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Page {
    pub fn sanitized(self) -> Self {
        Self {
            limit: self.limit.clamp(1, 200),
            offset: self.offset.max(0),
        }
    }
}

/// Persistence boundary of the engine. Every method that moves money is one
/// atomic unit of work: the balance mutation, its ledger entry and any
/// contract write land together or not at all, and concurrent mutations of
/// the same wallet serialize inside the store.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // -- wallets --------------------------------------------------------

    async fn get_or_create_wallet(
        &self,
        user_id: Uuid,
        currency: &str,
    ) -> Result<Wallet, EngineError>;

    async fn wallet_for_user(&self, user_id: Uuid) -> Result<Option<Wallet>, EngineError>;

    /// Direct internal funding: credit plus a completed credit transaction.
    async fn deposit(
        &self,
        user_id: Uuid,
        currency: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction, EngineError>;

    // -- gateway top-ups ------------------------------------------------

    /// Records the pending credit carrying the gateway order id. No balance
    /// effect until the order is confirmed.
    async fn record_pending_topup(
        &self,
        user_id: Uuid,
        currency: &str,
        amount: Decimal,
        order_id: &str,
    ) -> Result<Transaction, EngineError>;

    /// Completes a verified top-up: transitions the pending transaction and
    /// credits the wallet in one unit. Replays against an already-completed
    /// order are a no-op.
    async fn confirm_topup(
        &self,
        user_id: Uuid,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<TopupOutcome, EngineError>;

    /// Marks a pending top-up failed after a rejected signature. The balance
    /// is never touched.
    async fn fail_topup(
        &self,
        user_id: Uuid,
        order_id: &str,
        reason: &str,
    ) -> Result<Transaction, EngineError>;

    // -- escrow ---------------------------------------------------------

    /// Locks employer funds into a new contract: debit of the total estimated
    /// cost, its ledger entry and the contract row in one unit. Fails with
    /// `InsufficientFunds` or `DuplicateContract` leaving no trace.
    async fn create_contract(
        &self,
        spec: NewContract,
    ) -> Result<(Contract, Transaction), EngineError>;

    async fn contract(&self, id: Uuid) -> Result<Contract, EngineError>;

    /// Closes an active contract, releasing `remaining_amount` back to the
    /// employer. `InvalidState` when the contract is already terminal.
    async fn settle_contract(
        &self,
        id: Uuid,
        closing: ContractClosing,
    ) -> Result<ContractSettlement, EngineError>;

    async fn contracts_for_user(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<Vec<Contract>, EngineError>;

    // -- peer transfers -------------------------------------------------

    async fn transfer(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        amount: Decimal,
        description: &str,
    ) -> Result<TransferReceipt, EngineError>;

    // -- withdrawals ----------------------------------------------------

    /// Reserves funds for an external withdrawal: deducts the balance now and
    /// records a pending withdrawal transaction.
    async fn reserve_withdrawal(
        &self,
        user_id: Uuid,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction, EngineError>;

    /// Settles a pending withdrawal from the external rail's callback. A
    /// failure credits the reserved amount back (compensating action).
    async fn settle_withdrawal(
        &self,
        transaction_id: Uuid,
        outcome: WithdrawalOutcome,
    ) -> Result<Transaction, EngineError>;

    // -- payouts --------------------------------------------------------

    async fn wallets_for_sweep(&self) -> Result<Vec<Wallet>, EngineError>;

    /// Zeroes one wallet into a completed withdrawal transaction. Returns
    /// `None` when the balance is no longer positive by sweep time.
    async fn sweep_wallet(&self, wallet_id: Uuid) -> Result<Option<Transaction>, EngineError>;

    // -- queries --------------------------------------------------------

    async fn find_by_gateway_order(
        &self,
        order_id: &str,
    ) -> Result<Option<Transaction>, EngineError>;

    async fn transactions_for_user(
        &self,
        user_id: Uuid,
        filter: &TxFilter,
        page: Page,
    ) -> Result<Vec<Transaction>, EngineError>;
}
