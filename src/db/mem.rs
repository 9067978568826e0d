use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::models::{Contract, ContractStatus, Transaction, TxKind, TxStatus, Wallet};
use super::store::{
    ContractClosing, ContractSettlement, LedgerStore, NewContract, Page, TopupOutcome,
    TransferReceipt, TxFilter, WithdrawalOutcome,
};
use crate::error::EngineError;

#[derive(Debug, Clone, Default)]
struct State {
    wallets: HashMap<Uuid, Wallet>,
    user_wallets: HashMap<Uuid, Uuid>,
    transactions: Vec<Transaction>,
    contracts: HashMap<Uuid, Contract>,
    contract_pairs: HashSet<(Uuid, Uuid)>,
}

/// In-process ledger store. The whole state sits behind one mutex, so each
/// trait method is a single critical section; multi-write operations mutate a
/// cloned draft and commit it with one assignment, which makes partial
/// application impossible even on an error path.
///
/// Used by the test suite and as the reference model for the Postgres store's
/// transactional semantics.
pub struct MemStore {
    state: Mutex<State>,
    fail_contract_write: AtomicBool,
    fail_sweep_for: std::sync::Mutex<HashSet<Uuid>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            fail_contract_write: AtomicBool::new(false),
            fail_sweep_for: std::sync::Mutex::new(HashSet::new()),
        }
    }

    /// Storage-fault hook: the next contract write errors after the funds
    /// debit has been applied to the draft, exercising rollback.
    pub fn fail_next_contract_write(&self) {
        self.fail_contract_write.store(true, Ordering::SeqCst);
    }

    /// Storage-fault hook: sweeping the given wallet errors.
    pub fn fail_sweep_of(&self, wallet_id: Uuid) {
        self.fail_sweep_for
            .lock()
            .expect("fault set poisoned")
            .insert(wallet_id);
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_positive(amount: Decimal) -> Result<(), EngineError> {
    if amount <= Decimal::ZERO {
        return Err(EngineError::InvalidAmount);
    }
    Ok(())
}

fn credit(wallet: &mut Wallet, amount: Decimal) {
    wallet.balance += amount;
    wallet.updated_at = Utc::now();
}

fn debit(wallet: &mut Wallet, amount: Decimal) -> Result<(), EngineError> {
    if wallet.balance < amount {
        return Err(EngineError::InsufficientFunds {
            required: amount,
            available: wallet.balance,
        });
    }
    wallet.balance -= amount;
    wallet.updated_at = Utc::now();
    Ok(())
}

impl State {
    fn get_or_create_wallet(&mut self, user_id: Uuid, currency: &str) -> Uuid {
        if let Some(id) = self.user_wallets.get(&user_id) {
            return *id;
        }
        let wallet = Wallet::new(user_id, currency);
        let id = wallet.id;
        self.user_wallets.insert(user_id, id);
        self.wallets.insert(id, wallet);
        id
    }

    fn wallet_mut(&mut self, id: Uuid) -> Result<&mut Wallet, EngineError> {
        self.wallets.get_mut(&id).ok_or(EngineError::WalletNotFound)
    }

    fn user_wallet_mut(&mut self, user_id: Uuid) -> Result<&mut Wallet, EngineError> {
        let id = *self
            .user_wallets
            .get(&user_id)
            .ok_or(EngineError::WalletNotFound)?;
        self.wallet_mut(id)
    }

    fn tx_by_order_mut(
        &mut self,
        user_id: Uuid,
        order_id: &str,
    ) -> Result<&mut Transaction, EngineError> {
        self.transactions
            .iter_mut()
            .find(|t| t.order_id.as_deref() == Some(order_id) && t.user_id == user_id)
            .ok_or(EngineError::TransactionNotFound)
    }
}

#[async_trait]
impl LedgerStore for MemStore {
    async fn get_or_create_wallet(
        &self,
        user_id: Uuid,
        currency: &str,
    ) -> Result<Wallet, EngineError> {
        let mut state = self.state.lock().await;
        let id = state.get_or_create_wallet(user_id, currency);
        Ok(state.wallets[&id].clone())
    }

    async fn wallet_for_user(&self, user_id: Uuid) -> Result<Option<Wallet>, EngineError> {
        let state = self.state.lock().await;
        Ok(state
            .user_wallets
            .get(&user_id)
            .and_then(|id| state.wallets.get(id))
            .cloned())
    }

    async fn deposit(
        &self,
        user_id: Uuid,
        currency: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction, EngineError> {
        ensure_positive(amount)?;
        let mut state = self.state.lock().await;
        let mut draft = state.clone();

        let id = draft.get_or_create_wallet(user_id, currency);
        let wallet = draft.wallet_mut(id)?;
        credit(wallet, amount);
        let tx = Transaction::new(wallet, TxKind::Credit, amount, TxStatus::Completed, description);
        draft.transactions.push(tx.clone());

        *state = draft;
        Ok(tx)
    }

    async fn record_pending_topup(
        &self,
        user_id: Uuid,
        currency: &str,
        amount: Decimal,
        order_id: &str,
    ) -> Result<Transaction, EngineError> {
        ensure_positive(amount)?;
        let mut state = self.state.lock().await;
        if state
            .transactions
            .iter()
            .any(|t| t.order_id.as_deref() == Some(order_id))
        {
            return Err(EngineError::invalid_state("gateway order already recorded"));
        }
        let id = state.get_or_create_wallet(user_id, currency);
        let wallet = &state.wallets[&id];
        let tx = Transaction::new(
            wallet,
            TxKind::Credit,
            amount,
            TxStatus::Pending,
            "wallet top-up via payment gateway",
        )
        .with_order(order_id);
        state.transactions.push(tx.clone());
        Ok(tx)
    }

    async fn confirm_topup(
        &self,
        user_id: Uuid,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<TopupOutcome, EngineError> {
        let mut state = self.state.lock().await;
        let mut draft = state.clone();

        let tx = draft.tx_by_order_mut(user_id, order_id)?;
        if tx.status == TxStatus::Completed {
            return Ok(TopupOutcome::AlreadyCompleted(tx.clone()));
        }
        if tx.status.is_terminal() {
            return Err(EngineError::invalid_state("top-up is no longer pending"));
        }
        tx.status = TxStatus::Completed;
        tx.payment_id = Some(payment_id.to_string());
        tx.signature = Some(signature.to_string());
        tx.updated_at = Utc::now();
        let (wallet_id, amount, confirmed) = (tx.wallet_id, tx.amount, tx.clone());
        credit(draft.wallet_mut(wallet_id)?, amount);

        *state = draft;
        Ok(TopupOutcome::Credited(confirmed))
    }

    async fn fail_topup(
        &self,
        user_id: Uuid,
        order_id: &str,
        reason: &str,
    ) -> Result<Transaction, EngineError> {
        let mut state = self.state.lock().await;
        let tx = state.tx_by_order_mut(user_id, order_id)?;
        if tx.status.is_terminal() {
            return Err(EngineError::invalid_state("top-up is no longer pending"));
        }
        tx.status = TxStatus::Failed;
        tx.metadata = json!({ "failure_reason": reason });
        tx.updated_at = Utc::now();
        Ok(tx.clone())
    }

    async fn create_contract(
        &self,
        spec: NewContract,
    ) -> Result<(Contract, Transaction), EngineError> {
        let mut state = self.state.lock().await;
        let mut draft = state.clone();

        let pair = (spec.job_id, spec.employee_id);
        if draft.contract_pairs.contains(&pair) {
            return Err(EngineError::DuplicateContract);
        }

        let wallet_id = draft.get_or_create_wallet(spec.employer_id, &spec.currency);
        let total = spec.total_estimated_cost;
        ensure_positive(total)?;
        debit(draft.wallet_mut(wallet_id)?, total)?;

        let description = format!("funds locked for job {}", spec.job_title);
        let tx = Transaction::new(
            &draft.wallets[&wallet_id],
            TxKind::Debit,
            total,
            TxStatus::Completed,
            description,
        )
        .with_job(spec.job_id, spec.application_id);
        draft.transactions.push(tx.clone());

        if self.fail_contract_write.swap(false, Ordering::SeqCst) {
            // Draft is dropped: the debit and its ledger entry never land.
            return Err(EngineError::Internal("injected contract write failure".into()));
        }

        let contract = spec.into_contract();
        draft.contract_pairs.insert(pair);
        draft.contracts.insert(contract.id, contract.clone());

        *state = draft;
        Ok((contract, tx))
    }

    async fn contract(&self, id: Uuid) -> Result<Contract, EngineError> {
        let state = self.state.lock().await;
        state
            .contracts
            .get(&id)
            .cloned()
            .ok_or(EngineError::ContractNotFound(id))
    }

    async fn settle_contract(
        &self,
        id: Uuid,
        closing: ContractClosing,
    ) -> Result<ContractSettlement, EngineError> {
        let mut state = self.state.lock().await;
        let mut draft = state.clone();

        let contract = draft
            .contracts
            .get_mut(&id)
            .ok_or(EngineError::ContractNotFound(id))?;
        if contract.status != ContractStatus::Active {
            return Err(EngineError::invalid_state(format!(
                "contract is already {}",
                contract.status.as_str()
            )));
        }

        let unlocked = contract.remaining_amount;
        contract.paid_amount += unlocked;
        contract.remaining_amount = Decimal::ZERO;
        contract.status = closing.final_status();
        contract.actual_end_date = Some(Utc::now());
        contract.updated_at = Utc::now();
        let (employer_id, job_id, application_id, settled) = (
            contract.employer_id,
            contract.job_id,
            contract.application_id,
            contract.clone(),
        );

        let release_tx = if unlocked > Decimal::ZERO {
            let wallet = draft.user_wallet_mut(employer_id)?;
            credit(wallet, unlocked);
            let tx = Transaction::new(
                wallet,
                TxKind::Credit,
                unlocked,
                TxStatus::Completed,
                "unlocked remaining contract funds",
            )
            .with_job(job_id, application_id);
            draft.transactions.push(tx.clone());
            Some(tx)
        } else {
            None
        };

        *state = draft;
        Ok(ContractSettlement {
            contract: settled,
            unlocked,
            release_tx,
        })
    }

    async fn contracts_for_user(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<Vec<Contract>, EngineError> {
        let page = page.sanitized();
        let state = self.state.lock().await;
        let mut all: Vec<Contract> = state
            .contracts
            .values()
            .filter(|c| c.involves(user_id))
            .cloned()
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn transfer(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        amount: Decimal,
        description: &str,
    ) -> Result<TransferReceipt, EngineError> {
        ensure_positive(amount)?;
        if sender_id == recipient_id {
            return Err(EngineError::invalid_state("cannot transfer to yourself"));
        }
        let mut state = self.state.lock().await;
        let mut draft = state.clone();

        let sender_wallet_id = *draft
            .user_wallets
            .get(&sender_id)
            .ok_or(EngineError::WalletNotFound)?;
        let currency = draft.wallets[&sender_wallet_id].currency.clone();
        let recipient_wallet_id = draft.get_or_create_wallet(recipient_id, &currency);

        debit(draft.wallet_mut(sender_wallet_id)?, amount)?;
        credit(draft.wallet_mut(recipient_wallet_id)?, amount);

        let debit_tx = Transaction::new(
            &draft.wallets[&sender_wallet_id],
            TxKind::Debit,
            amount,
            TxStatus::Completed,
            description,
        );
        let credit_tx = Transaction::new(
            &draft.wallets[&recipient_wallet_id],
            TxKind::Credit,
            amount,
            TxStatus::Completed,
            description,
        )
        .with_metadata(json!({ "counterpart": debit_tx.id, "sender": sender_id }));
        let debit_tx = debit_tx
            .with_metadata(json!({ "counterpart": credit_tx.id, "recipient": recipient_id }));
        draft.transactions.push(debit_tx.clone());
        draft.transactions.push(credit_tx.clone());

        *state = draft;
        Ok(TransferReceipt {
            debit: debit_tx,
            credit: credit_tx,
        })
    }

    async fn reserve_withdrawal(
        &self,
        user_id: Uuid,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction, EngineError> {
        ensure_positive(amount)?;
        let mut state = self.state.lock().await;
        let mut draft = state.clone();

        let wallet = draft.user_wallet_mut(user_id)?;
        debit(wallet, amount)?;
        let tx = Transaction::new(wallet, TxKind::Withdrawal, amount, TxStatus::Pending, description);
        draft.transactions.push(tx.clone());

        *state = draft;
        Ok(tx)
    }

    async fn settle_withdrawal(
        &self,
        transaction_id: Uuid,
        outcome: WithdrawalOutcome,
    ) -> Result<Transaction, EngineError> {
        let mut state = self.state.lock().await;
        let mut draft = state.clone();

        let tx = draft
            .transactions
            .iter_mut()
            .find(|t| t.id == transaction_id)
            .ok_or(EngineError::TransactionNotFound)?;
        if tx.kind != TxKind::Withdrawal || tx.status.is_terminal() {
            return Err(EngineError::invalid_state(
                "transaction is not a pending withdrawal",
            ));
        }

        let (wallet_id, amount) = (tx.wallet_id, tx.amount);
        let settled = match outcome {
            WithdrawalOutcome::Settled => {
                tx.status = TxStatus::Completed;
                tx.updated_at = Utc::now();
                tx.clone()
            }
            WithdrawalOutcome::Failed { reason } => {
                tx.status = TxStatus::Failed;
                tx.metadata = json!({ "failure_reason": reason });
                tx.updated_at = Utc::now();
                let out = tx.clone();
                // Compensating action: the reservation comes back.
                credit(draft.wallet_mut(wallet_id)?, amount);
                out
            }
        };

        *state = draft;
        Ok(settled)
    }

    async fn wallets_for_sweep(&self) -> Result<Vec<Wallet>, EngineError> {
        let state = self.state.lock().await;
        Ok(state
            .wallets
            .values()
            .filter(|w| w.is_active && w.balance > Decimal::ZERO)
            .cloned()
            .collect())
    }

    async fn sweep_wallet(&self, wallet_id: Uuid) -> Result<Option<Transaction>, EngineError> {
        if self
            .fail_sweep_for
            .lock()
            .expect("fault set poisoned")
            .remove(&wallet_id)
        {
            return Err(EngineError::Internal("injected sweep failure".into()));
        }

        let mut state = self.state.lock().await;
        let mut draft = state.clone();

        let wallet = draft.wallet_mut(wallet_id)?;
        if !wallet.is_active || wallet.balance <= Decimal::ZERO {
            return Ok(None);
        }
        let amount = wallet.balance;
        wallet.balance = Decimal::ZERO;
        wallet.updated_at = Utc::now();
        let tx = Transaction::new(
            wallet,
            TxKind::Withdrawal,
            amount,
            TxStatus::Completed,
            "weekly payout sweep",
        );
        draft.transactions.push(tx.clone());

        *state = draft;
        Ok(Some(tx))
    }

    async fn find_by_gateway_order(
        &self,
        order_id: &str,
    ) -> Result<Option<Transaction>, EngineError> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .find(|t| t.order_id.as_deref() == Some(order_id))
            .cloned())
    }

    async fn transactions_for_user(
        &self,
        user_id: Uuid,
        filter: &TxFilter,
        page: Page,
    ) -> Result<Vec<Transaction>, EngineError> {
        let page = page.sanitized();
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id && filter.matches(t))
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }
}
