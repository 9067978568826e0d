use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::models::{Contract, ContractStatus, Transaction, TxKind, TxStatus, Wallet};
use super::store::{
    ContractClosing, ContractSettlement, LedgerStore, NewContract, Page, TopupOutcome,
    TransferReceipt, TxFilter, WithdrawalOutcome,
};
use crate::error::EngineError;

type PgTx<'a> = sqlx::Transaction<'a, sqlx::Postgres>;

/// Postgres-backed ledger store. Every money-moving method runs inside one
/// database transaction and takes `FOR UPDATE` locks on the wallet rows it
/// mutates, so racing mutations of the same wallet serialize and a failure
/// anywhere in the unit rolls the whole unit back.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn ensure_positive(amount: Decimal) -> Result<(), EngineError> {
    if amount <= Decimal::ZERO {
        return Err(EngineError::InvalidAmount);
    }
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn wallet_from_row(row: &PgRow) -> Result<Wallet, EngineError> {
    Ok(Wallet {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        balance: row.try_get("balance")?,
        currency: row.try_get("currency")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn tx_from_row(row: &PgRow) -> Result<Transaction, EngineError> {
    Ok(Transaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        wallet_id: row.try_get("wallet_id")?,
        kind: TxKind::parse(row.try_get::<String, _>("kind")?.as_str())?,
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        status: TxStatus::parse(row.try_get::<String, _>("status")?.as_str())?,
        description: row.try_get("description")?,
        order_id: row.try_get("order_id")?,
        payment_id: row.try_get("payment_id")?,
        signature: row.try_get("signature")?,
        job_id: row.try_get("job_id")?,
        application_id: row.try_get("application_id")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn contract_from_row(row: &PgRow) -> Result<Contract, EngineError> {
    Ok(Contract {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        employer_id: row.try_get("employer_id")?,
        employee_id: row.try_get("employee_id")?,
        application_id: row.try_get("application_id")?,
        hourly_rate: row.try_get("hourly_rate")?,
        hours_per_week: row.try_get("hours_per_week")?,
        duration_weeks: row.try_get::<i32, _>("duration_weeks")? as u32,
        weekly_payment: row.try_get("weekly_payment")?,
        total_estimated_cost: row.try_get("total_estimated_cost")?,
        locked_amount: row.try_get("locked_amount")?,
        paid_amount: row.try_get("paid_amount")?,
        remaining_amount: row.try_get("remaining_amount")?,
        status: ContractStatus::parse(row.try_get::<String, _>("status")?.as_str())?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        actual_end_date: row.try_get("actual_end_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn lock_wallet(tx: &mut PgTx<'_>, wallet_id: Uuid) -> Result<Wallet, EngineError> {
    let row = sqlx::query("SELECT * FROM wallets WHERE id = $1 FOR UPDATE")
        .bind(wallet_id)
        .fetch_optional(&mut **tx)
        .await?;
    row.as_ref()
        .map(wallet_from_row)
        .transpose()?
        .ok_or(EngineError::WalletNotFound)
}

async fn lock_wallet_for_user(
    tx: &mut PgTx<'_>,
    user_id: Uuid,
) -> Result<Option<Wallet>, EngineError> {
    let row = sqlx::query("SELECT * FROM wallets WHERE user_id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;
    row.as_ref().map(wallet_from_row).transpose()
}

/// Lazy wallet creation inside the unit of work; the returned wallet row is
/// locked. `ON CONFLICT DO NOTHING` absorbs the create/create race.
async fn get_or_create_locked(
    tx: &mut PgTx<'_>,
    user_id: Uuid,
    currency: &str,
) -> Result<Wallet, EngineError> {
    if let Some(wallet) = lock_wallet_for_user(tx, user_id).await? {
        return Ok(wallet);
    }
    let wallet = Wallet::new(user_id, currency);
    sqlx::query(
        "INSERT INTO wallets (id, user_id, balance, currency, is_active, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(wallet.id)
    .bind(wallet.user_id)
    .bind(wallet.balance)
    .bind(&wallet.currency)
    .bind(wallet.is_active)
    .bind(wallet.created_at)
    .bind(wallet.updated_at)
    .execute(&mut **tx)
    .await?;
    lock_wallet_for_user(tx, user_id)
        .await?
        .ok_or(EngineError::WalletNotFound)
}

async fn set_balance(
    tx: &mut PgTx<'_>,
    wallet_id: Uuid,
    balance: Decimal,
) -> Result<(), EngineError> {
    sqlx::query("UPDATE wallets SET balance = $1, updated_at = now() WHERE id = $2")
        .bind(balance)
        .bind(wallet_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn checked_debit(wallet: &Wallet, amount: Decimal) -> Result<Decimal, EngineError> {
    if wallet.balance < amount {
        return Err(EngineError::InsufficientFunds {
            required: amount,
            available: wallet.balance,
        });
    }
    Ok(wallet.balance - amount)
}

async fn insert_transaction(tx: &mut PgTx<'_>, t: &Transaction) -> Result<(), EngineError> {
    sqlx::query(
        "INSERT INTO transactions
           (id, user_id, wallet_id, kind, amount, currency, status, description,
            order_id, payment_id, signature, job_id, application_id, metadata,
            created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
    )
    .bind(t.id)
    .bind(t.user_id)
    .bind(t.wallet_id)
    .bind(t.kind.as_str())
    .bind(t.amount)
    .bind(&t.currency)
    .bind(t.status.as_str())
    .bind(&t.description)
    .bind(&t.order_id)
    .bind(&t.payment_id)
    .bind(&t.signature)
    .bind(t.job_id)
    .bind(t.application_id)
    .bind(&t.metadata)
    .bind(t.created_at)
    .bind(t.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn get_or_create_wallet(
        &self,
        user_id: Uuid,
        currency: &str,
    ) -> Result<Wallet, EngineError> {
        let mut tx = self.pool.begin().await?;
        let wallet = get_or_create_locked(&mut tx, user_id, currency).await?;
        tx.commit().await?;
        Ok(wallet)
    }

    async fn wallet_for_user(&self, user_id: Uuid) -> Result<Option<Wallet>, EngineError> {
        let row = sqlx::query("SELECT * FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(wallet_from_row).transpose()
    }

    async fn deposit(
        &self,
        user_id: Uuid,
        currency: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction, EngineError> {
        ensure_positive(amount)?;
        let mut tx = self.pool.begin().await?;
        let wallet = get_or_create_locked(&mut tx, user_id, currency).await?;
        set_balance(&mut tx, wallet.id, wallet.balance + amount).await?;
        let entry = Transaction::new(&wallet, TxKind::Credit, amount, TxStatus::Completed, description);
        insert_transaction(&mut tx, &entry).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn record_pending_topup(
        &self,
        user_id: Uuid,
        currency: &str,
        amount: Decimal,
        order_id: &str,
    ) -> Result<Transaction, EngineError> {
        ensure_positive(amount)?;
        let mut tx = self.pool.begin().await?;
        let wallet = get_or_create_locked(&mut tx, user_id, currency).await?;
        let entry = Transaction::new(
            &wallet,
            TxKind::Credit,
            amount,
            TxStatus::Pending,
            "wallet top-up via payment gateway",
        )
        .with_order(order_id);
        insert_transaction(&mut tx, &entry).await.map_err(|err| {
            if let EngineError::Storage(e) = &err {
                if is_unique_violation(e) {
                    return EngineError::invalid_state("gateway order already recorded");
                }
            }
            err
        })?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn confirm_topup(
        &self,
        user_id: Uuid,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<TopupOutcome, EngineError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "SELECT * FROM transactions WHERE order_id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let entry = row
            .as_ref()
            .map(tx_from_row)
            .transpose()?
            .ok_or(EngineError::TransactionNotFound)?;

        if entry.status == TxStatus::Completed {
            return Ok(TopupOutcome::AlreadyCompleted(entry));
        }
        if entry.status.is_terminal() {
            return Err(EngineError::invalid_state("top-up is no longer pending"));
        }

        sqlx::query(
            "UPDATE transactions
             SET status = $1, payment_id = $2, signature = $3, updated_at = now()
             WHERE id = $4",
        )
        .bind(TxStatus::Completed.as_str())
        .bind(payment_id)
        .bind(signature)
        .bind(entry.id)
        .execute(&mut *tx)
        .await?;

        let wallet = lock_wallet(&mut tx, entry.wallet_id).await?;
        set_balance(&mut tx, wallet.id, wallet.balance + entry.amount).await?;
        tx.commit().await?;

        let mut confirmed = entry;
        confirmed.status = TxStatus::Completed;
        confirmed.payment_id = Some(payment_id.to_string());
        confirmed.signature = Some(signature.to_string());
        Ok(TopupOutcome::Credited(confirmed))
    }

    async fn fail_topup(
        &self,
        user_id: Uuid,
        order_id: &str,
        reason: &str,
    ) -> Result<Transaction, EngineError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "SELECT * FROM transactions WHERE order_id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let mut entry = row
            .as_ref()
            .map(tx_from_row)
            .transpose()?
            .ok_or(EngineError::TransactionNotFound)?;
        if entry.status.is_terminal() {
            return Err(EngineError::invalid_state("top-up is no longer pending"));
        }

        entry.status = TxStatus::Failed;
        entry.metadata = json!({ "failure_reason": reason });
        sqlx::query(
            "UPDATE transactions SET status = $1, metadata = $2, updated_at = now() WHERE id = $3",
        )
        .bind(TxStatus::Failed.as_str())
        .bind(&entry.metadata)
        .bind(entry.id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn create_contract(
        &self,
        spec: NewContract,
    ) -> Result<(Contract, Transaction), EngineError> {
        ensure_positive(spec.total_estimated_cost)?;
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT 1 FROM contracts WHERE job_id = $1 AND employee_id = $2")
            .bind(spec.job_id)
            .bind(spec.employee_id)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(EngineError::DuplicateContract);
        }

        let wallet = get_or_create_locked(&mut tx, spec.employer_id, &spec.currency).await?;
        let new_balance = checked_debit(&wallet, spec.total_estimated_cost)?;
        set_balance(&mut tx, wallet.id, new_balance).await?;

        let entry = Transaction::new(
            &wallet,
            TxKind::Debit,
            spec.total_estimated_cost,
            TxStatus::Completed,
            format!("funds locked for job {}", spec.job_title),
        )
        .with_job(spec.job_id, spec.application_id);
        insert_transaction(&mut tx, &entry).await?;

        let contract = spec.into_contract();
        sqlx::query(
            "INSERT INTO contracts
               (id, job_id, employer_id, employee_id, application_id, hourly_rate,
                hours_per_week, duration_weeks, weekly_payment, total_estimated_cost,
                locked_amount, paid_amount, remaining_amount, status, start_date,
                end_date, actual_end_date, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                     $11, $12, $13, $14, $15, $16, $17, $18, $19)",
        )
        .bind(contract.id)
        .bind(contract.job_id)
        .bind(contract.employer_id)
        .bind(contract.employee_id)
        .bind(contract.application_id)
        .bind(contract.hourly_rate)
        .bind(contract.hours_per_week)
        .bind(contract.duration_weeks as i32)
        .bind(contract.weekly_payment)
        .bind(contract.total_estimated_cost)
        .bind(contract.locked_amount)
        .bind(contract.paid_amount)
        .bind(contract.remaining_amount)
        .bind(contract.status.as_str())
        .bind(contract.start_date)
        .bind(contract.end_date)
        .bind(contract.actual_end_date)
        .bind(contract.created_at)
        .bind(contract.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                EngineError::DuplicateContract
            } else {
                EngineError::Storage(err)
            }
        })?;

        tx.commit().await?;
        Ok((contract, entry))
    }

    async fn contract(&self, id: Uuid) -> Result<Contract, EngineError> {
        let row = sqlx::query("SELECT * FROM contracts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(contract_from_row)
            .transpose()?
            .ok_or(EngineError::ContractNotFound(id))
    }

    async fn settle_contract(
        &self,
        id: Uuid,
        closing: ContractClosing,
    ) -> Result<ContractSettlement, EngineError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT * FROM contracts WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let mut contract = row
            .as_ref()
            .map(contract_from_row)
            .transpose()?
            .ok_or(EngineError::ContractNotFound(id))?;
        if contract.status != ContractStatus::Active {
            return Err(EngineError::invalid_state(format!(
                "contract is already {}",
                contract.status.as_str()
            )));
        }

        let unlocked = contract.remaining_amount;
        let release_tx = if unlocked > Decimal::ZERO {
            let wallet = lock_wallet_for_user(&mut tx, contract.employer_id)
                .await?
                .ok_or(EngineError::WalletNotFound)?;
            set_balance(&mut tx, wallet.id, wallet.balance + unlocked).await?;
            let entry = Transaction::new(
                &wallet,
                TxKind::Credit,
                unlocked,
                TxStatus::Completed,
                "unlocked remaining contract funds",
            )
            .with_job(contract.job_id, contract.application_id);
            insert_transaction(&mut tx, &entry).await?;
            Some(entry)
        } else {
            None
        };

        contract.paid_amount += unlocked;
        contract.remaining_amount = Decimal::ZERO;
        contract.status = closing.final_status();
        contract.actual_end_date = Some(Utc::now());
        contract.updated_at = Utc::now();
        sqlx::query(
            "UPDATE contracts
             SET paid_amount = $1, remaining_amount = $2, status = $3,
                 actual_end_date = $4, updated_at = $5
             WHERE id = $6",
        )
        .bind(contract.paid_amount)
        .bind(contract.remaining_amount)
        .bind(contract.status.as_str())
        .bind(contract.actual_end_date)
        .bind(contract.updated_at)
        .bind(contract.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ContractSettlement {
            contract,
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
        let rows = sqlx::query(
            "SELECT * FROM contracts
             WHERE employer_id = $1 OR employee_id = $1
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(contract_from_row).collect()
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
        let mut tx = self.pool.begin().await?;

        // Read the sender's currency without a lock, then take both row locks
        // in canonical user-id order: opposing transfers acquire them in the
        // same order and cannot deadlock.
        let currency: String = sqlx::query("SELECT currency FROM wallets WHERE user_id = $1")
            .bind(sender_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(EngineError::WalletNotFound)?
            .try_get("currency")?;
        let (sender, recipient) = if sender_id < recipient_id {
            let sender = lock_wallet_for_user(&mut tx, sender_id)
                .await?
                .ok_or(EngineError::WalletNotFound)?;
            let recipient = get_or_create_locked(&mut tx, recipient_id, &currency).await?;
            (sender, recipient)
        } else {
            let recipient = get_or_create_locked(&mut tx, recipient_id, &currency).await?;
            let sender = lock_wallet_for_user(&mut tx, sender_id)
                .await?
                .ok_or(EngineError::WalletNotFound)?;
            (sender, recipient)
        };

        let new_sender_balance = checked_debit(&sender, amount)?;
        set_balance(&mut tx, sender.id, new_sender_balance).await?;
        set_balance(&mut tx, recipient.id, recipient.balance + amount).await?;

        let debit_tx =
            Transaction::new(&sender, TxKind::Debit, amount, TxStatus::Completed, description);
        let credit_tx = Transaction::new(
            &recipient,
            TxKind::Credit,
            amount,
            TxStatus::Completed,
            description,
        )
        .with_metadata(json!({ "counterpart": debit_tx.id, "sender": sender_id }));
        let debit_tx = debit_tx
            .with_metadata(json!({ "counterpart": credit_tx.id, "recipient": recipient_id }));
        insert_transaction(&mut tx, &debit_tx).await?;
        insert_transaction(&mut tx, &credit_tx).await?;

        tx.commit().await?;
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
        let mut tx = self.pool.begin().await?;
        let wallet = lock_wallet_for_user(&mut tx, user_id)
            .await?
            .ok_or(EngineError::WalletNotFound)?;
        let new_balance = checked_debit(&wallet, amount)?;
        set_balance(&mut tx, wallet.id, new_balance).await?;
        let entry =
            Transaction::new(&wallet, TxKind::Withdrawal, amount, TxStatus::Pending, description);
        insert_transaction(&mut tx, &entry).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn settle_withdrawal(
        &self,
        transaction_id: Uuid,
        outcome: WithdrawalOutcome,
    ) -> Result<Transaction, EngineError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT * FROM transactions WHERE id = $1 FOR UPDATE")
            .bind(transaction_id)
            .fetch_optional(&mut *tx)
            .await?;
        let mut entry = row
            .as_ref()
            .map(tx_from_row)
            .transpose()?
            .ok_or(EngineError::TransactionNotFound)?;
        if entry.kind != TxKind::Withdrawal || entry.status.is_terminal() {
            return Err(EngineError::invalid_state(
                "transaction is not a pending withdrawal",
            ));
        }

        match &outcome {
            WithdrawalOutcome::Settled => {
                entry.status = TxStatus::Completed;
            }
            WithdrawalOutcome::Failed { reason } => {
                entry.status = TxStatus::Failed;
                entry.metadata = json!({ "failure_reason": reason });
                let wallet = lock_wallet(&mut tx, entry.wallet_id).await?;
                set_balance(&mut tx, wallet.id, wallet.balance + entry.amount).await?;
            }
        }
        entry.updated_at = Utc::now();
        sqlx::query(
            "UPDATE transactions SET status = $1, metadata = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(entry.status.as_str())
        .bind(&entry.metadata)
        .bind(entry.updated_at)
        .bind(entry.id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn wallets_for_sweep(&self) -> Result<Vec<Wallet>, EngineError> {
        let rows = sqlx::query("SELECT * FROM wallets WHERE is_active AND balance > 0")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(wallet_from_row).collect()
    }

    async fn sweep_wallet(&self, wallet_id: Uuid) -> Result<Option<Transaction>, EngineError> {
        let mut tx = self.pool.begin().await?;
        let wallet = lock_wallet(&mut tx, wallet_id).await?;
        if !wallet.is_active || wallet.balance <= Decimal::ZERO {
            return Ok(None);
        }
        let entry = Transaction::new(
            &wallet,
            TxKind::Withdrawal,
            wallet.balance,
            TxStatus::Completed,
            "weekly payout sweep",
        );
        insert_transaction(&mut tx, &entry).await?;
        set_balance(&mut tx, wallet.id, Decimal::ZERO).await?;
        tx.commit().await?;
        Ok(Some(entry))
    }

    async fn find_by_gateway_order(
        &self,
        order_id: &str,
    ) -> Result<Option<Transaction>, EngineError> {
        let row = sqlx::query("SELECT * FROM transactions WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(tx_from_row).transpose()
    }

    async fn transactions_for_user(
        &self,
        user_id: Uuid,
        filter: &TxFilter,
        page: Page,
    ) -> Result<Vec<Transaction>, EngineError> {
        let page = page.sanitized();
        let mut query_builder =
            sqlx::QueryBuilder::new("SELECT * FROM transactions WHERE user_id = ");
        query_builder.push_bind(user_id);
        if let Some(status) = filter.status {
            query_builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(kind) = filter.kind {
            query_builder.push(" AND kind = ").push_bind(kind.as_str());
        }
        if let Some(from) = filter.from {
            query_builder.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            query_builder.push(" AND created_at <= ").push_bind(to);
        }
        query_builder
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let rows = query_builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(tx_from_row).collect()
    }
}
