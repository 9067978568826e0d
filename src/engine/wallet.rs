use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use super::gateway::PaymentGateway;
use super::notify::{NotificationKind, Notifier};
use crate::db::models::{Transaction, Wallet};
use crate::db::store::{
    LedgerStore, Page, TopupOutcome, TransferReceipt, TxFilter, WithdrawalOutcome,
};
use crate::error::EngineError;

/// Gateway top-up bounds in currency minor units.
#[derive(Debug, Clone, Copy)]
pub struct TopupLimits {
    pub min: Decimal,
    pub max: Decimal,
}

impl Default for TopupLimits {
    fn default() -> Self {
        Self {
            min: Decimal::from(100),
            max: Decimal::from(100_000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopupOrder {
    pub order_id: String,
    pub transaction: Transaction,
}

/// Wallet-facing operations: funding, peer transfer, withdrawal. All balance
/// effects happen inside the store's atomic units; this service owns the
/// validation and the gateway/notification choreography around them.
pub struct WalletService {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    limits: TopupLimits,
    currency: String,
}

impl WalletService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        limits: TopupLimits,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            limits,
            currency: currency.into(),
        }
    }

    pub async fn wallet(&self, user_id: Uuid) -> Result<Wallet, EngineError> {
        self.store.get_or_create_wallet(user_id, &self.currency).await
    }

    /// Direct internal funding, no gateway involved.
    pub async fn deposit(&self, user_id: Uuid, amount: Decimal) -> Result<Transaction, EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount);
        }
        self.store
            .deposit(user_id, &self.currency, amount, "direct wallet deposit")
            .await
    }

    /// Opens a gateway order and records the pending credit carrying it.
    pub async fn begin_topup(&self, user_id: Uuid, amount: Decimal) -> Result<TopupOrder, EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount);
        }
        if amount < self.limits.min || amount > self.limits.max {
            return Err(EngineError::AmountOutOfBounds {
                min: self.limits.min,
                max: self.limits.max,
            });
        }
        let order_id = self
            .gateway
            .create_order(amount, &self.currency, &json!({ "user_id": user_id }))
            .await?;
        let transaction = self
            .store
            .record_pending_topup(user_id, &self.currency, amount, &order_id)
            .await?;
        Ok(TopupOrder {
            order_id,
            transaction,
        })
    }

    /// Settles a gateway confirmation. Idempotent under at-least-once
    /// delivery: a replay against an already-completed order returns the
    /// original transaction without touching the balance.
    pub async fn confirm_topup(
        &self,
        user_id: Uuid,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<Transaction, EngineError> {
        // Scope the order to the requesting user before anything else.
        let pending = self
            .store
            .find_by_gateway_order(order_id)
            .await?
            .filter(|tx| tx.user_id == user_id)
            .ok_or(EngineError::TransactionNotFound)?;

        if !self.gateway.verify_signature(order_id, payment_id, signature) {
            // Mark the pending credit failed; if it is already terminal there
            // is nothing to transition and the mismatch alone comes back.
            if let Err(err) = self
                .store
                .fail_topup(user_id, order_id, "signature verification failed")
                .await
            {
                tracing::warn!("could not fail top-up {}: {err}", pending.id);
            }
            return Err(EngineError::SignatureMismatch);
        }

        match self
            .store
            .confirm_topup(user_id, order_id, payment_id, signature)
            .await?
        {
            TopupOutcome::Credited(tx) => {
                tracing::info!(user = %user_id, amount = %tx.amount, "top-up credited");
                Ok(tx)
            }
            TopupOutcome::AlreadyCompleted(tx) => {
                tracing::info!(user = %user_id, order_id, "replayed top-up confirmation ignored");
                Ok(tx)
            }
        }
    }

    pub async fn transfer(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<TransferReceipt, EngineError> {
        let description = description.unwrap_or_else(|| "peer transfer".to_string());
        let receipt = self
            .store
            .transfer(sender_id, recipient_id, amount, &description)
            .await?;
        self.notifier.notify(
            recipient_id,
            NotificationKind::TransferReceived,
            json!({ "from": sender_id, "amount": amount, "transaction_id": receipt.credit.id }),
        );
        Ok(receipt)
    }

    /// Reserves funds and hands off to the external payout rail; the rail's
    /// callback settles via [`confirm_withdrawal`](Self::confirm_withdrawal).
    pub async fn request_withdrawal(
        &self,
        user_id: Uuid,
        amount: Decimal,
    ) -> Result<Transaction, EngineError> {
        self.store
            .reserve_withdrawal(user_id, amount, "withdrawal to bank account")
            .await
    }

    pub async fn confirm_withdrawal(
        &self,
        transaction_id: Uuid,
        outcome: WithdrawalOutcome,
    ) -> Result<Transaction, EngineError> {
        let settled = self.store.settle_withdrawal(transaction_id, outcome).await?;
        tracing::info!(
            transaction = %settled.id,
            status = settled.status.as_str(),
            "withdrawal settled by payout rail"
        );
        Ok(settled)
    }

    pub async fn transactions(
        &self,
        user_id: Uuid,
        filter: &TxFilter,
        page: Page,
    ) -> Result<Vec<Transaction>, EngineError> {
        self.store.transactions_for_user(user_id, filter, page).await
    }
}
