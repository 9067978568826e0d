use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Credit,
    Debit,
    Refund,
    Withdrawal,
    Payment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TxStatus {
    /// Terminal ledger entries are append-only history and never mutated.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Active,
    Completed,
    Terminated,
}

macro_rules! text_repr {
    ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub fn parse(s: &str) -> Result<Self, EngineError> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(EngineError::Internal(format!(
                        "unknown {} value: {other}", stringify!($ty)
                    ))),
                }
            }
        }
    };
}

text_repr!(TxKind {
    Credit => "credit",
    Debit => "debit",
    Refund => "refund",
    Withdrawal => "withdrawal",
    Payment => "payment",
});

text_repr!(TxStatus {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

text_repr!(ContractStatus {
    Active => "active",
    Completed => "completed",
    Terminated => "terminated",
});

/// One balance record per user. Lazily created on first access, deactivated
/// rather than deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: Decimal,
    pub currency: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(user_id: Uuid, currency: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            balance: Decimal::ZERO,
            currency: currency.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Immutable ledger entry for a single money movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet_id: Uuid,
    pub kind: TxKind,
    pub amount: Decimal,
    pub currency: String,
    pub status: TxStatus,
    pub description: String,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub signature: Option<String>,
    pub job_id: Option<Uuid>,
    pub application_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        wallet: &Wallet,
        kind: TxKind,
        amount: Decimal,
        status: TxStatus,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: wallet.user_id,
            wallet_id: wallet.id,
            kind,
            amount,
            currency: wallet.currency.clone(),
            status,
            description: description.into(),
            order_id: None,
            payment_id: None,
            signature: None,
            job_id: None,
            application_id: None,
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_job(mut self, job_id: Uuid, application_id: Uuid) -> Self {
        self.job_id = Some(job_id);
        self.application_id = Some(application_id);
        self
    }

    pub fn with_order(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Escrow agreement locking employer funds for one (job, employee) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    pub job_id: Uuid,
    pub employer_id: Uuid,
    pub employee_id: Uuid,
    pub application_id: Uuid,
    pub hourly_rate: Decimal,
    pub hours_per_week: Decimal,
    pub duration_weeks: u32,
    pub weekly_payment: Decimal,
    pub total_estimated_cost: Decimal,
    pub locked_amount: Decimal,
    pub paid_amount: Decimal,
    pub remaining_amount: Decimal,
    pub status: ContractStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub actual_end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contract {
    /// Whether `user_id` is one of the two parties to this contract.
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.employer_id == user_id || self.employee_id == user_id
    }
}

/// Account record backing the auth surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_round_trips() {
        for status in [
            TxStatus::Pending,
            TxStatus::Completed,
            TxStatus::Failed,
            TxStatus::Cancelled,
        ] {
            assert_eq!(TxStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(TxStatus::parse("settled").is_err());
    }

    #[test]
    fn pending_is_the_only_mutable_status() {
        assert!(!TxStatus::Pending.is_terminal());
        assert!(TxStatus::Completed.is_terminal());
        assert!(TxStatus::Failed.is_terminal());
        assert!(TxStatus::Cancelled.is_terminal());
    }
}
