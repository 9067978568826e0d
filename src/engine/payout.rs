use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use super::notify::{NotificationKind, Notifier};
use crate::db::store::LedgerStore;
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PayoutReport {
    pub processed: u32,
    pub skipped: u32,
}

/// The periodic sweep zeroing every positive active wallet into a withdrawal
/// transaction. One instance per process, invoked by an external cron
/// trigger; there is no hidden global scheduler.
pub struct PayoutService {
    store: Arc<dyn LedgerStore>,
    notifier: Arc<dyn Notifier>,
}

impl PayoutService {
    pub fn new(store: Arc<dyn LedgerStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Sweeps wallets sequentially. Each wallet is its own atomic unit; one
    /// wallet's failure is logged and skipped, the sweep continues, and the
    /// report counts only wallets actually zeroed.
    pub async fn process_weekly_payouts(&self) -> Result<PayoutReport, EngineError> {
        let wallets = self.store.wallets_for_sweep().await?;
        let mut report = PayoutReport::default();

        for wallet in wallets {
            match self.store.sweep_wallet(wallet.id).await {
                Ok(Some(tx)) => {
                    report.processed += 1;
                    self.notifier.notify(
                        wallet.user_id,
                        NotificationKind::PayoutProcessed,
                        json!({ "amount": tx.amount, "transaction_id": tx.id }),
                    );
                }
                // Drained between enumeration and sweep; nothing to pay out.
                Ok(None) => report.skipped += 1,
                Err(err) => {
                    report.skipped += 1;
                    tracing::error!("payout sweep failed for wallet {}: {err}", wallet.id);
                }
            }
        }

        tracing::info!(
            processed = report.processed,
            skipped = report.skipped,
            "weekly payout sweep finished"
        );
        Ok(report)
    }
}
