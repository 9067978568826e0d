use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use super::board::{ExperienceEntry, JobBoard};
use super::notify::{NotificationKind, Notifier};
use super::terms::ContractTerms;
use crate::db::models::{Contract, Transaction};
use crate::db::store::{ContractClosing, ContractSettlement, LedgerStore, NewContract, Page};
use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct ContractCreated {
    pub contract: Contract,
    pub lock_tx: Transaction,
}

/// Owns the contract lifecycle: locking employer funds on creation, releasing
/// the remainder exactly once on completion or termination. The money moves
/// inside one store unit; job-board flips and notifications happen after the
/// unit commits and are log-only on failure.
pub struct EscrowService {
    store: Arc<dyn LedgerStore>,
    board: Arc<dyn JobBoard>,
    notifier: Arc<dyn Notifier>,
    currency: String,
}

impl EscrowService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        board: Arc<dyn JobBoard>,
        notifier: Arc<dyn Notifier>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            store,
            board,
            notifier,
            currency: currency.into(),
        }
    }

    pub async fn create_from_application(
        &self,
        application_id: Uuid,
        employer_id: Uuid,
    ) -> Result<ContractCreated, EngineError> {
        let app = self.board.application(application_id).await?;
        if app.employer_id != employer_id {
            return Err(EngineError::Unauthorized);
        }

        let terms = ContractTerms::compute(app.hourly_rate, &app.hours_per_week, &app.duration)?;
        let start_date = Utc::now();
        let spec = NewContract {
            job_id: app.job_id,
            employer_id,
            employee_id: app.employee_id,
            application_id,
            job_title: app.job_title.clone(),
            currency: self.currency.clone(),
            hourly_rate: app.hourly_rate,
            hours_per_week: terms.hours_per_week,
            duration_weeks: terms.duration_weeks,
            weekly_payment: terms.weekly_payment,
            total_estimated_cost: terms.total_estimated_cost,
            start_date,
            end_date: Some(start_date + Duration::weeks(terms.duration_weeks as i64)),
        };

        let (contract, lock_tx) = self.store.create_contract(spec).await?;
        tracing::info!(
            contract = %contract.id,
            employer = %employer_id,
            locked = %contract.locked_amount,
            "contract funded"
        );

        // Funds are committed; everything below is collaborator bookkeeping
        // and must not undo the financial operation.
        if let Err(err) = self.board.mark_application_accepted(application_id).await {
            tracing::warn!("could not mark application {application_id} accepted: {err}");
        }
        if let Err(err) = self.board.close_job(app.job_id).await {
            tracing::warn!("could not close job {}: {err}", app.job_id);
        }
        let entry = ExperienceEntry {
            job_id: app.job_id,
            title: app.job_title.clone(),
            employer_id,
            from: start_date,
            to: None,
            current: true,
        };
        if let Err(err) = self.board.add_work_experience(app.employee_id, entry).await {
            tracing::warn!("could not add experience for {}: {err}", app.employee_id);
        }
        self.notifier.notify(
            app.employee_id,
            NotificationKind::ContractFunded,
            json!({
                "contract_id": contract.id,
                "job_title": app.job_title,
                "weekly_payment": contract.weekly_payment,
            }),
        );

        Ok(ContractCreated { contract, lock_tx })
    }

    /// Normal end of a contract; only the employer may call it.
    pub async fn complete(
        &self,
        contract_id: Uuid,
        caller_id: Uuid,
    ) -> Result<ContractSettlement, EngineError> {
        let contract = self.store.contract(contract_id).await?;
        if contract.employer_id != caller_id {
            return Err(EngineError::Unauthorized);
        }
        self.settle(contract_id, ContractClosing::Complete).await
    }

    /// Early end; either party may terminate.
    pub async fn terminate(
        &self,
        contract_id: Uuid,
        caller_id: Uuid,
    ) -> Result<ContractSettlement, EngineError> {
        let contract = self.store.contract(contract_id).await?;
        if !contract.involves(caller_id) {
            return Err(EngineError::Unauthorized);
        }
        self.settle(contract_id, ContractClosing::Terminate).await
    }

    async fn settle(
        &self,
        contract_id: Uuid,
        closing: ContractClosing,
    ) -> Result<ContractSettlement, EngineError> {
        let settlement = self.store.settle_contract(contract_id, closing).await?;
        let contract = &settlement.contract;
        tracing::info!(
            contract = %contract.id,
            status = contract.status.as_str(),
            unlocked = %settlement.unlocked,
            "contract settled"
        );

        if let Err(err) = self
            .board
            .close_current_experience(contract.employee_id, contract.job_id)
            .await
        {
            tracing::warn!("could not close experience for {}: {err}", contract.employee_id);
        }
        let kind = match closing {
            ContractClosing::Complete => NotificationKind::ContractCompleted,
            ContractClosing::Terminate => NotificationKind::ContractTerminated,
        };
        self.notifier.notify(
            contract.employee_id,
            kind,
            json!({ "contract_id": contract.id }),
        );

        Ok(settlement)
    }

    /// Read path; only a party to the contract may see it.
    pub async fn contract_for(
        &self,
        contract_id: Uuid,
        caller_id: Uuid,
    ) -> Result<Contract, EngineError> {
        let contract = self.store.contract(contract_id).await?;
        if !contract.involves(caller_id) {
            return Err(EngineError::Unauthorized);
        }
        Ok(contract)
    }

    pub async fn contracts_of(
        &self,
        caller_id: Uuid,
        page: Page,
    ) -> Result<Vec<Contract>, EngineError> {
        self.store.contracts_for_user(caller_id, page).await
    }
}
