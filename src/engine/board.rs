use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::EngineError;

/// What the engine reads off an accepted job application: identities plus the
/// price terms, with hours and duration as the free text the job was posted
/// with.
#[derive(Debug, Clone)]
pub struct ApplicationTerms {
    pub application_id: Uuid,
    pub job_id: Uuid,
    pub job_title: String,
    pub employer_id: Uuid,
    pub employee_id: Uuid,
    pub hourly_rate: Decimal,
    pub hours_per_week: String,
    pub duration: String,
}

#[derive(Debug, Clone)]
pub struct ExperienceEntry {
    pub job_id: Uuid,
    pub title: String,
    pub employer_id: Uuid,
    pub from: DateTime<Utc>,
    pub to: Option<DateTime<Utc>>,
    pub current: bool,
}

/// The job/application subsystem as seen from the engine. Everything behind
/// this trait is ordinary CRUD owned elsewhere; the engine only consumes
/// identities and price terms and pushes back the status flips an escrow
/// contract implies.
#[async_trait]
pub trait JobBoard: Send + Sync {
    async fn application(&self, id: Uuid) -> Result<ApplicationTerms, EngineError>;

    async fn mark_application_accepted(&self, id: Uuid) -> Result<(), EngineError>;

    async fn close_job(&self, job_id: Uuid) -> Result<(), EngineError>;

    async fn add_work_experience(
        &self,
        employee_id: Uuid,
        entry: ExperienceEntry,
    ) -> Result<(), EngineError>;

    /// Flips the matching `current` experience entry to closed with `to=now`.
    async fn close_current_experience(
        &self,
        employee_id: Uuid,
        job_id: Uuid,
    ) -> Result<(), EngineError>;
}

#[derive(Default)]
struct BoardState {
    applications: HashMap<Uuid, ApplicationTerms>,
    accepted: Vec<Uuid>,
    closed_jobs: Vec<Uuid>,
    experience: HashMap<Uuid, Vec<ExperienceEntry>>,
}

/// In-process job board used in tests and wherever the CRUD subsystems are
/// not wired in.
#[derive(Default)]
pub struct InMemoryJobBoard {
    state: Mutex<BoardState>,
}

impl InMemoryJobBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_application(&self, terms: ApplicationTerms) {
        let mut state = self.state.lock().expect("board state poisoned");
        state.applications.insert(terms.application_id, terms);
    }

    pub fn is_accepted(&self, application_id: Uuid) -> bool {
        let state = self.state.lock().expect("board state poisoned");
        state.accepted.contains(&application_id)
    }

    pub fn is_job_closed(&self, job_id: Uuid) -> bool {
        let state = self.state.lock().expect("board state poisoned");
        state.closed_jobs.contains(&job_id)
    }

    pub fn experience_of(&self, employee_id: Uuid) -> Vec<ExperienceEntry> {
        let state = self.state.lock().expect("board state poisoned");
        state.experience.get(&employee_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl JobBoard for InMemoryJobBoard {
    async fn application(&self, id: Uuid) -> Result<ApplicationTerms, EngineError> {
        let state = self.state.lock().expect("board state poisoned");
        state
            .applications
            .get(&id)
            .cloned()
            .ok_or(EngineError::ApplicationNotFound(id))
    }

    async fn mark_application_accepted(&self, id: Uuid) -> Result<(), EngineError> {
        let mut state = self.state.lock().expect("board state poisoned");
        if !state.applications.contains_key(&id) {
            return Err(EngineError::ApplicationNotFound(id));
        }
        state.accepted.push(id);
        Ok(())
    }

    async fn close_job(&self, job_id: Uuid) -> Result<(), EngineError> {
        let mut state = self.state.lock().expect("board state poisoned");
        state.closed_jobs.push(job_id);
        Ok(())
    }

    async fn add_work_experience(
        &self,
        employee_id: Uuid,
        entry: ExperienceEntry,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock().expect("board state poisoned");
        state.experience.entry(employee_id).or_default().push(entry);
        Ok(())
    }

    async fn close_current_experience(
        &self,
        employee_id: Uuid,
        job_id: Uuid,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock().expect("board state poisoned");
        if let Some(entries) = state.experience.get_mut(&employee_id) {
            for entry in entries.iter_mut() {
                if entry.job_id == job_id && entry.current {
                    entry.current = false;
                    entry.to = Some(Utc::now());
                }
            }
        }
        Ok(())
    }
}
