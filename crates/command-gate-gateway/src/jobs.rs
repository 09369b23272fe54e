// crates/command-gate-gateway/src/jobs.rs
// ============================================================================
// Module: Job Store
// Description: Job records tracked for requests carrying timeout or cancel context.
// Purpose: Back job.get, job.cancel, and router cancellation checks.
// Dependencies: command-gate-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The router creates a job for every request that declares `timeout_ms` or
//! `cancel_token`, marks it running, and finalizes it with the call's result.
//! Cancellation is cooperative: a canceled job id presented later as a
//! `cancel_token` stops that request before execution.
//!
//! ## Invariants
//! - Terminal jobs (`succeeded`, `failed`, `canceled`) never change status.
//! - Progress stays within `0..=100`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use command_gate_core::Diagnostic;
use command_gate_core::JobId;
use command_gate_core::SharedClock;
use command_gate_core::Timestamp;
use command_gate_core::codes;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, not started.
    Queued,
    /// Executing.
    Running,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Canceled by a caller.
    Canceled,
}

impl JobStatus {
    /// Returns true for states that never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    /// Returns the wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

/// Tracked job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    /// Job identifier.
    pub job_id: JobId,
    /// Current status.
    pub status: JobStatus,
    /// Progress percentage.
    pub progress: u8,
    /// Creation instant.
    pub started_at: Timestamp,
    /// Last update instant.
    pub updated_at: Timestamp,
    /// Result object recorded at finalize.
    pub result: Value,
    /// Diagnostics recorded at finalize.
    pub diagnostics: Vec<Diagnostic>,
}

/// Job store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// No job has this id.
    #[error("job not found: {0}")]
    NotFound(String),
    /// Store lock poisoned.
    #[error("job store lock poisoned")]
    Poisoned,
}

impl JobError {
    /// Converts the failure into a caller-facing diagnostic.
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::NotFound(id) => Diagnostic::error(codes::JOB_NOT_FOUND, "Requested job was not found.")
                .with_detail(id.clone())
                .with_suggestion("Call job.get with a valid job_id."),
            Self::Poisoned => Diagnostic::error(codes::INTERNAL_EXCEPTION, "Job state is unavailable.")
                .with_detail(self.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Job persistence seam.
pub trait JobStore: Send + Sync {
    /// Creates a queued job.
    ///
    /// # Errors
    ///
    /// Returns [`JobError`] when the store is unavailable.
    fn create(&self) -> Result<JobRecord, JobError>;

    /// Updates status and progress of a non-terminal job.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for unknown ids.
    fn update(&self, job_id: &JobId, status: JobStatus, progress: u8) -> Result<JobRecord, JobError>;

    /// Records the final status, result, and diagnostics of a non-terminal job.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for unknown ids.
    fn finalize(
        &self,
        job_id: &JobId,
        status: JobStatus,
        result: Value,
        diagnostics: Vec<Diagnostic>,
    ) -> Result<JobRecord, JobError>;

    /// Returns a job.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for unknown ids.
    fn get(&self, job_id: &JobId) -> Result<JobRecord, JobError>;

    /// Cancels a job; terminal jobs are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for unknown ids.
    fn cancel(&self, job_id: &JobId) -> Result<JobRecord, JobError>;
}

/// Process-local job store.
pub struct InMemoryJobStore {
    /// Jobs keyed by id.
    jobs: Mutex<BTreeMap<JobId, JobRecord>>,
    /// Time source for job timestamps.
    clock: SharedClock,
}

impl InMemoryJobStore {
    /// Creates an empty store.
    #[must_use]
    pub const fn new(clock: SharedClock) -> Self {
        Self {
            jobs: Mutex::new(BTreeMap::new()),
            clock,
        }
    }

    /// Applies `change` to a non-terminal job and stamps `updated_at`.
    fn modify(&self, job_id: &JobId, change: impl FnOnce(&mut JobRecord)) -> Result<JobRecord, JobError> {
        let now = self.clock.now();
        let mut jobs = self.jobs.lock().map_err(|_| JobError::Poisoned)?;
        let job = jobs.get_mut(job_id).ok_or_else(|| JobError::NotFound(job_id.as_str().to_string()))?;
        if !job.status.is_terminal() {
            change(job);
            job.updated_at = now;
        }
        Ok(job.clone())
    }
}

impl JobStore for InMemoryJobStore {
    fn create(&self) -> Result<JobRecord, JobError> {
        let now = self.clock.now();
        let record = JobRecord {
            job_id: JobId::generate(),
            status: JobStatus::Queued,
            progress: 0,
            started_at: now,
            updated_at: now,
            result: Value::Object(Map::new()),
            diagnostics: Vec::new(),
        };
        let mut jobs = self.jobs.lock().map_err(|_| JobError::Poisoned)?;
        jobs.insert(record.job_id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, job_id: &JobId, status: JobStatus, progress: u8) -> Result<JobRecord, JobError> {
        self.modify(job_id, |job| {
            job.status = status;
            job.progress = progress.min(100);
        })
    }

    fn finalize(
        &self,
        job_id: &JobId,
        status: JobStatus,
        result: Value,
        diagnostics: Vec<Diagnostic>,
    ) -> Result<JobRecord, JobError> {
        self.modify(job_id, |job| {
            job.status = status;
            if status == JobStatus::Succeeded {
                job.progress = 100;
            }
            job.result = result;
            job.diagnostics = diagnostics;
        })
    }

    fn get(&self, job_id: &JobId) -> Result<JobRecord, JobError> {
        let jobs = self.jobs.lock().map_err(|_| JobError::Poisoned)?;
        jobs.get(job_id).cloned().ok_or_else(|| JobError::NotFound(job_id.as_str().to_string()))
    }

    fn cancel(&self, job_id: &JobId) -> Result<JobRecord, JobError> {
        self.modify(job_id, |job| job.status = JobStatus::Canceled)
    }
}

#[cfg(test)]
mod tests;
