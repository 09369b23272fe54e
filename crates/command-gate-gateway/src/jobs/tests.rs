// crates/command-gate-gateway/src/jobs/tests.rs
// ============================================================================
// Module: Job Store Tests
// Description: Unit tests for job lifecycle transitions.
// Purpose: Ensure terminal states are sticky and progress is bounded.
// Dependencies: command-gate-gateway
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use std::sync::Arc;
use std::time::Duration;

use command_gate_core::Diagnostic;
use command_gate_core::JobId;
use command_gate_core::ManualClock;
use command_gate_core::Timestamp;
use command_gate_core::codes;
use serde_json::json;

use super::InMemoryJobStore;
use super::JobError;
use super::JobStatus;
use super::JobStore;

fn store() -> (InMemoryJobStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Timestamp::from_unix_millis(0)));
    (InMemoryJobStore::new(clock.clone()), clock)
}

#[test]
fn lifecycle_stamps_updates() {
    let (jobs, clock) = store();
    let job = jobs.create().unwrap();
    assert!(job.job_id.as_str().starts_with("job-"));
    assert_eq!(job.status, JobStatus::Queued);

    clock.advance(Duration::from_millis(5));
    let running = jobs.update(&job.job_id, JobStatus::Running, 250).unwrap();
    assert_eq!(running.progress, 100);
    assert_eq!(running.updated_at, Timestamp::from_unix_millis(5));
    assert_eq!(running.started_at, Timestamp::from_unix_millis(0));

    let done = jobs.finalize(&job.job_id, JobStatus::Succeeded, json!({"ok": true}), Vec::new()).unwrap();
    assert_eq!(done.status, JobStatus::Succeeded);
    assert_eq!(jobs.get(&job.job_id).unwrap().result, json!({"ok": true}));
}

#[test]
fn terminal_jobs_ignore_cancel() {
    let (jobs, _clock) = store();
    let job = jobs.create().unwrap();
    let failed = jobs
        .finalize(
            &job.job_id,
            JobStatus::Failed,
            json!({}),
            vec![Diagnostic::error(codes::INTERNAL_EXCEPTION, "boom")],
        )
        .unwrap();
    let after = jobs.cancel(&job.job_id).unwrap();
    assert_eq!(after, failed);
    assert_eq!(after.status.as_str(), "failed");
}

#[test]
fn cancel_then_finalize_keeps_canceled() {
    let (jobs, _clock) = store();
    let job = jobs.create().unwrap();
    assert_eq!(jobs.cancel(&job.job_id).unwrap().status, JobStatus::Canceled);
    let finalized = jobs.finalize(&job.job_id, JobStatus::Succeeded, json!({}), Vec::new()).unwrap();
    assert_eq!(finalized.status, JobStatus::Canceled);
    assert_eq!(finalized.progress, 0);
}

#[test]
fn unknown_job_maps_to_job_not_found() {
    let (jobs, _clock) = store();
    let err = jobs.cancel(&JobId::new("job-missing")).unwrap_err();
    assert_eq!(err, JobError::NotFound("job-missing".to_string()));
    let diagnostic = err.to_diagnostic();
    assert_eq!(diagnostic.code, codes::JOB_NOT_FOUND);
    assert_eq!(diagnostic.suggestion, "Call job.get with a valid job_id.");
}
