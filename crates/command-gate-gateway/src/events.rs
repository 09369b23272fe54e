// crates/command-gate-gateway/src/events.rs
// ============================================================================
// Module: Gateway Event Stream
// Description: Bounded in-process buffer of request lifecycle events.
// Purpose: Expose recent progress, log, artifact, job, and changeset events.
// Dependencies: command-gate-core, serde, serde_json
// ============================================================================

//! ## Overview
//! The router emits events while a request moves through the pipeline and
//! [`EventStream`] keeps the most recent ones in a ring buffer. Nothing
//! subscribes to the stream; callers read it through [`EventStream::recent`]
//! or the `system.health` snapshot.
//!
//! ## Invariants
//! - The buffer never holds more than its capacity; the oldest event is
//!   dropped first and counted.
//! - Event ids are `evt-<sequence>` with the sequence starting at 1.
//! - Emitting never fails.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::PoisonError;

use command_gate_core::Diagnostic;
use command_gate_core::SharedClock;
use command_gate_core::Timestamp;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::jobs::JobRecord;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default ring buffer capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;
/// Recent events included in the health snapshot.
pub const HEALTH_RECENT_EVENTS: usize = 8;
/// Request id recorded for payloads that never decoded.
pub const INVALID_REQUEST_ID: &str = "invalid-request";

// ============================================================================
// SECTION: Event Types
// ============================================================================

/// Event categories.
///
/// # Invariants
/// - Labels are stable for consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    /// Pipeline phase reached.
    #[serde(rename = "event.progress")]
    Progress,
    /// Free-form log line or diagnostic.
    #[serde(rename = "event.log")]
    Log,
    /// Resource produced or touched by a call.
    #[serde(rename = "event.artifact")]
    Artifact,
    /// Job status change.
    #[serde(rename = "event.job.status")]
    JobStatus,
    /// Changeset persisted.
    #[serde(rename = "event.changeset.created")]
    ChangesetCreated,
}

impl EventKind {
    /// Returns the wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Progress => "event.progress",
            Self::Log => "event.log",
            Self::Artifact => "event.artifact",
            Self::JobStatus => "event.job.status",
            Self::ChangesetCreated => "event.changeset.created",
        }
    }
}

/// One buffered event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayEvent {
    /// `evt-<sequence>`.
    pub event_id: String,
    /// Category.
    pub event_type: EventKind,
    /// Request that produced the event.
    pub request_id: String,
    /// Emission instant.
    pub timestamp: Timestamp,
    /// Kind-specific payload object.
    pub payload: Value,
}

// ============================================================================
// SECTION: Stream
// ============================================================================

/// Guarded buffer and counters.
#[derive(Debug, Default)]
struct StreamState {
    /// Buffered events, oldest first.
    buffer: VecDeque<GatewayEvent>,
    /// Events ever emitted.
    emitted: u64,
    /// Events evicted by overflow.
    dropped: u64,
}

/// Bounded event buffer shared by the router and handlers.
pub struct EventStream {
    /// Maximum buffered events.
    capacity: usize,
    /// Time source for event stamps.
    clock: SharedClock,
    /// Guarded buffer.
    state: Mutex<StreamState>,
}

impl EventStream {
    /// Creates a stream holding at most `capacity` events (at least one).
    #[must_use]
    pub fn new(capacity: usize, clock: SharedClock) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            clock,
            state: Mutex::new(StreamState {
                buffer: VecDeque::with_capacity(capacity),
                ..StreamState::default()
            }),
        }
    }

    /// Buffers an event, evicting the oldest one when full.
    pub fn emit(&self, kind: EventKind, request_id: &str, payload: Value) {
        let timestamp = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.emitted = state.emitted.saturating_add(1);
        if state.buffer.len() >= self.capacity {
            state.buffer.pop_front();
            state.dropped = state.dropped.saturating_add(1);
        }
        let event = GatewayEvent {
            event_id: format!("evt-{}", state.emitted),
            event_type: kind,
            request_id: request_id.to_string(),
            timestamp,
            payload,
        };
        tracing::trace!(event_id = %event.event_id, kind = kind.as_str(), request_id, "event emitted");
        state.buffer.push_back(event);
    }

    /// Emits a progress event; `percent` is clamped to `0..=100`.
    pub fn progress(&self, request_id: &str, percent: u8, phase: &str) {
        self.emit(EventKind::Progress, request_id, json!({"percent": percent.min(100), "phase": phase}));
    }

    /// Emits a log event.
    pub fn log(&self, request_id: &str, level: &str, message: &str) {
        self.emit(EventKind::Log, request_id, json!({"level": level, "message": message}));
    }

    /// Emits a log event carrying a diagnostic.
    pub fn diagnostic(&self, request_id: &str, diagnostic: &Diagnostic) {
        self.emit(
            EventKind::Log,
            request_id,
            json!({
                "level": diagnostic.severity,
                "message": diagnostic.message,
                "detail": {"code": diagnostic.code, "detail": diagnostic.detail},
            }),
        );
    }

    /// Emits an artifact event.
    pub fn artifact(&self, request_id: &str, object_path: &str, action: &str) {
        self.emit(EventKind::Artifact, request_id, json!({"object_path": object_path, "action": action}));
    }

    /// Emits a job status event for `job`.
    pub fn job_status(&self, request_id: &str, job: &JobRecord) {
        self.emit(
            EventKind::JobStatus,
            request_id,
            json!({
                "job_id": job.job_id,
                "status": job.status,
                "progress": job.progress,
                "started_at": job.started_at,
                "updated_at": job.updated_at,
            }),
        );
    }

    /// Emits a changeset-created event.
    pub fn changeset_created(&self, request_id: &str, changeset_id: &str, path: &str) {
        self.emit(EventKind::ChangesetCreated, request_id, json!({"changeset_id": changeset_id, "path": path}));
    }

    /// Returns up to `limit` of the newest events, oldest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<GatewayEvent> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = state.buffer.len().saturating_sub(limit);
        state.buffer.iter().skip(skip).cloned().collect()
    }

    /// Returns buffer counters plus the newest `recent_limit` events as JSON.
    #[must_use]
    pub fn snapshot(&self, recent_limit: usize) -> Value {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = state.buffer.len().saturating_sub(recent_limit);
        let recent: Vec<&GatewayEvent> = state.buffer.iter().skip(skip).collect();
        json!({
            "supported": true,
            "capacity": self.capacity,
            "buffered_event_count": state.buffer.len(),
            "total_emitted_event_count": state.emitted,
            "dropped_event_count": state.dropped,
            "recent_events": recent,
        })
    }
}
