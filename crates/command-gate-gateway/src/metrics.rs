// crates/command-gate-gateway/src/metrics.rs
// ============================================================================
// Module: Gateway Metrics
// Description: Counters for tool calls and notable pipeline events.
// Purpose: Provide in-process observability without an exporter dependency.
// Dependencies: command-gate-core, serde, serde_json
// ============================================================================

//! ## Overview
//! A thin metrics interface: the router reports one observation per request
//! plus discrete pipeline events. [`InMemoryMetrics`] aggregates them for
//! `system.health`; deployments may plug in an exporter behind the same
//! trait.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use command_gate_core::ResponseStatus;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Discrete pipeline events.
///
/// # Invariants
/// - Labels are stable for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricEvent {
    /// Params failed schema validation.
    SchemaValidationFailure,
    /// Idempotency key reused with different params.
    IdempotencyConflict,
    /// Resource lock contention.
    LockConflict,
    /// Policy preflight denied the call.
    PolicyDenied,
    /// Call exceeded its declared timeout.
    TimeoutExceeded,
    /// Changeset persisted.
    ChangesetCreated,
    /// Rollback applied.
    RollbackSucceeded,
    /// Rollback rejected or failed.
    RollbackFailed,
    /// Request stopped by a canceled job.
    CancelRejected,
}

impl MetricEvent {
    /// Returns a stable label for the event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SchemaValidationFailure => "schema_validation_failures",
            Self::IdempotencyConflict => "idempotency_conflicts",
            Self::LockConflict => "lock_conflicts",
            Self::PolicyDenied => "policy_denials",
            Self::TimeoutExceeded => "timeouts",
            Self::ChangesetCreated => "changesets_created",
            Self::RollbackSucceeded => "rollback_successes",
            Self::RollbackFailed => "rollback_failures",
            Self::CancelRejected => "cancel_rejections",
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for gateway requests.
pub trait GatewayMetrics: Send + Sync {
    /// Records one completed request.
    fn record_tool(&self, tool: &str, status: ResponseStatus, replay: bool, duration_ms: u64);
    /// Records a pipeline event.
    fn record_event(&self, event: MetricEvent);
    /// Returns the current aggregates as JSON.
    fn snapshot(&self) -> Value;
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
pub struct NoopMetrics;

impl GatewayMetrics for NoopMetrics {
    fn record_tool(&self, _tool: &str, _status: ResponseStatus, _replay: bool, _duration_ms: u64) {}

    fn record_event(&self, _event: MetricEvent) {}

    fn snapshot(&self) -> Value {
        json!({})
    }
}

// ============================================================================
// SECTION: In-Memory Metrics
// ============================================================================

/// Per-tool request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ToolCounters {
    /// All requests.
    pub total: u64,
    /// Requests ending `ok`.
    pub ok: u64,
    /// Requests ending `partial`.
    pub partial: u64,
    /// Requests ending `error`.
    pub error: u64,
    /// Requests served from the idempotency cache.
    pub replay: u64,
    /// Sum of durations.
    pub total_duration_ms: u64,
    /// Most recent duration.
    pub last_duration_ms: u64,
    /// Largest duration.
    pub max_duration_ms: u64,
}

/// Aggregated counters.
#[derive(Debug, Default)]
struct MetricsState {
    /// Counters by tool name.
    tools: BTreeMap<String, ToolCounters>,
    /// Event counts by label.
    events: BTreeMap<&'static str, u64>,
}

/// Process-local metrics aggregator.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    /// Guarded aggregates.
    state: Mutex<MetricsState>,
}

impl InMemoryMetrics {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counters for `tool`.
    #[must_use]
    pub fn tool(&self, tool: &str) -> ToolCounters {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).tools.get(tool).copied().unwrap_or_default()
    }

    /// Returns the count for `event`.
    #[must_use]
    pub fn event_count(&self, event: MetricEvent) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).events.get(event.as_str()).copied().unwrap_or(0)
    }
}

impl GatewayMetrics for InMemoryMetrics {
    fn record_tool(&self, tool: &str, status: ResponseStatus, replay: bool, duration_ms: u64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let counters = state.tools.entry(tool.to_string()).or_default();
        counters.total += 1;
        match status {
            ResponseStatus::Ok => counters.ok += 1,
            ResponseStatus::Partial => counters.partial += 1,
            ResponseStatus::Error => counters.error += 1,
        }
        if replay {
            counters.replay += 1;
        }
        counters.total_duration_ms = counters.total_duration_ms.saturating_add(duration_ms);
        counters.last_duration_ms = duration_ms;
        counters.max_duration_ms = counters.max_duration_ms.max(duration_ms);
    }

    fn record_event(&self, event: MetricEvent) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state.events.entry(event.as_str()).or_default() += 1;
    }

    fn snapshot(&self) -> Value {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        json!({
            "tools": state.tools,
            "events": state.events,
        })
    }
}

#[cfg(test)]
mod tests;
