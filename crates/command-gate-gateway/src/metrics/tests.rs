// crates/command-gate-gateway/src/metrics/tests.rs
// ============================================================================
// Module: Gateway Metrics Tests
// Description: Unit tests for counter aggregation.
// Purpose: Ensure per-tool and event counters agree with the snapshot.
// Dependencies: command-gate-gateway
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use command_gate_core::ResponseStatus;
use serde_json::json;

use super::GatewayMetrics;
use super::InMemoryMetrics;
use super::MetricEvent;
use super::NoopMetrics;

#[test]
fn tool_counters_split_by_status() {
    let metrics = InMemoryMetrics::new();
    metrics.record_tool("demo.echo", ResponseStatus::Ok, false, 4);
    metrics.record_tool("demo.echo", ResponseStatus::Partial, true, 9);
    metrics.record_tool("demo.echo", ResponseStatus::Error, false, 2);
    let counters = metrics.tool("demo.echo");
    assert_eq!((counters.total, counters.ok, counters.partial, counters.error), (3, 1, 1, 1));
    assert_eq!(counters.replay, 1);
    assert_eq!(counters.total_duration_ms, 15);
    assert_eq!(counters.last_duration_ms, 2);
    assert_eq!(counters.max_duration_ms, 9);
}

#[test]
fn snapshot_reports_events_by_label() {
    let metrics = InMemoryMetrics::new();
    metrics.record_event(MetricEvent::LockConflict);
    metrics.record_event(MetricEvent::LockConflict);
    metrics.record_event(MetricEvent::ChangesetCreated);
    assert_eq!(metrics.event_count(MetricEvent::LockConflict), 2);
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot["events"]["lock_conflicts"], json!(2));
    assert_eq!(snapshot["events"]["changesets_created"], json!(1));
    assert_eq!(snapshot["tools"], json!({}));
}

#[test]
fn noop_metrics_discard() {
    let metrics = NoopMetrics;
    metrics.record_event(MetricEvent::TimeoutExceeded);
    assert_eq!(metrics.snapshot(), json!({}));
}
