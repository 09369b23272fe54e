// crates/command-gate-gateway/src/capabilities.rs
// ============================================================================
// Module: Gateway Capabilities
// Description: Static feature flags advertised by tools.list.
// Purpose: Let callers detect optional gateway features.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Capabilities are descriptive only; nothing in the gateway branches on
//! them. The list is append-only and ordered by introduction.

/// Feature flags advertised to callers.
pub const CAPABILITIES: &[&str] = &[
    "core_tools_v1",
    "changeset_ops_v1",
    "job_ops_v1",
    "idempotency_v1",
    "lock_lease_v1",
    "schema_validation_v1",
    "timeout_override_v1",
    "confirm_token_v1",
    "observability_metrics_v1",
    "event_stream_v1",
];

/// Returns the advertised capabilities as owned strings.
#[must_use]
pub fn capabilities() -> Vec<String> {
    CAPABILITIES.iter().map(|capability| (*capability).to_string()).collect()
}
