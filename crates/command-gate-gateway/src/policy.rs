// crates/command-gate-gateway/src/policy.rs
// ============================================================================
// Module: Policy Gate
// Description: Pre- and post-execution policy checks for routed requests.
// Purpose: Block write tools while the host is in safe mode.
// Dependencies: command-gate-core, tracing
// ============================================================================

//! ## Overview
//! The policy version is recorded in every changeset so audits can tell which
//! rules were in force. Safe mode is the only enforced rule: while it is on,
//! preflight denies write tools and read tools pass through.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use command_gate_core::Diagnostic;
use command_gate_core::ExecutionResult;
use command_gate_core::RequestEnvelope;
use command_gate_core::ResponseStatus;
use command_gate_core::codes;

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Runtime policy state.
#[derive(Debug)]
pub struct PolicyGate {
    /// Policy version recorded in changesets.
    version: String,
    /// Whether write tools are blocked.
    safe_mode: AtomicBool,
}

impl PolicyGate {
    /// Creates a gate.
    #[must_use]
    pub fn new(version: impl Into<String>, safe_mode: bool) -> Self {
        Self {
            version: version.into(),
            safe_mode: AtomicBool::new(safe_mode),
        }
    }

    /// Returns the policy version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns true while safe mode is on.
    #[must_use]
    pub fn safe_mode(&self) -> bool {
        self.safe_mode.load(Ordering::Acquire)
    }

    /// Toggles safe mode.
    pub fn set_safe_mode(&self, enabled: bool) {
        self.safe_mode.store(enabled, Ordering::Release);
    }

    /// Checks a request before execution.
    ///
    /// # Errors
    ///
    /// Returns an `UNSAFE_STATE` diagnostic for write tools in safe mode.
    pub fn preflight(&self, request: &RequestEnvelope, is_write: bool) -> Result<(), Diagnostic> {
        if is_write && self.safe_mode() {
            return Err(Diagnostic::error(codes::UNSAFE_STATE, "Write tools are blocked while the host is in safe mode.")
                .with_detail(format!("tool={}", request.tool))
                .with_suggestion("Disable safe mode or retry once the host leaves safe mode.")
                .retriable());
        }
        Ok(())
    }

    /// Records the outcome of a completed call.
    pub fn postflight(&self, request: &RequestEnvelope, result: &ExecutionResult) {
        if result.status != ResponseStatus::Error {
            tracing::debug!(
                tool = %request.tool,
                request_id = %request.request_id,
                policy_version = %self.version,
                status = result.status.as_str(),
                "policy postflight"
            );
        }
    }
}
