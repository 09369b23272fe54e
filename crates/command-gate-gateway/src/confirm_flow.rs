// crates/command-gate-gateway/src/confirm_flow.rs
// ============================================================================
// Module: Confirmation Flow
// Description: Preview/apply helpers for destructive and settings tools.
// Purpose: Give handlers one call that issues or consumes a confirm token.
// Dependencies: command-gate-core, serde_json
// ============================================================================

//! ## Overview
//! Guarded handlers take a `mode` of `preview` or `apply`. Preview issues a
//! token bound to the operation signature and returns it to the caller;
//! apply consumes the presented token against the signature recomputed from
//! the current params. A mismatch of any kind burns the token.

// ============================================================================
// SECTION: Imports
// ============================================================================

use command_gate_core::ConfirmToken;
use command_gate_core::ConfirmationGuard;
use command_gate_core::DeleteSignature;
use command_gate_core::Diagnostic;
use command_gate_core::SettingsSignature;
use command_gate_core::codes;
use serde_json::Value;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Requested phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmMode {
    /// Issue a token without acting.
    Preview,
    /// Consume a token and act.
    Apply,
}

impl ConfirmMode {
    /// Parses `mode` case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns a `SCHEMA_INVALID_PARAMS` diagnostic for any other value.
    pub fn parse(mode: &str) -> Result<Self, Diagnostic> {
        if mode.eq_ignore_ascii_case("preview") {
            Ok(Self::Preview)
        } else if mode.eq_ignore_ascii_case("apply") {
            Ok(Self::Apply)
        } else {
            Err(Diagnostic::error(codes::SCHEMA_INVALID_PARAMS, "mode must be preview or apply.")
                .with_detail(format!("mode={mode}")))
        }
    }
}

/// Result of a confirmation gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmDecision {
    /// Preview issued a token; the handler must not act.
    Preview {
        /// Token to present on apply.
        token: ConfirmToken,
    },
    /// Apply presented a matching token; the handler may act.
    Confirmed,
}

// ============================================================================
// SECTION: Gates
// ============================================================================

/// Runs the preview/apply protocol for a bulk delete.
///
/// # Errors
///
/// Returns `SCHEMA_INVALID_PARAMS` for a bad mode, `INTERNAL_EXCEPTION` when
/// no token can be issued, and `CONFIRM_TOKEN_INVALID` when apply presents a
/// missing, expired, or mismatched token.
pub fn delete_gate<I, S>(
    guard: &ConfirmationGuard<DeleteSignature>,
    mode: &str,
    token: Option<&str>,
    targets: I,
    fail_if_referenced: bool,
) -> Result<ConfirmDecision, Diagnostic>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let signature = DeleteSignature::new(targets, fail_if_referenced);
    run_gate(guard, ConfirmMode::parse(mode)?, token, signature, codes::CONFIRM_TOKEN_INVALID)
}

/// Runs the preview/apply protocol for a settings patch.
///
/// # Errors
///
/// Returns `SCHEMA_INVALID_PARAMS` for a bad mode, `INTERNAL_EXCEPTION` when
/// the patch cannot be hashed or no token can be issued, and
/// `SETTINGS_CONFIRM_TOKEN_INVALID` when apply presents a bad token.
pub fn settings_gate(
    guard: &ConfirmationGuard<SettingsSignature>,
    mode: &str,
    token: Option<&str>,
    class_path: &str,
    patch: &Value,
    save_options: &Value,
) -> Result<ConfirmDecision, Diagnostic> {
    let mode = ConfirmMode::parse(mode)?;
    let signature = SettingsSignature::new(class_path, patch, save_options).map_err(|err| err.to_diagnostic())?;
    run_gate(guard, mode, token, signature, codes::SETTINGS_CONFIRM_TOKEN_INVALID)
}

/// Issues or consumes a token for `signature`.
fn run_gate<S: PartialEq>(
    guard: &ConfirmationGuard<S>,
    mode: ConfirmMode,
    token: Option<&str>,
    signature: S,
    invalid_code: &str,
) -> Result<ConfirmDecision, Diagnostic> {
    match mode {
        ConfirmMode::Preview => guard
            .issue(signature)
            .map(|token| ConfirmDecision::Preview {
                token,
            })
            .map_err(|err| err.to_diagnostic()),
        ConfirmMode::Apply => {
            if guard.consume(token.unwrap_or_default(), &signature) {
                Ok(ConfirmDecision::Confirmed)
            } else {
                Err(Diagnostic::error(invalid_code, "Invalid or expired confirm_token.")
                    .with_suggestion("Run the tool with mode=preview and retry with the returned confirm_token."))
            }
        }
    }
}

#[cfg(test)]
mod tests;
