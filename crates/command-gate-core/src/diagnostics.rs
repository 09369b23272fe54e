// crates/command-gate-core/src/diagnostics.rs
// ============================================================================
// Module: Command Gate Diagnostics
// Description: Structured diagnostic records and stable error codes.
// Purpose: Represent every gateway failure as a value instead of a panic or error.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`Diagnostic`] is the only failure currency that crosses the dispatcher
//! boundary. Codes are stable machine-readable strings from [`codes`]; the
//! severity separates hard failures from caveats, and `retriable` tells a
//! caller whether an immediate resubmission can succeed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Codes
// ============================================================================

/// Stable diagnostic codes emitted by the gateway.
pub mod codes {
    /// Tool is unknown, disabled, or has no executor.
    pub const TOOL_NOT_FOUND: &str = "TOOL_NOT_FOUND";
    /// Request params (or envelope fields) failed validation.
    pub const SCHEMA_INVALID_PARAMS: &str = "SCHEMA_INVALID_PARAMS";
    /// Changeset persistence failed.
    pub const SAVE_FAILED: &str = "SAVE_FAILED";
    /// Requested changeset does not exist.
    pub const CHANGESET_NOT_FOUND: &str = "CHANGESET_NOT_FOUND";
    /// Rollback preview or apply could not proceed.
    pub const CHANGESET_ROLLBACK_FAILED: &str = "CHANGESET_ROLLBACK_FAILED";
    /// Requested job does not exist.
    pub const JOB_NOT_FOUND: &str = "JOB_NOT_FOUND";
    /// Request references a canceled job.
    pub const JOB_CANCELED: &str = "JOB_CANCELED";
    /// Request exceeded its declared timeout.
    pub const JOB_TIMEOUT: &str = "JOB_TIMEOUT";
    /// Handler failed without explaining why, or gateway state is broken.
    pub const INTERNAL_EXCEPTION: &str = "INTERNAL_EXCEPTION";
    /// Idempotency key reused with different params.
    pub const IDEMPOTENCY_CONFLICT: &str = "IDEMPOTENCY_CONFLICT";
    /// Resource lock held by another owner.
    pub const LOCK_CONFLICT: &str = "LOCK_CONFLICT";
    /// Host is in a state where writes are blocked.
    pub const UNSAFE_STATE: &str = "UNSAFE_STATE";
    /// Request protocol version is not accepted.
    pub const PROTOCOL_UNSUPPORTED: &str = "PROTOCOL_UNSUPPORTED";
    /// Delete confirmation token missing, expired, or mismatched.
    pub const CONFIRM_TOKEN_INVALID: &str = "CONFIRM_TOKEN_INVALID";
    /// Settings confirmation token missing, expired, or mismatched.
    pub const SETTINGS_CONFIRM_TOKEN_INVALID: &str = "SETTINGS_CONFIRM_TOKEN_INVALID";
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Hard failure.
    #[default]
    Error,
    /// Caveat; the call may still succeed.
    Warning,
    /// Informational note.
    Info,
}

/// Structured diagnostic record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable machine-readable code.
    pub code: String,
    /// Severity classification.
    #[serde(default)]
    pub severity: Severity,
    /// Human-readable summary.
    pub message: String,
    /// Optional detail (offending path, identifier, or underlying error).
    #[serde(default)]
    pub detail: String,
    /// Optional next step for the caller.
    #[serde(default)]
    pub suggestion: String,
    /// Whether an immediate retry is meaningful.
    #[serde(default)]
    pub retriable: bool,
}

impl Diagnostic {
    /// Creates an error-severity diagnostic.
    #[must_use]
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            severity: Severity::Error,
            message: message.into(),
            detail: String::new(),
            suggestion: String::new(),
            retriable: false,
        }
    }

    /// Creates a warning-severity diagnostic.
    #[must_use]
    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    /// Attaches a detail string.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    /// Attaches a suggestion string.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }

    /// Marks the diagnostic as retriable.
    #[must_use]
    pub const fn retriable(mut self) -> Self {
        self.retriable = true;
        self
    }

    /// Returns true for error-severity diagnostics.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Diagnostics grouped by severity, preserving generation order in each group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticGroups {
    /// Error-severity diagnostics.
    pub errors: Vec<Diagnostic>,
    /// Warning-severity diagnostics.
    pub warnings: Vec<Diagnostic>,
    /// Informational diagnostics.
    pub infos: Vec<Diagnostic>,
}

impl DiagnosticGroups {
    /// Splits an ordered diagnostic list into severity groups.
    #[must_use]
    pub fn from_ordered(diagnostics: &[Diagnostic]) -> Self {
        let mut groups = Self::default();
        for diagnostic in diagnostics {
            let bucket = match diagnostic.severity {
                Severity::Error => &mut groups.errors,
                Severity::Warning => &mut groups.warnings,
                Severity::Info => &mut groups.infos,
            };
            bucket.push(diagnostic.clone());
        }
        groups
    }

    /// Returns the codes of all error diagnostics.
    #[must_use]
    pub fn error_codes(&self) -> Vec<String> {
        self.errors.iter().map(|diagnostic| diagnostic.code.clone()).collect()
    }
}
