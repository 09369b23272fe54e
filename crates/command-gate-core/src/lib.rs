// crates/command-gate-core/src/lib.rs
// ============================================================================
// Module: Command Gate Core Library
// Description: Public API surface for the Command Gate core.
// Purpose: Expose gateway value types, hashing, schema checks, and token guards.
// Dependencies: crate::{identifiers, diagnostics, envelope, hashing, schema, clock, confirm}
// ============================================================================

//! ## Overview
//! Command Gate core holds the pure pieces of the command gateway: typed
//! identifiers, structured diagnostics, request and response envelopes,
//! canonical hashing, the schema-subset validator, and the two-phase
//! confirmation-token guard. Nothing in this crate touches the filesystem;
//! the ledger, registry, and router live in `command-gate-gateway`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod clock;
pub mod confirm;
pub mod diagnostics;
pub mod envelope;
pub mod hashing;
pub mod identifiers;
pub mod schema;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use clock::Clock;
pub use clock::ManualClock;
pub use clock::SharedClock;
pub use clock::SystemClock;
pub use clock::Timestamp;
pub use confirm::ConfirmToken;
pub use confirm::ConfirmationGuard;
pub use confirm::DeleteSignature;
pub use confirm::GuardError;
pub use confirm::SettingsSignature;
pub use diagnostics::Diagnostic;
pub use diagnostics::DiagnosticGroups;
pub use diagnostics::Severity;
pub use diagnostics::codes;
pub use envelope::EnvelopeError;
pub use envelope::ExecutionResult;
pub use envelope::RequestContext;
pub use envelope::RequestEnvelope;
pub use envelope::ResponseEnvelope;
pub use envelope::ResponseMetrics;
pub use envelope::ResponseStatus;
pub use envelope::TouchedResources;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use identifiers::ChangesetId;
pub use identifiers::JobId;
pub use identifiers::RequestId;
pub use identifiers::SessionId;
pub use identifiers::ToolName;
pub use schema::SchemaViolation;
pub use schema::validate_value;
