// crates/command-gate-gateway/src/lib.rs
// ============================================================================
// Module: Command Gate Gateway Library
// Description: Registry, ledger, guards, and router for the command gateway.
// Purpose: Compose schema-checked dispatch with audit and rollback.
// Dependencies: command-gate-core, command-gate-config, jsonschema, tracing
// ============================================================================

//! ## Overview
//! The gateway turns decoded tool requests into response envelopes. The
//! [`ToolRegistry`] validates and dispatches, the [`ChangesetLedger`] persists
//! one audit record per mutating call, and the [`CommandRouter`] sequences
//! protocol checks, idempotency replay, policy, locks, job tracking, and the
//! deadline around each call.
//!
//! ## Invariants
//! - The tool table is frozen once [`ToolRegistryBuilder::build`] returns.
//! - Every routed request yields exactly one response and one audit event.
//! - No error type crosses the router; failures become diagnostics.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod builtin;
pub mod bundle;
pub mod capabilities;
pub mod confirm_flow;
pub mod context;
pub mod events;
pub mod idempotency;
pub mod jobs;
pub mod ledger;
pub mod locks;
pub mod metrics;
pub mod policy;
pub mod registry;
pub mod router;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::GatewayAuditEvent;
pub use audit::GatewayAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use builtin::register_builtin_tools;
pub use bundle::BundleError;
pub use bundle::SchemaBundle;
pub use bundle::ToolSchemas;
pub use confirm_flow::ConfirmDecision;
pub use context::GatewayServices;
pub use context::GatewaySettings;
pub use context::ToolContext;
pub use events::EventKind;
pub use events::EventStream;
pub use events::GatewayEvent;
pub use idempotency::IdempotencyCache;
pub use jobs::InMemoryJobStore;
pub use jobs::JobError;
pub use jobs::JobRecord;
pub use jobs::JobStatus;
pub use jobs::JobStore;
pub use ledger::ChangesetLedger;
pub use ledger::ChangesetMeta;
pub use ledger::ChangesetRecord;
pub use ledger::LedgerError;
pub use ledger::ListPage;
pub use ledger::ListQuery;
pub use ledger::NewChangeset;
pub use ledger::RollbackImpact;
pub use ledger::RollbackOutcome;
pub use ledger::RollbackPreview;
pub use locks::LockError;
pub use locks::LockGuard;
pub use locks::LockManager;
pub use metrics::GatewayMetrics;
pub use metrics::InMemoryMetrics;
pub use metrics::MetricEvent;
pub use metrics::NoopMetrics;
pub use policy::PolicyGate;
pub use registry::HandlerOutcome;
pub use registry::ToolDefinition;
pub use registry::ToolDescriptor;
pub use registry::ToolHandler;
pub use registry::ToolRegistry;
pub use registry::ToolRegistryBuilder;
pub use registry::ToolSpec;
pub use router::CommandRouter;
