// crates/command-gate-gateway/src/context.rs
// ============================================================================
// Module: Gateway Context
// Description: Shared services handed to the router and tool handlers.
// Purpose: Replace ambient global state with explicit context passing.
// Dependencies: command-gate-config, command-gate-core
// ============================================================================

//! ## Overview
//! [`GatewayServices`] owns every piece of mutable gateway state: the ledger,
//! job store, lock table, policy gate, idempotency cache, event stream, and
//! the two confirmation guards. Handlers see it through a borrowed [`ToolContext`]
//! alongside the frozen registry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use command_gate_config::GatewayConfig;
use command_gate_core::ConfirmationGuard;
use command_gate_core::DeleteSignature;
use command_gate_core::SettingsSignature;
use command_gate_core::SharedClock;

use crate::audit::GatewayAuditSink;
use crate::audit::NoopAuditSink;
use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::events::EventStream;
use crate::idempotency::IdempotencyCache;
use crate::jobs::InMemoryJobStore;
use crate::jobs::JobStore;
use crate::ledger::ChangesetLedger;
use crate::locks::LockManager;
use crate::metrics::GatewayMetrics;
use crate::metrics::InMemoryMetrics;
use crate::policy::PolicyGate;
use crate::registry::ToolRegistry;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Immutable settings derived from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Advertised protocol version.
    pub protocol_version: String,
    /// Accepted request protocol prefix.
    pub protocol_prefix: String,
    /// Engine version used when a request omits one.
    pub engine_version: String,
    /// Default changeset page size.
    pub default_list_limit: usize,
    /// Write lock lease.
    pub lock_lease: Duration,
}

impl GatewaySettings {
    /// Extracts settings from `config`.
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            protocol_version: config.gateway.protocol_version.clone(),
            protocol_prefix: config.gateway.protocol_prefix.clone(),
            engine_version: config.gateway.engine_version.clone(),
            default_list_limit: config.ledger.default_list_limit,
            lock_lease: config.locks.lease(),
        }
    }
}

// ============================================================================
// SECTION: Services
// ============================================================================

/// Mutable gateway state shared by the router and handlers.
pub struct GatewayServices {
    /// Configuration-derived settings.
    pub settings: GatewaySettings,
    /// Changeset ledger.
    pub ledger: ChangesetLedger,
    /// Job store.
    pub jobs: Arc<dyn JobStore>,
    /// Resource locks.
    pub locks: LockManager,
    /// Policy gate.
    pub policy: PolicyGate,
    /// Idempotency cache.
    pub idempotency: IdempotencyCache,
    /// Tokens guarding bulk deletes.
    pub delete_guard: ConfirmationGuard<DeleteSignature>,
    /// Tokens guarding settings patches.
    pub settings_guard: ConfirmationGuard<SettingsSignature>,
    /// Metrics sink.
    pub metrics: Arc<dyn GatewayMetrics>,
    /// Audit sink.
    pub audit: Arc<dyn GatewayAuditSink>,
    /// Recent lifecycle events.
    pub events: EventStream,
    /// Time source.
    pub clock: SharedClock,
}

impl GatewayServices {
    /// Builds services from `config` with in-memory jobs and metrics and no
    /// audit output.
    #[must_use]
    pub fn new(config: &GatewayConfig, clock: SharedClock) -> Self {
        let ttl = config.confirmation.ttl();
        let max_pending = config.confirmation.max_pending;
        Self {
            settings: GatewaySettings::from_config(config),
            ledger: ChangesetLedger::new(&config.ledger.root, Arc::clone(&clock), config.ledger.max_list_limit),
            jobs: Arc::new(InMemoryJobStore::new(Arc::clone(&clock))),
            locks: LockManager::new(Arc::clone(&clock)),
            policy: PolicyGate::new(config.policy.version.clone(), config.policy.safe_mode),
            idempotency: IdempotencyCache::new(config.idempotency.max_entries),
            delete_guard: ConfirmationGuard::new(ttl, max_pending, Arc::clone(&clock)),
            settings_guard: ConfirmationGuard::new(ttl, max_pending, Arc::clone(&clock)),
            metrics: Arc::new(InMemoryMetrics::new()),
            audit: Arc::new(NoopAuditSink),
            events: EventStream::new(DEFAULT_EVENT_CAPACITY, Arc::clone(&clock)),
            clock,
        }
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn GatewayAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Replaces the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn GatewayMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Replaces the job store.
    #[must_use]
    pub fn with_jobs(mut self, jobs: Arc<dyn JobStore>) -> Self {
        self.jobs = jobs;
        self
    }
}

// ============================================================================
// SECTION: Tool Context
// ============================================================================

/// Borrowed view passed to every handler call.
#[derive(Clone, Copy)]
pub struct ToolContext<'a> {
    /// Frozen tool registry.
    pub registry: &'a ToolRegistry,
    /// Gateway services.
    pub services: &'a GatewayServices,
}
