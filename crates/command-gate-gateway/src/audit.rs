// crates/command-gate-gateway/src/audit.rs
// ============================================================================
// Module: Gateway Audit Logging
// Description: Structured audit events for routed tool calls.
// Purpose: Emit one JSON line per request without a hard logging dependency.
// Dependencies: command-gate-config, command-gate-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Every request that reaches the router yields exactly one
//! [`GatewayAuditEvent`]. Events carry identity, outcome, and timing only;
//! params and results are never logged. Sinks are selected by the `[audit]`
//! configuration section.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use command_gate_config::AuditConfig;
use command_gate_config::AuditSinkKind;
use command_gate_core::ChangesetId;
use command_gate_core::ResponseStatus;
use command_gate_core::Timestamp;
use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Audit label for routed tool calls.
pub const TOOL_CALL_EVENT: &str = "tool_call";

/// Tool call audit payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i128,
    /// Request identifier (empty when unreadable).
    pub request_id: String,
    /// Session identifier when parsed.
    pub session_id: Option<String>,
    /// Tool name when parsed.
    pub tool: Option<String>,
    /// Final status.
    pub status: ResponseStatus,
    /// Pipeline duration.
    pub duration_ms: u64,
    /// Changeset recorded for the call.
    pub changeset_id: Option<ChangesetId>,
    /// Codes of error diagnostics.
    pub error_codes: Vec<String>,
    /// True when served from the idempotency cache.
    pub idempotent_replay: bool,
}

/// Inputs required to construct an audit event.
pub struct GatewayAuditEventParams {
    /// Emission instant.
    pub timestamp: Timestamp,
    /// Request identifier.
    pub request_id: String,
    /// Session identifier.
    pub session_id: Option<String>,
    /// Tool name.
    pub tool: Option<String>,
    /// Final status.
    pub status: ResponseStatus,
    /// Pipeline duration.
    pub duration_ms: u64,
    /// Changeset recorded for the call.
    pub changeset_id: Option<ChangesetId>,
    /// Codes of error diagnostics.
    pub error_codes: Vec<String>,
    /// Replay flag.
    pub idempotent_replay: bool,
}

impl GatewayAuditEvent {
    /// Creates a tool call audit event.
    #[must_use]
    pub fn new(params: GatewayAuditEventParams) -> Self {
        Self {
            event: TOOL_CALL_EVENT,
            timestamp_ms: params.timestamp.unix_millis(),
            request_id: params.request_id,
            session_id: params.session_id,
            tool: params.tool,
            status: params.status,
            duration_ms: params.duration_ms,
            changeset_id: params.changeset_id,
            error_codes: params.error_codes,
            idempotent_replay: params.idempotent_replay,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for gateway events.
pub trait GatewayAuditSink: Send + Sync {
    /// Records an audit event.
    fn record(&self, event: &GatewayAuditEvent);
}

/// Audit sink that writes JSON lines to stderr.
pub struct StderrAuditSink;

impl GatewayAuditSink for StderrAuditSink {
    fn record(&self, event: &GatewayAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle guarded for concurrent writes.
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Opens a file-backed audit sink.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl GatewayAuditSink for FileAuditSink {
    fn record(&self, event: &GatewayAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl GatewayAuditSink for NoopAuditSink {
    fn record(&self, _event: &GatewayAuditEvent) {}
}

/// Builds the sink selected by `config`.
///
/// # Errors
///
/// Returns an error when a file sink cannot be opened or has no path.
pub fn sink_from_config(config: &AuditConfig) -> io::Result<Arc<dyn GatewayAuditSink>> {
    Ok(match config.sink {
        AuditSinkKind::None => Arc::new(NoopAuditSink),
        AuditSinkKind::Stderr => Arc::new(StderrAuditSink),
        AuditSinkKind::File => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "audit.path is required"))?;
            Arc::new(FileAuditSink::new(Path::new(path))?)
        }
    })
}
