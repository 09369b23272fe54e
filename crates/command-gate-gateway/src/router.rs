// crates/command-gate-gateway/src/router.rs
// ============================================================================
// Module: Command Router
// Description: Request pipeline wrapped around registry dispatch.
// Purpose: Sequence protocol, schema, idempotency, policy, lock, job, and ledger steps.
// Dependencies: command-gate-core, serde_json
// ============================================================================

//! ## Overview
//! [`CommandRouter`] owns the frozen [`ToolRegistry`] and the
//! [`GatewayServices`] and turns every decoded request into exactly one
//! [`ResponseEnvelope`]. Rejections before dispatch are single-diagnostic
//! error responses; nothing here returns a Rust error to the caller.
//!
//! ## Invariants
//! - Write locks are held for the rest of the pipeline and released on every path.
//! - Error responses are never cached for idempotent replay.
//! - Each call emits one audit event, replays included.
//! - Every routed request ends with a 100% progress event
//!   (`request.completed`, `request.failed`, or `request.idempotent_replay`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use command_gate_core::Diagnostic;
use command_gate_core::JobId;
use command_gate_core::RequestEnvelope;
use command_gate_core::ResponseEnvelope;
use command_gate_core::ResponseStatus;
use command_gate_core::Timestamp;
use command_gate_core::codes;
use serde_json::Value;

use crate::audit::GatewayAuditEvent;
use crate::audit::GatewayAuditEventParams;
use crate::context::GatewayServices;
use crate::context::ToolContext;
use crate::events::INVALID_REQUEST_ID;
use crate::idempotency::IdempotencyKey;
use crate::idempotency::IdempotencyLookup;
use crate::jobs::JobStatus;
use crate::ledger::NewChangeset;
use crate::locks::LockError;
use crate::locks::LockGuard;
use crate::metrics::MetricEvent;
use crate::registry::ToolRegistry;

// ============================================================================
// SECTION: Router
// ============================================================================

/// Routes requests through the full gateway pipeline.
pub struct CommandRouter {
    /// Frozen tool table.
    registry: ToolRegistry,
    /// Shared gateway state.
    services: GatewayServices,
}

impl CommandRouter {
    /// Creates a router over `registry` and `services`.
    #[must_use]
    pub const fn new(registry: ToolRegistry, services: GatewayServices) -> Self {
        Self {
            registry,
            services,
        }
    }

    /// Returns the tool registry.
    #[must_use]
    pub const fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Returns the gateway services.
    #[must_use]
    pub const fn services(&self) -> &GatewayServices {
        &self.services
    }

    /// Parses and routes a raw JSON request.
    #[must_use]
    pub fn handle_json(&self, raw: &Value) -> ResponseEnvelope {
        let start = self.services.clock.now();
        match RequestEnvelope::from_value(raw, &self.services.settings.protocol_version) {
            Ok(request) => self.handle_from(&request, start),
            Err(err) => {
                let request_id = raw.get("request_id").and_then(Value::as_str).unwrap_or_default();
                let diagnostic = err.to_diagnostic();
                let event_request_id = if request_id.is_empty() { INVALID_REQUEST_ID } else { request_id };
                self.services.events.diagnostic(event_request_id, &diagnostic);
                self.services.events.progress(event_request_id, 100, "request.failed");
                let response = ResponseEnvelope::rejected(
                    &self.services.settings.protocol_version,
                    request_id,
                    diagnostic,
                    self.elapsed_ms(start),
                );
                self.observe(None, &response);
                response
            }
        }
    }

    /// Routes a decoded request.
    #[must_use]
    pub fn handle(&self, request: &RequestEnvelope) -> ResponseEnvelope {
        self.handle_from(request, self.services.clock.now())
    }

    /// Runs the pipeline and records the outcome.
    fn handle_from(&self, request: &RequestEnvelope, start: Timestamp) -> ResponseEnvelope {
        let response = self.run(request, start);
        self.observe(Some(request), &response);
        response
    }

    // ------------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------------

    /// Executes every pipeline step after parsing.
    fn run(&self, request: &RequestEnvelope, start: Timestamp) -> ResponseEnvelope {
        let services = &self.services;
        let settings = &services.settings;
        let request_id = request.request_id.as_str();
        services.events.progress(request_id, 5, "request.parsed");
        services.events.log(request_id, "info", &format!("Received request for tool {}", request.tool));

        if !request.protocol.starts_with(&settings.protocol_prefix) {
            return self.reject(
                request,
                Diagnostic::error(codes::PROTOCOL_UNSUPPORTED, "Unsupported protocol version.")
                    .with_detail(format!("protocol={}", request.protocol))
                    .with_suggestion(format!("Use protocol {}.x.", settings.protocol_prefix)),
                start,
            );
        }

        services.events.progress(request_id, 10, "request.protocol_validated");

        if let Err(diagnostic) = self.registry.validate(request) {
            if diagnostic.code == codes::SCHEMA_INVALID_PARAMS {
                services.metrics.record_event(MetricEvent::SchemaValidationFailure);
            }
            return self.reject(request, diagnostic, start);
        }
        services.events.progress(request_id, 20, "request.schema_validated");

        if let Err(diagnostic) = self.check_cancellation(request) {
            services.metrics.record_event(MetricEvent::CancelRejected);
            return self.reject(request, diagnostic, start);
        }

        if let Some(timeout_ms) = request.context.timeout_ms.filter(|timeout_ms| *timeout_ms <= 0) {
            return self.reject(
                request,
                Diagnostic::error(codes::SCHEMA_INVALID_PARAMS, "timeout_ms must be greater than zero.")
                    .with_detail(format!("timeout_ms={timeout_ms}")),
                start,
            );
        }

        let key = match IdempotencyKey::for_request(request) {
            Ok(key) => key,
            Err(err) => return self.reject(request, err.to_diagnostic(), start),
        };
        if let Some(key) = &key {
            match services.idempotency.lookup(key) {
                Ok(IdempotencyLookup::Miss) => {}
                Ok(IdempotencyLookup::Replay(response)) => {
                    services.events.log(request_id, "info", "Returned cached idempotent response.");
                    services.events.progress(request_id, 100, "request.idempotent_replay");
                    return *response;
                }
                Ok(IdempotencyLookup::Conflict(diagnostic)) => {
                    services.metrics.record_event(MetricEvent::IdempotencyConflict);
                    return self.reject(request, diagnostic, start);
                }
                Err(diagnostic) => return self.reject(request, diagnostic, start),
            }
        }

        let is_write = self.registry.is_write_tool(request.tool.as_str());
        if is_write {
            services.events.progress(request_id, 30, "request.write_preflight");
        }
        if let Err(diagnostic) = services.policy.preflight(request, is_write) {
            services.metrics.record_event(MetricEvent::PolicyDenied);
            return self.reject(request, diagnostic, start);
        }
        let _lock = match self.acquire_write_lock(request, is_write) {
            Ok(lock) => lock,
            Err(diagnostic) => return self.reject(request, diagnostic, start),
        };
        if is_write {
            services.events.progress(request_id, 45, "request.lock_acquired");
        }

        let job_id = if request.context.timeout_ms.is_some() || request.context.cancel_token.is_some() {
            match services.jobs.create().and_then(|job| services.jobs.update(&job.job_id, JobStatus::Running, 0)) {
                Ok(job) => {
                    services.events.job_status(request_id, &job);
                    Some(job.job_id)
                }
                Err(err) => return self.reject(request, err.to_diagnostic(), start),
            }
        } else {
            None
        };

        let ctx = ToolContext {
            registry: &self.registry,
            services,
        };
        services.events.progress(request_id, 55, "request.executing_tool");
        let mut result = match self.registry.execute(&ctx, request) {
            Ok(mut result) => {
                if result.status == ResponseStatus::Ok && result.has_error_diagnostic() {
                    result.status = ResponseStatus::Partial;
                }
                result
            }
            Err(result) => result.with_status(ResponseStatus::Error),
        };
        services.events.progress(request_id, 75, "request.tool_executed");

        let mut changeset_id = None;
        if is_write && !request.context.dry_run && result.status != ResponseStatus::Error {
            let schema_hash = self.registry.schema_hash().prefixed();
            let engine_version = request.context.engine_version.as_deref().unwrap_or(&settings.engine_version);
            let created = services.ledger.create(&NewChangeset {
                request,
                result: &result,
                policy_version: services.policy.version(),
                schema_hash: &schema_hash,
                engine_version,
            });
            match created {
                Ok(id) => {
                    services.metrics.record_event(MetricEvent::ChangesetCreated);
                    let path = services.ledger.root().join(id.as_str());
                    services.events.changeset_created(request_id, id.as_str(), &path.display().to_string());
                    changeset_id = Some(id);
                }
                Err(err) => {
                    let diagnostic = err.to_diagnostic();
                    services.events.diagnostic(request_id, &diagnostic);
                    result.status = ResponseStatus::Error;
                    result.push_diagnostic(diagnostic);
                }
            }
        }

        if let Some(timeout_ms) = request.context.timeout_ms {
            let elapsed_ms = self.elapsed_ms(start);
            if elapsed_ms > u64::try_from(timeout_ms).unwrap_or(u64::MAX) {
                let diagnostic = Diagnostic::warning(codes::JOB_TIMEOUT, "Execution exceeded timeout_ms.")
                    .with_detail(format!("timeout_ms={timeout_ms} duration_ms={elapsed_ms}"))
                    .with_suggestion("Increase timeout_ms or switch to asynchronous workflow.")
                    .retriable();
                services.events.diagnostic(request_id, &diagnostic);
                result.push_diagnostic(diagnostic);
                if result.status == ResponseStatus::Ok {
                    result.status = ResponseStatus::Partial;
                }
                services.metrics.record_event(MetricEvent::TimeoutExceeded);
            }
        }

        if let Some(job_id) = &job_id {
            let status = if result.status == ResponseStatus::Error { JobStatus::Failed } else { JobStatus::Succeeded };
            match services.jobs.finalize(job_id, status, result.result.clone(), result.diagnostics.clone()) {
                Ok(job) => services.events.job_status(request_id, &job),
                Err(err) => result.push_diagnostic(err.to_diagnostic()),
            }
            result.set_result_field("job_id", Value::String(job_id.as_str().to_string()));
        }

        services.policy.postflight(request, &result);
        services.events.progress(request_id, 88, "request.postflight");
        for resource in result.touched.iter() {
            services.events.artifact(request_id, resource, "touched_package");
        }
        services.events.log(
            request_id,
            "info",
            &format!("Completed request for tool {} with status {}", request.tool, result.status.as_str()),
        );
        services.events.progress(request_id, 100, "request.completed");

        let response = ResponseEnvelope::from_result(
            &settings.protocol_version,
            request.request_id.as_str(),
            result,
            changeset_id,
            self.elapsed_ms(start),
        );
        if let Some(key) = key
            && response.status != ResponseStatus::Error
        {
            services.idempotency.store(key, response.clone());
        }
        response
    }

    /// Rejects requests whose `cancel_token` names a canceled job.
    fn check_cancellation(&self, request: &RequestEnvelope) -> Result<(), Diagnostic> {
        let Some(token) = request.context.cancel_token.as_deref() else {
            return Ok(());
        };
        match self.services.jobs.get(&JobId::new(token)) {
            Ok(job) if job.status == JobStatus::Canceled => Err(Diagnostic::error(
                codes::JOB_CANCELED,
                "Request was canceled before execution.",
            )
            .with_detail(format!("cancel_token={token}"))
            .with_suggestion("Use a new cancel_token or clear cancellation state and retry.")),
            _ => Ok(()),
        }
    }

    /// Takes the resource lock for write tools.
    fn acquire_write_lock(&self, request: &RequestEnvelope, is_write: bool) -> Result<Option<LockGuard<'_>>, Diagnostic> {
        if !is_write {
            return Ok(None);
        }
        let key = lock_key(request);
        let lease = self.services.settings.lock_lease;
        match self.services.locks.lock(&key, request.request_id.as_str(), lease) {
            Ok(guard) => Ok(Some(guard)),
            Err(err) => {
                if matches!(err, LockError::Conflict { .. }) {
                    self.services.metrics.record_event(MetricEvent::LockConflict);
                }
                Err(err.to_diagnostic())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Response helpers
    // ------------------------------------------------------------------------

    /// Builds a single-diagnostic error response.
    fn reject(&self, request: &RequestEnvelope, diagnostic: Diagnostic, start: Timestamp) -> ResponseEnvelope {
        self.services.events.diagnostic(request.request_id.as_str(), &diagnostic);
        self.services.events.progress(request.request_id.as_str(), 100, "request.failed");
        ResponseEnvelope::rejected(
            &self.services.settings.protocol_version,
            request.request_id.as_str(),
            diagnostic,
            self.elapsed_ms(start),
        )
    }

    /// Milliseconds elapsed on the gateway clock since `start`.
    fn elapsed_ms(&self, start: Timestamp) -> u64 {
        duration_ms(self.services.clock.now().duration_since(start))
    }

    /// Emits the audit event and per-tool metrics.
    fn observe(&self, request: Option<&RequestEnvelope>, response: &ResponseEnvelope) {
        let services = &self.services;
        let event = GatewayAuditEvent::new(GatewayAuditEventParams {
            timestamp: services.clock.now(),
            request_id: response.request_id.clone(),
            session_id: request.map(|request| request.session_id.as_str().to_string()),
            tool: request.map(|request| request.tool.as_str().to_string()),
            status: response.status,
            duration_ms: response.metrics.duration_ms,
            changeset_id: response.changeset_id.clone(),
            error_codes: response.diagnostics.error_codes(),
            idempotent_replay: response.idempotent_replay,
        });
        services.audit.record(&event);
        if let Some(request) = request {
            services.metrics.record_tool(
                request.tool.as_str(),
                response.status,
                response.idempotent_replay,
                response.metrics.duration_ms,
            );
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Top-level params consulted for a lock key after `target.path`, in order.
const LOCK_KEY_FIELDS: [&str; 6] =
    ["object_path", "package_path", "dest_package_path", "new_package_path", "source_object_path", "path"];

/// Resource lock key for a write request.
///
/// Empty candidates are skipped; the first non-empty string of
/// `object_paths` is the last candidate before `tool:<name>`.
fn lock_key(request: &RequestEnvelope) -> String {
    let params = &request.params;
    params
        .get("target")
        .and_then(|target| target.get("path"))
        .and_then(non_empty)
        .or_else(|| LOCK_KEY_FIELDS.iter().find_map(|field| params.get(*field).and_then(non_empty)))
        .or_else(|| params.get("object_paths").and_then(Value::as_array)?.iter().find_map(non_empty))
        .map_or_else(|| format!("tool:{}", request.tool), normalize_lock_path)
}

/// Returns `value` as a non-empty string.
fn non_empty(value: &Value) -> Option<&str> {
    value.as_str().filter(|text| !text.is_empty())
}

/// Reduces an object path (`/Game/A/B.B:Sub`) to its package (`/Game/A/B`).
fn normalize_lock_path(path: &str) -> String {
    match path.split_once(['.', ':']) {
        Some((package, _)) if !package.is_empty() => package.to_string(),
        _ => path.to_string(),
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
