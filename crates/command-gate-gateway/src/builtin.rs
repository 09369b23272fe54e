// crates/command-gate-gateway/src/builtin.rs
// ============================================================================
// Module: Built-in Tools
// Description: Discovery, health, changeset, and job tools shipped with the gateway.
// Purpose: Expose gateway state through the same schema-checked dispatch as host tools.
// Dependencies: command-gate-core, serde_json
// ============================================================================

//! ## Overview
//! Every built-in is read-only from the ledger's point of view (rollback
//! apply writes its own log line rather than a new changeset) and carries an
//! inline params schema. Handlers re-check required ids after schema
//! validation because callers may execute without validating.

// ============================================================================
// SECTION: Imports
// ============================================================================

use command_gate_core::Diagnostic;
use command_gate_core::ExecutionResult;
use command_gate_core::JobId;
use command_gate_core::RequestEnvelope;
use command_gate_core::codes;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::capabilities::capabilities;
use crate::context::ToolContext;
use crate::events::HEALTH_RECENT_EVENTS;
use crate::jobs::JobStatus;
use crate::ledger::LOCAL_SNAPSHOT_MODE;
use crate::ledger::ListQuery;
use crate::metrics::MetricEvent;
use crate::registry::HandlerOutcome;
use crate::registry::ToolRegistryBuilder;
use crate::registry::ToolSpec;

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Registers all built-in tools on `builder`.
pub fn register_builtin_tools(builder: &mut ToolRegistryBuilder) {
    builder
        .register(ToolSpec::new("tools.list", tools_list).params_schema(json!({
            "type": "object",
            "properties": {
                "include_schemas": {"type": "boolean"},
                "domain": {"type": "string"}
            }
        })))
        .register(ToolSpec::new("system.health", system_health).params_schema(json!({"type": "object"})))
        .register(ToolSpec::new("changeset.list", changeset_list).params_schema(json!({
            "type": "object",
            "properties": {
                "limit": {"type": "integer"},
                "cursor": {},
                "status_in": {"type": "array", "items": {"type": "string"}},
                "tool_glob": {"type": "string"},
                "session_id": {"type": "string"}
            }
        })))
        .register(ToolSpec::new("changeset.get", changeset_get).params_schema(json!({
            "type": "object",
            "required": ["changeset_id"],
            "properties": {
                "changeset_id": {"type": "string", "minLength": 1},
                "include_logs": {"type": "boolean"},
                "include_snapshots": {"type": "boolean"}
            }
        })))
        .register(ToolSpec::new("changeset.rollback.preview", rollback_preview).params_schema(json!({
            "type": "object",
            "required": ["changeset_id"],
            "properties": {
                "changeset_id": {"type": "string", "minLength": 1},
                "mode": {"type": "string"}
            }
        })))
        .register(ToolSpec::new("changeset.rollback.apply", rollback_apply).params_schema(json!({
            "type": "object",
            "required": ["changeset_id"],
            "properties": {
                "changeset_id": {"type": "string", "minLength": 1},
                "mode": {"type": "string"},
                "force": {"type": "boolean"}
            }
        })))
        .register(ToolSpec::new("job.get", job_get).params_schema(job_schema()))
        .register(ToolSpec::new("job.cancel", job_cancel).params_schema(job_schema()));
}

/// Params schema shared by the job tools.
fn job_schema() -> Value {
    json!({
        "type": "object",
        "required": ["job_id"],
        "properties": {"job_id": {"type": "string", "minLength": 1}}
    })
}

// ============================================================================
// SECTION: Discovery
// ============================================================================

/// `tools.list`
fn tools_list(ctx: &ToolContext<'_>, request: &RequestEnvelope) -> HandlerOutcome {
    let include_schemas = request.param_bool("include_schemas", true);
    let tools = ctx.registry.list_tools(include_schemas, request.param_str("domain"));
    Ok(ExecutionResult::ok(json!({
        "protocol_version": ctx.services.settings.protocol_version,
        "schema_hash": ctx.registry.schema_hash().prefixed(),
        "capabilities": capabilities(),
        "tools": to_json(&tools)?,
    })))
}

/// `system.health`
fn system_health(ctx: &ToolContext<'_>, request: &RequestEnvelope) -> HandlerOutcome {
    let services = ctx.services;
    Ok(ExecutionResult::ok(json!({
        "status": "ok",
        "protocol_version": services.settings.protocol_version,
        "schema_hash": ctx.registry.schema_hash().prefixed(),
        "policy_version": services.policy.version(),
        "safe_mode": services.policy.safe_mode(),
        "registered_tool_count": ctx.registry.len(),
        "dry_run_request": request.context.dry_run,
        "metrics": services.metrics.snapshot(),
        "events": services.events.snapshot(HEALTH_RECENT_EVENTS),
    })))
}

// ============================================================================
// SECTION: Changesets
// ============================================================================

/// `changeset.list`
fn changeset_list(ctx: &ToolContext<'_>, request: &RequestEnvelope) -> HandlerOutcome {
    let limit = request
        .params
        .get("limit")
        .and_then(Value::as_i64)
        .map_or(ctx.services.settings.default_list_limit, |limit| usize::try_from(limit.max(1)).unwrap_or(usize::MAX));
    let query = ListQuery {
        limit,
        cursor: parse_cursor(request.params.get("cursor")),
        status_in: request
            .params
            .get("status_in")
            .and_then(Value::as_array)
            .map(|statuses| statuses.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default(),
        tool_glob: request.param_str("tool_glob").map(str::to_string),
        session_id: request.param_str("session_id").map(str::to_string),
    };
    let page = ctx.services.ledger.list(&query).map_err(|err| ExecutionResult::failure(err.to_diagnostic()))?;
    let mut result = ExecutionResult::ok(json!({"changesets": to_json(&page.items)?}));
    if let Some(next) = page.next_cursor {
        result.set_result_field("next_cursor", Value::String(next.to_string()));
    }
    Ok(result)
}

/// `changeset.get`
fn changeset_get(ctx: &ToolContext<'_>, request: &RequestEnvelope) -> HandlerOutcome {
    let changeset_id = required_str(request, "changeset_id")?;
    let record = ctx
        .services
        .ledger
        .get(changeset_id, request.param_bool("include_logs", true), request.param_bool("include_snapshots", false))
        .map_err(|err| ExecutionResult::failure(err.to_diagnostic()))?;
    Ok(ExecutionResult::ok(to_json(&record)?))
}

/// `changeset.rollback.preview`
fn rollback_preview(ctx: &ToolContext<'_>, request: &RequestEnvelope) -> HandlerOutcome {
    let changeset_id = required_str(request, "changeset_id")?;
    let mode = request.param_str("mode").unwrap_or(LOCAL_SNAPSHOT_MODE);
    let preview = ctx
        .services
        .ledger
        .preview_rollback(changeset_id, mode)
        .map_err(|err| ExecutionResult::failure(err.to_diagnostic()))?;
    Ok(ExecutionResult::ok(to_json(&preview)?))
}

/// `changeset.rollback.apply`
fn rollback_apply(ctx: &ToolContext<'_>, request: &RequestEnvelope) -> HandlerOutcome {
    let changeset_id = required_str(request, "changeset_id")?;
    let mode = request.param_str("mode").unwrap_or(LOCAL_SNAPSHOT_MODE);
    let force = request.param_bool("force", false);
    let services = ctx.services;
    match services.ledger.apply_rollback(changeset_id, mode, force) {
        Ok(outcome) => {
            services.metrics.record_event(MetricEvent::RollbackSucceeded);
            let mut result = ExecutionResult::ok(json!({
                "applied": outcome.applied,
                "rollback_changeset_id": Value::Null,
                "touched_packages": outcome.touched_packages,
            }));
            for resource in &outcome.touched_packages {
                result.touched.insert(resource.clone());
            }
            Ok(result)
        }
        Err(err) => {
            services.metrics.record_event(MetricEvent::RollbackFailed);
            Err(ExecutionResult::failure(err.to_diagnostic()))
        }
    }
}

// ============================================================================
// SECTION: Jobs
// ============================================================================

/// `job.get`
fn job_get(ctx: &ToolContext<'_>, request: &RequestEnvelope) -> HandlerOutcome {
    let job_id = JobId::new(required_str(request, "job_id")?);
    let job = ctx.services.jobs.get(&job_id).map_err(|err| ExecutionResult::failure(err.to_diagnostic()))?;
    Ok(ExecutionResult::ok(to_json(&job)?))
}

/// `job.cancel`
fn job_cancel(ctx: &ToolContext<'_>, request: &RequestEnvelope) -> HandlerOutcome {
    let job_id = JobId::new(required_str(request, "job_id")?);
    let job = ctx.services.jobs.cancel(&job_id).map_err(|err| ExecutionResult::failure(err.to_diagnostic()))?;
    ctx.services.events.job_status(request.request_id.as_str(), &job);
    Ok(ExecutionResult::ok(json!({
        "job_id": job.job_id,
        "canceled": job.status == JobStatus::Canceled,
        "status": job.status.as_str(),
    })))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns a required, non-empty string param.
fn required_str<'a>(request: &'a RequestEnvelope, field: &str) -> Result<&'a str, ExecutionResult> {
    request.param_str(field).filter(|value| !value.is_empty()).ok_or_else(|| {
        ExecutionResult::failure(
            Diagnostic::error(codes::SCHEMA_INVALID_PARAMS, format!("{field} is required."))
                .with_suggestion("Call tools.list with include_schemas=true and retry with schema-compliant params."),
        )
    })
}

/// Reads a forward cursor given as an integer or a decimal string.
fn parse_cursor(raw: Option<&Value>) -> usize {
    let offset = match raw {
        Some(Value::Number(number)) => number.as_i64().unwrap_or(0),
        Some(Value::String(text)) => text.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    };
    usize::try_from(offset.max(0)).unwrap_or(usize::MAX)
}

/// Serializes a handler payload.
fn to_json<T: Serialize>(value: &T) -> Result<Value, ExecutionResult> {
    serde_json::to_value(value).map_err(|err| {
        ExecutionResult::failure(
            Diagnostic::error(codes::INTERNAL_EXCEPTION, "Failed to serialize tool result.").with_detail(err.to_string()),
        )
    })
}

#[cfg(test)]
mod tests;
