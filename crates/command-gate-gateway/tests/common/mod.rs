// crates/command-gate-gateway/tests/common/mod.rs
// ============================================================================
// Module: Common Gateway Fixtures
// Description: Shared harness and demo tools for gateway integration tests.
// Purpose: Build routers over a temp ledger, a manual clock, and recording sinks.
// Dependencies: command-gate-core, command-gate-config, command-gate-gateway
// ============================================================================

//! ## Overview
//! [`Harness`] wires a [`CommandRouter`] with the built-in tools plus a small
//! set of demo host tools: a read-only echo, a write rename that touches its
//! `path`, a confirm-gated bulk delete, a slow write that advances the manual
//! clock, and two tools that misreport their outcome.

#![allow(
    dead_code,
    clippy::panic,
    reason = "Test helpers are selectively used across suites and abort on fixture failure."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use command_gate_config::GatewayConfig;
use command_gate_core::Diagnostic;
use command_gate_core::ExecutionResult;
use command_gate_core::ManualClock;
use command_gate_core::RequestEnvelope;
use command_gate_core::ResponseEnvelope;
use command_gate_core::Timestamp;
use command_gate_gateway::CommandRouter;
use command_gate_gateway::ConfirmDecision;
use command_gate_gateway::GatewayAuditEvent;
use command_gate_gateway::GatewayAuditSink;
use command_gate_gateway::GatewayServices;
use command_gate_gateway::HandlerOutcome;
use command_gate_gateway::InMemoryMetrics;
use command_gate_gateway::SchemaBundle;
use command_gate_gateway::ToolContext;
use command_gate_gateway::ToolRegistryBuilder;
use command_gate_gateway::ToolSpec;
use command_gate_gateway::confirm_flow::delete_gate;
use command_gate_gateway::register_builtin_tools;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result type for integration tests.
pub type TestResult = Result<(), String>;

/// Fixed start instant of the harness clock.
pub const START_MILLIS: i64 = 1_700_000_000_000;

/// Audit sink that keeps every event in memory.
#[derive(Default)]
pub struct RecordingAudit {
    /// Recorded events.
    events: Mutex<Vec<GatewayAuditEvent>>,
}

impl RecordingAudit {
    /// Returns a copy of the recorded events.
    pub fn events(&self) -> Vec<GatewayAuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl GatewayAuditSink for RecordingAudit {
    fn record(&self, event: &GatewayAuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Router plus handles onto its observable state.
pub struct Harness {
    /// Ledger directory owner.
    pub dir: TempDir,
    /// Gateway clock.
    pub clock: Arc<ManualClock>,
    /// Metrics sink shared with the router.
    pub metrics: Arc<InMemoryMetrics>,
    /// Audit sink shared with the router.
    pub audit: Arc<RecordingAudit>,
    /// Router under test.
    pub router: CommandRouter,
}

impl Harness {
    /// Builds a harness with default configuration.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Builds a harness after letting `adjust` edit the configuration.
    pub fn with_config(adjust: impl FnOnce(&mut GatewayConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let mut config = GatewayConfig::default();
        config.ledger.root = dir.path().join("changesets").display().to_string();
        adjust(&mut config);

        let clock = Arc::new(ManualClock::new(Timestamp::from_unix_millis(START_MILLIS)));
        let metrics = Arc::new(InMemoryMetrics::new());
        let audit = Arc::new(RecordingAudit::default());
        let services = GatewayServices::new(&config, clock.clone())
            .with_metrics(metrics.clone())
            .with_audit(audit.clone());

        let mut builder = ToolRegistryBuilder::new(SchemaBundle::empty());
        register_builtin_tools(&mut builder);
        register_demo_tools(&mut builder, &clock);
        let registry = builder.build().unwrap_or_else(|err| panic!("registry: {err}"));

        Self {
            dir,
            clock,
            metrics,
            audit,
            router: CommandRouter::new(registry, services),
        }
    }

    /// Routes a raw JSON request.
    pub fn call(&self, request: &Value) -> ResponseEnvelope {
        self.router.handle_json(request)
    }

    /// Routes `tool` with `params` and default context.
    pub fn call_tool(&self, request_id: &str, tool: &str, params: Value) -> ResponseEnvelope {
        self.call(&request(request_id, tool, params))
    }
}

// ============================================================================
// SECTION: Request Builders
// ============================================================================

/// Builds a raw request without context.
pub fn request(request_id: &str, tool: &str, params: Value) -> Value {
    json!({
        "protocol": "command-gate/1.0",
        "request_id": request_id,
        "session_id": "session-a",
        "tool": tool,
        "params": params,
    })
}

/// Builds a raw request carrying `context`.
pub fn request_with_context(request_id: &str, tool: &str, params: Value, context: Value) -> Value {
    let mut raw = request(request_id, tool, params);
    raw["context"] = context;
    raw
}

/// Returns the error codes of a response.
pub fn error_codes(response: &ResponseEnvelope) -> Vec<String> {
    response.diagnostics.error_codes()
}

/// Fails with `message` unless `condition` holds.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition { Ok(()) } else { Err(message.into()) }
}

// ============================================================================
// SECTION: Demo Tools
// ============================================================================

/// Registers the demo host tools.
pub fn register_demo_tools(builder: &mut ToolRegistryBuilder, clock: &Arc<ManualClock>) {
    let slow_clock = Arc::clone(clock);
    builder
        .register(ToolSpec::new("demo.echo", demo_echo).params_schema(json!({
            "type": "object",
            "required": ["msg"],
            "properties": {"msg": {"type": "string", "minLength": 1}}
        })))
        .register(ToolSpec::new("asset.rename", asset_rename).write().params_schema(json!({
            "type": "object",
            "required": ["path", "new_name"],
            "properties": {
                "path": {"type": "string", "minLength": 1},
                "new_name": {"type": "string", "minLength": 1}
            }
        })))
        .register(ToolSpec::new("asset.delete", asset_delete).write().params_schema(json!({
            "type": "object",
            "required": ["object_paths", "mode"],
            "properties": {
                "object_paths": {"type": "array", "minItems": 1, "items": {"type": "string"}},
                "mode": {"type": "string", "enum": ["preview", "apply"]},
                "confirm_token": {"type": "string"},
                "fail_if_referenced": {"type": "boolean"}
            }
        })))
        .register(
            ToolSpec::new("scene.bake", move |_: &ToolContext<'_>, request: &RequestEnvelope| -> HandlerOutcome {
                let millis = request.params.get("work_ms").and_then(Value::as_u64).unwrap_or(0);
                slow_clock.advance(Duration::from_millis(millis));
                Ok(ExecutionResult::ok(json!({"baked": true})).touching("/Game/Maps/Main"))
            })
            .write(),
        )
        .register(ToolSpec::new("demo.fail", |_: &ToolContext<'_>, _: &RequestEnvelope| -> HandlerOutcome {
            Err(ExecutionResult::failure(Diagnostic::error("DEMO_FAILED", "Demo tool failed.")))
        }))
        .register(ToolSpec::new("demo.mixed", |_: &ToolContext<'_>, _: &RequestEnvelope| -> HandlerOutcome {
            let mut result = ExecutionResult::ok(json!({"done": true}));
            result.push_diagnostic(Diagnostic::error("DEMO_CAVEAT", "One item was skipped."));
            Ok(result)
        }));
}

/// `demo.echo`
fn demo_echo(_: &ToolContext<'_>, request: &RequestEnvelope) -> HandlerOutcome {
    Ok(ExecutionResult::ok(json!({"msg": request.params["msg"].clone()})))
}

/// `asset.rename`
fn asset_rename(_: &ToolContext<'_>, request: &RequestEnvelope) -> HandlerOutcome {
    let path = request.param_str("path").unwrap_or_default().to_string();
    let new_name = request.param_str("new_name").unwrap_or_default();
    Ok(ExecutionResult::ok(json!({"renamed": path, "new_name": new_name})).touching(path))
}

/// `asset.delete`
fn asset_delete(ctx: &ToolContext<'_>, request: &RequestEnvelope) -> HandlerOutcome {
    let targets: Vec<String> = request.params["object_paths"]
        .as_array()
        .map(|paths| paths.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    let decision = delete_gate(
        &ctx.services.delete_guard,
        request.param_str("mode").unwrap_or_default(),
        request.param_str("confirm_token"),
        targets.iter().map(String::as_str),
        request.param_bool("fail_if_referenced", true),
    )
    .map_err(ExecutionResult::failure)?;
    match decision {
        ConfirmDecision::Preview {
            token,
        } => Ok(ExecutionResult::ok(json!({"confirm_token": token.as_str(), "targets": targets}))),
        ConfirmDecision::Confirmed => {
            let mut result = ExecutionResult::ok(json!({"deleted": targets}));
            for target in &targets {
                result.touched.insert(target.clone());
            }
            Ok(result)
        }
    }
}
