// crates/command-gate-gateway/src/builtin/tests.rs
// ============================================================================
// Module: Built-in Tool Tests
// Description: Unit tests for discovery, changeset, and job handlers.
// Purpose: Ensure built-ins read gateway state and map failures to diagnostics.
// Dependencies: command-gate-gateway, tempfile
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use std::sync::Arc;

use command_gate_config::GatewayConfig;
use command_gate_core::ExecutionResult;
use command_gate_core::ManualClock;
use command_gate_core::RequestEnvelope;
use command_gate_core::ResponseStatus;
use command_gate_core::Timestamp;
use command_gate_core::codes;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

use super::parse_cursor;
use super::register_builtin_tools;
use crate::bundle::SchemaBundle;
use crate::context::GatewayServices;
use crate::context::ToolContext;
use crate::ledger::NewChangeset;
use crate::registry::ToolRegistry;
use crate::registry::ToolRegistryBuilder;

struct Fixture {
    _dir: TempDir,
    registry: ToolRegistry,
    services: GatewayServices,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GatewayConfig::default();
        config.ledger.root = dir.path().join("changesets").display().to_string();
        let clock = Arc::new(ManualClock::new(Timestamp::from_unix_millis(1_700_000_000_000)));
        let services = GatewayServices::new(&config, clock);
        let mut builder = ToolRegistryBuilder::new(SchemaBundle::empty());
        register_builtin_tools(&mut builder);
        Self {
            _dir: dir,
            registry: builder.build().unwrap(),
            services,
        }
    }

    fn call(&self, tool: &str, params: Value) -> Result<ExecutionResult, ExecutionResult> {
        let ctx = ToolContext {
            registry: &self.registry,
            services: &self.services,
        };
        let request = RequestEnvelope::new("command-gate/1.0", "req-1", tool, params);
        self.registry.validate(&request).map_err(ExecutionResult::failure)?;
        self.registry.execute(&ctx, &request)
    }

    fn seed_changeset(&self, tool: &str) -> String {
        let request = RequestEnvelope::new("command-gate/1.0", "req-seed", tool, json!({}));
        let result = ExecutionResult::ok(json!({})).touching("pkg/A");
        let id = self
            .services
            .ledger
            .create(&NewChangeset {
                request: &request,
                result: &result,
                policy_version: "policy-1",
                schema_hash: "sha256:00",
                engine_version: "unknown",
            })
            .unwrap();
        id.as_str().to_string()
    }
}

#[test]
fn tools_list_reports_hash_and_capabilities() {
    let fixture = Fixture::new();
    let result = fixture.call("tools.list", json!({"include_schemas": false})).unwrap();
    let hash = result.result["schema_hash"].as_str().unwrap();
    assert!(hash.starts_with("sha256:"));
    assert_eq!(result.result["protocol_version"], json!("command-gate/1.0"));
    assert_eq!(result.result["capabilities"][0], json!("core_tools_v1"));
    assert!(result.result["capabilities"].as_array().unwrap().contains(&json!("event_stream_v1")));
    let names: Vec<&str> =
        result.result["tools"].as_array().unwrap().iter().map(|tool| tool["name"].as_str().unwrap()).collect();
    assert_eq!(names.first(), Some(&"changeset.get"));
    assert!(result.result["tools"][0].get("params_schema").is_none());
}

#[test]
fn tools_list_filters_by_domain() {
    let fixture = Fixture::new();
    let result = fixture.call("tools.list", json!({"domain": "JOB"})).unwrap();
    let tools = result.result["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 2);
    assert!(tools[0]["params_schema"].is_object());
}

#[test]
fn system_health_reports_registry_and_policy() {
    let fixture = Fixture::new();
    let result = fixture.call("system.health", json!({})).unwrap();
    assert_eq!(result.result["status"], json!("ok"));
    assert_eq!(result.result["registered_tool_count"], json!(8));
    assert_eq!(result.result["policy_version"], json!("policy-1"));
    assert_eq!(result.result["safe_mode"], json!(false));
    assert_eq!(result.result["dry_run_request"], json!(false));
    assert_eq!(result.result["events"]["supported"], json!(true));
    assert_eq!(result.result["events"]["capacity"], json!(256));
    assert_eq!(result.result["events"]["total_emitted_event_count"], json!(0));
}

#[test]
fn system_health_includes_recent_events() {
    let fixture = Fixture::new();
    for step in 0 .. 10_u8 {
        fixture.services.events.progress("req-0", step, "phase");
    }
    let result = fixture.call("system.health", json!({})).unwrap();
    let events = &result.result["events"];
    assert_eq!(events["total_emitted_event_count"], json!(10));
    assert_eq!(events["buffered_event_count"], json!(10));
    let recent = events["recent_events"].as_array().unwrap();
    assert_eq!(recent.len(), 8);
    assert_eq!(recent[7]["event_id"], json!("evt-10"));
}

#[test]
fn changeset_list_pages_with_string_cursor() {
    let fixture = Fixture::new();
    fixture.seed_changeset("asset.rename");
    fixture.seed_changeset("asset.rename");
    let first = fixture.call("changeset.list", json!({"limit": 1})).unwrap();
    assert_eq!(first.result["changesets"].as_array().unwrap().len(), 1);
    assert_eq!(first.result["next_cursor"], json!("1"));
    let second = fixture.call("changeset.list", json!({"limit": 1, "cursor": "1"})).unwrap();
    assert_eq!(second.result["changesets"].as_array().unwrap().len(), 1);
    assert!(second.result.get("next_cursor").is_none());
    assert_ne!(first.result["changesets"][0]["changeset_id"], second.result["changesets"][0]["changeset_id"]);
}

#[test]
fn changeset_get_and_preview_round_trip_through_ledger() {
    let fixture = Fixture::new();
    let id = fixture.seed_changeset("asset.rename");
    let record = fixture.call("changeset.get", json!({"changeset_id": id})).unwrap();
    assert_eq!(record.result["touched_packages"], json!(["pkg/A"]));
    assert_eq!(record.result["logs"], json!([]));
    assert!(record.result.get("snapshots").is_none());

    let preview = fixture.call("changeset.rollback.preview", json!({"changeset_id": id})).unwrap();
    assert_eq!(preview.result["mode"], json!("local_snapshot"));
    assert_eq!(preview.result["impact"]["missing_snapshots"], json!(["pkg/A"]));
}

#[test]
fn rollback_apply_without_force_counts_failure() {
    let fixture = Fixture::new();
    let id = fixture.seed_changeset("asset.rename");
    let failure = fixture.call("changeset.rollback.apply", json!({"changeset_id": id})).unwrap_err();
    assert_eq!(failure.status, ResponseStatus::Error);
    assert_eq!(failure.diagnostics[0].code, codes::CHANGESET_ROLLBACK_FAILED);
    let snapshot = fixture.services.metrics.snapshot();
    assert_eq!(snapshot["events"]["rollback_failures"], json!(1));
}

#[test]
fn changeset_get_rejects_malformed_id() {
    let fixture = Fixture::new();
    let failure = fixture.call("changeset.get", json!({"changeset_id": "../outside"})).unwrap_err();
    assert_eq!(failure.diagnostics[0].code, codes::CHANGESET_NOT_FOUND);
}

#[test]
fn missing_required_id_fails_schema_validation() {
    let fixture = Fixture::new();
    let failure = fixture.call("changeset.get", json!({})).unwrap_err();
    assert_eq!(failure.diagnostics[0].code, codes::SCHEMA_INVALID_PARAMS);
}

#[test]
fn job_tools_read_and_cancel_store_records() {
    let fixture = Fixture::new();
    let job = fixture.services.jobs.create().unwrap();
    let fetched = fixture.call("job.get", json!({"job_id": job.job_id.as_str()})).unwrap();
    assert_eq!(fetched.result["status"], json!("queued"));
    let canceled = fixture.call("job.cancel", json!({"job_id": job.job_id.as_str()})).unwrap();
    assert_eq!(canceled.result["canceled"], json!(true));
    assert_eq!(canceled.result["status"], json!("canceled"));
    let emitted = fixture.services.events.recent(1);
    assert_eq!(emitted[0].payload["status"], json!("canceled"));
    assert_eq!(emitted[0].request_id, "req-1");
}

#[test]
fn job_cancel_unknown_id_is_not_found() {
    let fixture = Fixture::new();
    let failure = fixture.call("job.cancel", json!({"job_id": "job-missing"})).unwrap_err();
    assert_eq!(failure.diagnostics[0].code, codes::JOB_NOT_FOUND);
    assert_eq!(failure.diagnostics[0].suggestion, "Call job.get with a valid job_id.");
}

#[test]
fn cursor_accepts_integers_and_strings() {
    assert_eq!(parse_cursor(None), 0);
    assert_eq!(parse_cursor(Some(&json!(3))), 3);
    assert_eq!(parse_cursor(Some(&json!("7"))), 7);
    assert_eq!(parse_cursor(Some(&json!(-4))), 0);
    assert_eq!(parse_cursor(Some(&json!("bogus"))), 0);
}
