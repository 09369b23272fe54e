// crates/command-gate-gateway/src/bundle/tests.rs
// ============================================================================
// Module: Schema Bundle Tests
// Description: Unit tests for bundle parsing and preferred-path fallback.
// Purpose: Ensure bundle failures degrade to unchecked dispatch.
// Dependencies: command-gate-gateway, tempfile
// ============================================================================

//! ## Overview
//! Covers path preference, malformed files, skipped entries, and schemas
//! that fail the Draft 2020-12 compile check but still constrain dispatch.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use std::fs;

use command_gate_core::ExecutionResult;
use command_gate_core::RequestEnvelope;
use command_gate_core::codes;
use serde_json::Value;
use serde_json::json;

use super::BundleError;
use super::SchemaBundle;
use crate::context::ToolContext;
use crate::registry::HandlerOutcome;
use crate::registry::ToolRegistry;
use crate::registry::ToolRegistryBuilder;
use crate::registry::ToolSpec;

fn echo(_: &ToolContext<'_>, _: &RequestEnvelope) -> HandlerOutcome {
    Ok(ExecutionResult::ok(json!({})))
}

fn registry_over(bundle: &Value) -> ToolRegistry {
    let mut builder = ToolRegistryBuilder::new(SchemaBundle::from_value(bundle).unwrap());
    builder.register(ToolSpec::new("demo.echo", echo));
    builder.build().unwrap()
}

fn validate(registry: &ToolRegistry, params: Value) -> Result<(), String> {
    let request = RequestEnvelope::new("command-gate/1.0", "req-1", "demo.echo", params);
    registry.validate(&request).map_err(|diagnostic| {
        assert_eq!(diagnostic.code, codes::SCHEMA_INVALID_PARAMS);
        diagnostic.detail
    })
}

#[test]
fn preferred_path_wins_when_present() {
    let dir = tempfile::tempdir().unwrap();
    let v2 = dir.path().join("v2.json");
    let v1 = dir.path().join("v1.json");
    fs::write(&v2, r#"{"demo.echo": {"params_schema": {"type": "object"}}}"#).unwrap();
    fs::write(&v1, r#"{"demo.old": {}}"#).unwrap();
    let bundle = SchemaBundle::load_preferred(&[v2.clone(), v1]);
    assert_eq!(bundle.source(), Some(v2.as_path()));
    assert!(bundle.get("demo.echo").is_some());
    assert!(bundle.get("demo.old").is_none());
}

#[test]
fn falls_back_to_older_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let v1 = dir.path().join("v1.json");
    fs::write(&v1, r#"{"demo.old": {"result_schema": {"type": "object"}}}"#).unwrap();
    let bundle = SchemaBundle::load_preferred(&[dir.path().join("missing.json"), v1]);
    let schemas = bundle.get("demo.old").unwrap();
    assert!(schemas.params_schema.is_none());
    assert_eq!(schemas.result_schema, Some(json!({"type": "object"})));
}

#[test]
fn missing_or_malformed_bundle_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    assert!(SchemaBundle::load_preferred(&[dir.path().join("none.json")]).is_empty());
    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{not json").unwrap();
    assert!(SchemaBundle::load_preferred(&[broken.clone()]).is_empty());
    assert!(matches!(SchemaBundle::load(&broken), Err(BundleError::Parse(_))));
}

#[test]
fn non_object_root_is_rejected() {
    assert!(matches!(SchemaBundle::from_value(&json!([1, 2])), Err(BundleError::NotAnObject)));
}

#[test]
fn non_object_entries_are_skipped() {
    let bundle = SchemaBundle::from_value(&json!({"a.b": 3, "c.d": {}})).unwrap();
    assert_eq!(bundle.len(), 1);
    assert!(bundle.get("a.b").is_none());
    assert_eq!(bundle.get("c.d").unwrap().params_schema, None);
}

#[test]
fn uncompilable_schema_is_kept_as_loaded() {
    let bundle = SchemaBundle::from_value(&json!({
        "demo.bad": {
            "params_schema": {"type": 12},
            "result_schema": {"type": "object"}
        }
    }))
    .unwrap();
    let schemas = bundle.get("demo.bad").unwrap();
    assert_eq!(schemas.params_schema, Some(json!({"type": 12})));
    assert!(schemas.result_schema.is_some());
}

#[test]
fn upper_case_type_schema_still_requires_fields() {
    let registry = registry_over(&json!({
        "demo.echo": {
            "params_schema": {
                "type": "OBJECT",
                "required": ["msg"],
                "properties": {"msg": {"type": "STRING"}}
            }
        }
    }));
    let detail = validate(&registry, json!({})).unwrap_err();
    assert!(detail.contains("params/msg"));
    assert!(validate(&registry, json!({"msg": "hi"})).is_ok());
}

#[test]
fn one_invalid_keyword_keeps_the_rest_enforced() {
    let registry = registry_over(&json!({
        "demo.echo": {
            "params_schema": {
                "type": "object",
                "required": ["msg"],
                "properties": {"msg": {"type": "string", "minLength": -1}}
            }
        }
    }));
    assert!(validate(&registry, json!({})).is_err());
    assert!(validate(&registry, json!({"msg": ""})).is_ok());
}
