// crates/command-gate-core/tests/validator_conformance.rs
// ============================================================================
// Module: Validator Conformance Tests
// Description: Cross-checks the subset validator against a full JSON Schema engine.
// Purpose: Ensure verdicts agree with Draft 2020-12 on the supported keywords.
// Dependencies: command-gate-core, jsonschema, serde_json
// ============================================================================

//! ## Overview
//! For schemas built only from supported keywords, the subset validator must
//! accept exactly what a Draft 2020-12 validator accepts. Only the verdict
//! is compared; messages are specific to the subset validator.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use command_gate_core::schema::PARAMS_ROOT_PATH;
use command_gate_core::validate_value;
use jsonschema::Draft;
use jsonschema::Validator;
use serde_json::Value;
use serde_json::json;

fn compile_schema(schema: &Value) -> Validator {
    jsonschema::options().with_draft(Draft::Draft202012).build(schema).expect("schema compiles")
}

fn assert_same_verdicts(schema: &Value, instances: &[Value]) {
    let reference = compile_schema(schema);
    for instance in instances {
        let ours = validate_value(instance, Some(schema), PARAMS_ROOT_PATH).is_ok();
        let theirs = reference.is_valid(instance);
        assert_eq!(ours, theirs, "verdict mismatch for {instance} against {schema}");
    }
}

#[test]
fn echo_schema_verdicts_agree() {
    let schema = json!({
        "type": "object",
        "required": ["msg"],
        "properties": {"msg": {"type": "string", "minLength": 1}}
    });
    assert_same_verdicts(
        &schema,
        &[
            json!({"msg": ""}),
            json!({"msg": "hi"}),
            json!({}),
            json!({"msg": 3}),
            json!({"msg": "hi", "extra": true}),
            json!("not an object"),
        ],
    );
}

#[test]
fn closed_object_verdicts_agree() {
    let schema = json!({
        "type": "object",
        "properties": {
            "mode": {"type": "string", "enum": ["preview", "apply"]},
            "count": {"type": "integer", "minimum": 1, "maximum": 10}
        },
        "additionalProperties": false
    });
    assert_same_verdicts(
        &schema,
        &[
            json!({"mode": "preview"}),
            json!({"mode": "delete"}),
            json!({"count": 0}),
            json!({"count": 10}),
            json!({"count": 11}),
            json!({"count": 2.5}),
            json!({"other": 1}),
        ],
    );
}

#[test]
fn array_verdicts_agree() {
    let schema = json!({
        "type": "array",
        "minItems": 1,
        "maxItems": 3,
        "items": {"type": "string", "maxLength": 4}
    });
    assert_same_verdicts(
        &schema,
        &[json!([]), json!(["a"]), json!(["a", "b", "c", "d"]), json!(["toolong"]), json!([1])],
    );
}
