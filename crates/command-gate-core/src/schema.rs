// crates/command-gate-core/src/schema.rs
// ============================================================================
// Module: Command Gate Schema Validator
// Description: First-failure validator for a declarative JSON Schema subset.
// Purpose: Reject malformed tool params before a handler runs.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! Supports `type` (`object`, `array`, `string`, `number`, `integer`,
//! `boolean`, `null`), `enum`, `required`, `properties`,
//! `additionalProperties`, `items`, `minItems`, `maxItems`, `minLength`,
//! `maxLength`, `minimum`, and `maximum`. Everything else is ignored.
//!
//! # Invariants
//! - An absent schema, a non-object schema, or a schema without a string
//!   `type` accepts after the enum check.
//! - `enum` is checked before `type`.
//! - Validation stops at the first violation; errors never accumulate.
//! - Undeclared object fields pass unless `additionalProperties` is `false`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Root path used when validating request params.
pub const PARAMS_ROOT_PATH: &str = "params";
/// Tolerance for enum number equality.
const ENUM_NUMBER_TOLERANCE: f64 = 1e-8;
/// Tolerance for the `integer` type check.
const INTEGER_TOLERANCE: f64 = 1e-4;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// First schema violation encountered, with a path-qualified message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SchemaViolation {
    /// Path of the offending value (`params/target/path`, `params/items[2]`).
    pub path: String,
    /// Human-readable, path-qualified message.
    pub message: String,
}

impl SchemaViolation {
    /// Creates a violation whose message is `"{path} {tail}"`.
    fn at(path: &str, tail: &str) -> Self {
        Self {
            path: path.to_string(),
            message: format!("{path} {tail}"),
        }
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates `value` against an optional schema fragment.
///
/// # Errors
///
/// Returns the first [`SchemaViolation`] found.
pub fn validate_value(value: &Value, schema: Option<&Value>, path: &str) -> Result<(), SchemaViolation> {
    let Some(schema) = schema.and_then(Value::as_object) else {
        return Ok(());
    };

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array)
        && !allowed.is_empty()
        && !allowed.iter().any(|candidate| values_equivalent(value, candidate))
    {
        return Err(SchemaViolation::at(path, "does not match enum constraints."));
    }

    let Some(expected) = schema.get("type").and_then(Value::as_str) else {
        return Ok(());
    };

    match expected.to_ascii_lowercase().as_str() {
        "object" => validate_object(value, schema, path),
        "array" => validate_array(value, schema, path),
        "string" => validate_string(value, schema, path),
        kind @ ("number" | "integer") => validate_number(value, schema, path, kind),
        "boolean" if !value.is_boolean() => Err(type_mismatch(path, "boolean", value)),
        "null" if !value.is_null() => Err(type_mismatch(path, "null", value)),
        _ => Ok(()),
    }
}

/// Validates an object value.
fn validate_object(
    value: &Value,
    schema: &Map<String, Value>,
    path: &str,
) -> Result<(), SchemaViolation> {
    let Some(object) = value.as_object() else {
        return Err(type_mismatch(path, "object", value));
    };
    let properties = schema.get("properties").and_then(Value::as_object);
    let allow_additional = schema.get("additionalProperties").and_then(Value::as_bool).unwrap_or(true);

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(field) {
                return Err(SchemaViolation::at(&format!("{path}/{field}"), "is required."));
            }
        }
    }

    for (key, child) in object {
        let child_path = format!("{path}/{key}");
        match properties.and_then(|props| props.get(key)).filter(|schema| schema.is_object()) {
            Some(child_schema) => validate_value(child, Some(child_schema), &child_path)?,
            None if !allow_additional => {
                return Err(SchemaViolation::at(&child_path, "is not allowed by schema."));
            }
            None => {}
        }
    }
    Ok(())
}

/// Validates an array value.
fn validate_array(
    value: &Value,
    schema: &Map<String, Value>,
    path: &str,
) -> Result<(), SchemaViolation> {
    let Some(items) = value.as_array() else {
        return Err(type_mismatch(path, "array", value));
    };
    if let Some(min) = bound(schema, "minItems")
        && items.len() < min
    {
        return Err(SchemaViolation::at(path, &format!("expected at least {min} items.")));
    }
    if let Some(max) = bound(schema, "maxItems")
        && items.len() > max
    {
        return Err(SchemaViolation::at(path, &format!("expected at most {max} items.")));
    }
    if let Some(item_schema) = schema.get("items").filter(|schema| schema.is_object()) {
        for (index, item) in items.iter().enumerate() {
            validate_value(item, Some(item_schema), &format!("{path}[{index}]"))?;
        }
    }
    Ok(())
}

/// Validates a string value; lengths count Unicode scalar values.
fn validate_string(
    value: &Value,
    schema: &Map<String, Value>,
    path: &str,
) -> Result<(), SchemaViolation> {
    let Some(text) = value.as_str() else {
        return Err(type_mismatch(path, "string", value));
    };
    let length = text.chars().count();
    if let Some(min) = bound(schema, "minLength")
        && length < min
    {
        return Err(SchemaViolation::at(path, &format!("expected minimum length {min}.")));
    }
    if let Some(max) = bound(schema, "maxLength")
        && length > max
    {
        return Err(SchemaViolation::at(path, &format!("expected maximum length {max}.")));
    }
    Ok(())
}

/// Validates a number or integer value.
fn validate_number(
    value: &Value,
    schema: &Map<String, Value>,
    path: &str,
    kind: &str,
) -> Result<(), SchemaViolation> {
    let Some(number) = value.as_f64() else {
        return Err(type_mismatch(path, kind, value));
    };
    if kind == "integer" && (number - number.round()).abs() > INTEGER_TOLERANCE {
        return Err(SchemaViolation::at(path, "expected integer value."));
    }
    if let Some(minimum) = schema.get("minimum").and_then(Value::as_f64)
        && number < minimum
    {
        return Err(SchemaViolation::at(path, &format!("expected value >= {}.", format_number(minimum))));
    }
    if let Some(maximum) = schema.get("maximum").and_then(Value::as_f64)
        && number > maximum
    {
        return Err(SchemaViolation::at(path, &format!("expected value <= {}.", format_number(maximum))));
    }
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Type-aware equality used by `enum`.
///
/// Arrays and objects never match; numbers compare with a small tolerance.
fn values_equivalent(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(left), Value::Bool(right)) => left == right,
        (Value::String(left), Value::String(right)) => left == right,
        (Value::Number(left), Value::Number(right)) => match (left.as_f64(), right.as_f64()) {
            (Some(left), Some(right)) => (left - right).abs() <= ENUM_NUMBER_TOLERANCE,
            _ => false,
        },
        _ => false,
    }
}

/// Reads a non-negative count keyword (`minItems`, `maxLength`, ...).
///
/// Fractional bounds are truncated (`1.9` reads as `1`); negative or
/// non-finite bounds are ignored.
fn bound(schema: &Map<String, Value>, keyword: &str) -> Option<usize> {
    let raw = schema.get(keyword)?;
    if let Some(count) = raw.as_u64() {
        return Some(usize::try_from(count).unwrap_or(usize::MAX));
    }
    let count = raw.as_f64().filter(|count| count.is_finite() && *count >= 0.0)?;
    Some(truncate_count(count))
}

/// Truncates a finite, non-negative count toward zero.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "Callers pass finite non-negative values; float-to-int `as` saturates at usize::MAX."
)]
fn truncate_count(count: f64) -> usize {
    count.trunc() as usize
}

/// Builds an `expected X but got Y` violation.
fn type_mismatch(path: &str, expected: &str, actual: &Value) -> SchemaViolation {
    SchemaViolation::at(path, &format!("expected {expected} but got {}.", json_type_name(actual)))
}

/// Returns the JSON type name of a value.
#[must_use]
pub const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Formats a bound compactly: integral values print without a fraction.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 { format!("{value:.0}") } else { format!("{value}") }
}
