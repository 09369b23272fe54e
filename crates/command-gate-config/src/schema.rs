// crates/command-gate-config/src/schema.rs
// ============================================================================
// Module: Config Schemas
// Description: JSON schema builder for command-gate.toml.
// Purpose: Provide a canonical validation schema for config artifacts.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! The schema mirrors the [`crate::GatewayConfig`] model section by section.
//! Defaults are taken from the same functions serde uses, so the schema and
//! the loader cannot drift apart.

use serde_json::Value;
use serde_json::json;

use crate::config::MAX_CONFIRM_TTL_SECONDS;
use crate::config::MAX_LIST_LIMIT_CEILING;
use crate::config::default_bundle_paths;
use crate::config::default_confirm_max_pending;
use crate::config::default_confirm_ttl_seconds;
use crate::config::default_engine_version;
use crate::config::default_idempotency_entries;
use crate::config::default_lease_ms;
use crate::config::default_ledger_root;
use crate::config::default_list_limit;
use crate::config::default_max_list_limit;
use crate::config::default_policy_version;
use crate::config::default_protocol_prefix;
use crate::config::default_protocol_version;

/// Returns the JSON schema for `command-gate.toml`.
#[must_use]
pub fn config_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "command-gate://schemas/config.schema.json",
        "title": "Command Gate Configuration",
        "description": "Configuration for the command gateway router, ledger, and guards.",
        "type": "object",
        "properties": {
            "gateway": gateway_section_schema(),
            "schemas": schemas_config_schema(),
            "ledger": ledger_config_schema(),
            "confirmation": confirmation_config_schema(),
            "policy": policy_config_schema(),
            "locks": lock_config_schema(),
            "idempotency": idempotency_config_schema(),
            "audit": audit_config_schema()
        },
        "additionalProperties": false
    })
}

/// Schema for a non-empty string with a default.
fn non_empty_string(description: &str, default: &str) -> Value {
    json!({
        "type": "string",
        "minLength": 1,
        "default": default,
        "description": description
    })
}

/// Schema for the `[gateway]` section.
fn gateway_section_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "protocol_version": non_empty_string(
                "Protocol version advertised to callers; must start with protocol_prefix.",
                &default_protocol_version(),
            ),
            "protocol_prefix": non_empty_string(
                "Prefix every request protocol must start with.",
                &default_protocol_prefix(),
            ),
            "engine_version": non_empty_string(
                "Engine version recorded when a request omits one.",
                &default_engine_version(),
            )
        },
        "additionalProperties": false
    })
}

/// Schema for the `[schemas]` section.
fn schemas_config_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "bundle_paths": {
                "type": "array",
                "items": {"type": "string", "minLength": 1},
                "default": default_bundle_paths(),
                "description": "Schema bundle files; the first existing file wins."
            }
        },
        "additionalProperties": false
    })
}

/// Schema for the `[ledger]` section.
fn ledger_config_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "root": non_empty_string("Changeset ledger root directory.", &default_ledger_root()),
            "default_list_limit": {
                "type": "integer",
                "minimum": 1,
                "maximum": MAX_LIST_LIMIT_CEILING,
                "default": default_list_limit(),
                "description": "Page size when changeset.list omits limit."
            },
            "max_list_limit": {
                "type": "integer",
                "minimum": 1,
                "maximum": MAX_LIST_LIMIT_CEILING,
                "default": default_max_list_limit(),
                "description": "Largest page size a caller may request."
            }
        },
        "additionalProperties": false
    })
}

/// Schema for the `[confirmation]` section.
fn confirmation_config_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "ttl_seconds": {
                "type": "integer",
                "minimum": 1,
                "maximum": MAX_CONFIRM_TTL_SECONDS,
                "default": default_confirm_ttl_seconds(),
                "description": "Confirmation token lifetime."
            },
            "max_pending": {
                "type": "integer",
                "minimum": 1,
                "default": default_confirm_max_pending(),
                "description": "Cap on outstanding tokens per guard."
            }
        },
        "additionalProperties": false
    })
}

/// Schema for the `[policy]` section.
fn policy_config_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "version": non_empty_string("Policy version recorded in changesets.", &default_policy_version()),
            "safe_mode": {
                "type": "boolean",
                "default": false,
                "description": "Block write tools at startup."
            }
        },
        "additionalProperties": false
    })
}

/// Schema for the `[locks]` section.
fn lock_config_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "lease_ms": {
                "type": "integer",
                "minimum": 1,
                "default": default_lease_ms(),
                "description": "Write lock lease in milliseconds."
            }
        },
        "additionalProperties": false
    })
}

/// Schema for the `[idempotency]` section.
fn idempotency_config_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "max_entries": {
                "type": "integer",
                "minimum": 1,
                "default": default_idempotency_entries(),
                "description": "Cached responses kept before FIFO eviction."
            }
        },
        "additionalProperties": false
    })
}

/// Schema for the `[audit]` section.
fn audit_config_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "sink": {
                "type": "string",
                "enum": ["none", "stderr", "file"],
                "default": "none",
                "description": "Audit event destination."
            },
            "path": {
                "type": "string",
                "minLength": 1,
                "description": "JSON lines audit log; required when sink is file."
            }
        },
        "if": {"properties": {"sink": {"const": "file"}}, "required": ["sink"]},
        "then": {"required": ["path"]},
        "additionalProperties": false
    })
}
