// crates/command-gate-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for docs and the CLI.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A complete `command-gate.toml` spelling out every default, plus a file
//! audit sink. Tests parse it to keep it in sync with the model.

/// Returns a canonical example `command-gate.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[gateway]
protocol_version = "command-gate/1.0"
protocol_prefix = "command-gate/1"
engine_version = "unknown"

[schemas]
bundle_paths = ["resources/schemas_v2_tools.json", "resources/schemas_v1_tools.json"]

[ledger]
root = "state/changesets"
default_list_limit = 50
max_list_limit = 200

[confirmation]
ttl_seconds = 60
max_pending = 1024

[policy]
version = "policy-1"
safe_mode = false

[locks]
lease_ms = 30000

[idempotency]
max_entries = 1024

[audit]
sink = "file"
path = "state/audit.jsonl"
"#,
    )
}
