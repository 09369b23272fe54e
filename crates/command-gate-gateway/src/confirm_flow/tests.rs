// crates/command-gate-gateway/src/confirm_flow/tests.rs
// ============================================================================
// Module: Confirmation Flow Tests
// Description: Unit tests for the preview/apply gates.
// Purpose: Ensure tokens bind to targets and settings bodies.
// Dependencies: command-gate-gateway
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use std::sync::Arc;
use std::time::Duration;

use command_gate_core::ConfirmationGuard;
use command_gate_core::ManualClock;
use command_gate_core::Timestamp;
use command_gate_core::codes;
use serde_json::json;

use super::ConfirmDecision;
use super::ConfirmMode;
use super::delete_gate;
use super::settings_gate;

fn guard<S: PartialEq>() -> (ConfirmationGuard<S>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Timestamp::from_unix_millis(0)));
    (ConfirmationGuard::new(Duration::from_secs(60), 8, clock.clone()), clock)
}

#[test]
fn mode_parsing_is_case_insensitive() {
    assert_eq!(ConfirmMode::parse("PREVIEW").unwrap(), ConfirmMode::Preview);
    assert_eq!(ConfirmMode::parse("Apply").unwrap(), ConfirmMode::Apply);
    let err = ConfirmMode::parse("delete").unwrap_err();
    assert_eq!(err.code, codes::SCHEMA_INVALID_PARAMS);
    assert_eq!(err.message, "mode must be preview or apply.");
}

#[test]
fn delete_preview_then_apply_in_any_target_order() {
    let (guard, _clock) = guard();
    let ConfirmDecision::Preview {
        token,
    } = delete_gate(&guard, "preview", None, ["pkg/B", "pkg/A"], true).unwrap()
    else {
        panic!("expected preview");
    };
    let decision = delete_gate(&guard, "apply", Some(token.as_str()), ["pkg/A", "pkg/B", "pkg/A"], true).unwrap();
    assert_eq!(decision, ConfirmDecision::Confirmed);
}

#[test]
fn delete_apply_rejects_changed_flag_and_missing_token() {
    let (guard, _clock) = guard();
    let ConfirmDecision::Preview {
        token,
    } = delete_gate(&guard, "preview", None, ["pkg/A"], true).unwrap()
    else {
        panic!("expected preview");
    };
    let err = delete_gate(&guard, "apply", Some(token.as_str()), ["pkg/A"], false).unwrap_err();
    assert_eq!(err.code, codes::CONFIRM_TOKEN_INVALID);
    let err = delete_gate(&guard, "apply", None, ["pkg/A"], true).unwrap_err();
    assert_eq!(err.message, "Invalid or expired confirm_token.");
}

#[test]
fn settings_token_expires() {
    let (guard, clock) = guard();
    let patch = json!([{"op": "replace", "path": "/GameDefaultMap", "value": "/Game/Maps/Main"}]);
    let ConfirmDecision::Preview {
        token,
    } = settings_gate(&guard, "preview", None, "/Script/Engine.GameMapsSettings", &patch, &json!({})).unwrap()
    else {
        panic!("expected preview");
    };
    clock.advance(Duration::from_secs(60));
    let err = settings_gate(&guard, "apply", Some(token.as_str()), "/Script/Engine.GameMapsSettings", &patch, &json!({}))
        .unwrap_err();
    assert_eq!(err.code, codes::SETTINGS_CONFIRM_TOKEN_INVALID);
}
