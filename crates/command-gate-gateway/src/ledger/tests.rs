// crates/command-gate-gateway/src/ledger/tests.rs
// ============================================================================
// Module: Changeset Ledger Tests
// Description: Unit tests for persistence, listing order, and rollback rules.
// Purpose: Pin the on-disk layout and the rollback contract.
// Dependencies: command-gate-gateway, tempfile
// ============================================================================

//! ## Overview
//! Uses a [`ManualClock`] so equal and distinct creation instants can be
//! arranged deterministically.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use command_gate_core::ChangesetId;
use command_gate_core::ExecutionResult;
use command_gate_core::ManualClock;
use command_gate_core::RequestEnvelope;
use command_gate_core::Timestamp;
use command_gate_core::codes;
use serde_json::Value;
use serde_json::json;

use super::ChangesetLedger;
use super::LedgerError;
use super::ListQuery;
use super::NewChangeset;
use super::encode_resource;
use super::glob_match;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn ledger_at(root: &std::path::Path) -> (ChangesetLedger, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Timestamp::from_unix_millis(1_700_000_000_000)));
    (ChangesetLedger::new(root, clock.clone(), 200), clock)
}

fn record(ledger: &ChangesetLedger, tool: &str, session: &str, touched: &[&str]) -> String {
    let request = RequestEnvelope::new("command-gate/1.0", "req-1", tool, json!({"target": {"path": "/Game/A"}}))
        .with_session(session);
    let mut result = ExecutionResult::ok(json!({"done": true}));
    for resource in touched {
        result = result.touching(*resource);
    }
    let new = NewChangeset {
        request: &request,
        result: &result,
        policy_version: "policy-1",
        schema_hash: "sha256:abc",
        engine_version: "5.4",
    };
    ledger.create(&new).unwrap().as_str().to_string()
}

fn query(limit: usize) -> ListQuery {
    ListQuery {
        limit,
        ..ListQuery::default()
    }
}

// ============================================================================
// SECTION: Create
// ============================================================================

#[test]
fn create_writes_layout_and_meta_fields() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, _clock) = ledger_at(dir.path());
    let id = record(&ledger, "asset.save", "s-1", &["pkg/B", "pkg/A"]);
    let cs_dir = dir.path().join(&id);
    assert!(cs_dir.join("logs.jsonl").is_file());
    assert!(cs_dir.join("snapshots").is_dir());
    let meta: Value = serde_json::from_slice(&fs::read(cs_dir.join("meta.json")).unwrap()).unwrap();
    assert_eq!(meta["changeset_id"], json!(id));
    assert_eq!(meta["session_id"], json!("s-1"));
    assert_eq!(meta["status"], json!("ok"));
    assert_eq!(meta["created_at"], json!("2023-11-14T22:13:20Z"));
    assert_eq!(meta["touched_packages"], json!(["pkg/A", "pkg/B"]));
    assert_eq!(meta["targets"], json!([{"path": "/Game/A"}]));
    assert_eq!(meta["engine_version"], json!("5.4"));
}

#[test]
fn create_reports_directory_failure() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("root");
    fs::write(&blocker, "not a directory").unwrap();
    let (ledger, _clock) = ledger_at(&blocker);
    let request = RequestEnvelope::new("command-gate/1.0", "req-1", "asset.save", json!({}));
    let result = ExecutionResult::ok(json!({}));
    let err = ledger
        .create(&NewChangeset {
            request: &request,
            result: &result,
            policy_version: "p",
            schema_hash: "h",
            engine_version: "e",
        })
        .unwrap_err();
    assert!(matches!(err, LedgerError::CreateDirs(_)));
    let diagnostic = err.to_diagnostic();
    assert_eq!(diagnostic.code, codes::SAVE_FAILED);
    assert!(diagnostic.retriable);
}

#[test]
fn failed_meta_write_removes_the_changeset_directory() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, _clock) = ledger_at(dir.path());
    let id = ChangesetId::parse("cs-0123456789abcdef0123456789abcdef").unwrap();
    let cs_dir = dir.path().join(id.as_str());
    fs::create_dir_all(cs_dir.join("meta.json").join("occupied")).unwrap();
    let request = RequestEnvelope::new("command-gate/1.0", "req-1", "asset.save", json!({}));
    let result = ExecutionResult::ok(json!({}));
    let err = ledger
        .create_with_id(id.clone(), &NewChangeset {
            request: &request,
            result: &result,
            policy_version: "p",
            schema_hash: "h",
            engine_version: "e",
        })
        .unwrap_err();
    assert!(matches!(err, LedgerError::WriteMeta(_)));
    assert!(!cs_dir.exists());
    assert!(ledger.list(&query(10)).unwrap().items.is_empty());
    assert!(matches!(ledger.get(id.as_str(), false, false), Err(LedgerError::NotFound(_))));
}

// ============================================================================
// SECTION: List
// ============================================================================

#[test]
fn list_orders_newest_first_with_id_tiebreak() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, clock) = ledger_at(dir.path());
    let mut same_instant = vec![record(&ledger, "a.x", "s", &[]), record(&ledger, "a.y", "s", &[])];
    same_instant.sort();
    clock.advance(Duration::from_secs(1));
    let newest = record(&ledger, "a.z", "s", &[]);

    let page = ledger.list(&query(10)).unwrap();
    let ids: Vec<&str> = page.items.iter().map(|meta| meta.changeset_id.as_str()).collect();
    assert_eq!(ids, vec![newest.as_str(), same_instant[0].as_str(), same_instant[1].as_str()]);
    assert_eq!(page.next_cursor, None);
}

#[test]
fn list_filters_by_status_glob_and_session() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, _clock) = ledger_at(dir.path());
    record(&ledger, "Asset.Save", "s-1", &[]);
    record(&ledger, "asset.delete", "s-2", &[]);
    record(&ledger, "world.spawn", "s-1", &[]);

    let globbed = ledger
        .list(&ListQuery {
            limit: 50,
            tool_glob: Some("asset.*".to_string()),
            ..ListQuery::default()
        })
        .unwrap();
    assert_eq!(globbed.items.len(), 2);

    let session = ledger
        .list(&ListQuery {
            limit: 50,
            session_id: Some("s-1".to_string()),
            tool_glob: Some("?sset.s*".to_string()),
            ..ListQuery::default()
        })
        .unwrap();
    assert_eq!(session.items.len(), 1);
    assert_eq!(session.items[0].tool, "Asset.Save");

    let errored = ledger
        .list(&ListQuery {
            limit: 50,
            status_in: vec!["error".to_string()],
            ..ListQuery::default()
        })
        .unwrap();
    assert!(errored.items.is_empty());
}

#[test]
fn list_clamps_limit_and_skips_foreign_entries() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, _clock) = ledger_at(dir.path());
    record(&ledger, "a.b", "s", &[]);
    record(&ledger, "a.b", "s", &[]);
    fs::create_dir_all(dir.path().join("not-a-changeset")).unwrap();
    fs::create_dir_all(dir.path().join(format!("cs-{}", "0".repeat(32)))).unwrap();

    let page = ledger.list(&query(0)).unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.next_cursor, Some(1));
    let past_end = ledger
        .list(&ListQuery {
            limit: 5,
            cursor: 10,
            ..ListQuery::default()
        })
        .unwrap();
    assert!(past_end.items.is_empty());
    assert_eq!(past_end.next_cursor, None);
}

#[test]
fn list_on_missing_root_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, _clock) = ledger_at(&dir.path().join("absent"));
    assert!(ledger.list(&query(10)).unwrap().items.is_empty());
}

// ============================================================================
// SECTION: Get And Logs
// ============================================================================

#[test]
fn get_rejects_malformed_ids() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, _clock) = ledger_at(dir.path());
    let unknown = format!("cs-{}", "a".repeat(32));
    for raw in ["../etc", "cs-xyz", "", unknown.as_str()] {
        assert!(matches!(ledger.get(raw, true, true), Err(LedgerError::NotFound(_))), "{raw}");
    }
}

#[test]
fn get_skips_malformed_log_lines() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, _clock) = ledger_at(dir.path());
    let id = record(&ledger, "a.b", "s", &[]);
    ledger.append_log(&id, &json!({"event": "first"})).unwrap();
    let log_path = dir.path().join(&id).join("logs.jsonl");
    let mut body = fs::read_to_string(&log_path).unwrap();
    body.push_str("{broken\n\n");
    fs::write(&log_path, body).unwrap();
    ledger.append_log(&id, &json!({"event": "second"})).unwrap();

    let record = ledger.get(&id, true, false).unwrap();
    assert_eq!(record.logs, Some(vec![json!({"event": "first"}), json!({"event": "second"})]));
    assert_eq!(record.snapshots, None);
    let rendered = serde_json::to_value(&record).unwrap();
    assert!(rendered.get("snapshots").is_none());
}

#[test]
fn snapshot_names_are_escaped() {
    assert_eq!(encode_resource("/Game/Maps/Main"), "~2FGame~2FMaps~2FMain");
    assert_eq!(encode_resource("pkg_A-1.v2"), "pkg_A-1.v2");
    assert_eq!(encode_resource("a~b c"), "a~7Eb~20c");
}

#[test]
fn write_snapshot_returns_relative_path() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, _clock) = ledger_at(dir.path());
    let id = record(&ledger, "a.b", "s", &["pkg/A"]);
    let relative = ledger.write_snapshot(&id, "pkg/A", b"before").unwrap();
    assert_eq!(relative, "snapshots/pkg~2FA.before");
    assert_eq!(fs::read(dir.path().join(&id).join(&relative)).unwrap(), b"before");
    let record = ledger.get(&id, false, true).unwrap();
    assert_eq!(record.snapshots, Some(vec![relative]));
    assert_eq!(record.logs, None);
}

// ============================================================================
// SECTION: Rollback
// ============================================================================

#[test]
fn preview_rejects_unknown_mode() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, _clock) = ledger_at(dir.path());
    let id = record(&ledger, "a.b", "s", &["pkg/A"]);
    let err = ledger.preview_rollback(&id, "vcs_revert").unwrap_err();
    assert_eq!(err, LedgerError::UnsupportedMode("vcs_revert".to_string()));
    assert_eq!(err.to_diagnostic().detail, "requested_mode=vcs_revert");
    assert!(ledger.preview_rollback(&id, "LOCAL_SNAPSHOT").is_ok());
}

#[test]
fn preview_is_side_effect_free() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, _clock) = ledger_at(dir.path());
    let id = record(&ledger, "a.b", "s", &["pkg/A"]);
    let first = ledger.preview_rollback(&id, "local_snapshot").unwrap();
    let second = ledger.preview_rollback(&id, "local_snapshot").unwrap();
    assert_eq!(first, second);
    assert!(ledger.get(&id, true, false).unwrap().logs.unwrap().is_empty());
}

#[test]
fn apply_with_snapshots_still_reports_unsupported_restore() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, _clock) = ledger_at(dir.path());
    let id = record(&ledger, "a.b", "s", &["pkg/A"]);
    ledger.write_snapshot(&id, "pkg/A", b"x").unwrap();
    let err = ledger.apply_rollback(&id, "local_snapshot", false).unwrap_err();
    assert!(matches!(err, LedgerError::RestoreUnsupported { package_count: 1, .. }));
    assert_eq!(err.to_diagnostic().code, codes::CHANGESET_ROLLBACK_FAILED);
}

#[test]
fn trivial_apply_logs_the_rollback() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, _clock) = ledger_at(dir.path());
    let id = record(&ledger, "a.b", "s", &[]);
    let outcome = ledger.apply_rollback(&id, "local_snapshot", false).unwrap();
    assert!(outcome.applied);
    assert!(outcome.touched_packages.is_empty());
    let logs = ledger.get(&id, true, false).unwrap().logs.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["event"], json!("rollback_applied"));
}

#[test]
fn per_changeset_locks_are_released_after_use() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, _clock) = ledger_at(dir.path());
    let mut ids = Vec::new();
    for _ in 0 .. 50 {
        let id = record(&ledger, "a.b", "s", &[]);
        ledger.append_log(&id, &json!({"event": "step"})).unwrap();
        ids.push(id);
    }
    ledger.write_snapshot(&ids[0], "pkg/A", b"x").unwrap();
    ledger.apply_rollback(&ids[1], "local_snapshot", false).unwrap();
    assert!(ledger.apply_rollback(&ids[0], "local_snapshot", false).is_err());
    assert!(ledger.locks.lock().unwrap().is_empty());
}

// ============================================================================
// SECTION: Globs
// ============================================================================

#[test]
fn glob_matching_rules() {
    assert!(glob_match("*", ""));
    assert!(glob_match("asset.*", "ASSET.save"));
    assert!(glob_match("a?set.*e", "asset.save"));
    assert!(glob_match("*.*.*", "a.b.c"));
    assert!(!glob_match("asset.?", "asset.save"));
    assert!(!glob_match("world.*", "asset.save"));
    assert!(glob_match("**a", "bba"));
}
