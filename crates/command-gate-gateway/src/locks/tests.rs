// crates/command-gate-gateway/src/locks/tests.rs
// ============================================================================
// Module: Resource Lock Tests
// Description: Unit tests for lease acquisition, expiry, and guards.
// Purpose: Pin conflict and reclamation behavior at lease boundaries.
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

use command_gate_core::ManualClock;
use command_gate_core::Timestamp;
use command_gate_core::codes;

use super::LockError;
use super::LockManager;

const LEASE: Duration = Duration::from_secs(30);

fn manager() -> (LockManager, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Timestamp::from_unix_millis(10_000)));
    (LockManager::new(clock.clone()), clock)
}

#[test]
fn second_owner_conflicts_until_expiry() {
    let (locks, clock) = manager();
    locks.acquire("/Game/A", "req-1", LEASE).unwrap();
    let err = locks.acquire("/Game/A", "req-2", LEASE).unwrap_err();
    assert_eq!(
        err,
        LockError::Conflict {
            key: "/Game/A".to_string(),
            owner: "req-1".to_string(),
        }
    );
    let diagnostic = err.to_diagnostic();
    assert_eq!(diagnostic.code, codes::LOCK_CONFLICT);
    assert_eq!(diagnostic.detail, "lock_key=/Game/A owner=req-1");
    assert!(diagnostic.retriable);

    clock.advance(LEASE);
    locks.acquire("/Game/A", "req-2", LEASE).unwrap();
    assert_eq!(locks.holder("/Game/A").as_deref(), Some("req-2"));
}

#[test]
fn same_owner_renews() {
    let (locks, clock) = manager();
    locks.acquire("k", "o", LEASE).unwrap();
    clock.advance(Duration::from_secs(20));
    locks.acquire("k", "o", LEASE).unwrap();
    clock.advance(Duration::from_secs(20));
    assert_eq!(locks.holder("k").as_deref(), Some("o"));
    locks.renew("k", "o", LEASE).unwrap();
    assert_eq!(locks.renew("k", "other", LEASE), Err(LockError::NotHeld("k".to_string())));
}

#[test]
fn guard_releases_on_drop() {
    let (locks, _clock) = manager();
    {
        let guard = locks.lock("k", "o", LEASE).unwrap();
        assert_eq!(guard.key(), "k");
        assert!(locks.acquire("k", "p", LEASE).is_err());
    }
    assert_eq!(locks.holder("k"), None);
    locks.acquire("k", "p", LEASE).unwrap();
}

#[test]
fn release_requires_owner() {
    let (locks, _clock) = manager();
    locks.acquire("a", "o", LEASE).unwrap();
    locks.acquire("b", "o", LEASE).unwrap();
    locks.acquire("c", "p", LEASE).unwrap();
    assert!(!locks.release("a", "p"));
    assert!(locks.release("a", "o"));
    assert_eq!(locks.release_owner("o"), 1);
    assert_eq!(locks.holder("c").as_deref(), Some("p"));
}

#[test]
fn reclaim_counts_expired_leases() {
    let (locks, clock) = manager();
    locks.acquire("a", "o", Duration::from_secs(1)).unwrap();
    locks.acquire("b", "o", LEASE).unwrap();
    clock.advance(Duration::from_secs(1));
    assert_eq!(locks.reclaim_stale(), 1);
    assert_eq!(locks.reclaim_stale(), 0);
}
