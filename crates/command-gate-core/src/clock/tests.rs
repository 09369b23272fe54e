// crates/command-gate-core/src/clock/tests.rs
// ============================================================================
// Module: Clock Tests
// Description: Unit tests for timestamps and the manual clock.
// Purpose: Pin RFC 3339 formatting and saturating arithmetic.
// Dependencies: command-gate-core
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use std::time::Duration;

use super::Clock;
use super::ManualClock;
use super::Timestamp;

#[test]
fn rfc3339_round_trips_in_utc() {
    let parsed = Timestamp::parse_rfc3339("2026-03-01T12:30:00+02:00").unwrap();
    assert_eq!(parsed.to_rfc3339(), "2026-03-01T10:30:00Z");
    assert_eq!(Timestamp::parse_rfc3339(&parsed.to_rfc3339()), Some(parsed));
}

#[test]
fn garbage_does_not_parse() {
    assert_eq!(Timestamp::parse_rfc3339("yesterday"), None);
}

#[test]
fn manual_clock_advances_and_orders() {
    let clock = ManualClock::new(Timestamp::from_unix_millis(1_000));
    let start = clock.now();
    clock.advance(Duration::from_millis(250));
    let later = clock.now();
    assert!(later > start);
    assert_eq!(later.unix_millis(), 1_250);
    assert_eq!(later.duration_since(start), Duration::from_millis(250));
    assert_eq!(start.duration_since(later), Duration::ZERO);
}

#[test]
fn serde_uses_rfc3339_strings() {
    let stamp = Timestamp::from_unix_millis(0);
    let wire = serde_json::to_value(stamp).unwrap();
    assert_eq!(wire, serde_json::json!("1970-01-01T00:00:00Z"));
    let back: Timestamp = serde_json::from_value(wire).unwrap();
    assert_eq!(back, stamp);
}

#[test]
fn sub_millisecond_offsets_are_kept() {
    let start = Timestamp::from_unix_millis(1_700_000_000_000);
    let later = start.saturating_add(Duration::from_nanos(1_500));
    assert!(later > start);
    assert_eq!(later.duration_since(start), Duration::from_nanos(1_500));
    assert_eq!(later.unix_millis(), start.unix_millis());
    assert_eq!(later.to_rfc3339(), "2023-11-14T22:13:20.0000015Z");
}
