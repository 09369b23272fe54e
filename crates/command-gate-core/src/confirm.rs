// crates/command-gate-core/src/confirm.rs
// ============================================================================
// Module: Command Gate Confirmation Tokens
// Description: Short-lived, single-use tokens bound to an operation signature.
// Purpose: Require a preview round-trip before destructive or irreversible work.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A guarded operation is called twice. The first call issues a token bound to
//! the operation's signature; the second presents the token with the same
//! effective parameters. [`ConfirmationGuard::consume`] removes the token
//! whether or not the signature matched, so a token authorizes at most one
//! attempt and never a different blast radius than the one previewed.
//!
//! Expiry is lazy: every issue and consume first reclaims expired entries.
//! An entry whose expiry instant is at or before the current time never
//! matches.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::clock::SharedClock;
use crate::clock::Timestamp;
use crate::diagnostics::Diagnostic;
use crate::diagnostics::codes;
use crate::hashing::HashDigest;
use crate::hashing::HashError;
use crate::hashing::hash_canonical_json;
use crate::identifiers::random_hex;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default token lifetime.
pub const DEFAULT_CONFIRM_TTL: Duration = Duration::from_secs(60);
/// Default cap on outstanding tokens per guard.
pub const DEFAULT_MAX_PENDING: usize = 1024;

// ============================================================================
// SECTION: Signatures
// ============================================================================

/// Signature of a bulk delete: sorted, deduplicated targets plus the
/// reference policy flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteSignature {
    /// Sorted, deduplicated target identifiers.
    targets: Vec<String>,
    /// Whether referenced targets block the delete.
    fail_if_referenced: bool,
}

impl DeleteSignature {
    /// Normalizes targets and captures the reference flag.
    #[must_use]
    pub fn new<I, S>(targets: I, fail_if_referenced: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut targets: Vec<String> = targets.into_iter().map(Into::into).collect();
        targets.sort();
        targets.dedup();
        Self {
            targets,
            fail_if_referenced,
        }
    }

    /// Returns the normalized targets.
    #[must_use]
    pub fn targets(&self) -> &[String] {
        &self.targets
    }
}

/// Signature of a settings patch: a digest over class, patch body, and save
/// options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsSignature(HashDigest);

impl SettingsSignature {
    /// Hashes the canonical form of the patch request.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the inputs cannot be canonicalized.
    pub fn new(class_path: &str, patch: &Value, save_options: &Value) -> Result<Self, HashError> {
        let material = json!({
            "class_path": class_path,
            "patch": patch,
            "save_options": save_options,
        });
        hash_canonical_json(&material).map(Self)
    }
}

// ============================================================================
// SECTION: Tokens
// ============================================================================

/// Opaque confirmation token (32 hex digits).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConfirmToken(String);

impl ConfirmToken {
    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfirmToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised while issuing tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// Guard lock poisoned by a panicking holder.
    #[error("confirmation guard lock poisoned")]
    Poisoned,
    /// Too many unexpired tokens are outstanding.
    #[error("too many pending confirmations (max {0})")]
    Capacity(usize),
}

impl GuardError {
    /// Converts the failure into a caller-facing diagnostic.
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Poisoned => Diagnostic::error(codes::INTERNAL_EXCEPTION, "Confirmation state is unavailable.")
                .with_detail(self.to_string()),
            Self::Capacity(_) => Diagnostic::error(codes::INTERNAL_EXCEPTION, "Too many pending confirmations.")
                .with_detail(self.to_string())
                .with_suggestion("Wait for outstanding confirm tokens to expire and retry.")
                .retriable(),
        }
    }
}

/// Outstanding confirmation.
#[derive(Debug)]
struct PendingConfirmation<S> {
    /// Signature recorded at issuance.
    signature: S,
    /// Instant at which the token stops matching.
    expires_at: Timestamp,
}

// ============================================================================
// SECTION: Guard
// ============================================================================

/// Token store for one kind of guarded operation.
pub struct ConfirmationGuard<S> {
    /// Outstanding tokens keyed by token string.
    pending: Mutex<BTreeMap<String, PendingConfirmation<S>>>,
    /// Token lifetime.
    ttl: Duration,
    /// Cap on outstanding tokens.
    max_pending: usize,
    /// Time source.
    clock: SharedClock,
}

impl<S: PartialEq> ConfirmationGuard<S> {
    /// Creates an empty guard.
    #[must_use]
    pub fn new(ttl: Duration, max_pending: usize, clock: SharedClock) -> Self {
        Self {
            pending: Mutex::new(BTreeMap::new()),
            ttl,
            max_pending,
            clock,
        }
    }

    /// Issues a token bound to `signature`.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError`] when the lock is poisoned or the store is full
    /// after reclaiming expired entries.
    pub fn issue(&self, signature: S) -> Result<ConfirmToken, GuardError> {
        let now = self.clock.now();
        let mut pending = self.pending.lock().map_err(|_| GuardError::Poisoned)?;
        reclaim(&mut pending, now);
        if pending.len() >= self.max_pending {
            return Err(GuardError::Capacity(self.max_pending));
        }
        let token = random_hex();
        pending.insert(
            token.clone(),
            PendingConfirmation {
                signature,
                expires_at: now.saturating_add(self.ttl),
            },
        );
        Ok(ConfirmToken(token))
    }

    /// Consumes `token`, returning true only if it is unexpired and its
    /// recorded signature equals `signature`.
    ///
    /// The entry is removed on every hit, matched or not. Empty tokens and a
    /// poisoned lock never match.
    #[must_use]
    pub fn consume(&self, token: &str, signature: &S) -> bool {
        let now = self.clock.now();
        let Ok(mut pending) = self.pending.lock() else {
            return false;
        };
        reclaim(&mut pending, now);
        if token.is_empty() {
            return false;
        }
        pending.remove(token).is_some_and(|entry| entry.signature == *signature)
    }

    /// Drops expired entries, returning how many were removed.
    pub fn reclaim_expired(&self) -> usize {
        let now = self.clock.now();
        self.pending.lock().map_or(0, |mut pending| reclaim(&mut pending, now))
    }

    /// Returns the number of outstanding (possibly expired) tokens.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().map_or(0, |pending| pending.len())
    }
}

/// Removes entries expiring at or before `now`.
fn reclaim<S>(pending: &mut BTreeMap<String, PendingConfirmation<S>>, now: Timestamp) -> usize {
    let before = pending.len();
    pending.retain(|_, entry| entry.expires_at > now);
    before - pending.len()
}
