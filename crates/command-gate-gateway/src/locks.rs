// crates/command-gate-gateway/src/locks.rs
// ============================================================================
// Module: Resource Locks
// Description: Leased, owner-scoped locks on host resources.
// Purpose: Keep concurrent write tools from mutating the same resource.
// Dependencies: command-gate-core, thiserror, tracing
// ============================================================================

//! ## Overview
//! A lease grants one owner exclusive use of a key until it expires or is
//! released. Expired leases are reclaimed lazily on every acquire, so a
//! crashed owner blocks a key for at most one lease period.
//!
//! The router acquires through [`LockManager::lock`] and holds the returned
//! [`LockGuard`] for the rest of the pipeline; dropping it releases the lease
//! on every exit path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use command_gate_core::Diagnostic;
use command_gate_core::SharedClock;
use command_gate_core::Timestamp;
use command_gate_core::codes;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Lock failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// Another owner holds an unexpired lease.
    #[error("lock {key} held by {owner}")]
    Conflict {
        /// Contended key.
        key: String,
        /// Current holder.
        owner: String,
    },
    /// The caller does not hold the lease.
    #[error("lock {0} not held by caller")]
    NotHeld(String),
    /// Lock table poisoned.
    #[error("lock table poisoned")]
    Poisoned,
}

impl LockError {
    /// Converts the failure into a caller-facing diagnostic.
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Conflict {
                key,
                owner,
            } => Diagnostic::error(codes::LOCK_CONFLICT, "Lock conflict detected for requested resource.")
                .with_detail(format!("lock_key={key} owner={owner}"))
                .with_suggestion("Retry later with exponential backoff.")
                .retriable(),
            Self::NotHeld(key) => Diagnostic::error(codes::LOCK_CONFLICT, "Lock is not held by this owner.")
                .with_detail(format!("lock_key={key}")),
            Self::Poisoned => Diagnostic::error(codes::INTERNAL_EXCEPTION, "Lock state is unavailable.")
                .with_detail(self.to_string()),
        }
    }
}

/// Active lease.
#[derive(Debug, Clone)]
struct Lease {
    /// Holder.
    owner: String,
    /// Instant at which the lease lapses.
    expires_at: Timestamp,
}

// ============================================================================
// SECTION: Manager
// ============================================================================

/// Lease table keyed by resource.
pub struct LockManager {
    /// Active leases.
    leases: Mutex<BTreeMap<String, Lease>>,
    /// Time source for expiry.
    clock: SharedClock,
}

impl LockManager {
    /// Creates an empty lock table.
    #[must_use]
    pub const fn new(clock: SharedClock) -> Self {
        Self {
            leases: Mutex::new(BTreeMap::new()),
            clock,
        }
    }

    /// Acquires or renews `key` for `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Conflict`] when another owner holds the key.
    pub fn acquire(&self, key: &str, owner: &str, lease: Duration) -> Result<(), LockError> {
        let now = self.clock.now();
        let mut leases = self.leases.lock().map_err(|_| LockError::Poisoned)?;
        reclaim(&mut leases, now);
        if let Some(existing) = leases.get(key)
            && existing.owner != owner
        {
            return Err(LockError::Conflict {
                key: key.to_string(),
                owner: existing.owner.clone(),
            });
        }
        leases.insert(
            key.to_string(),
            Lease {
                owner: owner.to_string(),
                expires_at: now.saturating_add(lease),
            },
        );
        Ok(())
    }

    /// Acquires `key` and returns a guard that releases it on drop.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Conflict`] when another owner holds the key.
    pub fn lock(&self, key: &str, owner: &str, lease: Duration) -> Result<LockGuard<'_>, LockError> {
        self.acquire(key, owner, lease)?;
        Ok(LockGuard {
            manager: self,
            key: key.to_string(),
            owner: owner.to_string(),
        })
    }

    /// Extends a held lease.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::NotHeld`] when `owner` has no unexpired lease.
    pub fn renew(&self, key: &str, owner: &str, lease: Duration) -> Result<(), LockError> {
        let now = self.clock.now();
        let mut leases = self.leases.lock().map_err(|_| LockError::Poisoned)?;
        match leases.get_mut(key) {
            Some(existing) if existing.owner == owner && existing.expires_at > now => {
                existing.expires_at = now.saturating_add(lease);
                Ok(())
            }
            _ => Err(LockError::NotHeld(key.to_string())),
        }
    }

    /// Releases `key` if `owner` holds it; returns whether a lease was removed.
    pub fn release(&self, key: &str, owner: &str) -> bool {
        let Ok(mut leases) = self.leases.lock() else {
            return false;
        };
        if leases.get(key).is_some_and(|lease| lease.owner == owner) {
            leases.remove(key);
            return true;
        }
        false
    }

    /// Releases every lease held by `owner`, returning the count.
    pub fn release_owner(&self, owner: &str) -> usize {
        let Ok(mut leases) = self.leases.lock() else {
            return 0;
        };
        let before = leases.len();
        leases.retain(|_, lease| lease.owner != owner);
        before - leases.len()
    }

    /// Drops expired leases, returning the count.
    pub fn reclaim_stale(&self) -> usize {
        let now = self.clock.now();
        self.leases.lock().map_or(0, |mut leases| reclaim(&mut leases, now))
    }

    /// Returns the owner of an unexpired lease on `key`.
    #[must_use]
    pub fn holder(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let leases = self.leases.lock().ok()?;
        leases.get(key).filter(|lease| lease.expires_at > now).map(|lease| lease.owner.clone())
    }
}

/// Removes leases expiring at or before `now`.
fn reclaim(leases: &mut BTreeMap<String, Lease>, now: Timestamp) -> usize {
    let before = leases.len();
    leases.retain(|_, lease| lease.expires_at > now);
    let reclaimed = before - leases.len();
    if reclaimed > 0 {
        tracing::debug!(reclaimed, "reclaimed expired lock leases");
    }
    reclaimed
}

// ============================================================================
// SECTION: Guard
// ============================================================================

/// Held lease released on drop.
pub struct LockGuard<'a> {
    /// Owning manager.
    manager: &'a LockManager,
    /// Held key.
    key: String,
    /// Holder.
    owner: String,
}

impl LockGuard<'_> {
    /// Returns the held key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.manager.release(&self.key, &self.owner);
    }
}

#[cfg(test)]
mod tests;
