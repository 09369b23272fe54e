// crates/command-gate-gateway/src/idempotency.rs
// ============================================================================
// Module: Idempotency Cache
// Description: Bounded replay cache keyed by session, tool, and caller key.
// Purpose: Return the original response for retried requests and reject key reuse.
// Dependencies: command-gate-core, tracing
// ============================================================================

//! ## Overview
//! A request carrying `context.idempotency_key` is identified by the base key
//! `session|tool|key` and fingerprinted by the SHA-256 of its canonical
//! params. A stored response is replayed only for an identical fingerprint;
//! a different fingerprint under the same base key is a conflict.
//!
//! The cache is bounded and evicts in insertion order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use command_gate_core::Diagnostic;
use command_gate_core::HashDigest;
use command_gate_core::HashError;
use command_gate_core::RequestEnvelope;
use command_gate_core::ResponseEnvelope;
use command_gate_core::codes;
use command_gate_core::hashing::hash_canonical_json;

// ============================================================================
// SECTION: Keys
// ============================================================================

/// Identity of an idempotent request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey {
    /// `session|tool|key`.
    base: String,
    /// Digest of the canonical params.
    fingerprint: HashDigest,
}

impl IdempotencyKey {
    /// Derives the key for `request`, or `None` without an idempotency key.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when params cannot be canonicalized.
    pub fn for_request(request: &RequestEnvelope) -> Result<Option<Self>, HashError> {
        let Some(key) = request.context.idempotency_key.as_deref() else {
            return Ok(None);
        };
        Ok(Some(Self {
            base: format!("{}|{}|{key}", request.session_id, request.tool),
            fingerprint: hash_canonical_json(&request.params)?,
        }))
    }

    /// Returns the base key.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyLookup {
    /// No entry for the base key.
    Miss,
    /// Stored response for identical params, marked as a replay.
    Replay(Box<ResponseEnvelope>),
    /// The base key was used with different params.
    Conflict(Diagnostic),
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Entries plus their insertion order.
#[derive(Default)]
struct CacheState {
    /// Fingerprint and response by base key.
    entries: BTreeMap<String, (HashDigest, ResponseEnvelope)>,
    /// Base keys, oldest first.
    order: VecDeque<String>,
}

/// Bounded FIFO response cache.
pub struct IdempotencyCache {
    /// Maximum number of entries.
    max_entries: usize,
    /// Guarded state.
    state: Mutex<CacheState>,
}

impl IdempotencyCache {
    /// Creates an empty cache holding at most `max_entries` responses.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Looks up `key`.
    ///
    /// # Errors
    ///
    /// Returns an `INTERNAL_EXCEPTION` diagnostic when the cache is poisoned.
    pub fn lookup(&self, key: &IdempotencyKey) -> Result<IdempotencyLookup, Diagnostic> {
        let state = self.state.lock().map_err(|_| {
            Diagnostic::error(codes::INTERNAL_EXCEPTION, "Idempotency state is unavailable.")
                .with_detail(key.base.clone())
        })?;
        Ok(match state.entries.get(&key.base) {
            None => IdempotencyLookup::Miss,
            Some((fingerprint, response)) if *fingerprint == key.fingerprint => {
                let mut replay = response.clone();
                replay.idempotent_replay = true;
                IdempotencyLookup::Replay(Box::new(replay))
            }
            Some(_) => IdempotencyLookup::Conflict(
                Diagnostic::error(codes::IDEMPOTENCY_CONFLICT, "Idempotency key was reused with a different payload.")
                    .with_detail(key.base.clone())
                    .with_suggestion("Use a new idempotency_key for different params."),
            ),
        })
    }

    /// Stores `response` under `key`, evicting the oldest entry when full.
    pub fn store(&self, key: IdempotencyKey, response: ResponseEnvelope) {
        let Ok(mut state) = self.state.lock() else {
            tracing::warn!(key = %key.base, "idempotency cache poisoned; response not cached");
            return;
        };
        if !state.entries.contains_key(&key.base) {
            while state.order.len() >= self.max_entries {
                let Some(oldest) = state.order.pop_front() else {
                    break;
                };
                state.entries.remove(&oldest);
            }
            state.order.push_back(key.base.clone());
        }
        state.entries.insert(key.base, (key.fingerprint, response));
    }

    /// Returns the number of cached responses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().map_or(0, |state| state.entries.len())
    }

    /// Returns true when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
