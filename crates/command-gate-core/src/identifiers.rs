// crates/command-gate-core/src/identifiers.rs
// ============================================================================
// Module: Command Gate Identifiers
// Description: Opaque identifiers for requests, sessions, tools, changesets, and jobs.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: rand, serde
// ============================================================================

//! ## Overview
//! Identifiers serialize as plain strings. Request and session identifiers are
//! caller supplied and opaque. Changeset and job identifiers are generated
//! from the OS random source as a fixed prefix plus 32 lowercase hex digits;
//! [`ChangesetId::parse`] enforces that shape so an identifier can be used as
//! a directory name without path traversal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde::Serialize;

use crate::hashing::hex_encode;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Prefix for generated changeset identifiers.
pub const CHANGESET_ID_PREFIX: &str = "cs-";
/// Prefix for generated job identifiers.
pub const JOB_ID_PREFIX: &str = "job-";
/// Random bytes per generated identifier (rendered as 32 hex digits).
const GENERATED_ID_BYTES: usize = 16;
/// Session used when a request omits `session_id`.
pub const DEFAULT_SESSION_ID: &str = "default-session";

// ============================================================================
// SECTION: Request Identity
// ============================================================================

/// Caller-supplied request identifier.
///
/// # Invariants
/// - Opaque UTF-8 string; emptiness is rejected when envelopes are parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Creates a new request identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Caller session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new session identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_ID)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// SECTION: Tool Names
// ============================================================================

/// Dot-namespaced tool name such as `asset.save`.
///
/// # Invariants
/// - The domain is the substring before the first `.`; a name without a dot
///   is its own domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolName(String);

impl ToolName {
    /// Creates a new tool name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the domain prefix of the tool name.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(domain, _)| domain)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ToolName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ToolName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// SECTION: Generated Identifiers
// ============================================================================

/// Audit ledger changeset identifier (`cs-` + 32 hex digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangesetId(String);

impl ChangesetId {
    /// Generates a fresh, unguessable changeset identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{CHANGESET_ID_PREFIX}{}", random_hex()))
    }

    /// Parses a caller-supplied identifier, returning `None` unless it has the
    /// generated shape.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let digits = raw.strip_prefix(CHANGESET_ID_PREFIX)?;
        is_generated_hex(digits).then(|| Self(raw.to_string()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangesetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job identifier (`job-` + 32 hex digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generates a fresh job identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{JOB_ID_PREFIX}{}", random_hex()))
    }

    /// Wraps an existing identifier without validation (lookups only).
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns 32 lowercase hex digits drawn from the OS random source.
#[must_use]
pub fn random_hex() -> String {
    let mut bytes = [0_u8; GENERATED_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

/// Returns true when `digits` is exactly 32 lowercase hex characters.
fn is_generated_hex(digits: &str) -> bool {
    digits.len() == GENERATED_ID_BYTES * 2
        && digits.bytes().all(|byte| byte.is_ascii_digit() || (b'a'..=b'f').contains(&byte))
}
