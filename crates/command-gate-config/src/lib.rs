// crates/command-gate-config/src/lib.rs
// ============================================================================
// Module: Command Gate Config Library
// Description: Canonical config model, validation, and schema generation.
// Purpose: Single source of truth for command-gate.toml semantics.
// Dependencies: command-gate-core, serde, toml
// ============================================================================

//! ## Overview
//! `command-gate-config` defines the configuration model for the command
//! gateway: protocol negotiation, schema bundle locations, ledger root and
//! paging limits, confirmation token lifetime, policy, lock leases, the
//! idempotency cache, and the audit sink. Loading is strict and fails closed;
//! only a missing default file falls back to built-in defaults.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;
pub mod schema;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
pub use schema::config_schema;
