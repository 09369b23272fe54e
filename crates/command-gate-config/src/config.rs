// crates/command-gate-config/src/config.rs
// ============================================================================
// Module: Command Gate Configuration
// Description: Configuration loading and validation for the command gateway.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: command-gate-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section is optional and defaults to the values documented on its
//! type. An explicitly requested file must exist; when no path is given and
//! the default `command-gate.toml` is absent, built-in defaults are used.
//! Loading always finishes with [`GatewayConfig::validate`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use command_gate_core::confirm::DEFAULT_CONFIRM_TTL;
use command_gate_core::confirm::DEFAULT_MAX_PENDING;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "command-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "COMMAND_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Protocol version advertised by default.
pub(crate) const DEFAULT_PROTOCOL_VERSION: &str = "command-gate/1.0";
/// Request protocol prefix accepted by default.
pub(crate) const DEFAULT_PROTOCOL_PREFIX: &str = "command-gate/1";
/// Engine version used when a request omits one.
pub(crate) const DEFAULT_ENGINE_VERSION: &str = "unknown";
/// Preferred schema bundle path.
pub(crate) const DEFAULT_BUNDLE_V2: &str = "resources/schemas_v2_tools.json";
/// Fallback schema bundle path.
pub(crate) const DEFAULT_BUNDLE_V1: &str = "resources/schemas_v1_tools.json";
/// Default changeset ledger root.
pub(crate) const DEFAULT_LEDGER_ROOT: &str = "state/changesets";
/// Default page size for changeset listing.
pub(crate) const DEFAULT_LIST_LIMIT: usize = 50;
/// Hard ceiling on the changeset page size.
pub const MAX_LIST_LIMIT_CEILING: usize = 200;
/// Maximum confirmation token lifetime in seconds.
pub(crate) const MAX_CONFIRM_TTL_SECONDS: u64 = 3600;
/// Default policy version recorded in changesets.
pub(crate) const DEFAULT_POLICY_VERSION: &str = "policy-1";
/// Default write lock lease in milliseconds.
pub(crate) const DEFAULT_LEASE_MS: u64 = 30_000;
/// Default idempotency cache capacity.
pub(crate) const DEFAULT_IDEMPOTENCY_ENTRIES: usize = 1024;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Command gateway configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Protocol negotiation settings.
    #[serde(default)]
    pub gateway: GatewaySection,
    /// Schema bundle locations.
    #[serde(default)]
    pub schemas: SchemasConfig,
    /// Changeset ledger settings.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Confirmation token settings.
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    /// Write policy settings.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Resource lock settings.
    #[serde(default)]
    pub locks: LockConfig,
    /// Idempotency cache settings.
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    /// Audit sink selection.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl GatewayConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (resolved, explicit) = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = match fs::read(&resolved) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound && !explicit => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(err) => return Err(ConfigError::Io(err.to_string())),
        };
        Self::from_bytes(&bytes)
    }

    /// Parses and validates configuration from raw file bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bytes exceed limits, are not UTF-8,
    /// fail to parse, or fail validation.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gateway.validate()?;
        self.schemas.validate()?;
        self.ledger.validate()?;
        self.confirmation.validate()?;
        self.policy.validate()?;
        self.locks.validate()?;
        self.idempotency.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

/// Protocol negotiation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    /// Protocol version advertised by `tools.list` and `system.health`.
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
    /// Prefix every request protocol must start with.
    #[serde(default = "default_protocol_prefix")]
    pub protocol_prefix: String,
    /// Engine version recorded when a request omits `context.engine_version`.
    #[serde(default = "default_engine_version")]
    pub engine_version: String,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            protocol_version: default_protocol_version(),
            protocol_prefix: default_protocol_prefix(),
            engine_version: default_engine_version(),
        }
    }
}

impl GatewaySection {
    /// Validates protocol settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol_version.trim().is_empty() {
            return Err(ConfigError::Invalid("gateway.protocol_version must be non-empty".to_string()));
        }
        if self.protocol_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("gateway.protocol_prefix must be non-empty".to_string()));
        }
        if !self.protocol_version.starts_with(&self.protocol_prefix) {
            return Err(ConfigError::Invalid(
                "gateway.protocol_version must start with gateway.protocol_prefix".to_string(),
            ));
        }
        if self.engine_version.trim().is_empty() {
            return Err(ConfigError::Invalid("gateway.engine_version must be non-empty".to_string()));
        }
        Ok(())
    }
}

/// Schema bundle configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemasConfig {
    /// Candidate bundle files, preferred first.
    #[serde(default = "default_bundle_paths")]
    pub bundle_paths: Vec<String>,
}

impl Default for SchemasConfig {
    fn default() -> Self {
        Self {
            bundle_paths: default_bundle_paths(),
        }
    }
}

impl SchemasConfig {
    /// Validates bundle paths.
    fn validate(&self) -> Result<(), ConfigError> {
        for path in &self.bundle_paths {
            validate_path_string("schemas.bundle_paths", path)?;
        }
        Ok(())
    }

    /// Returns the bundle paths as filesystem paths.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.bundle_paths.iter().map(PathBuf::from).collect()
    }
}

/// Changeset ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Directory holding one subdirectory per changeset.
    #[serde(default = "default_ledger_root")]
    pub root: String,
    /// Page size used when `changeset.list` omits `limit`.
    #[serde(default = "default_list_limit")]
    pub default_list_limit: usize,
    /// Largest page size a caller may request.
    #[serde(default = "default_max_list_limit")]
    pub max_list_limit: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            root: default_ledger_root(),
            default_list_limit: default_list_limit(),
            max_list_limit: default_max_list_limit(),
        }
    }
}

impl LedgerConfig {
    /// Validates ledger settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("ledger.root", &self.root)?;
        if self.max_list_limit == 0 || self.max_list_limit > MAX_LIST_LIMIT_CEILING {
            return Err(ConfigError::Invalid(format!(
                "ledger.max_list_limit must be between 1 and {MAX_LIST_LIMIT_CEILING}"
            )));
        }
        if self.default_list_limit == 0 || self.default_list_limit > self.max_list_limit {
            return Err(ConfigError::Invalid(
                "ledger.default_list_limit must be between 1 and ledger.max_list_limit".to_string(),
            ));
        }
        Ok(())
    }
}

/// Confirmation token configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfirmationConfig {
    /// Token lifetime in seconds.
    #[serde(default = "default_confirm_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Cap on outstanding tokens per guard.
    #[serde(default = "default_confirm_max_pending")]
    pub max_pending: usize,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_confirm_ttl_seconds(),
            max_pending: default_confirm_max_pending(),
        }
    }
}

impl ConfirmationConfig {
    /// Validates token settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_seconds == 0 || self.ttl_seconds > MAX_CONFIRM_TTL_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "confirmation.ttl_seconds must be between 1 and {MAX_CONFIRM_TTL_SECONDS}"
            )));
        }
        if self.max_pending == 0 {
            return Err(ConfigError::Invalid("confirmation.max_pending must be > 0".to_string()));
        }
        Ok(())
    }

    /// Returns the token lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Write policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Policy version recorded into every changeset.
    #[serde(default = "default_policy_version")]
    pub version: String,
    /// Start with write tools blocked.
    #[serde(default)]
    pub safe_mode: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            version: default_policy_version(),
            safe_mode: false,
        }
    }
}

impl PolicyConfig {
    /// Validates policy settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::Invalid("policy.version must be non-empty".to_string()));
        }
        Ok(())
    }
}

/// Resource lock configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockConfig {
    /// Lease granted to a write tool for its lock key, in milliseconds.
    #[serde(default = "default_lease_ms")]
    pub lease_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_ms: default_lease_ms(),
        }
    }
}

impl LockConfig {
    /// Validates lock settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.lease_ms == 0 {
            return Err(ConfigError::Invalid("locks.lease_ms must be > 0".to_string()));
        }
        Ok(())
    }

    /// Returns the lease as a duration.
    #[must_use]
    pub const fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }
}

/// Idempotency cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdempotencyConfig {
    /// Maximum cached responses before FIFO eviction.
    #[serde(default = "default_idempotency_entries")]
    pub max_entries: usize,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            max_entries: default_idempotency_entries(),
        }
    }
}

impl IdempotencyConfig {
    /// Validates cache settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == 0 {
            return Err(ConfigError::Invalid("idempotency.max_entries must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// Discard audit events.
    #[default]
    None,
    /// JSON lines on stderr.
    Stderr,
    /// JSON lines appended to a file.
    File,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink receiving one event per routed request.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Audit log path (JSON lines); required for the file sink.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        if self.sink == AuditSinkKind::File && self.path.is_none() {
            return Err(ConfigError::Invalid("audit.sink = \"file\" requires audit.path".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
///
/// The boolean is true when the path was requested explicitly.
fn resolve_path(path: Option<&Path>) -> Result<(PathBuf, bool), ConfigError> {
    if let Some(path) = path {
        return Ok((path.to_path_buf(), true));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok((PathBuf::from(env_path), true));
    }
    Ok((PathBuf::from(DEFAULT_CONFIG_NAME), false))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default advertised protocol version.
pub(crate) fn default_protocol_version() -> String {
    DEFAULT_PROTOCOL_VERSION.to_string()
}

/// Default accepted protocol prefix.
pub(crate) fn default_protocol_prefix() -> String {
    DEFAULT_PROTOCOL_PREFIX.to_string()
}

/// Default engine version.
pub(crate) fn default_engine_version() -> String {
    DEFAULT_ENGINE_VERSION.to_string()
}

/// Default bundle candidates, newest first.
pub(crate) fn default_bundle_paths() -> Vec<String> {
    vec![DEFAULT_BUNDLE_V2.to_string(), DEFAULT_BUNDLE_V1.to_string()]
}

/// Default ledger root.
pub(crate) fn default_ledger_root() -> String {
    DEFAULT_LEDGER_ROOT.to_string()
}

/// Default changeset page size.
pub(crate) const fn default_list_limit() -> usize {
    DEFAULT_LIST_LIMIT
}

/// Default maximum changeset page size.
pub(crate) const fn default_max_list_limit() -> usize {
    MAX_LIST_LIMIT_CEILING
}

/// Default token lifetime in seconds.
pub(crate) const fn default_confirm_ttl_seconds() -> u64 {
    DEFAULT_CONFIRM_TTL.as_secs()
}

/// Default outstanding token cap.
pub(crate) const fn default_confirm_max_pending() -> usize {
    DEFAULT_MAX_PENDING
}

/// Default policy version.
pub(crate) fn default_policy_version() -> String {
    DEFAULT_POLICY_VERSION.to_string()
}

/// Default lock lease.
pub(crate) const fn default_lease_ms() -> u64 {
    DEFAULT_LEASE_MS
}

/// Default idempotency cache capacity.
pub(crate) const fn default_idempotency_entries() -> usize {
    DEFAULT_IDEMPOTENCY_ENTRIES
}
