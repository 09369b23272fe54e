// crates/command-gate-gateway/src/bundle.rs
// ============================================================================
// Module: Schema Bundle
// Description: Startup-time loading of per-tool params and result schemas.
// Purpose: Resolve tool schemas from a versioned resource file without failing startup.
// Dependencies: jsonschema, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! A schema bundle is a JSON object mapping tool names to
//! `{params_schema?, result_schema?}`. [`SchemaBundle::load_preferred`] walks
//! the configured paths in order and uses the first file that exists. Any
//! failure degrades to an empty bundle and is logged, so tools register
//! without schemas and dispatch unchecked.
//!
//! Every schema is compiled once as a Draft 2020-12 document and a failure is
//! logged. Fragments are kept as loaded either way: validation runs through
//! the subset validator in `command_gate_core::schema`, which accepts forms
//! the meta-schema rejects (upper-case type names, negative counts).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use jsonschema::Draft;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum bundle file size in bytes.
pub const MAX_BUNDLE_FILE_SIZE: u64 = 8 * 1024 * 1024;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Schemas resolved for a single tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolSchemas {
    /// Params schema fragment.
    pub params_schema: Option<Value>,
    /// Result schema fragment.
    pub result_schema: Option<Value>,
}

/// Errors raised while reading a bundle file.
#[derive(Debug, Error)]
pub enum BundleError {
    /// File could not be read.
    #[error("schema bundle io error: {0}")]
    Io(String),
    /// File exceeds the size limit.
    #[error("schema bundle exceeds size limit ({0} bytes)")]
    TooLarge(u64),
    /// File is not valid JSON.
    #[error("schema bundle parse error: {0}")]
    Parse(String),
    /// Root value is not a JSON object.
    #[error("schema bundle root must be a json object")]
    NotAnObject,
}

/// Tool name to schema mapping loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct SchemaBundle {
    /// File the bundle was read from, if any.
    source: Option<PathBuf>,
    /// Entries keyed by tool name.
    entries: BTreeMap<String, ToolSchemas>,
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl SchemaBundle {
    /// Returns a bundle with no entries.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads the first existing bundle among `paths`, degrading to an empty
    /// bundle on any failure.
    #[must_use]
    pub fn load_preferred(paths: &[PathBuf]) -> Self {
        let Some(path) = paths.iter().find(|path| path.is_file()) else {
            tracing::warn!(candidates = paths.len(), "no schema bundle found; tools dispatch without schemas");
            return Self::empty();
        };
        match Self::load(path) {
            Ok(bundle) => {
                tracing::info!(path = %path.display(), tools = bundle.len(), "schema bundle loaded");
                bundle
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "schema bundle unusable; tools dispatch without schemas");
                Self::empty()
            }
        }
    }

    /// Loads a bundle from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError`] when the file is unreadable, too large, not
    /// JSON, or not a JSON object.
    pub fn load(path: &Path) -> Result<Self, BundleError> {
        let size = fs::metadata(path).map_err(|err| BundleError::Io(err.to_string()))?.len();
        if size > MAX_BUNDLE_FILE_SIZE {
            return Err(BundleError::TooLarge(MAX_BUNDLE_FILE_SIZE));
        }
        let bytes = fs::read(path).map_err(|err: io::Error| BundleError::Io(err.to_string()))?;
        let value: Value =
            serde_json::from_slice(&bytes).map_err(|err| BundleError::Parse(err.to_string()))?;
        let mut bundle = Self::from_value(&value)?;
        bundle.source = Some(path.to_path_buf());
        Ok(bundle)
    }

    /// Builds a bundle from a decoded document.
    ///
    /// Non-object entries are skipped; schemas that fail to compile are kept
    /// and logged.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::NotAnObject`] when the root is not an object.
    pub fn from_value(value: &Value) -> Result<Self, BundleError> {
        let root = value.as_object().ok_or(BundleError::NotAnObject)?;
        let mut entries = BTreeMap::new();
        for (tool, entry) in root {
            let Some(entry) = entry.as_object() else {
                tracing::warn!(tool = %tool, "schema bundle entry is not an object; skipped");
                continue;
            };
            let schemas = ToolSchemas {
                params_schema: checked_schema(tool, "params_schema", entry.get("params_schema")),
                result_schema: checked_schema(tool, "result_schema", entry.get("result_schema")),
            };
            entries.insert(tool.clone(), schemas);
        }
        Ok(Self {
            source: None,
            entries,
        })
    }

    /// Returns the schemas recorded for `tool`.
    #[must_use]
    pub fn get(&self, tool: &str) -> Option<&ToolSchemas> {
        self.entries.get(tool)
    }

    /// Returns the file the bundle was loaded from.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Returns the number of tool entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the bundle has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Returns the schema when present, warning when it is not a valid Draft 2020-12 document.
fn checked_schema(tool: &str, field: &str, schema: Option<&Value>) -> Option<Value> {
    let schema = schema.filter(|schema| !schema.is_null())?;
    if let Err(err) = jsonschema::options().with_draft(Draft::Draft202012).build(schema) {
        tracing::warn!(tool = %tool, field = %field, error = %err, "schema is not valid draft 2020-12; kept as loaded");
    }
    Some(schema.clone())
}

#[cfg(test)]
mod tests;
