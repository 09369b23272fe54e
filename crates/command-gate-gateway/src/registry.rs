// crates/command-gate-gateway/src/registry.rs
// ============================================================================
// Module: Tool Registry
// Description: Frozen tool table with schema-checked validation and dispatch.
// Purpose: Route requests to handlers and fingerprint the advertised tool surface.
// Dependencies: command-gate-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Tools are registered on a [`ToolRegistryBuilder`] during startup and
//! frozen by [`ToolRegistryBuilder::build`], which also computes the schema
//! hash exactly once. After that the table is read-only and shared across
//! concurrent callers without locking.
//!
//! Validation and execution are independent entry points: a caller may
//! execute without validating, so [`ToolRegistry::execute`] re-resolves the
//! tool itself.
//!
//! ## Invariants
//! - Only enabled tools with a bound handler are dispatchable.
//! - A finalized result is always a JSON object.
//! - A failed execution always carries at least one diagnostic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use command_gate_core::Diagnostic;
use command_gate_core::ExecutionResult;
use command_gate_core::HashDigest;
use command_gate_core::HashError;
use command_gate_core::RequestEnvelope;
use command_gate_core::ResponseStatus;
use command_gate_core::ToolName;
use command_gate_core::codes;
use command_gate_core::hashing::canonical_json_string;
use command_gate_core::hashing::hash_bytes;
use command_gate_core::schema::PARAMS_ROOT_PATH;
use command_gate_core::validate_value;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::bundle::SchemaBundle;
use crate::context::ToolContext;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Version assigned to tools that do not declare one.
pub const DEFAULT_TOOL_VERSION: &str = "1.0.0";

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Handler outcome: `Ok` on success, `Err` on failure. Both carry a result.
pub type HandlerOutcome = Result<ExecutionResult, ExecutionResult>;

/// Executor bound to a tool name.
pub trait ToolHandler: Send + Sync {
    /// Executes the tool for `request`.
    fn call(&self, ctx: &ToolContext<'_>, request: &RequestEnvelope) -> HandlerOutcome;
}

impl<F> ToolHandler for F
where
    F: Fn(&ToolContext<'_>, &RequestEnvelope) -> HandlerOutcome + Send + Sync,
{
    fn call(&self, ctx: &ToolContext<'_>, request: &RequestEnvelope) -> HandlerOutcome {
        self(ctx, request)
    }
}

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Tool registration request.
#[derive(Clone)]
pub struct ToolSpec {
    /// Dot-namespaced tool name.
    name: String,
    /// Tool version.
    version: String,
    /// Whether the tool is dispatchable and advertised.
    enabled: bool,
    /// Whether the tool mutates host state.
    write: bool,
    /// Explicit params schema (overrides the bundle).
    params_schema: Option<Value>,
    /// Explicit result schema (overrides the bundle).
    result_schema: Option<Value>,
    /// Bound executor.
    handler: Option<Arc<dyn ToolHandler>>,
}

impl ToolSpec {
    /// Declares an enabled, read-only tool bound to a handler function.
    #[must_use]
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ToolContext<'_>, &RequestEnvelope) -> HandlerOutcome + Send + Sync + 'static,
    {
        Self::with_handler(name, Arc::new(handler))
    }

    /// Declares an enabled, read-only tool bound to a shared handler.
    #[must_use]
    pub fn with_handler(name: impl Into<String>, handler: Arc<dyn ToolHandler>) -> Self {
        Self {
            handler: Some(handler),
            ..Self::declared(name)
        }
    }

    /// Declares a tool without an executor; it is listed but never dispatched.
    #[must_use]
    pub fn declared(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: DEFAULT_TOOL_VERSION.to_string(),
            enabled: true,
            write: false,
            params_schema: None,
            result_schema: None,
            handler: None,
        }
    }

    /// Marks the tool as mutating.
    #[must_use]
    pub const fn write(mut self) -> Self {
        self.write = true;
        self
    }

    /// Marks the tool as disabled.
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Sets the tool version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets an explicit params schema.
    #[must_use]
    pub fn params_schema(mut self, schema: Value) -> Self {
        self.params_schema = Some(schema);
        self
    }

    /// Sets an explicit result schema.
    #[must_use]
    pub fn result_schema(mut self, schema: Value) -> Self {
        self.result_schema = Some(schema);
        self
    }
}

/// Registered tool.
#[derive(Clone)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: ToolName,
    /// Substring of the name before the first dot.
    pub domain: String,
    /// Tool version.
    pub version: String,
    /// Whether the tool is dispatchable and advertised.
    pub enabled: bool,
    /// Whether the tool mutates host state.
    pub write: bool,
    /// Params schema fragment.
    pub params_schema: Option<Value>,
    /// Result schema fragment.
    pub result_schema: Option<Value>,
    /// Bound executor.
    handler: Option<Arc<dyn ToolHandler>>,
}

impl ToolDefinition {
    /// Returns true when the tool can be dispatched.
    #[must_use]
    pub fn is_dispatchable(&self) -> bool {
        self.enabled && self.handler.is_some()
    }
}

/// Initialization phase of the registry.
pub struct ToolRegistryBuilder {
    /// Bundle consulted for schemas a [`ToolSpec`] leaves unset.
    bundle: SchemaBundle,
    /// Registered tools keyed by name.
    tools: BTreeMap<String, ToolDefinition>,
}

impl ToolRegistryBuilder {
    /// Creates a builder resolving schemas from `bundle`.
    #[must_use]
    pub const fn new(bundle: SchemaBundle) -> Self {
        Self {
            bundle,
            tools: BTreeMap::new(),
        }
    }

    /// Registers a tool, replacing any earlier tool of the same name.
    pub fn register(&mut self, spec: ToolSpec) -> &mut Self {
        let bundled = self.bundle.get(&spec.name).cloned().unwrap_or_default();
        let name = ToolName::new(spec.name);
        let definition = ToolDefinition {
            domain: name.domain().to_string(),
            version: spec.version,
            enabled: spec.enabled,
            write: spec.write,
            params_schema: spec.params_schema.or(bundled.params_schema),
            result_schema: spec.result_schema.or(bundled.result_schema),
            handler: spec.handler,
            name,
        };
        self.tools.insert(definition.name.as_str().to_string(), definition);
        self
    }

    /// Freezes the table and computes the schema hash.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when a schema cannot be canonicalized.
    pub fn build(self) -> Result<ToolRegistry, HashError> {
        let schema_hash = compute_schema_hash(&self.tools)?;
        Ok(ToolRegistry {
            tools: self.tools,
            schema_hash,
        })
    }
}

/// Hashes `name|params|result\n` for each enabled tool in name order.
fn compute_schema_hash(tools: &BTreeMap<String, ToolDefinition>) -> Result<HashDigest, HashError> {
    let mut material = String::new();
    for tool in tools.values().filter(|tool| tool.enabled) {
        material.push_str(tool.name.as_str());
        material.push('|');
        material.push_str(&canonical_schema(tool.params_schema.as_ref())?);
        material.push('|');
        material.push_str(&canonical_schema(tool.result_schema.as_ref())?);
        material.push('\n');
    }
    Ok(hash_bytes(material.as_bytes()))
}

/// Canonical schema text; an absent schema renders as `null`.
fn canonical_schema(schema: Option<&Value>) -> Result<String, HashError> {
    schema.map_or_else(|| Ok("null".to_string()), canonical_json_string)
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Tool descriptor returned by discovery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    /// Tool name.
    pub name: String,
    /// Tool domain.
    pub domain: String,
    /// Tool version.
    pub version: String,
    /// Enabled flag.
    pub enabled: bool,
    /// Write flag.
    pub write: bool,
    /// Params schema when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params_schema: Option<Value>,
    /// Result schema when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_schema: Option<Value>,
}

/// Frozen tool table.
pub struct ToolRegistry {
    /// Tools keyed by name.
    tools: BTreeMap<String, ToolDefinition>,
    /// Capability fingerprint over enabled tools.
    schema_hash: HashDigest,
}

impl ToolRegistry {
    /// Returns the registered tool named `name`, enabled or not.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// Returns true when `name` is a registered write tool.
    #[must_use]
    pub fn is_write_tool(&self, name: &str) -> bool {
        self.tools.get(name).is_some_and(|tool| tool.write)
    }

    /// Returns the schema hash.
    #[must_use]
    pub const fn schema_hash(&self) -> &HashDigest {
        &self.schema_hash
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns true when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validates `request` against the target tool's params schema.
    ///
    /// # Errors
    ///
    /// Returns a `TOOL_NOT_FOUND` or `SCHEMA_INVALID_PARAMS` diagnostic.
    pub fn validate(&self, request: &RequestEnvelope) -> Result<(), Diagnostic> {
        let (tool, _) = self.resolve(request.tool.as_str())?;
        validate_value(&request.params, tool.params_schema.as_ref(), PARAMS_ROOT_PATH).map_err(|violation| {
            Diagnostic::error(codes::SCHEMA_INVALID_PARAMS, "Request params failed schema validation.")
                .with_detail(violation.message)
                .with_suggestion("Call tools.list with include_schemas=true and retry with schema-compliant params.")
        })
    }

    /// Executes `request`, finalizing the handler's result.
    ///
    /// # Errors
    ///
    /// Returns the finalized failure result when the tool cannot be resolved
    /// or the handler fails.
    pub fn execute(&self, ctx: &ToolContext<'_>, request: &RequestEnvelope) -> HandlerOutcome {
        let (_, handler) = self.resolve(request.tool.as_str()).map_err(ExecutionResult::failure)?;
        match handler.call(ctx, request) {
            Ok(result) => Ok(finalize(result)),
            Err(mut result) => {
                if result.diagnostics.is_empty() {
                    result.push_diagnostic(
                        Diagnostic::error(codes::INTERNAL_EXCEPTION, "Tool execution failed without diagnostics.")
                            .with_detail(request.tool.as_str()),
                    );
                }
                Err(finalize(result.with_status(ResponseStatus::Error)))
            }
        }
    }

    /// Lists enabled tools in name order.
    #[must_use]
    pub fn list_tools(&self, include_schemas: bool, domain: Option<&str>) -> Vec<ToolDescriptor> {
        let domain = domain.filter(|domain| !domain.is_empty());
        self.tools
            .values()
            .filter(|tool| tool.enabled)
            .filter(|tool| domain.is_none_or(|domain| tool.domain.eq_ignore_ascii_case(domain)))
            .map(|tool| ToolDescriptor {
                name: tool.name.as_str().to_string(),
                domain: tool.domain.clone(),
                version: tool.version.clone(),
                enabled: tool.enabled,
                write: tool.write,
                params_schema: if include_schemas { tool.params_schema.clone() } else { None },
                result_schema: if include_schemas { tool.result_schema.clone() } else { None },
            })
            .collect()
    }

    /// Resolves an enabled tool together with its handler.
    fn resolve(&self, name: &str) -> Result<(&ToolDefinition, &dyn ToolHandler), Diagnostic> {
        self.tools
            .get(name)
            .filter(|tool| tool.enabled)
            .and_then(|tool| tool.handler.as_deref().map(|handler| (tool, handler)))
            .ok_or_else(|| tool_not_found(name))
    }
}

/// Builds the `TOOL_NOT_FOUND` diagnostic.
fn tool_not_found(name: &str) -> Diagnostic {
    Diagnostic::error(codes::TOOL_NOT_FOUND, "Requested tool is not available.")
        .with_detail(format!("tool={name}"))
        .with_suggestion("Call tools.list and use an enabled tool.")
}

/// Guarantees an object result.
fn finalize(mut result: ExecutionResult) -> ExecutionResult {
    if !result.result.is_object() {
        result.result = Value::Object(Map::new());
    }
    result
}
