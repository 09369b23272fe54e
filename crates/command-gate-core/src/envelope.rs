// crates/command-gate-core/src/envelope.rs
// ============================================================================
// Module: Command Gate Envelopes
// Description: Request envelopes, handler execution results, and response envelopes.
// Purpose: Define the decoded shapes that flow through validation and dispatch.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Requests arrive as decoded JSON trees and are parsed into a
//! [`RequestEnvelope`] with documented defaults: absent `params` become `{}`,
//! absent `session_id` becomes `default-session`, and absent `protocol` takes
//! the gateway's advertised version. Handlers return an [`ExecutionResult`];
//! the router folds it into a [`ResponseEnvelope`] with diagnostics grouped
//! by severity.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::diagnostics::Diagnostic;
use crate::diagnostics::DiagnosticGroups;
use crate::diagnostics::codes;
use crate::identifiers::ChangesetId;
use crate::identifiers::RequestId;
use crate::identifiers::SessionId;
use crate::identifiers::ToolName;

// ============================================================================
// SECTION: Request Envelope
// ============================================================================

/// Host and environment metadata attached to a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Host project identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Host workspace identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    /// Host engine version reported by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,
    /// Caller requests deterministic behavior.
    #[serde(default)]
    pub deterministic: bool,
    /// Caller requests a dry run; write tools skip persistence.
    #[serde(default)]
    pub dry_run: bool,
    /// Idempotency key scoped to session and tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Declared time budget in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<i64>,
    /// Job identifier whose cancellation aborts this request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_token: Option<String>,
}

/// Decoded tool request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestEnvelope {
    /// Protocol version string.
    pub protocol: String,
    /// Caller-supplied request identifier.
    pub request_id: RequestId,
    /// Caller session.
    pub session_id: SessionId,
    /// Target tool name.
    pub tool: ToolName,
    /// Parameter tree; always a JSON object.
    pub params: Value,
    /// Request context.
    pub context: RequestContext,
}

impl RequestEnvelope {
    /// Creates an envelope with default session and context.
    ///
    /// A non-object `params` value is replaced by an empty object.
    #[must_use]
    pub fn new(
        protocol: impl Into<String>,
        request_id: impl Into<RequestId>,
        tool: impl Into<ToolName>,
        params: Value,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            request_id: request_id.into(),
            session_id: SessionId::default(),
            tool: tool.into(),
            params: if params.is_object() { params } else { Value::Object(Map::new()) },
            context: RequestContext::default(),
        }
    }

    /// Replaces the session identifier.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<SessionId>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Replaces the request context.
    #[must_use]
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Parses a decoded JSON request.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError`] when the value is not an object, a required
    /// field is missing or empty, or a field has the wrong JSON type.
    pub fn from_value(value: &Value, default_protocol: &str) -> Result<Self, EnvelopeError> {
        let object = value.as_object().ok_or(EnvelopeError::NotAnObject)?;
        let protocol = optional_string(object, "protocol")?.unwrap_or_else(|| default_protocol.to_string());
        let request_id = required_string(object, "request_id")?;
        let session_id = optional_string(object, "session_id")?
            .filter(|session| !session.is_empty())
            .map_or_else(SessionId::default, SessionId::new);
        let tool = required_string(object, "tool")?;
        let params = match object.get("params") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(params @ Value::Object(_)) => params.clone(),
            Some(_) => {
                return Err(EnvelopeError::InvalidField {
                    field: "params",
                    expected: "object",
                });
            }
        };
        let context = match object.get("context") {
            None | Some(Value::Null) => RequestContext::default(),
            Some(Value::Object(context)) => parse_context(context)?,
            Some(_) => {
                return Err(EnvelopeError::InvalidField {
                    field: "context",
                    expected: "object",
                });
            }
        };
        Ok(Self {
            protocol,
            request_id: RequestId::new(request_id),
            session_id,
            tool: ToolName::new(tool),
            params,
            context,
        })
    }

    /// Returns the string at `params.<field>` when present.
    #[must_use]
    pub fn param_str(&self, field: &str) -> Option<&str> {
        self.params.get(field).and_then(Value::as_str)
    }

    /// Returns the boolean at `params.<field>`, or `default`.
    #[must_use]
    pub fn param_bool(&self, field: &str, default: bool) -> bool {
        self.params.get(field).and_then(Value::as_bool).unwrap_or(default)
    }
}

/// Errors raised while parsing a request envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// The request root is not a JSON object.
    #[error("request envelope must be a json object")]
    NotAnObject,
    /// A required field is missing or empty.
    #[error("{0} is required")]
    MissingField(&'static str),
    /// A field has the wrong JSON type.
    #[error("{field} must be {expected}")]
    InvalidField {
        /// Offending field name.
        field: &'static str,
        /// Expected JSON type.
        expected: &'static str,
    },
}

impl EnvelopeError {
    /// Converts the parse failure into a caller-facing diagnostic.
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(codes::SCHEMA_INVALID_PARAMS, "Request envelope is malformed.")
            .with_detail(self.to_string())
            .with_suggestion("Send an object with request_id, tool, and an object params field.")
    }
}

/// Reads a required, non-empty string field.
fn required_string(object: &Map<String, Value>, field: &'static str) -> Result<String, EnvelopeError> {
    match optional_string(object, field)? {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(EnvelopeError::MissingField(field)),
    }
}

/// Reads an optional string field.
fn optional_string(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, EnvelopeError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(EnvelopeError::InvalidField {
            field,
            expected: "a string",
        }),
    }
}

/// Reads an optional boolean field (absent means false).
fn optional_bool(object: &Map<String, Value>, field: &'static str) -> Result<bool, EnvelopeError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(value)) => Ok(*value),
        Some(_) => Err(EnvelopeError::InvalidField {
            field,
            expected: "a boolean",
        }),
    }
}

/// Parses the `context` object.
fn parse_context(object: &Map<String, Value>) -> Result<RequestContext, EnvelopeError> {
    let timeout_ms = match object.get("timeout_ms") {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.as_i64().ok_or(EnvelopeError::InvalidField {
            field: "timeout_ms",
            expected: "an integer",
        })?),
    };
    Ok(RequestContext {
        project_id: optional_string(object, "project_id")?,
        workspace_id: optional_string(object, "workspace_id")?,
        engine_version: optional_string(object, "engine_version")?,
        deterministic: optional_bool(object, "deterministic")?,
        dry_run: optional_bool(object, "dry_run")?,
        idempotency_key: optional_string(object, "idempotency_key")?.filter(|key| !key.is_empty()),
        timeout_ms,
        cancel_token: optional_string(object, "cancel_token")?.filter(|token| !token.is_empty()),
    })
}

// ============================================================================
// SECTION: Execution Result
// ============================================================================

/// Overall call outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// Succeeded without caveats.
    #[default]
    Ok,
    /// Succeeded with caveats.
    Partial,
    /// Failed.
    Error,
}

impl ResponseStatus {
    /// Returns the wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Partial => "partial",
            Self::Error => "error",
        }
    }
}

/// Deduplicated set of touched resource identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TouchedResources(BTreeSet<String>);

impl TouchedResources {
    /// Adds a resource; empty identifiers are ignored.
    pub fn insert(&mut self, resource: impl Into<String>) {
        let resource = resource.into();
        if !resource.is_empty() {
            self.0.insert(resource);
        }
    }

    /// Returns true when nothing was touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of touched resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates resources in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the resources as a sorted vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for TouchedResources {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut touched = Self::default();
        for resource in iter {
            touched.insert(resource);
        }
        touched
    }
}

/// Handler output finalized by the dispatcher.
///
/// # Invariants
/// - After dispatch `result` is always a JSON object.
/// - `diagnostics` keep generation order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    /// Call outcome.
    pub status: ResponseStatus,
    /// Result object.
    pub result: Value,
    /// Ordered diagnostics.
    pub diagnostics: Vec<Diagnostic>,
    /// Resources affected by the call.
    pub touched: TouchedResources,
}

impl ExecutionResult {
    /// Creates a successful result carrying `result`.
    #[must_use]
    pub fn ok(result: Value) -> Self {
        Self {
            status: ResponseStatus::Ok,
            result,
            diagnostics: Vec::new(),
            touched: TouchedResources::default(),
        }
    }

    /// Creates a failed result with a single diagnostic and an empty object.
    #[must_use]
    pub fn failure(diagnostic: Diagnostic) -> Self {
        Self {
            status: ResponseStatus::Error,
            result: Value::Object(Map::new()),
            diagnostics: vec![diagnostic],
            touched: TouchedResources::default(),
        }
    }

    /// Replaces the status.
    #[must_use]
    pub const fn with_status(mut self, status: ResponseStatus) -> Self {
        self.status = status;
        self
    }

    /// Adds a touched resource.
    #[must_use]
    pub fn touching(mut self, resource: impl Into<String>) -> Self {
        self.touched.insert(resource);
        self
    }

    /// Appends a diagnostic, preserving order.
    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Returns true when any diagnostic is error severity.
    #[must_use]
    pub fn has_error_diagnostic(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Inserts a field into the result object, replacing a non-object result.
    pub fn set_result_field(&mut self, key: &str, value: Value) {
        if !self.result.is_object() {
            self.result = Value::Object(Map::new());
        }
        if let Value::Object(map) = &mut self.result {
            map.insert(key.to_string(), value);
        }
    }
}

// ============================================================================
// SECTION: Response Envelope
// ============================================================================

/// Response timing metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetrics {
    /// Wall time spent in the pipeline.
    pub duration_ms: u64,
}

/// Response returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Protocol version advertised by the gateway.
    pub protocol: String,
    /// Echoed request identifier (empty when unreadable).
    pub request_id: String,
    /// Call outcome.
    pub status: ResponseStatus,
    /// Result object.
    pub result: Value,
    /// Changeset recorded for the call, if any.
    pub changeset_id: Option<ChangesetId>,
    /// Sorted touched resources.
    pub touched_packages: Vec<String>,
    /// Diagnostics grouped by severity.
    pub diagnostics: DiagnosticGroups,
    /// Produced artifacts (reserved; always empty in this gateway).
    pub artifacts: Vec<Value>,
    /// Timing metrics.
    pub metrics: ResponseMetrics,
    /// True when served from the idempotency cache.
    pub idempotent_replay: bool,
}

impl ResponseEnvelope {
    /// Builds a response from a finalized execution result.
    #[must_use]
    pub fn from_result(
        protocol: impl Into<String>,
        request_id: impl Into<String>,
        result: ExecutionResult,
        changeset_id: Option<ChangesetId>,
        duration_ms: u64,
    ) -> Self {
        let result_object =
            if result.result.is_object() { result.result } else { Value::Object(Map::new()) };
        Self {
            protocol: protocol.into(),
            request_id: request_id.into(),
            status: result.status,
            result: result_object,
            changeset_id,
            touched_packages: result.touched.to_vec(),
            diagnostics: DiagnosticGroups::from_ordered(&result.diagnostics),
            artifacts: Vec::new(),
            metrics: ResponseMetrics {
                duration_ms,
            },
            idempotent_replay: false,
        }
    }

    /// Builds an error response carrying one diagnostic.
    #[must_use]
    pub fn rejected(
        protocol: impl Into<String>,
        request_id: impl Into<String>,
        diagnostic: Diagnostic,
        duration_ms: u64,
    ) -> Self {
        Self::from_result(protocol, request_id, ExecutionResult::failure(diagnostic), None, duration_ms)
    }
}
