// crates/command-gate-gateway/src/ledger.rs
// ============================================================================
// Module: Changeset Ledger
// Description: Durable per-call audit records with rollback preview and apply.
// Purpose: Persist one queryable record per mutating call and expose its rollback contract.
// Dependencies: command-gate-core, serde, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! Each changeset lives in its own directory under the ledger root:
//!
//! ```text
//! <root>/cs-<32 hex>/
//!     meta.json        metadata, written once
//!     logs.jsonl       append-only event lines
//!     snapshots/       <encoded resource>.before pre-images
//! ```
//!
//! `meta.json` is written last through a temporary sibling and a rename, so a
//! changeset exists only once its metadata is complete. Identifiers are
//! checked against the generated shape before any path is built from them.
//!
//! ## Invariants
//! - Listing order is `created_at` descending, then `changeset_id` ascending.
//! - Rollback preview never writes.
//! - Rollback apply never reports `applied` for state it did not restore.
//! - Log appends, snapshot writes, and rollback apply on one changeset are
//!   serialized by an in-process lock keyed by id.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::fs::OpenOptions;
use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use command_gate_core::ChangesetId;
use command_gate_core::Diagnostic;
use command_gate_core::ExecutionResult;
use command_gate_core::RequestEnvelope;
use command_gate_core::ResponseStatus;
use command_gate_core::SharedClock;
use command_gate_core::Timestamp;
use command_gate_core::codes;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Metadata file name.
pub const META_FILE: &str = "meta.json";
/// Event log file name.
pub const LOG_FILE: &str = "logs.jsonl";
/// Snapshot directory name.
pub const SNAPSHOT_DIR: &str = "snapshots";
/// Snapshot file suffix.
pub const SNAPSHOT_SUFFIX: &str = ".before";
/// The only rollback mode with an implementation.
pub const LOCAL_SNAPSHOT_MODE: &str = "local_snapshot";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Ledger failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Changeset id is malformed or has no metadata.
    #[error("changeset not found: {0}")]
    NotFound(String),
    /// Changeset directories could not be created.
    #[error("failed to create changeset directories: {0}")]
    CreateDirs(String),
    /// Metadata could not be written.
    #[error("failed to write changeset metadata: {0}")]
    WriteMeta(String),
    /// Event log could not be created or appended.
    #[error("failed to write changeset log: {0}")]
    WriteLog(String),
    /// Other filesystem failure.
    #[error("changeset ledger io error: {0}")]
    Io(String),
    /// Rollback mode is not implemented.
    #[error("unsupported rollback mode: {0}")]
    UnsupportedMode(String),
    /// Rollback would need snapshots that were never captured.
    #[error("rollback of {changeset_id} ({mode}) is missing snapshots")]
    MissingSnapshots {
        /// Changeset being rolled back.
        changeset_id: String,
        /// Requested mode.
        mode: String,
    },
    /// Snapshot restore for non-empty changesets is not available.
    #[error("rollback apply unsupported for {changeset_id} with {package_count} packages")]
    RestoreUnsupported {
        /// Changeset being rolled back.
        changeset_id: String,
        /// Number of touched packages.
        package_count: usize,
    },
    /// A per-changeset lock was poisoned.
    #[error("changeset lock poisoned")]
    Poisoned,
}

impl LedgerError {
    /// Converts the failure into a caller-facing diagnostic.
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::NotFound(id) => Diagnostic::error(codes::CHANGESET_NOT_FOUND, "Requested changeset does not exist.")
                .with_detail(id.clone())
                .with_suggestion("Run changeset.list and retry with a valid changeset_id."),
            Self::CreateDirs(dir) => Diagnostic::error(codes::SAVE_FAILED, "Failed to create changeset directories.")
                .with_detail(dir.clone())
                .retriable(),
            Self::WriteMeta(path) => Diagnostic::error(codes::SAVE_FAILED, "Failed to write changeset meta.json")
                .with_detail(path.clone())
                .retriable(),
            Self::WriteLog(path) => Diagnostic::error(codes::SAVE_FAILED, "Failed to write changeset logs.jsonl")
                .with_detail(path.clone())
                .retriable(),
            Self::Io(_) | Self::Poisoned => {
                Diagnostic::error(codes::INTERNAL_EXCEPTION, "Changeset ledger is unavailable.")
                    .with_detail(self.to_string())
                    .retriable()
            }
            Self::UnsupportedMode(mode) => {
                Diagnostic::error(codes::CHANGESET_ROLLBACK_FAILED, "Only local_snapshot mode is currently supported.")
                    .with_detail(format!("requested_mode={mode}"))
            }
            Self::MissingSnapshots {
                changeset_id,
                mode,
            } => Diagnostic::error(
                codes::CHANGESET_ROLLBACK_FAILED,
                "Rollback cannot proceed because snapshots are missing.",
            )
            .with_detail(format!("changeset_id={changeset_id} mode={mode}"))
            .with_suggestion("Use changeset.rollback.preview first and retry with force=true if acceptable."),
            Self::RestoreUnsupported {
                changeset_id,
                package_count,
            } => Diagnostic::error(
                codes::CHANGESET_ROLLBACK_FAILED,
                "Rollback apply is not fully implemented for non-empty changesets yet.",
            )
            .with_detail(format!("changeset_id={changeset_id} package_count={package_count}"))
            .with_suggestion("Use VCS-based revert or implement package snapshot restore."),
        }
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Inputs for [`ChangesetLedger::create`].
#[derive(Debug, Clone, Copy)]
pub struct NewChangeset<'a> {
    /// Originating request.
    pub request: &'a RequestEnvelope,
    /// Finalized execution result.
    pub result: &'a ExecutionResult,
    /// Policy version in force.
    pub policy_version: &'a str,
    /// Registry schema hash (`sha256:<hex>`).
    pub schema_hash: &'a str,
    /// Host engine version.
    pub engine_version: &'a str,
}

/// Persisted changeset metadata (`meta.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangesetMeta {
    /// Changeset identifier.
    pub changeset_id: ChangesetId,
    /// Originating request id.
    pub request_id: String,
    /// Originating session.
    pub session_id: String,
    /// Tool that produced the changeset.
    pub tool: String,
    /// Creation instant (RFC 3339, UTC).
    pub created_at: Timestamp,
    /// Call outcome.
    pub status: ResponseStatus,
    /// Policy version in force.
    pub policy_version: String,
    /// Registry schema hash.
    pub schema_hash: String,
    /// Host engine version.
    pub engine_version: String,
    /// Sorted touched resources.
    pub touched_packages: Vec<String>,
    /// Request-supplied target descriptors.
    pub targets: Vec<Value>,
}

/// Listing filters and paging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Requested page size, clamped to `1..=max_list_limit`.
    pub limit: usize,
    /// Forward offset into the sorted result.
    pub cursor: usize,
    /// Accepted status labels; empty accepts all.
    pub status_in: Vec<String>,
    /// Tool glob (`*`, `?`), ASCII case-insensitive.
    pub tool_glob: Option<String>,
    /// Exact session filter.
    pub session_id: Option<String>,
}

/// One page of listing results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListPage {
    /// Page items, newest first.
    pub items: Vec<ChangesetMeta>,
    /// Offset of the next page, absent on the last page.
    pub next_cursor: Option<usize>,
}

/// Changeset returned by [`ChangesetLedger::get`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangesetRecord {
    /// Changeset identifier.
    pub changeset_id: ChangesetId,
    /// Stored metadata.
    pub meta: ChangesetMeta,
    /// Sorted touched resources.
    pub touched_packages: Vec<String>,
    /// Parsed log entries when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<Value>>,
    /// Sorted snapshot paths relative to the changeset directory when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshots: Option<Vec<String>>,
}

/// Rollback impact analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackImpact {
    /// Resources a rollback would restore.
    pub packages: Vec<String>,
    /// Resources with no captured pre-image.
    pub missing_snapshots: Vec<String>,
    /// Reserved for multi-writer detection; always empty.
    pub conflicts: Vec<String>,
}

/// Result of a rollback preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackPreview {
    /// Changeset identifier.
    pub changeset_id: String,
    /// Normalized mode.
    pub mode: String,
    /// Impact analysis.
    pub impact: RollbackImpact,
}

/// Result of a rollback apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackOutcome {
    /// Resources restored.
    pub touched_packages: Vec<String>,
    /// Whether the rollback completed.
    pub applied: bool,
}

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// Filesystem-backed changeset ledger.
pub struct ChangesetLedger {
    /// Directory holding one subdirectory per changeset.
    root: PathBuf,
    /// Time source for `created_at` and log events.
    clock: SharedClock,
    /// Ceiling on listing page size.
    max_list_limit: usize,
    /// Per-changeset write locks.
    locks: Mutex<BTreeMap<String, Arc<Mutex<()>>>>,
}

impl ChangesetLedger {
    /// Creates a ledger rooted at `root`. No I/O happens until first use.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, clock: SharedClock, max_list_limit: usize) -> Self {
        Self {
            root: root.into(),
            clock,
            max_list_limit: max_list_limit.max(1),
            locks: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the ledger root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persists a changeset for a completed call.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::CreateDirs`], [`LedgerError::WriteLog`], or
    /// [`LedgerError::WriteMeta`]; on error no changeset exists.
    pub fn create(&self, new: &NewChangeset<'_>) -> Result<ChangesetId, LedgerError> {
        self.create_with_id(ChangesetId::generate(), new)
    }

    /// Persists a changeset under a known id; a partial directory is removed
    /// when the log or meta write fails.
    fn create_with_id(&self, changeset_id: ChangesetId, new: &NewChangeset<'_>) -> Result<ChangesetId, LedgerError> {
        let dir = self.root.join(changeset_id.as_str());
        fs::create_dir_all(dir.join(SNAPSHOT_DIR))
            .map_err(|_| LedgerError::CreateDirs(dir.display().to_string()))?;

        let meta = ChangesetMeta {
            changeset_id: changeset_id.clone(),
            request_id: new.request.request_id.as_str().to_string(),
            session_id: new.request.session_id.as_str().to_string(),
            tool: new.request.tool.as_str().to_string(),
            created_at: self.clock.now(),
            status: new.result.status,
            policy_version: new.policy_version.to_string(),
            schema_hash: new.schema_hash.to_string(),
            engine_version: new.engine_version.to_string(),
            touched_packages: new.result.touched.to_vec(),
            targets: new.request.params.get("target").filter(|target| target.is_object()).cloned().into_iter().collect(),
        };
        if let Err(err) = write_changeset_files(&dir, &meta) {
            if let Err(cleanup) = fs::remove_dir_all(&dir) {
                tracing::warn!(dir = %dir.display(), error = %cleanup, "partial changeset left on disk");
            }
            return Err(err);
        }
        tracing::info!(
            changeset_id = %changeset_id,
            tool = %meta.tool,
            touched = meta.touched_packages.len(),
            "changeset created"
        );
        Ok(changeset_id)
    }

    /// Lists changesets matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] when the root cannot be scanned.
    pub fn list(&self, query: &ListQuery) -> Result<ListPage, LedgerError> {
        let mut items = self.scan()?;
        items.retain(|meta| matches_query(meta, query));
        items.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then_with(|| left.changeset_id.cmp(&right.changeset_id))
        });
        let limit = query.limit.clamp(1, self.max_list_limit);
        let start = query.cursor.min(items.len());
        let end = start.saturating_add(limit).min(items.len());
        let next_cursor = (end < items.len()).then_some(end);
        Ok(ListPage {
            items: items.drain(start .. end).collect(),
            next_cursor,
        })
    }

    /// Loads one changeset.
    ///
    /// Malformed log lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] when the metadata is missing or
    /// unreadable.
    pub fn get(&self, raw_id: &str, include_logs: bool, include_snapshots: bool) -> Result<ChangesetRecord, LedgerError> {
        let (changeset_id, meta) = self.load(raw_id)?;
        let dir = self.root.join(changeset_id.as_str());
        let logs = include_logs.then(|| read_log_entries(&dir.join(LOG_FILE)));
        let snapshots = if include_snapshots { Some(list_snapshots(&dir)?) } else { None };
        Ok(ChangesetRecord {
            changeset_id,
            touched_packages: meta.touched_packages.clone(),
            meta,
            logs,
            snapshots,
        })
    }

    /// Computes rollback impact without side effects.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] or [`LedgerError::UnsupportedMode`].
    pub fn preview_rollback(&self, raw_id: &str, mode: &str) -> Result<RollbackPreview, LedgerError> {
        let (changeset_id, meta) = self.load(raw_id)?;
        if !mode.eq_ignore_ascii_case(LOCAL_SNAPSHOT_MODE) {
            return Err(LedgerError::UnsupportedMode(mode.to_string()));
        }
        let snapshots = list_snapshots(&self.root.join(changeset_id.as_str()))?;
        let missing_snapshots =
            if snapshots.is_empty() { meta.touched_packages.clone() } else { Vec::new() };
        Ok(RollbackPreview {
            changeset_id: changeset_id.as_str().to_string(),
            mode: LOCAL_SNAPSHOT_MODE.to_string(),
            impact: RollbackImpact {
                packages: meta.touched_packages,
                missing_snapshots,
                conflicts: Vec::new(),
            },
        })
    }

    /// Applies a rollback under the changeset's lock.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::MissingSnapshots`] when snapshots are missing
    /// and `force` is false, and [`LedgerError::RestoreUnsupported`] for any
    /// changeset that touched resources.
    pub fn apply_rollback(&self, raw_id: &str, mode: &str, force: bool) -> Result<RollbackOutcome, LedgerError> {
        let changeset_id = ChangesetId::parse(raw_id).ok_or_else(|| LedgerError::NotFound(raw_id.to_string()))?;
        self.with_changeset_lock(changeset_id.as_str(), || self.apply_rollback_locked(raw_id, mode, force))
    }

    /// Rollback body; the caller holds the changeset lock.
    fn apply_rollback_locked(&self, raw_id: &str, mode: &str, force: bool) -> Result<RollbackOutcome, LedgerError> {
        let preview = self.preview_rollback(raw_id, mode)?;
        if !preview.impact.missing_snapshots.is_empty() && !force {
            return Err(LedgerError::MissingSnapshots {
                changeset_id: preview.changeset_id,
                mode: preview.mode,
            });
        }
        if !preview.impact.packages.is_empty() {
            return Err(LedgerError::RestoreUnsupported {
                changeset_id: preview.changeset_id,
                package_count: preview.impact.packages.len(),
            });
        }
        let event = json!({
            "event": "rollback_applied",
            "timestamp": self.clock.now(),
            "mode": preview.mode,
            "force": force,
        });
        append_line(&self.root.join(&preview.changeset_id), &event)?;
        tracing::info!(changeset_id = %preview.changeset_id, mode = %preview.mode, "changeset rolled back");
        Ok(RollbackOutcome {
            touched_packages: Vec::new(),
            applied: true,
        })
    }

    /// Appends one event line to the changeset log.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] or [`LedgerError::WriteLog`].
    pub fn append_log(&self, raw_id: &str, event: &Value) -> Result<(), LedgerError> {
        let (changeset_id, _) = self.load(raw_id)?;
        let dir = self.root.join(changeset_id.as_str());
        self.with_changeset_lock(changeset_id.as_str(), || append_line(&dir, event))
    }

    /// Stores a resource pre-image, returning its path relative to the
    /// changeset directory.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] or [`LedgerError::Io`].
    pub fn write_snapshot(&self, raw_id: &str, resource: &str, bytes: &[u8]) -> Result<String, LedgerError> {
        let (changeset_id, _) = self.load(raw_id)?;
        let relative = format!("{SNAPSHOT_DIR}/{}{SNAPSHOT_SUFFIX}", encode_resource(resource));
        let path = self.root.join(changeset_id.as_str()).join(&relative);
        self.with_changeset_lock(changeset_id.as_str(), || {
            fs::write(&path, bytes).map_err(|err| LedgerError::Io(err.to_string()))
        })?;
        Ok(relative)
    }

    /// Parses `raw_id` and reads its metadata.
    fn load(&self, raw_id: &str) -> Result<(ChangesetId, ChangesetMeta), LedgerError> {
        let changeset_id = ChangesetId::parse(raw_id).ok_or_else(|| LedgerError::NotFound(raw_id.to_string()))?;
        let meta = read_meta(&self.root.join(changeset_id.as_str()).join(META_FILE))
            .ok_or_else(|| LedgerError::NotFound(raw_id.to_string()))?;
        Ok((changeset_id, meta))
    }

    /// Reads every well-formed changeset under the root.
    fn scan(&self) -> Result<Vec<ChangesetMeta>, LedgerError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(LedgerError::Io(err.to_string())),
        };
        let mut items = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| LedgerError::Io(err.to_string()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str().filter(|name| ChangesetId::parse(name).is_some()) else {
                continue;
            };
            match read_meta(&entry.path().join(META_FILE)) {
                Some(meta) => items.push(meta),
                None => tracing::debug!(changeset_id = %name, "skipping changeset without readable metadata"),
            }
        }
        Ok(items)
    }

    /// Runs `operation` while holding the lock for `changeset_id`.
    ///
    /// The map entry is dropped once no other caller holds or waits on it, so
    /// the map only tracks changesets with an operation in flight.
    fn with_changeset_lock<T>(
        &self,
        changeset_id: &str,
        operation: impl FnOnce() -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let lock = {
            let mut locks = self.locks.lock().map_err(|_| LedgerError::Poisoned)?;
            Arc::clone(locks.entry(changeset_id.to_string()).or_default())
        };
        let outcome = match lock.lock() {
            Ok(_held) => operation(),
            Err(_) => Err(LedgerError::Poisoned),
        };
        if let Ok(mut locks) = self.locks.lock()
            && locks.get(changeset_id).is_some_and(|entry| Arc::strong_count(entry) <= 2)
        {
            locks.remove(changeset_id);
        }
        outcome
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Applies status, tool glob, and session filters.
fn matches_query(meta: &ChangesetMeta, query: &ListQuery) -> bool {
    if !query.status_in.is_empty() && !query.status_in.iter().any(|status| status == meta.status.as_str()) {
        return false;
    }
    if let Some(glob) = query.tool_glob.as_deref().filter(|glob| !glob.is_empty())
        && !glob_match(glob, &meta.tool)
    {
        return false;
    }
    if let Some(session) = query.session_id.as_deref().filter(|session| !session.is_empty())
        && session != meta.session_id
    {
        return false;
    }
    true
}

/// Matches `text` against a `*`/`?` glob, ASCII case-insensitively.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().map(|ch| ch.to_ascii_lowercase()).collect();
    let text: Vec<char> = text.chars().map(|ch| ch.to_ascii_lowercase()).collect();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&ch) if ch == '?' || ch == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p ..].iter().all(|ch| *ch == '*')
}

/// Encodes a resource id into a file-name-safe form (`~XX` escapes).
pub(crate) fn encode_resource(resource: &str) -> String {
    let mut encoded = String::with_capacity(resource.len());
    for byte in resource.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("~{byte:02X}"));
        }
    }
    encoded
}

/// Appends a line to `<dir>/logs.jsonl`; the caller holds the changeset lock.
fn append_line(dir: &Path, event: &Value) -> Result<(), LedgerError> {
    let path = dir.join(LOG_FILE);
    let write_err = |_: io::Error| LedgerError::WriteLog(path.display().to_string());
    let line = serde_json::to_string(event).map_err(|err| LedgerError::Io(err.to_string()))?;
    let mut file = OpenOptions::new().create(true).append(true).open(&path).map_err(write_err)?;
    writeln!(file, "{line}").map_err(write_err)?;
    file.flush().map_err(write_err)
}

/// Reads and parses a metadata file.
fn read_meta(path: &Path) -> Option<ChangesetMeta> {
    let bytes = fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Parses the event log, skipping malformed lines.
fn read_log_entries(path: &Path) -> Vec<Value> {
    let Ok(file) = fs::File::open(path) else {
        return Vec::new();
    };
    BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(&line).ok())
        .collect()
}

/// Lists snapshot files relative to the changeset directory, sorted.
fn list_snapshots(dir: &Path) -> Result<Vec<String>, LedgerError> {
    let entries = match fs::read_dir(dir.join(SNAPSHOT_DIR)) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(LedgerError::Io(err.to_string())),
    };
    let mut snapshots = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| LedgerError::Io(err.to_string()))?;
        if let Some(name) = entry.file_name().to_str()
            && name.ends_with(SNAPSHOT_SUFFIX)
            && entry.path().is_file()
        {
            snapshots.push(format!("{SNAPSHOT_DIR}/{name}"));
        }
    }
    snapshots.sort();
    Ok(snapshots)
}

/// Writes the empty log and the meta file of a fresh changeset directory.
fn write_changeset_files(dir: &Path, meta: &ChangesetMeta) -> Result<(), LedgerError> {
    let log_path = dir.join(LOG_FILE);
    fs::File::create(&log_path).map_err(|_| LedgerError::WriteLog(log_path.display().to_string()))?;
    let meta_path = dir.join(META_FILE);
    write_json_atomic(&meta_path, meta).map_err(|_| LedgerError::WriteMeta(meta_path.display().to_string()))
}

/// Writes JSON through a temporary sibling and a rename.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    let temp = path.with_extension("json.tmp");
    let mut file = fs::File::create(&temp)?;
    if let Err(err) = file.write_all(&bytes).and_then(|()| file.sync_all()) {
        let _ = fs::remove_file(&temp);
        return Err(err);
    }
    fs::rename(&temp, path)
}

#[cfg(test)]
mod tests;
