// crates/command-gate-cli/src/main.rs
// ============================================================================
// Module: Command Gate CLI Entry Point
// Description: Command dispatcher for gateway requests and ledger inspection.
// Purpose: Run requests, list tools, and inspect or roll back changesets offline.
// Dependencies: clap, command-gate-config, command-gate-core, command-gate-gateway, tracing.
// ============================================================================

//! ## Overview
//! The `command-gate` binary builds a gateway with only the built-in tools
//! and drives it from the command line. `invoke` routes a raw request file;
//! the `tools` and `changeset` subcommands are shorthands that route the
//! matching built-in tool and print its response envelope. Inputs are
//! untrusted: request files are size-limited and every call goes through the
//! same schema-checked pipeline as any other caller.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use command_gate_config::GatewayConfig;
use command_gate_config::config_schema;
use command_gate_core::RequestEnvelope;
use command_gate_core::ResponseEnvelope;
use command_gate_core::ResponseStatus;
use command_gate_core::SystemClock;
use command_gate_core::identifiers::random_hex;
use command_gate_gateway::CommandRouter;
use command_gate_gateway::GatewayServices;
use command_gate_gateway::SchemaBundle;
use command_gate_gateway::ToolRegistryBuilder;
use command_gate_gateway::audit::sink_from_config;
use command_gate_gateway::register_builtin_tools;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum request file size accepted by `invoke`.
const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Environment variable holding the tracing filter.
const LOG_ENV: &str = "COMMAND_GATE_LOG";

/// Filter used when [`LOG_ENV`] is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "warn";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "command-gate", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file path (defaults to `COMMAND_GATE_CONFIG`, then `command-gate.toml`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Route a raw request envelope and print the response.
    Invoke(InvokeCommand),
    /// Tool discovery utilities.
    Tools {
        /// Selected tools subcommand.
        #[command(subcommand)]
        command: ToolsCommand,
    },
    /// Changeset ledger utilities.
    Changeset {
        /// Selected changeset subcommand.
        #[command(subcommand)]
        command: ChangesetCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for `invoke`.
#[derive(Args, Debug)]
struct InvokeCommand {
    /// Request file, or `-` for stdin.
    #[arg(long, value_name = "FILE")]
    request: String,
}

/// Tool discovery subcommands.
#[derive(Subcommand, Debug)]
enum ToolsCommand {
    /// List enabled tools.
    List(ToolsListCommand),
    /// Print the registry schema hash.
    Hash,
}

/// Arguments for `tools list`.
#[derive(Args, Debug)]
struct ToolsListCommand {
    /// Only list tools in this domain.
    #[arg(long)]
    domain: Option<String>,
    /// Omit params and result schemas.
    #[arg(long)]
    no_schemas: bool,
}

/// Changeset subcommands.
#[derive(Subcommand, Debug)]
enum ChangesetCommand {
    /// List changesets newest first.
    List(ChangesetListCommand),
    /// Show one changeset.
    Get(ChangesetGetCommand),
    /// Preview a rollback.
    Preview(ChangesetRollbackCommand),
    /// Apply a rollback.
    Apply(ChangesetApplyCommand),
}

/// Arguments for `changeset list`.
#[derive(Args, Debug)]
struct ChangesetListCommand {
    /// Page size.
    #[arg(long)]
    limit: Option<i64>,
    /// Forward offset returned as `next_cursor`.
    #[arg(long)]
    cursor: Option<u64>,
    /// Keep only these statuses (repeatable).
    #[arg(long = "status", value_name = "STATUS")]
    statuses: Vec<String>,
    /// Tool name glob (`*` and `?`).
    #[arg(long, value_name = "GLOB")]
    tool_glob: Option<String>,
    /// Exact session id.
    #[arg(long, value_name = "SESSION")]
    session: Option<String>,
}

/// Arguments for `changeset get`.
#[derive(Args, Debug)]
struct ChangesetGetCommand {
    /// Changeset id.
    id: String,
    /// Skip the log stream.
    #[arg(long)]
    no_logs: bool,
    /// Include snapshot paths.
    #[arg(long)]
    snapshots: bool,
}

/// Arguments for `changeset preview`.
#[derive(Args, Debug)]
struct ChangesetRollbackCommand {
    /// Changeset id.
    id: String,
    /// Rollback mode.
    #[arg(long)]
    mode: Option<String>,
}

/// Arguments for `changeset apply`.
#[derive(Args, Debug)]
struct ChangesetApplyCommand {
    /// Changeset id.
    id: String,
    /// Rollback mode.
    #[arg(long)]
    mode: Option<String>,
    /// Apply even when snapshots are missing.
    #[arg(long)]
    force: bool,
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate the configuration.
    Validate,
    /// Print the configuration JSON Schema.
    Schema,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error carrying a printable message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Errors raised while reading a bounded input.
#[derive(Debug, Error)]
enum ReadLimitError {
    /// Underlying read failure.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Input exceeds the limit.
    #[error("input exceeds {limit} bytes")]
    TooLarge {
        /// Allowed limit in bytes.
        limit: usize,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Installs the stderr tracing subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Executes the CLI command dispatcher.
fn run(cli: Cli) -> CliResult<ExitCode> {
    if let Commands::Config {
        command: ConfigCommand::Schema,
    } = cli.command
    {
        write_pretty_json(&config_schema())?;
        return Ok(ExitCode::SUCCESS);
    }
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Invoke(command) => command_invoke(&config, &command),
        Commands::Tools {
            command,
        } => command_tools(&config, command),
        Commands::Changeset {
            command,
        } => command_changeset(&config, command),
        Commands::Config {
            ..
        } => {
            write_stdout_line("config ok")?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Loads and validates configuration.
fn load_config(path: Option<&Path>) -> CliResult<GatewayConfig> {
    GatewayConfig::load(path).map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

// ============================================================================
// SECTION: Gateway Construction
// ============================================================================

/// Builds a router serving only the built-in tools.
fn build_router(config: &GatewayConfig) -> CliResult<CommandRouter> {
    let bundle = SchemaBundle::load_preferred(&config.schemas.paths());
    let mut builder = ToolRegistryBuilder::new(bundle);
    register_builtin_tools(&mut builder);
    let registry =
        builder.build().map_err(|err| CliError::new(format!("failed to build tool registry: {err}")))?;
    let audit =
        sink_from_config(&config.audit).map_err(|err| CliError::new(format!("failed to open audit sink: {err}")))?;
    let services = GatewayServices::new(config, SystemClock::shared()).with_audit(audit);
    Ok(CommandRouter::new(registry, services))
}

/// Routes a built-in `tool` call with `params`.
fn call_builtin(config: &GatewayConfig, tool: &str, params: Value) -> CliResult<ExitCode> {
    let router = build_router(config)?;
    let request_id = format!("cli-{}", random_hex());
    tracing::debug!(tool, request_id = %request_id, "routing cli command");
    let request = RequestEnvelope::new(config.gateway.protocol_version.clone(), request_id, tool, params);
    emit_response(&router.handle(&request))
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes `invoke`.
fn command_invoke(config: &GatewayConfig, command: &InvokeCommand) -> CliResult<ExitCode> {
    let bytes = if command.request == "-" {
        read_with_limit(std::io::stdin().lock(), MAX_REQUEST_BYTES)
    } else {
        File::open(&command.request)
            .map_err(ReadLimitError::from)
            .and_then(|file| read_with_limit(file, MAX_REQUEST_BYTES))
    }
    .map_err(|err| CliError::new(format!("failed to read request {}: {err}", command.request)))?;
    let raw: Value = serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("request is not valid json: {err}")))?;
    let router = build_router(config)?;
    emit_response(&router.handle_json(&raw))
}

/// Dispatches `tools` subcommands.
fn command_tools(config: &GatewayConfig, command: ToolsCommand) -> CliResult<ExitCode> {
    match command {
        ToolsCommand::List(command) => {
            let mut params = json!({"include_schemas": !command.no_schemas});
            if let Some(domain) = command.domain {
                params["domain"] = Value::String(domain);
            }
            call_builtin(config, "tools.list", params)
        }
        ToolsCommand::Hash => {
            let router = build_router(config)?;
            write_stdout_line(&router.registry().schema_hash().prefixed())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Dispatches `changeset` subcommands.
fn command_changeset(config: &GatewayConfig, command: ChangesetCommand) -> CliResult<ExitCode> {
    match command {
        ChangesetCommand::List(command) => call_builtin(config, "changeset.list", changeset_list_params(command)),
        ChangesetCommand::Get(command) => call_builtin(
            config,
            "changeset.get",
            json!({
                "changeset_id": command.id,
                "include_logs": !command.no_logs,
                "include_snapshots": command.snapshots,
            }),
        ),
        ChangesetCommand::Preview(command) => {
            call_builtin(config, "changeset.rollback.preview", rollback_params(command.id, command.mode, None))
        }
        ChangesetCommand::Apply(command) => call_builtin(
            config,
            "changeset.rollback.apply",
            rollback_params(command.id, command.mode, Some(command.force)),
        ),
    }
}

// ============================================================================
// SECTION: Params
// ============================================================================

/// Builds `changeset.list` params, omitting unset filters.
fn changeset_list_params(command: ChangesetListCommand) -> Value {
    let mut params = Map::new();
    if let Some(limit) = command.limit {
        params.insert("limit".to_string(), json!(limit));
    }
    if let Some(cursor) = command.cursor {
        params.insert("cursor".to_string(), json!(cursor));
    }
    if !command.statuses.is_empty() {
        params.insert("status_in".to_string(), json!(command.statuses));
    }
    if let Some(glob) = command.tool_glob {
        params.insert("tool_glob".to_string(), Value::String(glob));
    }
    if let Some(session) = command.session {
        params.insert("session_id".to_string(), Value::String(session));
    }
    Value::Object(params)
}

/// Builds rollback params.
fn rollback_params(id: String, mode: Option<String>, force: Option<bool>) -> Value {
    let mut params = Map::new();
    params.insert("changeset_id".to_string(), Value::String(id));
    if let Some(mode) = mode {
        params.insert("mode".to_string(), Value::String(mode));
    }
    if let Some(force) = force {
        params.insert("force".to_string(), Value::Bool(force));
    }
    Value::Object(params)
}

// ============================================================================
// SECTION: Input
// ============================================================================

/// Reads at most `max_bytes` from `reader`, failing when more is available.
fn read_with_limit(reader: impl Read, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let read_limit = u64::try_from(max_bytes).unwrap_or(u64::MAX).saturating_add(1);
    let mut bytes = Vec::new();
    reader.take(read_limit).read_to_end(&mut bytes)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Exit code for a routed response.
fn exit_code_for(status: ResponseStatus) -> ExitCode {
    if status == ResponseStatus::Error { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

/// Prints a response envelope and maps its status to an exit code.
fn emit_response(response: &ResponseEnvelope) -> CliResult<ExitCode> {
    let value = serde_json::to_value(response)
        .map_err(|err| CliError::new(format!("failed to serialize response: {err}")))?;
    write_pretty_json(&value)?;
    Ok(exit_code_for(response.status))
}

/// Writes pretty JSON to stdout.
fn write_pretty_json(value: &Value) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to render json: {err}")))?;
    write_stdout_line(&rendered)
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}").map_err(|err| CliError::new(format!("failed to write stdout: {err}")))
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
