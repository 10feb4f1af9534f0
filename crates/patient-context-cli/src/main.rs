// crates/patient-context-cli/src/main.rs
// ============================================================================
// Module: Patient Context CLI Entry Point
// Description: Command dispatcher for the patient context MCP server.
// Purpose: Provide a safe launcher plus config inspection commands.
// Dependencies: clap, patient-context-config, patient-context-mcp, tokio
// ============================================================================

//! ## Overview
//! The patient context CLI launches the local MCP server and inspects its
//! configuration. Running with no subcommand serves with default settings,
//! matching the default deployment. Binding a non-loopback address emits a
//! warning because the served context is private medical data.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod serve_policy;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use patient_context_config::PatientContextConfig;
use patient_context_mcp::McpServer;

use crate::serve_policy::exposure_warning;
use crate::serve_policy::resolve_allow_non_loopback;

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// Patient context MCP server launcher.
#[derive(Debug, Parser)]
#[command(name = "patient-context", version, about = "Local patient context MCP server")]
struct Cli {
    /// Subcommand to execute; defaults to `serve`.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Top-level CLI commands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Run the MCP server.
    Serve(ServeCommand),
    /// Configuration inspection commands.
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Arguments for the `serve` command.
#[derive(Debug, Default, Args)]
struct ServeCommand {
    /// Path to the configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Acknowledge binding to a non-loopback address.
    #[arg(long, action = ArgAction::SetTrue)]
    allow_non_loopback: bool,
}

/// Configuration subcommands.
#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the resolved effective configuration as TOML.
    Show(ConfigPathArgs),
    /// Load and validate the configuration.
    Validate(ConfigPathArgs),
}

/// Shared config path argument.
#[derive(Debug, Args)]
struct ConfigPathArgs {
    /// Path to the configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI failure carrying a user-facing message.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
struct CliError {
    /// User-facing error message.
    message: String,
}

impl CliError {
    /// Builds an error from any displayable message.
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result alias for CLI command handlers.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        None => command_serve(ServeCommand::default()).await,
        Some(Command::Serve(command)) => command_serve(command).await,
        Some(Command::Config(command)) => command_config(&command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = PatientContextConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("config load failed: {err}")))?;
    config.validate().map_err(|err| CliError::new(format!("config invalid: {err}")))?;

    let allow_non_loopback = resolve_allow_non_loopback(command.allow_non_loopback)
        .map_err(|err| CliError::new(err.to_string()))?;
    let bind = config
        .server
        .bind_addr()
        .map_err(|err| CliError::new(format!("config invalid: {err}")))?;
    if let Some(warning) = exposure_warning(bind, allow_non_loopback) {
        write_stderr_line(&warning).map_err(|err| CliError::new(output_error("stderr", &err)))?;
    }

    let server = tokio::task::spawn_blocking(move || McpServer::from_config(config))
        .await
        .map_err(|err| CliError::new(format!("server init failed: init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    server
        .serve()
        .await
        .map_err(|err| CliError::new(format!("server failed: {err}")))?;

    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Show(args) => command_config_show(args),
        ConfigCommand::Validate(args) => command_config_validate(args),
    }
}

/// Executes the config show command.
fn command_config_show(args: &ConfigPathArgs) -> CliResult<ExitCode> {
    let config = PatientContextConfig::load(args.config.as_deref())
        .map_err(|err| CliError::new(format!("config load failed: {err}")))?;
    let rendered = config
        .to_toml_string()
        .map_err(|err| CliError::new(format!("config render failed: {err}")))?;
    write_stdout_line(rendered.trim_end())
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the config validation command.
fn command_config_validate(args: &ConfigPathArgs) -> CliResult<ExitCode> {
    let config = PatientContextConfig::load(args.config.as_deref())
        .map_err(|err| CliError::new(format!("config load failed: {err}")))?;
    config.validate().map_err(|err| CliError::new(format!("config invalid: {err}")))?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a line to stdout without the denied print macros.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr without the denied print macros.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output-stream write failure.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Writes a final error message and returns the failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
