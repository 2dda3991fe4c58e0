//! Binary entry point for the plcsync CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Variable tree of one POU
//! plcsync --project plant.json tree --pou Main
//!
//! # Replace a POU's variable table, carrying renames over to the ladder
//! plcsync --project plant.json commit --pou Main --file vars.json --yes
//!
//! # Preview a type change
//! plcsync --project plant.json check-type --pou Main --var Start --type INT
//! ```
//!
//! Every command prints one JSON response on stdout. Errors are JSON too,
//! and the process exits with the error's code.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use plcsync::cli::{
    load_project, run_check_type, run_commit, run_refs, run_rename, run_set_type, run_sync,
    run_tree, save_project, scope_from_args,
};
use plcsync::terminal::StdioAdapter;
use plcsync_core::config::{CliOverrides, ResolvedConfig};
use plcsync_core::error::{OutputErrorCode, SyncError};
use plcsync_core::interaction::{FixedAnswer, InteractionAdapter};
use plcsync_core::output::{emit_response, ErrorResponse};
use plcsync_core::project::Project;
use plcsync_core::rename::MatcherKind;

// ============================================================================
// CLI Structure
// ============================================================================

/// Keep graphical PLC editors consistent with their variable tables.
#[derive(Parser, Debug)]
#[command(name = "plcsync", version, about = "Variable-binding consistency for PLC editors")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Project file (JSON).
    #[arg(long, global = true, default_value = "project.json")]
    project: PathBuf,

    /// Config file (default: plcsync.json beside the project).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Which variable table a command addresses.
#[derive(Args, Debug)]
struct ScopeArgs {
    /// Variable table of this POU.
    #[arg(long, conflicts_with = "global")]
    pou: Option<String>,
    /// The global variable list.
    #[arg(long)]
    global: bool,
}

/// How to answer the rename-propagation prompt.
#[derive(Args, Debug)]
struct AnswerArgs {
    /// Carry renames over without asking.
    #[arg(long, conflicts_with = "no")]
    yes: bool,
    /// Leave renamed references unlinked without asking.
    #[arg(long)]
    no: bool,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Print the variable tree of a POU, or of the whole project.
    Tree {
        /// Restrict to one POU.
        #[arg(long)]
        pou: Option<String>,
        /// Nesting backstop for recursive types.
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// Re-resolve every graphical node against its variable table.
    Sync {
        /// Restrict to one POU.
        #[arg(long)]
        pou: Option<String>,
        /// Do not write the project back.
        #[arg(long)]
        dry_run: bool,
    },
    /// Replace a variable table with declarations from a file or stdin.
    Commit {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Declaration file (JSON array); `-` reads stdin.
        #[arg(long, default_value = "-")]
        file: PathBuf,
        /// Rename matching strategy.
        #[arg(long, value_parser = parse_matcher)]
        matcher: Option<MatcherKind>,
        #[command(flatten)]
        answer: AnswerArgs,
        /// Do not write the project back.
        #[arg(long)]
        dry_run: bool,
    },
    /// Rename one variable.
    Rename {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Current name.
        #[arg(long)]
        from: String,
        /// New name.
        #[arg(long)]
        to: String,
        #[command(flatten)]
        answer: AnswerArgs,
        /// Do not write the project back.
        #[arg(long)]
        dry_run: bool,
    },
    /// Report which nodes a type change would affect.
    #[command(name = "check-type")]
    CheckType {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Variable name.
        #[arg(long = "var")]
        variable: String,
        /// New type, e.g. `INT` or `ARRAY[1..4] OF BOOL`.
        #[arg(long = "type")]
        new_type: String,
    },
    /// Change a variable's type and rebind or break its nodes.
    #[command(name = "set-type")]
    SetType {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Variable name.
        #[arg(long = "var")]
        variable: String,
        /// New type.
        #[arg(long = "type")]
        new_type: String,
        /// Do not write the project back.
        #[arg(long)]
        dry_run: bool,
    },
    /// List every use of a variable.
    Refs {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Variable name.
        #[arg(long = "var")]
        variable: String,
    },
}

fn parse_matcher(s: &str) -> Result<MatcherKind, String> {
    s.parse()
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error_code = OutputErrorCode::from(&err);
            let response = ErrorResponse::from_error(&err);

            // Errors go to stdout as JSON, like every other response.
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();

            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the CLI command.
fn execute(cli: Cli) -> Result<(), SyncError> {
    let global = cli.global;
    let mut overrides = CliOverrides {
        config_path: global.config.clone(),
        ..Default::default()
    };
    match &cli.command {
        Command::Tree { max_depth, .. } => overrides.tree_max_depth = *max_depth,
        Command::Commit { matcher, .. } => overrides.rename_matcher = *matcher,
        _ => {}
    }
    let config = ResolvedConfig::resolve(project_dir(&global.project), &overrides)?;
    let mut project = load_project(&global.project)?;

    match cli.command {
        Command::Tree { pou, .. } => emit(&run_tree(&project, &config, pou.as_deref())?),
        Command::Sync { pou, dry_run } => {
            let response = run_sync(&mut project, pou.as_deref(), dry_run)?;
            persist(&global.project, &project, dry_run)?;
            emit(&response)
        }
        Command::Commit {
            scope,
            file,
            answer,
            dry_run,
            ..
        } => {
            let scope = scope_from_args(scope.pou.as_deref(), scope.global)?;
            let text = read_declarations(&file)?;
            let adapter = adapter_for(&answer);
            let response =
                run_commit(&mut project, &config, adapter.as_ref(), &scope, &text, dry_run)?;
            persist(&global.project, &project, dry_run)?;
            emit(&response)
        }
        Command::Rename {
            scope,
            from,
            to,
            answer,
            dry_run,
        } => {
            let scope = scope_from_args(scope.pou.as_deref(), scope.global)?;
            let adapter = adapter_for(&answer);
            let response =
                run_rename(&mut project, &config, adapter.as_ref(), &scope, &from, &to, dry_run)?;
            persist(&global.project, &project, dry_run)?;
            emit(&response)
        }
        Command::CheckType {
            scope,
            variable,
            new_type,
        } => {
            let scope = scope_from_args(scope.pou.as_deref(), scope.global)?;
            emit(&run_check_type(&project, &scope, &variable, &new_type)?)
        }
        Command::SetType {
            scope,
            variable,
            new_type,
            dry_run,
        } => {
            let scope = scope_from_args(scope.pou.as_deref(), scope.global)?;
            let response = run_set_type(&mut project, &scope, &variable, &new_type, dry_run)?;
            persist(&global.project, &project, dry_run)?;
            emit(&response)
        }
        Command::Refs { scope, variable } => {
            let scope = scope_from_args(scope.pou.as_deref(), scope.global)?;
            emit(&run_refs(&project, &scope, &variable)?)
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn project_dir(project: &Path) -> &Path {
    match project.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

fn adapter_for(answer: &AnswerArgs) -> Box<dyn InteractionAdapter> {
    if answer.yes {
        Box::new(FixedAnswer(true))
    } else if answer.no {
        Box::new(FixedAnswer(false))
    } else {
        Box::new(StdioAdapter::stdio())
    }
}

fn read_declarations(file: &Path) -> Result<String, SyncError> {
    if file.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| SyncError::io("<stdin>", e))?;
        Ok(text)
    } else {
        fs::read_to_string(file).map_err(|e| SyncError::io(file, e))
    }
}

fn persist(path: &Path, project: &Project, dry_run: bool) -> Result<(), SyncError> {
    if dry_run {
        return Ok(());
    }
    save_project(path, project)
}

fn emit<T: Serialize>(response: &T) -> Result<(), SyncError> {
    let mut stdout = io::stdout();
    emit_response(response, &mut stdout)
        .map_err(|e| SyncError::internal(format!("failed to write response: {}", e)))?;
    let _ = stdout.flush();
    Ok(())
}
