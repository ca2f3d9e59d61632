use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use context_agent::{ModelResponse, ScriptedModel};
use context_protocol::{Position, NO_WORKSPACE_PAYLOAD};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod engine;
pub mod symbols;

pub use config::{CacheConfig, EngineConfig, ScanConfig};
pub use engine::{ContextEngine, ContextRequest, ContextResult, EngineCacheStats, Ranking};
pub use symbols::{
    gather_cursor_signals, gather_document_symbols, CursorSignals, StaticSymbols, SymbolProvider,
};

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    print_stdout(&serde_json::to_string_pretty(value)?)
}

#[derive(Parser)]
#[command(name = "context")]
#[command(about = "Budgeted code context for language-model assistants", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine config (TOML). Defaults to <root>/.context/config.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for output)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List candidate files of a workspace
    Scan(ScanArgs),

    /// Score candidate files for a request
    Rank(RankArgs),

    /// Run a read-only command through the sandbox
    Exec(ExecArgs),

    /// List the commands the sandbox allows
    Commands(CommandsArgs),

    /// Assemble the full context prompt for a request
    Pack(PackArgs),
}

#[derive(Args)]
struct ScanArgs {
    /// Workspace directory (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct RankArgs {
    /// Workspace directory (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Free-text request
    #[arg(long, short = 'q', default_value = "")]
    query: String,

    /// File open in the editor (relative to the workspace)
    #[arg(long)]
    active: Option<String>,

    /// Cursor line in the active file (1-indexed)
    #[arg(long)]
    line: Option<u32>,

    /// Symbol provider answers (JSON)
    #[arg(long)]
    symbols: Option<PathBuf>,

    /// Number of files to show
    #[arg(long, short = 'n', default_value_t = 20)]
    limit: usize,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ExecArgs {
    /// Working directory for the command
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// Only validate and rewrite; print the command that would run
    #[arg(long)]
    dry_run: bool,

    /// Command line, e.g. -- grep -rn TODO .
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    command: Vec<String>,
}

#[derive(Args)]
struct CommandsArgs {
    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct PackArgs {
    /// Workspace directory (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Free-text request
    #[arg(long, short = 'q', default_value = "")]
    query: String,

    /// File open in the editor (relative to the workspace)
    #[arg(long)]
    active: Option<String>,

    /// Cursor line in the active file (1-indexed)
    #[arg(long)]
    line: Option<u32>,

    /// Total character budget
    #[arg(long)]
    max_chars: Option<usize>,

    /// Maximum agent turns
    #[arg(long)]
    max_turns: Option<usize>,

    /// Replay model responses from a JSON script instead of calling a model
    #[arg(long)]
    model_script: Option<PathBuf>,

    /// Symbol provider answers (JSON)
    #[arg(long)]
    symbols: Option<PathBuf>,

    /// Recent changes (JSON array of {timestamp, path, description})
    #[arg(long)]
    recent_changes: Option<PathBuf>,

    /// Selection cache scope; a new id recomputes
    #[arg(long)]
    operation_id: Option<String>,

    /// Ignore cached selections
    #[arg(long)]
    recompute: bool,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

/// `--model-script` file: canned responses replayed in order.
#[derive(Debug, Deserialize)]
struct ModelScript {
    #[serde(default = "default_supports_tools")]
    supports_tools: bool,
    responses: Vec<ModelResponse>,
}

fn default_supports_tools() -> bool {
    true
}

fn load_model_script(path: &Path) -> Result<ScriptedModel> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read model script {}", path.display()))?;
    let script: ModelScript = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid model script {}", path.display()))?;
    Ok(script
        .responses
        .into_iter()
        .fold(ScriptedModel::new(script.supports_tools), |model, response| {
            model.with_response(response)
        }))
}

fn load_recent_changes(path: &Path) -> Result<Vec<context_pack::RecentChange>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read recent changes {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid recent changes {}", path.display()))
}

fn cursor_at(line: Option<u32>) -> Option<Position> {
    line.map(|line| Position {
        line: line.saturating_sub(1),
        character: 0,
    })
}

/// Cancels `token` on Ctrl-C so partial work is returned instead of lost.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; returning partial output");
            child.cancel();
        }
    });
    token
}

fn canonical_root(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("Invalid workspace path {}", path.display()))
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Scan(args) => run_scan(args, config_path).await?,
        Commands::Rank(args) => run_rank(args, config_path).await?,
        Commands::Exec(args) => run_exec(args, config_path).await?,
        Commands::Commands(args) => run_commands(args)?,
        Commands::Pack(args) => run_pack(args, config_path).await?,
    }
    Ok(())
}

#[derive(Serialize)]
struct ScanOutput<'a> {
    root: &'a Path,
    files: Vec<&'a str>,
    stats: &'a context_indexer::ScanStats,
}

async fn run_scan(args: ScanArgs, config_path: Option<&Path>) -> Result<()> {
    let root = canonical_root(&args.path)?;
    let config = EngineConfig::resolve(config_path, Some(&root))?;
    let engine = ContextEngine::new(config);
    let outcome = engine.scan(&root, &cancel_on_ctrl_c()).await;
    if outcome.no_workspace {
        anyhow::bail!("{NO_WORKSPACE_PAYLOAD}");
    }

    if args.json {
        print_json(&ScanOutput {
            root: &root,
            files: outcome.files.iter().map(|f| f.path.as_str()).collect(),
            stats: &outcome.stats,
        })?;
        return Ok(());
    }
    for file in outcome.files.iter() {
        print_stdout(&file.path)?;
    }
    eprintln!(
        "{} files, {} directories, {} ignored, {} too large ({} ms)",
        outcome.stats.files,
        outcome.stats.directories,
        outcome.stats.skipped_ignored,
        outcome.stats.skipped_size,
        outcome.stats.elapsed_ms
    );
    Ok(())
}

async fn run_rank(args: RankArgs, config_path: Option<&Path>) -> Result<()> {
    let root = canonical_root(&args.path)?;
    let config = EngineConfig::resolve(config_path, Some(&root))?;
    let mut engine = ContextEngine::new(config);
    if let Some(path) = &args.symbols {
        engine = engine.with_symbols(Arc::new(StaticSymbols::load(path)?));
    }
    let request = ContextRequest {
        root: Some(root.clone()),
        request: args.query,
        active_file: args.active,
        cursor: cursor_at(args.line),
        ..ContextRequest::default()
    };
    let mut metrics = Default::default();
    let Some(ranking) = engine
        .rank(&root, &request, &cancel_on_ctrl_c(), &mut metrics)
        .await
    else {
        anyhow::bail!("{NO_WORKSPACE_PAYLOAD}");
    };
    let top: Vec<_> = ranking.scores.into_iter().take(args.limit).collect();

    if args.json {
        return print_json(&top);
    }
    for scored in &top {
        let factors: Vec<String> = scored
            .factors
            .iter()
            .map(|(factor, amount)| format!("{}={amount:.1}", factor.as_str()))
            .collect();
        print_stdout(&format!(
            "{:>8.1}  {:<50} {}",
            scored.score,
            scored.path,
            factors.join(" ")
        ))?;
    }
    Ok(())
}

async fn run_exec(args: ExecArgs, config_path: Option<&Path>) -> Result<()> {
    let root = canonical_root(&args.path)?;
    let config = EngineConfig::resolve(config_path, Some(&root))?;
    let engine = ContextEngine::new(config);
    let command = args.command.join(" ");

    if args.dry_run {
        let prepared = engine.sandbox().prepare(&command, &root)?;
        return print_stdout(&prepared);
    }
    let output = engine
        .sandbox()
        .execute_with_cancel(&command, &root, &cancel_on_ctrl_c())
        .await?;
    print_stdout(output.trim_end_matches('\n'))
}

fn run_commands(args: CommandsArgs) -> Result<()> {
    let allowed = context_sandbox::allowed_commands();
    if args.json {
        return print_json(&allowed);
    }
    print_stdout(&allowed.join("\n"))
}

async fn run_pack(args: PackArgs, config_path: Option<&Path>) -> Result<()> {
    let root = match args.path.canonicalize() {
        Ok(root) => Some(root),
        Err(err) => {
            log::warn!("Workspace {} unavailable: {err}", args.path.display());
            None
        }
    };
    let mut config = EngineConfig::resolve(config_path, root.as_deref())?;
    if let Some(chars) = args.max_chars {
        config.set_max_total_chars(chars);
    }
    if let Some(turns) = args.max_turns {
        config.agent.max_turns = turns.max(1);
    }

    let mut engine = ContextEngine::new(config);
    if let Some(path) = &args.model_script {
        engine = engine.with_model(Arc::new(load_model_script(path)?));
    }
    if let Some(path) = &args.symbols {
        engine = engine.with_symbols(Arc::new(StaticSymbols::load(path)?));
    }
    let recent_changes = match &args.recent_changes {
        Some(path) => load_recent_changes(path)?,
        None => Vec::new(),
    };

    let request = ContextRequest {
        root,
        request: args.query,
        active_file: args.active,
        cursor: cursor_at(args.line),
        recent_changes,
        operation_id: args.operation_id,
        recompute: args.recompute,
        ..ContextRequest::default()
    };
    let result = engine.build_context(&request, &cancel_on_ctrl_c()).await;

    if args.json {
        return print_json(&result);
    }
    print_stdout(&result.prompt)?;
    if let Some(source) = result.selection_source {
        eprintln!(
            "{} files ({} skipped for size), selection: {}, {} ms",
            result.included_paths.len(),
            result.skipped_for_size,
            source.as_str(),
            result.metrics.total_ms()
        );
    }
    Ok(())
}
