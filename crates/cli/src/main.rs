use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dialoguer::Password;
use flags::{BackendFlag, CacheBackendFlag, UnknownMethodsFlag};
use progress::SummaryProgress;
use restsum_cache::SummaryCache;
use restsum_dispatch::{build_backend, BackendKind};
use restsum_pipeline::Pipeline;
use restsum_protocol::report_json_schema;
use settings::FileConfig;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

mod flags;
mod progress;
mod render;
mod settings;

#[derive(Parser)]
#[command(name = "restsum")]
#[command(about = "Discover REST endpoints in a codebase and summarize them with AI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors and hide progress
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover endpoints and summarize each one
    Sum(SumArgs),

    /// Discover endpoints only, without contacting a backend
    Scan(ScanArgs),

    /// Manage the summary cache
    Cache(CacheArgs),

    /// Manage configuration (API keys)
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Print the JSON Schema of the report
    Schema,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct DiscoveryArgs {
    /// Directory or file to analyze (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Input kind: source-tree | api-document | route-table
    #[arg(long, default_value = "source-tree", env = "RESTSUM_KIND")]
    pub kind: String,

    /// Only scan files matching this glob (repeatable)
    #[arg(long)]
    pub include: Vec<String>,

    /// Skip files matching this glob (repeatable)
    #[arg(long)]
    pub exclude: Vec<String>,

    /// What to do with endpoints whose HTTP method is unknown
    #[arg(long, value_enum)]
    pub unknown_methods: Option<UnknownMethodsFlag>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct SumArgs {
    #[command(flatten)]
    pub discovery: DiscoveryArgs,

    /// Print the report as JSON (implies --quiet)
    #[arg(long)]
    pub json: bool,

    /// Write the report to a file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Disable cache reads and writes for this run
    #[arg(long)]
    pub no_cache: bool,

    /// Cache directory
    #[arg(long, env = "RESTSUM_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Cache backend
    #[arg(long, value_enum)]
    pub cache_backend: Option<CacheBackendFlag>,

    /// Maximum concurrent backend requests (1..=32)
    #[arg(long, env = "RESTSUM_CONCURRENCY")]
    pub concurrency: Option<String>,

    /// Run deadline in seconds (0 = none)
    #[arg(long, env = "RESTSUM_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub request_timeout: Option<u64>,

    /// Retries after a transient failure
    #[arg(long)]
    pub retries: Option<u32>,

    /// Minimum delay between request starts, in milliseconds
    #[arg(long)]
    pub min_request_interval_ms: Option<u64>,

    /// Summarization backend
    #[arg(long, value_enum, env = "RESTSUM_BACKEND")]
    pub backend: Option<BackendFlag>,

    /// Model id for the backend
    #[arg(long, env = "RESTSUM_MODEL")]
    pub model: Option<String>,

    /// Base URL of the backend API
    #[arg(long, env = "RESTSUM_BASE_URL")]
    pub base_url: Option<String>,

    /// Fail the run when failed/total exceeds this ratio
    #[arg(long)]
    pub max_failure_ratio: Option<f64>,

    #[arg(long, hide = true, env = "RESTSUM_STUB_LATENCY_MS")]
    pub stub_latency_ms: Option<u64>,
}

#[derive(Args, Debug)]
struct ScanArgs {
    #[command(flatten)]
    discovery: DiscoveryArgs,

    /// Print endpoints as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct CacheArgs {
    #[command(subcommand)]
    action: CacheAction,

    /// Cache directory
    #[arg(long, global = true, env = "RESTSUM_CACHE_DIR")]
    cache_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Remove every cached summary
    Clear,

    /// Show entry count and size
    Stats {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Set a configuration value
    #[command(subcommand)]
    Set(SetCommands),

    /// Show a configuration value
    #[command(subcommand)]
    Get(GetCommands),

    /// Print the config file location
    Path,
}

#[derive(Subcommand, Debug)]
enum SetCommands {
    /// Store the API key (prompted when omitted)
    #[command(name = "api-key")]
    ApiKey {
        key: Option<String>,

        /// Backend the key belongs to
        #[arg(long, value_enum, default_value = "gemini")]
        backend: BackendFlag,
    },
}

#[derive(Subcommand, Debug)]
enum GetCommands {
    /// Show the API key, masked
    #[command(name = "api-key")]
    ApiKey {
        #[arg(long, value_enum, default_value = "gemini")]
        backend: BackendFlag,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let quiet = cli.quiet
        || matches!(&cli.command, Commands::Sum(args) if args.json)
        || matches!(&cli.command, Commands::Scan(args) if args.json);
    init_logging(cli.verbose, quiet);

    let code = match run(cli.command, quiet).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            1
        }
    };
    std::process::exit(code);
}

fn init_logging(verbose: bool, quiet: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // reqwest/hyper internals are noise unless debugging
    if !verbose {
        builder.filter_module("reqwest", log::LevelFilter::Warn);
        builder.filter_module("hyper", log::LevelFilter::Warn);
    }
    builder.target(env_logger::Target::Stderr).init();
}

async fn run(command: Commands, quiet: bool) -> Result<i32> {
    match command {
        Commands::Sum(args) => run_sum(args, quiet).await,
        Commands::Scan(args) => run_scan(args),
        Commands::Cache(args) => run_cache(args),
        Commands::Config(cmd) => run_config(cmd),
        Commands::Schema => {
            let schema = serde_json::to_string_pretty(&report_json_schema())?;
            println!("{schema}");
            Ok(0)
        }
    }
}

async fn run_sum(args: SumArgs, quiet: bool) -> Result<i32> {
    let started = Instant::now();
    let file = FileConfig::load()?;
    let resolved = settings::resolve_sum(&file, &args)?;
    let backend = build_backend(&resolved.backend).with_context(|| {
        format!(
            "Cannot use the {} backend. Set a key with `restsum config set api-key --backend {}` \
             or the {} environment variable",
            resolved.backend.kind,
            resolved.backend.kind,
            match resolved.backend.kind {
                BackendKind::OpenAi => "OPENAI_API_KEY",
                _ => "GEMINI_API_KEY",
            }
        )
    })?;

    let pipeline = Pipeline::new(resolved.pipeline, backend)?;
    let discovery = pipeline.discover(&args.discovery.path, &args.discovery.kind)?;

    let progress = SummaryProgress::new(discovery.catalog.len(), quiet);
    let pipeline = pipeline.with_progress(progress.callback());
    let report = pipeline.summarize(discovery, started).await;
    progress.finish();

    let rendered = if args.json {
        serde_json::to_string_pretty(&report)?
    } else {
        render::render_report(&report)
    };
    emit(&rendered, args.out.as_deref())?;
    pipeline.finish();
    Ok(report.status.exit_code())
}

fn run_scan(args: ScanArgs) -> Result<i32> {
    let file = FileConfig::load()?;
    let config = settings::resolve_discovery(&file, &args.discovery);
    let discovery =
        restsum_pipeline::discover(&config, &args.discovery.path, &args.discovery.kind)?;

    let rendered = if args.json {
        serde_json::to_string_pretty(&serde_json::json!({
            "input": discovery.input,
            "candidates": discovery.catalog.candidates,
            "endpoints": discovery.catalog.endpoints,
            "skipped": discovery.catalog.skipped,
            "dropped": discovery.catalog.dropped,
            "malformed": discovery.malformed,
        }))?
    } else {
        render::render_table(discovery.catalog.endpoints.iter().map(|e| (e, None)))
    };
    emit(&rendered, None)?;
    Ok(if discovery.catalog.is_empty() { 1 } else { 0 })
}

fn run_cache(args: CacheArgs) -> Result<i32> {
    let file = FileConfig::load()?;
    let config = settings::cache_config(&file, args.cache_dir, None);
    let cache = SummaryCache::try_open(&config).context("Failed to open the summary cache")?;
    match args.action {
        CacheAction::Clear => {
            let removed = cache.clear().context("Failed to clear the summary cache")?;
            println!("Removed {removed} cached summaries from {}", config.dir.display());
        }
        CacheAction::Stats { json } => {
            let stats = cache.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Backend: {}", stats.backend);
                if let Some(dir) = &stats.dir {
                    println!("Directory: {}", dir.display());
                }
                println!("Entries: {}", stats.entries);
                println!("Size: {} bytes", stats.bytes);
            }
        }
    }
    cache.close();
    Ok(0)
}

fn run_config(cmd: ConfigCommands) -> Result<i32> {
    let path = FileConfig::path()?;
    match cmd {
        ConfigCommands::Path => println!("{}", path.display()),
        ConfigCommands::Set(SetCommands::ApiKey { key, backend }) => {
            let kind = backend.as_domain();
            let key = match key {
                Some(key) => key,
                None => Password::new()
                    .with_prompt(format!("{kind} API key"))
                    .interact()
                    .context("Failed to read the API key")?,
            };
            let key = key.trim().to_string();
            anyhow::ensure!(!key.is_empty(), "API key must not be empty");

            let mut config = FileConfig::load_from(&path)?;
            config.set_api_key(kind, key.clone())?;
            config.save_to(&path)?;
            println!(
                "{} {kind} API key saved ({})",
                console::style("✓").green(),
                settings::mask_api_key(&key)
            );
        }
        ConfigCommands::Get(GetCommands::ApiKey { backend }) => {
            let kind = backend.as_domain();
            let config = FileConfig::load_from(&path)?;
            match settings::resolve_api_key(&config, kind) {
                Some(key) => println!("Current {kind} API key: {}", settings::mask_api_key(&key)),
                None => {
                    println!("No {kind} API key configured.");
                    println!("Set one using: restsum config set api-key --backend {kind} YOUR_KEY");
                    return Ok(1);
                }
            }
        }
    }
    Ok(0)
}

fn emit(rendered: &str, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            if !rendered.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
            stdout.flush()?;
            Ok(())
        }
    }
}
