use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use codecity_core::analyzer::LanguageAnalyzer;
use codecity_core::cache::ResultCache;
use codecity_core::config::{Config, CONFIG_FILE};
use codecity_core::pipeline::AnalysisPipeline;
use codecity_core::service::{AnalysisService, Encoder};
use codecity_core::storage::{FileStorage, Storage};

use codecity_go::GoAnalyzer;
use codecity_report::{json, text};

#[derive(Parser)]
#[command(name = "codecity")]
#[command(about = "Measure Go packages as a city: lines, methods and attributes per struct")]
#[command(version)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a Go project and print its city metrics
    Analyze {
        /// Path to the project root
        path: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
        /// Compact JSON output
        #[arg(long)]
        compact: bool,
        /// Number of objects listed in the text report
        #[arg(long, default_value_t = 15)]
        top: usize,
        /// Config file path (defaults to .codecity.toml in project root)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Do not read or write stored results
        #[arg(long)]
        no_store: bool,
    },
    /// Create a default .codecity.toml configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

struct AnalyzeArgs {
    format: OutputFormat,
    compact: bool,
    top: usize,
    no_store: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Analyze {
            path,
            format,
            compact,
            top,
            config,
            no_store,
        } => cmd_analyze(
            &path,
            config.as_deref(),
            AnalyzeArgs {
                format,
                compact,
                top,
                no_store,
            },
        ),
        Commands::Init { force } => cmd_init(force),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(2);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_analyze(path: &Path, config_path: Option<&Path>, args: AnalyzeArgs) -> Result<()> {
    let config = load_config(path, config_path)?;
    let service = build_service(path, &config, args.no_store)?;
    let locator = path.to_string_lossy().into_owned();

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let body = runtime.block_on(service.analyze(&locator))?;
    // Dropping the runtime waits for the write-behind to finish.
    drop(runtime);

    let Some(doc) = json::decode_body(&body)? else {
        println!("No analyzable declarations found.");
        return Ok(());
    };

    match args.format {
        OutputFormat::Json => println!("{}", json::format_report(&doc, args.compact)),
        OutputFormat::Text => print!("{}", text::format_report(&doc, args.top)),
    }
    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let target = PathBuf::from(CONFIG_FILE);
    if target.exists() && !force {
        anyhow::bail!("{CONFIG_FILE} already exists. Use --force to overwrite.");
    }
    std::fs::write(&target, Config::default_toml())?;
    println!("Created {CONFIG_FILE} with default configuration.");
    Ok(())
}

fn load_config(project_path: &Path, config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(p) => Config::load(p),
        None => Ok(Config::load_or_default(project_path)),
    }
}

fn build_service(project_path: &Path, config: &Config, no_store: bool) -> Result<AnalysisService> {
    let analyzers: Vec<Box<dyn LanguageAnalyzer>> = vec![Box::new(
        GoAnalyzer::new().context("failed to initialize Go analyzer")?,
    )];
    let pipeline = AnalysisPipeline::new(analyzers, config)?;

    let storage: Option<Arc<dyn Storage>> = if config.storage.enabled && !no_store {
        Some(Arc::new(FileStorage::new(
            config.storage.resolve_dir(project_path),
        )))
    } else {
        None
    };

    let encode: Arc<Encoder> = Arc::new(json::encode_analysis);
    Ok(AnalysisService::new(
        pipeline,
        ResultCache::new(config.cache.ttl()),
        storage,
        encode,
    ))
}
