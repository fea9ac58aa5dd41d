//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use graphloom_core::{IndexConfig, IndexResult, ProgressReporter, index_corpus};
use graphloom_shared::{AppConfig, ProgressSnapshot, init_config, load_config};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Graphloom — finalize extracted knowledge graphs.
#[derive(Parser)]
#[command(
    name = "graphloom",
    version,
    about = "Turn chunked corpora and extraction seeds into finalized knowledge graphs.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Index a corpus directory into a finalized graph.
    Index {
        /// Directory holding text_units.json and extractions.json.
        input: String,

        /// Output directory for the graph (defaults to the configured one).
        #[arg(short, long)]
        out: Option<String>,

        /// Previous run's output directory, for incremental updates.
        #[arg(long)]
        previous: Option<String>,

        /// Compute circular layout coordinates.
        #[arg(long)]
        layout: bool,

        /// On-disk cache directory (defaults to the configured one).
        #[arg(long)]
        cache_dir: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "graphloom=info",
        1 => "graphloom=debug",
        _ => "graphloom=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Index {
            input,
            out,
            previous,
            layout,
            cache_dir,
        } => {
            cmd_index(
                &input,
                out.as_deref(),
                previous.as_deref(),
                layout,
                cache_dir.as_deref(),
            )
            .await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// index
// ---------------------------------------------------------------------------

async fn cmd_index(
    input: &str,
    out: Option<&str>,
    previous: Option<&str>,
    layout: bool,
    cache_dir: Option<&str>,
) -> Result<()> {
    let config = load_config()?;

    let input_dir = PathBuf::from(input);
    if !input_dir.is_dir() {
        return Err(eyre!("input '{input}' is not a directory"));
    }

    let output_dir = match out {
        Some(p) => PathBuf::from(p),
        None => expand_home(&config.defaults.output_dir),
    };

    let mut index_config = IndexConfig::new(&input_dir, &output_dir);
    index_config.previous_dir = previous.map(PathBuf::from);
    index_config.layout = config.layout.clone();
    if layout {
        index_config.layout.enabled = true;
    }
    if config.cache.enabled {
        index_config.cache_dir = cache_dir
            .map(PathBuf::from)
            .or_else(|| config.cache.dir.as_deref().map(expand_home));
    }

    info!(
        input = %input_dir.display(),
        output = %output_dir.display(),
        layout = index_config.layout.enabled,
        "indexing corpus"
    );

    let reporter = Arc::new(CliProgress::new());
    let result = index_corpus(index_config, reporter.clone()).await?;
    reporter.finish(&result);

    println!();
    println!("  Graph finalized!");
    println!("  Run:           {}", result.run_id);
    println!("  Entities:      {}", result.entity_count);
    println!("  Relationships: {}", result.relationship_count);
    println!("  Text units:    {}", result.text_unit_count);
    println!("  Path:          {}", output_dir.display());
    println!("  Time:          {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

/// Expand a leading `~/` against the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self, _result: &IndexResult) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.spinner.set_message(format!(
            "[{}/{}] {}",
            snapshot.completed_items, snapshot.total_items, snapshot.description
        ));
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
