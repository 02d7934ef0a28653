//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use artcallfinder_core::{EnrichmentProgress, Enricher, RetryPolicy, run_scrapers, run_summarize};
use artcallfinder_export::{export_to_workbook, replace_topics};
use artcallfinder_generator::OpenAiGenerator;
use artcallfinder_scrapers::ScraperRegistry;
use artcallfinder_shared::{
    AppConfig, init_config, load_config, resolve_api_key, validate_api_key,
};
use artcallfinder_storage::{RecordStore, load_prompts};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ArtCallFinder: collect open calls for artists into one review sheet.
#[derive(Parser)]
#[command(
    name = "artcallfinder",
    version,
    about = "Scrape art-call listings, summarize them with an LLM, and export a review workbook.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ./artcallfinder.toml, then ~/.artcallfinder/artcallfinder.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

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
    /// Run the scrape → summarize → export pipeline.
    Run(RunArgs),

    /// Copy the topics column from one workbook into another, matched by url.
    ReplaceTopics {
        /// Workbook holding the corrected topics.
        #[arg(long = "from")]
        from: PathBuf,

        /// Workbook to update (defaults to the configured export file).
        #[arg(long)]
        into: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `run`.
#[derive(Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Skip the scraping stage.
    #[arg(long)]
    pub skip_scrape: bool,

    /// Skip the LLM summarization stage.
    #[arg(long)]
    pub skip_summarize: bool,

    /// Skip the workbook export stage.
    #[arg(long)]
    pub skip_export: bool,

    /// Maximum listing pages to fetch per paginated source (0 = no limit).
    #[arg(long)]
    pub max_pages: Option<u32>,
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
        0 => "artcallfinder=info",
        1 => "artcallfinder=debug",
        _ => "artcallfinder=trace",
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
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run(args) => cmd_run(config_path, &args).await,
        Command::ReplaceTopics { from, into } => {
            cmd_replace_topics(config_path, &from, into.as_deref())
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>, args: &RunArgs) -> Result<()> {
    let config = load_config(config_path)?;
    if !args.skip_summarize {
        // Fail before spending minutes scraping.
        validate_api_key(&config)?;
    }

    let store = RecordStore::from_paths(&config.paths);

    if args.skip_scrape {
        info!("Skipping scraping stage");
    } else {
        let max_pages = args.max_pages.or(config.scrape.max_pages);
        info!(?max_pages, "starting scraping stage");
        let summaries = run_scrapers(&ScraperRegistry::new(), &store, max_pages).await?;

        println!();
        for s in &summaries {
            match &s.path {
                Some(path) => println!("  {:<18} scraped {:>4}  → {}", s.source, s.scraped, path.display()),
                None => println!("  {:<18} scraped {:>4}", s.source, s.scraped),
            }
        }
    }

    if args.skip_summarize {
        info!("Skipping summarization stage");
    } else {
        info!("starting summarization stage");
        let api_key = resolve_api_key(&config)?;
        let generator = Arc::new(OpenAiGenerator::new(&config.openai, api_key)?);
        let prompts = load_prompts(&config.paths.prompts_file)?;
        let enricher = Arc::new(Enricher::new(
            generator,
            prompts,
            RetryPolicy::from(&config.enrichment),
        ));

        let progress = CliProgress::new();
        let summaries = run_summarize(
            &store,
            enricher,
            config.enrichment.concurrency,
            &progress,
        )
        .await?;

        println!();
        for s in &summaries {
            println!(
                "  {:<18} processed {:>4}  new {:>4}  total {:>5}  failed {:>3}",
                s.source, s.processed, s.new, s.total, s.failed
            );
        }
    }

    if args.skip_export {
        info!("Skipping export stage");
    } else {
        info!("starting export stage");
        let files = store.list_processed_files()?;
        let summary = export_to_workbook(&files, &config.paths.export_file)?;

        println!();
        if summary.added > 0 {
            println!(
                "  Added {} new art calls to {} ({} rows)",
                summary.added,
                summary.path.display(),
                summary.total
            );
        } else {
            println!("  No new art calls to add.");
        }
    }

    println!();
    Ok(())
}

fn cmd_replace_topics(config_path: Option<&Path>, from: &Path, into: Option<&Path>) -> Result<()> {
    let target = match into {
        Some(path) => path.to_path_buf(),
        None => load_config(config_path)?.paths.export_file,
    };

    let updated = replace_topics(&target, from)?;
    println!(
        "Updated topics on {updated} rows of {} from {}.",
        target.display(),
        from.display()
    );
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config: AppConfig = load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Enrichment progress as an indicatif bar, one bar per source.
struct CliProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliProgress {
    fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let guard = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bar) = guard.as_ref() {
            f(bar);
        }
    }
}

impl EnrichmentProgress for CliProgress {
    fn phase(&self, name: &str) {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
                .unwrap()
                .progress_chars("=> "),
        );
        bar.set_prefix(name.to_string());

        let mut guard = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = guard.replace(bar) {
            old.finish_and_clear();
        }
    }

    fn task_progress(&self, current: usize, total: usize, detail: &str) {
        self.with_bar(|bar| {
            bar.set_length(total as u64);
            bar.set_position(current as u64);
            bar.set_message(detail.to_string());
        });
    }

    fn finish(&self) {
        self.with_bar(ProgressBar::finish_and_clear);
    }
}
