//! Queryset CLI — resolve, prime, fetch and cache commands.
//!
//! Commands:
//! - `list` — querysets in the catalog, optionally by theme
//! - `show` — a queryset's chains in pipeline notation and their paths
//! - `paths` — resolved remote paths for a queryset or ad-hoc pipelines
//! - `fetch` — retrieve and merge a queryset, write it as parquet
//! - `prime` — ask the remote to materialize a queryset's columns
//! - `cache status` / `cache clear` — manage the result cache

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use queryset_core::data::DateRange;
use queryset_core::domain::{resolve, LevelOfAnalysis, OperationChain};
use queryset_core::retrieval::{default_messages, render_messages, RetrievalOutcome};
use queryset_runner::config::ENV_SOURCE_URL;
use queryset_runner::{
    DataAccessLayer, DataRetriever, FetchControl, MemoryStore, ParquetCache, PrimeStatus,
    QuerysetStore, RetrievalConfig,
};

#[derive(Parser)]
#[command(name = "queryset", about = "Queryset CLI — resolve and retrieve querysets")]
struct Cli {
    /// Queryset catalog (TOML).
    #[arg(long, global = true, default_value = "querysets.toml")]
    catalog: PathBuf,

    /// Retrieval config (TOML). QUERYSET_* variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Result cache directory. Defaults to the config's, then the user cache dir.
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List querysets in the catalog.
    List {
        /// Only querysets carrying this theme.
        #[arg(long)]
        theme: Option<String>,
    },
    /// Show a queryset's chains and resolved paths.
    Show { name: String },
    /// Print resolved remote paths.
    Paths {
        /// Queryset name from the catalog.
        #[arg(conflicts_with = "pipeline")]
        name: Option<String>,

        /// Ad-hoc chain in pipeline notation (repeatable), e.g. "base country.name | trf templag -1".
        #[arg(long, requires = "loa")]
        pipeline: Vec<String>,

        /// Level of analysis for --pipeline.
        #[arg(long)]
        loa: Option<String>,
    },
    /// Retrieve a queryset and write it as parquet.
    Fetch {
        name: String,

        /// First date to keep (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// Last date to keep (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,

        /// Output file. Defaults to {name}.parquet.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Base URL of the column source; overrides config and environment.
        #[arg(long)]
        source_url: Option<String>,

        /// Skip the result cache.
        #[arg(long, default_value_t = false)]
        no_cache: bool,
    },
    /// Ask the remote to start materializing a queryset.
    Prime {
        name: String,

        /// Base URL of the column source; overrides config and environment.
        #[arg(long)]
        source_url: Option<String>,
    },
    /// Result cache management.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached querysets.
    Status,
    /// Remove one cached queryset, or all of them.
    Clear { name: Option<String> },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::List { theme } => run_list(&cli, theme.as_deref()),
        Commands::Show { name } => run_show(&cli, name),
        Commands::Paths {
            name,
            pipeline,
            loa,
        } => run_paths(&cli, name.as_deref(), pipeline, loa.as_deref()),
        Commands::Fetch {
            name,
            start,
            end,
            out,
            source_url,
            no_cache,
        } => run_fetch(
            &cli,
            name,
            start.as_deref(),
            end.as_deref(),
            out.clone(),
            source_url.clone(),
            *no_cache,
        ),
        Commands::Prime { name, source_url } => run_prime(&cli, name, source_url.clone()),
        Commands::Cache { action } => match action {
            CacheAction::Status => run_cache_status(&cli),
            CacheAction::Clear { name } => run_cache_clear(&cli, name.as_deref()),
        },
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 2)
        .with_writer(std::io::stderr)
        .init();
}

fn load_catalog(path: &Path) -> Result<MemoryStore> {
    MemoryStore::load(path).with_context(|| format!("loading catalog {}", path.display()))
}

fn load_config(cli: &Cli, source_url: Option<String>) -> Result<RetrievalConfig> {
    let config = match &cli.config {
        Some(path) => RetrievalConfig::load(path)?,
        None => {
            let url = source_url
                .clone()
                .or_else(|| std::env::var(ENV_SOURCE_URL).ok())
                .with_context(|| {
                    format!("no source URL: pass --source-url, set {ENV_SOURCE_URL}, or use --config")
                })?;
            RetrievalConfig::new(url)
        }
    };
    let mut config = config.apply_env()?;
    if let Some(url) = source_url {
        config.source_url = url;
        config.validate()?;
    }
    if cli.cache_dir.is_some() {
        config.cache_dir = cli.cache_dir.clone();
    }
    if config.cache_dir.is_none() {
        config.cache_dir = default_cache_dir();
    }
    debug!(?config, "retrieval config");
    Ok(config)
}

fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("queryset"))
}

fn cache_dir(cli: &Cli) -> Result<PathBuf> {
    if let Some(dir) = &cli.cache_dir {
        return Ok(dir.clone());
    }
    if let Some(path) = &cli.config {
        if let Some(dir) = RetrievalConfig::load(path)?.cache_dir {
            return Ok(dir);
        }
    }
    default_cache_dir().context("no cache directory: pass --cache-dir")
}

fn parse_date(s: Option<&str>) -> Result<Option<NaiveDate>> {
    s.map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("dates must be YYYY-MM-DD")
}

fn run_list(cli: &Cli, theme: Option<&str>) -> Result<()> {
    let store = load_catalog(&cli.catalog)?;
    let querysets = match theme {
        Some(theme) => store.by_theme(theme),
        None => store.list().iter().filter_map(|n| store.get(n)).collect(),
    };

    if querysets.is_empty() {
        println!("No querysets.");
        return Ok(());
    }

    println!("{:<30} {:<16} {:>6}  Description", "Name", "LOA", "Chains");
    println!("{}", "-".repeat(72));
    for qs in &querysets {
        println!(
            "{:<30} {:<16} {:>6}  {}",
            qs.name,
            qs.loa.as_str(),
            qs.operations.len(),
            qs.description
        );
    }
    Ok(())
}

fn run_show(cli: &Cli, name: &str) -> Result<()> {
    let store = load_catalog(&cli.catalog)?;
    let Some(qs) = store.get(name) else {
        bail!("queryset '{name}' does not exist");
    };

    println!("Name:        {}", qs.name);
    println!("LOA:         {}", qs.loa.as_str());
    if !qs.description.is_empty() {
        println!("Description: {}", qs.description);
    }
    if !qs.themes.is_empty() {
        println!("Themes:      {}", qs.themes.join(", "));
    }
    println!();
    for (chain, path) in qs.operations.iter().zip(qs.paths()) {
        println!("  {}", chain.to_pipeline());
        println!("    -> {path}");
    }
    Ok(())
}

fn run_paths(
    cli: &Cli,
    name: Option<&str>,
    pipelines: &[String],
    loa: Option<&str>,
) -> Result<()> {
    let paths = match (name, loa) {
        (Some(name), _) => {
            let store = load_catalog(&cli.catalog)?;
            let Some(qs) = store.get(name) else {
                bail!("queryset '{name}' does not exist");
            };
            qs.paths()
        }
        (None, Some(loa)) if !pipelines.is_empty() => {
            let loa = LevelOfAnalysis::new(loa)?;
            pipelines
                .iter()
                .map(|p| Ok(resolve(&OperationChain::from_pipeline(p)?, &loa)))
                .collect::<Result<Vec<_>>>()?
        }
        _ => bail!("give a queryset name, or --loa with at least one --pipeline"),
    };

    for path in paths {
        println!("{path}");
    }
    Ok(())
}

fn build_access(cli: &Cli, config: &RetrievalConfig, use_cache: bool) -> Result<DataAccessLayer> {
    let store = Arc::new(load_catalog(&cli.catalog)?);
    let retriever = DataRetriever::from_config(config)?;
    let mut dal = DataAccessLayer::new(store, retriever);
    if use_cache {
        if let Some(dir) = &config.cache_dir {
            dal = dal.with_cache(ParquetCache::new(dir));
        }
    }
    Ok(dal)
}

fn control(config: &RetrievalConfig) -> FetchControl {
    match config.timeout() {
        Some(timeout) => FetchControl::with_timeout(timeout),
        None => FetchControl::unbounded(),
    }
}

fn run_fetch(
    cli: &Cli,
    name: &str,
    start: Option<&str>,
    end: Option<&str>,
    out: Option<PathBuf>,
    source_url: Option<String>,
    no_cache: bool,
) -> Result<()> {
    let range = DateRange::new(parse_date(start)?, parse_date(end)?);
    let config = load_config(cli, source_url)?;
    let dal = build_access(cli, &config, !no_cache)?;

    match dal.fetch(name, &range, &control(&config))? {
        RetrievalOutcome::Ready(frame) => {
            let out = out.unwrap_or_else(|| PathBuf::from(format!("{name}.parquet")));
            let bytes = frame.to_parquet_bytes()?;
            std::fs::write(&out, bytes).with_context(|| format!("writing {}", out.display()))?;
            println!(
                "Wrote {} rows x {} columns to {}",
                frame.height(),
                frame.data_columns().len(),
                out.display()
            );
            Ok(())
        }
        RetrievalOutcome::Pending { paths } => {
            for path in &paths {
                println!("pending: {path}");
            }
            bail!(render_messages(&default_messages(202)))
        }
        RetrievalOutcome::Failed(report) => bail!(report.render()),
    }
}

fn run_prime(cli: &Cli, name: &str, source_url: Option<String>) -> Result<()> {
    let config = load_config(cli, source_url)?;
    let dal = build_access(cli, &config, false)?;

    match dal.prime(name, &control(&config))? {
        PrimeStatus::Ready => println!("All columns of '{name}' are ready."),
        PrimeStatus::Pending { paths } => {
            println!("{} column(s) of '{name}' are being materialized:", paths.len());
            for path in &paths {
                println!("  {path}");
            }
        }
        PrimeStatus::Failed(report) => bail!(report.render()),
    }
    Ok(())
}

fn run_cache_status(cli: &Cli) -> Result<()> {
    let dir = cache_dir(cli)?;
    let cache = ParquetCache::new(&dir);
    let names = cache.list()?;

    if names.is_empty() {
        println!("Cache is empty: {}", dir.display());
        return Ok(());
    }

    println!("Cache: {}", dir.display());
    println!();
    println!("{:<30} {:>10} {:>8}  Cached at", "Queryset", "Rows", "Columns");
    println!("{}", "-".repeat(72));
    for status in cache.status(&names) {
        let rows = status.rows.map_or("-".to_string(), |r| r.to_string());
        let columns = status.columns.map_or("-".to_string(), |c| c.to_string());
        let cached_at = match (status.cached, status.cached_at) {
            (true, Some(at)) => at.format("%Y-%m-%d %H:%M").to_string(),
            _ => "(incomplete)".to_string(),
        };
        println!("{:<30} {:>10} {:>8}  {cached_at}", status.queryset, rows, columns);
    }
    Ok(())
}

fn run_cache_clear(cli: &Cli, name: Option<&str>) -> Result<()> {
    let dir = cache_dir(cli)?;
    let cache = ParquetCache::new(&dir);
    match name {
        Some(name) => {
            if cache.remove(name)? {
                println!("Removed '{name}' from {}", dir.display());
            } else {
                println!("'{name}' is not cached");
            }
        }
        None => {
            let removed = cache.clear()?;
            println!("Removed {removed} cached queryset(s) from {}", dir.display());
        }
    }
    Ok(())
}
