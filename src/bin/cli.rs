//! feedstore CLI
//!
//! Fetch feeds into the local store and read them back.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;

use feedstore::{
    error::{AppError, Result},
    models::{Config, FeedItem, FeedMeta, FlagUpdate, ListQuery},
    pipeline,
    services::{BatchScheduler, Fetcher},
    storage::{ItemStorage, LocalStore},
    utils::cancel::cancel_on_ctrl_c,
};

/// feedstore - keep the latest items of your feeds on disk
#[derive(Parser, Debug)]
#[command(name = "feedstore", version, about = "Per-source feed item store")]
struct Cli {
    /// Directory holding config.toml and the store file
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch every feed once
    Update {
        /// Feed URL (repeatable; default: feeds from config)
        #[arg(short, long = "feed")]
        feeds: Vec<String>,
    },

    /// Print stored items
    List {
        /// Most recent N items (0 = all)
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Only sources whose URL or title contains this text
        #[arg(long)]
        feed: Option<String>,

        /// Only items newer than this age, e.g. 30m, 24h, 7d
        #[arg(long, value_parser = parse_since)]
        since: Option<Duration>,

        #[arg(long)]
        newest_first: bool,

        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },

    /// Fetch feeds periodically in batches
    Watch {
        /// Feed URL (repeatable; default: feeds from config)
        #[arg(short, long = "feed")]
        feeds: Vec<String>,

        /// Run a single pass and exit
        #[arg(long)]
        once: bool,
    },

    /// Show stored sources
    Sources {
        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },

    /// Mark an item as read
    Read {
        source: String,
        id: String,
        /// Mark as unread instead
        #[arg(long)]
        undo: bool,
    },

    /// Star an item
    Star {
        source: String,
        id: String,
        /// Remove the star instead
        #[arg(long)]
        undo: bool,
    },

    /// Validate the configuration file
    Validate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Table,
    Json,
}

/// Initialize logging; `RUST_LOG` overrides `level`.
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Parse `<n>{s,m,h,d,w}` into a duration.
fn parse_since(raw: &str) -> std::result::Result<Duration, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("missing unit in {raw:?} (use s, m, h, d or w)"))?;
    let (number, unit) = raw.split_at(split);
    let n: u64 = number
        .parse()
        .map_err(|_| format!("invalid number in {raw:?}"))?;
    let scale = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        "w" => 604_800,
        other => return Err(format!("unknown unit {other:?} (use s, m, h, d or w)")),
    };
    let secs = n
        .checked_mul(scale)
        .ok_or_else(|| format!("{raw:?} is too large"))?;
    Ok(Duration::from_secs(secs))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.storage_dir.join("config.toml");

    if let Command::Validate = cli.command {
        init_logging(if cli.verbose { "debug" } else { "info" });
        pipeline::run_validate(&config_path)?;
        return Ok(());
    }

    let loaded = Config::load(&config_path);
    let level = match (&loaded, cli.verbose) {
        (_, true) => "debug",
        (Ok(config), false) => config.logging.level.as_str(),
        (Err(_), false) => "info",
    };
    init_logging(level);

    let config = match loaded {
        Ok(config) => {
            log::debug!("Loaded configuration from {}", config_path.display());
            config
        }
        Err(e) => {
            log::warn!("Config load failed from {}: {}. Using defaults.", config_path.display(), e);
            Config::default()
        }
    };
    config.validate()?;

    let store = Arc::new(LocalStore::from_config(&config, &cli.storage_dir).await?);

    match cli.command {
        Command::Update { feeds } => {
            let feeds = pick_feeds(feeds, &config);
            let fetcher = Fetcher::with_feed_parser(&config.fetcher, store.clone())?;

            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(&cancel);

            let report =
                pipeline::run_update(&fetcher, &feeds, config.fetcher.deadline(), &cancel).await?;
            for (source, added) in &report.added {
                println!("{added:>4} new  {source}");
            }
            for failure in &report.failures {
                println!("  failed  {}: {}", failure.source_id, failure.error);
            }
            for source in &report.skipped {
                println!(" skipped  {source}");
            }
        }

        Command::List {
            limit,
            feed,
            since,
            newest_first,
            format,
        } => {
            let since = since
                .map(chrono::Duration::from_std)
                .transpose()
                .map_err(|e| AppError::validation(format!("--since out of range: {e}")))?
                .map(|age| Utc::now() - age);
            let query = ListQuery {
                limit,
                source: feed,
                since,
                newest_first,
            };
            let items = store.list(&query).await;
            match format {
                Format::Table => print_items(&items),
                Format::Json => println!("{}", serde_json::to_string_pretty(&items)?),
            }
        }

        Command::Watch { feeds, once } => {
            let feeds = pick_feeds(feeds, &config);
            let fetcher = Arc::new(Fetcher::with_feed_parser(&config.fetcher, store.clone())?);
            let scheduler = BatchScheduler::new(fetcher, config.scheduler.clone());

            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(&cancel);

            pipeline::run_watch(&scheduler, feeds, once, &cancel).await?;
        }

        Command::Sources { format } => {
            let sources = store.sources().await;
            match format {
                Format::Table => print_sources(&sources),
                Format::Json => println!("{}", serde_json::to_string_pretty(&sources)?),
            }
        }

        Command::Read { source, id, undo } => {
            set_flag(&*store, &source, &id, FlagUpdate::read(!undo)).await?;
        }

        Command::Star { source, id, undo } => {
            set_flag(&*store, &source, &id, FlagUpdate::starred(!undo)).await?;
        }

        // Handled before the store is opened.
        Command::Validate => {}
    }

    Ok(())
}

fn pick_feeds(cli_feeds: Vec<String>, config: &Config) -> Vec<String> {
    if cli_feeds.is_empty() {
        config.feeds.clone()
    } else {
        cli_feeds
    }
}

async fn set_flag(store: &dyn ItemStorage, source: &str, id: &str, update: FlagUpdate) -> Result<()> {
    if !store.set_flags(source, id, update).await? {
        return Err(AppError::validation(format!("no item {id:?} in {source}")));
    }
    log::info!("Updated {id} in {source}");
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn print_items(items: &[FeedItem]) {
    if items.is_empty() {
        println!("No items.");
        return;
    }
    for item in items {
        let date = if item.has_date() {
            item.published.format("%Y-%m-%d %H:%M").to_string()
        } else {
            "-".to_string()
        };
        let flags = format!(
            "{}{}",
            if item.read { ' ' } else { '•' },
            if item.starred { '*' } else { ' ' }
        );
        println!(
            "{date:<16} {flags} {:<20} {}",
            truncate(&item.source, 20),
            truncate(&item.title, 70)
        );
        if !item.link.is_empty() {
            println!("{:<19} {}", "", item.link);
        }
    }
}

fn print_sources(sources: &[FeedMeta]) {
    if sources.is_empty() {
        println!("No sources.");
        return;
    }
    println!("{:<30} {:<16} {:<16} URL", "TITLE", "UPDATED", "LAST FETCH");
    for meta in sources {
        println!(
            "{:<30} {:<16} {:<16} {}",
            truncate(&meta.title, 30),
            meta.updated.format("%Y-%m-%d %H:%M"),
            meta.last_fetch.format("%Y-%m-%d %H:%M"),
            meta.url
        );
    }
}
