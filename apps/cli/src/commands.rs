//! CLI command definitions, routing, and tracing setup.

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use feedherald_core::resolver::series_key;
use feedherald_feed::{FeedFetcher, FeedSource};
use feedherald_shared::{Config, DatabaseConfig, PendingEntry, display_timestamp};
use feedherald_storage::Ledger;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// feedherald: release announcements with role mentions.
#[derive(Parser)]
#[command(
    name = "feedherald",
    version,
    about = "Announce feed releases to Discord, mentioning each series' role.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
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
    /// Connect to Discord and run the poller, sweeper and relay listener.
    Run,

    /// Inspect or edit the pending queue.
    Pending {
        #[command(subcommand)]
        action: PendingAction,
    },

    /// Feed diagnostics.
    Feed {
        #[command(subcommand)]
        action: FeedAction,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Pending queue subcommands.
#[derive(Subcommand)]
pub(crate) enum PendingAction {
    /// List queued entries, oldest first.
    List {
        /// Show abandoned entries instead.
        #[arg(long)]
        abandoned: bool,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Remove an entry from the queue.
    Purge {
        /// Entry id.
        id: String,
    },
}

/// Feed subcommands.
#[derive(Subcommand)]
pub(crate) enum FeedAction {
    /// Fetch the feed once and print its newest item.
    Peek,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Show resolved configuration (secrets redacted).
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "feedherald=info",
        1 => "feedherald=debug",
        _ => "feedherald=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
///
/// The pending queue commands only need the ledger settings; everything else
/// loads the full configuration.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run => cmd_run(Config::from_env()?).await,
        Command::Pending { action } => {
            let database = DatabaseConfig::from_env()?;
            match action {
                PendingAction::List { abandoned, json } => {
                    cmd_pending_list(&database, abandoned, json).await
                }
                PendingAction::Purge { id } => cmd_pending_purge(&database, &id).await,
            }
        }
        Command::Feed {
            action: FeedAction::Peek,
        } => cmd_feed_peek(Config::from_env()?).await,
        Command::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&Config::from_env()?),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config: Config) -> Result<()> {
    info!(
        feed = %config.feed_url,
        guild_id = config.guild_id,
        target_channel_id = config.target_channel_id,
        "starting feedherald"
    );
    feedherald_discord::run(config).await?;
    Ok(())
}

async fn cmd_pending_list(database: &DatabaseConfig, abandoned: bool, json: bool) -> Result<()> {
    let ledger = Ledger::open(database).await?;
    let entries = if abandoned {
        ledger.list_abandoned().await?
    } else {
        ledger.list_pending().await?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No {} entries.", if abandoned { "abandoned" } else { "pending" });
        return Ok(());
    }
    for line in render_table(&entries) {
        println!("{line}");
    }
    Ok(())
}

fn render_table(entries: &[PendingEntry]) -> Vec<String> {
    let id_width = entries
        .iter()
        .map(|e| e.item.id.chars().count())
        .max()
        .unwrap_or(0)
        .max(2);

    let mut lines = vec![format!("{:<id_width$}  {:>8}  {:<19}  TITLE", "ID", "ATTEMPTS", "PUBLISHED")];
    lines.extend(entries.iter().map(|e| {
        format!(
            "{:<id_width$}  {:>8}  {:<19}  {}",
            e.item.id, e.attempts, e.item.published, e.item.title
        )
    }));
    lines
}

async fn cmd_pending_purge(database: &DatabaseConfig, id: &str) -> Result<()> {
    let ledger = Ledger::open(database).await?;
    if ledger.remove_pending(id).await? {
        println!("Removed {id}.");
        Ok(())
    } else {
        Err(eyre!("no pending entry with id '{id}'"))
    }
}

async fn cmd_feed_peek(config: Config) -> Result<()> {
    let ledger = Ledger::open(&config.database).await?;
    let fetcher = FeedFetcher::new(config.feed_url)?;
    let items = fetcher.fetch().await?;

    let Some(newest) = items.first() else {
        println!("{} has no entries.", fetcher.describe());
        return Ok(());
    };

    println!();
    println!("  Feed:      {}", fetcher.describe());
    println!("  Entries:   {}", items.len());
    println!("  Newest:    {}", newest.title);
    println!("  Series:    {}", series_key(&newest.title));
    println!("  Id:        {}", newest.id);
    println!("  Link:      {}", newest.link);
    println!("  Author:    {}", newest.author);
    println!("  Published: {}", display_timestamp(&newest.published));
    match ledger.seen_at(&newest.id).await? {
        Some(at) => println!("  Seen:      {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("  Seen:      not yet"),
    }
    println!();
    Ok(())
}

fn cmd_config_show(config: &Config) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
