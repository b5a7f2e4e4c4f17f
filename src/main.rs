use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use pithy::cli::{Cli, Commands};
use pithy::config::Config;
use pithy::domain::RefreshStatus;
use pithy::logging;
use pithy::services::{Scheduler, SubscriptionService, UnreadService};
use pithy::sources::HttpFetcher;
use pithy::storage::sqlite::{
    SqliteFeedRepository, SqliteStorage, SqliteSubscriptionRepository, SqliteUnreadItemRepository,
};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    logging::init(&config.log_level);

    // Initialize storage
    let storage = SqliteStorage::new(&config.db_path)
        .with_context(|| format!("failed to open database at {}", config.db_path))?;

    match cli.command {
        Commands::Serve => cmd_serve(storage, &config).await,
        Commands::Refresh => cmd_refresh(storage, &config).await,
        Commands::UserAdd { name } => cmd_user_add(storage, &name),
        Commands::Subscribe { user, url } => cmd_subscribe(storage, &user, &url),
        Commands::Unsubscribe { user, feed_id } => cmd_unsubscribe(storage, &user, feed_id),
        Commands::Feeds { user } => cmd_feeds(storage, &user),
        Commands::Unread { user, json } => cmd_unread(storage, &user, json),
        Commands::MarkRead { user, item_ids } => cmd_mark_read(storage, &user, &item_ids),
        Commands::MarkAllRead { user } => cmd_mark_all_read(storage, &user),
    }
}

fn build_scheduler(storage: SqliteStorage, config: &Config) -> anyhow::Result<Scheduler<SqliteFeedRepository>> {
    let repository = Arc::new(SqliteFeedRepository::new(storage));
    let fetcher = HttpFetcher::new(config.fetch_timeout).context("failed to build HTTP client")?;
    Ok(Scheduler::new(repository, fetcher, config.scheduler_config()))
}

async fn cmd_serve(storage: SqliteStorage, config: &Config) -> anyhow::Result<()> {
    let scheduler = build_scheduler(storage, config)?;

    info!(
        refresh_interval_secs = config.refresh_interval.as_secs(),
        staleness_secs = config.staleness.as_secs(),
        max_concurrent_fetches = config.max_concurrent_fetches,
        "starting refresh scheduler"
    );
    let handle = scheduler.spawn();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("interrupt received, stopping scheduler");
    handle.stop().await?;

    Ok(())
}

async fn cmd_refresh(storage: SqliteStorage, config: &Config) -> anyhow::Result<()> {
    let scheduler = build_scheduler(storage, config)?;
    let mut reports = scheduler.refresh_once().await;

    if reports.is_empty() {
        println!("No feeds due for refresh.");
        return Ok(());
    }

    reports.sort_by_key(|r| r.feed_id);
    for report in &reports {
        println!("  [{}] {}: {}", report.feed_id, report.url, report.status);
    }

    let failed = reports.iter().filter(|r| r.status.is_failure()).count();
    let new_items: usize = reports
        .iter()
        .map(|r| match r.status {
            RefreshStatus::Success { new_items, .. } => new_items,
            _ => 0,
        })
        .sum();
    println!(
        "\nRefreshed {} feeds: {} new items, {} failed",
        reports.len(),
        new_items,
        failed
    );

    Ok(())
}

fn cmd_user_add(storage: SqliteStorage, name: &str) -> anyhow::Result<()> {
    let service = SubscriptionService::new(SqliteSubscriptionRepository::new(storage));
    let id = service.add_user(name)?;
    println!("Created user {} (id {})", name.trim(), id);
    Ok(())
}

fn cmd_subscribe(storage: SqliteStorage, user: &str, url: &str) -> anyhow::Result<()> {
    let service = SubscriptionService::new(SqliteSubscriptionRepository::new(storage));
    let user_id = service.user_id(user)?;
    let feed_id = service.subscribe(user_id, url)?;
    println!("Subscribed {} to {} (feed {})", user, url, feed_id);
    Ok(())
}

fn cmd_unsubscribe(storage: SqliteStorage, user: &str, feed_id: i64) -> anyhow::Result<()> {
    let service = SubscriptionService::new(SqliteSubscriptionRepository::new(storage));
    let user_id = service.user_id(user)?;
    service.unsubscribe(user_id, feed_id)?;
    println!("Unsubscribed {} from feed {}", user, feed_id);
    Ok(())
}

fn cmd_feeds(storage: SqliteStorage, user: &str) -> anyhow::Result<()> {
    let service = SubscriptionService::new(SqliteSubscriptionRepository::new(storage));
    let user_id = service.user_id(user)?;
    let feeds = service.list(user_id)?;

    if feeds.is_empty() {
        println!("No subscriptions.");
        return Ok(());
    }

    println!("Subscriptions:\n");
    for feed in feeds {
        println!("  [{}] {}", feed.feed_id, feed.display_name());
        println!("    URL: {}", feed.url);
        match feed.last_fetch_time {
            Some(time) => println!("    Last checked: {}", time.to_rfc3339()),
            None => println!("    Last checked: never"),
        }
        if let Some(reason) = feed.last_failure {
            println!("    Last failure: {}", reason);
        }
        println!();
    }

    Ok(())
}

fn cmd_unread(storage: SqliteStorage, user: &str, json: bool) -> anyhow::Result<()> {
    let subscriptions = SubscriptionService::new(SqliteSubscriptionRepository::new(storage.clone()));
    let user_id = subscriptions.user_id(user)?;
    let unread = UnreadService::new(SqliteUnreadItemRepository::new(storage));
    let entries = unread.list(user_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No unread items.");
        return Ok(());
    }

    for entry in &entries {
        let feed = entry
            .feed_name
            .clone()
            .unwrap_or_else(|| format!("feed {}", entry.feed_id));
        let title = if entry.title.is_empty() {
            "(untitled)"
        } else {
            entry.title.as_str()
        };
        println!("  [{}] {} ({})", entry.item_id, title, feed);
        println!("    {}", entry.url);
        if let Some(published) = entry.publication_time {
            println!("    Published: {}", published.to_rfc3339());
        }
    }
    println!("\n{} unread items.", entries.len());

    Ok(())
}

fn cmd_mark_read(storage: SqliteStorage, user: &str, item_ids: &[i64]) -> anyhow::Result<()> {
    let subscriptions = SubscriptionService::new(SqliteSubscriptionRepository::new(storage.clone()));
    let user_id = subscriptions.user_id(user)?;
    let unread = UnreadService::new(SqliteUnreadItemRepository::new(storage));
    let summary = unread.mark_read(user_id, item_ids)?;
    println!("Marked {} items as read.", summary.marked);
    if !summary.skipped.is_empty() {
        let skipped: Vec<String> = summary.skipped.iter().map(|id| id.to_string()).collect();
        println!("Skipped items that were not unread: {}", skipped.join(", "));
    }
    Ok(())
}

fn cmd_mark_all_read(storage: SqliteStorage, user: &str) -> anyhow::Result<()> {
    let subscriptions = SubscriptionService::new(SqliteSubscriptionRepository::new(storage.clone()));
    let user_id = subscriptions.user_id(user)?;
    let unread = UnreadService::new(SqliteUnreadItemRepository::new(storage));
    let count = unread.mark_all_read(user_id)?;
    println!("Marked {} items as read.", count);
    Ok(())
}
