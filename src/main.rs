//! tiktok-scraper: incremental TikTok post downloader.
//!
//! Resolves a creator, pages through their posts newest first until the
//! stored watermark is reached, downloads each new video and records every
//! outcome in SQLite so repeated runs only fetch what is new.

#![warn(clippy::all)]

mod api;
mod cli;
mod config;
mod download;
mod resolve;
pub mod retry;
mod state;
mod sync;
mod types;

use clap::Parser;
use reqwest::Client;
use tracing_subscriber::EnvFilter;

use api::{PostId, RapidApiClient, TikTokApi};
use cli::Command;
use config::Config;
use download::BatchSummary;
use state::{SqliteStateDb, StateDb, UserRecord};

/// Resolve, sync and download one user.
async fn run_posts(
    api: &dyn TikTokApi,
    db: &dyn StateDb,
    client: &Client,
    config: &Config,
    target: &str,
    since: Option<PostId>,
) -> anyhow::Result<BatchSummary> {
    let user_id = resolve::resolve_user_id(api, db, target).await?;
    tracing::info!("Resolved {} to user {}", target, user_id);

    let posts = sync::fetch_new_posts(api, db, &user_id, since).await?;
    download::process_batch(client, db, &config.download_config(), &posts).await
}

/// Run `posts` for every enabled user, continuing past individual failures.
async fn run_sync_all(
    api: &dyn TikTokApi,
    db: &dyn StateDb,
    client: &Client,
    config: &Config,
) -> anyhow::Result<()> {
    let users = db.list_enabled_users().await?;
    if users.is_empty() {
        tracing::info!("No enabled users; run `posts <TARGET>` first");
        return Ok(());
    }

    let mut failures = 0usize;
    for user in &users {
        tracing::info!("── {} ──", user.display_name());
        if let Err(e) = run_posts(api, db, client, config, &user.user_id, None).await {
            tracing::error!("Sync failed for {}: {:#}", user.display_name(), e);
            failures += 1;
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} users failed to sync", failures, users.len());
    }
    Ok(())
}

async fn run_info(api: &dyn TikTokApi, db: &dyn StateDb, target: &str) -> anyhow::Result<()> {
    let user_id = resolve::resolve_user_id(api, db, target).await?;
    let profile = api.get_user_info(&user_id).await?;

    println!("User:       {}", profile.unique_id);
    println!("Nickname:   {}", profile.nickname);
    println!("User ID:    {}", profile.uid);
    println!("Sec UID:    {}", profile.sec_uid);
    println!("Posts:      {}", profile.aweme_count);
    println!("Followers:  {}", profile.follower_count);
    println!("Following:  {}", profile.following_count);
    if !profile.signature.is_empty() {
        println!("Bio:        {}", profile.signature);
    }
    Ok(())
}

/// Flip a stored user's `enabled` flag.
async fn run_set_enabled(db: &dyn StateDb, target: &str, enabled: bool) -> anyhow::Result<()> {
    let user = resolve::find_local_user(db, target)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No stored user matches '{}'", target))?;

    db.upsert_user(
        &user.user_id,
        user.unique_name.as_deref(),
        user.sec_uid.as_deref(),
        enabled,
    )
    .await?;
    println!(
        "{} {}",
        if enabled { "Enabled" } else { "Disabled" },
        user.display_name()
    );
    Ok(())
}

async fn print_user_status(db: &dyn StateDb, user: &UserRecord, failed: bool) -> anyhow::Result<()> {
    let summary = db.get_user_summary(&user.user_id).await?;
    println!(
        "{} ({}){}",
        user.display_name(),
        user.user_id,
        if user.enabled { "" } else { " [disabled]" }
    );
    println!("  Downloaded: {}", summary.downloaded);
    println!("  Failed:     {}", summary.failed);
    match &summary.watermark {
        Some(mark) => println!(
            "  Watermark:  {} (set {})",
            mark.post_id,
            mark.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("  Watermark:  none"),
    }

    if failed {
        for post in db.get_failed_posts(&user.user_id).await? {
            println!(
                "    {}: {}",
                post.post_id,
                post.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    Ok(())
}

async fn run_status(db: &dyn StateDb, target: Option<&str>, failed: bool) -> anyhow::Result<()> {
    let users = match target {
        Some(target) => vec![resolve::find_local_user(db, target)
            .await?
            .ok_or_else(|| anyhow::anyhow!("No stored user matches '{}'", target))?],
        None => db.list_users().await?,
    };

    if users.is_empty() {
        println!("No users stored yet.");
        return Ok(());
    }
    for user in &users {
        print_user_status(db, user, failed).await?;
    }
    Ok(())
}

async fn open_db(config: &Config) -> anyhow::Result<SqliteStateDb> {
    let layout = config.layout();
    tokio::fs::create_dir_all(layout.data_dir()).await?;
    let db = SqliteStateDb::open(&layout.db_path()).await?;
    tracing::debug!("State database at {}", db.path().display());
    Ok(db)
}

/// API client, state database and media client for commands that go remote.
async fn connect(config: &Config) -> anyhow::Result<(RapidApiClient, SqliteStateDb, Client)> {
    let api = RapidApiClient::new(config.api_key.as_deref(), &config.api_url, config.retry)?;
    let db = open_db(config).await?;
    let client = Client::builder().build()?;
    Ok((api, db, client))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    let config = Config::from_cli(&cli)?;
    tracing::debug!(?config, "Starting tiktok-scraper");

    match &cli.command {
        Command::Status(args) => {
            let db_path = config.layout().db_path();
            if !db_path.exists() {
                println!("No state database found at {}", db_path.display());
                println!("Run `posts <TARGET>` first to create it.");
                return Ok(());
            }
            let db = SqliteStateDb::open(&db_path).await?;
            run_status(&db, args.target.as_deref(), args.failed).await
        }
        Command::Enable(args) => run_set_enabled(&open_db(&config).await?, &args.target, true).await,
        Command::Disable(args) => {
            run_set_enabled(&open_db(&config).await?, &args.target, false).await
        }
        Command::Posts(args) => {
            let (api, db, client) = connect(&config).await?;
            run_posts(&api, &db, &client, &config, &args.target, args.since).await?;
            Ok(())
        }
        Command::SyncAll => {
            let (api, db, client) = connect(&config).await?;
            run_sync_all(&api, &db, &client, &config).await
        }
        Command::Info(args) => {
            let (api, db, _) = connect(&config).await?;
            run_info(&api, &db, &args.target).await
        }
    }
}
