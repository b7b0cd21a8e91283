use clap::{Args, Parser, Subcommand};

use crate::api::{PostId, DEFAULT_API_URL};
use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "tiktok-scraper",
    about = "Incrementally download a creator's TikTok posts",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// RapidAPI key for the tokapi service.
    /// Prefer the API_KEY environment variable; flags are visible in process listings.
    #[arg(long, env = "API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Installation root (holds data/db.sqlite3 and downloaded media)
    #[arg(short = 'd', long, env = "TIKTOK_SCRAPER_DIR", global = true)]
    pub directory: Option<String>,

    /// tokapi base URL
    #[arg(long, default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Log level (RUST_LOG takes precedence when set)
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    /// Retries after the first attempt for transient API and download failures
    #[arg(long, default_value_t = 2, global = true)]
    pub max_retries: u32,

    /// Base delay in seconds between retries (doubles each retry)
    #[arg(long, default_value_t = 5, global = true)]
    pub retry_delay: u64,

    /// Disable progress bar
    #[arg(long, global = true)]
    pub no_progress_bar: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a user, fetch posts newer than the watermark and download them
    Posts(PostsArgs),

    /// Run `posts` for every enabled user in the database
    SyncAll,

    /// Print a user's remote profile
    Info(TargetArgs),

    /// Include a stored user in `sync-all`
    Enable(TargetArgs),

    /// Exclude a stored user from `sync-all`
    Disable(TargetArgs),

    /// Show stored users, watermarks and download counts
    Status(StatusArgs),
}

#[derive(Args, Debug)]
pub struct PostsArgs {
    /// Numeric user ID, username or sec UID
    pub target: String,

    /// Only fetch posts newer than this post ID instead of the stored watermark
    #[arg(long)]
    pub since: Option<PostId>,
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Numeric user ID, username or sec UID
    pub target: String,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Limit output to one user
    pub target: Option<String>,

    /// List failed posts with their errors
    #[arg(long)]
    pub failed: bool,
}
