use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;
use crate::download::paths::Layout;
use crate::download::DownloadConfig;
use crate::retry::RetryConfig;

/// Directory name under the platform data dir when no root is given.
const DEFAULT_DIR_NAME: &str = "tiktok-scraper";

/// Application configuration, resolved once from the command line and
/// environment and passed down explicitly.
pub struct Config {
    pub root: PathBuf,
    pub api_key: Option<String>,
    pub api_url: String,
    pub retry: RetryConfig,
    pub no_progress_bar: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("root", &self.root)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("retry", &self.retry)
            .field("no_progress_bar", &self.no_progress_bar)
            .finish()
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn default_root() -> anyhow::Result<PathBuf> {
    dirs::data_dir()
        .map(|d| d.join(DEFAULT_DIR_NAME))
        .ok_or_else(|| {
            anyhow::anyhow!("Could not determine a data directory; pass --directory")
        })
}

impl Config {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let root = match cli.directory.as_deref() {
            Some(dir) if !dir.trim().is_empty() => expand_tilde(dir),
            _ => default_root()?,
        };

        let base_delay = Duration::from_secs(cli.retry_delay);
        let retry = RetryConfig {
            max_retries: cli.max_retries,
            base_delay,
            max_delay: RetryConfig::default().max_delay.max(base_delay),
        };

        Ok(Self {
            root,
            api_key: cli.api_key.clone(),
            api_url: cli.api_url.clone(),
            retry,
            no_progress_bar: cli.no_progress_bar,
        })
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.root)
    }

    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig {
            layout: self.layout(),
            retry: self.retry,
            no_progress_bar: self.no_progress_bar,
        }
    }
}
