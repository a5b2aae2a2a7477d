use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{MirrorError, MirrorResult};

const DEFAULT_API_BASE: &str = "https://dev.to/api";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PER_PAGE: usize = 100;
const DEFAULT_PAGE_DELAY_MS: u64 = 500;
const DEFAULT_ITEM_DELAY_MS: u64 = 800;

#[derive(Debug, Clone)]
pub struct Config {
    pub username: String,
    pub api_base: String,
    pub api_key: Option<String>,
    pub data_dir: PathBuf,
    pub force_full_regen: bool,
    pub force_empty_feed: bool,
    pub validation_mode: bool,
    pub validation_no_posts: bool,
    pub github_output: Option<PathBuf>,
    pub github_step_summary: Option<PathBuf>,
    pub is_ci: bool,
    pub http_timeout: Duration,
    pub per_page: usize,
    pub page_delay: Duration,
    pub item_delay: Duration,
}

impl Config {
    pub fn from_env() -> MirrorResult<Self> {
        dotenvy::dotenv().ok();

        let username = std::env::var("DEVMIRROR_USERNAME")
            .map_err(|_| MirrorError::MissingEnvVar("DEVMIRROR_USERNAME".to_string()))?;

        let api_base = std::env::var("DEVMIRROR_API_BASE")
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let api_key = std::env::var("DEVMIRROR_API_KEY")
            .ok()
            .filter(|key| !key.is_empty());

        let data_dir = std::env::var("DEVMIRROR_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let http_timeout = std::env::var("DEVMIRROR_HTTP_TIMEOUT")
            .ok()
            .and_then(|value| value.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));

        Ok(Self {
            username,
            api_base,
            api_key,
            data_dir,
            force_full_regen: env_flag("FORCE_FULL_REGEN"),
            force_empty_feed: env_flag("DEVMIRROR_FORCE_EMPTY_FEED"),
            validation_mode: env_flag("VALIDATION_MODE"),
            validation_no_posts: env_flag("VALIDATION_NO_POSTS"),
            github_output: env_path("GITHUB_OUTPUT"),
            github_step_summary: env_path("GITHUB_STEP_SUMMARY"),
            is_ci: env_flag("CI") || env_flag("GITHUB_ACTIONS"),
            http_timeout,
            per_page: DEFAULT_PER_PAGE,
            page_delay: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
            item_delay: Duration::from_millis(DEFAULT_ITEM_DELAY_MS),
        })
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("posts_data.json")
    }

    pub fn last_run_path(&self) -> PathBuf {
        self.data_dir.join("last_run.txt")
    }

    pub fn no_new_posts_path(&self) -> PathBuf {
        self.data_dir.join("no_new_posts.flag")
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|value| is_truthy(&value)).unwrap_or(false)
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}
