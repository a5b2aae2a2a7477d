use std::fmt;
use std::thread;
use std::time::Duration;

use serde_json::json;
use tracing::{info, warn};

use crate::api::{filter_new, ArticleApi};
use crate::config::Config;
use crate::domain::{Post, RawArticle};
use crate::errors::MirrorResult;

/// Where a fetch outcome's articles came from. Logging and testing only;
/// correctness decisions key off `success` and `no_new_posts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Api,
    Cache,
    Mock,
    ForcedEmpty,
}

impl FetchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchSource::Api => "api",
            FetchSource::Cache => "cache",
            FetchSource::Mock => "mock",
            FetchSource::ForcedEmpty => "forced-empty",
        }
    }
}

impl fmt::Display for FetchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one fetch run against the upstream API.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub articles: Vec<RawArticle>,
    pub success: bool,
    pub no_new_posts: bool,
    pub source: FetchSource,
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub username: String,
    pub per_page: usize,
    pub page_delay: Duration,
    pub item_delay: Duration,
    pub force_empty_feed: bool,
    pub validation_mode: bool,
    pub validation_no_posts: bool,
}

impl FetchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            username: config.username.clone(),
            per_page: config.per_page,
            page_delay: config.page_delay,
            item_delay: config.item_delay,
            force_empty_feed: config.force_empty_feed,
            validation_mode: config.validation_mode,
            validation_no_posts: config.validation_no_posts,
        }
    }
}

/// Drives pagination and per-item hydration against the upstream API,
/// distinguishing "no new posts" from "API failure" (which falls back to
/// the cached snapshot).
pub struct FetchService<A: ArticleApi> {
    api: A,
    options: FetchOptions,
}

impl<A: ArticleApi> FetchService<A> {
    pub fn new(api: A, options: FetchOptions) -> Self {
        Self { api, options }
    }

    pub fn fetch_all(&self, last_run: Option<&str>, cached: &[Post]) -> MirrorResult<FetchOutcome> {
        if self.options.force_empty_feed {
            return Ok(FetchOutcome {
                articles: Vec::new(),
                success: true,
                no_new_posts: last_run.is_some(),
                source: FetchSource::ForcedEmpty,
            });
        }
        if self.options.validation_mode {
            return Ok(self.validation_outcome());
        }

        let summaries = match self.fetch_summary_pages(last_run)? {
            Some(summaries) => summaries,
            // Upstream unreachable before the first page landed.
            None => return Ok(self.cache_outcome(cached)),
        };

        if summaries.is_empty() {
            return Ok(FetchOutcome {
                articles: Vec::new(),
                success: true,
                no_new_posts: last_run.is_some(),
                source: FetchSource::Api,
            });
        }

        let full = self.hydrate(&summaries);
        if full.is_empty() {
            warn!(
                summaries = summaries.len(),
                "all per-item fetches failed, falling back to cached snapshot"
            );
            return Ok(self.cache_outcome(cached));
        }

        Ok(FetchOutcome {
            articles: full,
            success: true,
            no_new_posts: false,
            source: FetchSource::Api,
        })
    }

    /// Page through the summary listing until a short page signals the end.
    /// `Ok(None)` means the very first page could not be fetched at all.
    fn fetch_summary_pages(&self, last_run: Option<&str>) -> MirrorResult<Option<Vec<RawArticle>>> {
        let mut summaries = Vec::new();
        let mut page: u32 = 1;
        loop {
            let Some(data) = self.api.fetch_page(page) else {
                if page == 1 {
                    return Ok(None);
                }
                warn!(page, "page fetch failed mid-pagination, keeping earlier pages");
                break;
            };

            let count = data.len();
            summaries.extend(filter_new(data, last_run)?);

            // The listing is ordered by publish time, not edit time; page
            // until a short page rather than stopping at the first stale one.
            if count < self.options.per_page {
                break;
            }
            page += 1;
            thread::sleep(self.options.page_delay);
        }
        Ok(Some(summaries))
    }

    fn hydrate(&self, summaries: &[RawArticle]) -> Vec<RawArticle> {
        let mut full = Vec::new();
        let mut failed = 0usize;
        for (index, summary) in summaries.iter().enumerate() {
            match self.api.fetch_article(summary.id) {
                Some(article) => full.push(article),
                None => {
                    failed += 1;
                    warn!(id = summary.id, "failed to hydrate article");
                }
            }
            if index + 1 < summaries.len() {
                thread::sleep(self.options.item_delay);
            }
        }
        if failed > 0 {
            info!(failed, fetched = full.len(), "hydration finished with failures");
        }
        full
    }

    fn cache_outcome(&self, cached: &[Post]) -> FetchOutcome {
        let articles: Vec<RawArticle> = cached
            .iter()
            .map(|post| post.to_raw_article(&self.options.username))
            .collect();
        info!(count = articles.len(), "using cached snapshot as pseudo-upstream records");
        FetchOutcome {
            articles,
            success: false,
            no_new_posts: false,
            source: FetchSource::Cache,
        }
    }

    fn validation_outcome(&self) -> FetchOutcome {
        if self.options.validation_no_posts {
            return FetchOutcome {
                articles: Vec::new(),
                success: true,
                no_new_posts: false,
                source: FetchSource::Mock,
            };
        }
        let article: RawArticle = serde_json::from_value(json!({
            "id": 1,
            "title": "Test Article",
            "url": format!("https://dev.to/{}/test-article", self.options.username),
            "published_at": "2024-01-01T00:00:00Z",
            "body_html": "<p>Test content</p>",
            "description": "Test description",
            "cover_image": "",
            "tag_list": ["test", "validation"],
            "slug": "test-article"
        }))
        .unwrap_or_default();
        FetchOutcome {
            articles: vec![article],
            success: true,
            no_new_posts: false,
            source: FetchSource::Mock,
        }
    }
}
