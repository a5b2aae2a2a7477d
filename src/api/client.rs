use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::traits::ArticleApi;
use crate::config::Config;
use crate::domain::RawArticle;
use crate::errors::{MirrorError, MirrorResult};

const PAGE_MAX_ATTEMPTS: u32 = 3;
const PAGE_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
// Per-item fetches happen once per article, so retry less aggressively.
const ITEM_MAX_ATTEMPTS: u32 = 2;
const ITEM_RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

const FOREM_ACCEPT: &str = "application/vnd.forem.api-v1+json";

/// Blocking client for the Forem articles API.
///
/// Transient failures (read timeout, connection reset) are retried with
/// exponential backoff; anything else fails immediately. All operations
/// return `None` on failure so callers can apply a fallback policy.
pub struct ApiClient {
    client: Client,
    base_url: String,
    username: String,
    per_page: usize,
    page_attempts: u32,
    page_retry_base: Duration,
    item_attempts: u32,
    item_retry_base: Duration,
}

impl ApiClient {
    pub fn new(config: &Config) -> MirrorResult<Self> {
        let mut headers = HeaderMap::new();
        let agent = if config.is_ci {
            "DevMirror-Bot/1.0 (GitHub-Actions)"
        } else {
            "DevMirror-Bot/1.0"
        };
        headers.insert(USER_AGENT, HeaderValue::from_static(agent));
        headers.insert(ACCEPT, HeaderValue::from_static(FOREM_ACCEPT));
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|e| MirrorError::Config(format!("Invalid API key: {e}")))?;
            headers.insert("api-key", value);
        }

        let client = Client::builder()
            .timeout(config.http_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            per_page: config.per_page,
            page_attempts: PAGE_MAX_ATTEMPTS,
            page_retry_base: PAGE_RETRY_BASE_DELAY,
            item_attempts: ITEM_MAX_ATTEMPTS,
            item_retry_base: ITEM_RETRY_BASE_DELAY,
        })
    }

    /// Override the page retry policy (tests use short delays).
    pub fn with_page_retry_policy(mut self, attempts: u32, base_delay: Duration) -> Self {
        self.page_attempts = attempts;
        self.page_retry_base = base_delay;
        self
    }

    /// Override the per-item retry policy.
    pub fn with_item_retry_policy(mut self, attempts: u32, base_delay: Duration) -> Self {
        self.item_attempts = attempts;
        self.item_retry_base = base_delay;
        self
    }

    fn request_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        attempts: u32,
        base_delay: Duration,
        what: &str,
    ) -> Option<T> {
        let mut delay = base_delay;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = self
                .client
                .get(url)
                .query(query)
                .send()
                .and_then(|response| response.error_for_status());

            let err = match outcome {
                Ok(response) => match response.json::<T>() {
                    Ok(parsed) => return Some(parsed),
                    Err(err) => err,
                },
                Err(err) => err,
            };

            if !is_transient(&err) {
                warn!(error = %err, what, "request failed, not retrying");
                return None;
            }
            if attempt >= attempts {
                warn!(error = %err, what, attempts, "giving up after transient failures");
                return None;
            }
            debug!(
                error = %err,
                what,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "transient error, backing off"
            );
            thread::sleep(delay);
            delay *= 2;
        }
    }
}

impl ArticleApi for ApiClient {
    fn fetch_page(&self, page: u32) -> Option<Vec<RawArticle>> {
        let url = format!("{}/articles", self.base_url);
        let mut query = vec![
            ("username", self.username.clone()),
            ("page", page.to_string()),
            ("per_page", self.per_page.to_string()),
        ];
        if page == 1 {
            // Cache buster: the listing endpoint sits behind a CDN whose
            // cache can outlive a publish.
            query.push(("_cb", cache_buster()));
        }

        let entries: Vec<Value> = self.request_json(
            &url,
            &query,
            self.page_attempts,
            self.page_retry_base,
            "article page",
        )?;
        Some(decode_records(entries))
    }

    fn fetch_article(&self, id: u64) -> Option<RawArticle> {
        let url = format!("{}/articles/{}", self.base_url, id);
        self.request_json(
            &url,
            &[],
            self.item_attempts,
            self.item_retry_base,
            "full article",
        )
    }
}

fn decode_records(entries: Vec<Value>) -> Vec<RawArticle> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<RawArticle>(entry) {
            Ok(article) => Some(article),
            Err(err) => {
                warn!(error = %err, "skipping malformed article record");
                None
            }
        })
        .collect()
}

fn is_transient(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_connect() {
        return true;
    }
    // Connection resets surface as request/body errors wrapping an io error.
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::TimedOut
            );
        }
        source = cause.source();
    }
    false
}

fn cache_buster() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| (elapsed.as_secs() / 60).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> Config {
        Config {
            username: "alice".to_string(),
            api_base: base_url.to_string(),
            api_key: None,
            data_dir: PathBuf::from("."),
            force_full_regen: false,
            force_empty_feed: false,
            validation_mode: false,
            validation_no_posts: false,
            github_output: None,
            github_step_summary: None,
            is_ci: false,
            http_timeout: Duration::from_millis(250),
            per_page: 2,
            page_delay: Duration::ZERO,
            item_delay: Duration::ZERO,
        }
    }

    fn fast_client(base_url: &str) -> ApiClient {
        ApiClient::new(&test_config(base_url))
            .unwrap()
            .with_page_retry_policy(3, Duration::from_millis(5))
            .with_item_retry_policy(2, Duration::from_millis(5))
    }

    #[test]
    fn test_fetch_page_decodes_records() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("GET"))
                .and(path("/articles"))
                .and(query_param("username", "alice"))
                .and(query_param("page", "1"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                    {"id": 1, "title": "First", "published_at": "2024-01-01T00:00:00Z"},
                    {"id": 2, "title": "Second", "published_at": "2024-01-02T00:00:00Z"}
                ])))
                .expect(1)
                .mount(&server),
        );

        let client = fast_client(&server.uri());
        let page = client.fetch_page(1).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, 1);
        assert_eq!(page[1].title.as_deref(), Some("Second"));
    }

    #[test]
    fn test_fetch_page_skips_malformed_records() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("GET"))
                .and(path("/articles"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                    {"id": 1, "title": "Good"},
                    "not an object",
                    {"id": 3, "title": "Also good"}
                ])))
                .mount(&server),
        );

        let client = fast_client(&server.uri());
        let page = client.fetch_page(1).unwrap();
        let ids: Vec<u64> = page.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_server_error_fails_without_retry() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("GET"))
                .and(path("/articles"))
                .respond_with(ResponseTemplate::new(500))
                .expect(1)
                .mount(&server),
        );

        let client = fast_client(&server.uri());
        assert!(client.fetch_page(1).is_none());
    }

    #[test]
    fn test_not_found_fails_without_retry() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("GET"))
                .and(path("/articles/99"))
                .respond_with(ResponseTemplate::new(404))
                .expect(1)
                .mount(&server),
        );

        let client = fast_client(&server.uri());
        assert!(client.fetch_article(99).is_none());
    }

    #[test]
    fn test_malformed_body_fails_without_retry() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("GET"))
                .and(path("/articles"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_string("this is not json"),
                )
                .expect(1)
                .mount(&server),
        );

        let client = fast_client(&server.uri());
        assert!(client.fetch_page(1).is_none());
    }

    #[test]
    fn test_timeout_retries_then_gives_up() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("GET"))
                .and(path("/articles"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!([]))
                        .set_delay(Duration::from_secs(2)),
                )
                .expect(3)
                .mount(&server),
        );

        let client = fast_client(&server.uri());
        assert!(client.fetch_page(1).is_none());
    }

    #[test]
    fn test_fetch_article_returns_full_record() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("GET"))
                .and(path("/articles/7"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "id": 7,
                    "title": "Full",
                    "body_html": "<p>entire body</p>"
                })))
                .mount(&server),
        );

        let client = fast_client(&server.uri());
        let article = client.fetch_article(7).unwrap();
        assert_eq!(article.body_html.as_deref(), Some("<p>entire body</p>"));
    }

    #[test]
    fn test_connection_refused_is_transient() {
        // Port 1 is never listening; the connect error should be classified
        // as transient and retried before giving up.
        let client = ApiClient::new(&test_config("http://127.0.0.1:1"))
            .unwrap()
            .with_page_retry_policy(2, Duration::from_millis(1));
        assert!(client.fetch_page(1).is_none());
    }
}
