use crate::domain::RawArticle;

#[cfg_attr(test, mockall::automock)]
pub trait ArticleApi {
    /// Fetch one page of summary records. `None` is a definitive fetch
    /// failure (retries exhausted or a non-retryable error).
    fn fetch_page(&self, page: u32) -> Option<Vec<RawArticle>>;

    /// Fetch one full record by id, for APIs that return abbreviated
    /// records in list form. Same failure semantics as `fetch_page`.
    fn fetch_article(&self, id: u64) -> Option<RawArticle>;
}
