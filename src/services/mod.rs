pub mod fetch_service;
pub mod reconcile;
pub mod sync_service;

pub use fetch_service::{FetchOptions, FetchOutcome, FetchService, FetchSource};
pub use reconcile::{dedupe_posts, reconcile, MergeMode};
pub use sync_service::{SlugChange, SyncOutcome, SyncReport, SyncService};
