use std::collections::HashMap;

use tracing::{info, warn};

use crate::api::ArticleApi;
use crate::domain::Post;
use crate::errors::MirrorResult;
use crate::services::fetch_service::{FetchService, FetchSource};
use crate::services::reconcile::{reconcile, MergeMode};
use crate::storage::traits::{RunStateTracker, SnapshotStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Successful check, zero deltas: downstream work can be skipped.
    NoNewPosts,
    /// Delta merged into the snapshot, run-state advanced.
    Incremental,
    /// Snapshot replaced outright by a forced full fetch.
    FullRegen,
    /// Upstream unusable; the previous snapshot was reused and run-state
    /// was left untouched.
    CacheFallback,
}

/// A post whose canonical link changed slug; the artifact rendered for the
/// old slug should be retired downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlugChange {
    pub id: u64,
    pub old_slug: String,
    pub new_slug: String,
}

#[derive(Debug)]
pub struct SyncReport {
    /// Final ordered post list (newest first), for downstream consumers.
    pub posts: Vec<Post>,
    pub outcome: SyncOutcome,
    pub source: FetchSource,
    pub new_or_updated: usize,
    pub slug_changes: Vec<SlugChange>,
}

/// Sequences fetch, delta normalization, reconciliation, and persistence,
/// choosing between full regeneration, incremental merge, and
/// cached-snapshot fallback.
pub struct SyncService<A: ArticleApi, S: SnapshotStore, R: RunStateTracker> {
    fetcher: FetchService<A>,
    snapshot: S,
    run_state: R,
    fallback_author: String,
    force_full_regen: bool,
}

impl<A: ArticleApi, S: SnapshotStore, R: RunStateTracker> SyncService<A, S, R> {
    pub fn new(
        fetcher: FetchService<A>,
        snapshot: S,
        run_state: R,
        fallback_author: String,
        force_full_regen: bool,
    ) -> Self {
        Self {
            fetcher,
            snapshot,
            run_state,
            fallback_author,
            force_full_regen,
        }
    }

    pub fn run(&self, dry_run: bool) -> MirrorResult<SyncReport> {
        let last_run = if self.force_full_regen {
            info!("forced full regeneration, ignoring recorded last run");
            None
        } else {
            self.run_state.get_last_run()?
        };

        let existing = self.snapshot.load()?;
        let fetch = self.fetcher.fetch_all(last_run.as_deref(), &existing)?;

        if fetch.no_new_posts {
            if !dry_run {
                // Advance the window even though nothing changed, so the
                // next run does not re-check the same period.
                self.run_state.set_last_run()?;
                self.run_state.mark_no_new_posts()?;
            }
            info!(source = %fetch.source, "no new posts since last run");
            return Ok(SyncReport {
                posts: existing,
                outcome: SyncOutcome::NoNewPosts,
                source: fetch.source,
                new_or_updated: 0,
                slug_changes: Vec::new(),
            });
        }

        let delta: Vec<Post> = fetch
            .articles
            .iter()
            .map(|raw| Post::from_raw(raw, &self.fallback_author))
            .collect();
        let new_or_updated = delta.len();

        let previous_slugs: HashMap<u64, String> = existing
            .iter()
            .filter(|post| post.id != 0)
            .map(|post| (post.id, post.slug.clone()))
            .collect();

        // Replacing the snapshot is only safe when the data came from the
        // live API; a forced regen during an outage must still merge.
        let full_regen = self.force_full_regen && fetch.success && fetch.source == FetchSource::Api;
        let posts = if full_regen {
            reconcile(Vec::new(), delta, MergeMode::Replace)
        } else {
            reconcile(existing, delta, MergeMode::Merge)
        };

        let slug_changes: Vec<SlugChange> = posts
            .iter()
            .filter(|post| post.id != 0)
            .filter_map(|post| {
                previous_slugs
                    .get(&post.id)
                    .filter(|old| !old.is_empty() && **old != post.slug)
                    .map(|old| SlugChange {
                        id: post.id,
                        old_slug: old.clone(),
                        new_slug: post.slug.clone(),
                    })
            })
            .collect();

        if !dry_run {
            self.snapshot.save(&posts)?;
            if fetch.success {
                self.run_state.set_last_run()?;
            } else {
                warn!("cache fallback run, leaving last-run timestamp untouched");
            }
        }

        let outcome = if full_regen {
            SyncOutcome::FullRegen
        } else if fetch.success {
            SyncOutcome::Incremental
        } else {
            SyncOutcome::CacheFallback
        };

        info!(
            outcome = ?outcome,
            source = %fetch.source,
            total = posts.len(),
            new_or_updated,
            "sync finished"
        );

        Ok(SyncReport {
            posts,
            outcome,
            source: fetch.source,
            new_or_updated,
            slug_changes,
        })
    }
}
