use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::domain::Post;

/// How delta posts are combined with the existing snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// The delta replaces the snapshot outright (forced full regeneration).
    Replace,
    /// The delta is unioned with the snapshot, then deduplicated.
    Merge,
}

/// Identity used for deduplication: numeric id when present, else the
/// canonical link with any trailing slash stripped, else the title.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum DedupKey {
    Id(u64),
    Link(String),
    Title(String),
}

fn dedup_key(post: &Post) -> DedupKey {
    if post.id != 0 {
        DedupKey::Id(post.id)
    } else if !post.link.is_empty() {
        DedupKey::Link(post.link.trim_end_matches('/').to_string())
    } else {
        DedupKey::Title(post.title.clone())
    }
}

/// Merge delta posts into the snapshot and deduplicate.
///
/// Stable and idempotent: reconciling a snapshot with an empty delta
/// yields a content-equal snapshot.
pub fn reconcile(existing: Vec<Post>, delta: Vec<Post>, mode: MergeMode) -> Vec<Post> {
    let combined = match mode {
        MergeMode::Replace => delta,
        MergeMode::Merge => {
            let mut all = existing;
            all.extend(delta);
            all
        }
    };
    dedupe_posts(combined)
}

/// Keep exactly one post per identity. The record with the later activity
/// timestamp wins (ties and missing timestamps keep the earlier record)
/// and inherits any scalar fields it is missing from the records it
/// displaces, so thin refetches never regress enriched posts. Output is
/// ordered newest-first; posts with no parseable timestamp sort last.
pub fn dedupe_posts(posts: Vec<Post>) -> Vec<Post> {
    let mut order: Vec<DedupKey> = Vec::new();
    let mut selected: HashMap<DedupKey, Post> = HashMap::new();

    for post in posts {
        let key = dedup_key(&post);
        match selected.entry(key) {
            Entry::Vacant(slot) => {
                order.push(slot.key().clone());
                slot.insert(post);
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get_mut();
                let incoming_wins = match (post.activity_timestamp(), current.activity_timestamp()) {
                    (Some(incoming), Some(held)) => incoming > held,
                    (Some(_), None) => true,
                    _ => false,
                };
                if incoming_wins {
                    let displaced = std::mem::replace(current, post);
                    backfill_missing_fields(current, &displaced);
                } else {
                    backfill_missing_fields(current, &post);
                }
            }
        }
    }

    let mut deduped: Vec<Post> = order
        .into_iter()
        .filter_map(|key| selected.remove(&key))
        .collect();
    deduped.sort_by(|a, b| sort_key(b).cmp(&sort_key(a)));
    deduped
}

fn sort_key(post: &Post) -> Option<DateTime<Utc>> {
    // None orders before Some, so with a descending comparator undated
    // posts land at the end.
    post.activity_timestamp()
}

fn backfill_missing_fields(winner: &mut Post, loser: &Post) {
    if winner.id == 0 {
        winner.id = loser.id;
    }
    if winner.description.is_empty() {
        winner.description = loser.description.clone();
    }
    if winner.content_html.is_empty() {
        winner.content_html = loser.content_html.clone();
    }
    if winner.cover_image.is_empty() {
        winner.cover_image = loser.cover_image.clone();
    }
    if winner.author.is_empty() {
        winner.author = loser.author.clone();
    }
    if winner.date.is_empty() {
        winner.date = loser.date.clone();
    }
    if winner.tags.is_empty() {
        winner.tags = loser.tags.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post(value: serde_json::Value) -> Post {
        Post::from_snapshot_entry(&value).unwrap()
    }

    #[test]
    fn test_empty_delta_is_idempotent() {
        let snapshot = vec![
            post(json!({
                "id": 2,
                "title": "Newer",
                "link": "https://dev.to/alice/newer-2b",
                "date": "2024-02-01T00:00:00Z"
            })),
            post(json!({
                "id": 1,
                "title": "Older",
                "link": "https://dev.to/alice/older-1a",
                "date": "2024-01-01T00:00:00Z"
            })),
        ];

        let reconciled = reconcile(snapshot.clone(), Vec::new(), MergeMode::Merge);
        assert_eq!(reconciled, snapshot);
    }

    #[test]
    fn test_reconcile_with_itself_converges() {
        let snapshot = vec![
            post(json!({
                "id": 1,
                "title": "One",
                "link": "https://dev.to/alice/one-1a",
                "api_data": {"edited_at": "2024-01-02"}
            })),
            post(json!({
                "id": 2,
                "title": "Two",
                "link": "https://dev.to/alice/two-2b",
                "api_data": {"edited_at": "2024-01-05"}
            })),
        ];

        let reconciled = reconcile(snapshot.clone(), snapshot, MergeMode::Merge);
        let ids: Vec<u64> = reconciled.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_newer_edit_wins_by_id() {
        let old = post(json!({
            "id": 7,
            "title": "Old title",
            "link": "https://dev.to/alice/old-slug-7a",
            "date": "2024-01-01T00:00:00Z",
            "api_data": {"edited_at": "2024-01-01T00:00:00Z"}
        }));
        let new = post(json!({
            "id": 7,
            "title": "New title",
            "link": "https://dev.to/alice/new-slug-7a",
            "date": "2024-01-01T00:00:00Z",
            "api_data": {"edited_at": "2024-03-01T00:00:00Z"}
        }));

        let reconciled = reconcile(vec![old], vec![new], MergeMode::Merge);
        assert_eq!(reconciled.len(), 1);
        assert_eq!(reconciled[0].title, "New title");
    }

    #[test]
    fn test_winner_backfills_missing_fields_from_loser() {
        let full = post(json!({
            "id": 7,
            "title": "Enriched",
            "link": "https://dev.to/alice/post-7a",
            "description": "a rich description",
            "cover_image": "https://img.example/cover.png",
            "date": "2024-01-01T00:00:00Z"
        }));
        let thin = post(json!({
            "id": 7,
            "title": "Thin refetch",
            "link": "https://dev.to/alice/post-7a",
            "date": "2024-01-01T00:00:00Z",
            "api_data": {"edited_at": "2024-05-01T00:00:00Z"}
        }));

        let reconciled = reconcile(vec![full], vec![thin], MergeMode::Merge);
        assert_eq!(reconciled.len(), 1);
        assert_eq!(reconciled[0].title, "Thin refetch");
        assert_eq!(reconciled[0].description, "a rich description");
        assert_eq!(reconciled[0].cover_image, "https://img.example/cover.png");
    }

    #[test]
    fn test_tie_keeps_existing_record() {
        let held = post(json!({
            "id": 7,
            "title": "Held",
            "link": "https://dev.to/alice/post-7a",
            "date": "2024-01-01T00:00:00Z"
        }));
        let same_age = post(json!({
            "id": 7,
            "title": "Challenger",
            "link": "https://dev.to/alice/post-7a",
            "date": "2024-01-01T00:00:00Z"
        }));

        let reconciled = reconcile(vec![held], vec![same_age], MergeMode::Merge);
        assert_eq!(reconciled[0].title, "Held");
    }

    #[test]
    fn test_missing_timestamp_never_displaces() {
        let dated = post(json!({
            "id": 7,
            "title": "Dated",
            "link": "https://dev.to/alice/post-7a",
            "date": "2024-01-01T00:00:00Z"
        }));
        let undated = post(json!({
            "id": 7,
            "title": "Undated",
            "link": "https://dev.to/alice/post-7a"
        }));

        let reconciled = reconcile(vec![dated], vec![undated], MergeMode::Merge);
        assert_eq!(reconciled[0].title, "Dated");
    }

    #[test]
    fn test_dedup_by_link_ignores_trailing_slash() {
        let with_slash = post(json!({
            "title": "Same post",
            "link": "https://dev.to/alice/post-1a/",
            "date": "2024-01-01T00:00:00Z"
        }));
        let without_slash = post(json!({
            "title": "Same post again",
            "link": "https://dev.to/alice/post-1a",
            "date": "2024-02-01T00:00:00Z"
        }));

        let reconciled = reconcile(vec![with_slash], vec![without_slash], MergeMode::Merge);
        assert_eq!(reconciled.len(), 1);
        assert_eq!(reconciled[0].title, "Same post again");
    }

    #[test]
    fn test_dedup_falls_back_to_title() {
        let a = post(json!({"title": "Linkless", "date": "2024-01-01T00:00:00Z"}));
        let b = post(json!({"title": "Linkless", "date": "2024-02-01T00:00:00Z"}));

        let reconciled = reconcile(vec![a], vec![b], MergeMode::Merge);
        assert_eq!(reconciled.len(), 1);
    }

    #[test]
    fn test_id_zero_does_not_collide() {
        // Legacy records without numeric ids must not group together.
        let a = post(json!({
            "title": "First legacy",
            "link": "https://dev.to/alice/first-1a",
            "date": "2024-01-01T00:00:00Z"
        }));
        let b = post(json!({
            "title": "Second legacy",
            "link": "https://dev.to/alice/second-2b",
            "date": "2024-01-02T00:00:00Z"
        }));

        let reconciled = reconcile(vec![a, b], Vec::new(), MergeMode::Merge);
        assert_eq!(reconciled.len(), 2);
    }

    #[test]
    fn test_replace_mode_drops_existing() {
        let existing = vec![post(json!({
            "id": 1,
            "title": "Old",
            "link": "https://dev.to/alice/old-1a",
            "date": "2024-01-01T00:00:00Z"
        }))];
        let delta = vec![post(json!({
            "id": 2,
            "title": "New",
            "link": "https://dev.to/alice/new-2b",
            "date": "2024-02-01T00:00:00Z"
        }))];

        let reconciled = reconcile(existing, delta, MergeMode::Replace);
        assert_eq!(reconciled.len(), 1);
        assert_eq!(reconciled[0].id, 2);
    }

    #[test]
    fn test_ordering_newest_first_undated_last() {
        let undated = post(json!({
            "title": "Undated",
            "link": "https://dev.to/alice/undated-0x"
        }));
        let old = post(json!({
            "title": "Old",
            "link": "https://dev.to/alice/old-1a",
            "date": "2024-01-01T00:00:00Z"
        }));
        let new = post(json!({
            "title": "New",
            "link": "https://dev.to/alice/new-2b",
            "date": "2024-06-01T00:00:00Z"
        }));

        let reconciled = reconcile(vec![undated, old, new], Vec::new(), MergeMode::Merge);
        let titles: Vec<&str> = reconciled.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["New", "Old", "Undated"]);
    }

    #[test]
    fn test_edit_time_outranks_publish_time_for_ordering() {
        let published_late = post(json!({
            "id": 1,
            "title": "Published later",
            "link": "https://dev.to/alice/late-1a",
            "date": "2024-03-01T00:00:00Z"
        }));
        let edited_later = post(json!({
            "id": 2,
            "title": "Edited most recently",
            "link": "https://dev.to/alice/edited-2b",
            "date": "2024-01-01T00:00:00Z",
            "api_data": {"edited_at": "2024-06-01T00:00:00Z"}
        }));

        let reconciled = reconcile(vec![published_late, edited_later], Vec::new(), MergeMode::Merge);
        assert_eq!(reconciled[0].id, 2);
    }
}
