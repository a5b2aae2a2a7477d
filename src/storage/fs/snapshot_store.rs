use std::fs;
use std::path::PathBuf;

use serde_json::Value;
use tracing::warn;

use crate::domain::Post;
use crate::errors::MirrorResult;
use crate::storage::traits::SnapshotStore;

/// Durable snapshot persisted as one JSON array of post records.
///
/// Loading tolerates malformed entries (they are skipped, not fatal);
/// saving rewrites the whole file in one shot and write failures abort
/// the run.
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn load(&self) -> MirrorResult<Vec<Post>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.path)?;

        let entries: Vec<Value> = match serde_json::from_str(&text) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, path = %self.path.display(), "snapshot unreadable, starting empty");
                return Ok(Vec::new());
            }
        };

        let mut posts = Vec::with_capacity(entries.len());
        for entry in &entries {
            match Post::from_snapshot_entry(entry) {
                Some(post) => posts.push(post),
                None => warn!("skipping non-object snapshot entry"),
            }
        }
        Ok(posts)
    }

    fn save(&self, posts: &[Post]) -> MirrorResult<()> {
        let body = serde_json::to_string_pretty(posts)?;
        fs::write(&self.path, body)?;
        Ok(())
    }
}
