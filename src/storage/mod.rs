pub mod fs;
pub mod traits;

pub use fs::{FsRunStateTracker, JsonSnapshotStore};
pub use traits::{RunStateTracker, SnapshotStore};
