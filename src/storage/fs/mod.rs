mod run_state_store;
mod snapshot_store;

pub use run_state_store::FsRunStateTracker;
pub use snapshot_store::JsonSnapshotStore;
