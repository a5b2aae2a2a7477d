use crate::domain::Post;
use crate::errors::MirrorResult;

#[cfg_attr(test, mockall::automock)]
pub trait SnapshotStore {
    fn load(&self) -> MirrorResult<Vec<Post>>;
    fn save(&self, posts: &[Post]) -> MirrorResult<()>;
}

#[cfg_attr(test, mockall::automock)]
pub trait RunStateTracker {
    fn get_last_run(&self) -> MirrorResult<Option<String>>;
    fn set_last_run(&self) -> MirrorResult<String>;
    fn mark_no_new_posts(&self) -> MirrorResult<()>;
}
