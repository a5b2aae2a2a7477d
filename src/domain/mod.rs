pub mod article;
pub mod dates;
pub mod post;
pub mod slug;

pub use article::{RawArticle, RawUser};
pub use post::Post;
