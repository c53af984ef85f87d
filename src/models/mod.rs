mod bookmark;

pub use bookmark::{Bookmark, FeedStatus, PROVISIONAL_PREFIX};
