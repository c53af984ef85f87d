mod auth;
mod feed;
mod gateway;

pub use auth::{AuthClient, Session};
pub use feed::{ChangeFeed, FeedMessage, Subscription};
pub use gateway::BookmarkGateway;
