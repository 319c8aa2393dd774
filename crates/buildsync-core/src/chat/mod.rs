//! Project chat domain module.
//!
//! - `model`: chat message rows and row identity
//! - `feed`: live change-feed payloads and subscriptions
//! - `cache`: per-project message cache merged from the feed

pub mod cache;
pub mod feed;
pub mod model;

pub use cache::{ApplyOutcome, CacheStatus, ChatCache, ChatCacheStore};
pub use feed::{ChangeEvent, FeedEventType, FeedFilter, FeedPayload, FeedSubscription};
pub use model::{ChatMessage, Identified, NewChatMessage};
