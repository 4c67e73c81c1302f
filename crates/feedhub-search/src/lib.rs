//! feedhub-search
//!
//! The unified feed (stored documents plus source records) and search over
//! it through an external ranking process.
pub mod feed;
pub mod ranker;
pub mod search;

pub use feed::{Feed, FeedOptions, FeedService, FeedStats};
pub use ranker::SubprocessRanker;
pub use search::{SearchOptions, SearchResponse, SearchService};
