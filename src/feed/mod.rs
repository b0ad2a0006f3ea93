mod fetch;
mod parse;

pub use fetch::{DEFAULT_FEED_URL, FeedBody, open_feed};
pub use parse::{Enclosure, Episode, FeedReader};
