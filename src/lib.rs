pub mod episode;
pub mod error;
pub mod feed;
pub mod http;
pub mod sync;

// Re-export main types for convenience
pub use episode::{DownloadOutcome, download_episode, slugify, target_filename};
pub use error::{DownloadError, FeedError, ItemDefect, SyncError};
pub use feed::{DEFAULT_FEED_URL, Enclosure, Episode, FeedReader, open_feed};
pub use http::{Credentials, HttpClient, HttpResponse, ReqwestClient};
pub use sync::{RunOptions, RunSummary, run};
