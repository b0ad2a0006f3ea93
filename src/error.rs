// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when fetching or reading the feed.
///
/// Every variant is fatal for the current run.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Feed {url} returned HTTP status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to read feed XML: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Reasons a single `<item>` could not be turned into an episode.
///
/// These never abort a run; the item is skipped and counted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemDefect {
    #[error("item has no title")]
    MissingTitle,

    #[error("item '{title}' has no enclosure")]
    MissingEnclosure { title: String },

    #[error("enclosure of '{title}' has no url attribute")]
    MissingUrl { title: String },

    #[error("enclosure of '{title}' has an invalid url '{url}'")]
    InvalidUrl { title: String, url: String },

    #[error("enclosure of '{title}' has no length attribute")]
    MissingLength { title: String },

    #[error("enclosure of '{title}' has an invalid length '{length}'")]
    InvalidLength { title: String, length: String },

    #[error("item contains malformed markup: {reason}")]
    Malformed { reason: String },
}

/// Unexpected errors during an episode download.
///
/// Expected per-item failures (non-200 responses, size mismatches) are reported
/// through `DownloadOutcome` instead.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Failed to inspect existing file {path}: {source}")]
    MetadataFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {from} into place as {to}: {source}")]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level errors for a sync run
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    #[error("Failed to create data directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Concurrency must be at least 1")]
    NoWorkers,

    #[error("Sync task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}
