// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span};

use crate::episode::{DownloadOutcome, download_episode};
use crate::error::SyncError;
use crate::feed::{DEFAULT_FEED_URL, Episode, open_feed};
use crate::http::HttpClient;

/// Options for a single pass over the feed
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Feed endpoint, fetched with the client's credentials
    pub feed_url: String,
    /// Directory all episodes are written to
    pub data_dir: PathBuf,
    /// Number of concurrent download workers
    pub concurrency: usize,
    /// Log and count unexpected download errors instead of aborting the run
    pub continue_on_error: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            data_dir: PathBuf::from("."),
            concurrency: 4,
            continue_on_error: false,
        }
    }
}

/// Tally of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Episodes handed to workers
    pub episodes: usize,
    /// Episodes fetched and moved into place
    pub downloaded: usize,
    /// Episodes already present with the right size
    pub skipped: usize,
    /// Enclosures answered with a non-200 status
    pub rejected: usize,
    /// Downloads discarded because of a length mismatch
    pub mismatched: usize,
    /// Downloads that hit an unexpected error (only with `continue_on_error`)
    pub failed: usize,
    /// Feed items that could not be read as episodes
    pub malformed: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: DownloadOutcome) {
        match outcome {
            DownloadOutcome::Skipped => self.skipped += 1,
            DownloadOutcome::Downloaded { .. } => self.downloaded += 1,
            DownloadOutcome::Rejected { .. } => self.rejected += 1,
            DownloadOutcome::SizeMismatch { .. } => self.mismatched += 1,
        }
    }

    fn merge(&mut self, other: &RunSummary) {
        self.episodes += other.episodes;
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
        self.rejected += other.rejected;
        self.mismatched += other.mismatched;
        self.failed += other.failed;
        self.malformed += other.malformed;
    }

    /// Episodes a worker finished with, whatever the result
    pub fn attempted(&self) -> usize {
        self.downloaded + self.skipped + self.rejected + self.mismatched + self.failed
    }
}

type EpisodeQueue = Arc<Mutex<UnboundedReceiver<Episode>>>;

/// Stream the feed into the queue; dropping the sender closes it.
async fn produce<C: HttpClient>(
    client: C,
    feed_url: String,
    queue: UnboundedSender<Episode>,
) -> Result<RunSummary, SyncError> {
    let mut reader = open_feed(&client, &feed_url).await?;
    let mut episodes = 0;

    while let Some(episode) = reader.next_episode().await? {
        if queue.send(episode).is_err() {
            break;
        }
        episodes += 1;
    }

    info!(episodes, malformed = reader.skipped(), "Finished reading feed");

    Ok(RunSummary {
        episodes,
        malformed: reader.skipped(),
        ..Default::default()
    })
}

/// Pull episodes until the queue is closed and empty
async fn work<C: HttpClient>(
    client: C,
    queue: EpisodeQueue,
    data_dir: PathBuf,
    continue_on_error: bool,
) -> Result<RunSummary, SyncError> {
    let mut tally = RunSummary::default();

    loop {
        let next = queue.lock().await.recv().await;
        let Some(episode) = next else {
            break;
        };

        match download_episode(&client, &episode, &data_dir).await {
            Ok(outcome) => tally.record(outcome),
            Err(e) if continue_on_error => {
                error!(title = %episode.title, error = %e, "Download failed");
                tally.failed += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    debug!(attempted = tally.attempted(), "Queue drained");
    Ok(tally)
}

/// Run one full pass: read the feed and make every episode present on disk.
///
/// The feed is read by one task while `concurrency` workers drain the
/// episodes it emits. Returns once the feed is exhausted and every worker has
/// finished. Any feed error, and any unexpected download error unless
/// `continue_on_error` is set, cancels all remaining work and is returned.
pub async fn run<C: HttpClient + Clone + 'static>(
    client: &C,
    options: &RunOptions,
) -> Result<RunSummary, SyncError> {
    if options.concurrency == 0 {
        return Err(SyncError::NoWorkers);
    }

    tokio::fs::create_dir_all(&options.data_dir)
        .await
        .map_err(|e| SyncError::CreateDirectoryFailed {
            path: options.data_dir.clone(),
            source: e,
        })?;

    let (queue_tx, queue_rx) = mpsc::unbounded_channel();
    let queue_rx: EpisodeQueue = Arc::new(Mutex::new(queue_rx));

    let mut tasks = JoinSet::new();

    tasks.spawn(
        produce(client.clone(), options.feed_url.clone(), queue_tx).instrument(info_span!("feed")),
    );

    for worker_id in 1..=options.concurrency {
        tasks.spawn(
            work(
                client.clone(),
                queue_rx.clone(),
                options.data_dir.clone(),
                options.continue_on_error,
            )
            .instrument(info_span!("worker", id = worker_id)),
        );
    }

    let mut summary = RunSummary::default();

    while let Some(joined) = tasks.join_next().await {
        let failure = match joined {
            Ok(Ok(report)) => {
                summary.merge(&report);
                continue;
            }
            Ok(Err(e)) => e,
            Err(e) => SyncError::TaskFailed(e),
        };

        error!(error = %failure, "Aborting run");
        // Waits for cancelled workers so their temporary files are gone.
        tasks.shutdown().await;
        return Err(failure);
    }

    info!(
        episodes = summary.episodes,
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        rejected = summary.rejected,
        mismatched = summary.mismatched,
        failed = summary.failed,
        malformed = summary.malformed,
        "Processing and downloading complete"
    );

    Ok(summary)
}
