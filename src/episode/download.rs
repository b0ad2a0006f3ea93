// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::DownloadError;
use crate::feed::Episode;
use crate::http::HttpClient;

use super::filename::{target_path, temp_path};

/// How a single download attempt ended, short of an unexpected error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// A file of the advertised size was already present
    Skipped,
    /// The file was fetched and moved into place
    Downloaded { bytes: u64 },
    /// The server answered with something other than 200
    Rejected { status: u16 },
    /// The body length differed from the advertised length
    SizeMismatch { expected: u64, actual: u64 },
}

/// Removes the in-flight file when dropped, including on cancellation
struct TempFileGuard {
    path: PathBuf,
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed temporary file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove temporary file"),
        }
    }
}

async fn remove_if_present(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "Failed to remove file");
    }
}

/// Make sure an episode exists in `data_dir` with its advertised size.
///
/// An existing file of the right size is left alone; one of the wrong size is
/// deleted and fetched again. The body is streamed into a hidden sibling and
/// renamed over the final name only when the byte count matches, so a file
/// under its final name is always complete.
///
/// Non-200 responses and short or long bodies are reported as outcomes and
/// leave no file behind; calling again later retries from scratch.
pub async fn download_episode<C: HttpClient>(
    client: &C,
    episode: &Episode,
    data_dir: &Path,
) -> Result<DownloadOutcome, DownloadError> {
    let target = target_path(data_dir, episode);
    let expected = episode.enclosure.length;
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match tokio::fs::metadata(&target).await {
        Ok(existing) if existing.len() == expected => {
            info!(file = %name, "Skipping, already downloaded");
            return Ok(DownloadOutcome::Skipped);
        }
        Ok(existing) => {
            warn!(
                file = %name,
                expected,
                actual = existing.len(),
                "Deleting and retrying, incorrect file size"
            );
            remove_if_present(&target).await;
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(DownloadError::MetadataFailed {
                path: target,
                source: e,
            });
        }
    }

    let url = episode.enclosure.url.as_str();
    info!(url, file = %name, "Downloading");

    let response = client
        .get_stream(url)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status != 200 {
        warn!(url, status = response.status, "Enclosure request was not successful");
        return Ok(DownloadOutcome::Rejected {
            status: response.status,
        });
    }

    let partial = temp_path(&target);
    remove_if_present(&partial).await;

    // Declared before the file so the handle is closed before removal. The
    // file is created without an await so a cancelled task can never create
    // it after the guard has already run.
    let _guard = TempFileGuard {
        path: partial.clone(),
    };
    let mut file = std::fs::File::create(&partial)
        .map(File::from_std)
        .map_err(|e| DownloadError::FileCreateFailed {
            path: partial.clone(),
            source: e,
        })?;

    let mut written: u64 = 0;
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: partial.clone(),
                source: e,
            })?;

        written += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: partial.clone(),
            source: e,
        })?;
    drop(file);

    if written != expected {
        warn!(
            file = %name,
            expected,
            actual = written,
            "Discarding download, incorrect file size"
        );
        remove_if_present(&target).await;
        return Ok(DownloadOutcome::SizeMismatch {
            expected,
            actual: written,
        });
    }

    tokio::fs::rename(&partial, &target)
        .await
        .map_err(|e| DownloadError::RenameFailed {
            from: partial.clone(),
            to: target.clone(),
            source: e,
        })?;

    info!(file = %name, bytes = written, "Download complete");

    Ok(DownloadOutcome::Downloaded { bytes: written })
}
