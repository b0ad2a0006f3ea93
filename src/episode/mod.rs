mod download;
mod filename;

pub use download::{DownloadOutcome, download_episode};
pub use filename::{
    FILE_PREFIX, enclosure_extension, slugify, target_filename, target_path, temp_path,
};
