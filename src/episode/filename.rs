// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

use crate::feed::Episode;

/// Prefix shared by every downloaded file
pub const FILE_PREFIX: &str = "rubytapas-";

/// Check if a character survives slugging (applied after lowercasing)
fn is_slug_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, ' ' | '_' | '-')
}

/// Turn an arbitrary title into a filesystem and URL safe token.
///
/// Lowercases, drops everything outside `[a-z0-9 _-]`, then replaces each
/// run of whitespace with a single `-`. Distinct titles may map to the same
/// slug.
pub fn slugify(title: &str) -> String {
    let kept: String = title
        .to_lowercase()
        .chars()
        .filter(|&c| is_slug_char(c))
        .collect();

    let mut result = String::with_capacity(kept.len());
    let mut in_whitespace = false;

    for c in kept.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                result.push('-');
                in_whitespace = true;
            }
        } else {
            result.push(c);
            in_whitespace = false;
        }
    }

    result
}

/// Extension of the enclosure URL's last path segment, including the dot.
///
/// The segment is percent-decoded first. Empty when it has no dot.
pub fn enclosure_extension(episode: &Episode) -> String {
    let segment = episode
        .enclosure
        .url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    let decoded = percent_decode_str(segment).decode_utf8_lossy();

    // An encoded slash still separates path elements once decoded.
    let name = decoded.rsplit('/').next().unwrap_or("");
    name.rfind('.')
        .map_or_else(String::new, |pos| name[pos..].to_string())
}

/// Generate the final filename for an episode
pub fn target_filename(episode: &Episode) -> String {
    format!(
        "{}{}{}",
        FILE_PREFIX,
        slugify(&episode.title),
        enclosure_extension(episode)
    )
}

/// Full path of the file an episode is published under
pub fn target_path(data_dir: &Path, episode: &Episode) -> PathBuf {
    data_dir.join(target_filename(episode))
}

/// Hidden sibling used while the download is in flight
pub fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    target.with_file_name(format!(".{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Enclosure;
    use url::Url;

    fn make_episode(title: &str, url: &str) -> Episode {
        Episode {
            title: title.to_string(),
            enclosure: Enclosure {
                url: Url::parse(url).unwrap(),
                length: 0,
            },
        }
    }

    // === Slug tests ===

    #[test]
    fn slug_strips_punctuation_and_joins_words() {
        assert_eq!(slugify("Hello, World!  Foo"), "hello-world-foo");
    }

    #[test]
    fn slug_keeps_digits_underscores_and_dashes() {
        assert_eq!(slugify("042 snake_case-Names"), "042-snake_case-names");
    }

    #[test]
    fn slug_drops_non_ascii() {
        assert_eq!(slugify("Café Résumé"), "caf-rsum");
    }

    #[test]
    fn slug_drops_tabs_and_newlines_outright() {
        // Only plain spaces survive the filter, so these glue words together.
        assert_eq!(slugify("line1\nline2\ttab"), "line1line2tab");
    }

    #[test]
    fn slug_keeps_edge_spaces_as_dashes() {
        assert_eq!(slugify("  padded  "), "-padded-");
    }

    #[test]
    fn slug_of_empty_and_symbol_only_titles_is_empty() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!?.,"), "");
    }

    #[test]
    fn slug_is_idempotent() {
        let titles = [
            "Hello, World!  Foo",
            "  Leading and trailing  ",
            "Episode #123: Ruby 2.0 -- What's New?",
            "ÜBER  Ümlauts\tand\ttabs",
            "already-a-slug_ok",
        ];

        for title in titles {
            let once = slugify(title);
            assert_eq!(slugify(&once), once, "slug not idempotent for {title:?}");
        }
    }

    #[test]
    fn slug_collisions_are_possible() {
        assert_eq!(slugify("What's new?"), slugify("whats new"));
    }

    // === Filename tests ===

    #[test]
    fn target_filename_combines_prefix_slug_and_extension() {
        let episode = make_episode("Episode One", "https://example.com/files/ep1.mp3");
        assert_eq!(target_filename(&episode), "rubytapas-episode-one.mp3");
    }

    #[test]
    fn extension_ignores_query_string() {
        let episode = make_episode("Q", "https://example.com/ep.mp4?token=abc.def");
        assert_eq!(enclosure_extension(&episode), ".mp4");
    }

    #[test]
    fn extension_uses_only_last_segment() {
        let episode = make_episode("Q", "https://example.com/v1.2/download");
        assert_eq!(enclosure_extension(&episode), "");
        assert_eq!(target_filename(&episode), "rubytapas-q");
    }

    #[test]
    fn extension_is_read_from_decoded_path() {
        let episode = make_episode("Encoded", "https://example.com/files/ep1%2Em4v");
        assert_eq!(enclosure_extension(&episode), ".m4v");
        assert_eq!(target_filename(&episode), "rubytapas-encoded.m4v");
    }

    #[test]
    fn extension_stops_at_encoded_slash() {
        let episode = make_episode("Q", "https://example.com/v1.2%2Fdownload");
        assert_eq!(enclosure_extension(&episode), "");
    }

    #[test]
    fn extension_keeps_only_final_suffix() {
        let episode = make_episode("Q", "https://example.com/archive.tar.gz");
        assert_eq!(enclosure_extension(&episode), ".gz");
    }

    #[test]
    fn same_title_and_extension_give_same_path() {
        let dir = Path::new("/data");
        let a = make_episode("Same Title", "https://cdn-a.example.com/x/1.mp4");
        let b = make_episode("Same Title", "https://cdn-b.example.com/y/2.mp4");

        assert_eq!(target_path(dir, &a), target_path(dir, &b));
        assert_eq!(
            target_path(dir, &a),
            PathBuf::from("/data/rubytapas-same-title.mp4")
        );
    }

    // === Temp path tests ===

    #[test]
    fn temp_path_is_hidden_sibling() {
        let target = Path::new("/data/rubytapas-episode-one.mp3");
        assert_eq!(
            temp_path(target),
            PathBuf::from("/data/.rubytapas-episode-one.mp3")
        );
    }
}
