// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use tokio::io::AsyncBufRead;
use tracing::{debug, warn};
use url::Url;

use crate::error::{FeedError, ItemDefect};

/// A single episode announced by the feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    /// Decoded title text, untrimmed; filenames are derived from it as is
    pub title: String,
    pub enclosure: Enclosure,
}

/// The media file attached to an episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: Url,
    /// Advertised size in bytes
    pub length: u64,
}

/// Raw values collected from one `<item>` subtree before validation
#[derive(Debug, Default)]
struct ItemFields {
    title: Option<String>,
    has_enclosure: bool,
    url: Option<String>,
    length: Option<String>,
    malformed: Option<String>,
}

impl ItemFields {
    fn fail(&mut self, reason: impl Into<String>) {
        if self.malformed.is_none() {
            self.malformed = Some(reason.into());
        }
    }

    fn push_title_text(&mut self, text: &str) {
        self.title.get_or_insert_with(String::new).push_str(text);
    }

    fn record_enclosure(&mut self, element: &BytesStart<'_>) {
        // The first enclosure wins.
        if self.has_enclosure {
            return;
        }
        self.has_enclosure = true;

        match attribute(element, b"url") {
            Ok(value) => self.url = value,
            Err(reason) => self.fail(reason),
        }
        match attribute(element, b"length") {
            Ok(value) => self.length = value,
            Err(reason) => self.fail(reason),
        }
    }

    fn into_episode(self) -> Result<Episode, ItemDefect> {
        if let Some(reason) = self.malformed {
            return Err(ItemDefect::Malformed { reason });
        }

        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or(ItemDefect::MissingTitle)?;

        if !self.has_enclosure {
            return Err(ItemDefect::MissingEnclosure { title });
        }

        let raw_url = self
            .url
            .ok_or_else(|| ItemDefect::MissingUrl {
                title: title.clone(),
            })?;
        let url = Url::parse(raw_url.trim()).map_err(|_| ItemDefect::InvalidUrl {
            title: title.clone(),
            url: raw_url.clone(),
        })?;

        let raw_length = self.length.ok_or_else(|| ItemDefect::MissingLength {
            title: title.clone(),
        })?;
        let length = raw_length
            .trim()
            .parse::<u64>()
            .map_err(|_| ItemDefect::InvalidLength {
                title: title.clone(),
                length: raw_length.clone(),
            })?;

        Ok(Episode {
            title,
            enclosure: Enclosure { url, length },
        })
    }
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, String> {
    let Some(attr) = element.try_get_attribute(name).map_err(|e| e.to_string())? else {
        return Ok(None);
    };
    let value = attr.unescape_value().map_err(|e| e.to_string())?;
    Ok(Some(value.into_owned()))
}

/// Incremental reader that yields episodes as their `<item>` elements close.
///
/// The document is tokenized as it arrives; at most one item is held in
/// memory at a time. Items that cannot be turned into an `Episode` are
/// skipped, logged and counted in [`FeedReader::skipped`].
pub struct FeedReader<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    skipped: usize,
    finished: bool,
}

impl<R: AsyncBufRead + Unpin> FeedReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: Reader::from_reader(source),
            buf: Vec::new(),
            skipped: 0,
            finished: false,
        }
    }

    /// Number of malformed items skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Advance to the next well-formed episode.
    ///
    /// Returns `Ok(None)` once the document is exhausted. Tokenizer and
    /// transport failures are returned as errors.
    pub async fn next_episode(&mut self) -> Result<Option<Episode>, FeedError> {
        while !self.finished {
            let item = match self.reader.read_event_into_async(&mut self.buf).await? {
                Event::Start(e) if e.local_name().as_ref() == b"item" => Some(true),
                Event::Empty(e) if e.local_name().as_ref() == b"item" => Some(false),
                Event::Eof => {
                    self.finished = true;
                    None
                }
                _ => None,
            };
            self.buf.clear();

            let fields = match item {
                Some(true) => self.read_item().await?,
                // A self-closing <item/> carries nothing.
                Some(false) => ItemFields::default(),
                None => continue,
            };

            match fields.into_episode() {
                Ok(episode) => {
                    debug!(title = %episode.title, url = %episode.enclosure.url, "Parsed feed item");
                    return Ok(Some(episode));
                }
                Err(defect) => {
                    self.skipped += 1;
                    warn!(%defect, "Skipping malformed feed item");
                }
            }
        }

        Ok(None)
    }

    /// Collect the fields of an item whose start tag was just consumed
    async fn read_item(&mut self) -> Result<ItemFields, FeedError> {
        let mut fields = ItemFields::default();
        // Open elements, counting the <item> itself.
        let mut depth = 1usize;
        let mut in_title = false;

        loop {
            match self.reader.read_event_into_async(&mut self.buf).await? {
                Event::Start(e) => {
                    if depth == 1 {
                        match e.name().as_ref() {
                            b"title" if fields.title.is_none() => {
                                fields.title = Some(String::new());
                                in_title = true;
                            }
                            b"enclosure" => fields.record_enclosure(&e),
                            _ => {}
                        }
                    }
                    depth += 1;
                }
                Event::Empty(e) => {
                    if depth == 1 {
                        match e.name().as_ref() {
                            b"title" if fields.title.is_none() => fields.title = Some(String::new()),
                            b"enclosure" => fields.record_enclosure(&e),
                            _ => {}
                        }
                    }
                }
                Event::End(_) => {
                    depth -= 1;
                    if depth == 1 {
                        in_title = false;
                    }
                    if depth == 0 {
                        break;
                    }
                }
                Event::Text(e) if in_title && depth == 2 => match e.decode() {
                    Ok(text) => fields.push_title_text(&text),
                    Err(err) => fields.fail(err.to_string()),
                },
                Event::CData(e) if in_title && depth == 2 => match e.decode() {
                    Ok(text) => fields.push_title_text(&text),
                    Err(err) => fields.fail(err.to_string()),
                },
                Event::GeneralRef(e) if in_title && depth == 2 => match e.resolve_char_ref() {
                    Ok(Some(ch)) => fields.push_title_text(ch.encode_utf8(&mut [0; 4])),
                    Ok(None) => match e.decode() {
                        Ok(name) => match resolve_predefined_entity(&name) {
                            Some(resolved) => fields.push_title_text(resolved),
                            None => fields.push_title_text(&format!("&{name};")),
                        },
                        Err(err) => fields.fail(err.to_string()),
                    },
                    Err(err) => fields.fail(err.to_string()),
                },
                Event::Eof => {
                    self.finished = true;
                    fields.fail("document ended inside an item");
                    break;
                }
                _ => {}
            }
            self.buf.clear();
        }
        self.buf.clear();

        Ok(fields)
    }
}
