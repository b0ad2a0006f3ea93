// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio_util::io::StreamReader;
use tracing::info;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::parse::FeedReader;

/// Feed endpoint of the RubyTapas subscriber account
pub const DEFAULT_FEED_URL: &str = "https://rubytapas.dpdcart.com/feed";

type IoByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send>>;

/// Response body of the feed, readable as buffered async I/O
pub type FeedBody = StreamReader<IoByteStream, Bytes>;

/// Request the feed and return a reader over its body.
///
/// Only the response head is awaited here; the body is consumed lazily as
/// episodes are pulled from the returned reader.
pub async fn open_feed<C: HttpClient>(
    client: &C,
    url: &str,
) -> Result<FeedReader<FeedBody>, FeedError> {
    let response = client
        .get_stream(url)
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status != 200 {
        return Err(FeedError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    info!(url, content_length = ?response.content_length, "Fetched feed");

    let body: IoByteStream = Box::pin(
        response
            .body
            .map(|chunk| chunk.map_err(io::Error::other)),
    );

    Ok(FeedReader::new(StreamReader::new(body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ByteStream, HttpResponse};
    use async_trait::async_trait;

    struct StaticFeed {
        status: u16,
        chunks: Vec<&'static str>,
    }

    #[async_trait]
    impl HttpClient for StaticFeed {
        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            let chunks: Vec<Result<Bytes, reqwest::Error>> = self
                .chunks
                .iter()
                .map(|c| Ok(Bytes::from_static(c.as_bytes())))
                .collect();
            let body: ByteStream = Box::pin(futures::stream::iter(chunks));

            Ok(HttpResponse {
                status: self.status,
                content_length: None,
                body,
            })
        }
    }

    #[tokio::test]
    async fn reads_items_split_across_chunks() {
        let client = StaticFeed {
            status: 200,
            chunks: vec![
                "<rss><channel><item><tit",
                "le>Split</title><enclosure url=\"https://example.com/s",
                "plit.mp3\" length=\"7\"/></item></channel></rss>",
            ],
        };

        let mut reader = open_feed(&client, DEFAULT_FEED_URL).await.unwrap();
        let episode = reader.next_episode().await.unwrap().unwrap();

        assert_eq!(episode.title, "Split");
        assert_eq!(episode.enclosure.length, 7);
        assert!(reader.next_episode().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_non_200_status() {
        let client = StaticFeed {
            status: 401,
            chunks: vec!["Unauthorized"],
        };

        let result = open_feed(&client, DEFAULT_FEED_URL).await;

        match result {
            Err(FeedError::HttpStatus { status, url }) => {
                assert_eq!(status, 401);
                assert_eq!(url, DEFAULT_FEED_URL);
            }
            _ => panic!("Expected HttpStatus error"),
        }
    }
}
