// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

/// A streaming response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// HTTP response with status, content length, and body stream
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Length header value, if present
    pub content_length: Option<u64>,
    /// Response body as a stream of bytes
    pub body: ByteStream,
}

/// HTTP Basic credentials for the feed account
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Keeps the password out of logs and panic messages.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// HTTP client abstraction for testability
///
/// Both the feed and every enclosure are fetched through `get_stream`, so an
/// implementation is expected to attach its credentials to each request.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue a GET and return the response with its body as a stream
    async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error>;
}

/// Default HTTP client implementation using reqwest with HTTP Basic auth
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    credentials: Credentials,
}

impl ReqwestClient {
    /// Create a new ReqwestClient with default settings
    pub fn new(credentials: Credentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
        }
    }

    /// Create a new ReqwestClient with a custom reqwest::Client
    pub fn with_client(client: reqwest::Client, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await?;
        let status = response.status().as_u16();
        let content_length = response.content_length();

        let body: ByteStream = Box::pin(response.bytes_stream());

        Ok(HttpResponse {
            status,
            content_length,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reqwest_client_can_be_created() {
        let credentials = Credentials::new("user", "secret");
        let _client = ReqwestClient::new(credentials.clone());
        let _custom = ReqwestClient::with_client(reqwest::Client::new(), credentials);
    }

    #[test]
    fn reqwest_client_can_be_cloned() {
        let client = ReqwestClient::new(Credentials::new("user", "secret"));
        let _cloned = client.clone();
    }

    #[test]
    fn credentials_debug_hides_password() {
        let credentials = Credentials::new("user", "hunter2");
        let rendered = format!("{credentials:?}");

        assert!(rendered.contains("user"));
        assert!(!rendered.contains("hunter2"));
    }
}
