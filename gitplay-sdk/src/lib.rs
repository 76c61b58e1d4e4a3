//! # gitplay-sdk
//!
//! A [`Backend`] that talks to a `gitplay-server` over HTTP.
//!
//! ## Example
//!
//! ```no_run
//! use gitplay_core::Session;
//! use gitplay_sdk::HttpBackend;
//! use std::sync::Arc;
//!
//! # async fn run() -> gitplay_core::Result<()> {
//! let backend = HttpBackend::new("http://localhost:3030");
//! let session = Session::with_defaults(Arc::new(backend));
//!
//! let commits = session.open_repository("demo").await?;
//! println!("{} commits", commits);
//! session.play();
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use gitplay_core::{Backend, CommitDetails, CommitId, CommitListing, Error, Result, SizeSeries};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OpenRequest<'a> {
    path: &'a str,
}

#[derive(Serialize)]
struct SizesRequest<'a> {
    folders: &'a [String],
    start_index: usize,
    count: usize,
}

/// Maps a transport failure onto the session's error type.
fn transport_error(err: reqwest::Error) -> Error {
    Error::Backend(err.to_string())
}

impl HttpBackend {
    /// Create a new backend
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the gitplay server (e.g., "http://localhost:3030")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    /// Sends a request and turns non-success statuses into errors. The server
    /// answers 400 for invalid paths and 404 for unknown ids.
    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        debug!("Request failed with {}: {}", status, message);
        Err(match status {
            StatusCode::BAD_REQUEST => Error::PathInvalid(message),
            StatusCode::NOT_FOUND => Error::NotFound(message),
            _ => Error::Backend(format!("{}: {}", status, message)),
        })
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(transport_error)
    }

    /// Check server health
    pub async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(transport_error)?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn open(&self, path: &str) -> Result<()> {
        self.send(self.client.post(self.url("/repository/open")).json(&OpenRequest { path }))
            .await?;
        Ok(())
    }

    async fn prepare_cache(&self) -> Result<CommitListing> {
        self.json(self.client.post(self.url("/repository/prepare-cache")))
            .await
    }

    async fn get_commits(
        &self,
        start_index: usize,
        count: usize,
    ) -> Result<HashMap<CommitId, String>> {
        self.json(
            self.client
                .get(self.url("/commits"))
                .query(&[("start_index", start_index), ("count", count)]),
        )
        .await
    }

    async fn get_commit_details(&self, commit_id: &str) -> Result<CommitDetails> {
        self.json(self.client.get(self.url(&format!("/commits/{}", commit_id))))
            .await
    }

    async fn read_file_contents(&self, object_id: &str) -> Result<Vec<String>> {
        self.json(self.client.get(self.url(&format!("/objects/{}", object_id))))
            .await
    }

    async fn get_sizes_for_paths(
        &self,
        folders: &[String],
        start_index: usize,
        count: usize,
    ) -> Result<SizeSeries> {
        let request = SizesRequest {
            folders,
            start_index,
            count,
        };
        self.json(self.client.post(self.url("/sizes")).json(&request))
            .await
    }

    async fn get_files_ordered_by_most_modifications(
        &self,
        start_index: usize,
    ) -> Result<Vec<(String, usize)>> {
        self.json(
            self.client
                .get(self.url("/most-modified"))
                .query(&[("start_index", start_index)]),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_creation() {
        let backend = HttpBackend::new("http://localhost:3030/");
        assert_eq!(backend.base_url(), "http://localhost:3030");
        assert_eq!(backend.url("/health"), "http://localhost:3030/health");
    }
}
