use crate::error::Result;
use crate::models::{CommitDetails, CommitId, CommitListing, SizeSeries};
use async_trait::async_trait;
use std::collections::HashMap;

/// Request/response commands the session engine issues against a repository.
///
/// Implementations own everything about the repository itself: walking the
/// history, reading objects and computing sizes. The session only caches and
/// sequences their answers.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Selects the repository at `path`. Fails with `Error::PathInvalid` when
    /// there is no repository there.
    async fn open(&self, path: &str) -> Result<()>;

    /// Walks the opened repository and returns every commit id in order.
    async fn prepare_cache(&self) -> Result<CommitListing>;

    /// Messages of the commits in `[start_index, start_index + count)`,
    /// clamped to the history length.
    async fn get_commits(
        &self,
        start_index: usize,
        count: usize,
    ) -> Result<HashMap<CommitId, String>>;

    async fn get_commit_details(&self, commit_id: &str) -> Result<CommitDetails>;

    async fn read_file_contents(&self, object_id: &str) -> Result<Vec<String>>;

    async fn get_sizes_for_paths(
        &self,
        folders: &[String],
        start_index: usize,
        count: usize,
    ) -> Result<SizeSeries>;

    async fn get_files_ordered_by_most_modifications(
        &self,
        start_index: usize,
    ) -> Result<Vec<(String, usize)>>;
}
