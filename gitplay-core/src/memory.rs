//! A [`Backend`] over a history held in memory.
//!
//! Histories are written as a list of commits, each carrying the files it
//! writes or removes; they can be built in code or loaded from JSON. Object
//! and commit ids are content-addressed digests, so identical contents share
//! one id across paths and commits. The backend records every call it serves
//! and can be told to fail or delay calls, which is what the session tests
//! lean on.

use crate::backend::Backend;
use crate::config::DEFAULT_BATCH_SIZE;
use crate::error::{Error, Result};
use crate::models::{
    split_parent, Blob, CommitDetails, CommitId, CommitListing, FileTree, ObjectId, SizeSeries,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Number of files kept in the most-modified ranking.
const RANKING_LIMIT: usize = 16;
const BASE_TIME: i64 = 1_600_000_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    pub commits: Vec<HistoryCommit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryCommit {
    pub message: String,
    /// Seconds since the epoch; defaults to one minute per commit.
    #[serde(default)]
    pub time: Option<i64>,
    /// Files written by this commit: path -> full contents.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    #[serde(default)]
    pub removed: Vec<String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::PathInvalid(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&source)
    }

    pub fn commit<'a>(
        mut self,
        message: &str,
        files: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        self.commits.push(HistoryCommit {
            message: message.to_string(),
            time: None,
            files: files
                .into_iter()
                .map(|(path, contents)| (path.to_string(), contents.to_string()))
                .collect(),
            removed: Vec::new(),
        });
        self
    }

    pub fn commit_removing<'a>(
        mut self,
        message: &str,
        paths: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        self.commits.push(HistoryCommit {
            message: message.to_string(),
            time: None,
            files: BTreeMap::new(),
            removed: paths.into_iter().map(str::to_string).collect(),
        });
        self
    }

    /// `count` commits, commit `i` rewriting `src/file{i % 5}.rs` with `i + 1`
    /// lines so every commit changes one file's size.
    pub fn synthetic(count: usize) -> Self {
        let mut history = History::new().commit("Initial commit", [("README.md", "# synthetic\n")]);
        for i in 1..count {
            let path = format!("src/file{}.rs", i % 5);
            let contents: String = (0..=i).map(|line| format!("// line {}\n", line)).collect();
            history = history.commit(
                &format!("Change {}", i),
                [(path.as_str(), contents.as_str())],
            );
        }
        history
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

/// Content-addressed id of a file's contents.
pub fn content_id(contents: &str) -> ObjectId {
    digest(&format!("blob {}\0{}", contents.len(), contents))
}

fn digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(40);
    id
}

#[derive(Debug, Clone)]
struct Snapshot {
    id: CommitId,
    message: String,
    time: i64,
    parent: Option<CommitId>,
    /// path -> (object id, size in bytes)
    files: BTreeMap<String, (ObjectId, u64)>,
}

impl Snapshot {
    fn file_tree(&self) -> FileTree {
        let mut directories: BTreeSet<String> = BTreeSet::new();
        for path in self.files.keys() {
            let mut parent = split_parent(path).0;
            while !parent.is_empty() {
                directories.insert(parent.to_string());
                parent = split_parent(parent.trim_end_matches('/')).0;
            }
        }

        let mut blobs: Vec<Blob> = directories
            .iter()
            .map(|directory| {
                let (parent, name) = split_parent(directory.trim_end_matches('/'));
                Blob::directory(self.directory_id(directory), parent, name)
            })
            .collect();
        blobs.extend(self.files.iter().map(|(path, (object_id, size))| {
            let (parent, name) = split_parent(path);
            Blob::file(object_id.clone(), parent, name, *size)
        }));

        FileTree {
            root_id: self.directory_id(""),
            blobs,
        }
    }

    fn directory_id(&self, prefix: &str) -> ObjectId {
        let listing: String = self
            .files
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(path, (object_id, _))| format!("{} {}\n", object_id, &path[prefix.len()..]))
            .collect();
        digest(&format!("tree\0{}", listing))
    }
}

#[derive(Debug, Default)]
struct Materialized {
    commits: Vec<Snapshot>,
    positions: HashMap<CommitId, usize>,
    objects: HashMap<ObjectId, String>,
}

impl Materialized {
    fn build(history: &History) -> Self {
        let mut out = Materialized::default();
        let mut files: BTreeMap<String, (ObjectId, u64)> = BTreeMap::new();
        let mut parent: Option<CommitId> = None;

        for (position, commit) in history.commits.iter().enumerate() {
            for path in &commit.removed {
                files.remove(path);
            }
            for (path, contents) in &commit.files {
                let object_id = content_id(contents);
                out.objects.insert(object_id.clone(), contents.clone());
                files.insert(path.clone(), (object_id, contents.len() as u64));
            }

            let tree: String = files
                .iter()
                .map(|(path, (object_id, _))| format!("{} {}\n", object_id, path))
                .collect();
            let id = digest(&format!(
                "commit\0{}\0{}\0{}\0{}",
                parent.as_deref().unwrap_or(""),
                position,
                commit.message,
                tree
            ));

            out.positions.insert(id.clone(), position);
            out.commits.push(Snapshot {
                id: id.clone(),
                message: commit.message.clone(),
                time: commit.time.unwrap_or(BASE_TIME + position as i64 * 60),
                parent: parent.replace(id),
                files: files.clone(),
            });
        }
        out
    }

    fn range(&self, start_index: usize, count: usize) -> &[Snapshot] {
        let start = start_index.min(self.commits.len());
        let end = start_index.saturating_add(count).min(self.commits.len());
        &self.commits[start..end]
    }

    fn snapshot(&self, commit_id: &str) -> Result<&Snapshot> {
        self.positions
            .get(commit_id)
            .map(|&position| &self.commits[position])
            .ok_or_else(|| Error::NotFound(format!("commit {}", commit_id)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(String),
    PrepareCache,
    GetCommits {
        start_index: usize,
        count: usize,
    },
    GetCommitDetails(CommitId),
    ReadFileContents(ObjectId),
    GetSizesForPaths {
        folders: Vec<String>,
        start_index: usize,
        count: usize,
    },
    GetFilesOrderedByMostModifications {
        start_index: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Open,
    PrepareCache,
    GetCommits,
    GetCommitDetails,
    ReadFileContents,
    GetSizesForPaths,
    GetFilesOrderedByMostModifications,
}

impl Call {
    pub fn kind(&self) -> CallKind {
        match self {
            Call::Open(_) => CallKind::Open,
            Call::PrepareCache => CallKind::PrepareCache,
            Call::GetCommits { .. } => CallKind::GetCommits,
            Call::GetCommitDetails(_) => CallKind::GetCommitDetails,
            Call::ReadFileContents(_) => CallKind::ReadFileContents,
            Call::GetSizesForPaths { .. } => CallKind::GetSizesForPaths,
            Call::GetFilesOrderedByMostModifications { .. } => {
                CallKind::GetFilesOrderedByMostModifications
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    repositories: HashMap<String, Arc<Materialized>>,
    opened: Mutex<Option<Arc<Materialized>>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<CallKind, usize>>,
    latency: Mutex<Option<Duration>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `history` as the repository at `path`.
    pub fn with_repository(mut self, path: &str, history: &History) -> Self {
        self.repositories
            .insert(path.to_string(), Arc::new(Materialized::build(history)));
        self
    }

    /// Delays every call by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = Some(latency);
        self
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Makes the next `times` calls of `kind` fail.
    pub fn fail_next(&self, kind: CallKind, times: usize) {
        self.failures.lock().insert(kind, times);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.kind() == kind)
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Ordered commit ids of the repository registered at `path`.
    pub fn commit_ids(&self, path: &str) -> Vec<CommitId> {
        self.repositories
            .get(path)
            .map(|repo| repo.commits.iter().map(|c| c.id.clone()).collect())
            .unwrap_or_default()
    }

    async fn serve(&self, call: Call) -> Result<Arc<Materialized>> {
        let kind = call.kind();
        debug!("Memory backend call: {:?}", call);
        self.calls.lock().push(call);

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        {
            let mut failures = self.failures.lock();
            if let Some(remaining) = failures.get_mut(&kind) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(Error::Backend(format!("injected {:?} failure", kind)));
                }
            }
        }

        if kind == CallKind::Open {
            return Ok(Arc::default());
        }
        self.opened
            .lock()
            .clone()
            .ok_or_else(|| Error::Backend("no repository is open".into()))
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn open(&self, path: &str) -> Result<()> {
        self.serve(Call::Open(path.to_string())).await?;
        let repository = self
            .repositories
            .get(path)
            .cloned()
            .ok_or_else(|| Error::PathInvalid(format!("no repository at {}", path)))?;
        *self.opened.lock() = Some(repository);
        Ok(())
    }

    async fn prepare_cache(&self) -> Result<CommitListing> {
        let repo = self.serve(Call::PrepareCache).await?;
        Ok(CommitListing {
            commits_count: repo.commits.len(),
            ordered_id_list: repo.commits.iter().map(|c| c.id.clone()).collect(),
        })
    }

    async fn get_commits(
        &self,
        start_index: usize,
        count: usize,
    ) -> Result<HashMap<CommitId, String>> {
        let repo = self
            .serve(Call::GetCommits { start_index, count })
            .await?;
        Ok(repo
            .range(start_index, count)
            .iter()
            .map(|c| (c.id.clone(), c.message.clone()))
            .collect())
    }

    async fn get_commit_details(&self, commit_id: &str) -> Result<CommitDetails> {
        let repo = self
            .serve(Call::GetCommitDetails(commit_id.to_string()))
            .await?;
        let snapshot = repo.snapshot(commit_id)?;
        let mut details = CommitDetails::new(&snapshot.id, &snapshot.message, snapshot.time)
            .with_file_tree(snapshot.file_tree());
        if let Some(parent) = &snapshot.parent {
            details = details.with_parent(parent);
        }
        Ok(details)
    }

    async fn read_file_contents(&self, object_id: &str) -> Result<Vec<String>> {
        let repo = self
            .serve(Call::ReadFileContents(object_id.to_string()))
            .await?;
        repo.objects
            .get(object_id)
            .map(|contents| contents.lines().map(str::to_string).collect())
            .ok_or_else(|| Error::NotFound(format!("object {}", object_id)))
    }

    async fn get_sizes_for_paths(
        &self,
        folders: &[String],
        start_index: usize,
        count: usize,
    ) -> Result<SizeSeries> {
        let repo = self
            .serve(Call::GetSizesForPaths {
                folders: folders.to_vec(),
                start_index,
                count,
            })
            .await?;

        let mut output: SizeSeries = HashMap::new();
        let mut last_size: HashMap<&str, u64> = HashMap::new();
        for snapshot in repo.range(start_index, count) {
            for (path, (_, size)) in &snapshot.files {
                if !folders.iter().any(|folder| split_parent(path).0 == folder) {
                    continue;
                }
                if last_size.insert(path, *size) != Some(*size) {
                    output
                        .entry(path.clone())
                        .or_default()
                        .insert(snapshot.id.clone(), *size);
                }
            }
        }
        Ok(output)
    }

    async fn get_files_ordered_by_most_modifications(
        &self,
        start_index: usize,
    ) -> Result<Vec<(String, usize)>> {
        let repo = self
            .serve(Call::GetFilesOrderedByMostModifications { start_index })
            .await?;

        let mut modifications: HashMap<&str, usize> = HashMap::new();
        let mut last_size: HashMap<&str, u64> = HashMap::new();
        for snapshot in repo.range(start_index, DEFAULT_BATCH_SIZE) {
            for (path, (_, size)) in &snapshot.files {
                match last_size.insert(path, *size) {
                    None => {
                        modifications.insert(path, 1);
                    }
                    Some(previous) if previous != *size => {
                        *modifications.entry(path).or_insert(0) += 1;
                    }
                    Some(_) => {}
                }
            }
        }

        let mut ranked: Vec<(String, usize)> = modifications
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(path, count)| (path.to_string(), count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(RANKING_LIMIT);
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> History {
        History::new()
            .commit("Initial commit", [("README.md", "hello\n"), ("src/lib.rs", "pub fn a() {}\n")])
            .commit("Copy readme", [("docs/README.md", "hello\n")])
            .commit("Grow lib", [("src/lib.rs", "pub fn a() {}\npub fn b() {}\n")])
            .commit_removing("Drop docs", ["docs/README.md"])
    }

    async fn opened(history: &History) -> MemoryBackend {
        let backend = MemoryBackend::new().with_repository("repo", history);
        backend.open("repo").await.unwrap();
        backend
    }

    #[tokio::test]
    async fn test_open_unknown_path_is_invalid() {
        let backend = MemoryBackend::new().with_repository("repo", &sample());
        assert!(matches!(
            backend.open("elsewhere").await,
            Err(Error::PathInvalid(_))
        ));
        assert!(backend.prepare_cache().await.is_err());
    }

    #[tokio::test]
    async fn test_prepare_cache_and_commit_range() {
        let backend = opened(&sample()).await;
        let listing = backend.prepare_cache().await.unwrap();
        assert_eq!(listing.commits_count, 4);
        assert!(listing.ordered_id_list.iter().all(|id| id.len() == 40));

        let commits = backend.get_commits(2, 100).await.unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[&listing.ordered_id_list[2]], "Grow lib");
        assert!(backend.get_commits(10, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_identical_contents_share_object_id() {
        let backend = opened(&sample()).await;
        let ids = backend.prepare_cache().await.unwrap().ordered_id_list;
        let details = backend.get_commit_details(&ids[1]).await.unwrap();
        let tree = details.file_tree.unwrap();

        let readme = tree.find("README.md").unwrap();
        let copy = tree.find("docs/README.md").unwrap();
        assert_eq!(readme.object_id, copy.object_id);
        assert_eq!(readme.object_id, content_id("hello\n"));
        assert!(tree.has_directory("", "docs"));
        assert_eq!(details.parent_ids, vec![ids[0].clone()]);

        let lines = backend.read_file_contents(&readme.object_id).await.unwrap();
        assert_eq!(lines, vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_nested_directories_are_listed() {
        let history = History::new().commit("deep", [("a/b/c.txt", "x")]);
        let backend = opened(&history).await;
        let ids = backend.prepare_cache().await.unwrap().ordered_id_list;
        let tree = backend.get_commit_details(&ids[0]).await.unwrap().file_tree.unwrap();

        assert!(tree.has_directory("", "a"));
        assert!(tree.has_directory("a/", "b"));
        assert_eq!(tree.find("a/b/c.txt").unwrap().size, Some(1));
    }

    #[tokio::test]
    async fn test_size_series_only_records_changes() {
        let backend = opened(&sample()).await;
        let ids = backend.prepare_cache().await.unwrap().ordered_id_list;
        let sizes = backend
            .get_sizes_for_paths(&["src/".to_string()], 0, 100)
            .await
            .unwrap();

        let lib = &sizes["src/lib.rs"];
        assert_eq!(lib.len(), 2);
        assert!(lib.contains_key(&ids[0]));
        assert!(lib.contains_key(&ids[2]));
        assert!(!sizes.contains_key("README.md"));
    }

    #[tokio::test]
    async fn test_most_modified_ranking() {
        let backend = opened(&History::synthetic(12)).await;
        let ranking = backend
            .get_files_ordered_by_most_modifications(0)
            .await
            .unwrap();

        assert!(ranking.iter().all(|(_, count)| *count > 1));
        assert!(!ranking.iter().any(|(path, _)| path == "README.md"));
        assert_eq!(ranking[0], ("src/file1.rs".to_string(), 3));
        assert!(ranking.windows(2).all(|pair| pair[0].1 >= pair[1].1));
    }

    #[tokio::test]
    async fn test_failure_injection_and_call_log() {
        let backend = opened(&sample()).await;
        backend.fail_next(CallKind::GetCommits, 1);
        assert!(backend.get_commits(0, 10).await.is_err());
        assert!(backend.get_commits(0, 10).await.is_ok());
        assert_eq!(backend.count(CallKind::GetCommits), 2);
        assert_eq!(
            backend.calls()[1],
            Call::GetCommits {
                start_index: 0,
                count: 10
            }
        );
    }

    #[test]
    fn test_history_from_json() {
        let history = History::from_json(
            r#"{"commits": [
                {"message": "init", "files": {"a.txt": "1"}},
                {"message": "rm", "time": 1700000000, "removed": ["a.txt"]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.commits[1].time, Some(1_700_000_000));
        assert!(History::from_json("{").is_err());
    }
}
