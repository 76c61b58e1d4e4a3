use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type CommitId = String;
pub type ObjectId = String;

/// `path -> (commit id -> size)` as returned by the size-series request.
pub type SizeSeries = HashMap<String, HashMap<CommitId, u64>>;

/// A commit in the ordered sequence, created when its batch is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub id: CommitId,
    pub message: String,
    pub position: usize,
}

/// Response of `prepare_cache`: every commit id in playback order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitListing {
    pub commits_count: usize,
    pub ordered_id_list: Vec<CommitId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDetails {
    pub id: CommitId,
    pub message: String,
    pub time: DateTime<Utc>,
    pub parent_ids: Vec<CommitId>,
    pub file_tree: Option<FileTree>,
}

impl CommitDetails {
    pub fn new(id: impl Into<String>, message: impl Into<String>, seconds: i64) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            time: Utc.timestamp_opt(seconds, 0).single().unwrap_or_default(),
            parent_ids: Vec::new(),
            file_tree: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_ids.push(parent.into());
        self
    }

    pub fn with_file_tree(mut self, file_tree: FileTree) -> Self {
        self.file_tree = Some(file_tree);
        self
    }
}

/// Flat listing of every file and directory in a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTree {
    pub root_id: ObjectId,
    pub blobs: Vec<Blob>,
}

impl FileTree {
    /// Entries whose parent path is exactly `parent` (`""` for the root).
    pub fn children<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a Blob> + 'a {
        self.blobs.iter().filter(move |blob| blob.path == parent)
    }

    pub fn find(&self, full_path: &str) -> Option<&Blob> {
        self.blobs.iter().find(|blob| blob.full_path() == full_path)
    }

    pub fn has_directory(&self, parent: &str, name: &str) -> bool {
        self.children(parent)
            .any(|blob| blob.is_directory && blob.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub object_id: ObjectId,
    /// Parent path: `""` at the root, otherwise segments each followed by `/`.
    pub path: String,
    pub name: String,
    pub is_directory: bool,
    pub size: Option<u64>,
}

impl Blob {
    pub fn file(
        object_id: impl Into<String>,
        path: impl Into<String>,
        name: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            path: path.into(),
            name: name.into(),
            is_directory: false,
            size: Some(size),
        }
    }

    pub fn directory(
        object_id: impl Into<String>,
        path: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            path: path.into(),
            name: name.into(),
            is_directory: true,
            size: None,
        }
    }

    pub fn full_path(&self) -> String {
        format!("{}{}", self.path, self.name)
    }
}

/// A commit message, or the sentinel shown while its batch is on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageState {
    Loaded(String),
    Loading,
}

impl MessageState {
    pub fn as_str(&self) -> &str {
        match self {
            MessageState::Loaded(message) => message,
            MessageState::Loading => "loading...",
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, MessageState::Loading)
    }
}

/// One entry of the most-modified ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedFile {
    pub path: String,
    pub modifications: usize,
}

impl RankedFile {
    pub fn directory(&self) -> &str {
        split_parent(&self.path).0
    }

    pub fn name(&self) -> &str {
        split_parent(&self.path).1
    }
}

impl From<(String, usize)> for RankedFile {
    fn from((path, modifications): (String, usize)) -> Self {
        Self {
            path,
            modifications,
        }
    }
}

/// Splits `a/b/c.rs` into (`a/b/`, `c.rs`).
pub fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(pos) => path.split_at(pos + 1),
        None => ("", path),
    }
}

/// Segments of a folder path, ignoring empty and `.` segments.
pub fn path_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .map(str::to_string)
        .collect()
}

/// Joins segments into the parent-path form used by [`Blob::path`].
pub fn join_segments(segments: &[String]) -> String {
    segments.iter().map(|segment| format!("{}/", segment)).collect()
}

/// Normalizes a folder path into the parent-path form (`src/core/`, root `""`).
pub fn normalize_folder(path: &str) -> String {
    join_segments(&path_segments(path))
}
