use crate::models::{normalize_folder, CommitId, RankedFile, SizeSeries};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Batch-aligned range of commits a change request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeWindow {
    pub batch_index: usize,
    pub start_index: usize,
    pub count: usize,
}

/// Size series of watched folders and the most-modified ranking, both
/// fetched one batch window at a time.
#[derive(Debug, Clone)]
pub struct ChangeTracker {
    batch_size: usize,
    folders: BTreeSet<String>,
    sizes: SizeSeries,
    fetched: HashSet<(usize, String)>,
    rankings: BTreeMap<usize, Vec<RankedFile>>,
}

impl ChangeTracker {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            folders: BTreeSet::new(),
            sizes: HashMap::new(),
            fetched: HashSet::new(),
            rankings: BTreeMap::new(),
        }
    }

    /// Adds a folder to the watch set. Returns false if it was already watched.
    pub fn track_folder(&mut self, path: &str) -> bool {
        self.folders.insert(normalize_folder(path))
    }

    pub fn tracked_folders(&self) -> impl Iterator<Item = &String> {
        self.folders.iter()
    }

    pub fn window_for(&self, from_index: usize) -> ChangeWindow {
        let batch_index = from_index / self.batch_size;
        ChangeWindow {
            batch_index,
            start_index: batch_index * self.batch_size,
            count: self.batch_size,
        }
    }

    /// Watched folders whose series for `batch_index` is not cached yet.
    pub fn missing_folders(&self, batch_index: usize) -> Vec<String> {
        self.folders
            .iter()
            .filter(|folder| !self.fetched.contains(&(batch_index, (*folder).clone())))
            .cloned()
            .collect()
    }

    pub fn merge_sizes(&mut self, batch_index: usize, folders: &[String], series: SizeSeries) {
        for folder in folders {
            self.fetched.insert((batch_index, folder.clone()));
        }
        for (path, by_commit) in series {
            self.sizes.entry(path).or_default().extend(by_commit);
        }
    }

    pub fn store_ranking(&mut self, batch_index: usize, ranking: Vec<(String, usize)>) {
        self.rankings
            .insert(batch_index, ranking.into_iter().map(RankedFile::from).collect());
    }

    pub fn has_ranking(&self, batch_index: usize) -> bool {
        self.rankings.contains_key(&batch_index)
    }

    pub fn ranking(&self, batch_index: usize) -> &[RankedFile] {
        self.rankings
            .get(&batch_index)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The ranking of a window grouped by parent directory, keeping rank order
    /// inside each group.
    pub fn ranking_by_directory(&self, batch_index: usize) -> BTreeMap<String, Vec<RankedFile>> {
        let mut grouped: BTreeMap<String, Vec<RankedFile>> = BTreeMap::new();
        for file in self.ranking(batch_index) {
            grouped
                .entry(file.directory().to_string())
                .or_default()
                .push(file.clone());
        }
        grouped
    }

    pub fn size_series(&self, path: &str) -> Option<&HashMap<CommitId, u64>> {
        self.sizes.get(path)
    }

    /// Whether the size of `path` changed at `commit_id`.
    pub fn changed_at(&self, path: &str, commit_id: &str) -> bool {
        self.sizes
            .get(path)
            .is_some_and(|by_commit| by_commit.contains_key(commit_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(entries: &[(&str, &str, u64)]) -> SizeSeries {
        let mut out: SizeSeries = HashMap::new();
        for (path, commit, size) in entries {
            out.entry(path.to_string())
                .or_default()
                .insert(commit.to_string(), *size);
        }
        out
    }

    #[test]
    fn test_track_folder_is_idempotent() {
        let mut tracker = ChangeTracker::new(100);
        assert!(tracker.track_folder("src"));
        assert!(!tracker.track_folder("/src/"));
        assert!(tracker.track_folder(""));
        let folders: Vec<&String> = tracker.tracked_folders().collect();
        assert_eq!(folders, vec!["", "src/"]);
    }

    #[test]
    fn test_window_is_batch_aligned() {
        let tracker = ChangeTracker::new(100);
        assert_eq!(
            tracker.window_for(175),
            ChangeWindow {
                batch_index: 1,
                start_index: 100,
                count: 100
            }
        );
    }

    #[test]
    fn test_missing_folders_per_window() {
        let mut tracker = ChangeTracker::new(100);
        tracker.track_folder("");
        tracker.track_folder("src");
        assert_eq!(tracker.missing_folders(0).len(), 2);

        tracker.merge_sizes(0, &["".to_string()], series(&[("README.md", "c1", 10)]));
        assert_eq!(tracker.missing_folders(0), vec!["src/".to_string()]);
        assert_eq!(tracker.missing_folders(1).len(), 2);
    }

    #[test]
    fn test_merge_extends_series() {
        let mut tracker = ChangeTracker::new(100);
        tracker.track_folder("src");
        tracker.merge_sizes(0, &["src/".into()], series(&[("src/lib.rs", "c1", 10)]));
        tracker.merge_sizes(1, &["src/".into()], series(&[("src/lib.rs", "c9", 14)]));

        let lib = tracker.size_series("src/lib.rs").unwrap();
        assert_eq!(lib.len(), 2);
        assert!(tracker.changed_at("src/lib.rs", "c9"));
        assert!(!tracker.changed_at("src/lib.rs", "c2"));
        assert!(!tracker.changed_at("src/main.rs", "c1"));
    }

    #[test]
    fn test_ranking_grouped_by_directory() {
        let mut tracker = ChangeTracker::new(100);
        assert!(tracker.ranking(0).is_empty());

        tracker.store_ranking(
            0,
            vec![
                ("src/lib.rs".into(), 9),
                ("README.md".into(), 5),
                ("src/main.rs".into(), 3),
            ],
        );
        assert!(tracker.has_ranking(0));

        let grouped = tracker.ranking_by_directory(0);
        assert_eq!(grouped.len(), 2);
        let src: Vec<&str> = grouped["src/"].iter().map(RankedFile::name).collect();
        assert_eq!(src, vec!["lib.rs", "main.rs"]);
        assert_eq!(grouped[""][0].modifications, 5);
    }
}
