use crate::models::ObjectId;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchState {
    Fetching,
    Ready(Arc<Vec<String>>),
    Failed(String),
}

/// Cached content of one object, shared by every viewer showing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntry {
    pub state: FetchState,
    /// Open viewers reading this object.
    pub refs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The path already has a viewer; nothing changed.
    AlreadyOpen,
    /// A new viewer reads content that is cached or already being fetched.
    Shared,
    /// A new viewer was registered and the content must be fetched.
    Fetch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closed {
    pub file_path: String,
    pub object_id: ObjectId,
    /// The last viewer of the object closed and its content was dropped.
    pub evicted: bool,
}

/// Content-addressed file contents, reference counted by open viewers.
#[derive(Debug, Clone, Default)]
pub struct ContentCache {
    /// Open viewers in the order they were opened: file path -> object id.
    viewers: IndexMap<String, ObjectId>,
    entries: HashMap<ObjectId, ContentEntry>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, file_path: &str, object_id: &str) -> OpenOutcome {
        if self.viewers.contains_key(file_path) {
            return OpenOutcome::AlreadyOpen;
        }
        self.viewers
            .insert(file_path.to_string(), object_id.to_string());

        let mut needs_fetch = false;
        let entry = self
            .entries
            .entry(object_id.to_string())
            .or_insert_with(|| {
                needs_fetch = true;
                ContentEntry {
                    state: FetchState::Fetching,
                    refs: 0,
                }
            });
        entry.refs += 1;

        if let FetchState::Failed(_) = entry.state {
            entry.state = FetchState::Fetching;
            needs_fetch = true;
        }

        if needs_fetch {
            OpenOutcome::Fetch
        } else {
            OpenOutcome::Shared
        }
    }

    /// Marks an open object as fetching. False when no viewer holds it.
    pub fn begin_fetch(&mut self, object_id: &str) -> bool {
        match self.entries.get_mut(object_id) {
            Some(entry) => {
                entry.state = FetchState::Fetching;
                true
            }
            None => false,
        }
    }

    /// Stores a fetch outcome. Dropped when the object was evicted meanwhile.
    pub fn complete(&mut self, object_id: &str, outcome: Result<Vec<String>, String>) -> bool {
        let Some(entry) = self.entries.get_mut(object_id) else {
            return false;
        };
        entry.state = match outcome {
            Ok(lines) => FetchState::Ready(Arc::new(lines)),
            Err(message) => FetchState::Failed(message),
        };
        true
    }

    pub fn close_path(&mut self, file_path: &str) -> Option<Closed> {
        let object_id = self.viewers.shift_remove(file_path)?;
        let evicted = self.release(&object_id);
        Some(Closed {
            file_path: file_path.to_string(),
            object_id,
            evicted,
        })
    }

    /// Closes the most recently opened viewer of `object_id`.
    pub fn close_object(&mut self, object_id: &str) -> Option<Closed> {
        let file_path = self
            .viewers
            .iter()
            .rev()
            .find(|(_, id)| id.as_str() == object_id)
            .map(|(path, _)| path.clone())?;
        self.close_path(&file_path)
    }

    fn release(&mut self, object_id: &str) -> bool {
        let Some(entry) = self.entries.get_mut(object_id) else {
            return false;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 {
            self.entries.remove(object_id);
            true
        } else {
            false
        }
    }

    pub fn entry(&self, object_id: &str) -> Option<&ContentEntry> {
        self.entries.get(object_id)
    }

    pub fn lines(&self, object_id: &str) -> Option<Arc<Vec<String>>> {
        match &self.entries.get(object_id)?.state {
            FetchState::Ready(lines) => Some(Arc::clone(lines)),
            _ => None,
        }
    }

    pub fn is_cached(&self, object_id: &str) -> bool {
        self.entries.contains_key(object_id)
    }

    pub fn object_for(&self, file_path: &str) -> Option<&ObjectId> {
        self.viewers.get(file_path)
    }

    pub fn viewers(&self) -> impl Iterator<Item = (&String, &ObjectId)> {
        self.viewers.iter()
    }
}
