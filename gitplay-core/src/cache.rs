use crate::models::{CommitId, CommitListing, CommitRecord, MessageState};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Every commit id of the open repository, in playback order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIndex {
    ids: Vec<CommitId>,
    positions: HashMap<CommitId, usize>,
}

impl CommitIndex {
    pub fn new(ids: Vec<CommitId>) -> Self {
        let positions = ids
            .iter()
            .enumerate()
            .map(|(position, id)| (id.clone(), position))
            .collect();
        Self { ids, positions }
    }

    /// Builds the index from a `prepare_cache` answer, trusting the id list
    /// over the reported count when the two disagree.
    pub fn from_listing(listing: CommitListing) -> Self {
        if listing.commits_count != listing.ordered_id_list.len() {
            warn!(
                "Commit count {} does not match {} listed ids",
                listing.commits_count,
                listing.ordered_id_list.len()
            );
        }
        Self::new(listing.ordered_id_list)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id(&self, index: usize) -> Option<&CommitId> {
        self.ids.get(index)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn ids(&self) -> &[CommitId] {
        &self.ids
    }

    pub fn last_index(&self) -> Option<usize> {
        self.ids.len().checked_sub(1)
    }
}

/// A fetched, immutable slice of the commit sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub batch_index: usize,
    pub records: Vec<CommitRecord>,
}

/// Address of a commit for message lookups.
#[derive(Debug, Clone, Copy)]
pub enum CommitRef<'a> {
    Id(&'a str),
    Index(usize),
}

/// Fetched batches of commit records. Grows for the lifetime of the session.
#[derive(Debug, Clone)]
pub struct BatchCache {
    batch_size: usize,
    batches: BTreeMap<usize, Batch>,
    messages: HashMap<CommitId, String>,
}

impl BatchCache {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            batches: BTreeMap::new(),
            messages: HashMap::new(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn batch_of(&self, index: usize) -> usize {
        index / self.batch_size
    }

    /// First commit index of `batch_index`.
    pub fn batch_start(&self, batch_index: usize) -> usize {
        batch_index * self.batch_size
    }

    pub fn is_fetched(&self, batch_index: usize) -> bool {
        self.batches.contains_key(&batch_index)
    }

    pub fn is_index_fetched(&self, index: usize) -> bool {
        self.is_fetched(self.batch_of(index))
    }

    pub fn fetched_batches(&self) -> impl Iterator<Item = usize> + '_ {
        self.batches.keys().copied()
    }

    pub fn batch(&self, batch_index: usize) -> Option<&Batch> {
        self.batches.get(&batch_index)
    }

    pub fn loaded_count(&self) -> usize {
        self.messages.len()
    }

    /// Merges a `get_commits` answer for `batch_index` and marks it fetched.
    /// Returns the number of records kept.
    pub fn merge(
        &mut self,
        batch_index: usize,
        index: &CommitIndex,
        fetched: HashMap<CommitId, String>,
    ) -> usize {
        let start = self.batch_start(batch_index);
        let end = start + self.batch_size;

        let mut records: Vec<CommitRecord> = fetched
            .into_iter()
            .filter_map(|(id, message)| match index.position(&id) {
                Some(position) if (start..end).contains(&position) => Some(CommitRecord {
                    id,
                    message,
                    position,
                }),
                Some(position) => {
                    warn!(
                        "Dropping commit {} at {} outside batch {}",
                        id, position, batch_index
                    );
                    None
                }
                None => {
                    warn!("Dropping unknown commit {}", id);
                    None
                }
            })
            .collect();
        records.sort_by_key(|record| record.position);

        for record in &records {
            self.messages
                .insert(record.id.clone(), record.message.clone());
        }
        let kept = records.len();
        self.batches.insert(
            batch_index,
            Batch {
                batch_index,
                records,
            },
        );
        kept
    }

    pub fn message(&self, commit: CommitRef<'_>, index: &CommitIndex) -> MessageState {
        let id = match commit {
            CommitRef::Id(id) => Some(id),
            CommitRef::Index(position) => index.id(position).map(String::as_str),
        };
        match id.and_then(|id| self.messages.get(id)) {
            Some(message) => MessageState::Loaded(message.clone()),
            None => MessageState::Loading,
        }
    }

    pub fn record(&self, position: usize) -> Option<&CommitRecord> {
        let batch = self.batches.get(&self.batch_of(position))?;
        batch
            .records
            .iter()
            .find(|record| record.position == position)
    }
}
