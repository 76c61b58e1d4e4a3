//! Per-key in-flight registry.
//!
//! A request for a key that is already being fetched joins the pending fetch
//! instead of issuing a second one; distinct keys run concurrently. The work
//! is spawned onto the runtime, so it completes (and updates the session) even
//! if every caller drops its handle.

use crate::error::{Error, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

/// Handle to an in-flight fetch. Await it or drop it.
pub type Pending<T> = Shared<BoxFuture<'static, Result<T>>>;

pub struct SingleFlight<K, T> {
    pending: Arc<Mutex<HashMap<K, Pending<T>>>>,
}

impl<K, T> Default for SingleFlight<K, T> {
    fn default() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the pending fetch for `key`, spawning `work` if there is none.
    /// Must be called from within a tokio runtime.
    pub fn run<F>(&self, key: K, work: F) -> Pending<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        // The registry stays locked until the entry is inserted, so a task that
        // finishes immediately cannot remove its key before it exists.
        let mut pending = self.pending.lock();
        if let Some(existing) = pending.get(&key) {
            return existing.clone();
        }

        let registry = Arc::clone(&self.pending);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let outcome = work.await;
            registry.lock().remove(&task_key);
            outcome
        });

        let shared = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(Error::Task(e.to_string())),
            }
        }
        .boxed()
        .shared();

        pending.insert(key, shared.clone());
        shared
    }
}
