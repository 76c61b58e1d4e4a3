//! The session: one open repository, one cursor, and everything hanging off
//! it.
//!
//! [`Session`] is a cheap `Clone` handle. All mutable state sits behind a
//! single lock that is never held across an await; fetches run as spawned
//! tasks deduplicated per key by [`SingleFlight`], and their results are only
//! applied if the repository they were issued for is still the open one.
//! Commands that start fetches must be called from within a tokio runtime.

use crate::backend::Backend;
use crate::cache::{BatchCache, CommitIndex, CommitRef};
use crate::changes::ChangeTracker;
use crate::config::SessionConfig;
use crate::content::{Closed, ContentCache, ContentEntry, OpenOutcome};
use crate::error::{Error, Result};
use crate::events::{EventBus, SessionEvent, Subscription, Topic};
use crate::flight::{Pending, SingleFlight};
use crate::models::{CommitDetails, CommitId, CommitRecord, MessageState, ObjectId, RankedFile};
use crate::playback::{next_speed, PlaybackController, SessionCursor, Step};
use crate::seek::SeekResolver;
use crate::windows::{Navigation, Placement, TreeEntry, Window, WindowId, WindowKind, WindowManager};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryStatus {
    Closed,
    Opening,
    Ready,
    /// The last open attempt failed; the session is back to its pristine state.
    Failed,
}

/// What the timeline shows under the pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverPreview {
    pub index: usize,
    pub commit_id: CommitId,
    pub message: MessageState,
}

struct SessionState {
    /// Bumped on every open; fetch results from an older epoch are dropped.
    epoch: u64,
    status: RepositoryStatus,
    repository_path: Option<String>,
    index: Option<Arc<CommitIndex>>,
    batches: BatchCache,
    cursor: SessionCursor,
    details: Option<Arc<CommitDetails>>,
    tree_index: Option<usize>,
    tree_requested: u64,
    tree_applied: u64,
    windows: WindowManager,
    contents: ContentCache,
    changes: ChangeTracker,
    last_error: Option<Error>,
}

impl SessionState {
    fn new(config: &SessionConfig, epoch: u64) -> Self {
        Self {
            epoch,
            status: RepositoryStatus::Closed,
            repository_path: None,
            index: None,
            batches: BatchCache::new(config.batch_size),
            cursor: SessionCursor::new(config.playback.initial_speed),
            details: None,
            tree_index: None,
            tree_requested: 0,
            tree_applied: 0,
            windows: WindowManager::new(config.layout.clone()),
            contents: ContentCache::new(),
            changes: ChangeTracker::new(config.batch_size),
            last_error: None,
        }
    }

    /// A pristine state for `epoch` that keeps the container dimensions.
    fn reset(&mut self, config: &SessionConfig, epoch: u64) {
        let (width, height) = self.windows.layout().container();
        *self = SessionState::new(config, epoch);
        self.windows.layout_mut().set_container(width, height);
    }

    fn is_ready(&self) -> bool {
        self.status == RepositoryStatus::Ready
    }

    fn commits_count(&self) -> usize {
        self.index.as_ref().map_or(0, |index| index.len())
    }

    fn current_commit_id(&self) -> Option<&CommitId> {
        self.index.as_ref()?.id(self.cursor.current_index)
    }
}

struct Inner {
    backend: Arc<dyn Backend>,
    config: SessionConfig,
    playback: PlaybackController,
    seek: SeekResolver,
    events: EventBus,
    state: Mutex<SessionState>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    batch_flights: SingleFlight<(u64, usize), ()>,
    detail_flights: SingleFlight<(u64, CommitId), Arc<CommitDetails>>,
    content_flights: SingleFlight<(u64, ObjectId), ()>,
    size_flights: SingleFlight<(u64, usize, Vec<String>), ()>,
    ranking_flights: SingleFlight<(u64, usize), ()>,
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    pub fn new(backend: Arc<dyn Backend>, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(backend, config))
    }

    pub fn with_defaults(backend: Arc<dyn Backend>) -> Self {
        Self::build(backend, SessionConfig::default())
    }

    fn build(backend: Arc<dyn Backend>, config: SessionConfig) -> Self {
        let state = SessionState::new(&config, 0);
        Self {
            inner: Arc::new(Inner {
                backend,
                playback: PlaybackController::new(
                    config.batch_size,
                    config.lookahead,
                    config.playback.max_speed,
                ),
                seek: SeekResolver::new(config.seek_margin_px),
                events: EventBus::new(config.event_capacity),
                state: Mutex::new(state),
                ticker: Mutex::new(None),
                batch_flights: SingleFlight::new(),
                detail_flights: SingleFlight::new(),
                content_flights: SingleFlight::new(),
                size_flights: SingleFlight::new(),
                ranking_flights: SingleFlight::new(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn subscribe(&self, topics: &[Topic]) -> Subscription {
        self.inner.events.subscribe(topics)
    }

    fn publish(&self, event: SessionEvent) {
        self.inner.events.publish(event);
    }

    /// Records a failed fetch if it belongs to the open repository.
    fn fetch_failed(&self, epoch: u64, resource: String, source: &Error) -> Error {
        let err = Error::fetch(resource.clone(), source);
        warn!("{}", err);
        {
            let mut state = self.inner.state.lock();
            if state.epoch != epoch {
                return err;
            }
            state.last_error = Some(err.clone());
        }
        self.publish(SessionEvent::FetchFailed {
            resource,
            message: source.to_string(),
        });
        err
    }

    // ----- repository lifecycle -----

    /// Opens the repository at `path` and returns its number of commits.
    ///
    /// Any previous repository is dropped first. On failure the session is
    /// left pristine in [`RepositoryStatus::Failed`] so another path can be
    /// tried.
    pub async fn open_repository(&self, path: &str) -> Result<usize> {
        self.stop_ticker();
        let epoch = {
            let mut state = self.inner.state.lock();
            let epoch = state.epoch + 1;
            state.reset(&self.inner.config, epoch);
            state.status = RepositoryStatus::Opening;
            state.repository_path = Some(path.to_string());
            epoch
        };
        info!("Opening repository {}", path);
        self.publish(SessionEvent::RepositoryOpening {
            path: path.to_string(),
        });

        match self.load_repository(epoch, path).await {
            Ok(count) => Ok(count),
            Err(e) => {
                self.fail_open(epoch, path, &e);
                Err(e)
            }
        }
    }

    async fn load_repository(&self, epoch: u64, path: &str) -> Result<usize> {
        self.inner.backend.open(path).await?;
        let listing = self.inner.backend.prepare_cache().await?;
        let index = Arc::new(CommitIndex::from_listing(listing));
        if index.is_empty() {
            return Err(Error::EmptyRepository);
        }
        let count = index.len();

        {
            let mut state = self.inner.state.lock();
            if state.epoch != epoch {
                return Err(Error::Task(format!("open of {} was superseded", path)));
            }
            state.index = Some(index);
        }

        // The repository is usable without these; both are retried on demand.
        if let Err(e) = self.ensure_loaded(0).await {
            warn!("First commit batch unavailable: {}", e);
        }
        if let Err(e) = self.fetch_file_tree(0).await {
            warn!("First file tree unavailable: {}", e);
        }

        {
            let mut state = self.inner.state.lock();
            if state.epoch != epoch {
                return Err(Error::Task(format!("open of {} was superseded", path)));
            }
            state.status = RepositoryStatus::Ready;
            state.windows.open_path("");
            state.changes.track_folder("");
        }
        info!("Repository {} ready with {} commits", path, count);
        self.publish(SessionEvent::RepositoryReady {
            commits_count: count,
        });
        self.publish(SessionEvent::WindowsChanged);

        let _ = self.fetch_size_changes_for_open_folders(0);
        let _ = self.fetch_files_ordered_by_most_modifications(0);
        Ok(count)
    }

    fn fail_open(&self, epoch: u64, path: &str, err: &Error) {
        {
            let mut state = self.inner.state.lock();
            if state.epoch != epoch {
                return;
            }
            state.reset(&self.inner.config, epoch);
            state.status = RepositoryStatus::Failed;
            state.repository_path = Some(path.to_string());
            state.last_error = Some(err.clone());
        }
        if err.is_open_failure() {
            warn!("Repository {} rejected: {}", path, err);
        } else {
            error!("Failed to open repository {}: {}", path, err);
        }
        self.publish(SessionEvent::RepositoryFailed {
            message: err.to_string(),
        });
    }

    pub fn status(&self) -> RepositoryStatus {
        self.inner.state.lock().status
    }

    pub fn is_ready(&self) -> bool {
        self.inner.state.lock().is_ready()
    }

    /// True when the last open was rejected for its path or for having no
    /// commits. A transient backend failure during open leaves this false;
    /// check [`status`](Self::status) for any failed open.
    pub fn is_path_invalid(&self) -> bool {
        let state = self.inner.state.lock();
        state.status == RepositoryStatus::Failed
            && state
                .last_error
                .as_ref()
                .is_some_and(Error::is_open_failure)
    }

    pub fn repository_path(&self) -> Option<String> {
        self.inner.state.lock().repository_path.clone()
    }

    pub fn last_error(&self) -> Option<Error> {
        self.inner.state.lock().last_error.clone()
    }

    pub fn commits_count(&self) -> usize {
        self.inner.state.lock().commits_count()
    }

    pub fn commit_id(&self, index: usize) -> Option<CommitId> {
        self.inner.state.lock().index.as_ref()?.id(index).cloned()
    }

    // ----- commit batches -----

    /// Makes sure the batch containing `from_index` is cached, joining an
    /// in-flight fetch of it if there is one.
    pub async fn ensure_loaded(&self, from_index: usize) -> Result<()> {
        match self.prefetch(from_index) {
            Some(pending) => pending.await,
            None => Ok(()),
        }
    }

    /// Starts loading the batch containing `from_index` without waiting.
    /// `None` when it is cached, out of range, or no repository is open.
    pub fn prefetch(&self, from_index: usize) -> Option<Pending<()>> {
        let state = self.inner.state.lock();
        if from_index >= state.commits_count() {
            return None;
        }
        let batch_index = state.batches.batch_of(from_index);
        if state.batches.is_fetched(batch_index) {
            return None;
        }
        let epoch = state.epoch;
        let start_index = state.batches.batch_start(batch_index);
        let count = state.batches.batch_size();

        let session = self.clone();
        Some(self.inner.batch_flights.run((epoch, batch_index), async move {
            session
                .load_batch(epoch, batch_index, start_index, count)
                .await
        }))
    }

    async fn load_batch(
        &self,
        epoch: u64,
        batch_index: usize,
        start_index: usize,
        count: usize,
    ) -> Result<()> {
        debug!("Fetching commits {}..{}", start_index, start_index + count);
        let fetched = match self.inner.backend.get_commits(start_index, count).await {
            Ok(fetched) => fetched,
            Err(e) => {
                return Err(self.fetch_failed(epoch, format!("commit batch {}", batch_index), &e))
            }
        };

        let records = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            if state.epoch != epoch {
                debug!("Dropping commit batch {} of a closed repository", batch_index);
                return Ok(());
            }
            let Some(index) = state.index.as_ref() else {
                return Ok(());
            };
            state.batches.merge(batch_index, index, fetched)
        };
        self.publish(SessionEvent::BatchLoaded {
            batch_index,
            records,
        });
        Ok(())
    }

    pub fn is_batch_fetched(&self, batch_index: usize) -> bool {
        self.inner.state.lock().batches.is_fetched(batch_index)
    }

    pub fn loaded_count(&self) -> usize {
        self.inner.state.lock().batches.loaded_count()
    }

    pub fn message(&self, commit: CommitRef<'_>) -> MessageState {
        let state = self.inner.state.lock();
        match state.index.as_ref() {
            Some(index) => state.batches.message(commit, index),
            None => MessageState::Loading,
        }
    }

    pub fn message_at(&self, index: usize) -> MessageState {
        self.message(CommitRef::Index(index))
    }

    /// Cached records for the positions in `start..start + count`.
    pub fn records(&self, start: usize, count: usize) -> Vec<CommitRecord> {
        let state = self.inner.state.lock();
        (start..start.saturating_add(count))
            .filter_map(|position| state.batches.record(position).cloned())
            .collect()
    }

    // ----- playback -----

    pub fn cursor(&self) -> SessionCursor {
        self.inner.state.lock().cursor
    }

    pub fn commit_index(&self) -> usize {
        self.inner.state.lock().cursor.current_index
    }

    /// Starts advancing the cursor one commit per tick. False when not ready
    /// or already playing.
    pub fn play(&self) -> bool {
        let speed = {
            let mut state = self.inner.state.lock();
            if !state.is_ready() || state.cursor.is_playing {
                return false;
            }
            state.cursor.is_playing = true;
            state.cursor.speed
        };
        info!("Playback started at {} commits/s", speed);
        self.publish(SessionEvent::PlaybackChanged {
            is_playing: true,
            speed,
        });

        let session = self.clone();
        let handle = tokio::spawn(async move { session.run_playback().await });
        if let Some(previous) = self.inner.ticker.lock().replace(handle) {
            previous.abort();
        }
        true
    }

    pub fn pause(&self) -> bool {
        self.stop_ticker();
        let speed = {
            let mut state = self.inner.state.lock();
            if !state.cursor.is_playing {
                return false;
            }
            state.cursor.is_playing = false;
            state.cursor.speed
        };
        info!("Playback paused");
        self.publish(SessionEvent::PlaybackChanged {
            is_playing: false,
            speed,
        });
        true
    }

    /// Cycles the speed 1, 2, 4, ... up to the configured ceiling, then back
    /// to 1. Takes effect on the next tick.
    pub fn set_speed(&self) -> u32 {
        let (is_playing, speed) = {
            let mut state = self.inner.state.lock();
            state.cursor.speed = next_speed(state.cursor.speed, self.inner.playback.max_speed());
            (state.cursor.is_playing, state.cursor.speed)
        };
        debug!("Playback speed set to {}", speed);
        self.publish(SessionEvent::PlaybackChanged { is_playing, speed });
        speed
    }

    fn stop_ticker(&self) {
        if let Some(handle) = self.inner.ticker.lock().take() {
            handle.abort();
        }
    }

    async fn run_playback(self) {
        loop {
            let interval = self.inner.state.lock().cursor.tick_interval();
            tokio::time::sleep(interval).await;
            if !self.tick() {
                break;
            }
        }
    }

    /// One playback step. Returns whether playback continues.
    fn tick(&self) -> bool {
        let step = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let ready = state.is_ready();
            let count = state.commits_count();
            let batches = &state.batches;
            self.inner
                .playback
                .step(&mut state.cursor, ready, count, |batch| batches.is_fetched(batch))
        };

        match step {
            Step::Halted => false,
            Step::Finished => {
                info!("Playback reached the last commit");
                self.publish(SessionEvent::PlaybackChanged {
                    is_playing: false,
                    speed: self.cursor().speed,
                });
                false
            }
            Step::Advanced {
                index,
                prefetch_from,
            } => {
                self.publish(SessionEvent::CursorMoved { index });
                self.spawn_file_tree(index);
                if let Some(from) = prefetch_from {
                    debug!("Prefetching from commit {}", from);
                    let _ = self.prefetch(from);
                    let _ = self.fetch_size_changes_for_open_folders(from);
                    let _ = self.fetch_files_ordered_by_most_modifications(from);
                }
                true
            }
        }
    }

    // ----- seeking -----

    /// Moves the cursor to `index` (clamped to the last commit), stopping
    /// playback and clearing the current file tree until the new one arrives.
    /// Returns the index moved to, or `None` when not ready.
    pub fn set_current_commit_index(&self, index: usize) -> Option<usize> {
        let index = self.move_cursor(index)?;
        self.spawn_file_tree(index);
        Some(index)
    }

    /// Like [`set_current_commit_index`](Self::set_current_commit_index) but
    /// waits for the new file tree.
    pub async fn jump_to(&self, index: usize) -> Result<usize> {
        let index = self.move_cursor(index).ok_or(Error::NotReady)?;
        self.fetch_file_tree(index).await?;
        Ok(index)
    }

    fn move_cursor(&self, index: usize) -> Option<usize> {
        self.stop_ticker();
        let (index, was_playing, speed) = {
            let mut state = self.inner.state.lock();
            if !state.is_ready() {
                return None;
            }
            let last = state.index.as_ref()?.last_index()?;
            let index = index.min(last);
            let was_playing = state.cursor.is_playing;
            state.cursor.current_index = index;
            state.cursor.is_playing = false;
            state.details = None;
            state.tree_index = None;
            (index, was_playing, state.cursor.speed)
        };

        debug!("Cursor moved to {}", index);
        self.publish(SessionEvent::CursorMoved { index });
        if was_playing {
            self.publish(SessionEvent::PlaybackChanged {
                is_playing: false,
                speed,
            });
        }
        let _ = self.prefetch(index);
        let _ = self.fetch_size_changes_for_open_folders(index);
        let _ = self.fetch_files_ordered_by_most_modifications(index);
        Some(index)
    }

    /// Seeks to a position on the timeline, `0.0` being the first commit and
    /// `1.0` the last.
    pub fn seek(&self, fraction: f64) -> Option<usize> {
        let index = self.inner.seek.resolve(fraction, self.commits_count())?;
        self.set_current_commit_index(index)
    }

    /// Seeks to pointer position `x_px` on a track `track_width_px` wide.
    pub fn seek_at(&self, x_px: f64, track_width_px: f64) -> Option<usize> {
        let fraction = self.inner.seek.fraction_at(x_px, track_width_px)?;
        self.seek(fraction)
    }

    /// The commit under a timeline position. Starts loading its batch when the
    /// message is not cached yet.
    pub fn hover(&self, fraction: f64) -> Option<HoverPreview> {
        let (index, commit_id, message) = {
            let state = self.inner.state.lock();
            let commits = state.index.as_ref()?;
            let index = self.inner.seek.resolve(fraction, commits.len())?;
            let commit_id = commits.id(index)?.clone();
            let message = state.batches.message(CommitRef::Index(index), commits);
            (index, commit_id, message)
        };
        if message.is_loading() {
            let _ = self.prefetch(index);
        }
        Some(HoverPreview {
            index,
            commit_id,
            message,
        })
    }

    pub fn hover_at(&self, x_px: f64, track_width_px: f64) -> Option<HoverPreview> {
        let fraction = self.inner.seek.fraction_at(x_px, track_width_px)?;
        self.hover(fraction)
    }

    // ----- file tree -----

    fn spawn_file_tree(&self, index: usize) {
        let session = self.clone();
        tokio::spawn(async move {
            if let Err(e) = session.fetch_file_tree(index).await {
                debug!("File tree for commit {} not applied: {}", index, e);
            }
        });
    }

    /// Fetches the details of the commit at `index` and makes its tree the
    /// current one, unless a later request was applied first.
    pub async fn fetch_file_tree(&self, index: usize) -> Result<()> {
        let (epoch, seq, commit_id) = {
            let mut state = self.inner.state.lock();
            let commit_id = state
                .index
                .as_ref()
                .ok_or(Error::NotReady)?
                .id(index)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("commit index {}", index)))?;
            state.tree_requested += 1;
            (state.epoch, state.tree_requested, commit_id)
        };

        let backend = Arc::clone(&self.inner.backend);
        let flight_id = commit_id.clone();
        let outcome = self
            .inner
            .detail_flights
            .run((epoch, commit_id.clone()), async move {
                backend.get_commit_details(&flight_id).await.map(Arc::new)
            })
            .await;

        let details = match outcome {
            Ok(details) => details,
            Err(e) => return Err(self.fetch_failed(epoch, format!("commit {}", commit_id), &e)),
        };

        {
            let mut state = self.inner.state.lock();
            if state.epoch != epoch {
                return Ok(());
            }
            if seq < state.tree_applied {
                debug!("Dropping stale file tree for commit {}", index);
                return Ok(());
            }
            state.tree_applied = seq;
            state.details = Some(details);
            state.tree_index = Some(index);
        }
        self.publish(SessionEvent::FileTreeUpdated { index });
        Ok(())
    }

    /// Details of the commit whose tree is currently shown.
    pub fn current_details(&self) -> Option<Arc<CommitDetails>> {
        self.inner.state.lock().details.clone()
    }

    pub fn tree_index(&self) -> Option<usize> {
        self.inner.state.lock().tree_index
    }

    // ----- windows -----

    /// Opens a tree window at `path`, or focuses the one already there. The
    /// folder is tracked for size changes.
    pub fn open_window(&self, path: &str) -> WindowId {
        let (id, created, folder) = {
            let mut state = self.inner.state.lock();
            let (id, created) = state.windows.open_path(path);
            let folder = state.windows.get(id).and_then(Window::folder);
            (id, created, folder)
        };
        self.publish(SessionEvent::WindowsChanged);
        if created {
            if let Some(folder) = folder {
                self.track_folder(&folder);
            }
        }
        id
    }

    pub fn navigate(&self, window: WindowId, navigation: Navigation) -> bool {
        let folder = {
            let mut state = self.inner.state.lock();
            let details = state.details.clone();
            let tree = details.as_ref().and_then(|details| details.file_tree.as_ref());
            if !state.windows.navigate(window, navigation, tree) {
                return false;
            }
            state.windows.get(window).and_then(Window::folder)
        };
        self.publish(SessionEvent::WindowNavigated { window });
        if let Some(folder) = folder {
            self.track_folder(&folder);
        }
        true
    }

    /// Closes a window. Closing a file viewer releases its content.
    pub fn close_window(&self, window: WindowId) -> bool {
        let closed = {
            let mut state = self.inner.state.lock();
            let Some(removed) = state.windows.close(window) else {
                return false;
            };
            match removed.kind {
                WindowKind::FileViewer { file_path, .. } => state.contents.close_path(&file_path),
                WindowKind::FileTree { .. } => None,
            }
        };
        self.publish(SessionEvent::WindowsChanged);
        self.publish_closed(closed);
        true
    }

    pub fn set_focus(&self, window: WindowId) -> bool {
        let focused = self.inner.state.lock().windows.set_focus(window);
        if focused {
            self.publish(SessionEvent::WindowsChanged);
        }
        focused
    }

    /// Places a window that just reported its size. `None` for unknown ids.
    pub fn place_window(&self, window: WindowId, width: f64, height: f64) -> Option<Placement> {
        let mut state = self.inner.state.lock();
        state.windows.get(window)?;
        Some(state.windows.layout_mut().place(window, width, height))
    }

    pub fn move_window(&self, window: WindowId, x: f64, y: f64) -> Option<Placement> {
        self.inner
            .state
            .lock()
            .windows
            .layout_mut()
            .move_to(window, x, y)
    }

    pub fn placement(&self, window: WindowId) -> Option<Placement> {
        self.inner.state.lock().windows.layout().placement(window)
    }

    pub fn set_container_dimensions(&self, width: f64, height: f64) {
        self.inner
            .state
            .lock()
            .windows
            .layout_mut()
            .set_container(width, height);
    }

    pub fn windows(&self) -> Vec<Window> {
        self.inner.state.lock().windows.windows().to_vec()
    }

    pub fn window(&self, window: WindowId) -> Option<Window> {
        self.inner.state.lock().windows.get(window).cloned()
    }

    pub fn z_order(&self) -> Vec<WindowId> {
        self.inner.state.lock().windows.z_order()
    }

    /// Directory listing of a tree window against the current file tree.
    pub fn listing(&self, window: WindowId) -> Vec<TreeEntry> {
        let state = self.inner.state.lock();
        let tree = state
            .details
            .as_ref()
            .and_then(|details| details.file_tree.as_ref());
        state.windows.listing(window, tree)
    }

    // ----- file contents -----

    /// Opens a viewer on `file_path`. The returned fetch is `Some` only when
    /// this call had to start loading the object.
    pub fn open_file(&self, file_path: &str, object_id: &str) -> Option<Pending<()>> {
        let outcome = {
            let mut state = self.inner.state.lock();
            let outcome = state.contents.open(file_path, object_id);
            state.windows.open_viewer(file_path, object_id);
            outcome
        };
        self.publish(SessionEvent::WindowsChanged);
        match outcome {
            OpenOutcome::Fetch => self.start_read(object_id),
            OpenOutcome::Shared | OpenOutcome::AlreadyOpen => None,
        }
    }

    /// Re-reads an open object, joining a read of it already in flight.
    pub async fn read_contents(&self, object_id: &str) -> Result<()> {
        match self.start_read(object_id) {
            Some(pending) => pending.await,
            None => Err(Error::NotFound(format!("no viewer for object {}", object_id))),
        }
    }

    fn start_read(&self, object_id: &str) -> Option<Pending<()>> {
        let epoch = {
            let mut state = self.inner.state.lock();
            if !state.contents.begin_fetch(object_id) {
                return None;
            }
            state.epoch
        };
        let session = self.clone();
        let id = object_id.to_string();
        Some(
            self.inner
                .content_flights
                .run((epoch, object_id.to_string()), async move {
                    session.load_contents(epoch, id).await
                }),
        )
    }

    async fn load_contents(&self, epoch: u64, object_id: ObjectId) -> Result<()> {
        debug!("Reading object {}", object_id);
        let outcome = self.inner.backend.read_file_contents(&object_id).await;

        let (stored, failure) = {
            let mut state = self.inner.state.lock();
            if state.epoch != epoch {
                return Ok(());
            }
            match outcome {
                Ok(lines) => (state.contents.complete(&object_id, Ok(lines)), None),
                Err(e) => (state.contents.complete(&object_id, Err(e.to_string())), Some(e)),
            }
        };

        if let Some(e) = failure {
            return Err(self.fetch_failed(epoch, format!("object {}", object_id), &e));
        }
        if stored {
            self.publish(SessionEvent::ContentUpdated { object_id });
        }
        Ok(())
    }

    /// Closes the most recently opened viewer of `object_id`.
    pub fn close_file(&self, object_id: &str) -> bool {
        let closed = {
            let mut state = self.inner.state.lock();
            let Some(closed) = state.contents.close_object(object_id) else {
                return false;
            };
            if let Some(window) = state.windows.viewer_for(&closed.file_path) {
                state.windows.close(window);
            }
            closed
        };
        self.publish(SessionEvent::WindowsChanged);
        self.publish_closed(Some(closed));
        true
    }

    pub fn close_viewer(&self, file_path: &str) -> bool {
        let closed = {
            let mut state = self.inner.state.lock();
            let Some(closed) = state.contents.close_path(file_path) else {
                return false;
            };
            if let Some(window) = state.windows.viewer_for(file_path) {
                state.windows.close(window);
            }
            closed
        };
        self.publish(SessionEvent::WindowsChanged);
        self.publish_closed(Some(closed));
        true
    }

    fn publish_closed(&self, closed: Option<Closed>) {
        if let Some(Closed {
            object_id,
            evicted: true,
            ..
        }) = closed
        {
            debug!("Evicted object {}", object_id);
            self.publish(SessionEvent::ContentEvicted { object_id });
        }
    }

    pub fn content(&self, object_id: &str) -> Option<ContentEntry> {
        self.inner.state.lock().contents.entry(object_id).cloned()
    }

    pub fn lines(&self, object_id: &str) -> Option<Arc<Vec<String>>> {
        self.inner.state.lock().contents.lines(object_id)
    }

    // ----- change tracking -----

    /// Watches a folder's direct children for size changes and fetches the
    /// current window for it. False when it was already watched.
    pub fn track_folder(&self, path: &str) -> bool {
        let (added, current) = {
            let mut state = self.inner.state.lock();
            (state.changes.track_folder(path), state.cursor.current_index)
        };
        if added {
            let _ = self.fetch_size_changes_for_open_folders(current);
        }
        added
    }

    pub fn tracked_folders(&self) -> Vec<String> {
        self.inner
            .state
            .lock()
            .changes
            .tracked_folders()
            .cloned()
            .collect()
    }

    /// Fetches size series for the batch window containing `from_index`, for
    /// every watched folder that does not have it yet.
    pub fn fetch_size_changes_for_open_folders(&self, from_index: usize) -> Option<Pending<()>> {
        let state = self.inner.state.lock();
        if from_index >= state.commits_count() {
            return None;
        }
        let window = state.changes.window_for(from_index);
        let folders = state.changes.missing_folders(window.batch_index);
        if folders.is_empty() {
            return None;
        }
        let epoch = state.epoch;

        let session = self.clone();
        let key = (epoch, window.batch_index, folders.clone());
        Some(self.inner.size_flights.run(key, async move {
            debug!(
                "Fetching sizes of {:?} for commits {}..{}",
                folders,
                window.start_index,
                window.start_index + window.count
            );
            let series = match session
                .inner
                .backend
                .get_sizes_for_paths(&folders, window.start_index, window.count)
                .await
            {
                Ok(series) => series,
                Err(e) => {
                    let resource = format!("sizes for batch {}", window.batch_index);
                    return Err(session.fetch_failed(epoch, resource, &e));
                }
            };
            {
                let mut state = session.inner.state.lock();
                if state.epoch != epoch {
                    return Ok(());
                }
                state.changes.merge_sizes(window.batch_index, &folders, series);
            }
            session.publish(SessionEvent::SizesUpdated {
                batch_index: window.batch_index,
            });
            Ok(())
        }))
    }

    /// Fetches the most-modified ranking for the batch window containing
    /// `from_index`, unless it is cached.
    pub fn fetch_files_ordered_by_most_modifications(
        &self,
        from_index: usize,
    ) -> Option<Pending<()>> {
        let state = self.inner.state.lock();
        if from_index >= state.commits_count() {
            return None;
        }
        let window = state.changes.window_for(from_index);
        if state.changes.has_ranking(window.batch_index) {
            return None;
        }
        let epoch = state.epoch;

        let session = self.clone();
        Some(
            self.inner
                .ranking_flights
                .run((epoch, window.batch_index), async move {
                    let ranking = match session
                        .inner
                        .backend
                        .get_files_ordered_by_most_modifications(window.start_index)
                        .await
                    {
                        Ok(ranking) => ranking,
                        Err(e) => {
                            let resource = format!("ranking for batch {}", window.batch_index);
                            return Err(session.fetch_failed(epoch, resource, &e));
                        }
                    };
                    {
                        let mut state = session.inner.state.lock();
                        if state.epoch != epoch {
                            return Ok(());
                        }
                        state.changes.store_ranking(window.batch_index, ranking);
                    }
                    session.publish(SessionEvent::RankingUpdated {
                        batch_index: window.batch_index,
                    });
                    Ok(())
                }),
        )
    }

    /// Most-modified files of the batch window the cursor is in.
    pub fn ranking(&self) -> Vec<RankedFile> {
        let state = self.inner.state.lock();
        let window = state.changes.window_for(state.cursor.current_index);
        state.changes.ranking(window.batch_index).to_vec()
    }

    pub fn ranking_by_directory(&self) -> BTreeMap<String, Vec<RankedFile>> {
        let state = self.inner.state.lock();
        let window = state.changes.window_for(state.cursor.current_index);
        state.changes.ranking_by_directory(window.batch_index)
    }

    pub fn size_series(&self, path: &str) -> Option<HashMap<CommitId, u64>> {
        self.inner.state.lock().changes.size_series(path).cloned()
    }

    /// Whether the size of `path` changed at `commit_id`, as far as the
    /// fetched windows tell.
    pub fn changed_at(&self, path: &str, commit_id: &str) -> bool {
        self.inner.state.lock().changes.changed_at(path, commit_id)
    }

    /// Whether the size of `path` changed at the current commit.
    pub fn changed_at_current(&self, path: &str) -> bool {
        let state = self.inner.state.lock();
        state
            .current_commit_id()
            .is_some_and(|commit_id| state.changes.changed_at(path, commit_id))
    }
}
