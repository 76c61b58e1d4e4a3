//! # gitplay-core
//!
//! Core library for gitplay - a session engine for replaying repository
//! history commit by commit.
//!
//! This crate holds the session state (commit batches, playback cursor, file
//! tree windows, file contents and size changes), the [`Backend`] trait it
//! fetches through, and an in-memory backend for tests and demos.

pub mod backend;
pub mod cache;
pub mod changes;
pub mod config;
pub mod content;
pub mod error;
pub mod events;
pub mod flight;
pub mod memory;
pub mod models;
pub mod playback;
pub mod seek;
pub mod session;
pub mod windows;

pub use backend::Backend;
pub use cache::{BatchCache, CommitIndex, CommitRef};
pub use config::{SessionConfig, DEFAULT_BATCH_SIZE};
pub use error::{Error, Result};
pub use events::{SessionEvent, Subscription, Topic};
pub use memory::{History, MemoryBackend};
pub use models::{
    Blob, CommitDetails, CommitId, CommitListing, CommitRecord, FileTree, MessageState, ObjectId,
    RankedFile, SizeSeries,
};
pub use playback::SessionCursor;
pub use session::{HoverPreview, RepositoryStatus, Session};
pub use windows::{Navigation, Placement, TreeEntry, Window, WindowId, WindowKind};
