//! Filesystem search core: the memory-mapped trigram index and its ranked
//! query pipeline.
//!
//! - [`format`] — the on-disk layout (version 2), little-endian throughout
//! - [`trigram`] — 30-bit case-insensitive trigram packing
//! - [`disk_index`] — the read path over a memory-mapped index file
//! - [`volume`] — the volume-enumeration/change-journal seam and the
//!   portable directory-walk provider
//! - [`builder`] — full builds, journal-based incremental updates, and the
//!   atomic publish
//! - [`service`] — background indexing + the ranked search worker
//!
//! The index is fail-soft: a missing, corrupt, or version-mismatched file
//! is treated as "no index" and rebuilt; search returns empty results
//! until the index is ready.

pub mod builder;
pub mod disk_index;
pub mod format;
pub mod service;
pub mod trigram;
pub mod volume;

pub use builder::{BuildStats, IndexBuilder};
pub use disk_index::DiskIndex;
pub use format::{DriveMetadata, FileEntry, IndexHeader, ATTR_DIRECTORY};
pub use service::{query_index, FileSearchService, SearchResult};
pub use trigram::{pack_trigram, SHORT_NAME_TRIGRAM};
pub use volume::{
    ChangeBatch, DriveInfo, FileRecord, JournalPosition, VolumeChange, VolumeProvider,
    WalkVolumeProvider,
};

use std::fmt;
use std::io;

/// Index subsystem failures.
#[derive(Debug)]
pub enum IndexError {
    /// Opening, reading, or writing the index file failed. Search stays
    /// unavailable; a rebuild is retried on next start.
    Io(io::Error),
    /// Magic/version mismatch or size inconsistency; treated the same as
    /// "no existing index".
    Corrupt(&'static str),
    /// The change journal was recreated between runs; incremental update
    /// is impossible and a full rebuild is required.
    JournalRotated,
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::Io(err) => write!(f, "index i/o failed: {err}"),
            IndexError::Corrupt(what) => write!(f, "index corrupt: {what}"),
            IndexError::JournalRotated => write!(f, "change journal rotated"),
        }
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IndexError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for IndexError {
    fn from(err: io::Error) -> Self {
        IndexError::Io(err)
    }
}
