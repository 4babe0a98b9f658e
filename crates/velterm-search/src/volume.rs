//! The volume-enumeration / change-journal seam.
//!
//! The builder consumes [`VolumeProvider`]: fixed-drive discovery, a fast
//! volume-wide record enumeration (MFT-style on hosts that have it), and a
//! change-journal stream for incremental updates. [`WalkVolumeProvider`]
//! is the portable fallback: a recursive directory walk with synthetic
//! refs hashed from paths. Walked roots have no journal, so they always
//! rebuild fully.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use ignore::WalkBuilder;
use tracing::debug;

use crate::format::ATTR_DIRECTORY;
use crate::IndexError;

/// One file or directory yielded by enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub name: String,
    pub file_ref: u64,
    pub parent_ref: u64,
    pub attributes: u8,
}

/// A fixed drive (or mapped root) eligible for indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveInfo {
    pub letter: char,
    pub index: u8,
}

/// Change-journal resume point: the journal identity plus the next
/// sequence number to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalPosition {
    pub journal_id: u64,
    pub next_usn: u64,
}

/// One journal record, already classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeChange {
    /// FILE_CREATE or RENAME_NEW_NAME.
    Added {
        file_ref: u64,
        parent_ref: u64,
        name: String,
        attributes: u8,
    },
    /// FILE_DELETE or RENAME_OLD_NAME.
    Removed { file_ref: u64 },
}

/// The changes since a resume point, plus the new resume point.
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    pub changes: Vec<VolumeChange>,
    pub position: JournalPosition,
}

/// Host seam for volume enumeration and change journals.
///
/// Implementations wrap whatever the host filesystem offers; the builder
/// and service never touch OS volume interfaces directly.
pub trait VolumeProvider: Send + Sync {
    /// Fixed drives to index.
    fn drives(&self) -> Vec<DriveInfo>;

    /// Volume serial for identity checks; 0 when unavailable.
    fn volume_serial(&self, drive: &DriveInfo) -> u32;

    /// Enumerate every record on the drive. The callback is invoked once
    /// per file/directory; enumeration stops early when `cancel` is set.
    fn enumerate(
        &self,
        drive: &DriveInfo,
        cancel: &AtomicBool,
        on_record: &mut dyn FnMut(FileRecord),
    ) -> Result<(), IndexError>;

    /// Current journal resume point, or `None` when the drive has no
    /// usable change journal (incremental update is then impossible).
    fn journal_position(&self, drive: &DriveInfo) -> Option<JournalPosition>;

    /// Stream journal records from `since`. Fails with
    /// [`IndexError::JournalRotated`] when the journal identity changed.
    fn read_changes(
        &self,
        drive: &DriveInfo,
        since: &JournalPosition,
        cancel: &AtomicBool,
    ) -> Result<ChangeBatch, IndexError>;
}

/// Directory names never worth indexing, mirroring the fast-path skip
/// list.
const SKIP_DIRS: &[&str] = &[
    "$Recycle.Bin",
    "$RECYCLE.BIN",
    "System Volume Information",
    "node_modules",
    ".git",
    "__pycache__",
    ".vs",
];

/// Portable enumeration fallback: a recursive walk rooted at one or more
/// directories, each presented as a drive.
///
/// Refs are FNV-1a hashes of the lowercased path, so they are stable
/// across runs and parent chains resolve by hashing the parent directory.
pub struct WalkVolumeProvider {
    roots: Vec<(char, PathBuf)>,
}

impl WalkVolumeProvider {
    /// Map explicit `(letter, root)` pairs.
    #[must_use]
    pub fn new(roots: Vec<(char, PathBuf)>) -> Self {
        Self { roots }
    }

    /// A single root presented as drive `C`.
    #[must_use]
    pub fn single_root(root: PathBuf) -> Self {
        Self::new(vec![('C', root)])
    }

    fn root_for(&self, drive: &DriveInfo) -> Option<&Path> {
        self.roots
            .iter()
            .find(|(letter, _)| *letter == drive.letter)
            .map(|(_, root)| root.as_path())
    }
}

impl VolumeProvider for WalkVolumeProvider {
    fn drives(&self) -> Vec<DriveInfo> {
        self.roots
            .iter()
            .map(|(letter, _)| DriveInfo {
                letter: *letter,
                index: drive_index(*letter),
            })
            .collect()
    }

    fn volume_serial(&self, drive: &DriveInfo) -> u32 {
        // Derived from the root path so a re-pointed root reads as a new
        // volume.
        self.root_for(drive)
            .map(|root| fnv1a_path(root) as u32)
            .unwrap_or(0)
    }

    fn enumerate(
        &self,
        drive: &DriveInfo,
        cancel: &AtomicBool,
        on_record: &mut dyn FnMut(FileRecord),
    ) -> Result<(), IndexError> {
        let Some(root) = self.root_for(drive) else {
            return Ok(());
        };
        debug!(root = %root.display(), "walk enumeration");

        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .filter_entry(|entry| !should_skip_entry(entry))
            .build();

        for entry in walker {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if path == root {
                continue;
            }
            let Some(parent) = path.parent() else { continue };
            let is_dir = entry_is_dir(&entry);
            let attrs = entry_attributes(&entry);
            on_record(FileRecord {
                name: entry.file_name().to_string_lossy().into_owned(),
                file_ref: fnv1a_path(path),
                parent_ref: fnv1a_path(parent),
                attributes: (attrs & 0xFF) as u8
                    | if is_dir { ATTR_DIRECTORY } else { 0 },
            });
        }
        Ok(())
    }

    fn journal_position(&self, _drive: &DriveInfo) -> Option<JournalPosition> {
        // Plain directory walks have no change journal.
        None
    }

    fn read_changes(
        &self,
        _drive: &DriveInfo,
        _since: &JournalPosition,
        _cancel: &AtomicBool,
    ) -> Result<ChangeBatch, IndexError> {
        Err(IndexError::JournalRotated)
    }
}

// Host attribute bits (FILE_ATTRIBUTE_*), shared with the fast path.
const ATTR_HIDDEN_BIT: u32 = 0x0002;
const ATTR_SYSTEM_BIT: u32 = 0x0004;
const ATTR_REPARSE_POINT_BIT: u32 = 0x0400;
const ATTR_OFFLINE_BIT: u32 = 0x1000;
const ATTR_RECALL_ON_OPEN_BIT: u32 = 0x0004_0000;
const ATTR_RECALL_ON_DATA_ACCESS_BIT: u32 = 0x0040_0000;

fn should_skip_entry(entry: &ignore::DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    if SKIP_DIRS.iter().any(|skip| name.eq_ignore_ascii_case(skip)) {
        return true;
    }
    attributes_exclude(entry_attributes(entry), entry_is_dir(entry))
}

/// Whether host attributes exclude an entry from the walk.
///
/// Hidden entries are skipped only when also marked system; a
/// hidden-but-not-system file is indexed. Reparse points (junctions,
/// mount points, symlinks) and offline/recall-on-access placeholders are
/// pruned when they are directories, so cloud-backed trees are never
/// hydrated by enumeration.
fn attributes_exclude(attrs: u32, is_dir: bool) -> bool {
    if attrs & ATTR_HIDDEN_BIT != 0 && attrs & ATTR_SYSTEM_BIT != 0 {
        return true;
    }
    is_dir
        && attrs
            & (ATTR_REPARSE_POINT_BIT
                | ATTR_OFFLINE_BIT
                | ATTR_RECALL_ON_OPEN_BIT
                | ATTR_RECALL_ON_DATA_ACCESS_BIT)
            != 0
}

/// Whether the entry is a directory, following links so a symlinked
/// directory is still treated as one for pruning.
fn entry_is_dir(entry: &ignore::DirEntry) -> bool {
    entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
        || (entry.path_is_symlink()
            && std::fs::metadata(entry.path())
                .map(|m| m.is_dir())
                .unwrap_or(false))
}

/// Host attributes of the entry itself (not its link target).
#[cfg(windows)]
fn entry_attributes(entry: &ignore::DirEntry) -> u32 {
    use std::os::windows::fs::MetadataExt;
    std::fs::symlink_metadata(entry.path())
        .map(|m| m.file_attributes())
        .unwrap_or(0)
}

/// Unix has no hidden/system attribute bits; symlinks stand in for
/// reparse points.
#[cfg(not(windows))]
fn entry_attributes(entry: &ignore::DirEntry) -> u32 {
    if entry.path_is_symlink() {
        ATTR_REPARSE_POINT_BIT
    } else {
        0
    }
}

/// Drive index for a letter: `A` = 0 ... `Z` = 25.
#[must_use]
pub fn drive_index(letter: char) -> u8 {
    let upper = letter.to_ascii_uppercase();
    if upper.is_ascii_uppercase() {
        (upper as u8) - b'A'
    } else {
        0
    }
}

/// FNV-1a over the lowercased path text; the synthetic ref used when the
/// host cannot supply real file reference numbers.
#[must_use]
pub fn fnv1a_path(path: &Path) -> u64 {
    let mut hash: u64 = 0xCBF2_9CE4_8422_2325;
    for ch in path.to_string_lossy().chars() {
        let folded = ch.to_lowercase().next().unwrap_or(ch);
        let mut buf = [0u8; 4];
        for byte in folded.encode_utf8(&mut buf).as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
        }
    }
    // The key packing reserves the top byte for the drive index, and zero
    // marks tombstones; keep synthetic refs inside the usable range.
    (hash & 0x00FF_FFFF_FFFF_FFFF).max(1)
}
