//! Read path over a memory-mapped index file.
//!
//! `open` validates the header and section bounds once; all later
//! accessors index into the map with arithmetic proven safe by that
//! validation. Postings are found by binary search over the sorted
//! trigram table. A `(drive, fileRef) -> entry index` map is built
//! eagerly to make parent-chain walks O(1) per hop.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::format::{
    self, DriveMetadata, FileEntry, IndexHeader, TrigramEntry, DRIVE_META_LEN, ENTRY_LEN,
    HEADER_LEN, TRIGRAM_LEN,
};
use crate::IndexError;

/// An open, validated, memory-mapped index.
pub struct DiskIndex {
    map: Mmap,
    header: IndexHeader,
    entries_off: usize,
    pool_off: usize,
    trigrams_off: usize,
    postings_off: usize,
    metadata: Vec<DriveMetadata>,
    ref_to_index: HashMap<u64, u32>,
}

impl DiskIndex {
    /// Open and validate an index file.
    ///
    /// Any structural problem (short file, bad magic/version, sections
    /// overrunning the file) reports [`IndexError::Corrupt`], which
    /// callers treat as "no existing index".
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        let file = File::open(path)?;
        // SAFETY: the map is read-only and private to this process; the
        // builder only ever replaces the file by atomic rename, so the
        // mapped bytes cannot change underneath us.
        #[allow(unsafe_code)]
        let map = unsafe { Mmap::map(&file)? };

        let header = IndexHeader::decode(&map)?;

        let entries_off = HEADER_LEN;
        let entries_len = (header.entry_count as usize)
            .checked_mul(ENTRY_LEN)
            .ok_or(IndexError::Corrupt("entry section overflows"))?;
        let pool_off = entries_off + entries_len;
        let pool_len = (header.string_pool_len as usize) * 2;
        let trigrams_off = pool_off + pool_len;
        let trigrams_len = (header.trigram_count as usize) * TRIGRAM_LEN;
        let postings_off = trigrams_off + trigrams_len;
        let postings_len = (header.posting_len as usize) * 4;
        let trailer_off = postings_off + postings_len;

        if trailer_off + 4 > map.len() {
            return Err(IndexError::Corrupt("sections overrun file"));
        }
        let meta_count = format::read_u32(&map, trailer_off) as usize;
        let meta_off = trailer_off + 4;
        if meta_off + meta_count * DRIVE_META_LEN > map.len() {
            return Err(IndexError::Corrupt("trailer overruns file"));
        }
        let metadata = (0..meta_count)
            .map(|i| DriveMetadata::decode(&map[meta_off + i * DRIVE_META_LEN..]))
            .collect();

        let mut index = Self {
            map,
            header,
            entries_off,
            pool_off,
            trigrams_off,
            postings_off,
            metadata,
            ref_to_index: HashMap::new(),
        };
        index.validate_entries()?;
        index.build_ref_map();
        Ok(index)
    }

    fn validate_entries(&self) -> Result<(), IndexError> {
        for i in 0..self.header.entry_count {
            let entry = self.entry(i);
            let end = entry.name_offset as usize + entry.name_len as usize;
            if end > self.header.string_pool_len as usize {
                return Err(IndexError::Corrupt("entry name outside string pool"));
            }
        }
        Ok(())
    }

    fn build_ref_map(&mut self) {
        self.ref_to_index.reserve(self.header.entry_count as usize);
        for i in 0..self.header.entry_count {
            let entry = self.entry(i);
            if !entry.is_tombstone() {
                self.ref_to_index
                    .insert(format::ref_key(entry.drive_index, entry.file_ref), i);
            }
        }
    }

    #[must_use]
    pub fn entry_count(&self) -> u32 {
        self.header.entry_count
    }

    #[must_use]
    pub fn build_timestamp(&self) -> u64 {
        self.header.build_timestamp
    }

    #[must_use]
    pub fn drive_metadata(&self) -> &[DriveMetadata] {
        &self.metadata
    }

    /// Decode an entry record. `idx` must be `< entry_count`.
    #[must_use]
    pub fn entry(&self, idx: u32) -> FileEntry {
        let off = self.entries_off + idx as usize * ENTRY_LEN;
        FileEntry::decode(&self.map[off..off + ENTRY_LEN])
    }

    /// The whole string pool (used when reloading an index for update).
    #[must_use]
    pub fn string_pool(&self) -> Vec<u16> {
        (0..self.header.string_pool_len as usize)
            .map(|i| format::read_u16(&self.map, self.pool_off + i * 2))
            .collect()
    }

    /// The entry's name as UTF-16 code units.
    #[must_use]
    pub fn name_units(&self, idx: u32) -> Vec<u16> {
        let entry = self.entry(idx);
        let start = self.pool_off + entry.name_offset as usize * 2;
        (0..entry.name_len as usize)
            .map(|i| format::read_u16(&self.map, start + i * 2))
            .collect()
    }

    /// The entry's name decoded to a string (lossy on broken surrogates).
    #[must_use]
    pub fn name(&self, idx: u32) -> String {
        String::from_utf16_lossy(&self.name_units(idx))
    }

    /// The sorted posting list for a trigram; empty when absent.
    #[must_use]
    pub fn postings(&self, trigram: u32) -> Vec<u32> {
        let count = self.header.trigram_count as usize;
        let mut lo = 0usize;
        let mut hi = count;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = self.trigram_entry(mid);
            match entry.trigram.cmp(&trigram) {
                std::cmp::Ordering::Equal => {
                    return self.posting_range(entry);
                }
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        Vec::new()
    }

    fn trigram_entry(&self, table_index: usize) -> TrigramEntry {
        let off = self.trigrams_off + table_index * TRIGRAM_LEN;
        TrigramEntry::decode(&self.map[off..off + TRIGRAM_LEN])
    }

    fn posting_range(&self, entry: TrigramEntry) -> Vec<u32> {
        let start = entry.posting_offset as usize;
        let end = (start + entry.posting_count as usize).min(self.header.posting_len as usize);
        (start..end)
            .map(|i| format::read_u32(&self.map, self.postings_off + i * 4))
            .collect()
    }

    /// Entries whose names were too short for trigrams.
    #[must_use]
    pub fn short_name_indices(&self) -> Vec<u32> {
        self.postings(crate::trigram::SHORT_NAME_TRIGRAM)
    }

    /// Entry index for a `(drive, fileRef)` key, when live.
    #[must_use]
    pub fn entry_by_ref(&self, drive_index: u8, file_ref: u64) -> Option<u32> {
        self.ref_to_index
            .get(&format::ref_key(drive_index, file_ref))
            .copied()
    }

    /// Reconstruct the full path of an entry by walking parent references
    /// within its drive, prefixed `<driveLetter>:`.
    #[must_use]
    pub fn build_full_path(&self, idx: u32) -> String {
        if idx >= self.header.entry_count {
            return String::new();
        }
        let drive_index = self.entry(idx).drive_index;
        let mut parts: Vec<String> = Vec::new();
        let mut current = idx;
        // Depth cap guards against parent-ref cycles in damaged volumes.
        for _ in 0..64 {
            let entry = self.entry(current);
            let name = self.name(current);
            if name.is_empty() {
                break;
            }
            parts.push(name);
            let parent_key = format::ref_key(drive_index, entry.parent_ref);
            match self.ref_to_index.get(&parent_key) {
                Some(&parent) if parent != current => current = parent,
                _ => break,
            }
        }
        if parts.is_empty() {
            return String::new();
        }

        let letter = char::from(b'A' + drive_index.min(25));
        let mut path = String::with_capacity(64);
        path.push(letter);
        path.push(':');
        for part in parts.iter().rev() {
            path.push('\\');
            path.push_str(part);
        }
        path
    }

    /// Default per-user location of the index file.
    #[must_use]
    pub fn default_index_path() -> PathBuf {
        let base = if cfg!(windows) {
            std::env::var_os("LOCALAPPDATA").map(PathBuf::from)
        } else {
            std::env::var_os("XDG_STATE_HOME")
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/state"))
                })
        };
        match base {
            Some(dir) => dir.join("velterm").join("search.idx"),
            None => PathBuf::from("search.idx"),
        }
    }
}

impl std::fmt::Debug for DiskIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskIndex")
            .field("entries", &self.header.entry_count)
            .field("trigrams", &self.header.trigram_count)
            .field("drives", &self.metadata.len())
            .finish()
    }
}
