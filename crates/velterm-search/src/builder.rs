//! Index construction: full builds, journal-based incremental updates,
//! and the atomic publish.
//!
//! A full build enumerates every drive the provider reports, interns names
//! into the UTF-16 pool, and emits trigram postings in one pass over the
//! collected entries. Incremental update reloads the previous file,
//! streams journal changes, tombstones deletions, appends additions, and
//! rewrites the whole file; there is no in-place edit. Every write goes to
//! `<path>.tmp` followed by a rename.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::disk_index::DiskIndex;
use crate::format::{self, DriveMetadata, FileEntry, IndexHeader, TrigramEntry};
use crate::trigram::{self, MIN_TRIGRAM_LEN};
use crate::volume::{self, DriveInfo, JournalPosition, VolumeChange, VolumeProvider};
use crate::IndexError;

/// Rebuild from scratch when the index is older than a week.
const MAX_INDEX_AGE_MS: u64 = 7 * 24 * 60 * 60 * 1000;

/// When journal changes exceed a quarter of the index, a rebuild is
/// cheaper than patching.
const INCREMENTAL_CHANGE_DIVISOR: usize = 4;

/// Outcome counters for one build or update run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub files_indexed: u32,
    pub files_added: u32,
    pub files_removed: u32,
    pub trigrams_created: u32,
    pub was_incremental: bool,
}

/// In-memory index under construction.
#[derive(Default)]
pub struct IndexBuilder {
    entries: Vec<FileEntry>,
    string_pool: Vec<u16>,
    trigram_postings: HashMap<u32, Vec<u32>>,
    short_names: Vec<u32>,
    ref_to_index: HashMap<u64, u32>,
    drive_meta: Vec<DriveMetadata>,
}

impl IndexBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the on-disk index is missing, unreadable, or stale enough
    /// to warrant a full rebuild at startup.
    #[must_use]
    pub fn needs_rebuild(path: &Path) -> bool {
        match DiskIndex::open(path) {
            Ok(index) => {
                let age = now_ms().saturating_sub(index.build_timestamp());
                age > MAX_INDEX_AGE_MS
            }
            Err(_) => true,
        }
    }

    /// Enumerate all drives and write a fresh index to `output`.
    ///
    /// Cancellation leaves the previous file untouched and returns the
    /// partial counters.
    pub fn build(
        &mut self,
        provider: &dyn VolumeProvider,
        output: &Path,
        cancel: &AtomicBool,
        progress: &mut dyn FnMut(f32, &str),
    ) -> Result<BuildStats, IndexError> {
        let mut stats = BuildStats::default();
        self.reset();
        self.string_pool.reserve(2 * 1024 * 1024);

        progress(0.0, "Scanning drives...");
        let drives = provider.drives();

        for (drive_no, drive) in drives.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                return Ok(stats);
            }
            let drive_base = drive_no as f32 / drives.len() as f32 * 0.8;
            let drive_span = 0.8 / drives.len() as f32;
            progress(drive_base, &format!("Indexing {}:\\ ...", drive.letter));

            let mut drive_files = 0u32;
            provider.enumerate(drive, cancel, &mut |record| {
                if cancel.load(Ordering::Relaxed) {
                    return;
                }
                self.add_entry(
                    record.file_ref,
                    record.parent_ref,
                    &record.name,
                    record.attributes,
                    drive.index,
                );
                stats.files_indexed += 1;
                drive_files += 1;
                if drive_files % 5000 == 0 {
                    let within = (drive_files as f32 / 500_000.0).min(0.95);
                    progress(
                        drive_base + within * drive_span,
                        &format!("Indexing {}:\\ - {} files...", drive.letter, drive_files),
                    );
                }
            })?;

            let position = provider.journal_position(drive);
            self.drive_meta.push(DriveMetadata {
                drive_letter: drive.letter as u16,
                volume_serial: provider.volume_serial(drive),
                last_usn: position.map(|p| p.next_usn).unwrap_or(0),
                journal_id: position.map(|p| p.journal_id).unwrap_or(0),
            });
        }

        if cancel.load(Ordering::Relaxed) {
            return Ok(stats);
        }

        progress(0.85, "Building trigram index...");
        for idx in 0..self.entries.len() as u32 {
            if cancel.load(Ordering::Relaxed) {
                return Ok(stats);
            }
            self.add_trigrams(idx);
        }
        stats.trigrams_created = self.trigram_postings.len() as u32;

        progress(0.9, "Writing index file...");
        self.write_to_file(output)?;
        progress(1.0, "Complete");

        stats.files_added = stats.files_indexed;
        debug!(
            files = stats.files_indexed,
            trigrams = stats.trigrams_created,
            "full index build complete"
        );
        Ok(stats)
    }

    /// Apply journal changes on top of the existing index file.
    ///
    /// Falls back to a full rebuild when the previous file is unusable,
    /// a journal rotated, a drive has no journal, or the change volume
    /// exceeds a quarter of the index.
    pub fn incremental_update(
        &mut self,
        provider: &dyn VolumeProvider,
        path: &Path,
        cancel: &AtomicBool,
        progress: &mut dyn FnMut(f32, &str),
    ) -> Result<BuildStats, IndexError> {
        if !self.load_existing(path) {
            return self.build(provider, path, cancel, progress);
        }

        progress(0.0, "Checking for changes...");

        let mut deleted_keys: Vec<u64> = Vec::new();
        let mut added: Vec<(u8, VolumeChange)> = Vec::new();

        for meta_no in 0..self.drive_meta.len() {
            if cancel.load(Ordering::Relaxed) {
                return Ok(BuildStats {
                    was_incremental: true,
                    ..BuildStats::default()
                });
            }
            let meta = self.drive_meta[meta_no];
            if meta.journal_id == 0 {
                // The drive was indexed without journal support; changes
                // are undetectable and only a rebuild is sound.
                return self.build(provider, path, cancel, progress);
            }
            let drive = DriveInfo {
                letter: meta.letter(),
                index: volume::drive_index(meta.letter()),
            };
            progress(
                meta_no as f32 / self.drive_meta.len() as f32 * 0.5,
                &format!("Scanning changes on {}:\\", drive.letter),
            );

            let since = JournalPosition {
                journal_id: meta.journal_id,
                next_usn: meta.last_usn,
            };
            match provider.read_changes(&drive, &since, cancel) {
                Ok(batch) => {
                    for change in batch.changes {
                        match change {
                            VolumeChange::Removed { file_ref } => {
                                deleted_keys.push(format::ref_key(drive.index, file_ref));
                            }
                            added_change @ VolumeChange::Added { .. } => {
                                added.push((drive.index, added_change));
                            }
                        }
                    }
                    self.drive_meta[meta_no].last_usn = batch.position.next_usn;
                    self.drive_meta[meta_no].journal_id = batch.position.journal_id;
                }
                Err(IndexError::JournalRotated) => {
                    debug!(drive = %drive.letter, "journal rotated; full rebuild");
                    return self.build(provider, path, cancel, progress);
                }
                Err(err) => {
                    warn!(%err, drive = %drive.letter, "journal read failed; full rebuild");
                    return self.build(provider, path, cancel, progress);
                }
            }
        }

        let total_changes = deleted_keys.len() + added.len();
        let mut stats = BuildStats {
            was_incremental: true,
            ..BuildStats::default()
        };
        if total_changes > self.entries.len() / INCREMENTAL_CHANGE_DIVISOR {
            progress(0.0, "Many changes detected, rebuilding...");
            return self.build(provider, path, cancel, progress);
        }
        if total_changes == 0 {
            progress(1.0, "Index is up to date");
            stats.files_indexed = self.entries.len() as u32;
            return Ok(stats);
        }

        progress(0.6, "Applying changes...");

        let deleted_set: HashSet<u64> = deleted_keys.into_iter().collect();
        for key in deleted_set {
            if let Some(idx) = self.ref_to_index.remove(&key) {
                self.remove_trigrams(idx);
                self.entries[idx as usize].file_ref = 0;
                stats.files_removed += 1;
            }
        }

        // A single batch can carry several Added records for one file
        // (create followed by rename); only the last name is live.
        let mut last_added: HashMap<u64, usize> = HashMap::new();
        for (i, (drive_index, change)) in added.iter().enumerate() {
            if let VolumeChange::Added { file_ref, .. } = change {
                last_added.insert(format::ref_key(*drive_index, *file_ref), i);
            }
        }

        for (i, (drive_index, change)) in added.into_iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                return Ok(stats);
            }
            let VolumeChange::Added {
                file_ref,
                parent_ref,
                name,
                attributes,
            } = change
            else {
                continue;
            };
            let key = format::ref_key(drive_index, file_ref);
            if last_added.get(&key) != Some(&i) {
                continue;
            }
            // `(drive, fileRef)` is the primary key: a still-live entry
            // with this ref is superseded by the journal record.
            if let Some(old_idx) = self.ref_to_index.remove(&key) {
                self.remove_trigrams(old_idx);
                self.entries[old_idx as usize].file_ref = 0;
            }
            let idx = self.add_entry(file_ref, parent_ref, &name, attributes, drive_index);
            self.add_trigrams(idx);
            stats.files_added += 1;
        }

        stats.files_indexed = self.entries.len() as u32;
        stats.trigrams_created = self.trigram_postings.len() as u32;

        progress(0.9, "Writing updated index...");
        self.write_to_file(path)?;
        progress(1.0, "Update complete");
        Ok(stats)
    }

    // ── Entry/trigram bookkeeping ───────────────────────────────────

    fn reset(&mut self) {
        self.entries.clear();
        self.string_pool.clear();
        self.trigram_postings.clear();
        self.short_names.clear();
        self.ref_to_index.clear();
        self.drive_meta.clear();
    }

    fn add_entry(
        &mut self,
        file_ref: u64,
        parent_ref: u64,
        name: &str,
        attributes: u8,
        drive_index: u8,
    ) -> u32 {
        let idx = self.entries.len() as u32;
        let name_offset = self.string_pool.len() as u32;
        let before = self.string_pool.len();
        self.string_pool
            .extend(name.encode_utf16().take(u16::MAX as usize));
        let name_len = (self.string_pool.len() - before) as u16;

        self.entries.push(FileEntry {
            file_ref,
            parent_ref,
            name_offset,
            name_len,
            attributes,
            drive_index,
        });
        self.ref_to_index
            .insert(format::ref_key(drive_index, file_ref), idx);
        idx
    }

    fn name_chars(&self, idx: u32) -> Vec<char> {
        let entry = &self.entries[idx as usize];
        let start = entry.name_offset as usize;
        let units = &self.string_pool[start..start + entry.name_len as usize];
        char::decode_utf16(units.iter().copied())
            .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }

    fn add_trigrams(&mut self, idx: u32) {
        let chars = self.name_chars(idx);
        if chars.len() < MIN_TRIGRAM_LEN {
            self.short_names.push(idx);
            return;
        }
        let postings = &mut self.trigram_postings;
        trigram::for_each_trigram(&chars, |key| {
            postings.entry(key).or_default().push(idx);
        });
    }

    fn remove_trigrams(&mut self, idx: u32) {
        let chars = self.name_chars(idx);
        if chars.len() < MIN_TRIGRAM_LEN {
            if let Some(pos) = self.short_names.iter().position(|&i| i == idx) {
                self.short_names.remove(pos);
            }
            return;
        }
        let postings = &mut self.trigram_postings;
        trigram::for_each_trigram(&chars, |key| {
            if let Some(list) = postings.get_mut(&key) {
                if let Some(pos) = list.iter().position(|&i| i == idx) {
                    list.remove(pos);
                }
            }
        });
    }

    /// Reload a previous index into builder state. Tombstones keep their
    /// slots so surviving indices stay stable.
    fn load_existing(&mut self, path: &Path) -> bool {
        let index = match DiskIndex::open(path) {
            Ok(index) => index,
            Err(_) => return false,
        };
        self.reset();
        self.string_pool = index.string_pool();
        self.drive_meta = index.drive_metadata().to_vec();
        self.entries = (0..index.entry_count()).map(|i| index.entry(i)).collect();

        for idx in 0..self.entries.len() as u32 {
            let entry = self.entries[idx as usize];
            if entry.is_tombstone() {
                continue;
            }
            self.ref_to_index
                .insert(format::ref_key(entry.drive_index, entry.file_ref), idx);
            self.add_trigrams(idx);
        }
        true
    }

    // ── Serialization ───────────────────────────────────────────────

    /// Serialize and atomically publish: write `<path>.tmp`, then rename
    /// over the destination.
    fn write_to_file(&mut self, path: &Path) -> Result<(), IndexError> {
        let mut sorted: Vec<(u32, Vec<u32>)> = Vec::with_capacity(self.trigram_postings.len() + 1);

        let mut short_names = std::mem::take(&mut self.short_names);
        if !short_names.is_empty() {
            short_names.sort_unstable();
            short_names.dedup();
            sorted.push((trigram::SHORT_NAME_TRIGRAM, short_names));
        }
        for (key, mut list) in std::mem::take(&mut self.trigram_postings) {
            if list.is_empty() {
                continue;
            }
            list.sort_unstable();
            list.dedup();
            sorted.push((key, list));
        }
        sorted.sort_unstable_by_key(|(key, _)| *key);

        let mut trigram_entries = Vec::with_capacity(sorted.len());
        let mut postings: Vec<u32> = Vec::new();
        for (key, list) in &sorted {
            trigram_entries.push(TrigramEntry {
                trigram: *key,
                posting_offset: postings.len() as u32,
                posting_count: list.len() as u32,
            });
            postings.extend_from_slice(list);
        }

        let header = IndexHeader {
            entry_count: self.entries.len() as u32,
            string_pool_len: self.string_pool.len() as u32,
            trigram_count: trigram_entries.len() as u32,
            posting_len: postings.len() as u32,
            build_timestamp: now_ms(),
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = path.with_extension("idx.tmp");
        {
            let mut out = BufWriter::new(fs::File::create(&tmp_path)?);
            out.write_all(&header.encode())?;
            for entry in &self.entries {
                out.write_all(&entry.encode())?;
            }
            for unit in &self.string_pool {
                out.write_all(&unit.to_le_bytes())?;
            }
            for entry in &trigram_entries {
                out.write_all(&entry.encode())?;
            }
            for posting in &postings {
                out.write_all(&posting.to_le_bytes())?;
            }
            out.write_all(&(self.drive_meta.len() as u32).to_le_bytes())?;
            for meta in &self.drive_meta {
                out.write_all(&meta.encode())?;
            }
            out.flush()?;
        }

        // Windows cannot rename over an existing file; match the original
        // delete-then-move publish.
        let _ = fs::remove_file(path);
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
