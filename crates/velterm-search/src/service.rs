//! Background indexing and the ranked search worker.
//!
//! One indexing thread runs at startup: it loads any existing index for
//! instant availability, then incrementally updates (or rebuilds) and
//! swaps the fresh mapping in under a write lock held only for the swap.
//! Each query runs on its own worker thread carrying a monotonically
//! increasing id; a superseded or cancelled worker exits without
//! delivering, so the callback of the winning query fires exactly once
//! with the complete result set.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::builder::IndexBuilder;
use crate::disk_index::DiskIndex;
use crate::trigram::{pack_trigram, MIN_TRIGRAM_LEN};
use crate::volume::VolumeProvider;

/// Candidate cap before ranking.
const MAX_CANDIDATES: usize = 200;

/// Result cap after ranking.
const MAX_RESULTS: usize = 100;

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub full_path: String,
    pub display_name: String,
    pub is_directory: bool,
    pub score: i32,
    /// Codepoint offset of the match within `display_name`.
    pub match_start: usize,
    pub match_len: usize,
}

/// Callback receiving the final result set; invoked exactly once with
/// `complete = true` for queries that are not superseded.
pub type ResultCallback = Box<dyn FnOnce(Vec<SearchResult>, bool) + Send>;

type SharedIndex = Arc<RwLock<Option<DiskIndex>>>;

/// Filesystem search front end: owns the index lifecycle and the query
/// worker.
pub struct FileSearchService {
    provider: Arc<dyn VolumeProvider>,
    index_path: PathBuf,
    index: SharedIndex,
    indexing: Arc<AtomicBool>,
    index_ready: Arc<AtomicBool>,
    cancel_index: Arc<AtomicBool>,
    cancel_search: Arc<AtomicBool>,
    search_id: Arc<AtomicU64>,
    progress_bits: Arc<AtomicU32>,
    status: Arc<Mutex<String>>,
    index_thread: Option<JoinHandle<()>>,
    search_thread: Option<JoinHandle<()>>,
}

impl FileSearchService {
    pub fn new(provider: Arc<dyn VolumeProvider>, index_path: PathBuf) -> Self {
        Self {
            provider,
            index_path,
            index: Arc::new(RwLock::new(None)),
            indexing: Arc::new(AtomicBool::new(false)),
            index_ready: Arc::new(AtomicBool::new(false)),
            cancel_index: Arc::new(AtomicBool::new(false)),
            cancel_search: Arc::new(AtomicBool::new(false)),
            search_id: Arc::new(AtomicU64::new(0)),
            progress_bits: Arc::new(AtomicU32::new(0)),
            status: Arc::new(Mutex::new(String::new())),
            index_thread: None,
            search_thread: None,
        }
    }

    /// Start the single background indexing pass. No-op when already
    /// running.
    pub fn start_indexing(&mut self) {
        if self.indexing.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel_index.store(false, Ordering::Release);

        let provider = Arc::clone(&self.provider);
        let index = Arc::clone(&self.index);
        let index_path = self.index_path.clone();
        let indexing = Arc::clone(&self.indexing);
        let index_ready = Arc::clone(&self.index_ready);
        let cancel = Arc::clone(&self.cancel_index);
        let progress_bits = Arc::clone(&self.progress_bits);
        let status = Arc::clone(&self.status);

        let handle = std::thread::Builder::new()
            .name("file-index".into())
            .spawn(move || {
                index_thread_main(
                    &*provider,
                    &index,
                    &index_path,
                    &index_ready,
                    &cancel,
                    &progress_bits,
                    &status,
                );
                indexing.store(false, Ordering::Release);
            });
        match handle {
            Ok(handle) => self.index_thread = Some(handle),
            Err(err) => {
                warn!(%err, "failed to spawn index thread");
                self.indexing.store(false, Ordering::Release);
            }
        }
    }

    /// Cancel outstanding work and join both workers.
    pub fn stop(&mut self) {
        self.cancel_index.store(true, Ordering::Release);
        self.cancel_search.store(true, Ordering::Release);
        if let Some(handle) = self.index_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.search_thread.take() {
            let _ = handle.join();
        }
    }

    /// Launch a query. The previous query (if still running) observes the
    /// cancellation flag or its stale id and exits silently.
    pub fn search(&mut self, query: &str, callback: ResultCallback) {
        if query.is_empty() {
            callback(Vec::new(), true);
            return;
        }

        self.cancel_search.store(true, Ordering::Release);
        if let Some(handle) = self.search_thread.take() {
            let _ = handle.join();
        }
        self.cancel_search.store(false, Ordering::Release);

        let id = self.search_id.fetch_add(1, Ordering::AcqRel) + 1;
        let index = Arc::clone(&self.index);
        let cancel = Arc::clone(&self.cancel_search);
        let current_id = Arc::clone(&self.search_id);
        let query = query.to_string();

        let handle = std::thread::Builder::new()
            .name("file-search".into())
            .spawn(move || {
                search_thread_main(&index, &query, id, &current_id, &cancel, callback);
            });
        match handle {
            Ok(handle) => self.search_thread = Some(handle),
            Err(err) => warn!(%err, "failed to spawn search thread"),
        }
    }

    /// Flag the running query to stop without delivering.
    pub fn cancel_search(&self) {
        self.cancel_search.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_indexing(&self) -> bool {
        self.indexing.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_index_ready(&self) -> bool {
        self.index_ready.load(Ordering::Acquire)
    }

    /// Number of entries in the open index (0 when unavailable).
    #[must_use]
    pub fn indexed_count(&self) -> u32 {
        self.index
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(DiskIndex::entry_count))
            .unwrap_or(0)
    }

    /// Build/update progress in `[0, 1]`.
    #[must_use]
    pub fn index_progress(&self) -> f32 {
        f32::from_bits(self.progress_bits.load(Ordering::Acquire))
    }

    /// Human-readable status line for the overlay.
    #[must_use]
    pub fn index_status(&self) -> String {
        self.status.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Drop for FileSearchService {
    fn drop(&mut self) {
        self.stop();
    }
}

#[allow(clippy::too_many_arguments)]
fn index_thread_main(
    provider: &dyn VolumeProvider,
    index: &SharedIndex,
    index_path: &std::path::Path,
    index_ready: &AtomicBool,
    cancel: &AtomicBool,
    progress_bits: &AtomicU32,
    status: &Mutex<String>,
) {
    let set_status = |text: &str| {
        if let Ok(mut guard) = status.lock() {
            guard.clear();
            guard.push_str(text);
        }
    };
    progress_bits.store(0f32.to_bits(), Ordering::Release);

    // Load the previous index first for instant availability.
    if let Ok(existing) = DiskIndex::open(index_path) {
        if let Ok(mut guard) = index.write() {
            *guard = Some(existing);
        }
        index_ready.store(true, Ordering::Release);
        set_status("Index loaded, checking for updates...");
    }

    let mut builder = IndexBuilder::new();
    let mut progress = |fraction: f32, text: &str| {
        progress_bits.store(fraction.to_bits(), Ordering::Release);
        set_status(text);
    };

    let fresh_enough =
        index_ready.load(Ordering::Acquire) && !IndexBuilder::needs_rebuild(index_path);
    let result = if fresh_enough {
        builder.incremental_update(provider, index_path, cancel, &mut progress)
    } else {
        builder.build(provider, index_path, cancel, &mut progress)
    };

    match result {
        Ok(stats) if !cancel.load(Ordering::Relaxed) => {
            // Swap in the fresh mapping; the exclusive lock is held only
            // for the replacement itself.
            match DiskIndex::open(index_path) {
                Ok(fresh) => {
                    let count = fresh.entry_count();
                    if let Ok(mut guard) = index.write() {
                        *guard = Some(fresh);
                    }
                    index_ready.store(true, Ordering::Release);
                    let mut message = format!("Ready - {count} files");
                    if stats.was_incremental && (stats.files_added > 0 || stats.files_removed > 0)
                    {
                        message.push_str(&format!(
                            " (+{}/-{})",
                            stats.files_added, stats.files_removed
                        ));
                    }
                    set_status(&message);
                }
                Err(err) => {
                    warn!(%err, "rebuilt index failed to open");
                    set_status("Search unavailable");
                }
            }
        }
        Ok(_) => debug!("indexing cancelled"),
        Err(err) => {
            // Fail-soft: search stays unavailable until the next start.
            warn!(%err, "index build failed");
            set_status("Search unavailable");
        }
    }
    progress_bits.store(1f32.to_bits(), Ordering::Release);
}

fn search_thread_main(
    index: &SharedIndex,
    query: &str,
    id: u64,
    current_id: &AtomicU64,
    cancel: &AtomicBool,
    callback: ResultCallback,
) {
    let Ok(guard) = index.read() else {
        callback(Vec::new(), true);
        return;
    };
    let Some(index) = guard.as_ref() else {
        callback(Vec::new(), true);
        return;
    };

    let mut stale =
        || cancel.load(Ordering::Relaxed) || current_id.load(Ordering::Acquire) != id;
    if let Some(results) = query_index(index, query, &mut stale) {
        callback(results, true);
    }
    // A superseded or cancelled worker exits without delivering.
}

/// Run the ranked query pipeline over an open index.
///
/// `should_abort` is polled every candidate; returning `true` abandons the
/// query and yields `None` (used by the worker to exit when superseded).
pub fn query_index(
    index: &DiskIndex,
    query: &str,
    should_abort: &mut dyn FnMut() -> bool,
) -> Option<Vec<SearchResult>> {
    let query_chars: Vec<char> = query.chars().map(fold_char).collect();
    if query_chars.is_empty() {
        return Some(Vec::new());
    }

    let mut results: Vec<SearchResult> = Vec::new();
    let mut consider = |idx: u32, results: &mut Vec<SearchResult>| {
        if results.len() >= MAX_CANDIDATES || idx >= index.entry_count() {
            return;
        }
        let entry = index.entry(idx);
        if entry.is_tombstone() {
            return;
        }
        let name = index.name(idx);
        let name_chars: Vec<char> = name.chars().collect();
        let Some(match_start) = find_match_position(&name_chars, &query_chars) else {
            return;
        };
        results.push(SearchResult {
            full_path: index.build_full_path(idx),
            display_name: name,
            is_directory: entry.is_directory(),
            score: calculate_score(name_chars.len(), query_chars.len(), match_start),
            match_start,
            match_len: query_chars.len(),
        });
    };

    if query_chars.len() >= MIN_TRIGRAM_LEN {
        for idx in trigram_candidates(index, &query_chars) {
            if should_abort() {
                return None;
            }
            consider(idx, &mut results);
            if results.len() >= MAX_CANDIDATES {
                break;
            }
        }
    } else {
        // Short query: the short-name bucket first, then a bounded linear
        // scan over the remaining entries.
        for idx in index.short_name_indices() {
            if should_abort() {
                return None;
            }
            consider(idx, &mut results);
        }
        let mut idx = 0u32;
        while idx < index.entry_count() && results.len() < MAX_CANDIDATES {
            if should_abort() {
                return None;
            }
            if index.entry(idx).name_len as usize >= MIN_TRIGRAM_LEN {
                consider(idx, &mut results);
            }
            idx += 1;
        }
    }

    if should_abort() {
        return None;
    }

    results.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.display_name.cmp(&b.display_name))
            .then_with(|| a.full_path.cmp(&b.full_path))
    });
    results.truncate(MAX_RESULTS);
    Some(results)
}

/// Intersect the posting lists of every overlapping query trigram. Any
/// absent trigram short-circuits to an empty set.
fn trigram_candidates(index: &DiskIndex, query: &[char]) -> Vec<u32> {
    let mut result: Option<Vec<u32>> = None;
    for window in query.windows(3) {
        let postings = index.postings(pack_trigram(window[0], window[1], window[2]));
        if postings.is_empty() {
            return Vec::new();
        }
        result = Some(match result {
            None => postings,
            Some(current) => intersect_sorted(&current, &postings),
        });
        if matches!(result.as_deref(), Some([])) {
            return Vec::new();
        }
    }
    result.unwrap_or_default()
}

fn intersect_sorted(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }
    out
}

/// Case-insensitive substring search over codepoints. This step corrects
/// trigram hash collisions.
fn find_match_position(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&start| {
        needle
            .iter()
            .zip(&haystack[start..])
            .all(|(n, h)| *n == fold_char(*h))
    })
}

fn fold_char(ch: char) -> char {
    ch.to_lowercase().next().unwrap_or(ch)
}

/// Ranking: base 100, exact-length +50, prefix +30, shorter names
/// preferred by up to -20.
fn calculate_score(name_len: usize, query_len: usize, match_start: usize) -> i32 {
    let mut score = 100;
    if name_len == query_len {
        score += 50;
    }
    if match_start == 0 {
        score += 30;
    }
    let len_diff = name_len.saturating_sub(query_len) as i32;
    score - len_diff.min(20)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_prefers_exact_then_prefix_then_short() {
        let exact = calculate_score(4, 4, 0);
        let prefix = calculate_score(8, 4, 0);
        let infix = calculate_score(8, 4, 2);
        let long_infix = calculate_score(60, 4, 2);
        assert!(exact > prefix);
        assert!(prefix > infix);
        assert!(infix > long_infix);
        assert_eq!(exact, 180);
        assert_eq!(prefix, 126);
        // The shortness penalty saturates at 20.
        assert_eq!(long_infix, 80);
    }

    #[test]
    fn match_position_is_case_insensitive() {
        let hay: Vec<char> = "ReadMe.MD".chars().collect();
        let needle: Vec<char> = "readme".chars().collect();
        assert_eq!(find_match_position(&hay, &needle), Some(0));
        let needle2: Vec<char> = "me.md".chars().collect();
        assert_eq!(find_match_position(&hay, &needle2), Some(4));
        let missing: Vec<char> = "zz".chars().collect();
        assert_eq!(find_match_position(&hay, &missing), None);
    }

    #[test]
    fn intersect_sorted_keeps_common_ascending() {
        assert_eq!(intersect_sorted(&[1, 3, 5, 9], &[2, 3, 9]), vec![3, 9]);
        assert_eq!(intersect_sorted(&[1, 2], &[3, 4]), Vec::<u32>::new());
    }
}
