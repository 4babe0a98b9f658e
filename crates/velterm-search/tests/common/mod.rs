//! In-memory volume provider: a scriptable filesystem with a change
//! journal, for exercising builds and incremental updates without OS
//! volume access.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use velterm_search::{
    ChangeBatch, DriveInfo, FileRecord, IndexError, JournalPosition, VolumeChange, VolumeProvider,
    ATTR_DIRECTORY,
};

#[derive(Debug, Clone)]
pub struct MemFile {
    pub file_ref: u64,
    pub parent_ref: u64,
    pub name: String,
    pub attributes: u8,
}

pub fn file(file_ref: u64, parent_ref: u64, name: &str) -> MemFile {
    MemFile {
        file_ref,
        parent_ref,
        name: name.to_string(),
        attributes: 0,
    }
}

pub fn dir(file_ref: u64, parent_ref: u64, name: &str) -> MemFile {
    MemFile {
        file_ref,
        parent_ref,
        name: name.to_string(),
        attributes: ATTR_DIRECTORY,
    }
}

/// One drive (`C:`) whose contents and journal are mutated by tests.
pub struct MemoryVolume {
    files: Mutex<Vec<MemFile>>,
    journal: Mutex<Vec<(u64, VolumeChange)>>,
    journal_id: AtomicU64,
    next_usn: AtomicU64,
}

impl MemoryVolume {
    pub fn new(files: Vec<MemFile>) -> Self {
        Self {
            files: Mutex::new(files),
            journal: Mutex::new(Vec::new()),
            journal_id: AtomicU64::new(0x1001),
            next_usn: AtomicU64::new(1),
        }
    }

    pub fn drive(&self) -> DriveInfo {
        DriveInfo {
            letter: 'C',
            index: 2,
        }
    }

    fn record(&self, change: VolumeChange) {
        let usn = self.next_usn.fetch_add(1, Ordering::SeqCst);
        self.journal.lock().unwrap().push((usn, change));
    }

    /// Create a file: mutates the filesystem and journals the event.
    pub fn create(&self, file: MemFile) {
        self.record(VolumeChange::Added {
            file_ref: file.file_ref,
            parent_ref: file.parent_ref,
            name: file.name.clone(),
            attributes: file.attributes,
        });
        self.files.lock().unwrap().push(file);
    }

    /// Delete a file by ref.
    pub fn delete(&self, file_ref: u64) {
        self.files.lock().unwrap().retain(|f| f.file_ref != file_ref);
        self.record(VolumeChange::Removed { file_ref });
    }

    /// Rename in place: journals RENAME_OLD_NAME + RENAME_NEW_NAME.
    pub fn rename(&self, file_ref: u64, new_name: &str) {
        let mut files = self.files.lock().unwrap();
        let Some(entry) = files.iter_mut().find(|f| f.file_ref == file_ref) else {
            return;
        };
        entry.name = new_name.to_string();
        let (parent_ref, attributes) = (entry.parent_ref, entry.attributes);
        drop(files);
        self.record(VolumeChange::Removed { file_ref });
        self.record(VolumeChange::Added {
            file_ref,
            parent_ref,
            name: new_name.to_string(),
            attributes,
        });
    }

    /// Simulate journal recreation: old resume points become invalid.
    pub fn rotate_journal(&self) {
        self.journal_id.fetch_add(1, Ordering::SeqCst);
        self.journal.lock().unwrap().clear();
    }
}

impl VolumeProvider for MemoryVolume {
    fn drives(&self) -> Vec<DriveInfo> {
        vec![self.drive()]
    }

    fn volume_serial(&self, _drive: &DriveInfo) -> u32 {
        0xC0FF_EE00
    }

    fn enumerate(
        &self,
        _drive: &DriveInfo,
        cancel: &AtomicBool,
        on_record: &mut dyn FnMut(FileRecord),
    ) -> Result<(), IndexError> {
        for file in self.files.lock().unwrap().iter() {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            on_record(FileRecord {
                name: file.name.clone(),
                file_ref: file.file_ref,
                parent_ref: file.parent_ref,
                attributes: file.attributes,
            });
        }
        Ok(())
    }

    fn journal_position(&self, _drive: &DriveInfo) -> Option<JournalPosition> {
        Some(JournalPosition {
            journal_id: self.journal_id.load(Ordering::SeqCst),
            next_usn: self.next_usn.load(Ordering::SeqCst),
        })
    }

    fn read_changes(
        &self,
        _drive: &DriveInfo,
        since: &JournalPosition,
        _cancel: &AtomicBool,
    ) -> Result<ChangeBatch, IndexError> {
        if since.journal_id != self.journal_id.load(Ordering::SeqCst) {
            return Err(IndexError::JournalRotated);
        }
        let changes = self
            .journal
            .lock()
            .unwrap()
            .iter()
            .filter(|(usn, _)| *usn >= since.next_usn)
            .map(|(_, change)| change.clone())
            .collect();
        Ok(ChangeBatch {
            changes,
            position: JournalPosition {
                journal_id: self.journal_id.load(Ordering::SeqCst),
                next_usn: self.next_usn.load(Ordering::SeqCst),
            },
        })
    }
}
