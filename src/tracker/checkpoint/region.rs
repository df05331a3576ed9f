use embedded_storage::{ReadStorage, Storage};

use super::super::config::CHECKPOINT_RECORD_LEN;
use super::super::ports::{CheckpointRecord, PersistError, PersistenceIo};

/// Checkpoint record slot at a fixed offset of any `embedded-storage` device.
pub struct StorageRegion<S> {
    storage: S,
    offset: u32,
}

impl<S: ReadStorage + Storage> StorageRegion<S> {
    pub fn new(storage: S, offset: u32) -> Self {
        Self { storage, offset }
    }

    /// Places the record at the start of the last `sector_size` bytes.
    pub fn last_sector(storage: S, sector_size: u32) -> Self {
        let capacity = storage.capacity() as u32;
        let offset = capacity.saturating_sub(sector_size);
        Self { storage, offset }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }
}

impl<S: ReadStorage + Storage> PersistenceIo for StorageRegion<S> {
    fn load(&mut self) -> Result<Option<CheckpointRecord>, PersistError> {
        let mut record = [0u8; CHECKPOINT_RECORD_LEN];
        self.storage
            .read(self.offset, &mut record)
            .map_err(|_| PersistError::Read)?;
        if record.iter().all(|&byte| byte == 0xFF) {
            return Ok(None);
        }
        Ok(Some(record))
    }

    fn save(&mut self, record: &CheckpointRecord) -> Result<(), PersistError> {
        if matches!(self.load(), Ok(Some(stored)) if stored == *record) {
            return Ok(());
        }
        self.storage
            .write(self.offset, record)
            .map_err(|_| PersistError::Write)
    }

    fn erase(&mut self) -> Result<(), PersistError> {
        let blank = [0xFFu8; CHECKPOINT_RECORD_LEN];
        self.storage
            .write(self.offset, &blank)
            .map_err(|_| PersistError::Write)
    }
}
