use esp_storage::FlashStorage;

use crate::tracker::checkpoint::StorageRegion;

pub type FlashCheckpointIo<'d> = StorageRegion<FlashStorage<'d>>;

/// Checkpoint record in the last flash sector.
pub fn checkpoint_io(flash_peripheral: esp_hal::peripherals::FLASH<'_>) -> FlashCheckpointIo<'_> {
    let flash = FlashStorage::new(flash_peripheral).multicore_auto_park();
    StorageRegion::last_sector(flash, FlashStorage::SECTOR_SIZE)
}
