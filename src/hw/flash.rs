//! Flash-backed [`PersistenceStore`], the last 64 KiB sector of
//! external QSPI flash shared by the governor-name and governor-params
//! records defined in [`crate::persist`].
//!
//! Wraps a raw peripheral behind a narrow trait impl
//! (`embedded_storage::nor_flash::NorFlash`), with the
//! read-modify-erase-write sector discipline handled entirely in
//! [`crate::persist`].

use core::cell::RefCell;

use embedded_storage::nor_flash::{NorFlash, ReadNorFlash};

use crate::collab::{PersistSlot, PersistenceStore};
use crate::error::PersistError;
use crate::persist::{self, SECTOR_LEN};

/// Wraps a `NorFlash + ReadNorFlash` implementation (on target, the XIP
/// flash exposed by `rp2040-hal`'s flash helpers) and exposes the two fixed
/// [`PersistSlot`]s over it. The flash handle sits behind a `RefCell` so
/// [`PersistenceStore::load`] (whose signature takes `&self`, matching the
/// rest of this crate's collaborator traits) can still issue a read.
pub struct FlashPersistenceStore<F> {
    flash: RefCell<F>,
    /// Absolute flash address of the shared sector's first byte.
    sector_base: u32,
}

impl<F> FlashPersistenceStore<F>
where
    F: NorFlash + ReadNorFlash,
{
    pub fn new(flash: F, sector_base: u32) -> Self {
        FlashPersistenceStore { flash: RefCell::new(flash), sector_base }
    }

    fn read_sector(&self) -> Result<[u8; SECTOR_LEN], PersistError> {
        let mut sector = [0u8; SECTOR_LEN];
        self.flash
            .borrow_mut()
            .read(self.sector_base, &mut sector)
            .map_err(|_| PersistError::FlashIo)?;
        Ok(sector)
    }
}

impl<F> PersistenceStore for FlashPersistenceStore<F>
where
    F: NorFlash + ReadNorFlash,
{
    fn load(&self, slot: PersistSlot, out: &mut [u8]) -> Option<usize> {
        let sector = self.read_sector().ok()?;
        let offset = persist::offset_of(slot);
        match slot {
            PersistSlot::GovernorName => {
                let end = (offset + persist::GOVERNOR_NAME_RECORD_LEN).min(SECTOR_LEN);
                let decoded = persist::decode_governor_name(&sector[offset..end]).ok()?;
                let bytes = decoded.as_bytes();
                if bytes.len() > out.len() {
                    return None;
                }
                out[..bytes.len()].copy_from_slice(bytes);
                Some(bytes.len())
            }
            PersistSlot::GovernorParams => {
                let decoded = persist::decode_params_blob(&sector[offset..]).ok()?;
                if decoded.len() > out.len() {
                    return None;
                }
                out[..decoded.len()].copy_from_slice(decoded);
                Some(decoded.len())
            }
        }
    }

    fn save(&mut self, slot: PersistSlot, bytes: &[u8]) -> Result<(), PersistError> {
        let mut sector = self.read_sector()?;

        match slot {
            PersistSlot::GovernorName => {
                let name = core::str::from_utf8(bytes).map_err(|_| PersistError::BufferTooSmall)?;
                let record = persist::encode_governor_name(name);
                persist::stage_record(&mut sector, persist::offset_of(slot), &record)?;
            }
            PersistSlot::GovernorParams => {
                let mut buf = [0u8; 256];
                let len = persist::encode_params_blob(bytes, &mut buf)?;
                persist::stage_record(&mut sector, persist::offset_of(slot), &buf[..len])?;
            }
        }

        let flash = self.flash.get_mut();
        flash
            .erase(self.sector_base, self.sector_base + SECTOR_LEN as u32)
            .map_err(|_| PersistError::FlashIo)?;
        flash
            .write(self.sector_base, &sector)
            .map_err(|_| PersistError::FlashIo)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_storage::nor_flash::{ErrorType, NorFlashError, NorFlashErrorKind};

    #[derive(Debug)]
    struct MockFlashError;
    impl NorFlashError for MockFlashError {
        fn kind(&self) -> NorFlashErrorKind {
            NorFlashErrorKind::Other
        }
    }

    struct MockFlash {
        data: [u8; SECTOR_LEN],
    }
    impl ErrorType for MockFlash {
        type Error = MockFlashError;
    }
    impl ReadNorFlash for MockFlash {
        const READ_SIZE: usize = 1;
        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let off = offset as usize;
            bytes.copy_from_slice(&self.data[off..off + bytes.len()]);
            Ok(())
        }
        fn capacity(&self) -> usize {
            SECTOR_LEN
        }
    }
    impl NorFlash for MockFlash {
        const WRITE_SIZE: usize = 1;
        const ERASE_SIZE: usize = SECTOR_LEN;
        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            for b in &mut self.data[from as usize..to as usize] {
                *b = 0xFF;
            }
            Ok(())
        }
        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            let off = offset as usize;
            self.data[off..off + bytes.len()].copy_from_slice(bytes);
            Ok(())
        }
    }

    #[test]
    fn save_then_load_round_trips_governor_name() {
        let flash = MockFlash { data: [0xFFu8; SECTOR_LEN] };
        let mut store = FlashPersistenceStore::new(flash, 0);
        store.save(PersistSlot::GovernorName, b"schedutil").unwrap();
        let mut out = [0u8; 32];
        let n = store.load(PersistSlot::GovernorName, &mut out).unwrap();
        assert_eq!(&out[..n], b"schedutil");
    }

    #[test]
    fn save_preserves_other_slot_across_rewrite() {
        let flash = MockFlash { data: [0xFFu8; SECTOR_LEN] };
        let mut store = FlashPersistenceStore::new(flash, 0);
        let params = crate::governor::rp2040_perf::Params::DEFAULT.to_bytes();
        store.save(PersistSlot::GovernorParams, &params).unwrap();
        store.save(PersistSlot::GovernorName, b"ondemand").unwrap();

        let mut out = [0u8; 64];
        let n = store.load(PersistSlot::GovernorParams, &mut out).unwrap();
        assert_eq!(&out[..n], &params[..]);
    }

    #[test]
    fn load_returns_none_when_sector_is_blank() {
        let flash = MockFlash { data: [0xFFu8; SECTOR_LEN] };
        let store = FlashPersistenceStore::new(flash, 0);
        let mut out = [0u8; 32];
        assert!(store.load(PersistSlot::GovernorName, &mut out).is_none());
    }
}
