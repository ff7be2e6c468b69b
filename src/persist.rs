//! Persistent state layout: the chosen governor name and the
//! opaque governor-parameter blob, both living in the last 64 KiB sector of
//! external flash, sharing one sector so a save must read-modify-erase-
//! write the whole thing to avoid clobbering the other record.
//!
//! This module is pure byte-level framing/CRC logic, independent of any
//! flash driver, so it is fully unit-testable. The `hardware` feature's flash driver
//! ([`crate::hw::flash`]) is the only thing that actually erases/programs a
//! sector; it calls into the functions here to build and parse the bytes it
//! writes.

use crate::collab::PersistSlot;
use crate::error::PersistError;

/// Byte offset of the governor-name record within the shared sector.
pub const GOVERNOR_NAME_OFFSET: usize = 0;
/// Byte offset of the governor-parameter blob within the shared sector.
pub const GOVERNOR_PARAMS_OFFSET: usize = 0x100;
/// Size of the sector both records share.
pub const SECTOR_LEN: usize = 64 * 1024;

/// Magic identifying a governor-name record.
pub const GOVERNOR_NAME_MAGIC: u32 = 0x4756_4F47;
/// Magic identifying a governor-parameter blob record. Bump this if the
/// blob's internal layout ever changes.
pub const GOVERNOR_PARAMS_MAGIC: u32 = 0x5250_5050;

/// Governor-name record version.
pub const GOVERNOR_NAME_VERSION: u16 = 1;
/// Length of the `name` field inside the governor-name record.
pub const NAME_FIELD_LEN: usize = 56;

/// CRC seed used by every record in this module.
pub const CRC_SEED: u32 = 0xA5A5_A5A5;

/// `(crc << 7) XOR byte`, seeded [`CRC_SEED`], computed over every byte of
/// the record preceding its own CRC field.
pub fn crc(bytes: &[u8]) -> u32 {
    let mut crc = CRC_SEED;
    for &b in bytes {
        crc = (crc << 7) ^ (b as u32);
    }
    crc
}

/// `{magic, version, name[56], crc}` record, serialized little-endian.
/// Total length: 4 (magic) + 2 (version) + 56 (name) + 4 (crc) = 66 bytes.
pub const GOVERNOR_NAME_RECORD_LEN: usize = 4 + 2 + NAME_FIELD_LEN + 4;

/// Build the governor-name record's bytes for `name` (truncated/padded to
/// [`NAME_FIELD_LEN`] with zero bytes).
pub fn encode_governor_name(name: &str) -> [u8; GOVERNOR_NAME_RECORD_LEN] {
    let mut buf = [0u8; GOVERNOR_NAME_RECORD_LEN];
    buf[0..4].copy_from_slice(&GOVERNOR_NAME_MAGIC.to_le_bytes());
    buf[4..6].copy_from_slice(&GOVERNOR_NAME_VERSION.to_le_bytes());
    let name_bytes = name.as_bytes();
    let n = name_bytes.len().min(NAME_FIELD_LEN);
    buf[6..6 + n].copy_from_slice(&name_bytes[..n]);
    let crc_val = crc(&buf[..GOVERNOR_NAME_RECORD_LEN - 4]);
    buf[GOVERNOR_NAME_RECORD_LEN - 4..].copy_from_slice(&crc_val.to_le_bytes());
    buf
}

/// Parse and CRC-check a governor-name record. Returns the name with
/// trailing zero bytes trimmed, or an error describing why the record was
/// rejected.
pub fn decode_governor_name(bytes: &[u8]) -> Result<heapless::String<NAME_FIELD_LEN>, PersistError> {
    if bytes.len() < GOVERNOR_NAME_RECORD_LEN {
        return Err(PersistError::BufferTooSmall);
    }
    let mut magic_b = [0u8; 4];
    magic_b.copy_from_slice(&bytes[0..4]);
    if u32::from_le_bytes(magic_b) != GOVERNOR_NAME_MAGIC {
        return Err(PersistError::BadMagic);
    }
    let body = &bytes[..GOVERNOR_NAME_RECORD_LEN - 4];
    let mut crc_b = [0u8; 4];
    crc_b.copy_from_slice(&bytes[GOVERNOR_NAME_RECORD_LEN - 4..GOVERNOR_NAME_RECORD_LEN]);
    if crc(body) != u32::from_le_bytes(crc_b) {
        return Err(PersistError::CrcMismatch);
    }
    let name_bytes = &bytes[6..6 + NAME_FIELD_LEN];
    let end = name_bytes.iter().position(|&b| b == 0).unwrap_or(NAME_FIELD_LEN);
    let s = core::str::from_utf8(&name_bytes[..end]).map_err(|_| PersistError::CrcMismatch)?;
    heapless::String::try_from(s).map_err(|_| PersistError::BufferTooSmall)
}

/// `{magic, length, bytes[length], crc}` record for the opaque governor
/// parameter blob. `out` must be at least `4 + 4 + payload.len() + 4` bytes;
/// returns the number of bytes written.
pub fn encode_params_blob(payload: &[u8], out: &mut [u8]) -> Result<usize, PersistError> {
    let total = 4 + 4 + payload.len() + 4;
    if out.len() < total {
        return Err(PersistError::BufferTooSmall);
    }
    out[0..4].copy_from_slice(&GOVERNOR_PARAMS_MAGIC.to_le_bytes());
    out[4..8].copy_from_slice(&(payload.len() as u32).to_le_bytes());
    out[8..8 + payload.len()].copy_from_slice(payload);
    let crc_val = crc(&out[..8 + payload.len()]);
    out[8 + payload.len()..total].copy_from_slice(&crc_val.to_le_bytes());
    Ok(total)
}

/// Parse and CRC-check a params blob record, returning the slice of `bytes`
/// holding the payload.
pub fn decode_params_blob(bytes: &[u8]) -> Result<&[u8], PersistError> {
    if bytes.len() < 8 {
        return Err(PersistError::BufferTooSmall);
    }
    let mut magic_b = [0u8; 4];
    magic_b.copy_from_slice(&bytes[0..4]);
    if u32::from_le_bytes(magic_b) != GOVERNOR_PARAMS_MAGIC {
        return Err(PersistError::BadMagic);
    }
    let mut len_b = [0u8; 4];
    len_b.copy_from_slice(&bytes[4..8]);
    let len = u32::from_le_bytes(len_b) as usize;
    let total = 8 + len + 4;
    if bytes.len() < total {
        return Err(PersistError::BufferTooSmall);
    }
    let body = &bytes[..8 + len];
    let mut crc_b = [0u8; 4];
    crc_b.copy_from_slice(&bytes[8 + len..total]);
    if crc(body) != u32::from_le_bytes(crc_b) {
        return Err(PersistError::CrcMismatch);
    }
    Ok(&bytes[8..8 + len])
}

/// Write `record_bytes` into `sector` at `offset`, preserving every other
/// byte of the sector. The actual flash
/// erase/program cycle is the caller's job (it owns the physical sector);
/// this function only mutates the in-memory mirror the caller then writes
/// back.
pub fn stage_record(sector: &mut [u8; SECTOR_LEN], offset: usize, record_bytes: &[u8]) -> Result<(), PersistError> {
    if offset + record_bytes.len() > SECTOR_LEN {
        return Err(PersistError::BufferTooSmall);
    }
    sector[offset..offset + record_bytes.len()].copy_from_slice(record_bytes);
    Ok(())
}

/// Map a [`PersistSlot`] to its byte offset within the shared sector.
pub fn offset_of(slot: PersistSlot) -> usize {
    match slot {
        PersistSlot::GovernorName => GOVERNOR_NAME_OFFSET,
        PersistSlot::GovernorParams => GOVERNOR_PARAMS_OFFSET,
    }
}
