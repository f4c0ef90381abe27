//! Little-endian byte codec.
//!
//! Every multi-byte field in the image (BPB fields, FAT entries, directory-entry
//! `startCluster`/`fileSize`) is little-endian. This module is the only place that
//! reasons about endianness; every other component reads and writes fields through it.

/// Reads a 16-bit little-endian field at `offset`.
pub fn read_u16_le(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

/// Writes a 16-bit little-endian field at `offset`.
pub fn write_u16_le(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

/// Reads a 32-bit little-endian field at `offset`.
pub fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

/// Writes a 32-bit little-endian field at `offset`.
pub fn write_u32_le(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
