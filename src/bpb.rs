//! The Boot Parameter Block and the geometry derived from it.
//!
//! Follows the legacy DOS 3.3 BPB layout at offset `0x0B` of sector 0. Only the fields
//! this tool needs are exposed; the jump instruction, OEM name and boot code are not
//! interpreted.

use crate::codec::{read_u16_le, read_u32_le};
use crate::error::Error;

/// Offset of the first BPB field within sector 0.
const BPB_BASE: usize = 0x0B;

/// The decoded Boot Parameter Block.
///
/// Stored as plain fields rather than as a view into the image buffer: the BPB is read
/// once at the start of a scan and never written back.
#[derive(Debug, Clone, Copy)]
pub struct Bpb {
    /// Bytes per sector (offset 0x0B, 2 bytes).
    pub bytes_per_sector: u16,
    /// Sectors per cluster (offset 0x0D, 1 byte).
    pub sectors_per_cluster: u8,
    /// Reserved sector count, including the boot sector (offset 0x0E, 2 bytes).
    pub reserved_sectors: u16,
    /// Number of FAT copies (offset 0x10, 1 byte).
    pub num_fats: u8,
    /// Maximum number of root-directory entries (offset 0x11, 2 bytes).
    pub root_dir_entries: u16,
    /// Total sector count (offset 0x13, 2 bytes; falls back to the 32-bit field at offset
    /// 0x20 when the 16-bit field is zero, as real-world images sometimes do for volumes
    /// too large to fit it).
    pub total_sectors: u32,
    /// Sectors per FAT (offset 0x16, 2 bytes).
    pub sectors_per_fat: u16,
}

impl Bpb {
    /// Parses a BPB from sector 0 of the image buffer.
    pub fn parse(image: &[u8]) -> Result<Self, Error> {
        if image.len() < 512 {
            return Err(Error::BadBootSector(format!(
                "image too small to contain a boot sector: {} bytes",
                image.len()
            )));
        }

        let bytes_per_sector = read_u16_le(image, BPB_BASE);
        let sectors_per_cluster = image[BPB_BASE + 2];
        let reserved_sectors = read_u16_le(image, BPB_BASE + 3);
        let num_fats = image[BPB_BASE + 5];
        let root_dir_entries = read_u16_le(image, BPB_BASE + 6);
        let total_sectors_16 = read_u16_le(image, BPB_BASE + 8);
        let sectors_per_fat = read_u16_le(image, BPB_BASE + 0x0B);
        let total_sectors_32 = read_u32_le(image, BPB_BASE + 0x15);

        let total_sectors = if total_sectors_16 == 0 {
            total_sectors_32
        } else {
            total_sectors_16 as u32
        };

        let bpb = Bpb {
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            num_fats,
            root_dir_entries,
            total_sectors,
            sectors_per_fat,
        };
        bpb.validate()?;
        Ok(bpb)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.bytes_per_sector == 0 {
            return Err(Error::BadBootSector("bytesPerSector is zero".into()));
        }
        if self.sectors_per_cluster == 0 {
            return Err(Error::BadBootSector("sectorsPerCluster is zero".into()));
        }
        if self.num_fats == 0 {
            return Err(Error::BadBootSector("numFats is zero".into()));
        }
        if self.sectors_per_fat == 0 {
            return Err(Error::BadBootSector("sectorsPerFat is zero".into()));
        }
        if self.total_sectors == 0 {
            return Err(Error::BadBootSector("totalSectors is zero".into()));
        }
        Ok(())
    }
}

/// Geometry derived once from the BPB: byte offsets and sizes used by every other
/// component. All fields are pure functions of the BPB and are recomputed here rather
/// than cached as magic constants scattered through the codebase.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    pub cluster_size: u32,
    pub fat_base: u32,
    pub root_dir_base: u32,
    pub data_base: u32,
    pub total_clusters: u32,
    pub root_dir_entries: u16,
    pub num_fats: u8,
    pub sectors_per_fat: u16,
    pub bytes_per_sector: u16,
}

impl Geometry {
    pub fn from_bpb(bpb: &Bpb) -> Self {
        let cluster_size = bpb.bytes_per_sector as u32 * bpb.sectors_per_cluster as u32;
        let fat_base = bpb.reserved_sectors as u32 * bpb.bytes_per_sector as u32;
        let root_dir_base =
            fat_base + bpb.num_fats as u32 * bpb.sectors_per_fat as u32 * bpb.bytes_per_sector as u32;
        let data_base = root_dir_base + bpb.root_dir_entries as u32 * 32;
        let total_clusters = bpb.total_sectors / bpb.sectors_per_cluster as u32;

        Geometry {
            cluster_size,
            fat_base,
            root_dir_base,
            data_base,
            total_clusters,
            root_dir_entries: bpb.root_dir_entries,
            num_fats: bpb.num_fats,
            sectors_per_fat: bpb.sectors_per_fat,
            bytes_per_sector: bpb.bytes_per_sector,
        }
    }

    /// Byte address of cluster `n`. `n == 0` is a convention used only to obtain the
    /// root-directory entry stream; it is never a valid data cluster otherwise.
    pub fn cluster_to_addr(&self, n: u32) -> usize {
        if n == 0 {
            self.root_dir_base as usize
        } else {
            self.data_base as usize + (n - 2) as usize * self.cluster_size as usize
        }
    }

    /// Number of 32-byte directory entries that fit in one cluster.
    pub fn entries_per_cluster(&self) -> usize {
        self.cluster_size as usize / 32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_bpb_bytes() -> Vec<u8> {
        let mut buf = vec![0u8; 512];
        // bytes per sector = 512
        buf[0x0B..0x0D].copy_from_slice(&512u16.to_le_bytes());
        // sectors per cluster = 1
        buf[0x0D] = 1;
        // reserved sectors = 1
        buf[0x0E..0x10].copy_from_slice(&1u16.to_le_bytes());
        // num fats = 2
        buf[0x10] = 2;
        // root dir entries = 224
        buf[0x11..0x13].copy_from_slice(&224u16.to_le_bytes());
        // total sectors (16-bit) = 2880 (a 1.44MB floppy)
        buf[0x13..0x15].copy_from_slice(&2880u16.to_le_bytes());
        // sectors per fat = 9
        buf[0x16..0x18].copy_from_slice(&9u16.to_le_bytes());
        buf
    }

    #[test]
    fn parses_a_144mb_floppy_bpb() {
        let buf = minimal_bpb_bytes();
        let bpb = Bpb::parse(&buf).unwrap();
        assert_eq!(bpb.bytes_per_sector, 512);
        assert_eq!(bpb.sectors_per_cluster, 1);
        assert_eq!(bpb.num_fats, 2);
        assert_eq!(bpb.total_sectors, 2880);

        let geo = Geometry::from_bpb(&bpb);
        assert_eq!(geo.cluster_size, 512);
        assert_eq!(geo.fat_base, 512);
        // root dir base = fat_base + 2*9*512 = 512 + 9216 = 9728
        assert_eq!(geo.root_dir_base, 9728);
        // data base = root_dir_base + 224*32 = 9728 + 7168 = 16896
        assert_eq!(geo.data_base, 16896);
        assert_eq!(geo.total_clusters, 2880);
    }

    #[test]
    fn rejects_zero_bytes_per_sector() {
        let mut buf = minimal_bpb_bytes();
        buf[0x0B..0x0D].copy_from_slice(&0u16.to_le_bytes());
        assert!(matches!(Bpb::parse(&buf), Err(Error::BadBootSector(_))));
    }

    #[test]
    fn rejects_image_too_small() {
        let buf = vec![0u8; 16];
        assert!(matches!(Bpb::parse(&buf), Err(Error::BadBootSector(_))));
    }
}
