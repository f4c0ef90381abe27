//! Image acquisition. Maps a path into a `&mut [u8]`-yielding guard and flushes it back
//! to disk on drop. A pure I/O collaborator: it carries no FAT12 semantics, and the core
//! only ever sees the `&mut [u8]` this hands out.

use std::fs::OpenOptions;
use std::path::Path;

use memmap2::MmapMut;

use crate::error::{Error, Result};

/// An open, memory-mapped image file. Flushes to disk when dropped (or explicitly via
/// [`MappedImage::flush`]).
pub struct MappedImage {
    mmap: MmapMut,
}

impl MappedImage {
    /// Opens `path` read-write and maps it entirely into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| Error::Map {
                path: path.to_path_buf(),
                source,
            })?;

        // Safety: the mapping is exclusively owned by this process for its lifetime;
        // nothing else is expected to hold the file open concurrently.
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|source| Error::Map {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(MappedImage { mmap })
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    /// Flushes pending writes back to the backing file.
    pub fn flush(&self) -> Result<()> {
        self.mmap.flush().map_err(Error::Io)
    }
}
