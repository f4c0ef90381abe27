//! Crate-wide error type.
//!
//! Only [`Error::BadBootSector`] (and the ambient I/O/mapping variants) ever abort a scan.
//! Every other condition is folded into a [`crate::report::Report`] as a
//! [`crate::report::Finding`] instead of being propagated as an `Err`.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The boot parameter block fails basic plausibility checks (zero bytes-per-sector,
    /// impossible FAT placement, etc). Fatal: there is no geometry to scan against.
    #[error("bad boot sector: {0}")]
    BadBootSector(String),

    #[error("failed to map {path:?}: {source}")]
    Map {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
