//! ISO-9660 images for the NoCloud datasource
//!
//! A small writer: a single root directory of regular files,
//! optionally with Rock Ridge names and permissions, plus a reader that walks
//! the same layout back.
//!
//! ```no_run
//! use cidata_tool::iso::{FinalizeOptions, IsoWriter, SECTOR_SIZE};
//!
//! let file = std::fs::File::create("seed.iso")?;
//! let mut iso = IsoWriter::create(file, SECTOR_SIZE)?;
//! iso.mkdir("/")?;
//! iso.add_file("/user-data", b"#cloud-config\n")?;
//! iso.finalize(&FinalizeOptions::cidata())?;
//! # Ok::<(), cidata_tool::iso::IsoError>(())
//! ```

mod reader;
mod records;
mod rock_ridge;
mod writer;

pub use reader::{CidataImage, ImageFile, open_image, read_image};
pub use records::Timestamp;
pub use writer::{FinalizeOptions, IsoFile, IsoWriter, iso_identifier};

use thiserror::Error;

/// The only supported sector (and logical block) size
pub const SECTOR_SIZE: u32 = 2048;

/// Volume label cloud-init's NoCloud datasource looks for
pub const CIDATA_VOLUME_ID: &str = "cidata";

/// Sectors reserved for the system area ahead of the volume descriptors
pub const SYSTEM_AREA_SECTORS: u32 = 16;

/// Errors from building or reading an image
#[derive(Error, Debug)]
pub enum IsoError {
    #[error("invalid sector size {0}, only {SECTOR_SIZE} is supported")]
    InvalidSectorSize(u32),

    #[error("root directory has not been created")]
    NoRootDirectory,

    #[error("nested directories are not supported: {0}")]
    NestedDirectory(String),

    #[error("entry already exists: {0}")]
    DuplicateEntry(String),

    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("invalid volume identifier {0:?}: must be at most 32 ASCII characters")]
    InvalidVolumeIdentifier(String),

    #[error("not an ISO-9660 image: {0}")]
    NotAnIsoImage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record encoding error: {0}")]
    Encoding(#[from] binrw::Error),
}
