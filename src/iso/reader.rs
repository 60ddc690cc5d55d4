//! Read back the root directory of an ISO-9660 image

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use binrw::BinRead;

use super::records::{DirectoryRecord, PrimaryVolumeDescriptor};
use super::{IsoError, SECTOR_SIZE, SYSTEM_AREA_SECTORS, rock_ridge};

/// A file found in the root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    /// Rock Ridge name when present, otherwise the ISO identifier without version
    pub name: String,
    pub data: Vec<u8>,
}

/// Contents of a cidata image
#[derive(Debug, Clone)]
pub struct CidataImage {
    pub volume_identifier: String,
    /// Whether the root carries a SUSP indicator
    pub rock_ridge: bool,
    pub files: Vec<ImageFile>,
}

impl CidataImage {
    /// Look up a root file by name
    pub fn file(&self, name: &str) -> Option<&ImageFile> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn file_names(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.name.as_str()).collect()
    }
}

/// Open and read an image from disk
pub fn open_image(path: impl AsRef<Path>) -> Result<CidataImage, IsoError> {
    let mut reader = BufReader::new(File::open(path)?);
    read_image(&mut reader)
}

/// Read the volume label and root files of an image
pub fn read_image<R: Read + Seek>(reader: &mut R) -> Result<CidataImage, IsoError> {
    reader.seek(SeekFrom::Start(
        u64::from(SYSTEM_AREA_SECTORS) * u64::from(SECTOR_SIZE),
    ))?;
    let pvd = PrimaryVolumeDescriptor::read(reader).map_err(|e| match e {
        binrw::Error::BadMagic { .. } => {
            IsoError::NotAnIsoImage("no primary volume descriptor".to_string())
        }
        other => IsoError::Encoding(other),
    })?;

    let block_size = u64::from(pvd.logical_block_size.get());
    if block_size == 0 {
        return Err(IsoError::NotAnIsoImage("zero logical block size".to_string()));
    }

    let root = &pvd.root_directory;
    let directory = read_extent(reader, root.extent.get(), root.data_length.get(), block_size)?;

    let mut has_rock_ridge = false;
    let mut files = Vec::new();
    let mut offset = 0usize;
    while offset < directory.len() {
        let len = directory[offset] as usize;
        if len == 0 {
            // Rest of this sector is padding
            offset = (offset / block_size as usize + 1) * block_size as usize;
            continue;
        }
        let bytes = directory
            .get(offset..offset + len)
            .ok_or_else(|| IsoError::NotAnIsoImage("truncated directory record".to_string()))?;
        let record = DirectoryRecord::read(&mut Cursor::new(bytes))?;
        offset += len;

        match record.identifier.as_slice() {
            [0] => has_rock_ridge = rock_ridge::has_sp(record.system_use()),
            [1] => {}
            identifier if !record.is_directory() => {
                let name = rock_ridge::alternate_name(record.system_use())
                    .unwrap_or_else(|| plain_name(identifier));
                let data = read_extent(
                    reader,
                    record.extent.get(),
                    record.data_length.get(),
                    block_size,
                )?;
                files.push(ImageFile { name, data });
            }
            _ => {}
        }
    }

    Ok(CidataImage {
        volume_identifier: pvd.volume_identifier(),
        rock_ridge: has_rock_ridge,
        files,
    })
}

fn read_extent<R: Read + Seek>(
    reader: &mut R,
    extent: u32,
    length: u32,
    block_size: u64,
) -> Result<Vec<u8>, IsoError> {
    if length == 0 {
        return Ok(Vec::new());
    }
    reader.seek(SeekFrom::Start(u64::from(extent) * block_size))?;
    let mut data = vec![0; length as usize];
    reader.read_exact(&mut data)?;
    Ok(data)
}

/// `USER_DATA.;1` -> `user_data`
fn plain_name(identifier: &[u8]) -> String {
    let name = String::from_utf8_lossy(identifier);
    let name = name.split(';').next().unwrap_or_default();
    name.trim_end_matches('.').to_ascii_lowercase()
}
