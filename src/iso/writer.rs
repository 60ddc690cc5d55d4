//! ISO-9660 image writer
//!
//! Layout, in sectors:
//! system area (16), primary volume descriptor, terminator, L path table,
//! M path table, root directory, Rock Ridge continuation area (when enabled),
//! then file data, each file starting on a sector boundary.

use std::io::{self, Write};

use tracing::debug;

use super::records::{
    DirectoryRecord, FLAG_DIRECTORY, PathTableRecord, PrimaryVolumeDescriptor, Timestamp,
    VolumeDescriptorSetTerminator, VolumeLayout,
};
use super::{IsoError, SECTOR_SIZE, SYSTEM_AREA_SECTORS, rock_ridge};

const PVD_SECTOR: u32 = SYSTEM_AREA_SECTORS;
const L_PATH_TABLE_SECTOR: u32 = PVD_SECTOR + 2;
const M_PATH_TABLE_SECTOR: u32 = L_PATH_TABLE_SECTOR + 1;
const ROOT_DIRECTORY_SECTOR: u32 = M_PATH_TABLE_SECTOR + 1;

const MAX_NAME_LEN: usize = 64;
const MAX_VOLUME_ID_LEN: usize = 32;
const APPLICATION_ID: &str = "CIDATA-TOOL";

/// Options applied when the image is written out
#[derive(Debug, Clone, Default)]
pub struct FinalizeOptions {
    /// Add Rock Ridge entries (POSIX names and modes)
    pub rock_ridge: bool,
    /// Volume label, at most 32 characters
    pub volume_identifier: String,
    /// Time recorded for every entry; the current time when unset
    pub recorded_at: Option<Timestamp>,
}

impl FinalizeOptions {
    /// Options for a NoCloud seed image: Rock Ridge on, label `cidata`
    pub fn cidata() -> Self {
        Self {
            rock_ridge: true,
            volume_identifier: super::CIDATA_VOLUME_ID.to_string(),
            recorded_at: None,
        }
    }
}

#[derive(Debug)]
struct PendingFile {
    name: String,
    identifier: Vec<u8>,
    data: Vec<u8>,
}

/// Streamed content of one file in the image
#[derive(Debug)]
pub struct IsoFile<'a> {
    data: &'a mut Vec<u8>,
}

impl Write for IsoFile<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Builds a single-directory ISO-9660 image into `W`
///
/// Nothing is written to `W` until [`IsoWriter::finalize`].
#[derive(Debug)]
pub struct IsoWriter<W: Write> {
    out: W,
    root_created: bool,
    files: Vec<PendingFile>,
}

impl<W: Write> IsoWriter<W> {
    /// Start an empty image. Only [`SECTOR_SIZE`] is accepted.
    pub fn create(out: W, sector_size: u32) -> Result<Self, IsoError> {
        if sector_size != SECTOR_SIZE {
            return Err(IsoError::InvalidSectorSize(sector_size));
        }
        Ok(Self {
            out,
            root_created: false,
            files: Vec::new(),
        })
    }

    /// Create a directory. Only the root (`/`) is supported.
    pub fn mkdir(&mut self, path: &str) -> Result<(), IsoError> {
        if !path.trim_matches('/').is_empty() {
            return Err(IsoError::NestedDirectory(path.to_string()));
        }
        self.root_created = true;
        Ok(())
    }

    /// Create a file in the root directory and return a handle for its content
    pub fn open_file(&mut self, path: &str) -> Result<IsoFile<'_>, IsoError> {
        if !self.root_created {
            return Err(IsoError::NoRootDirectory);
        }

        let name = path.strip_prefix('/').unwrap_or(path);
        if name.contains('/') {
            return Err(IsoError::NestedDirectory(path.to_string()));
        }
        if name.is_empty() || name == "." || name == ".." || name.len() > MAX_NAME_LEN {
            return Err(IsoError::InvalidFileName(path.to_string()));
        }

        let identifier = iso_identifier(name);
        if self
            .files
            .iter()
            .any(|f| f.name == name || f.identifier == identifier)
        {
            return Err(IsoError::DuplicateEntry(name.to_string()));
        }

        debug!(
            "Adding {} as {}",
            name,
            String::from_utf8_lossy(&identifier)
        );
        self.files.push(PendingFile {
            name: name.to_string(),
            identifier,
            data: Vec::new(),
        });
        let file = self
            .files
            .last_mut()
            .ok_or_else(|| IsoError::InvalidFileName(path.to_string()))?;
        Ok(IsoFile {
            data: &mut file.data,
        })
    }

    /// Create a file with the given content
    pub fn add_file(&mut self, path: &str, data: &[u8]) -> Result<(), IsoError> {
        self.open_file(path)?.write_all(data)?;
        Ok(())
    }

    /// Lay out and write the whole image, returning the underlying writer
    pub fn finalize(mut self, options: &FinalizeOptions) -> Result<W, IsoError> {
        if !self.root_created {
            return Err(IsoError::NoRootDirectory);
        }
        let volume_id = &options.volume_identifier;
        if volume_id.len() > MAX_VOLUME_ID_LEN || !volume_id.is_ascii() {
            return Err(IsoError::InvalidVolumeIdentifier(volume_id.clone()));
        }

        self.files.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        let recorded_at = options.recorded_at.unwrap_or_else(Timestamp::now);
        let layout = self.layout(options.rock_ridge, recorded_at)?;
        let stamp = recorded_at.to_directory_bytes();

        let root_records = self.root_records(&layout, options.rock_ridge, stamp)?;
        let root_directory = pack_records(&root_records)?;
        let root_self = DirectoryRecord::new(
            vec![0],
            ROOT_DIRECTORY_SECTOR,
            layout.root_size,
            FLAG_DIRECTORY,
            stamp,
            Vec::new(),
        )
        .ok_or_else(|| IsoError::InvalidFileName("/".to_string()))?;

        let pvd = PrimaryVolumeDescriptor::new(VolumeLayout {
            volume_identifier: volume_id.clone(),
            application_identifier: APPLICATION_ID.to_string(),
            volume_space_size: layout.total_sectors,
            logical_block_size: SECTOR_SIZE as u16,
            path_table_size: PathTableRecord::ROOT_LEN,
            l_path_table: L_PATH_TABLE_SECTOR,
            m_path_table: M_PATH_TABLE_SECTOR,
            root_directory: root_self,
            recorded_at,
        });
        let path_table = PathTableRecord::root(ROOT_DIRECTORY_SECTOR);

        let out = &mut self.out;
        out.write_all(&vec![0; sector_bytes(SYSTEM_AREA_SECTORS)])?;
        write_sector(out, &pvd.to_bytes()?)?;
        write_sector(out, &VolumeDescriptorSetTerminator::new().to_bytes()?)?;
        write_sector(out, &path_table.to_bytes(binrw::Endian::Little)?)?;
        write_sector(out, &path_table.to_bytes(binrw::Endian::Big)?)?;
        out.write_all(&root_directory)?;
        if options.rock_ridge {
            write_sector(out, &rock_ridge::er())?;
        }
        for file in &self.files {
            if !file.data.is_empty() {
                write_sector(out, &file.data)?;
            }
        }
        out.flush()?;

        debug!(
            "Finalized ISO image: {} files, {} sectors, volume {:?}",
            self.files.len(),
            layout.total_sectors,
            volume_id
        );
        Ok(self.out)
    }

    /// Assign sectors to the root directory, continuation area and file data
    fn layout(&self, with_rock_ridge: bool, recorded_at: Timestamp) -> Result<Layout, IsoError> {
        // Record sizes do not depend on extents, so a placeholder layout
        // measures the root directory
        let placeholder = Layout {
            root_size: 0,
            continuation_sector: 0,
            file_extents: vec![0; self.files.len()],
            total_sectors: 0,
        };
        let records =
            self.root_records(&placeholder, with_rock_ridge, recorded_at.to_directory_bytes())?;
        let root_size = pack_records(&records)?.len() as u32;

        let mut next = ROOT_DIRECTORY_SECTOR + root_size / SECTOR_SIZE;
        let continuation_sector = if with_rock_ridge {
            let sector = next;
            next += 1;
            sector
        } else {
            0
        };

        let mut file_extents = Vec::with_capacity(self.files.len());
        for file in &self.files {
            if file.data.is_empty() {
                file_extents.push(0);
            } else {
                file_extents.push(next);
                next += sectors_for(file.data.len());
            }
        }

        Ok(Layout {
            root_size,
            continuation_sector,
            file_extents,
            total_sectors: next,
        })
    }

    fn root_records(
        &self,
        layout: &Layout,
        with_rock_ridge: bool,
        stamp: [u8; 7],
    ) -> Result<Vec<DirectoryRecord>, IsoError> {
        let mut records = Vec::with_capacity(self.files.len() + 2);

        for identifier in [0u8, 1] {
            let mut system_use = Vec::new();
            if with_rock_ridge {
                if identifier == 0 {
                    system_use.extend(rock_ridge::sp());
                }
                system_use.extend(rock_ridge::rr(rock_ridge::RR_PX | rock_ridge::RR_TF));
                system_use.extend(rock_ridge::px(rock_ridge::DIRECTORY_MODE, 2));
                system_use.extend(rock_ridge::tf(stamp));
                if identifier == 0 {
                    system_use.extend(rock_ridge::ce(
                        layout.continuation_sector,
                        0,
                        rock_ridge::er().len() as u32,
                    ));
                }
            }
            records.push(
                DirectoryRecord::new(
                    vec![identifier],
                    ROOT_DIRECTORY_SECTOR,
                    layout.root_size,
                    FLAG_DIRECTORY,
                    stamp,
                    system_use,
                )
                .ok_or_else(|| IsoError::InvalidFileName("/".to_string()))?,
            );
        }

        for (file, extent) in self.files.iter().zip(&layout.file_extents) {
            let mut system_use = Vec::new();
            if with_rock_ridge {
                system_use.extend(rock_ridge::rr(
                    rock_ridge::RR_PX | rock_ridge::RR_TF | rock_ridge::RR_NM,
                ));
                system_use.extend(rock_ridge::px(rock_ridge::FILE_MODE, 1));
                system_use.extend(rock_ridge::tf(stamp));
                system_use.extend(rock_ridge::nm(&file.name));
            }
            let size = u32::try_from(file.data.len())
                .map_err(|_| IsoError::InvalidFileName(file.name.clone()))?;
            records.push(
                DirectoryRecord::new(
                    file.identifier.clone(),
                    *extent,
                    size,
                    0,
                    stamp,
                    system_use,
                )
                .ok_or_else(|| IsoError::InvalidFileName(file.name.clone()))?,
            );
        }

        Ok(records)
    }
}

#[derive(Debug)]
struct Layout {
    root_size: u32,
    continuation_sector: u32,
    file_extents: Vec<u32>,
    total_sectors: u32,
}

/// Map a file name to an ISO-9660 level 2 identifier such as `USER_DATA.;1`
pub fn iso_identifier(name: &str) -> Vec<u8> {
    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, extension),
        _ => (name, ""),
    };
    let d_chars = |s: &str, max: usize| -> String {
        s.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .take(max)
            .collect()
    };
    format!("{}.{};1", d_chars(stem, 26), d_chars(extension, 3)).into_bytes()
}

/// Concatenate directory records so none crosses a sector boundary
fn pack_records(records: &[DirectoryRecord]) -> Result<Vec<u8>, IsoError> {
    let sector = SECTOR_SIZE as usize;
    let mut buf = Vec::with_capacity(sector);
    for record in records {
        let bytes = record.to_bytes()?;
        if buf.len() % sector + bytes.len() > sector {
            buf.resize(buf.len().next_multiple_of(sector), 0);
        }
        buf.extend_from_slice(&bytes);
    }
    buf.resize(buf.len().next_multiple_of(sector).max(sector), 0);
    Ok(buf)
}

fn sectors_for(len: usize) -> u32 {
    len.div_ceil(SECTOR_SIZE as usize) as u32
}

fn sector_bytes(sectors: u32) -> usize {
    sectors as usize * SECTOR_SIZE as usize
}

/// Write `data` zero-padded to a whole number of sectors
fn write_sector<W: Write>(out: &mut W, data: &[u8]) -> io::Result<()> {
    out.write_all(data)?;
    let padding = data.len().next_multiple_of(SECTOR_SIZE as usize) - data.len();
    out.write_all(&vec![0; padding])
}
