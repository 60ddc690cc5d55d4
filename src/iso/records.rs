//! On-disk ISO-9660 structures
//!
//! Layouts follow ECMA-119. Multi-byte fields stored in both byte orders use
//! [`BothEndianU32`] / [`BothEndianU16`].

use std::io::Cursor;
use std::time::{SystemTime, UNIX_EPOCH};

use binrw::{BinWrite, binrw};

/// Fixed part of a directory record, up to and including the identifier length
pub const DIRECTORY_RECORD_FIXED_LEN: usize = 33;

/// Directory record flag: entry is a directory
pub const FLAG_DIRECTORY: u8 = 0x02;

const PADDING: u8 = b' ';

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BothEndianU32 {
    le: u32,
    #[brw(big)]
    be: u32,
}

impl BothEndianU32 {
    pub fn new(value: u32) -> Self {
        Self {
            le: value,
            be: value,
        }
    }

    pub fn get(&self) -> u32 {
        self.le
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BothEndianU16 {
    le: u16,
    #[brw(big)]
    be: u16,
}

impl BothEndianU16 {
    pub fn new(value: u16) -> Self {
        Self {
            le: value,
            be: value,
        }
    }

    pub fn get(&self) -> u16 {
        self.le
    }
}

/// Directory record (ECMA-119 9.1)
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    pub length: u8,
    pub extended_attribute_length: u8,
    pub extent: BothEndianU32,
    pub data_length: BothEndianU32,
    pub recorded_at: [u8; 7],
    pub flags: u8,
    pub file_unit_size: u8,
    pub interleave_gap: u8,
    pub volume_sequence_number: BothEndianU16,
    pub identifier_length: u8,
    #[br(count = identifier_length)]
    pub identifier: Vec<u8>,
    /// Optional padding byte followed by the system use area
    #[br(count = (length as usize).saturating_sub(DIRECTORY_RECORD_FIXED_LEN + identifier_length as usize))]
    pub tail: Vec<u8>,
}

impl DirectoryRecord {
    /// Build a record, inserting the padding byte and computing the length
    ///
    /// Returns `None` when the record would exceed 255 bytes.
    pub fn new(
        identifier: Vec<u8>,
        extent: u32,
        data_length: u32,
        flags: u8,
        recorded_at: [u8; 7],
        system_use: Vec<u8>,
    ) -> Option<Self> {
        let mut tail = Vec::with_capacity(system_use.len() + 1);
        if identifier.len() % 2 == 0 {
            tail.push(0);
        }
        tail.extend(system_use);
        // Record length must be even
        if (DIRECTORY_RECORD_FIXED_LEN + identifier.len() + tail.len()) % 2 != 0 {
            tail.push(0);
        }

        let length = u8::try_from(DIRECTORY_RECORD_FIXED_LEN + identifier.len() + tail.len()).ok()?;
        Some(Self {
            length,
            extended_attribute_length: 0,
            extent: BothEndianU32::new(extent),
            data_length: BothEndianU32::new(data_length),
            recorded_at,
            flags,
            file_unit_size: 0,
            interleave_gap: 0,
            volume_sequence_number: BothEndianU16::new(1),
            identifier_length: identifier.len() as u8,
            identifier,
            tail,
        })
    }

    pub fn is_directory(&self) -> bool {
        self.flags & FLAG_DIRECTORY != 0
    }

    /// System use area, without the identifier padding byte
    pub fn system_use(&self) -> &[u8] {
        if self.identifier_length % 2 == 0 && !self.tail.is_empty() {
            &self.tail[1..]
        } else {
            &self.tail
        }
    }

    pub fn to_bytes(&self) -> binrw::BinResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(self.length as usize));
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

/// Primary volume descriptor (ECMA-119 8.4)
#[binrw]
#[brw(little, magic = b"\x01CD001\x01")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryVolumeDescriptor {
    pub unused1: u8,
    pub system_identifier: [u8; 32],
    pub volume_identifier: [u8; 32],
    pub unused2: [u8; 8],
    pub volume_space_size: BothEndianU32,
    pub unused3: [u8; 32],
    pub volume_set_size: BothEndianU16,
    pub volume_sequence_number: BothEndianU16,
    pub logical_block_size: BothEndianU16,
    pub path_table_size: BothEndianU32,
    pub l_path_table: u32,
    pub optional_l_path_table: u32,
    #[brw(big)]
    pub m_path_table: u32,
    #[brw(big)]
    pub optional_m_path_table: u32,
    pub root_directory: DirectoryRecord,
    pub volume_set_identifier: [u8; 128],
    pub publisher_identifier: [u8; 128],
    pub preparer_identifier: [u8; 128],
    pub application_identifier: [u8; 128],
    pub copyright_file_identifier: [u8; 37],
    pub abstract_file_identifier: [u8; 37],
    pub bibliographic_file_identifier: [u8; 37],
    pub created_at: [u8; 17],
    pub modified_at: [u8; 17],
    pub expires_at: [u8; 17],
    pub effective_at: [u8; 17],
    pub file_structure_version: u8,
    pub reserved1: u8,
    pub application_use: [u8; 512],
    pub reserved2: [u8; 653],
}

/// Layout values the writer fills into the primary volume descriptor
#[derive(Debug, Clone)]
pub struct VolumeLayout {
    pub volume_identifier: String,
    pub application_identifier: String,
    pub volume_space_size: u32,
    pub logical_block_size: u16,
    pub path_table_size: u32,
    pub l_path_table: u32,
    pub m_path_table: u32,
    pub root_directory: DirectoryRecord,
    pub recorded_at: Timestamp,
}

impl PrimaryVolumeDescriptor {
    pub fn new(layout: VolumeLayout) -> Self {
        let stamp = layout.recorded_at.to_volume_bytes();
        Self {
            unused1: 0,
            system_identifier: padded(""),
            volume_identifier: padded(&layout.volume_identifier),
            unused2: [0; 8],
            volume_space_size: BothEndianU32::new(layout.volume_space_size),
            unused3: [0; 32],
            volume_set_size: BothEndianU16::new(1),
            volume_sequence_number: BothEndianU16::new(1),
            logical_block_size: BothEndianU16::new(layout.logical_block_size),
            path_table_size: BothEndianU32::new(layout.path_table_size),
            l_path_table: layout.l_path_table,
            optional_l_path_table: 0,
            m_path_table: layout.m_path_table,
            optional_m_path_table: 0,
            root_directory: layout.root_directory,
            volume_set_identifier: padded(""),
            publisher_identifier: padded(""),
            preparer_identifier: padded(""),
            application_identifier: padded(&layout.application_identifier),
            copyright_file_identifier: padded(""),
            abstract_file_identifier: padded(""),
            bibliographic_file_identifier: padded(""),
            created_at: stamp,
            modified_at: stamp,
            expires_at: Timestamp::unset_volume_bytes(),
            effective_at: stamp,
            file_structure_version: 1,
            reserved1: 0,
            application_use: [0; 512],
            reserved2: [0; 653],
        }
    }

    /// Volume identifier with trailing padding removed
    pub fn volume_identifier(&self) -> String {
        String::from_utf8_lossy(&self.volume_identifier)
            .trim_end_matches([' ', '\0'])
            .to_string()
    }

    pub fn to_bytes(&self) -> binrw::BinResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(2048));
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

/// Volume descriptor set terminator (ECMA-119 8.3)
#[binrw]
#[brw(little, magic = b"\xffCD001\x01")]
#[derive(Debug, Clone)]
pub struct VolumeDescriptorSetTerminator {
    pub reserved: [u8; 2041],
}

impl VolumeDescriptorSetTerminator {
    pub fn new() -> Self {
        Self {
            reserved: [0; 2041],
        }
    }

    pub fn to_bytes(&self) -> binrw::BinResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(2048));
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

impl Default for VolumeDescriptorSetTerminator {
    fn default() -> Self {
        Self::new()
    }
}

/// Path table record for the root directory (ECMA-119 9.4)
///
/// Written once little-endian for the L table and once big-endian for the M
/// table.
#[binrw]
#[derive(Debug, Clone, Copy)]
pub struct PathTableRecord {
    pub identifier_length: u8,
    pub extended_attribute_length: u8,
    pub extent: u32,
    pub parent_directory: u16,
    /// Root identifier (0x00) plus padding
    pub identifier: [u8; 2],
}

impl PathTableRecord {
    /// Encoded size of the root record
    pub const ROOT_LEN: u32 = 10;

    pub fn root(extent: u32) -> Self {
        Self {
            identifier_length: 1,
            extended_attribute_length: 0,
            extent,
            parent_directory: 1,
            identifier: [0, 0],
        }
    }

    pub fn to_bytes(&self, endian: binrw::Endian) -> binrw::BinResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(Self::ROOT_LEN as usize));
        self.write_options(&mut cursor, endian, ())?;
        Ok(cursor.into_inner())
    }
}

/// Calendar time recorded in the image, always UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub year: i64,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp {
    /// Convert seconds since the Unix epoch to a civil UTC date
    pub fn from_unix(secs: i64) -> Self {
        let days = secs.div_euclid(86_400);
        let rem = secs.rem_euclid(86_400);

        // Days-to-civil conversion over 400-year eras
        let z = days + 719_468;
        let era = z.div_euclid(146_097);
        let doe = z.rem_euclid(146_097);
        let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = doy - (153 * mp + 2) / 5 + 1;
        let month = if mp < 10 { mp + 3 } else { mp - 9 };
        let year = yoe + era * 400 + i64::from(month <= 2);

        Self {
            year,
            month: month as u8,
            day: day as u8,
            hour: (rem / 3_600) as u8,
            minute: (rem % 3_600 / 60) as u8,
            second: (rem % 60) as u8,
        }
    }

    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self::from_unix(secs)
    }

    /// 7-byte directory record form (ECMA-119 9.1.5)
    pub fn to_directory_bytes(&self) -> [u8; 7] {
        [
            (self.year - 1900).clamp(0, 255) as u8,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            0,
        ]
    }

    /// 17-byte volume descriptor form (ECMA-119 8.4.26.1)
    pub fn to_volume_bytes(&self) -> [u8; 17] {
        let digits = format!(
            "{:04}{:02}{:02}{:02}{:02}{:02}00",
            self.year.clamp(1, 9999),
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second
        );
        let mut out = [0u8; 17];
        out[..16].copy_from_slice(&digits.as_bytes()[..16]);
        out
    }

    /// "Not specified" volume date
    pub fn unset_volume_bytes() -> [u8; 17] {
        let mut out = [b'0'; 17];
        out[16] = 0;
        out
    }
}

/// Space-pad an identifier to a fixed-width field, truncating if needed
fn padded<const N: usize>(value: &str) -> [u8; N] {
    let mut out = [PADDING; N];
    let len = value.len().min(N);
    out[..len].copy_from_slice(&value.as_bytes()[..len]);
    out
}
