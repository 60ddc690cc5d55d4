//! Rock Ridge (RRIP 1991A) system use entries
//!
//! Entries are SUSP-framed: two signature bytes, length, version, payload.

/// RRIP extension identifier announced in the ER entry
pub const EXTENSION_ID: &str = "RRIP_1991A";
const EXTENSION_DESCRIPTOR: &str =
    "THE ROCK RIDGE INTERCHANGE PROTOCOL PROVIDES SUPPORT FOR POSIX FILE SYSTEM SEMANTICS";
const EXTENSION_SOURCE: &str = "PLEASE CONTACT DISC PUBLISHER FOR SPECIFICATION SOURCE.  SEE PUBLISHER IDENTIFIER IN PRIMARY VOLUME DESCRIPTOR FOR CONTACT INFORMATION.";

/// POSIX mode of directories on the image
pub const DIRECTORY_MODE: u32 = 0o040_555;

/// POSIX mode of regular files on the image
pub const FILE_MODE: u32 = 0o100_444;

/// RR entry flags
pub const RR_PX: u8 = 0x01;
pub const RR_NM: u8 = 0x08;
pub const RR_TF: u8 = 0x80;

// TF flags: modify, access, attributes
const TF_TIMES: u8 = 0x02 | 0x04 | 0x08;

/// Size of the CE entry
pub const CE_LEN: usize = 28;

fn entry(signature: &[u8; 2], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(signature);
    out.push((4 + payload.len()) as u8);
    out.push(1);
    out.extend_from_slice(payload);
    out
}

fn push_both_endian(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
    out.extend_from_slice(&value.to_be_bytes());
}

/// SUSP indicator, first entry of the root `.` record
pub fn sp() -> Vec<u8> {
    entry(b"SP", &[0xBE, 0xEF, 0])
}

/// RRIP 1991A presence entry listing the RRIP entries that follow
pub fn rr(flags: u8) -> Vec<u8> {
    entry(b"RR", &[flags])
}

/// POSIX attributes, owned by root
pub fn px(mode: u32, links: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(32);
    push_both_endian(&mut payload, mode);
    push_both_endian(&mut payload, links);
    push_both_endian(&mut payload, 0);
    push_both_endian(&mut payload, 0);
    entry(b"PX", &payload)
}

/// Modify, access and attribute-change times
pub fn tf(recorded_at: [u8; 7]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(22);
    payload.push(TF_TIMES);
    for _ in 0..3 {
        payload.extend_from_slice(&recorded_at);
    }
    entry(b"TF", &payload)
}

/// Alternate (POSIX) name
pub fn nm(name: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(1 + name.len());
    payload.push(0);
    payload.extend_from_slice(name.as_bytes());
    entry(b"NM", &payload)
}

/// Pointer to a continuation area
pub fn ce(block: u32, offset: u32, length: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(24);
    push_both_endian(&mut payload, block);
    push_both_endian(&mut payload, offset);
    push_both_endian(&mut payload, length);
    entry(b"CE", &payload)
}

/// Extensions reference naming RRIP 1991A
pub fn er() -> Vec<u8> {
    let mut payload = vec![
        EXTENSION_ID.len() as u8,
        EXTENSION_DESCRIPTOR.len() as u8,
        EXTENSION_SOURCE.len() as u8,
        1,
    ];
    payload.extend_from_slice(EXTENSION_ID.as_bytes());
    payload.extend_from_slice(EXTENSION_DESCRIPTOR.as_bytes());
    payload.extend_from_slice(EXTENSION_SOURCE.as_bytes());
    entry(b"ER", &payload)
}

/// Iterate `(signature, payload)` pairs of a system use area
fn entries(mut area: &[u8]) -> impl Iterator<Item = ([u8; 2], &[u8])> {
    std::iter::from_fn(move || {
        if area.len() < 4 {
            return None;
        }
        let len = area[2] as usize;
        if len < 4 || len > area.len() {
            return None;
        }
        let (current, rest) = area.split_at(len);
        area = rest;
        Some(([current[0], current[1]], &current[4..]))
    })
}

/// Whether a root `.` system use area starts with the SUSP indicator
pub fn has_sp(area: &[u8]) -> bool {
    matches!(entries(area).next(), Some((sig, payload)) if &sig == b"SP" && payload.starts_with(&[0xBE, 0xEF]))
}

/// POSIX name from the NM entries of a system use area
pub fn alternate_name(area: &[u8]) -> Option<String> {
    let mut name = Vec::new();
    let mut found = false;
    for (sig, payload) in entries(area) {
        if &sig == b"NM" && !payload.is_empty() {
            found = true;
            name.extend_from_slice(&payload[1..]);
        }
    }
    found.then(|| String::from_utf8_lossy(&name).into_owned())
}
