//! # WOZ disk image track structure
//!
//! Parses WOZ v1 and v2 images into the bit-level track set the drive
//! emulation reads and writes.  Only the track structure is interpreted
//! here; META and WRIT chunks are carried through opaquely and anything
//! beyond WOZ (sector decoding, file systems) is someone else's job.
//!
//! WOZ2 reference: https://applesaucefdc.com/woz/reference2/

use log::{debug,warn};

pub const QTR_TRACK_LIMIT: usize = 160;
/// unformatted tracks read as a 6400-byte, 51200-bit spiral per the WOZ2 spec
pub const EMPTY_TRACK_BIT_COUNT: u32 = 51200;

pub const INFO_ID: u32 = 0x4f464e49;
pub const TMAP_ID: u32 = 0x50414d54;
pub const TRKS_ID: u32 = 0x534b5254;
pub const WRIT_ID: u32 = 0x54495257;
pub const META_ID: u32 = 0x4154454d;

/// WOZ2 TRKS bitstream blocks begin at file offset 1536
const TRACK_DATA_OFFSET: u32 = 1536;

#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("not a WOZ image")]
    BadHeader,
    #[error("unsupported WOZ version")]
    BadVersion,
    #[error("checksum mismatch")]
    BadChecksum,
    #[error("chunk truncated or overlapping")]
    BadChunk,
    #[error("required chunk missing: {0}")]
    MissingChunk(&'static str),
    #[error("track data out of bounds")]
    BadTrackData
}

#[derive(Clone,Copy,PartialEq,Eq,Debug,Default)]
pub enum DiskType {
    #[default]
    None,
    D525,
    D35
}

pub const FLAG_WRITE_PROTECT: u32 = 0x0001;
pub const FLAG_SYNCHRONIZED: u32 = 0x0002;
pub const FLAG_CLEANED: u32 = 0x0004;
pub const FLAG_DOUBLE_SIDED: u32 = 0x0008;

const CRC32_TAB: [u32;256] = {
    let mut tab = [0u32;256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xedb88320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        tab[n] = c;
        n += 1;
    }
    tab
};

/// Calculate the checksum for the WOZ data in `buf`
pub fn crc32(crc_seed: u32,buf: &[u8]) -> u32 {
    let mut crc = crc_seed ^ !0u32;
    for p in buf {
        crc = CRC32_TAB[((crc ^ *p as u32) & 0xff) as usize] ^ (crc >> 8);
    }
    crc ^ !0u32
}

/// One parsed floppy: the quarter-track map, per-track metrics, and the
/// contiguous bitstream buffer the drives index into.
#[derive(Clone)]
pub struct NibbleDisk {
    pub disk_type: DiskType,
    pub bit_timing_ns: u32,
    pub flags: u32,
    pub creator: [u8;32],
    pub boot_sector_format: u8,
    pub required_ram_kb: u32,
    pub max_track_size_bytes: u32,
    pub meta_track_map: [u8;QTR_TRACK_LIMIT],
    pub track_bits_count: [u32;QTR_TRACK_LIMIT],
    pub track_byte_offset: [u32;QTR_TRACK_LIMIT],
    pub track_byte_count: [u32;QTR_TRACK_LIMIT],
    pub track_initialized: [bool;QTR_TRACK_LIMIT],
    pub track_count: u32,
    pub bits_data: Vec<u8>,
    pub meta: Option<Vec<u8>>,
    pub writ: Option<Vec<u8>>
}

impl Default for NibbleDisk {
    fn default() -> Self {
        Self {
            disk_type: DiskType::None,
            bit_timing_ns: 0,
            flags: 0,
            creator: [0x20;32],
            boot_sector_format: 0,
            required_ram_kb: 0,
            max_track_size_bytes: 0,
            meta_track_map: [0xff;QTR_TRACK_LIMIT],
            track_bits_count: [0;QTR_TRACK_LIMIT],
            track_byte_offset: [0;QTR_TRACK_LIMIT],
            track_byte_count: [0;QTR_TRACK_LIMIT],
            track_initialized: [false;QTR_TRACK_LIMIT],
            track_count: 0,
            bits_data: Vec::new(),
            meta: None,
            writ: None
        }
    }
}

impl NibbleDisk {
    pub fn is_write_protected(&self) -> bool {
        self.flags & FLAG_WRITE_PROTECT != 0
    }
    pub fn is_double_sided(&self) -> bool {
        self.flags & FLAG_DOUBLE_SIDED != 0
    }
    /// bitstream slice for a real (TMAP-resolved) track index
    pub fn track_bits(&self,track: u8) -> &[u8] {
        let start = self.track_byte_offset[track as usize] as usize;
        let end = start + self.track_byte_count[track as usize] as usize;
        &self.bits_data[start..end.min(self.bits_data.len())]
    }
    pub fn track_bits_mut(&mut self,track: u8) -> &mut [u8] {
        let start = self.track_byte_offset[track as usize] as usize;
        let end = (start + self.track_byte_count[track as usize] as usize)
            .min(self.bits_data.len());
        &mut self.bits_data[start..end]
    }
}

/// Get the next metadata chunk starting at `ptr`.  Returns
/// `(next_ptr,id,body_range)`; `next_ptr` of 0 means no more chunks.
fn get_next_chunk(ptr: usize,buf: &[u8]) -> (usize,u32,Option<(usize,usize)>) {
    if ptr + 8 > buf.len() {
        return (0,0,None);
    }
    let id = u32::from_le_bytes([buf[ptr],buf[ptr + 1],buf[ptr + 2],buf[ptr + 3]]);
    let size = u32::from_le_bytes([buf[ptr + 4],buf[ptr + 5],buf[ptr + 6],buf[ptr + 7]]);
    let end = ptr + 8 + size as usize;
    if end > buf.len() {
        return (0,0,None);
    }
    let next = if end + 8 > buf.len() { 0 } else { end };
    if id == 0 && size == 0 {
        debug!("expected chunk, got nulls");
        return (next,0,None);
    }
    debug!("found chunk {}, offset {}, size {}",
        String::from_utf8_lossy(&u32::to_le_bytes(id)),ptr,size);
    (next,id,Some((ptr + 8,end)))
}

fn parse_info(disk: &mut NibbleDisk,body: &[u8],version: u8) -> Result<(),Error> {
    if body.len() < 37 {
        return Err(Error::BadChunk);
    }
    disk.disk_type = match body[1] {
        1 => DiskType::D525,
        2 => DiskType::D35,
        _ => DiskType::None
    };
    if body[2] != 0 {
        disk.flags |= FLAG_WRITE_PROTECT;
    }
    if body[3] != 0 {
        disk.flags |= FLAG_SYNCHRONIZED;
    }
    if body[4] != 0 {
        disk.flags |= FLAG_CLEANED;
    }
    disk.creator.copy_from_slice(&body[5..37]);
    if version > 1 {
        if body.len() < 46 {
            return Err(Error::BadChunk);
        }
        if body[37] == 2 {
            disk.flags |= FLAG_DOUBLE_SIDED;
        }
        disk.boot_sector_format = body[38];
        // optimal bit timing is in 125 ns increments
        disk.bit_timing_ns = body[39] as u32 * 125;
        disk.flags |= u16::from_le_bytes([body[40],body[41]]) as u32;
        disk.required_ram_kb = u16::from_le_bytes([body[42],body[43]]) as u32;
        disk.max_track_size_bytes = u16::from_le_bytes([body[44],body[45]]) as u32 * 512;
    } else {
        match disk.disk_type {
            DiskType::D525 => {
                disk.bit_timing_ns = 4000;
                disk.max_track_size_bytes = 6646;
            },
            DiskType::D35 => {
                disk.bit_timing_ns = 2000;
                disk.max_track_size_bytes = 19 * 512;
            },
            DiskType::None => {}
        }
    }
    if disk.bit_timing_ns == 0 {
        disk.bit_timing_ns = if disk.disk_type == DiskType::D35 { 2000 } else { 4000 };
    }
    Ok(())
}

fn parse_tmap(disk: &mut NibbleDisk,body: &[u8]) -> Result<(),Error> {
    if body.len() < QTR_TRACK_LIMIT {
        return Err(Error::BadChunk);
    }
    let mut highest: Option<u8> = None;
    for idx in 0..QTR_TRACK_LIMIT {
        disk.meta_track_map[idx] = body[idx];
        if body[idx] != 0xff {
            highest = Some(highest.map_or(body[idx],|h| h.max(body[idx])));
        }
    }
    if let Some(h) = highest {
        disk.track_count = h as u32 + 1;
    }
    Ok(())
}

/// WOZ2 TRKS: 160 8-byte track descriptors then block-aligned bitstreams
fn parse_trks_v2(disk: &mut NibbleDisk,body: &[u8]) -> Result<(),Error> {
    if body.len() < QTR_TRACK_LIMIT * 8 {
        return Err(Error::BadChunk);
    }
    let mut bits_total = 0usize;
    for idx in 0..QTR_TRACK_LIMIT {
        let rec = &body[idx * 8..idx * 8 + 8];
        let starting_block = u16::from_le_bytes([rec[0],rec[1]]) as u32;
        let block_count = u16::from_le_bytes([rec[2],rec[3]]) as u32;
        let bit_count = u32::from_le_bytes([rec[4],rec[5],rec[6],rec[7]]);
        disk.track_byte_count[idx] = block_count * 512;
        disk.track_bits_count[idx] = bit_count;
        disk.track_initialized[idx] = bit_count > 0;
        if starting_block != 0 {
            disk.track_byte_offset[idx] = starting_block * 512 - TRACK_DATA_OFFSET;
        }
        bits_total += disk.track_byte_count[idx] as usize;
    }
    let bits_start = QTR_TRACK_LIMIT * 8;
    if body.len() < bits_start + bits_total {
        return Err(Error::BadTrackData);
    }
    disk.bits_data = body[bits_start..bits_start + bits_total].to_vec();
    Ok(())
}

/// WOZ1 TRKS: fixed 6656-byte records, bitstream inline per track
fn parse_trks_v1(disk: &mut NibbleDisk,body: &[u8]) -> Result<(),Error> {
    const RECORD: usize = 6656;
    const DATA: usize = 6646;
    let count = body.len() / RECORD;
    let mut offset = 0u32;
    for idx in 0..count.min(QTR_TRACK_LIMIT) {
        let rec = &body[idx * RECORD..(idx + 1) * RECORD];
        let bit_count = u32::from_le_bytes([rec[DATA + 2],rec[DATA + 3],rec[DATA + 4],rec[DATA + 5]]);
        disk.track_byte_count[idx] = DATA as u32;
        disk.track_bits_count[idx] = bit_count;
        disk.track_byte_offset[idx] = offset;
        disk.track_initialized[idx] = bit_count > 0;
        disk.bits_data.extend_from_slice(&rec[0..DATA]);
        offset += DATA as u32;
    }
    Ok(())
}

/// Validate the 12-byte header.  Returns (version,chunk start offset).
fn check_header(data: &[u8]) -> Result<(u8,usize),Error> {
    if data.len() < 12 || &data[0..3] != b"WOZ" {
        return Err(Error::BadHeader);
    }
    let version = data[3].wrapping_sub(b'0');
    if version < 1 || version > 2 {
        return Err(Error::BadVersion);
    }
    if data[4] != 0xff || &data[5..8] != b"\x0a\x0d\x0a" {
        return Err(Error::BadHeader);
    }
    let stored = u32::from_le_bytes([data[8],data[9],data[10],data[11]]);
    if stored != 0 && crc32(0,&data[12..]) != stored {
        return Err(Error::BadChecksum);
    }
    Ok((version,12))
}

/// Parse a WOZ byte stream into a [`NibbleDisk`], or reject it.
pub fn from_bytes(data: &[u8]) -> Result<NibbleDisk,Error> {
    let (version,start) = check_header(data)?;
    let mut disk = NibbleDisk::default();
    let mut ptr = start;
    let mut seen_info = false;
    let mut seen_tmap = false;
    let mut seen_trks = false;
    loop {
        let (next,id,body) = get_next_chunk(ptr,data);
        if let Some((lo,hi)) = body {
            let body = &data[lo..hi];
            match id {
                INFO_ID => {
                    parse_info(&mut disk,body,version)?;
                    seen_info = true;
                },
                TMAP_ID => {
                    parse_tmap(&mut disk,body)?;
                    seen_tmap = true;
                },
                TRKS_ID => {
                    if version > 1 {
                        parse_trks_v2(&mut disk,body)?;
                    } else {
                        parse_trks_v1(&mut disk,body)?;
                    }
                    seen_trks = true;
                },
                META_ID => disk.meta = Some(body.to_vec()),
                WRIT_ID => disk.writ = Some(body.to_vec()),
                _ => {
                    warn!("unknown woz chunk {:08X} skipped",id);
                }
            }
        }
        if next == 0 {
            break;
        }
        ptr = next;
    }
    if !seen_info {
        return Err(Error::MissingChunk("INFO"));
    }
    if !seen_tmap {
        return Err(Error::MissingChunk("TMAP"));
    }
    if !seen_trks {
        return Err(Error::MissingChunk("TRKS"));
    }
    // every mapped track must resolve to loaded data
    for qtr in 0..QTR_TRACK_LIMIT {
        let track = disk.meta_track_map[qtr];
        if track != 0xff && disk.track_byte_count[track as usize] == 0 {
            warn!("tmap names track {} with no data",track);
            return Err(Error::BadTrackData);
        }
    }
    Ok(disk)
}

pub mod build {
    //! Minimal WOZ2 assembly, enough to fabricate blank or patterned
    //! disks for tests and for formatting scratch images.
    use super::*;

    /// Assemble a minimal WOZ2 image: `tracks` supplies
    /// (bit_count,fill byte) per physical track, mapped as a standard
    /// 5.25 inch disk (quarter tracks 4n-1,4n,4n+1 all land on track n).
    pub fn build_woz2_525(tracks: &[(u32,u8)]) -> Vec<u8> {
        let mut body = Vec::new();
        // INFO
        body.extend_from_slice(&INFO_ID.to_le_bytes());
        body.extend_from_slice(&60u32.to_le_bytes());
        let mut info = vec![0u8;60];
        info[0] = 2;        // version
        info[1] = 1;        // 5.25
        info[5..37].copy_from_slice(&[0x20;32]);
        info[37] = 1;       // sides
        info[38] = 1;       // 16-sector boot format
        info[39] = 32;      // optimal bit timing (4 us)
        body.extend_from_slice(&info);
        // TMAP
        body.extend_from_slice(&TMAP_ID.to_le_bytes());
        body.extend_from_slice(&160u32.to_le_bytes());
        let mut tmap = [0xffu8;160];
        for qtr in 0..160usize {
            let track = match qtr % 4 {
                0 | 1 => Some(qtr / 4),
                3 => Some(qtr / 4 + 1),
                _ => None
            };
            if let Some(track) = track {
                if track < tracks.len() {
                    tmap[qtr] = track as u8;
                }
            }
        }
        body.extend_from_slice(&tmap);
        // TRKS: descriptor table then block-aligned bitstreams; with the
        // chunk layout above the streams land at file offset 1536
        let mut trks = Vec::new();
        let mut bits = Vec::new();
        let mut block = 3u32;
        for (bit_count,fill) in tracks {
            let byte_count = ((*bit_count as usize + 7) / 8 + 511) / 512 * 512;
            trks.extend_from_slice(&(block as u16).to_le_bytes());
            trks.extend_from_slice(&((byte_count / 512) as u16).to_le_bytes());
            trks.extend_from_slice(&bit_count.to_le_bytes());
            bits.extend(std::iter::repeat(*fill).take(byte_count));
            block += (byte_count / 512) as u32;
        }
        for _ in tracks.len()..160 {
            trks.extend_from_slice(&[0u8;8]);
        }
        body.extend_from_slice(&TRKS_ID.to_le_bytes());
        body.extend_from_slice(&((trks.len() + bits.len()) as u32).to_le_bytes());
        body.extend_from_slice(&trks);
        body.extend_from_slice(&bits);
        let mut image = Vec::new();
        image.extend_from_slice(b"WOZ2");
        image.push(0xff);
        image.extend_from_slice(b"\x0a\x0d\x0a");
        image.extend_from_slice(&crc32(0,&body).to_le_bytes());
        image.extend_from_slice(&body);
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage() {
        assert!(matches!(from_bytes(b"MOOF1\xff\x0a\x0d\x0a\x00\x00\x00"),
            Err(Error::BadHeader)));
        assert!(matches!(from_bytes(b"WOZ9\xff\x0a\x0d\x0a\x00\x00\x00\x00"),
            Err(Error::BadVersion)));
    }

    #[test]
    fn rejects_bad_crc() {
        let mut image = build::build_woz2_525(&[(51200,0xaa)]);
        let n = image.len() - 1;
        image[n] ^= 0xff;
        assert!(matches!(from_bytes(&image),Err(Error::BadChecksum)));
    }

    #[test]
    fn parses_minimal_image() {
        let image = build::build_woz2_525(&[(51200,0xaa),(51200,0x96)]);
        let disk = from_bytes(&image).expect("parse failed");
        assert_eq!(disk.disk_type,DiskType::D525);
        assert_eq!(disk.bit_timing_ns,4000);
        assert_eq!(disk.track_count,2);
        assert_eq!(disk.meta_track_map[0],0);
        assert_eq!(disk.meta_track_map[4],1);
        assert_eq!(disk.meta_track_map[2],0xff);
        assert_eq!(disk.track_bits_count[0],51200);
        assert!(disk.track_initialized[0]);
        assert_eq!(disk.track_bits(0)[0],0xaa);
        assert_eq!(disk.track_bits(1)[0],0x96);
    }
}
