//! # Shared drive mechanics and the 5.25 inch stepper
//!
//! One [`Drive`] models either a Disk II compatible 5.25 inch unit or a
//! IIGS 3.5 inch unit; the controller selects which positioning routine
//! runs.  Reading and writing happen at the bit level against the WOZ
//! track buffer, one bit cell at a time.
//!
//! ## Head arm emulation, 5.25 inch
//!
//! The head is moved by four phase magnets turning a stepper cog.  The cog
//! is scaled down to a single tooth oriented like a compass needle (8
//! cardinal directions) with magnets at N, E, S and W.  The cog moves when
//! an energized magnet is adjacent to its orientation, does not move when
//! the magnet is directly opposite, and two adjacent magnets land it on
//! quarter-track positions.  Much of this derives from the head arm
//! discussion in Understanding the Apple IIe (9-6 to 9-7).

use bit_vec::BitVec;
use log::{debug,info};
use rand::Rng;

use super::flags;
use crate::clock::{timer_decrement,timer_increment};
use crate::woz::{NibbleDisk,DiskType,EMPTY_TRACK_BIT_COUNT,QTR_TRACK_LIMIT};

pub const INVALID_TRACK_POS: u32 = u32::MAX;
/// real_track_index value forcing a TMAP lookup on the next step
pub const TRACK_INVALIDATED: u8 = 0xfe;
/// real_track_index value for a quarter track with no data under it
pub const TRACK_EMPTY: u8 = 0xff;

const RANDOM_BIT_COUNT: usize = 256;
/// WOZ reference suggests roughly 30% ON bits for MC3470 noise
const FAKE_BIT_DUTY: f32 = 0.30;

//  3.5 inch status bits
pub const STATUS35_STEP_IN: u32 = 0x0001;
pub const STATUS35_IO_HEAD_HI: u32 = 0x0002;
pub const STATUS35_EJECTED: u32 = 0x0008;
pub const STATUS35_EJECTING: u32 = 0x0010;
pub const STATUS35_STROBE: u32 = 0x8000;

/*  Phase magnet effective positions per cog orientation (rows) and 4-bit
    magnet state (columns).  Entries are quarter-track deltas.  A zero on an
    energized column means the magnet is opposite the cog or the forces
    cancel.  Columns: 00 N0 0E NE S0 x0 SE xE 0W NW 0x Nx SW xW Sx xx
*/
const DISK2_PHASE_STATES: [[i32;16];8] = [
    /* N  */ [0, 0, 2, 1, 0, 0, 3, 2, -2, -1, 0, 0, -3, -2, 0, 0],
    /* NE */ [0, -1, 1, 0, 3, -1, 2, 1, -3, -2, 1, -1, 0, -3, 3, 0],
    /*  E */ [0, -2, 0, -1, 2, 0, 1, 0, 0, -3, 0, -2, 3, 0, 2, 0],
    /* SE */ [0, -3, -1, -2, 1, 1, 0, -1, 3, 0, 1, -3, 2, 3, 1, 0],
    /* S  */ [0, 0, -2, -3, 0, 0, -1, -2, 2, 3, 0, 0, 1, 2, 0, 0],
    /* SW */ [0, 3, -3, 0, -1, -1, -2, -3, 1, 2, 1, 3, 0, 1, -1, 0],
    /*  W */ [0, 2, 0, 3, -2, 0, -3, 0, 0, 1, 0, 2, -1, 0, -2, 0],
    /* NW */ [0, 1, 3, 2, -3, 1, 0, 3, -1, 0, -1, 1, -2, -1, -3, 0]
];

pub struct Drive {
    pub has_disk: bool,
    pub disk: NibbleDisk,
    pub qtr_track_index: i32,
    pub real_track_index: u8,
    pub track_byte_index: u32,
    pub track_bit_shift: u32,
    pub track_bit_length: u32,
    pub pulse_ns: u32,
    pub read_buffer: u8,
    pub cog_orient: u32,
    pub ctl_switch: u32,
    pub status_mask_35: u32,
    pub step_timer_35_ns: u32,
    pub write_pulse: bool,
    pub is_spindle_on: bool,
    random_bits: BitVec,
    random_bit_index: usize
}

impl Drive {
    pub fn new() -> Self {
        Self {
            has_disk: false,
            disk: NibbleDisk::default(),
            qtr_track_index: 0,
            real_track_index: TRACK_INVALIDATED,
            track_byte_index: 0,
            track_bit_shift: 0,
            track_bit_length: 0,
            pulse_ns: 0,
            read_buffer: 0,
            cog_orient: 0,
            ctl_switch: 0,
            status_mask_35: 0,
            step_timer_35_ns: 0,
            write_pulse: false,
            is_spindle_on: false,
            random_bits: BitVec::from_elem(RANDOM_BIT_COUNT,false),
            random_bit_index: 0
        }
    }

    /// Reset at power-on or RESB.  The cog orientation is left alone since
    /// this could be a soft reset.  The fake-bit pool is re-rolled to the
    /// recommended duty cycle.
    pub fn reset(&mut self) {
        self.real_track_index = TRACK_INVALIDATED;
        self.random_bit_index = 0;
        self.qtr_track_index = 0;
        self.status_mask_35 = 0;
        self.start();
        let mut rng = rand::thread_rng();
        for idx in 0..RANDOM_BIT_COUNT {
            self.random_bits.set(idx,rng.gen::<f32>() < FAKE_BIT_DUTY);
        }
    }

    /// Re-arm the head state when the drive is switched on or selected
    pub fn start(&mut self) {
        self.ctl_switch = 0;
        self.track_byte_index = 0;
        self.track_bit_shift = 0;
        self.pulse_ns = 0;
        self.read_buffer = 0;
    }

    pub fn insert_disk(&mut self,disk: NibbleDisk) {
        self.has_disk = disk.track_count > 0;
        self.disk = disk;
        self.real_track_index = TRACK_INVALIDATED;
        self.track_bit_length = 0;
        self.start();
        info!("drive: disk inserted ({} tracks)",self.disk.track_count);
    }

    /// Take the disk out, transferring ownership back to the caller
    pub fn eject_disk(&mut self) -> Option<NibbleDisk> {
        if self.disk.disk_type == DiskType::None {
            return None;
        }
        if self.disk.disk_type == DiskType::D35 {
            self.status_mask_35 &= !STATUS35_EJECTING;
            self.status_mask_35 |= STATUS35_EJECTED;
        }
        self.has_disk = false;
        self.real_track_index = TRACK_INVALIDATED;
        Some(std::mem::take(&mut self.disk))
    }

    pub fn is_525(&self) -> bool {
        self.disk.disk_type != DiskType::D35
    }

    fn track_bit_length_for(&self,qtr_track_index: i32) -> u32 {
        let real = self.disk.meta_track_map[qtr_track_index as usize];
        if real != TRACK_EMPTY {
            return self.disk.track_bits_count[real as usize];
        }
        EMPTY_TRACK_BIT_COUNT
    }

    fn read_bit(&self) -> bool {
        let bits = self.disk.track_bits(self.real_track_index);
        let byte = bits.get(self.track_byte_index as usize).copied().unwrap_or(0);
        byte & (1 << self.track_bit_shift) != 0
    }

    fn write_bit(&mut self,value: bool) {
        let byte_index = self.track_byte_index as usize;
        let mask = 1u8 << self.track_bit_shift;
        let bits = self.disk.track_bits_mut(self.real_track_index);
        if let Some(byte) = bits.get_mut(byte_index) {
            if value {
                *byte |= mask;
            } else {
                *byte &= !mask;
            }
        }
    }

    fn read_fake_bit(&mut self) -> bool {
        let bit = self.random_bits.get(self.random_bit_index).unwrap_or(false);
        self.random_bit_index = (self.random_bit_index + 1) % RANDOM_BIT_COUNT;
        bit
    }

    /// Common entry for a drive tick: spindle bookkeeping and the current
    /// bit position, or `INVALID_TRACK_POS` if the drive is off.
    pub fn pre_step(&mut self,io_flags: &mut u32) -> u32 {
        let track_cur_pos = self.track_byte_index * 8 + (7 - self.track_bit_shift.min(7));
        *io_flags &= !(flags::WRPROTECT_SENSE | flags::READ_DATA
            | flags::READ_DATA_FAKE | flags::PULSE_HIGH);
        if *io_flags & flags::DRIVE_ON == 0 {
            self.read_buffer = 0;
            self.is_spindle_on = false;
            return INVALID_TRACK_POS;
        }
        self.is_spindle_on = true;
        track_cur_pos
    }

    /// Settle onto `qtr_track_index`, advance the pulse timer, and read one
    /// bit from the stream when a bit cell expires.
    pub fn step(&mut self,io_flags: &mut u32,qtr_track_index: i32,
                mut track_cur_pos: u32,dt_ns: u32) -> u32 {
        let is_drive_525 = *io_flags & flags::DRIVE_35 == 0;
        if qtr_track_index != self.qtr_track_index && self.has_disk {
            if self.disk.meta_track_map[self.qtr_track_index as usize]
                != self.disk.meta_track_map[qtr_track_index as usize]
            {
                // the arm moved to a different physical track
                self.real_track_index = TRACK_INVALIDATED;
            }
            self.qtr_track_index = qtr_track_index;
        }
        if self.has_disk {
            if self.real_track_index == TRACK_INVALIDATED {
                let track_prev_len = self.track_bit_length;
                self.real_track_index = self.disk.meta_track_map[self.qtr_track_index as usize];
                if self.real_track_index != TRACK_EMPTY {
                    self.track_bit_length = self.track_bit_length_for(self.qtr_track_index);
                } else if self.track_bit_length == 0 {
                    self.track_bit_length = EMPTY_TRACK_BIT_COUNT;
                }
                if track_prev_len != 0 {
                    // keep the same angular position on the new track
                    track_cur_pos = (track_cur_pos as u64 * self.track_bit_length as u64
                        / track_prev_len as u64) as u32;
                }
            }
        } else {
            self.qtr_track_index = qtr_track_index;
            if is_drive_525 {
                // an empty 5.25 bay senses as write protected
                *io_flags |= flags::WRPROTECT_SENSE;
            }
        }
        if self.track_bit_length == 0 {
            self.track_bit_length = EMPTY_TRACK_BIT_COUNT;
        }
        if track_cur_pos >= self.track_bit_length {
            track_cur_pos -= self.track_bit_length;
        }
        self.track_byte_index = track_cur_pos / 8;
        self.track_bit_shift = 7 - track_cur_pos % 8;
        self.pulse_ns = timer_increment(self.pulse_ns,1_000_000,dt_ns);
        if !self.has_disk {
            return track_cur_pos;
        }
        if self.pulse_ns >= self.disk.bit_timing_ns {
            // sentinels (empty, invalidated) never index the track tables
            let valid_disk_data = (self.real_track_index as usize) < QTR_TRACK_LIMIT
                && self.disk.track_initialized[self.real_track_index as usize];
            *io_flags |= flags::PULSE_HIGH;
            // shift a pulse in from the bitstream, with the WOZ-suggested
            // error emulation when the last cells carried no pulses
            self.read_buffer <<= 1;
            if valid_disk_data && self.read_bit() {
                self.read_buffer |= 0x1;
            }
            if is_drive_525 {
                if self.read_buffer & 0xf != 0 && valid_disk_data {
                    if self.read_buffer & 0x2 != 0 {
                        *io_flags |= flags::READ_DATA;
                    }
                } else {
                    *io_flags |= flags::READ_DATA_FAKE;
                    if self.read_fake_bit() {
                        *io_flags |= flags::READ_DATA;
                    }
                }
            } else if self.read_buffer & 0x1 != 0 {
                *io_flags |= flags::READ_DATA;
            }
        }
        track_cur_pos
    }

    /// Disk II compliant positioning: turn the cog, clamp, then settle
    pub fn position_head_525(&mut self,io_flags: &mut u32,in_phase: u32,dt_ns: u32) {
        let track_cur_pos = self.pre_step(io_flags);
        if track_cur_pos == INVALID_TRACK_POS {
            return;
        }
        let qtr_track_delta =
            DISK2_PHASE_STATES[(self.cog_orient & 0x7) as usize][(in_phase & 0xf) as usize];
        self.cog_orient = (self.cog_orient as i32 + qtr_track_delta).rem_euclid(8) as u32;
        let mut qtr_track_index = self.qtr_track_index + qtr_track_delta;
        if qtr_track_index < 0 {
            debug!("drive525: head clack at track 0");
            qtr_track_index = 0;
        } else if qtr_track_index >= 160 {
            qtr_track_index = 159;
        }
        self.ctl_switch = in_phase;
        self.step(io_flags,qtr_track_index,track_cur_pos,dt_ns);
        if self.disk.is_write_protected() {
            *io_flags |= flags::WRPROTECT_SENSE;
        }
    }

    /// Apply the write signal to the track and advance past an expired bit
    /// cell.  Runs after the positioning routine each tick.
    pub fn update_head(&mut self,io_flags: &mut u32) {
        let write_pulse =
            *io_flags & flags::WRITE_HEAD_ON == flags::WRITE_HEAD_ON;
        let write_transition = write_pulse != self.write_pulse;
        if *io_flags & flags::DRIVE_ON == 0 || !self.has_disk {
            return;
        }
        if !self.disk.is_write_protected()
            && *io_flags & flags::WRITE_REQUEST != 0
            && (self.real_track_index as usize) < QTR_TRACK_LIMIT
        {
            let real = self.real_track_index as usize;
            if !self.disk.track_initialized[real] {
                if write_transition {
                    // first write to a fresh track starts at the block head,
                    // as a formatting pass would
                    self.disk.track_initialized[real] = true;
                    self.track_bit_shift = 7;
                    self.track_byte_index = 0;
                }
            }
            if self.disk.track_initialized[real] {
                self.write_bit(write_transition);
            }
        }
        if self.pulse_ns >= self.disk.bit_timing_ns {
            *io_flags |= flags::PULSE_HIGH;
            self.write_pulse = write_pulse;
            if self.track_bit_shift == 0 {
                self.track_bit_shift = 8;
                self.track_byte_index += 1;
                let limit = (self.track_bit_length.max(1) + 7) / 8;
                if self.track_byte_index >= limit {
                    self.track_byte_index = 0;
                }
            }
            self.track_bit_shift -= 1;
            self.pulse_ns = 0;
        } else {
            *io_flags &= !flags::PULSE_HIGH;
        }
    }

    /// Count down the 3.5 inch step/eject timer; used by the 3.5 inch
    /// positioning routine.
    pub fn decrement_step_timer_35(&mut self,dt_ns: u32) -> bool {
        let prev = self.step_timer_35_ns;
        self.step_timer_35_ns = timer_decrement(prev,dt_ns);
        self.step_timer_35_ns == 0 && prev > 0
    }
}

/// The IIGS disk port: two 3.5 inch units on the slot 5 side, two 5.25
/// inch units on the slot 6 side, and the SmartPort chain.
pub struct DriveBay {
    pub slot5: [Drive;2],
    pub slot6: [Drive;2],
    pub smartport: super::smartport::SmartPortBus
}

impl DriveBay {
    pub fn new() -> Self {
        Self {
            slot5: [Drive::new(),Drive::new()],
            slot6: [Drive::new(),Drive::new()],
            smartport: super::smartport::SmartPortBus::new()
        }
    }
    pub fn reset(&mut self) {
        for drive in self.slot5.iter_mut().chain(self.slot6.iter_mut()) {
            drive.reset();
        }
        self.smartport.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::woz;

    fn drive_with_disk() -> Drive {
        let image = woz::build::build_woz2_525(&[(51200,0xff);35]);
        let mut drive = Drive::new();
        drive.insert_disk(woz::from_bytes(&image).expect("test image"));
        drive
    }

    /// the phase sequence 1,2,4,8 walks the cog a full turn, two quarter
    /// tracks per phase
    #[test]
    fn quarter_track_stepping() {
        let mut drive = drive_with_disk();
        drive.cog_orient = 0;
        let mut io_flags = flags::DRIVE_ON;
        drive.position_head_525(&mut io_flags,0x1,1000);
        assert_eq!(drive.qtr_track_index,0);
        drive.position_head_525(&mut io_flags,0x2,1000);
        assert_eq!(drive.qtr_track_index,2);
        drive.position_head_525(&mut io_flags,0x4,1000);
        assert_eq!(drive.qtr_track_index,4);
        drive.position_head_525(&mut io_flags,0x8,1000);
        assert_eq!(drive.qtr_track_index,6);
        drive.position_head_525(&mut io_flags,0x1,1000);
        assert_eq!(drive.qtr_track_index,8);
        assert_eq!(drive.real_track_index,drive.disk.meta_track_map[8]);
    }

    #[test]
    fn no_motion_when_magnet_opposite() {
        let mut drive = drive_with_disk();
        let mut io_flags = flags::DRIVE_ON;
        drive.cog_orient = 0;          // N
        drive.position_head_525(&mut io_flags,0x4,1000);  // S magnet
        assert_eq!(drive.qtr_track_index,0);
        assert_eq!(drive.cog_orient,0);
    }

    #[test]
    fn head_clamps_at_track_zero() {
        let mut drive = drive_with_disk();
        let mut io_flags = flags::DRIVE_ON;
        drive.cog_orient = 0;
        // N then W steps outward from track 0, clamped
        drive.position_head_525(&mut io_flags,0x8,1000);
        assert_eq!(drive.qtr_track_index,0);
    }

    #[test]
    fn bit_cell_read_shifts_buffer() {
        let mut drive = drive_with_disk();
        let mut io_flags = flags::DRIVE_ON;
        // settle on track 0 (all 0xff bits)
        drive.position_head_525(&mut io_flags,0x1,1000);
        for _ in 0..8 {
            let pos = drive.pre_step(&mut io_flags);
            drive.step(&mut io_flags,drive.qtr_track_index,pos,4000);
            assert_ne!(io_flags & flags::READ_DATA,0);
            drive.update_head(&mut io_flags);
        }
        assert_eq!(drive.read_buffer,0xff);
    }

    #[test]
    fn fake_bits_on_blank_stretch() {
        let image = woz::build::build_woz2_525(&[(51200,0x00);35]);
        let mut drive = Drive::new();
        drive.insert_disk(woz::from_bytes(&image).expect("test image"));
        let mut io_flags = flags::DRIVE_ON;
        drive.position_head_525(&mut io_flags,0x1,1000);
        let mut fake_seen = 0;
        for _ in 0..64 {
            let pos = drive.pre_step(&mut io_flags);
            drive.step(&mut io_flags,drive.qtr_track_index,pos,4000);
            if io_flags & flags::READ_DATA_FAKE != 0 {
                fake_seen += 1;
            }
            drive.update_head(&mut io_flags);
        }
        // after 4 zero cells every read is substituted noise
        assert!(fake_seen >= 60);
    }

    #[test]
    fn eject_returns_disk() {
        let mut drive = drive_with_disk();
        assert!(drive.has_disk);
        let disk = drive.eject_disk().expect("disk comes back out");
        assert_eq!(disk.track_count,35);
        assert!(!drive.has_disk);
        assert!(drive.eject_disk().is_none());
    }
}
