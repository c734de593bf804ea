//! # 3.5 inch drive control
//!
//! The 3.5 inch mechanism hides its stepper behind a command interface.
//! PHASE0-2 and HEAD_SEL form a 4-bit code; PHASE3 is the strobe.  With
//! the strobe high-then-low the code executes as a control command; with
//! the strobe low the code selects a status query whose answer drives the
//! WRPROTECT_SENSE line.  Command and query codes follow "Controlling the
//! 3.5 Drive Hardware on the Apple IIGS" (llx.com/Neil/a2/disk).

use log::{debug,info,warn};

use super::drive::{Drive,INVALID_TRACK_POS,
    STATUS35_STEP_IN,STATUS35_IO_HEAD_HI,STATUS35_EJECTED,STATUS35_EJECTING,STATUS35_STROBE};
use super::flags;

const CTL_STEP_IN: u32 = 0x00;
const CTL_STEP_OUT: u32 = 0x01;
const CTL_EJECTED_RESET: u32 = 0x03;
const CTL_STEP_ONE: u32 = 0x04;
const CTL_MOTOR_ON: u32 = 0x08;
const CTL_MOTOR_OFF: u32 = 0x09;
const CTL_EJECT: u32 = 0x0d;

const QUERY_STEP_DIR: u32 = 0x00;
const QUERY_IO_HEAD_LOWER: u32 = 0x01;
const QUERY_DISK_IN_DRIVE: u32 = 0x02;
const QUERY_IO_HEAD_UPPER: u32 = 0x03;
const QUERY_IS_STEPPING: u32 = 0x04;
const QUERY_WRITE_PROTECT: u32 = 0x06;
const QUERY_MOTOR_ON: u32 = 0x08;
const QUERY_DOUBLE_SIDED: u32 = 0x09;
const QUERY_TRACK_0: u32 = 0x0a;
const QUERY_READ_READY: u32 = 0x0b;
const QUERY_EJECTED: u32 = 0x0c;
const QUERY_60HZ_ROTATION: u32 = 0x0e;
const QUERY_ENABLED: u32 = 0x0f;

pub const STEP_TIME_NS: u32 = 12 * 1000;
pub const EJECT_TIME_NS: u32 = 500 * 1_000_000;

/// One 3.5 inch tick: command/query dispatch, step/eject timers, then the
/// shared bit-stream step.
pub fn read_and_position_head_35(drive: &mut Drive,io_flags: &mut u32,
                                 in_phase: u32,dt_ns: u32) {
    let mut sense_out = false;
    let ctl_strobe = in_phase & 0x8 != 0;
    let mut qtr_track_index = drive.qtr_track_index;

    let track_cur_pos = drive.pre_step(io_flags);
    if track_cur_pos == INVALID_TRACK_POS {
        return;
    }

    if drive.decrement_step_timer_35(dt_ns) {
        // step or eject completed
        if drive.status_mask_35 & STATUS35_EJECTING != 0 {
            drive.status_mask_35 &= !STATUS35_EJECTING;
            drive.status_mask_35 |= STATUS35_EJECTED;
            drive.has_disk = false;
            info!("drive35: ejected disk");
        } else if drive.status_mask_35 & STATUS35_STEP_IN != 0 {
            if qtr_track_index < 158 {
                qtr_track_index += 2;
                debug!("drive35: stepped in, track = {}",qtr_track_index);
            }
        } else if qtr_track_index >= 2 {
            qtr_track_index -= 2;
            debug!("drive35: stepped out, track = {}",qtr_track_index);
        }
    }

    let mut ctl_switch = if *io_flags & flags::HEAD_SEL != 0 { 0x2 } else { 0x0 };
    ctl_switch |= (in_phase >> 2) & 0x1;        // PHASE2
    ctl_switch |= (in_phase << 2) & 0x4;        // PHASE0
    ctl_switch |= (in_phase << 2) & 0x8;        // PHASE1

    if ctl_strobe {
        drive.status_mask_35 |= STATUS35_STROBE;
    } else if drive.status_mask_35 & STATUS35_STROBE != 0 {
        drive.status_mask_35 &= !STATUS35_STROBE;
        // strobe released, perform the command now
        match ctl_switch {
            CTL_STEP_IN => {
                drive.status_mask_35 |= STATUS35_STEP_IN;
                debug!("drive35: step direction inward");
            },
            CTL_STEP_OUT => {
                drive.status_mask_35 &= !STATUS35_STEP_IN;
                debug!("drive35: step direction outward");
            },
            CTL_EJECTED_RESET => {
                drive.status_mask_35 &= !STATUS35_EJECTED;
            },
            CTL_STEP_ONE => {
                if drive.status_mask_35 & STATUS35_EJECTING == 0 {
                    drive.step_timer_35_ns = STEP_TIME_NS;
                    debug!("drive35: step from track {}",qtr_track_index);
                } else {
                    warn!("drive35: attempt to step while ejecting");
                }
            },
            CTL_MOTOR_ON => {
                if !drive.is_spindle_on {
                    drive.is_spindle_on = true;
                    drive.pulse_ns = 0;
                    drive.read_buffer = 0;
                }
                debug!("drive35: drive motor on");
            },
            CTL_MOTOR_OFF => {
                drive.is_spindle_on = false;
                debug!("drive35: drive motor off");
            },
            CTL_EJECT => {
                if drive.status_mask_35 & STATUS35_EJECTING == 0 {
                    drive.is_spindle_on = false;
                    drive.status_mask_35 |= STATUS35_EJECTING;
                    drive.step_timer_35_ns = EJECT_TIME_NS;
                    info!("drive35: ejecting disk");
                }
            },
            _ => {
                warn!("drive35: control {:02X} not supported",ctl_switch);
            }
        }
    } else {
        // strobe low selects a status query on the sense line
        match ctl_switch {
            QUERY_STEP_DIR => {
                sense_out = drive.status_mask_35 & STATUS35_STEP_IN == 0;
            },
            QUERY_DISK_IN_DRIVE => {
                sense_out = !drive.has_disk;
            },
            QUERY_IS_STEPPING => {
                sense_out = drive.step_timer_35_ns == 0;
            },
            QUERY_WRITE_PROTECT => {
                sense_out = drive.has_disk && !drive.disk.is_write_protected();
            },
            QUERY_MOTOR_ON => {
                sense_out = !drive.is_spindle_on;
            },
            QUERY_TRACK_0 => {
                sense_out = drive.qtr_track_index != 0;
            },
            QUERY_EJECTED => {
                sense_out = drive.status_mask_35 & STATUS35_EJECTED == 0;
            },
            QUERY_60HZ_ROTATION => {
                // sense line stays low for this query
            },
            QUERY_IO_HEAD_LOWER => {
                if drive.status_mask_35 & STATUS35_IO_HEAD_HI != 0 {
                    qtr_track_index -= 1;
                    drive.status_mask_35 &= !STATUS35_IO_HEAD_HI;
                }
            },
            QUERY_IO_HEAD_UPPER => {
                if drive.status_mask_35 & STATUS35_IO_HEAD_HI == 0 {
                    qtr_track_index += 1;
                    drive.status_mask_35 |= STATUS35_IO_HEAD_HI;
                }
            },
            QUERY_DOUBLE_SIDED => {
                sense_out = drive.has_disk && drive.disk.is_double_sided();
            },
            QUERY_READ_READY => {
                sense_out = drive.step_timer_35_ns > 0;
            },
            QUERY_ENABLED => {
                sense_out = false;
            },
            _ => {
                warn!("drive35: query {:02X} not supported",ctl_switch);
            }
        }
    }
    drive.ctl_switch = ctl_switch;

    drive.step(io_flags,qtr_track_index,track_cur_pos,dt_ns);

    if sense_out {
        *io_flags |= flags::WRPROTECT_SENSE;
    } else {
        *io_flags &= !flags::WRPROTECT_SENSE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::woz::{self,NibbleDisk,DiskType};

    fn disk35() -> NibbleDisk {
        let mut disk = NibbleDisk::default();
        disk.disk_type = DiskType::D35;
        disk.bit_timing_ns = 2000;
        disk.flags = woz::FLAG_DOUBLE_SIDED;
        disk.track_count = 160;
        disk.meta_track_map = [0;160];
        for idx in 0..160 {
            disk.meta_track_map[idx] = (idx / 2) as u8;
        }
        disk.track_bits_count = [51200;160];
        disk.track_byte_count = [6400;160];
        let mut offset = 0;
        for idx in 0..160 {
            disk.track_byte_offset[idx] = offset;
            offset += 6400;
        }
        disk.track_initialized = [true;160];
        disk.bits_data = vec![0xff;160 * 6400];
        disk
    }

    fn command(drive: &mut Drive,io_flags: &mut u32,code: u32) {
        // code bit layout: ph1 ph0 headsel ph2
        let phase = |strobe: bool| {
            let mut in_phase = (code >> 2) & 0x1;       // PHASE0
            in_phase |= (code >> 2) & 0x2;              // PHASE1
            in_phase |= (code & 0x1) << 2;              // PHASE2
            if strobe { in_phase |= 0x8; }
            in_phase
        };
        if code & 0x2 != 0 {
            *io_flags |= flags::HEAD_SEL;
        } else {
            *io_flags &= !flags::HEAD_SEL;
        }
        read_and_position_head_35(drive,io_flags,phase(true),1000);
        read_and_position_head_35(drive,io_flags,phase(false),1000);
    }

    fn query(drive: &mut Drive,io_flags: &mut u32,code: u32) -> bool {
        if code & 0x2 != 0 {
            *io_flags |= flags::HEAD_SEL;
        } else {
            *io_flags &= !flags::HEAD_SEL;
        }
        let mut in_phase = (code >> 2) & 0x1;
        in_phase |= (code >> 2) & 0x2;
        in_phase |= (code & 0x1) << 2;
        read_and_position_head_35(drive,io_flags,in_phase,1000);
        *io_flags & flags::WRPROTECT_SENSE != 0
    }

    #[test]
    fn step_one_advances_after_timer() {
        let mut drive = Drive::new();
        drive.insert_disk(disk35());
        let mut io_flags = flags::DRIVE_ON | flags::DRIVE_35;
        command(&mut drive,&mut io_flags,CTL_STEP_IN);
        command(&mut drive,&mut io_flags,CTL_STEP_ONE);
        assert!(drive.step_timer_35_ns > 0);
        // run past the 12us step time
        read_and_position_head_35(&mut drive,&mut io_flags,0,STEP_TIME_NS + 1000);
        assert_eq!(drive.qtr_track_index,2);
    }

    #[test]
    fn disk_in_drive_query() {
        let mut drive = Drive::new();
        let mut io_flags = flags::DRIVE_ON | flags::DRIVE_35;
        // empty drive senses high (no disk)
        assert!(query(&mut drive,&mut io_flags,QUERY_DISK_IN_DRIVE));
        drive.insert_disk(disk35());
        assert!(!query(&mut drive,&mut io_flags,QUERY_DISK_IN_DRIVE));
    }

    #[test]
    fn sixty_hz_query_senses_low() {
        let mut drive = Drive::new();
        drive.insert_disk(disk35());
        let mut io_flags = flags::DRIVE_ON | flags::DRIVE_35;
        assert!(!query(&mut drive,&mut io_flags,QUERY_60HZ_ROTATION));
    }

    #[test]
    fn head_select_shifts_quarter_track() {
        let mut drive = Drive::new();
        drive.insert_disk(disk35());
        let mut io_flags = flags::DRIVE_ON | flags::DRIVE_35;
        query(&mut drive,&mut io_flags,QUERY_IO_HEAD_UPPER);
        assert_eq!(drive.qtr_track_index,1);
        query(&mut drive,&mut io_flags,QUERY_IO_HEAD_LOWER);
        assert_eq!(drive.qtr_track_index,0);
    }
}
