//! # IWM floppy controller
//!
//! A self-contained state machine on the disk port, driven by the C0E0-EF
//! switches and synchronized against the master clock one bit cell at a
//! time.  Q6 and Q7 select among read-data, read-status, read-handshake
//! and write states; the Disk II logic state sequencer shifts pulses into
//! the latch during reads and shifts the latch out as a write signal, and
//! an asynchronous write sequencer handles the 3.5 inch / SmartPort side.
//!
//! 1982 IWM specification:
//! http://www.brutaldeluxe.fr/documentation/iwm/apple2_IWM_Spec_Rev19_1982.pdf

pub mod drive;
pub mod drive35;
pub mod smartport;

pub use drive::{Drive,DriveBay};

use log::{debug,warn};

use crate::clock::{TimeSpec,timer_decrement};
use crate::mem::MemOp;

/// Disk port I/O line bits shared by the controller and the drives
pub mod flags {
    pub const DRIVE_35: u32 = 0x0000_0001;
    pub const DRIVE_ON: u32 = 0x0000_0002;
    pub const DRIVE_1: u32 = 0x0000_0004;
    pub const DRIVE_2: u32 = 0x0000_0008;
    pub const DRIVE_ANY: u32 = DRIVE_1 | DRIVE_2;
    pub const HEAD_SEL: u32 = 0x0000_0010;
    pub const WRITE_REQUEST: u32 = 0x0000_0020;
    pub const WRPROTECT_SENSE: u32 = 0x0000_0040;
    pub const READ_DATA: u32 = 0x0000_0080;
    pub const WRITE_DATA: u32 = 0x0000_0100;
    pub const PULSE_HIGH: u32 = 0x0000_0200;
    pub const READ_DATA_FAKE: u32 = 0x0000_0400;
    /// both lines high means the head is actually magnetizing the surface
    pub const WRITE_HEAD_ON: u32 = WRITE_REQUEST | WRITE_DATA;
}

/// IWM access states from the Q6/Q7 switch combination
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum IwmState {
    ReadData,
    ReadStatus,
    ReadHandshake,
    WriteMode,
    WriteData,
    Unknown
}

impl IwmState {
    pub fn is_write(&self) -> bool {
        matches!(self,IwmState::WriteMode | IwmState::WriteData)
    }
}

/*  Disk II logic state sequencer ROM, the combined read/write program from
    Understanding the Apple IIe.  Indexed by
    (state << 4) | (q7 << 3) | (q6 << 2) | (latch_msb << 1) | !read_pulse;
    each entry packs the next state in the high nibble and a command in the
    low nibble (0x CLR, 8 NOP, 9 SL0, A/E SR, B/F LD, D SL1).
*/
const LSS_ROM: [u8;256] = [
    0x18, 0x18, 0x18, 0x18, 0x0a, 0x0a, 0x0a, 0x0a, 0x18, 0x18, 0x18, 0x18, 0x18, 0x18, 0x18, 0x18,
    0x2d, 0x2d, 0x38, 0x38, 0x0a, 0x0a, 0x0a, 0x0a, 0x28, 0x28, 0x28, 0x28, 0x28, 0x28, 0x28, 0x28,
    0xd8, 0x38, 0x08, 0x28, 0x0a, 0x0a, 0x0a, 0x0a, 0x39, 0x39, 0x39, 0x39, 0x3b, 0x3b, 0x3b, 0x3b,
    0xd8, 0x48, 0x48, 0x48, 0x0a, 0x0a, 0x0a, 0x0a, 0x48, 0x48, 0x48, 0x48, 0x48, 0x48, 0x48, 0x48,
    0xd8, 0x58, 0xd8, 0x58, 0x0a, 0x0a, 0x0a, 0x0a, 0x58, 0x58, 0x58, 0x58, 0x58, 0x58, 0x58, 0x58,
    0xd8, 0x68, 0xd8, 0x68, 0x0a, 0x0a, 0x0a, 0x0a, 0x68, 0x68, 0x68, 0x68, 0x68, 0x68, 0x68, 0x68,
    0xd8, 0x78, 0xd8, 0x78, 0x0a, 0x0a, 0x0a, 0x0a, 0x78, 0x78, 0x78, 0x78, 0x78, 0x78, 0x78, 0x78,
    0xd8, 0x88, 0xd8, 0x88, 0x0a, 0x0a, 0x0a, 0x0a, 0x08, 0x08, 0x88, 0x88, 0x08, 0x08, 0x88, 0x88,
    0xd8, 0x98, 0xd8, 0x98, 0x0a, 0x0a, 0x0a, 0x0a, 0x98, 0x98, 0x98, 0x98, 0x98, 0x98, 0x98, 0x98,
    0xd8, 0x29, 0xd8, 0xa8, 0x0a, 0x0a, 0x0a, 0x0a, 0xa8, 0xa8, 0xa8, 0xa8, 0xa8, 0xa8, 0xa8, 0xa8,
    0xcd, 0xbd, 0xd8, 0xb8, 0x0a, 0x0a, 0x0a, 0x0a, 0xb9, 0xb9, 0xb9, 0xb9, 0xbb, 0xbb, 0xbb, 0xbb,
    0xd9, 0x59, 0xd8, 0xc8, 0x0a, 0x0a, 0x0a, 0x0a, 0xc8, 0xc8, 0xc8, 0xc8, 0xc8, 0xc8, 0xc8, 0xc8,
    0xd9, 0xd9, 0xd8, 0xa0, 0x0a, 0x0a, 0x0a, 0x0a, 0xd8, 0xd8, 0xd8, 0xd8, 0xd8, 0xd8, 0xd8, 0xd8,
    0xd8, 0x08, 0xe8, 0xe8, 0x0a, 0x0a, 0x0a, 0x0a, 0xe8, 0xe8, 0xe8, 0xe8, 0xe8, 0xe8, 0xe8, 0xe8,
    0xfd, 0xfd, 0xf8, 0xf8, 0x0a, 0x0a, 0x0a, 0x0a, 0xf8, 0xf8, 0xf8, 0xf8, 0xf8, 0xf8, 0xf8, 0xf8,
    0xdd, 0x4d, 0xe0, 0xe0, 0x0a, 0x0a, 0x0a, 0x0a, 0x88, 0x88, 0x08, 0x08, 0x88, 0x88, 0x08, 0x08
];

//  write sequencer status bits (upper half of lss_write_reg)
const WRITE_REG_STATUS_MASK: u32 = 0xffff_0000;
const WRITE_REG_ASYNC_ACTIVE: u32 = 0x8000_0000;
const WRITE_REG_ASYNC_UNDERRUN: u32 = 0x2000_0000;
const WRITE_REG_LATCH: u32 = 0x0800_0000;
const WRITE_REG_LATCH_QA: u32 = 0x0400_0000;
const WRITE_REG_DATA: u32 = 0x0100_0000;

/// how long a data access keeps the controller "busy" for fast-disk hosts
const DATA_ACCESS_NS_EXPIRATION: u32 = 500_000_000;
const ONE_SECOND_NS: u32 = 1_000_000_000;

pub struct Iwm {
    pub io_flags: u32,
    pub out_phase: u32,
    pub data: u8,
    pub latch: u8,
    pub disk_motor_on: u8,
    pub q6_switch: bool,
    pub q7_switch: bool,
    pub timer_1sec_disabled: bool,
    pub async_mode: bool,
    pub latch_mode: bool,
    pub clock_8mhz: bool,
    pub state: IwmState,
    pub lss_state: u8,
    lss_write_reg: u32,
    pub bit_cell_ns: u32,
    pub drive_hold_ns: u32,
    data_access_time_ns: u32,
    cur_clocks_ts: u64,
    last_write_clocks_ts: u64,
    pub smartport_active: bool
}

impl Iwm {
    pub fn new() -> Self {
        Self {
            io_flags: 0,
            out_phase: 0,
            data: 0,
            latch: 0,
            disk_motor_on: 0,
            q6_switch: false,
            q7_switch: false,
            timer_1sec_disabled: false,
            async_mode: false,
            latch_mode: false,
            clock_8mhz: false,
            state: IwmState::Unknown,
            lss_state: 0,
            lss_write_reg: 0,
            bit_cell_ns: 4000,
            drive_hold_ns: 0,
            data_access_time_ns: 0,
            cur_clocks_ts: 0,
            last_write_clocks_ts: 0,
            smartport_active: false
        }
    }

    pub fn reset(&mut self,tspec: &TimeSpec) {
        *self = Self::new();
        self.cur_clocks_ts = tspec.clocks_spent;
    }

    fn select_drive<'a>(&self,drives: &'a mut DriveBay) -> Option<&'a mut Drive> {
        let bank = if self.io_flags & flags::DRIVE_35 != 0 {
            &mut drives.slot5
        } else {
            &mut drives.slot6
        };
        if self.io_flags & flags::DRIVE_1 != 0 {
            Some(&mut bank[0])
        } else if self.io_flags & flags::DRIVE_2 != 0 {
            Some(&mut bank[1])
        } else {
            None
        }
    }

    /// True while the selected drive (or the SmartPort chain) is doing real
    /// work; hosts use this to gate fast-disk optimizations.
    pub fn is_active(&self,drives: &DriveBay) -> bool {
        if self.io_flags & flags::DRIVE_ON == 0 {
            return false;
        }
        if self.smartport_active && drives.smartport.has_device() {
            return true;
        }
        let bank = if self.io_flags & flags::DRIVE_35 != 0 { &drives.slot5 } else { &drives.slot6 };
        let drive = if self.io_flags & flags::DRIVE_1 != 0 {
            &bank[0]
        } else if self.io_flags & flags::DRIVE_2 != 0 {
            &bank[1]
        } else {
            return false;
        };
        drive.has_disk && drive.is_spindle_on && self.data_access_time_ns > 0
    }

    fn drive_switch(&mut self,drives: &mut DriveBay,io_flags: u32) {
        if io_flags == self.io_flags {
            return;
        }
        if let Some(drive) = self.select_drive(drives) {
            drive.is_spindle_on = false;
        }
        self.io_flags = io_flags;
    }

    fn drive_off(&mut self,drives: &mut DriveBay) {
        self.drive_switch(drives,self.io_flags & !flags::DRIVE_ON);
        debug!("iwm: turning drive off now");
    }

    fn reset_lss(&mut self,drives: &mut DriveBay) {
        self.drive_hold_ns = 0;
        if let Some(drive) = self.select_drive(drives) {
            drive.start();
        }
    }

    /// One synchronous LSS cycle.  Returns the write signal level.
    fn lss(&mut self,ts: u64) -> bool {
        let adr = ((self.lss_state as usize) << 4)
            | if self.q7_switch { 0x08 } else { 0x00 }
            | if self.q6_switch { 0x04 } else { 0x00 }
            | if self.latch & 0x80 != 0 { 0x02 } else { 0x00 }
            | if self.io_flags & flags::READ_DATA != 0 { 0x00 } else { 0x01 };
        let cmd = LSS_ROM[adr];
        if cmd & 0x08 != 0 {
            match cmd & 0xf {
                0x08 | 0x0c => {},
                0x09 => {
                    // SL0
                    self.latch <<= 1;
                    if self.lss_write_reg & WRITE_REG_LATCH != 0 {
                        let counter = (self.lss_write_reg & !WRITE_REG_STATUS_MASK) + 1;
                        self.lss_write_reg =
                            (self.lss_write_reg & WRITE_REG_STATUS_MASK) | counter;
                    }
                },
                0x0a | 0x0e => {
                    // SR, write protect shifts in high
                    self.latch >>= 1;
                    if self.io_flags & flags::WRPROTECT_SENSE != 0 {
                        self.latch |= 0x80;
                    }
                },
                0x0b | 0x0f => {
                    // LD from the data register
                    self.latch = self.data;
                    self.lss_write_reg &= !WRITE_REG_DATA;
                    if self.state.is_write() {
                        self.lss_write_reg = WRITE_REG_LATCH | 1;
                        self.last_write_clocks_ts = ts;
                    } else {
                        warn!("iwm: load byte {:02X} while reading?",self.data);
                    }
                },
                0x0d => {
                    // SL1
                    self.latch = (self.latch << 1) | 0x01;
                },
                _ => {}
            }
        } else {
            // CLR
            self.latch = 0;
        }
        self.lss_state = (cmd & 0xf0) >> 4;
        self.lss_state & 0x8 != 0
    }

    /// Asynchronous write sequencer for 3.5 inch and SmartPort targets.
    /// A full bit cell is 8 sequencer clocks; the initial latch load takes
    /// half a cell, after which the latch reloads from the data register
    /// every 64 clocks and shifts every 8.
    fn lss_write_async(&mut self,ts: u64) -> bool {
        let mut clock_counter = self.lss_write_reg & !WRITE_REG_STATUS_MASK;
        let mut write_signal = self.lss_write_reg & WRITE_REG_LATCH_QA != 0;
        if self.lss_write_reg & WRITE_REG_ASYNC_ACTIVE == 0 {
            if clock_counter == 4 {
                // half bit-cell initial delay per the IWM spec
                self.lss_write_reg |= WRITE_REG_ASYNC_ACTIVE;
                self.lss_write_reg &= WRITE_REG_STATUS_MASK;
            }
        }
        if self.lss_write_reg & WRITE_REG_ASYNC_ACTIVE != 0 {
            clock_counter = self.lss_write_reg & !WRITE_REG_STATUS_MASK;
            if clock_counter % 64 == 0 {
                self.latch = self.data;
                if self.lss_write_reg & WRITE_REG_DATA == 0 {
                    // set until cleared by a mode switch (SWIM ref p.11)
                    self.lss_write_reg |= WRITE_REG_ASYNC_UNDERRUN;
                }
                self.lss_write_reg &= !WRITE_REG_DATA;
                self.lss_write_reg |= WRITE_REG_LATCH;
                self.last_write_clocks_ts = ts;
            }
            if clock_counter % 8 == 0 {
                if self.latch & 0x80 != 0 {
                    // one bits pulse the signal at precise cell intervals,
                    // null bits leave it alone
                    if self.lss_write_reg & WRITE_REG_LATCH_QA == 0 {
                        write_signal = true;
                        self.lss_write_reg |= WRITE_REG_LATCH_QA;
                    } else {
                        write_signal = false;
                        self.lss_write_reg &= !WRITE_REG_LATCH_QA;
                    }
                }
                self.latch <<= 1;
            }
        }
        clock_counter += 1;
        self.lss_write_reg = (self.lss_write_reg & WRITE_REG_STATUS_MASK) | clock_counter;
        write_signal
    }

    /// Advance the controller to the master clock, one bit cell at a time
    pub fn glu_sync(&mut self,drives: &mut DriveBay,tspec: &TimeSpec) {
        let bit_cell_clocks = tspec.clocks_from_ns(self.bit_cell_ns) as u64;
        if bit_cell_clocks == 0 {
            return;
        }
        if self.io_flags & flags::DRIVE_ON != 0 {
            let delta_ns_total =
                tspec.ns_from_clocks(tspec.clocks_spent.saturating_sub(self.cur_clocks_ts)) as u32;
            while self.cur_clocks_ts + bit_cell_clocks <= tspec.clocks_spent {
                self.step(drives,self.cur_clocks_ts);
                self.cur_clocks_ts += bit_cell_clocks;
            }
            // the 1 second drive motor hold
            if self.drive_hold_ns > 0 {
                self.drive_hold_ns = timer_decrement(self.drive_hold_ns,delta_ns_total);
                if self.drive_hold_ns == 0 || self.timer_1sec_disabled {
                    debug!("iwm: drive motor hold expired");
                    self.drive_off(drives);
                }
            }
        } else {
            // keep the phase of the bit cell stream while idle
            let lag = tspec.clocks_spent.saturating_sub(self.cur_clocks_ts);
            self.cur_clocks_ts = tspec.clocks_spent - lag % bit_cell_clocks;
        }
    }

    /// One bit-cell tick: write signal generation, SmartPort bus, then the
    /// physical drive.
    fn step(&mut self,drives: &mut DriveBay,ts: u64) {
        let is_35 = self.io_flags & flags::DRIVE_35 != 0;
        //  the IWM only supports async writes on the 3.5/SmartPort side
        if self.state.is_write() {
            if self.io_flags & flags::WRITE_REQUEST == 0 {
                self.io_flags |= flags::WRITE_REQUEST;
                if let Some(drive) = self.select_drive(drives) {
                    drive.write_pulse = false;
                }
            }
        }
        let write_signal = if self.state.is_write()
            && self.async_mode
            && (is_35 || self.smartport_active)
        {
            self.lss_write_async(ts)
        } else {
            self.lss(ts)
        };
        if self.state.is_write() {
            if write_signal {
                self.io_flags |= flags::WRITE_DATA;
            } else {
                self.io_flags &= !flags::WRITE_DATA;
            }
        } else {
            self.io_flags &= !(flags::WRITE_REQUEST | flags::WRITE_DATA);
            // the bus sees the latch; IIGS latch mode would hold a
            // completed byte here for a fixed window
            self.data = self.latch;
        }

        if !is_35 {
            self.smartport_active = drives.smartport.bus(
                &mut self.io_flags,&mut self.out_phase,&mut self.data,self.bit_cell_ns);
        } else {
            self.smartport_active = false;
        }

        if !self.smartport_active {
            let is_drive_1 = self.io_flags & flags::DRIVE_1 != 0;
            let is_drive_2 = self.io_flags & flags::DRIVE_2 != 0;
            if is_drive_1 || is_drive_2 {
                let bank = if is_35 { &mut drives.slot5 } else { &mut drives.slot6 };
                let drive = if is_drive_1 { &mut bank[0] } else { &mut bank[1] };
                let out_phase = self.out_phase;
                let bit_cell_ns = self.bit_cell_ns;
                if is_35 {
                    drive35::read_and_position_head_35(drive,&mut self.io_flags,out_phase,bit_cell_ns);
                } else {
                    drive.position_head_525(&mut self.io_flags,out_phase,bit_cell_ns);
                }
                drive.update_head(&mut self.io_flags);
            }
        }
        self.data_access_time_ns =
            timer_decrement(self.data_access_time_ns,self.bit_cell_ns);
    }

    /// Access state from Q6/Q7 (write-data requires the drive to be on)
    fn access_state(&self) -> IwmState {
        match (self.q7_switch,self.q6_switch) {
            (false,false) => IwmState::ReadData,
            (false,true) => IwmState::ReadStatus,
            (true,false) => IwmState::ReadHandshake,
            (true,true) => {
                if self.io_flags & flags::DRIVE_ON != 0 {
                    IwmState::WriteData
                } else {
                    IwmState::WriteMode
                }
            }
        }
    }

    /// Handle the C0E0-EF switch side effects shared by reads and writes
    fn io_switch(&mut self,drives: &mut DriveBay,ioreg: u8) {
        let current_state = self.state;
        match ioreg {
            0xe8 => {
                // drive disable arms the 1 second hold
                if self.io_flags & flags::DRIVE_ON != 0 {
                    if self.timer_1sec_disabled {
                        self.drive_off(drives);
                    } else if self.drive_hold_ns == 0 {
                        self.drive_hold_ns = ONE_SECOND_NS;
                    }
                    self.data_access_time_ns = 0;
                }
            },
            0xe9 => {
                if self.io_flags & flags::DRIVE_ON == 0 {
                    debug!("iwm: turning drive on");
                    self.drive_switch(drives,self.io_flags | flags::DRIVE_ON);
                    self.reset_lss(drives);
                } else if self.drive_hold_ns > 0 {
                    self.drive_hold_ns = 0;
                }
            },
            0xea => {
                self.drive_switch(drives,self.io_flags & !flags::DRIVE_2);
                if self.io_flags & flags::DRIVE_1 == 0 {
                    self.drive_switch(drives,self.io_flags | flags::DRIVE_1);
                    self.reset_lss(drives);
                }
            },
            0xeb => {
                self.drive_switch(drives,self.io_flags & !flags::DRIVE_1);
                if self.io_flags & flags::DRIVE_2 == 0 {
                    self.drive_switch(drives,self.io_flags | flags::DRIVE_2);
                    self.reset_lss(drives);
                }
            },
            0xec => self.q6_switch = false,
            0xed => self.q6_switch = true,
            0xee => self.q7_switch = false,
            0xef => self.q7_switch = true,
            0xe0..=0xe7 => {
                let phase = (ioreg - 0xe0) >> 1;
                if ioreg & 1 != 0 {
                    self.out_phase |= 1 << phase;
                } else {
                    self.out_phase &= !(1u32 << phase);
                }
            },
            _ => {}
        }
        self.state = self.access_state();
        if current_state != self.state {
            // async selection is armed only on a fresh entry to a write
            // state (sync/async toggles mid-write leave the sequencer be)
            if !current_state.is_write() && self.state.is_write() {
                self.lss_state = 0;     // initial write sequence
                self.lss_write_reg = 0;
            }
            if current_state.is_write() && !self.state.is_write() {
                self.lss_state = 2;     // initial read sequence
                self.lss_write_reg = 0;
            }
        }
    }

    /// C036 slow/fast gate: while a motor-detect bit matches a spinning
    /// drive the whole machine drops to the Mega II step.
    pub fn speed_disk_gate(&mut self,speed_c036: u8,tspec: &mut TimeSpec) {
        let old_motor_on = self.disk_motor_on;
        let slot_mask = speed_c036 & 0x0f;
        let drive_on = self.io_flags & flags::DRIVE_ON != 0;
        let drive_35 = self.io_flags & flags::DRIVE_35 != 0;
        self.disk_motor_on = 0;
        if slot_mask & 0x2 != 0 && drive_35 && drive_on {
            self.disk_motor_on |= 0x02;
        }
        if slot_mask & 0x4 != 0 && !drive_35 && drive_on {
            self.disk_motor_on |= 0x04;
        }
        if self.disk_motor_on != 0 {
            if old_motor_on == 0 {
                debug!("iwm: disk gate slow {:02X}",self.disk_motor_on);
            }
            tspec.clocks_step = tspec.clocks_step_mega2;
            return;
        }
        if speed_c036 & 0x80 != 0 {
            tspec.clocks_step = tspec.clocks_step_fast;
        } else {
            tspec.clocks_step = tspec.clocks_step_mega2;
        }
        if old_motor_on != 0 {
            debug!("iwm: disk gate restored {:02X}",speed_c036);
        }
    }

    pub fn disk_motor_gated(&self) -> bool {
        self.disk_motor_on != 0
    }

    fn write_mode(&mut self,value: u8) {
        self.clock_8mhz = value & 0x10 != 0;
        if self.clock_8mhz {
            warn!("iwm: 8mhz clock requested and ignored");
        }
        if value & 0x08 != 0 {
            self.bit_cell_ns = 2000;
            debug!("iwm: fast mode");
        } else {
            self.bit_cell_ns = 4000;
            debug!("iwm: slow mode");
        }
        self.timer_1sec_disabled = value & 0x04 != 0;
        self.async_mode = value & 0x02 != 0;
        self.latch_mode = value & 0x01 != 0;
    }

    fn read_status(&self) -> u8 {
        let mut result = 0;
        if self.io_flags & flags::DRIVE_ON != 0 && self.io_flags & flags::DRIVE_ANY != 0 {
            result |= 0x20;
        }
        if self.io_flags & flags::WRPROTECT_SENSE != 0 {
            result |= 0x80;
        }
        if self.clock_8mhz {
            result |= 0x10;
        }
        if self.bit_cell_ns == 2000 {
            result |= 0x08;
        }
        if self.timer_1sec_disabled {
            result |= 0x04;
        }
        if self.async_mode {
            result |= 0x02;
        }
        if self.latch_mode {
            result |= 0x01;
        }
        result
    }

    fn read_handshake(&mut self,ts: u64,is_noop: bool) -> u8 {
        let mut result = 0x80u8;
        result |= 0x1f;     // SWIM ref p.11: bits 0-4 always read 1
        if self.lss_write_reg & WRITE_REG_ASYNC_ACTIVE != 0 {
            if self.lss_write_reg & WRITE_REG_DATA != 0 {
                // data register still full, not yet latched
                result &= !0x80;
            }
            if self.lss_write_reg & WRITE_REG_ASYNC_UNDERRUN != 0 {
                if !is_noop {
                    let ns = crate::clock::MEGA2_CYCLE_NS as u64;
                    debug!("iwm: async underrun, write latch {:02X}, dt {} clk ({}ns ref)",
                        self.latch,ts.saturating_sub(self.last_write_clocks_ts),ns);
                }
            } else {
                result |= 0x40;
            }
        }
        result
    }

    /// C031 disk interface register and the C0E0-EF switch reads
    pub fn read_switch(&mut self,drives: &mut DriveBay,tspec: &mut TimeSpec,
                       ioreg: u8,op: MemOp) -> u8 {
        let is_noop = op == MemOp::Null;
        match ioreg {
            0x31 => {
                let mut result = 0;
                if self.io_flags & flags::HEAD_SEL != 0 {
                    result |= 0x80;
                }
                if self.io_flags & flags::DRIVE_35 != 0 {
                    result |= 0x40;
                }
                result
            },
            _ => {
                if !is_noop {
                    self.glu_sync(drives,tspec);
                    self.io_switch(drives,ioreg);
                }
                if ioreg & 1 != 0 {
                    return 0;
                }
                match self.state {
                    IwmState::ReadStatus => self.read_status(),
                    IwmState::ReadHandshake => self.read_handshake(tspec.clocks_spent,is_noop),
                    _ => {
                        if !is_noop {
                            self.data_access_time_ns = DATA_ACCESS_NS_EXPIRATION;
                        }
                        if self.smartport_active && self.io_flags & flags::DRIVE_ON == 0 {
                            // all ones when the bus is empty (SWIM ref p.11)
                            0xff
                        } else {
                            self.data
                        }
                    }
                }
            }
        }
    }

    /// C031 disk interface register and the C0E0-EF switch writes
    pub fn write_switch(&mut self,drives: &mut DriveBay,tspec: &mut TimeSpec,
                        ioreg: u8,value: u8) {
        match ioreg {
            0x31 => {
                let old_io_flags = self.io_flags;
                if value & 0x80 != 0 {
                    self.io_flags |= flags::HEAD_SEL;
                } else {
                    self.io_flags &= !flags::HEAD_SEL;
                }
                if value & 0x40 != 0 {
                    if old_io_flags & flags::DRIVE_35 == 0 {
                        debug!("iwm: 3.5 drive mode");
                        self.drive_switch(drives,self.io_flags | flags::DRIVE_35);
                    }
                } else if old_io_flags & flags::DRIVE_35 != 0 {
                    debug!("iwm: 5.25 drive mode");
                    self.drive_switch(drives,self.io_flags & !flags::DRIVE_35);
                }
                if value & 0x3f != 0 {
                    warn!("iwm: unexpected diskreg flags {:02X}",value);
                }
            },
            _ => {
                self.glu_sync(drives,tspec);
                self.io_switch(drives,ioreg);
                if ioreg & 1 != 0 {
                    self.data = value;
                    self.lss_write_reg |= WRITE_REG_DATA;
                    match self.state {
                        IwmState::WriteMode => self.write_mode(value),
                        IwmState::WriteData => {
                            self.data_access_time_ns = DATA_ACCESS_NS_EXPIRATION;
                        },
                        _ => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TimeSpec;
    use crate::woz;

    fn setup() -> (Iwm,DriveBay,TimeSpec) {
        let mut bay = DriveBay::new();
        let image = woz::build::build_woz2_525(&[(51200,0xd5);35]);
        bay.slot6[0].insert_disk(woz::from_bytes(&image).expect("test image"));
        (Iwm::new(),bay,TimeSpec::new())
    }

    #[test]
    fn q6_q7_state_selection() {
        let (mut iwm,mut bay,mut tspec) = setup();
        iwm.write_switch(&mut bay,&mut tspec,0xe9,0);   // motor on
        iwm.write_switch(&mut bay,&mut tspec,0xea,0);   // drive 1
        assert_eq!(iwm.state,IwmState::ReadData);
        iwm.write_switch(&mut bay,&mut tspec,0xed,0);   // q6 hi
        assert_eq!(iwm.state,IwmState::ReadStatus);
        iwm.write_switch(&mut bay,&mut tspec,0xef,0);   // q7 hi
        assert_eq!(iwm.state,IwmState::WriteData);
        iwm.write_switch(&mut bay,&mut tspec,0xec,0);   // q6 lo
        assert_eq!(iwm.state,IwmState::ReadHandshake);
    }

    #[test]
    fn phase_switches_set_lines() {
        let (mut iwm,mut bay,mut tspec) = setup();
        iwm.write_switch(&mut bay,&mut tspec,0xe1,0);   // phase 0 on
        iwm.write_switch(&mut bay,&mut tspec,0xe5,0);   // phase 2 on
        assert_eq!(iwm.out_phase,0x5);
        iwm.write_switch(&mut bay,&mut tspec,0xe0,0);   // phase 0 off
        assert_eq!(iwm.out_phase,0x4);
    }

    #[test]
    fn status_reflects_mode_register() {
        let (mut iwm,mut bay,mut tspec) = setup();
        // with the drive off, q6+q7 high selects the mode register
        iwm.write_switch(&mut bay,&mut tspec,0xed,0);
        iwm.write_switch(&mut bay,&mut tspec,0xef,0x0b);  // fast, async, 1sec off
        assert_eq!(iwm.state,IwmState::WriteMode);
        assert_eq!(iwm.bit_cell_ns,2000);
        assert!(iwm.async_mode);
        assert!(iwm.timer_1sec_disabled);
        // drop q7 to read-status and confirm the bits echo
        let status = iwm.read_switch(&mut bay,&mut tspec,0xee,MemOp::Data);
        assert_eq!(iwm.state,IwmState::ReadStatus);
        assert_ne!(status & 0x08,0);
        assert_ne!(status & 0x02,0);
        assert_ne!(status & 0x04,0);
    }

    /// every (state,q7,q6,latch_msb,pulse) combination must execute the
    /// command its ROM entry encodes
    #[test]
    fn lss_rom_coverage() {
        for adr in 0..256usize {
            let mut iwm = Iwm::new();
            iwm.lss_state = (adr >> 4) as u8;
            iwm.q7_switch = adr & 0x08 != 0;
            iwm.q6_switch = adr & 0x04 != 0;
            iwm.state = iwm.access_state();
            let latch_in: u8 = if adr & 0x02 != 0 { 0xc3 } else { 0x43 };
            iwm.latch = latch_in;
            iwm.data = 0x5e;
            if adr & 0x01 == 0 {
                iwm.io_flags |= flags::READ_DATA;
            }
            let signal = iwm.lss(0);
            let cmd = LSS_ROM[adr];
            let expected = if cmd & 0x08 == 0 {
                0x00                            // CLR
            } else {
                match cmd & 0xf {
                    0x09 => latch_in << 1,      // SL0
                    0x0d => (latch_in << 1) | 1,
                    0x0a | 0x0e => latch_in >> 1,
                    0x0b | 0x0f => 0x5e,        // LD
                    _ => latch_in               // NOP
                }
            };
            assert_eq!(iwm.latch,expected,"adr {:02X} cmd {:02X}",adr,cmd);
            assert_eq!(iwm.lss_state,(cmd & 0xf0) >> 4,"adr {:02X}",adr);
            assert_eq!(signal,cmd & 0x80 != 0,"adr {:02X}",adr);
        }
    }

    #[test]
    fn drive_disable_arms_one_second_hold() {
        let (mut iwm,mut bay,mut tspec) = setup();
        iwm.write_switch(&mut bay,&mut tspec,0xe9,0);
        iwm.write_switch(&mut bay,&mut tspec,0xea,0);
        assert_ne!(iwm.io_flags & flags::DRIVE_ON,0);
        iwm.write_switch(&mut bay,&mut tspec,0xe8,0);
        // still on, hold timer armed
        assert_ne!(iwm.io_flags & flags::DRIVE_ON,0);
        assert_eq!(iwm.drive_hold_ns,ONE_SECOND_NS);
        // run 1.1 seconds of clock
        tspec.clocks_spent += tspec.clocks_from_ns(1_100_000_000) as u64;
        iwm.glu_sync(&mut bay,&tspec);
        assert_eq!(iwm.io_flags & flags::DRIVE_ON,0);
    }

    #[test]
    fn read_data_assembles_nibbles() {
        let (mut iwm,mut bay,mut tspec) = setup();
        iwm.write_switch(&mut bay,&mut tspec,0xe9,0);
        iwm.write_switch(&mut bay,&mut tspec,0xea,0);
        // spin for a stretch of bit cells; the sequencer must assemble
        // high-bit-set values out of the pulse train
        let mut seen = false;
        for _ in 0..2000 {
            tspec.clocks_spent += tspec.clocks_from_ns(4000) as u64;
            let data = iwm.read_switch(&mut bay,&mut tspec,0xec,MemOp::Data);
            if data & 0x80 != 0 {
                seen = true;
                break;
            }
        }
        assert!(seen,"latch never assembled a nibble from the pulse train");
    }
}
