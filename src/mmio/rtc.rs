//! # Real-time clock and battery RAM interface
//!
//! The RTC chip is reached through two registers: C033 (data) and C034
//! (control).  A transfer is a sequence of C033/C034 writes that the chip
//! interprets serially; this module runs the equivalent state machine on
//! whole bytes.  BRAM content policy (what the host seeds the 256 bytes
//! with) is the host's business; the core just stores and serves them.

use log::{debug,warn};

use crate::clock::TimeSpec;

pub const CTL_START_XFER: u8 = 0x80;
pub const CTL_READ_OP: u8 = 0x40;
pub const CTL_LAST_BYTE: u8 = 0x20;

const FLAG_WRITE_PROTECT: u32 = 0x1;

const TIME_UNINITIALIZED: u64 = u64::MAX;

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
enum XferState {
    RecvCmd,
    RecvCmdBramRead,
    RecvCmdBramWrite,
    ReadBram,
    WriteBram,
    RegTest,
    RegWriteProtect,
    RegUnknown,
    ReadClock,
    WriteClock
}

pub struct Rtc {
    state: XferState,
    index: u32,
    flags: u32,
    xfer_started_time: u64,
    xfer_latency_clocks: u32,
    pub seconds_since_1904: u32,
    pub bram: [u8;256],
    pub data_c033: u8,
    pub ctl_c034: u8
}

impl Rtc {
    pub fn new(xfer_latency_clocks: u32) -> Self {
        Self {
            state: XferState::RecvCmd,
            index: 0,
            flags: 0,
            xfer_started_time: TIME_UNINITIALIZED,
            xfer_latency_clocks,
            seconds_since_1904: 0,
            bram: [0;256],
            data_c033: 0,
            ctl_c034: 0
        }
    }
    pub fn reset(&mut self) {
        self.state = XferState::RecvCmd;
        self.index = 0;
        self.flags = 0;
        self.xfer_started_time = TIME_UNINITIALIZED;
        self.data_c033 = 0;
        self.ctl_c034 = 0;
    }
    pub fn set_clock_time(&mut self,seconds_since_1904: u32) {
        self.seconds_since_1904 = seconds_since_1904;
    }
    pub fn bram_snapshot(&self) -> [u8;256] {
        self.bram
    }
    pub fn restore_bram(&mut self,bram: &[u8;256]) {
        self.bram = *bram;
    }

    fn dispatch_cmd(&mut self,data: u8) {
        let cmd = (data >> 3) & 0xf;
        let read = data & 0x80 != 0;
        let opt = (data & 0x07) as u32;
        match cmd {
            0x00 => {
                self.index = opt;
                self.state = if read { XferState::ReadClock } else { XferState::WriteClock };
            },
            0x01 => {
                self.index = 0x8000_0000 | opt;
                self.state = if read { XferState::ReadClock } else { XferState::WriteClock };
            },
            0x06 => {
                // internal registers, write only
                if read {
                    warn!("rtc: register read is unsupported ({:02X})",data);
                } else {
                    self.index = opt;
                    self.state = match opt {
                        0x1 => XferState::RegTest,
                        0x5 => XferState::RegWriteProtect,
                        _ => XferState::RegUnknown
                    };
                }
            },
            0x07 => {
                self.state = if read {
                    XferState::RecvCmdBramRead
                } else {
                    XferState::RecvCmdBramWrite
                };
                self.index = opt << 5;
            },
            _ => {
                warn!("rtc: unsupported command {:02X}",cmd);
            }
        }
    }

    fn bram_address_byte(&mut self,data: u8) {
        self.index |= ((data >> 2) & 0x1f) as u32;
        self.state = match self.state {
            XferState::RecvCmdBramRead => XferState::ReadBram,
            _ => XferState::WriteBram
        };
    }

    fn clock_read(&self) -> u8 {
        let opt = self.index & 0xff;
        if opt & 1 != 0 {
            let shift = match (self.index & 0x8000_0000 != 0,opt & 0x4 != 0) {
                (true,true) => 24,
                (true,false) => 16,
                (false,true) => 8,
                (false,false) => 0
            };
            return (self.seconds_since_1904 >> shift) as u8;
        }
        warn!("rtc: clock read bad opt ({:02X})",opt);
        0
    }

    /// Run one step of the transfer state machine after a C034 write, or
    /// model the chip latency after a C034 read.
    pub fn command(&mut self,tspec: &TimeSpec,is_write: bool) {
        let is_write_cmd = self.ctl_c034 & CTL_READ_OP == 0;
        let has_recv_started = self.ctl_c034 & CTL_START_XFER != 0;
        let is_new_txn = self.ctl_c034 & CTL_LAST_BYTE == 0;

        if is_write {
            if is_new_txn {
                self.xfer_started_time = TIME_UNINITIALIZED;
                self.state = XferState::RecvCmd;
                return;
            }
            match self.state {
                XferState::RecvCmd => {
                    if has_recv_started && is_write_cmd {
                        self.dispatch_cmd(self.data_c033);
                    } else {
                        warn!("rtc: unexpected ctl {:02X} in recv",self.ctl_c034);
                    }
                },
                XferState::RecvCmdBramRead | XferState::RecvCmdBramWrite => {
                    if has_recv_started && is_write_cmd {
                        self.bram_address_byte(self.data_c033);
                    } else {
                        warn!("rtc: unexpected ctl {:02X} in bram addr",self.ctl_c034);
                    }
                },
                XferState::ReadBram => {
                    if has_recv_started && !is_write_cmd {
                        self.data_c033 = self.bram[(self.index & 0xff) as usize];
                    }
                },
                XferState::WriteBram => {
                    if has_recv_started && is_write_cmd && self.flags & FLAG_WRITE_PROTECT == 0 {
                        self.bram[(self.index & 0xff) as usize] = self.data_c033;
                    }
                },
                XferState::RegTest => {
                    if self.data_c033 & 0xc0 != 0 {
                        warn!("rtc: test register bits 6,7 set: {:02X}",self.data_c033);
                    }
                },
                XferState::RegWriteProtect => {
                    if self.data_c033 & 0x80 != 0 {
                        self.flags |= FLAG_WRITE_PROTECT;
                    } else {
                        self.flags &= !FLAG_WRITE_PROTECT;
                    }
                    debug!("rtc: write-protect register set to {:02X}",self.data_c033);
                },
                XferState::RegUnknown => {
                    debug!("rtc: unknown register data {:02X}",self.data_c033);
                },
                XferState::ReadClock => {
                    if has_recv_started && !is_write_cmd {
                        self.data_c033 = self.clock_read();
                    }
                },
                XferState::WriteClock => {}
            }
        } else {
            // polling C034 for completion; model the chip's transfer latency
            if self.xfer_started_time == TIME_UNINITIALIZED {
                self.xfer_started_time = tspec.clocks_spent;
            }
            if self.xfer_started_time + self.xfer_latency_clocks as u64 > tspec.clocks_spent {
                return;
            }
            self.xfer_started_time = TIME_UNINITIALIZED;
            self.ctl_c034 &= !CTL_START_XFER;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TimeSpec;

    fn start_xfer(rtc: &mut Rtc,data: u8) {
        let tspec = TimeSpec::new();
        rtc.data_c033 = data;
        rtc.ctl_c034 = CTL_START_XFER | CTL_LAST_BYTE;
        rtc.command(&tspec,true);
    }

    #[test]
    fn bram_write_then_read() {
        let mut rtc = Rtc::new(0);
        let tspec = TimeSpec::new();
        // command: write BRAM cell 0x42 = (0b111 << 3)|hi bits, addr split
        // hi 3 bits of address in cmd opt, low 5 bits in next byte << 2
        let addr = 0x42u32;
        start_xfer(&mut rtc,(0x07 << 3) as u8 | (addr >> 5) as u8);
        start_xfer(&mut rtc,((addr & 0x1f) << 2) as u8);
        start_xfer(&mut rtc,0xa5);
        assert_eq!(rtc.bram[0x42],0xa5);
        // read it back
        start_xfer(&mut rtc,0x80 | (0x07 << 3) as u8 | (addr >> 5) as u8);
        start_xfer(&mut rtc,((addr & 0x1f) << 2) as u8);
        rtc.ctl_c034 = CTL_START_XFER | CTL_LAST_BYTE | CTL_READ_OP;
        rtc.command(&tspec,true);
        assert_eq!(rtc.data_c033,0xa5);
    }

    #[test]
    fn clock_read_returns_seconds() {
        let mut rtc = Rtc::new(0);
        let tspec = TimeSpec::new();
        rtc.set_clock_time(0x1234_5678);
        start_xfer(&mut rtc,0x80 | 0x01);  // seconds-lo command, opt 1
        rtc.ctl_c034 = CTL_START_XFER | CTL_LAST_BYTE | CTL_READ_OP;
        rtc.command(&tspec,true);
        assert_eq!(rtc.data_c033,0x78);
    }
}
