//! # Machine snapshots
//!
//! State capture is serializer-per-component: each subsystem has its own
//! record type whose field order is the wire order, so the layout stays
//! binary-stable as long as fields are only appended.  A snapshot is taken
//! atomically between `emulate()` calls; there is no partial capture.
//!
//! The crate does not pick the on-disk encoding.  The documented container
//! is a versioned MessagePack document introduced by [`MAGIC`]; producing
//! and parsing that framing is the host's job, and every record here
//! derives `Serialize`/`Deserialize` so any serde encoder can emit it.
//! ROM contents and disk images are host-owned and are not captured; the
//! drive records keep the bit position within whatever disk is inserted.

use serde::{Serialize,Deserialize};

use crate::clock::TimeSpec;
use crate::cpu::{CpuState,Status};
use crate::iwm::{Drive,IwmState};
use crate::machine::Machine;
use crate::mmio::mmap::Mmap;

/// container magic for the host-side framing
pub const MAGIC: &[u8;8] = b"CLEMSNAP";
pub const VERSION: u32 = 1;

#[derive(Serialize,Deserialize,Clone)]
pub struct CpuSnapshot {
    pub a: u16,
    pub x: u16,
    pub y: u16,
    pub d: u16,
    pub s: u16,
    pub pc: u16,
    pub ir: u8,
    pub p: u8,
    pub dbr: u8,
    pub pbr: u8,
    pub emulation: bool,
    pub irqb_in: bool,
    pub nmib_in: bool,
    pub resb_in: bool,
    pub ready_out: bool,
    pub state: u8,
    pub cycles_spent: u64,
    pub enabled: bool
}

#[derive(Serialize,Deserialize,Clone)]
pub struct MemorySnapshot {
    pub fpi: Vec<u8>,
    pub mega2: Vec<u8>
}

#[derive(Serialize,Deserialize,Clone)]
pub struct VgcSnapshot {
    pub mode_flags: u32,
    pub text_fg_color: u8,
    pub text_bg_color: u8,
    pub text_language: u8,
    pub border_color: u8,
    pub scanline_irq_enable: bool,
    pub irq_line: u32
}

#[derive(Serialize,Deserialize,Clone)]
pub struct TimerSnapshot {
    pub irq_1sec_us: u32,
    pub irq_qtrsec_us: u32,
    pub flags: u32,
    pub irq_line: u32
}

#[derive(Serialize,Deserialize,Clone)]
pub struct RtcSnapshot {
    pub seconds_since_1904: u32,
    pub bram: Vec<u8>,
    pub data_c033: u8,
    pub ctl_c034: u8
}

#[derive(Serialize,Deserialize,Clone)]
pub struct AudioSnapshot {
    pub sound_ram: Vec<u8>,
    pub doc_reg: Vec<u8>
}

#[derive(Serialize,Deserialize,Clone)]
pub struct IwmSnapshot {
    pub io_flags: u32,
    pub out_phase: u32,
    pub data: u8,
    pub latch: u8,
    pub q6_switch: bool,
    pub q7_switch: bool,
    pub timer_1sec_disabled: bool,
    pub async_mode: bool,
    pub latch_mode: bool,
    pub state: u8,
    pub lss_state: u8,
    pub bit_cell_ns: u32,
    pub drive_hold_ns: u32
}

/// drive head and spindle position; the disk itself stays with the host
#[derive(Serialize,Deserialize,Clone)]
pub struct DriveSnapshot {
    pub has_disk: bool,
    pub qtr_track_index: i32,
    pub real_track_index: u8,
    pub track_byte_index: u32,
    pub track_bit_shift: u32,
    pub track_bit_length: u32,
    pub pulse_ns: u32,
    pub read_buffer: u8,
    pub cog_orient: u32,
    pub status_mask_35: u32,
    pub step_timer_35_ns: u32,
    pub is_spindle_on: bool
}

#[derive(Serialize,Deserialize,Clone)]
pub struct MmioSnapshot {
    pub mmap_bits: u32,
    pub new_video: u8,
    pub speed: u8,
    pub irq_line: u32,
    pub vgc: VgcSnapshot,
    pub timer: TimerSnapshot,
    pub rtc: RtcSnapshot,
    pub audio: AudioSnapshot,
    pub iwm: IwmSnapshot,
    pub drives: Vec<DriveSnapshot>
}

#[derive(Serialize,Deserialize,Clone)]
pub struct Snapshot {
    pub version: u32,
    pub clock: TimeSpec,
    pub cpu: CpuSnapshot,
    pub memory: MemorySnapshot,
    pub mmio: MmioSnapshot
}

fn capture_drive(drive: &Drive) -> DriveSnapshot {
    DriveSnapshot {
        has_disk: drive.has_disk,
        qtr_track_index: drive.qtr_track_index,
        real_track_index: drive.real_track_index,
        track_byte_index: drive.track_byte_index,
        track_bit_shift: drive.track_bit_shift,
        track_bit_length: drive.track_bit_length,
        pulse_ns: drive.pulse_ns,
        read_buffer: drive.read_buffer,
        cog_orient: drive.cog_orient,
        status_mask_35: drive.status_mask_35,
        step_timer_35_ns: drive.step_timer_35_ns,
        is_spindle_on: drive.is_spindle_on
    }
}

fn apply_drive(drive: &mut Drive,snap: &DriveSnapshot) {
    drive.qtr_track_index = snap.qtr_track_index;
    drive.real_track_index = snap.real_track_index;
    drive.track_byte_index = snap.track_byte_index;
    drive.track_bit_shift = snap.track_bit_shift;
    drive.track_bit_length = snap.track_bit_length;
    drive.pulse_ns = snap.pulse_ns;
    drive.read_buffer = snap.read_buffer;
    drive.cog_orient = snap.cog_orient;
    drive.status_mask_35 = snap.status_mask_35;
    drive.step_timer_35_ns = snap.step_timer_35_ns;
    drive.is_spindle_on = snap.is_spindle_on;
}

fn cpu_state_code(state: CpuState) -> u8 {
    match state {
        CpuState::Reset => 0,
        CpuState::Execute => 1,
        CpuState::Irq => 2,
        CpuState::Nmi => 3
    }
}

fn cpu_state_from_code(code: u8) -> CpuState {
    match code {
        0 => CpuState::Reset,
        2 => CpuState::Irq,
        3 => CpuState::Nmi,
        _ => CpuState::Execute
    }
}

fn iwm_state_code(state: IwmState) -> u8 {
    match state {
        IwmState::ReadData => 0,
        IwmState::ReadStatus => 1,
        IwmState::ReadHandshake => 2,
        IwmState::WriteMode => 3,
        IwmState::WriteData => 4,
        IwmState::Unknown => 0xff
    }
}

fn iwm_state_from_code(code: u8) -> IwmState {
    match code {
        0 => IwmState::ReadData,
        1 => IwmState::ReadStatus,
        2 => IwmState::ReadHandshake,
        3 => IwmState::WriteMode,
        4 => IwmState::WriteData,
        _ => IwmState::Unknown
    }
}

impl Snapshot {
    /// Capture the whole machine; call only between `emulate()` steps
    pub fn capture(machine: &Machine) -> Snapshot {
        let cpu = &machine.cpu;
        let mmio = &machine.board.mmio;
        let drives: Vec<DriveSnapshot> = mmio.drives.slot5.iter()
            .chain(mmio.drives.slot6.iter())
            .map(capture_drive)
            .collect();
        Snapshot {
            version: VERSION,
            clock: machine.board.tspec.clone(),
            cpu: CpuSnapshot {
                a: cpu.regs.a,
                x: cpu.regs.x,
                y: cpu.regs.y,
                d: cpu.regs.d,
                s: cpu.regs.s,
                pc: cpu.regs.pc,
                ir: cpu.regs.ir,
                p: cpu.regs.p.bits(),
                dbr: cpu.regs.dbr,
                pbr: cpu.regs.pbr,
                emulation: cpu.pins.emulation,
                irqb_in: cpu.pins.irqb_in,
                nmib_in: cpu.pins.nmib_in,
                resb_in: cpu.pins.resb_in,
                ready_out: cpu.pins.ready_out,
                state: cpu_state_code(cpu.state),
                cycles_spent: cpu.cycles_spent,
                enabled: cpu.enabled
            },
            memory: MemorySnapshot {
                fpi: machine.board.mem.fpi_contents().to_vec(),
                mega2: machine.board.mem.mega2_contents().to_vec()
            },
            mmio: MmioSnapshot {
                mmap_bits: mmio.mmap.bits(),
                new_video: mmio.new_video,
                speed: mmio.speed,
                irq_line: mmio.irq_line,
                vgc: VgcSnapshot {
                    mode_flags: mmio.vgc.mode_flags.bits(),
                    text_fg_color: mmio.vgc.text_fg_color,
                    text_bg_color: mmio.vgc.text_bg_color,
                    text_language: mmio.vgc.text_language,
                    border_color: mmio.vgc.border_color,
                    scanline_irq_enable: mmio.vgc.scanline_irq_enable,
                    irq_line: mmio.vgc.irq_line
                },
                timer: TimerSnapshot {
                    irq_1sec_us: mmio.timer.irq_1sec_us,
                    irq_qtrsec_us: mmio.timer.irq_qtrsec_us,
                    flags: mmio.timer.flags,
                    irq_line: mmio.timer.irq_line
                },
                rtc: RtcSnapshot {
                    seconds_since_1904: mmio.rtc.seconds_since_1904,
                    bram: mmio.rtc.bram.to_vec(),
                    data_c033: mmio.rtc.data_c033,
                    ctl_c034: mmio.rtc.ctl_c034
                },
                audio: AudioSnapshot {
                    sound_ram: mmio.audio.sound_ram.clone(),
                    doc_reg: mmio.audio.doc_reg.to_vec()
                },
                iwm: IwmSnapshot {
                    io_flags: mmio.iwm.io_flags,
                    out_phase: mmio.iwm.out_phase,
                    data: mmio.iwm.data,
                    latch: mmio.iwm.latch,
                    q6_switch: mmio.iwm.q6_switch,
                    q7_switch: mmio.iwm.q7_switch,
                    timer_1sec_disabled: mmio.iwm.timer_1sec_disabled,
                    async_mode: mmio.iwm.async_mode,
                    latch_mode: mmio.iwm.latch_mode,
                    state: iwm_state_code(mmio.iwm.state),
                    lss_state: mmio.iwm.lss_state,
                    bit_cell_ns: mmio.iwm.bit_cell_ns,
                    drive_hold_ns: mmio.iwm.drive_hold_ns
                },
                drives
            }
        }
    }

    /// Restore into a machine built with the same configuration.  Page
    /// maps are derived state and are rebuilt from the softswitch word.
    pub fn apply(&self,machine: &mut Machine) {
        let cpu = &mut machine.cpu;
        cpu.regs.a = self.cpu.a;
        cpu.regs.x = self.cpu.x;
        cpu.regs.y = self.cpu.y;
        cpu.regs.d = self.cpu.d;
        cpu.regs.s = self.cpu.s;
        cpu.regs.pc = self.cpu.pc;
        cpu.regs.ir = self.cpu.ir;
        cpu.regs.p = Status::from_bits_retain(self.cpu.p);
        cpu.regs.dbr = self.cpu.dbr;
        cpu.regs.pbr = self.cpu.pbr;
        cpu.pins.emulation = self.cpu.emulation;
        cpu.pins.irqb_in = self.cpu.irqb_in;
        cpu.pins.nmib_in = self.cpu.nmib_in;
        cpu.pins.resb_in = self.cpu.resb_in;
        cpu.pins.ready_out = self.cpu.ready_out;
        cpu.state = cpu_state_from_code(self.cpu.state);
        cpu.cycles_spent = self.cpu.cycles_spent;
        cpu.enabled = self.cpu.enabled;

        machine.board.tspec = self.clock.clone();
        machine.board.mem.restore_contents(&self.memory.fpi,&self.memory.mega2);

        let mmio = &mut machine.board.mmio;
        mmio.new_video = self.mmio.new_video;
        mmio.speed = self.mmio.speed;
        mmio.irq_line = self.mmio.irq_line;
        mmio.vgc.mode_flags =
            crate::mmio::vgc::VgcMode::from_bits_retain(self.mmio.vgc.mode_flags);
        mmio.vgc.text_fg_color = self.mmio.vgc.text_fg_color;
        mmio.vgc.text_bg_color = self.mmio.vgc.text_bg_color;
        mmio.vgc.text_language = self.mmio.vgc.text_language;
        mmio.vgc.border_color = self.mmio.vgc.border_color;
        mmio.vgc.scanline_irq_enable = self.mmio.vgc.scanline_irq_enable;
        mmio.vgc.irq_line = self.mmio.vgc.irq_line;
        mmio.timer.irq_1sec_us = self.mmio.timer.irq_1sec_us;
        mmio.timer.irq_qtrsec_us = self.mmio.timer.irq_qtrsec_us;
        mmio.timer.flags = self.mmio.timer.flags;
        mmio.timer.irq_line = self.mmio.timer.irq_line;
        mmio.rtc.seconds_since_1904 = self.mmio.rtc.seconds_since_1904;
        if self.mmio.rtc.bram.len() == 256 {
            let mut bram = [0u8;256];
            bram.copy_from_slice(&self.mmio.rtc.bram);
            mmio.rtc.restore_bram(&bram);
        }
        mmio.rtc.data_c033 = self.mmio.rtc.data_c033;
        mmio.rtc.ctl_c034 = self.mmio.rtc.ctl_c034;
        if self.mmio.audio.sound_ram.len() == mmio.audio.sound_ram.len() {
            mmio.audio.sound_ram.copy_from_slice(&self.mmio.audio.sound_ram);
        }
        if self.mmio.audio.doc_reg.len() == 256 {
            mmio.audio.doc_reg.copy_from_slice(&self.mmio.audio.doc_reg);
        }
        mmio.iwm.io_flags = self.mmio.iwm.io_flags;
        mmio.iwm.out_phase = self.mmio.iwm.out_phase;
        mmio.iwm.data = self.mmio.iwm.data;
        mmio.iwm.latch = self.mmio.iwm.latch;
        mmio.iwm.q6_switch = self.mmio.iwm.q6_switch;
        mmio.iwm.q7_switch = self.mmio.iwm.q7_switch;
        mmio.iwm.timer_1sec_disabled = self.mmio.iwm.timer_1sec_disabled;
        mmio.iwm.async_mode = self.mmio.iwm.async_mode;
        mmio.iwm.latch_mode = self.mmio.iwm.latch_mode;
        mmio.iwm.state = iwm_state_from_code(self.mmio.iwm.state);
        mmio.iwm.lss_state = self.mmio.iwm.lss_state;
        mmio.iwm.bit_cell_ns = self.mmio.iwm.bit_cell_ns;
        mmio.iwm.drive_hold_ns = self.mmio.iwm.drive_hold_ns;
        for (idx,snap) in self.mmio.drives.iter().take(4).enumerate() {
            let drive = if idx < 2 {
                &mut mmio.drives.slot5[idx]
            } else {
                &mut mmio.drives.slot6[idx - 2]
            };
            apply_drive(drive,snap);
        }

        // page maps are derived from the softswitch word; rebuild them
        let mmap = Mmap::from_bits_retain(self.mmio.mmap_bits);
        let card_slot = mmio.card_expansion_slot;
        mmio.mmap = crate::mmio::mmap::rebuild(&mut machine.board.mem,mmap,card_slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::Machine;
    use crate::mem::BANK_SIZE;

    fn booted_machine() -> Machine {
        let mut rom = vec![0xea;BANK_SIZE];
        rom[0xfffc] = 0x00;
        rom[0xfffd] = 0xe0;
        let mut machine = Machine::new(2);
        machine.load_rom(&rom).expect("rom");
        machine.power_on();
        machine.emulate();
        machine
    }

    #[test]
    fn capture_apply_round_trip() {
        let mut machine = booted_machine();
        for _ in 0..32 {
            machine.emulate();
        }
        use crate::cpu::Bus;
        use crate::mem::MemOp;
        machine.board.mem_write(0x77,0x1234,0x00,MemOp::Data);
        let snap = Snapshot::capture(&machine);
        assert_eq!(snap.version,VERSION);

        let mut restored = booted_machine();
        snap.apply(&mut restored);
        assert_eq!(restored.cpu.regs.pc,machine.cpu.regs.pc);
        assert_eq!(restored.cpu.cycles_spent,machine.cpu.cycles_spent);
        assert_eq!(restored.clocks_spent(),machine.clocks_spent());
        assert_eq!(restored.peek(0x1234,0x00),0x77);
        // the restored machine keeps running identically
        restored.emulate();
        machine.emulate();
        assert_eq!(restored.cpu.regs.pc,machine.cpu.regs.pc);
    }

    #[test]
    fn page_maps_rebuild_from_softswitches() {
        let mut machine = booted_machine();
        // flip RAMRD through the statereg and snapshot
        use crate::cpu::Bus;
        use crate::mem::MemOp;
        machine.board.mem_write(0x20,0xc068,0x00,MemOp::Data);
        let snap = Snapshot::capture(&machine);
        let mut restored = booted_machine();
        snap.apply(&mut restored);
        assert_eq!(restored.board.mem.page_entry(0x9000,0x00).bank_read,0x01);
    }
}
