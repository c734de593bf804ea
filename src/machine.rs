//! # Machine top level
//!
//! Owns the CPU and the board (clock, bank memory, MMIO controller with
//! its devices and drives) and advances the whole system one instruction
//! at a time.  Host threads talk to the core only through the input queue
//! (drained at the step barrier) and through read-only views taken
//! between steps.

use log::{info,warn};

use crate::clock::TimeSpec;
use crate::cpu::{Bus,Cpu65C816,CpuState,Status};
use crate::mem::{Memory,MemOp,MmioBus,PageFlags,BANK_SIZE,ROM_BANK_COUNT};
use crate::mmio::Mmio;
use crate::mmio::adb::InputEvent;
use crate::woz::{DiskType,NibbleDisk};

#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("ROM image must be a multiple of 64 KiB up to 256 KiB")]
    BadRomSize,
    #[error("disk does not fit this drive")]
    WrongDiskKind,
    #[error("drive already holds a disk")]
    DriveOccupied
}

/// The four physical drive positions on the disk port
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum DriveKind {
    D35Drive1,
    D35Drive2,
    D525Drive1,
    D525Drive2
}

/// Everything the CPU sees over its bus pins
pub struct Board {
    pub tspec: TimeSpec,
    pub mem: Memory,
    pub mmio: Mmio,
    #[cfg(feature = "opcode-trace")]
    pub trace_sink: Option<Box<dyn crate::cpu::TraceSink>>
}

impl Board {
    fn advance_clock(&mut self,mega2: bool) {
        self.tspec.clocks_spent += if mega2 {
            self.tspec.clocks_step_mega2 as u64
        } else {
            self.tspec.clocks_step as u64
        };
    }

    /// pure read used by debuggers and the disassembler
    pub fn peek(&mut self,adr: u16,bank: u8) -> u8 {
        let entry = self.mem.page_entry(adr,bank);
        if entry.flags.contains(PageFlags::IOADDR) {
            let (data,_) = self.mmio.mmio_read(&mut self.mem,&mut self.tspec,adr,MemOp::Null);
            return data;
        }
        let offset = ((entry.read_page as u16) << 8) | (adr & 0xff);
        let target = if entry.flags.contains(PageFlags::DIRECT) { bank } else { entry.bank_read };
        self.mem.fetch(target,offset).0
    }
}

impl Bus for Board {
    fn mem_read(&mut self,adr: u16,bank: u8,op: MemOp) -> u8 {
        let entry = self.mem.page_entry(adr,bank);
        if entry.flags.contains(PageFlags::IOADDR) {
            let (data,mega2) = self.mmio.mmio_read(&mut self.mem,&mut self.tspec,adr,op);
            if op != MemOp::Null {
                self.advance_clock(mega2);
            }
            return data;
        }
        if entry.flags.contains(PageFlags::CARDMEM) {
            let data = self.mmio.card_mem_read(adr);
            if op != MemOp::Null {
                self.advance_clock(true);
            }
            return data;
        }
        let offset = ((entry.read_page as u16) << 8) | (adr & 0xff);
        let target = if entry.flags.contains(PageFlags::DIRECT) { bank } else { entry.bank_read };
        let (data,mega2) = self.mem.fetch(target,offset);
        if op != MemOp::Null {
            self.advance_clock(mega2);
        }
        data
    }

    fn mem_write(&mut self,data: u8,adr: u16,bank: u8,op: MemOp) {
        let entry = self.mem.page_entry(adr,bank);
        if entry.flags.contains(PageFlags::IOADDR) {
            let mega2 = self.mmio.mmio_write(&mut self.mem,&mut self.tspec,data,adr,op);
            if op != MemOp::Null {
                self.advance_clock(mega2);
            }
            return;
        }
        if entry.flags.contains(PageFlags::CARDMEM) {
            self.mmio.card_mem_write(adr,data);
            if op != MemOp::Null {
                self.advance_clock(true);
            }
            return;
        }
        let offset = ((entry.write_page as u16) << 8) | (adr & 0xff);
        let target = if entry.flags.contains(PageFlags::DIRECT) { bank } else { entry.bank_write };
        let mut mega2 = false;
        if entry.flags.contains(PageFlags::WRITE_OK) {
            mega2 = self.mem.store(target,offset,data);
            // shadowed pages copy to the matching Mega II bank at the
            // Mega II step, within the same cycle
            if self.mem.shadow_entry(adr,bank) != 0 {
                self.mem.store(0xe0 | (bank & 1),offset,data);
                mega2 = true;
            }
        }
        if op != MemOp::Null {
            self.advance_clock(mega2);
        }
    }

    fn internal_cycles(&mut self,count: u32) {
        self.tspec.clocks_spent += count as u64 * self.tspec.clocks_step as u64;
    }

    #[cfg(feature = "opcode-trace")]
    fn trace(&mut self,instr: &crate::cpu::Instruction) {
        if let Some(sink) = self.trace_sink.as_mut() {
            sink.opcode(instr);
        }
    }
}

pub struct Machine {
    pub cpu: Cpu65C816,
    pub board: Board,
    input_queue: Vec<InputEvent>,
    nmi_pending: bool
}

impl Machine {
    pub fn new(fpi_bank_count: usize) -> Self {
        Self {
            cpu: Cpu65C816::new(),
            board: Board {
                tspec: TimeSpec::new(),
                mem: Memory::new(fpi_bank_count),
                mmio: Mmio::new(),
                #[cfg(feature = "opcode-trace")]
                trace_sink: None
            },
            input_queue: Vec::new(),
            nmi_pending: false
        }
    }

    #[cfg(feature = "opcode-trace")]
    pub fn set_trace_sink(&mut self,sink: Option<Box<dyn crate::cpu::TraceSink>>) {
        self.board.trace_sink = sink;
    }

    /// Install a ROM blob at banks FC-FF; 64 KiB to 256 KiB in 64 KiB steps
    pub fn load_rom(&mut self,image: &[u8]) -> Result<(),Error> {
        if image.is_empty()
            || image.len() % BANK_SIZE != 0
            || image.len() > ROM_BANK_COUNT * BANK_SIZE
        {
            return Err(Error::BadRomSize);
        }
        self.board.mem.set_rom(image);
        info!("rom installed, {} banks",image.len() / BANK_SIZE);
        Ok(())
    }

    /// Drive the RESB pin.  Hold low for at least one `emulate()` call,
    /// then release; the next call runs the reset vector fetch.
    pub fn set_resb(&mut self,level: bool) {
        self.cpu.pins.resb_in = level;
    }

    /// Convenience power-on: assert and release reset in one go
    pub fn power_on(&mut self) {
        self.set_resb(false);
        self.emulate();
        self.set_resb(true);
    }

    /// Queue one host input event; delivered at the next step barrier
    pub fn queue_input(&mut self,event: InputEvent) {
        self.input_queue.push(event);
    }

    pub fn insert_disk(&mut self,kind: DriveKind,disk: NibbleDisk) -> Result<(),Error> {
        let want = match kind {
            DriveKind::D35Drive1 | DriveKind::D35Drive2 => DiskType::D35,
            _ => DiskType::D525
        };
        if disk.disk_type != want {
            return Err(Error::WrongDiskKind);
        }
        let drive = self.drive_mut(kind);
        if drive.has_disk {
            return Err(Error::DriveOccupied);
        }
        drive.insert_disk(disk);
        Ok(())
    }

    /// Eject, transferring the disk (with any writes) back to the caller
    pub fn eject_disk(&mut self,kind: DriveKind) -> Option<NibbleDisk> {
        self.drive_mut(kind).eject_disk()
    }

    fn drive_mut(&mut self,kind: DriveKind) -> &mut crate::iwm::Drive {
        let drives = &mut self.board.mmio.drives;
        match kind {
            DriveKind::D35Drive1 => &mut drives.slot5[0],
            DriveKind::D35Drive2 => &mut drives.slot5[1],
            DriveKind::D525Drive1 => &mut drives.slot6[0],
            DriveKind::D525Drive2 => &mut drives.slot6[1]
        }
    }

    pub fn drive(&self,kind: DriveKind) -> &crate::iwm::Drive {
        let drives = &self.board.mmio.drives;
        match kind {
            DriveKind::D35Drive1 => &drives.slot5[0],
            DriveKind::D35Drive2 => &drives.slot5[1],
            DriveKind::D525Drive1 => &drives.slot6[0],
            DriveKind::D525Drive2 => &drives.slot6[1]
        }
    }

    /// pure memory view for debuggers; no clock or device side effects
    pub fn peek(&mut self,adr: u16,bank: u8) -> u8 {
        self.board.peek(adr,bank)
    }

    pub fn clocks_spent(&self) -> u64 {
        self.board.tspec.clocks_spent
    }

    pub fn is_stopped(&self) -> bool {
        !self.cpu.enabled
    }

    /// One emulation step: reset handling, one instruction (or interrupt
    /// sequence), then device sync and interrupt sampling.
    pub fn emulate(&mut self) {
        if !self.cpu.pins.resb_in {
            // reset overrides everything; re-init once, then burn a cycle
            // per call while the pin stays low
            if self.cpu.state != CpuState::Reset {
                self.cpu.reset_assert();
                let Board { tspec,mem,mmio,.. } = &mut self.board;
                mmio.init(mem,tspec);
                self.board.internal_cycles(1);
            }
            self.board.internal_cycles(1);
            return;
        }
        if !self.cpu.enabled {
            return;
        }
        for event in self.input_queue.drain(..) {
            self.board.mmio.adb.input(event);
        }
        match self.cpu.state {
            CpuState::Reset => {
                self.cpu.reset_release(&mut self.board);
                return;
            },
            CpuState::Irq => {
                self.cpu.run_irq(&mut self.board);
            },
            CpuState::Nmi => {
                self.cpu.run_nmi(&mut self.board);
            },
            CpuState::Execute => {
                if self.cpu.pins.ready_out {
                    self.cpu.execute_one(&mut self.board);
                } else {
                    // waiting for an interrupt; let time pass
                    self.board.internal_cycles(1);
                    self.cpu.cycles_spent += 1;
                }
            }
        }

        let irq_line = {
            let Board { tspec,mmio,.. } = &mut self.board;
            mmio.sync(tspec)
        };
        self.cpu.pins.irqb_in = irq_line == 0;
        if self.cpu.sample_nmi(!self.cpu.pins.nmib_in) {
            self.nmi_pending = true;
        }
        if !self.cpu.pins.ready_out && (self.nmi_pending || !self.cpu.pins.irqb_in) {
            self.cpu.pins.ready_out = true;
        }
        if self.cpu.state == CpuState::Execute && self.cpu.pins.ready_out {
            if self.nmi_pending {
                self.cpu.state = CpuState::Nmi;
                self.nmi_pending = false;
            } else if !self.cpu.pins.irqb_in && !self.cpu.regs.p.contains(Status::I) {
                self.cpu.state = CpuState::Irq;
            }
        }
    }

    /// Run whole instructions until at least `cycles` CPU cycles elapse
    pub fn emulate_cycles(&mut self,cycles: u64) {
        let target = self.cpu.cycles_spent + cycles;
        while self.cpu.cycles_spent < target {
            if self.is_stopped() {
                warn!("machine stopped before cycle target");
                break;
            }
            let before = self.cpu.cycles_spent;
            self.emulate();
            if self.cpu.cycles_spent == before {
                // idle (reset held or WAI with nothing pending)
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::BANK_SIZE;

    fn rom_with_program(program: &[u8]) -> Vec<u8> {
        // one 64K bank mapped at FF; the vector targets the E000 region,
        // which bank 00 reads straight from ROM at power-on
        let mut rom = vec![0xea;BANK_SIZE];
        rom[0xe000..0xe000 + program.len()].copy_from_slice(program);
        rom[0xfffc] = 0x00;
        rom[0xfffd] = 0xe0;
        rom
    }

    #[test]
    fn reset_boot_runs_into_stp() {
        // NOP then STP right after the reset sequence
        let mut machine = Machine::new(2);
        machine.load_rom(&rom_with_program(&[0xea,0xdb])).expect("rom");
        machine.power_on();
        machine.emulate();  // vector fetch
        assert_eq!(machine.cpu.state,CpuState::Execute);
        assert_eq!(machine.cpu.regs.pc,0xe000);
        machine.emulate();  // NOP
        machine.emulate();  // STP
        assert!(machine.is_stopped());
        let clocks = machine.clocks_spent();
        assert!(clocks > 0);
        machine.emulate();
        assert_eq!(machine.clocks_spent(),clocks);
    }

    #[test]
    fn reset_state_is_deterministic() {
        let mut machine = Machine::new(2);
        machine.load_rom(&rom_with_program(&[0xdb])).expect("rom");
        machine.cpu.regs.d = 0xbeef;
        machine.cpu.regs.dbr = 0x12;
        machine.power_on();
        machine.emulate();
        assert!(machine.cpu.pins.emulation);
        assert_eq!(machine.cpu.regs.d,0);
        assert_eq!(machine.cpu.regs.dbr,0);
        assert_eq!(machine.cpu.regs.pbr,0);
        assert_eq!(machine.cpu.regs.s & 0xff00,0x0100);
        assert!(machine.cpu.regs.p.contains(Status::M | Status::X | Status::I));
    }

    #[test]
    fn shadowed_text_write_lands_in_e0() {
        let mut machine = Machine::new(2);
        machine.load_rom(&rom_with_program(&[
            0xa9,0x41,          // LDA #$41
            0x8d,0x00,0x04,     // STA $0400
            0xdb
        ])).expect("rom");
        machine.power_on();
        machine.emulate();
        machine.emulate_cycles(64);
        assert!(machine.is_stopped());
        assert_eq!(machine.peek(0x0400,0x00),0x41);
        assert_eq!(machine.peek(0x0400,0xe0),0x41);
    }

    #[test]
    fn memory_round_trip_outside_io() {
        let mut machine = Machine::new(2);
        machine.load_rom(&rom_with_program(&[0xdb])).expect("rom");
        machine.power_on();
        machine.emulate();
        for (adr,bank,value) in [(0x1234u16,0x00u8,0x5au8),(0x8000,0x01,0xa5),(0x0010,0xe1,0x3c)] {
            machine.board.mem_write(value,adr,bank,MemOp::Data);
            assert_eq!(machine.peek(adr,bank),value,"{:02X}:{:04X}",bank,adr);
        }
    }

    #[test]
    fn wai_resumes_on_irq() {
        // enable the quarter-second interrupt, then WAI with I clear
        let mut machine = Machine::new(2);
        let mut rom = rom_with_program(&[
            0xa9,0x10,          // LDA #$10 (qsec enable)
            0x8d,0x41,0xc0,     // STA $C041
            0x58,               // CLI
            0xcb,               // WAI
            0xea
        ]);
        // IRQ handler: STP, so the stack survives for inspection
        rom[0xfffe] = 0x00;
        rom[0xffff] = 0xe8;
        rom[0xe800] = 0xdb;
        machine.load_rom(&rom).expect("rom");
        machine.power_on();
        machine.emulate();
        machine.emulate_cycles(32);
        assert!(!machine.cpu.pins.ready_out);
        let pc_after_wai = machine.cpu.regs.pc;
        // run a bit over a quarter second of emulated time (the machine
        // idles at one cycle per step while WAI holds ready low)
        machine.emulate_cycles(800_000);
        assert!(machine.cpu.pins.ready_out);
        assert!(machine.is_stopped(),"irq handler never ran");
        // the CPU vectored with the return address just past WAI
        let ret_lo = machine.peek(machine.cpu.regs.s.wrapping_add(2),0x00);
        let ret_hi = machine.peek(machine.cpu.regs.s.wrapping_add(3),0x00);
        assert_eq!(((ret_hi as u16) << 8) | ret_lo as u16,pc_after_wai);
        assert!(machine.cpu.regs.p.contains(Status::I));
    }
}
