//! # 65C816 interpreter
//!
//! A decode/execute engine for the WDC 65C816: every addressing mode, the
//! emulation/native modes with the M and X width flags, decimal
//! arithmetic, interrupts and the documented stack quirks.  The CPU owns
//! nothing but its registers and pins; every memory cycle goes through the
//! [`Bus`] trait, which also advances the machine clock, so cycle
//! accounting falls out of the access pattern itself.

pub mod alu;
pub mod disasm;

use bitflags::bitflags;

use crate::mem::MemOp;
use alu::set16_lo;
pub use disasm::{AddrMode,Instruction,OpcodeDesc,OPCODE_TABLE};

//  interrupt vectors (bank 00)
pub const VECTOR_NATIVE_COP: u16 = 0xffe4;
pub const VECTOR_NATIVE_BRK: u16 = 0xffe6;
pub const VECTOR_NATIVE_NMI: u16 = 0xffea;
pub const VECTOR_NATIVE_IRQ: u16 = 0xffee;
pub const VECTOR_EMU_COP: u16 = 0xfff4;
pub const VECTOR_EMU_NMI: u16 = 0xfffa;
pub const VECTOR_RESET: u16 = 0xfffc;
pub const VECTOR_EMU_IRQBRK: u16 = 0xfffe;

bitflags! {
    /// The P register.  The X bit doubles as B on the emulated 6502
    /// status; in emulation mode M and X are held high so the distinction
    /// only matters when P transits the stack.
    #[derive(Clone,Copy,PartialEq,Eq,Debug)]
    pub struct Status: u8 {
        const C = 0x01;
        const Z = 0x02;
        const I = 0x04;
        const D = 0x08;
        const X = 0x10;
        const M = 0x20;
        const V = 0x40;
        const N = 0x80;
    }
}

/// Every memory cycle the interpreter issues goes through here; the
/// implementation is expected to advance the machine clock per access and
/// per internal cycle.
pub trait Bus {
    fn mem_read(&mut self,adr: u16,bank: u8,op: MemOp) -> u8;
    fn mem_write(&mut self,data: u8,adr: u16,bank: u8,op: MemOp);
    /// internal operation cycles (no address strobe)
    fn internal_cycles(&mut self,count: u32);
    /// one record per retired opcode when the `opcode-trace` feature is on
    #[cfg(feature = "opcode-trace")]
    fn trace(&mut self,instr: &Instruction) {
        let _ = instr;
    }
}

/// Optional per-opcode trace receiver, active with the `opcode-trace`
/// feature.
pub trait TraceSink {
    fn opcode(&mut self,instr: &Instruction,regs: &Registers);
}

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum CpuState {
    Reset,
    Execute,
    Irq,
    Nmi
}

#[derive(Clone)]
pub struct Registers {
    pub a: u16,
    pub x: u16,
    pub y: u16,
    pub d: u16,
    pub s: u16,
    pub pc: u16,
    pub ir: u8,
    pub p: Status,
    pub dbr: u8,
    pub pbr: u8
}

#[derive(Clone)]
pub struct Pins {
    pub adr: u16,
    pub bank: u8,
    pub data: u8,
    pub irqb_in: bool,
    pub nmib_in: bool,
    pub resb_in: bool,
    pub ready_out: bool,
    pub emulation: bool,
    pub vda_out: bool,
    pub vpa_out: bool,
    pub rwb_out: bool
}

pub struct Cpu65C816 {
    pub regs: Registers,
    pub pins: Pins,
    pub state: CpuState,
    pub cycles_spent: u64,
    pub enabled: bool,
    nmi_latch: bool
}

impl Cpu65C816 {
    pub fn new() -> Self {
        Self {
            regs: Registers {
                a: 0,x: 0,y: 0,d: 0,s: 0x01ff,pc: 0,
                ir: 0,p: Status::M | Status::X | Status::I,dbr: 0,pbr: 0
            },
            pins: Pins {
                adr: 0,bank: 0,data: 0,
                irqb_in: true,nmib_in: true,resb_in: true,
                ready_out: true,emulation: true,
                vda_out: false,vpa_out: false,rwb_out: true
            },
            state: CpuState::Reset,
            cycles_spent: 0,
            enabled: true,
            nmi_latch: false
        }
    }

    //  -------------------------------------------------------------------
    //  memory cycles

    fn read<B: Bus>(&mut self,bus: &mut B,adr: u16,bank: u8,op: MemOp) -> u8 {
        let data = bus.mem_read(adr,bank,op);
        self.pins.adr = adr;
        self.pins.bank = bank;
        self.pins.data = data;
        self.pins.rwb_out = true;
        self.pins.vpa_out = matches!(op,MemOp::Opcode | MemOp::Program);
        self.pins.vda_out = matches!(op,MemOp::Opcode | MemOp::Data);
        self.cycles_spent += 1;
        data
    }

    fn write<B: Bus>(&mut self,bus: &mut B,data: u8,adr: u16,bank: u8) {
        bus.mem_write(data,adr,bank,MemOp::Data);
        self.pins.adr = adr;
        self.pins.bank = bank;
        self.pins.data = data;
        self.pins.rwb_out = false;
        self.pins.vpa_out = false;
        self.pins.vda_out = true;
        self.cycles_spent += 1;
    }

    fn cycle<B: Bus>(&mut self,bus: &mut B,count: u32) {
        bus.internal_cycles(count);
        self.cycles_spent += count as u64;
    }

    /// 16-bit read within one bank (the address wraps, the bank does not)
    fn read_16<B: Bus>(&mut self,bus: &mut B,adr: u16,bank: u8,op: MemOp) -> u16 {
        let lo = self.read(bus,adr,bank,op) as u16;
        let hi = self.read(bus,adr.wrapping_add(1),bank,op) as u16;
        lo | (hi << 8)
    }

    fn write_16<B: Bus>(&mut self,bus: &mut B,value: u16,adr: u16,bank: u8) {
        self.write(bus,value as u8,adr,bank);
        self.write(bus,(value >> 8) as u8,adr.wrapping_add(1),bank);
    }

    /// successor of a data address; increments the bank only in native mode
    fn next_data_addr(&self,adr: u16,bank: u8) -> (u16,u8) {
        let next = adr.wrapping_add(1);
        if next == 0 && !self.pins.emulation {
            (next,bank.wrapping_add(1))
        } else {
            (next,bank)
        }
    }

    fn read_data_816<B: Bus>(&mut self,bus: &mut B,adr: u16,bank: u8,is8: bool) -> u16 {
        let lo = self.read(bus,adr,bank,MemOp::Data) as u16;
        if is8 {
            return lo;
        }
        let (adr,bank) = self.next_data_addr(adr,bank);
        let hi = self.read(bus,adr,bank,MemOp::Data) as u16;
        lo | (hi << 8)
    }

    fn write_data_816<B: Bus>(&mut self,bus: &mut B,value: u16,adr: u16,bank: u8,is8: bool) {
        self.write(bus,value as u8,adr,bank);
        if !is8 {
            let (adr,bank) = self.next_data_addr(adr,bank);
            self.write(bus,(value >> 8) as u8,adr,bank);
        }
    }

    /// Indexed effective address with the IO-cycle penalty policy:
    /// reads pay only on a 16-bit index or page crossing, writes and
    /// read-modify-writes always pay.
    fn index_effective<B: Bus>(&mut self,bus: &mut B,adr: u16,bank: u8,index: u16,
                               is8_index: bool,always_penalty: bool) -> (u16,u8) {
        let index = if is8_index { index & 0xff } else { index };
        let eff = adr.wrapping_add(index);
        let crossed = (eff & 0xff00) != (adr & 0xff00);
        let bank = if eff < adr && !self.pins.emulation {
            bank.wrapping_add(1)
        } else {
            bank
        };
        if always_penalty || crossed || !is8_index {
            self.cycle(bus,1);
        }
        (eff,bank)
    }

    //  -------------------------------------------------------------------
    //  operand fetch

    fn fetch_pba<B: Bus>(&mut self,bus: &mut B,pc: &mut u16) -> u8 {
        let data = self.read(bus,*pc,self.regs.pbr,MemOp::Program);
        *pc = pc.wrapping_add(1);
        data
    }

    fn fetch_pba_16<B: Bus>(&mut self,bus: &mut B,pc: &mut u16) -> u16 {
        let lo = self.fetch_pba(bus,pc) as u16;
        let hi = self.fetch_pba(bus,pc) as u16;
        lo | (hi << 8)
    }

    fn mode_imm_816<B: Bus>(&mut self,bus: &mut B,pc: &mut u16,is8: bool) -> u16 {
        let lo = self.fetch_pba(bus,pc) as u16;
        if is8 {
            return lo;
        }
        lo | ((self.fetch_pba(bus,pc) as u16) << 8)
    }

    /// direct page operand: D + offset (+index), with the extra IO cycle
    /// when the direct register's low byte is non-zero
    fn mode_dp<B: Bus>(&mut self,bus: &mut B,pc: &mut u16,index: u16,is8_index: bool) -> u16 {
        let offset = self.fetch_pba(bus,pc) as u16;
        let index = if is8_index { index & 0xff } else { index };
        if self.regs.d & 0xff != 0 {
            self.cycle(bus,1);
        }
        self.regs.d.wrapping_add(offset).wrapping_add(index)
    }

    fn mode_dp_indirect<B: Bus>(&mut self,bus: &mut B,pc: &mut u16,
                                index: u16,is8_index: bool) -> u16 {
        let ptr = self.mode_dp(bus,pc,index,is8_index);
        self.read_16(bus,ptr,0x00,MemOp::Data)
    }

    fn mode_dp_indirect_long<B: Bus>(&mut self,bus: &mut B,pc: &mut u16,
                                     index: u16,is8_index: bool) -> (u16,u8) {
        let ptr = self.mode_dp(bus,pc,index,is8_index);
        let adr = self.read_16(bus,ptr,0x00,MemOp::Data);
        let bank = self.read(bus,ptr.wrapping_add(2),0x00,MemOp::Data);
        (adr,bank)
    }

    fn mode_stack_rel<B: Bus>(&mut self,bus: &mut B,pc: &mut u16) -> u16 {
        let offset = self.fetch_pba(bus,pc) as u16;
        self.cycle(bus,1);
        self.regs.s.wrapping_add(offset)
    }

    fn mode_stack_rel_indirect<B: Bus>(&mut self,bus: &mut B,pc: &mut u16) -> u16 {
        let ptr = self.mode_stack_rel(bus,pc);
        let adr = self.read_16(bus,ptr,0x00,MemOp::Data);
        self.cycle(bus,1);
        adr
    }

    //  -------------------------------------------------------------------
    //  stack

    fn sp_dec(&mut self) {
        let sp = self.regs.s.wrapping_sub(1);
        self.regs.s = if self.pins.emulation { 0x0100 | (sp & 0xff) } else { sp };
    }
    fn sp_inc(&mut self) {
        let sp = self.regs.s.wrapping_add(1);
        self.regs.s = if self.pins.emulation { 0x0100 | (sp & 0xff) } else { sp };
    }

    fn push8<B: Bus>(&mut self,bus: &mut B,data: u8) {
        self.write(bus,data,self.regs.s,0x00);
        self.sp_dec();
    }
    fn push16<B: Bus>(&mut self,bus: &mut B,value: u16) {
        self.push8(bus,(value >> 8) as u8);
        self.push8(bus,value as u8);
    }
    fn pull8<B: Bus>(&mut self,bus: &mut B) -> u8 {
        self.sp_inc();
        self.read(bus,self.regs.s,0x00,MemOp::Data)
    }
    fn pull16<B: Bus>(&mut self,bus: &mut B) -> u16 {
        let lo = self.pull8(bus) as u16;
        let hi = self.pull8(bus) as u16;
        lo | (hi << 8)
    }

    /// "new" 65C816 pushes cross the page 1 boundary without wrapping even
    /// in emulation mode; only the final S stays in page 1
    fn push16_nowrap<B: Bus>(&mut self,bus: &mut B,value: u16) {
        self.write(bus,(value >> 8) as u8,self.regs.s,0x00);
        self.write(bus,value as u8,self.regs.s.wrapping_sub(1),0x00);
        self.sp_dec();
        self.sp_dec();
    }
    fn pull16_nowrap<B: Bus>(&mut self,bus: &mut B) -> u16 {
        let lo = self.read(bus,self.regs.s.wrapping_add(1),0x00,MemOp::Data) as u16;
        let hi = self.read(bus,self.regs.s.wrapping_add(2),0x00,MemOp::Data) as u16;
        self.sp_inc();
        self.sp_inc();
        lo | (hi << 8)
    }

    fn push_status<B: Bus>(&mut self,bus: &mut B,is_brk: bool) {
        let mut p = self.regs.p.bits();
        if self.pins.emulation {
            // the X bit position carries B on the emulated 6502
            if is_brk {
                p |= Status::X.bits();
            } else {
                p &= !Status::X.bits();
            }
        }
        self.push8(bus,p);
    }

    fn pull_status<B: Bus>(&mut self,bus: &mut B) {
        let p = self.pull8(bus);
        self.regs.p = Status::from_bits_retain(p);
        if self.pins.emulation {
            self.regs.p.insert(Status::M | Status::X);
        }
        self.apply_m_x();
    }

    /// an 8-bit index truncates the high bytes of X and Y immediately
    fn apply_m_x(&mut self) {
        if self.regs.p.contains(Status::X) {
            self.regs.x &= 0xff;
            self.regs.y &= 0xff;
        }
    }

    fn m8(&self) -> bool {
        self.regs.p.contains(Status::M)
    }
    fn x8(&self) -> bool {
        self.regs.p.contains(Status::X)
    }

    //  -------------------------------------------------------------------
    //  control flow

    fn branch<B: Bus>(&mut self,bus: &mut B,pc: &mut u16,offset: i8,do_branch: bool) {
        if !do_branch {
            return;
        }
        let target = pc.wrapping_add(offset as u16);
        if self.pins.emulation && (target & 0xff00) != (*pc & 0xff00) {
            self.cycle(bus,1);
        }
        self.cycle(bus,1);
        *pc = target;
    }

    /// common interrupt entry: push return state, mask interrupts, clear
    /// decimal, vector through bank 0
    fn interrupt<B: Bus>(&mut self,bus: &mut B,pc: u16,vector: u16,is_brk: bool) -> u16 {
        if !self.pins.emulation {
            self.push8(bus,self.regs.pbr);
        }
        self.push16(bus,pc);
        self.push_status(bus,is_brk);
        self.regs.p.insert(Status::I);
        self.regs.p.remove(Status::D);
        self.regs.pbr = 0x00;
        self.read_16(bus,vector,0x00,MemOp::Program)
    }

    /// Reset pin assertion: force the 6502-compatible power state.  The
    /// caller holds the machine in this state while RESB stays low.
    pub fn reset_assert(&mut self) {
        self.state = CpuState::Reset;
        self.regs.d = 0x0000;
        self.regs.dbr = 0x00;
        self.regs.pbr = 0x00;
        self.regs.s = 0x0100 | (self.regs.s & 0xff);
        self.regs.x &= 0xff;
        self.regs.y &= 0xff;
        self.regs.p.remove(Status::D | Status::C);
        self.regs.p.insert(Status::M | Status::X | Status::I);
        self.pins.emulation = true;
        self.pins.ready_out = true;
        self.enabled = true;
        self.nmi_latch = false;
    }

    /// RESB released: dummy stack reads then the reset vector fetch
    pub fn reset_release<B: Bus>(&mut self,bus: &mut B) {
        let s = self.regs.s;
        self.read(bus,s,0x00,MemOp::Data);
        let adr = set16_lo(s,s.wrapping_sub(1) as u32);
        self.read(bus,adr,0x00,MemOp::Data);
        self.sp_dec();
        self.sp_dec();
        self.read(bus,self.regs.s,0x00,MemOp::Data);
        self.sp_dec();
        self.regs.pc = self.read_16(bus,VECTOR_RESET,0x00,MemOp::Program);
        self.state = CpuState::Execute;
    }

    /// Hardware IRQ at an instruction boundary
    pub fn run_irq<B: Bus>(&mut self,bus: &mut B) {
        self.cycle(bus,2);
        let vector = if self.pins.emulation { VECTOR_EMU_IRQBRK } else { VECTOR_NATIVE_IRQ };
        self.regs.pc = self.interrupt(bus,self.regs.pc,vector,false);
        self.state = CpuState::Execute;
        self.pins.ready_out = true;
    }

    /// Edge-triggered NMI, overrides IRQ
    pub fn run_nmi<B: Bus>(&mut self,bus: &mut B) {
        self.cycle(bus,2);
        let vector = if self.pins.emulation { VECTOR_EMU_NMI } else { VECTOR_NATIVE_NMI };
        self.regs.pc = self.interrupt(bus,self.regs.pc,vector,false);
        self.state = CpuState::Execute;
        self.pins.ready_out = true;
    }

    /// Latch the NMI edge; returns true when a new edge arrived
    pub fn sample_nmi(&mut self,level_low: bool) -> bool {
        let edge = level_low && !self.nmi_latch;
        self.nmi_latch = level_low;
        edge
    }

    //  -------------------------------------------------------------------
    //  the interpreter

    /// Execute exactly one instruction, including all of its memory cycles.
    pub fn execute_one<B: Bus>(&mut self,bus: &mut B) {
        let opc_pbr = self.regs.pbr;
        let opc_addr = self.regs.pc;
        let cycles_before = self.cycles_spent;

        let mut pc = self.regs.pc;
        let ir = self.read(bus,pc,self.regs.pbr,MemOp::Opcode);
        pc = pc.wrapping_add(1);
        self.regs.ir = ir;

        let m8 = self.m8();
        let x8 = self.x8();

        match ir {
            //  ADC
            0x69 => {
                let value = self.mode_imm_816(bus,&mut pc,m8);
                self.alu_adc(value,m8);
            },
            0x6d => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_adc(value,m8);
            },
            0x6f => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let bank = self.fetch_pba(bus,&mut pc);
                let value = self.read_data_816(bus,adr,bank,m8);
                self.alu_adc(value,m8);
            },
            0x65 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_adc(value,m8);
            },
            0x72 => {
                let adr = self.mode_dp_indirect(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_adc(value,m8);
            },
            0x67 => {
                let (adr,bank) = self.mode_dp_indirect_long(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,bank,m8);
                self.alu_adc(value,m8);
            },
            0x7d => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.x,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_adc(value,m8);
            },
            0x7f => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let bank = self.fetch_pba(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,bank,self.regs.x,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_adc(value,m8);
            },
            0x79 => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_adc(value,m8);
            },
            0x75 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_adc(value,m8);
            },
            0x61 => {
                let ptr = self.mode_dp_indirect(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let value = self.read_data_816(bus,ptr,self.regs.dbr,m8);
                self.alu_adc(value,m8);
            },
            0x71 => {
                let adr = self.mode_dp_indirect(bus,&mut pc,0,false);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_adc(value,m8);
            },
            0x77 => {
                let (adr,bank) = self.mode_dp_indirect_long(bus,&mut pc,0,false);
                let (eff,bank) = self.index_effective(bus,adr,bank,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_adc(value,m8);
            },
            0x63 => {
                let adr = self.mode_stack_rel(bus,&mut pc);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_adc(value,m8);
            },
            0x73 => {
                let adr = self.mode_stack_rel_indirect(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_adc(value,m8);
            },

            //  AND
            0x29 => {
                let value = self.mode_imm_816(bus,&mut pc,m8);
                self.alu_and(value,m8);
            },
            0x2d => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_and(value,m8);
            },
            0x2f => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let bank = self.fetch_pba(bus,&mut pc);
                let value = self.read_data_816(bus,adr,bank,m8);
                self.alu_and(value,m8);
            },
            0x25 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_and(value,m8);
            },
            0x32 => {
                let adr = self.mode_dp_indirect(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_and(value,m8);
            },
            0x27 => {
                let (adr,bank) = self.mode_dp_indirect_long(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,bank,m8);
                self.alu_and(value,m8);
            },
            0x3d => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.x,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_and(value,m8);
            },
            0x3f => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let bank = self.fetch_pba(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,bank,self.regs.x,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_and(value,m8);
            },
            0x39 => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_and(value,m8);
            },
            0x35 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_and(value,m8);
            },
            0x21 => {
                let ptr = self.mode_dp_indirect(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let value = self.read_data_816(bus,ptr,self.regs.dbr,m8);
                self.alu_and(value,m8);
            },
            0x31 => {
                let adr = self.mode_dp_indirect(bus,&mut pc,0,false);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_and(value,m8);
            },
            0x37 => {
                let (adr,bank) = self.mode_dp_indirect_long(bus,&mut pc,0,false);
                let (eff,bank) = self.index_effective(bus,adr,bank,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_and(value,m8);
            },
            0x23 => {
                let adr = self.mode_stack_rel(bus,&mut pc);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_and(value,m8);
            },
            0x33 => {
                let adr = self.mode_stack_rel_indirect(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_and(value,m8);
            },

            //  ASL
            0x0a => {
                let mut value = self.regs.a;
                self.alu_asl(&mut value,m8);
                self.regs.a = value;
                self.cycle(bus,1);
            },
            0x0e => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let mut value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_asl(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,self.regs.dbr,m8);
            },
            0x06 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let mut value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_asl(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,0x00,m8);
            },
            0x1e => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.x,x8,true);
                let mut value = self.read_data_816(bus,eff,bank,m8);
                self.alu_asl(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,eff,bank,m8);
            },
            0x16 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let mut value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_asl(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,0x00,m8);
            },

            //  branches
            0x90 => {
                let offset = self.fetch_pba(bus,&mut pc) as i8;
                let cond = !self.regs.p.contains(Status::C);
                self.branch(bus,&mut pc,offset,cond);
            },
            0xb0 => {
                let offset = self.fetch_pba(bus,&mut pc) as i8;
                let cond = self.regs.p.contains(Status::C);
                self.branch(bus,&mut pc,offset,cond);
            },
            0xf0 => {
                let offset = self.fetch_pba(bus,&mut pc) as i8;
                let cond = self.regs.p.contains(Status::Z);
                self.branch(bus,&mut pc,offset,cond);
            },
            0xd0 => {
                let offset = self.fetch_pba(bus,&mut pc) as i8;
                let cond = !self.regs.p.contains(Status::Z);
                self.branch(bus,&mut pc,offset,cond);
            },
            0x30 => {
                let offset = self.fetch_pba(bus,&mut pc) as i8;
                let cond = self.regs.p.contains(Status::N);
                self.branch(bus,&mut pc,offset,cond);
            },
            0x10 => {
                let offset = self.fetch_pba(bus,&mut pc) as i8;
                let cond = !self.regs.p.contains(Status::N);
                self.branch(bus,&mut pc,offset,cond);
            },
            0x50 => {
                let offset = self.fetch_pba(bus,&mut pc) as i8;
                let cond = !self.regs.p.contains(Status::V);
                self.branch(bus,&mut pc,offset,cond);
            },
            0x70 => {
                let offset = self.fetch_pba(bus,&mut pc) as i8;
                let cond = self.regs.p.contains(Status::V);
                self.branch(bus,&mut pc,offset,cond);
            },
            0x80 => {
                let offset = self.fetch_pba(bus,&mut pc) as i8;
                self.branch(bus,&mut pc,offset,true);
            },
            0x82 => {
                let offset = self.fetch_pba_16(bus,&mut pc);
                self.cycle(bus,1);
                pc = pc.wrapping_add(offset);
            },

            //  BIT
            0x89 => {
                let value = self.mode_imm_816(bus,&mut pc,m8);
                self.alu_bit_imm(value,m8);
            },
            0x2c => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_bit(value,m8);
            },
            0x24 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_bit(value,m8);
            },
            0x3c => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.x,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_bit(value,m8);
            },
            0x34 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_bit(value,m8);
            },

            //  BRK / COP
            0x00 => {
                self.fetch_pba(bus,&mut pc);    // signature byte
                let vector = if self.pins.emulation { VECTOR_EMU_IRQBRK } else { VECTOR_NATIVE_BRK };
                pc = self.interrupt(bus,pc,vector,true);
            },
            0x02 => {
                self.fetch_pba(bus,&mut pc);
                let vector = if self.pins.emulation { VECTOR_EMU_COP } else { VECTOR_NATIVE_COP };
                pc = self.interrupt(bus,pc,vector,false);
            },

            //  flag ops
            0x18 => {
                self.regs.p.remove(Status::C);
                self.cycle(bus,1);
            },
            0xd8 => {
                self.regs.p.remove(Status::D);
                self.cycle(bus,1);
            },
            0x58 => {
                self.regs.p.remove(Status::I);
                self.cycle(bus,1);
            },
            0xb8 => {
                self.regs.p.remove(Status::V);
                self.cycle(bus,1);
            },
            0x38 => {
                self.regs.p.insert(Status::C);
                self.cycle(bus,1);
            },
            0xf8 => {
                self.regs.p.insert(Status::D);
                self.cycle(bus,1);
            },
            0x78 => {
                self.regs.p.insert(Status::I);
                self.cycle(bus,1);
            },

            //  CMP
            0xc9 => {
                let value = self.mode_imm_816(bus,&mut pc,m8);
                self.alu_cmp(self.regs.a,value,m8);
            },
            0xcd => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_cmp(self.regs.a,value,m8);
            },
            0xcf => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let bank = self.fetch_pba(bus,&mut pc);
                let value = self.read_data_816(bus,adr,bank,m8);
                self.alu_cmp(self.regs.a,value,m8);
            },
            0xc5 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_cmp(self.regs.a,value,m8);
            },
            0xd2 => {
                let adr = self.mode_dp_indirect(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_cmp(self.regs.a,value,m8);
            },
            0xc7 => {
                let (adr,bank) = self.mode_dp_indirect_long(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,bank,m8);
                self.alu_cmp(self.regs.a,value,m8);
            },
            0xdd => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.x,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_cmp(self.regs.a,value,m8);
            },
            0xdf => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let bank = self.fetch_pba(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,bank,self.regs.x,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_cmp(self.regs.a,value,m8);
            },
            0xd9 => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_cmp(self.regs.a,value,m8);
            },
            0xd5 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_cmp(self.regs.a,value,m8);
            },
            0xc1 => {
                let ptr = self.mode_dp_indirect(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let value = self.read_data_816(bus,ptr,self.regs.dbr,m8);
                self.alu_cmp(self.regs.a,value,m8);
            },
            0xd1 => {
                let adr = self.mode_dp_indirect(bus,&mut pc,0,false);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_cmp(self.regs.a,value,m8);
            },
            0xd7 => {
                let (adr,bank) = self.mode_dp_indirect_long(bus,&mut pc,0,false);
                let (eff,bank) = self.index_effective(bus,adr,bank,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_cmp(self.regs.a,value,m8);
            },
            0xc3 => {
                let adr = self.mode_stack_rel(bus,&mut pc);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_cmp(self.regs.a,value,m8);
            },
            0xd3 => {
                let adr = self.mode_stack_rel_indirect(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_cmp(self.regs.a,value,m8);
            },

            //  CPX / CPY
            0xe0 => {
                let value = self.mode_imm_816(bus,&mut pc,x8);
                self.alu_cmp(self.regs.x,value,x8);
            },
            0xec => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let value = self.read_data_816(bus,adr,self.regs.dbr,x8);
                self.alu_cmp(self.regs.x,value,x8);
            },
            0xe4 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,0x00,x8);
                self.alu_cmp(self.regs.x,value,x8);
            },
            0xc0 => {
                let value = self.mode_imm_816(bus,&mut pc,x8);
                self.alu_cmp(self.regs.y,value,x8);
            },
            0xcc => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let value = self.read_data_816(bus,adr,self.regs.dbr,x8);
                self.alu_cmp(self.regs.y,value,x8);
            },
            0xc4 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,0x00,x8);
                self.alu_cmp(self.regs.y,value,x8);
            },

            //  DEC / INC
            0x3a => {
                let mut value = self.regs.a;
                self.alu_dec(&mut value,m8);
                self.regs.a = value;
                self.cycle(bus,1);
            },
            0xce => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let mut value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_dec(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,self.regs.dbr,m8);
            },
            0xc6 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let mut value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_dec(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,0x00,m8);
            },
            0xde => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.x,x8,true);
                let mut value = self.read_data_816(bus,eff,bank,m8);
                self.alu_dec(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,eff,bank,m8);
            },
            0xd6 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let mut value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_dec(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,0x00,m8);
            },
            0xca => {
                let mut value = self.regs.x;
                self.alu_dec(&mut value,x8);
                self.regs.x = value;
                self.cycle(bus,1);
            },
            0x88 => {
                let mut value = self.regs.y;
                self.alu_dec(&mut value,x8);
                self.regs.y = value;
                self.cycle(bus,1);
            },
            0x1a => {
                let mut value = self.regs.a;
                self.alu_inc(&mut value,m8);
                self.regs.a = value;
                self.cycle(bus,1);
            },
            0xee => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let mut value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_inc(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,self.regs.dbr,m8);
            },
            0xe6 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let mut value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_inc(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,0x00,m8);
            },
            0xfe => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.x,x8,true);
                let mut value = self.read_data_816(bus,eff,bank,m8);
                self.alu_inc(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,eff,bank,m8);
            },
            0xf6 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let mut value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_inc(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,0x00,m8);
            },
            0xe8 => {
                let mut value = self.regs.x;
                self.alu_inc(&mut value,x8);
                self.regs.x = value;
                self.cycle(bus,1);
            },
            0xc8 => {
                let mut value = self.regs.y;
                self.alu_inc(&mut value,x8);
                self.regs.y = value;
                self.cycle(bus,1);
            },

            //  EOR
            0x49 => {
                let value = self.mode_imm_816(bus,&mut pc,m8);
                self.alu_eor(value,m8);
            },
            0x4d => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_eor(value,m8);
            },
            0x4f => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let bank = self.fetch_pba(bus,&mut pc);
                let value = self.read_data_816(bus,adr,bank,m8);
                self.alu_eor(value,m8);
            },
            0x45 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_eor(value,m8);
            },
            0x52 => {
                let adr = self.mode_dp_indirect(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_eor(value,m8);
            },
            0x47 => {
                let (adr,bank) = self.mode_dp_indirect_long(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,bank,m8);
                self.alu_eor(value,m8);
            },
            0x5d => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.x,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_eor(value,m8);
            },
            0x5f => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let bank = self.fetch_pba(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,bank,self.regs.x,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_eor(value,m8);
            },
            0x59 => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_eor(value,m8);
            },
            0x55 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_eor(value,m8);
            },
            0x41 => {
                let ptr = self.mode_dp_indirect(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let value = self.read_data_816(bus,ptr,self.regs.dbr,m8);
                self.alu_eor(value,m8);
            },
            0x51 => {
                let adr = self.mode_dp_indirect(bus,&mut pc,0,false);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_eor(value,m8);
            },
            0x57 => {
                let (adr,bank) = self.mode_dp_indirect_long(bus,&mut pc,0,false);
                let (eff,bank) = self.index_effective(bus,adr,bank,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_eor(value,m8);
            },
            0x43 => {
                let adr = self.mode_stack_rel(bus,&mut pc);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_eor(value,m8);
            },
            0x53 => {
                let adr = self.mode_stack_rel_indirect(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_eor(value,m8);
            },

            //  jumps and calls
            0x4c => {
                pc = self.fetch_pba_16(bus,&mut pc);
            },
            0x6c => {
                let ptr = self.fetch_pba_16(bus,&mut pc);
                pc = self.read_16(bus,ptr,0x00,MemOp::Data);
            },
            0x7c => {
                let ptr = self.fetch_pba_16(bus,&mut pc);
                self.cycle(bus,1);
                let index = if x8 { self.regs.x & 0xff } else { self.regs.x };
                pc = self.read_16(bus,ptr.wrapping_add(index),self.regs.pbr,MemOp::Data);
            },
            0x5c => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let bank = self.fetch_pba(bus,&mut pc);
                self.regs.pbr = bank;
                pc = adr;
            },
            0xdc => {
                let ptr = self.fetch_pba_16(bus,&mut pc);
                let adr = self.read_16(bus,ptr,0x00,MemOp::Data);
                let bank = self.read(bus,ptr.wrapping_add(2),0x00,MemOp::Data);
                self.regs.pbr = bank;
                pc = adr;
            },
            0x20 => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                pc = pc.wrapping_sub(1);    // last operand byte
                self.cycle(bus,1);
                self.push16(bus,pc);
                pc = adr;
            },
            0xfc => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                pc = pc.wrapping_sub(1);
                self.push16(bus,pc);
                self.cycle(bus,1);
                let index = if x8 { self.regs.x & 0xff } else { self.regs.x };
                pc = self.read_16(bus,adr.wrapping_add(index),self.regs.pbr,MemOp::Data);
            },
            0x22 => {
                //  JSL never wraps the stack, even in emulation
                let adr = self.fetch_pba_16(bus,&mut pc);
                self.write(bus,self.regs.pbr,self.regs.s,0x00);
                self.cycle(bus,1);
                let bank = self.fetch_pba(bus,&mut pc);
                pc = pc.wrapping_sub(1);
                self.write(bus,(pc >> 8) as u8,self.regs.s.wrapping_sub(1),0x00);
                self.write(bus,pc as u8,self.regs.s.wrapping_sub(2),0x00);
                self.sp_dec();
                self.sp_dec();
                self.sp_dec();
                self.regs.pbr = bank;
                pc = adr;
            },
            0x60 => {
                self.cycle(bus,2);
                let mut sp = self.regs.s.wrapping_add(1);
                if self.pins.emulation {
                    sp = set16_lo(self.regs.s,sp as u32);
                }
                let lo = self.read(bus,sp,0x00,MemOp::Data) as u16;
                let mut sp2 = sp.wrapping_add(1);
                if self.pins.emulation {
                    sp2 = set16_lo(self.regs.s,sp2 as u32);
                }
                let hi = self.read(bus,sp2,0x00,MemOp::Data) as u16;
                self.cycle(bus,1);
                self.sp_inc();
                self.sp_inc();
                pc = (lo | (hi << 8)).wrapping_add(1);
            },
            0x6b => {
                //  RTL reads over the top of page 1 without wrapping
                self.cycle(bus,2);
                let lo = self.read(bus,self.regs.s.wrapping_add(1),0x00,MemOp::Data) as u16;
                let hi = self.read(bus,self.regs.s.wrapping_add(2),0x00,MemOp::Data) as u16;
                let bank = self.read(bus,self.regs.s.wrapping_add(3),0x00,MemOp::Data);
                self.sp_inc();
                self.sp_inc();
                self.sp_inc();
                self.regs.pbr = bank;
                pc = (lo | (hi << 8)).wrapping_add(1);
            },
            0x40 => {
                self.cycle(bus,2);
                self.pull_status(bus);
                pc = self.pull16(bus);
                if !self.pins.emulation {
                    self.regs.pbr = self.pull8(bus);
                }
            },

            //  LDA
            0xa9 => {
                let value = self.mode_imm_816(bus,&mut pc,m8);
                let value = self.load_816(value,m8);
                self.regs.a = if m8 { set16_lo(self.regs.a,value as u32) } else { value };
            },
            0xad => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                let value = self.load_816(value,m8);
                self.regs.a = if m8 { set16_lo(self.regs.a,value as u32) } else { value };
            },
            0xaf => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let bank = self.fetch_pba(bus,&mut pc);
                let value = self.read_data_816(bus,adr,bank,m8);
                let value = self.load_816(value,m8);
                self.regs.a = if m8 { set16_lo(self.regs.a,value as u32) } else { value };
            },
            0xa5 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,0x00,m8);
                let value = self.load_816(value,m8);
                self.regs.a = if m8 { set16_lo(self.regs.a,value as u32) } else { value };
            },
            0xb2 => {
                let adr = self.mode_dp_indirect(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                let value = self.load_816(value,m8);
                self.regs.a = if m8 { set16_lo(self.regs.a,value as u32) } else { value };
            },
            0xa7 => {
                let (adr,bank) = self.mode_dp_indirect_long(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,bank,m8);
                let value = self.load_816(value,m8);
                self.regs.a = if m8 { set16_lo(self.regs.a,value as u32) } else { value };
            },
            0xbd => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.x,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                let value = self.load_816(value,m8);
                self.regs.a = if m8 { set16_lo(self.regs.a,value as u32) } else { value };
            },
            0xbf => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let bank = self.fetch_pba(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,bank,self.regs.x,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                let value = self.load_816(value,m8);
                self.regs.a = if m8 { set16_lo(self.regs.a,value as u32) } else { value };
            },
            0xb9 => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                let value = self.load_816(value,m8);
                self.regs.a = if m8 { set16_lo(self.regs.a,value as u32) } else { value };
            },
            0xb5 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let value = self.read_data_816(bus,adr,0x00,m8);
                let value = self.load_816(value,m8);
                self.regs.a = if m8 { set16_lo(self.regs.a,value as u32) } else { value };
            },
            0xa1 => {
                let ptr = self.mode_dp_indirect(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let value = self.read_data_816(bus,ptr,self.regs.dbr,m8);
                let value = self.load_816(value,m8);
                self.regs.a = if m8 { set16_lo(self.regs.a,value as u32) } else { value };
            },
            0xb1 => {
                let adr = self.mode_dp_indirect(bus,&mut pc,0,false);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                let value = self.load_816(value,m8);
                self.regs.a = if m8 { set16_lo(self.regs.a,value as u32) } else { value };
            },
            0xb7 => {
                let (adr,bank) = self.mode_dp_indirect_long(bus,&mut pc,0,false);
                let (eff,bank) = self.index_effective(bus,adr,bank,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                let value = self.load_816(value,m8);
                self.regs.a = if m8 { set16_lo(self.regs.a,value as u32) } else { value };
            },
            0xa3 => {
                let adr = self.mode_stack_rel(bus,&mut pc);
                let value = self.read_data_816(bus,adr,0x00,m8);
                let value = self.load_816(value,m8);
                self.regs.a = if m8 { set16_lo(self.regs.a,value as u32) } else { value };
            },
            0xb3 => {
                let adr = self.mode_stack_rel_indirect(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                let value = self.load_816(value,m8);
                self.regs.a = if m8 { set16_lo(self.regs.a,value as u32) } else { value };
            },

            //  LDX / LDY
            0xa2 => {
                let value = self.mode_imm_816(bus,&mut pc,x8);
                self.regs.x = self.load_816(value,x8);
            },
            0xae => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let value = self.read_data_816(bus,adr,self.regs.dbr,x8);
                self.regs.x = self.load_816(value,x8);
            },
            0xa6 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,0x00,x8);
                self.regs.x = self.load_816(value,x8);
            },
            0xbe => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,x8);
                self.regs.x = self.load_816(value,x8);
            },
            0xb6 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.y,x8);
                self.cycle(bus,1);
                let value = self.read_data_816(bus,adr,0x00,x8);
                self.regs.x = self.load_816(value,x8);
            },
            0xa0 => {
                let value = self.mode_imm_816(bus,&mut pc,x8);
                self.regs.y = self.load_816(value,x8);
            },
            0xac => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let value = self.read_data_816(bus,adr,self.regs.dbr,x8);
                self.regs.y = self.load_816(value,x8);
            },
            0xa4 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,0x00,x8);
                self.regs.y = self.load_816(value,x8);
            },
            0xbc => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.x,x8,false);
                let value = self.read_data_816(bus,eff,bank,x8);
                self.regs.y = self.load_816(value,x8);
            },
            0xb4 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let value = self.read_data_816(bus,adr,0x00,x8);
                self.regs.y = self.load_816(value,x8);
            },

            //  LSR
            0x4a => {
                let mut value = self.regs.a;
                self.alu_lsr(&mut value,m8);
                self.regs.a = value;
                self.cycle(bus,1);
            },
            0x4e => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let mut value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_lsr(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,self.regs.dbr,m8);
            },
            0x46 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let mut value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_lsr(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,0x00,m8);
            },
            0x5e => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.x,x8,true);
                let mut value = self.read_data_816(bus,eff,bank,m8);
                self.alu_lsr(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,eff,bank,m8);
            },
            0x56 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let mut value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_lsr(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,0x00,m8);
            },

            //  move block: one byte per execution, PC rewinds until done so
            //  interrupts land between transfers
            0x54 | 0x44 => {
                let dst_bank = self.fetch_pba(bus,&mut pc);
                let src_bank = self.fetch_pba(bus,&mut pc);
                let index_mask: u16 = if x8 { 0x00ff } else { 0xffff };
                let data = self.read(bus,self.regs.x & index_mask,src_bank,MemOp::Data);
                self.write(bus,data,self.regs.y & index_mask,dst_bank);
                self.cycle(bus,2);
                // MVN ascends, MVP descends
                let delta: u16 = if ir == 0x54 { 1 } else { 0xffff };
                self.regs.x = (self.regs.x & !index_mask)
                    | (self.regs.x.wrapping_add(delta) & index_mask);
                self.regs.y = (self.regs.y & !index_mask)
                    | (self.regs.y.wrapping_add(delta) & index_mask);
                self.regs.dbr = dst_bank;
                self.regs.a = self.regs.a.wrapping_sub(1);
                if self.regs.a != 0xffff {
                    pc = opc_addr;
                }
            },

            0xea => {
                self.cycle(bus,1);
            },

            //  ORA
            0x09 => {
                let value = self.mode_imm_816(bus,&mut pc,m8);
                self.alu_ora(value,m8);
            },
            0x0d => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_ora(value,m8);
            },
            0x0f => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let bank = self.fetch_pba(bus,&mut pc);
                let value = self.read_data_816(bus,adr,bank,m8);
                self.alu_ora(value,m8);
            },
            0x05 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_ora(value,m8);
            },
            0x12 => {
                let adr = self.mode_dp_indirect(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_ora(value,m8);
            },
            0x07 => {
                let (adr,bank) = self.mode_dp_indirect_long(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,bank,m8);
                self.alu_ora(value,m8);
            },
            0x1d => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.x,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_ora(value,m8);
            },
            0x1f => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let bank = self.fetch_pba(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,bank,self.regs.x,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_ora(value,m8);
            },
            0x19 => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_ora(value,m8);
            },
            0x15 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_ora(value,m8);
            },
            0x01 => {
                let ptr = self.mode_dp_indirect(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let value = self.read_data_816(bus,ptr,self.regs.dbr,m8);
                self.alu_ora(value,m8);
            },
            0x11 => {
                let adr = self.mode_dp_indirect(bus,&mut pc,0,false);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_ora(value,m8);
            },
            0x17 => {
                let (adr,bank) = self.mode_dp_indirect_long(bus,&mut pc,0,false);
                let (eff,bank) = self.index_effective(bus,adr,bank,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_ora(value,m8);
            },
            0x03 => {
                let adr = self.mode_stack_rel(bus,&mut pc);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_ora(value,m8);
            },
            0x13 => {
                let adr = self.mode_stack_rel_indirect(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_ora(value,m8);
            },

            //  stack effects
            0xf4 => {
                let value = self.fetch_pba_16(bus,&mut pc);
                self.push16_nowrap(bus,value);
            },
            0xd4 => {
                let ptr = self.mode_dp(bus,&mut pc,0,false);
                let value = self.read_16(bus,ptr,0x00,MemOp::Data);
                self.push16_nowrap(bus,value);
            },
            0x62 => {
                let offset = self.fetch_pba_16(bus,&mut pc);
                self.cycle(bus,1);
                let value = pc.wrapping_add(offset);
                self.push16_nowrap(bus,value);
            },
            0x48 => {
                self.cycle(bus,1);
                if m8 {
                    self.push8(bus,self.regs.a as u8);
                } else {
                    self.push16(bus,self.regs.a);
                }
            },
            0x8b => {
                self.cycle(bus,1);
                self.push8(bus,self.regs.dbr);
            },
            0x0b => {
                self.cycle(bus,1);
                self.push16_nowrap(bus,self.regs.d);
            },
            0x4b => {
                self.cycle(bus,1);
                self.push8(bus,self.regs.pbr);
            },
            0x08 => {
                self.cycle(bus,1);
                self.push_status(bus,true);
            },
            0xda => {
                self.cycle(bus,1);
                if x8 {
                    self.push8(bus,self.regs.x as u8);
                } else {
                    self.push16(bus,self.regs.x);
                }
            },
            0x5a => {
                self.cycle(bus,1);
                if x8 {
                    self.push8(bus,self.regs.y as u8);
                } else {
                    self.push16(bus,self.regs.y);
                }
            },
            0x68 => {
                self.cycle(bus,2);
                if m8 {
                    let value = self.pull8(bus) as u16;
                    self.p_flags_n_z_data(value as u8);
                    self.regs.a = set16_lo(self.regs.a,value as u32);
                } else {
                    let value = self.pull16(bus);
                    self.p_flags_n_z_data_16(value);
                    self.regs.a = value;
                }
            },
            0xab => {
                self.cycle(bus,2);
                let value = self.pull8(bus);
                self.p_flags_n_z_data(value);
                self.regs.dbr = value;
            },
            0x2b => {
                self.cycle(bus,2);
                let value = self.pull16_nowrap(bus);
                self.p_flags_n_z_data_16(value);
                self.regs.d = value;
            },
            0x28 => {
                self.cycle(bus,2);
                self.pull_status(bus);
            },
            0xfa => {
                self.cycle(bus,2);
                if x8 {
                    let value = self.pull8(bus) as u16;
                    self.p_flags_n_z_data(value as u8);
                    self.regs.x = value;
                } else {
                    let value = self.pull16(bus);
                    self.p_flags_n_z_data_16(value);
                    self.regs.x = value;
                }
            },
            0x7a => {
                self.cycle(bus,2);
                if x8 {
                    let value = self.pull8(bus) as u16;
                    self.p_flags_n_z_data(value as u8);
                    self.regs.y = value;
                } else {
                    let value = self.pull16(bus);
                    self.p_flags_n_z_data_16(value);
                    self.regs.y = value;
                }
            },

            //  status width control
            0xc2 => {
                let mask = self.fetch_pba(bus,&mut pc);
                self.cycle(bus,1);
                self.regs.p = Status::from_bits_retain(self.regs.p.bits() & !mask);
                if self.pins.emulation {
                    self.regs.p.insert(Status::M | Status::X);
                }
                self.apply_m_x();
            },
            0xe2 => {
                let mask = self.fetch_pba(bus,&mut pc);
                self.cycle(bus,1);
                self.regs.p = Status::from_bits_retain(self.regs.p.bits() | mask);
                if self.pins.emulation {
                    self.regs.p.insert(Status::M | Status::X);
                }
                self.apply_m_x();
            },

            //  ROL / ROR
            0x2a => {
                let mut value = self.regs.a;
                self.alu_rol(&mut value,m8);
                self.regs.a = value;
                self.cycle(bus,1);
            },
            0x2e => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let mut value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_rol(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,self.regs.dbr,m8);
            },
            0x26 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let mut value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_rol(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,0x00,m8);
            },
            0x3e => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.x,x8,true);
                let mut value = self.read_data_816(bus,eff,bank,m8);
                self.alu_rol(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,eff,bank,m8);
            },
            0x36 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let mut value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_rol(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,0x00,m8);
            },
            0x6a => {
                let mut value = self.regs.a;
                self.alu_ror(&mut value,m8);
                self.regs.a = value;
                self.cycle(bus,1);
            },
            0x6e => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let mut value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_ror(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,self.regs.dbr,m8);
            },
            0x66 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let mut value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_ror(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,0x00,m8);
            },
            0x7e => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.x,x8,true);
                let mut value = self.read_data_816(bus,eff,bank,m8);
                self.alu_ror(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,eff,bank,m8);
            },
            0x76 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let mut value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_ror(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,0x00,m8);
            },

            //  SBC
            0xe9 => {
                let value = self.mode_imm_816(bus,&mut pc,m8);
                self.alu_sbc(value,m8);
            },
            0xed => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_sbc(value,m8);
            },
            0xef => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let bank = self.fetch_pba(bus,&mut pc);
                let value = self.read_data_816(bus,adr,bank,m8);
                self.alu_sbc(value,m8);
            },
            0xe5 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_sbc(value,m8);
            },
            0xf2 => {
                let adr = self.mode_dp_indirect(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_sbc(value,m8);
            },
            0xe7 => {
                let (adr,bank) = self.mode_dp_indirect_long(bus,&mut pc,0,false);
                let value = self.read_data_816(bus,adr,bank,m8);
                self.alu_sbc(value,m8);
            },
            0xfd => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.x,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_sbc(value,m8);
            },
            0xff => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let bank = self.fetch_pba(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,bank,self.regs.x,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_sbc(value,m8);
            },
            0xf9 => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_sbc(value,m8);
            },
            0xf5 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_sbc(value,m8);
            },
            0xe1 => {
                let ptr = self.mode_dp_indirect(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                let value = self.read_data_816(bus,ptr,self.regs.dbr,m8);
                self.alu_sbc(value,m8);
            },
            0xf1 => {
                let adr = self.mode_dp_indirect(bus,&mut pc,0,false);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_sbc(value,m8);
            },
            0xf7 => {
                let (adr,bank) = self.mode_dp_indirect_long(bus,&mut pc,0,false);
                let (eff,bank) = self.index_effective(bus,adr,bank,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_sbc(value,m8);
            },
            0xe3 => {
                let adr = self.mode_stack_rel(bus,&mut pc);
                let value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_sbc(value,m8);
            },
            0xf3 => {
                let adr = self.mode_stack_rel_indirect(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,false);
                let value = self.read_data_816(bus,eff,bank,m8);
                self.alu_sbc(value,m8);
            },

            //  STA
            0x8d => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                self.write_data_816(bus,self.regs.a,adr,self.regs.dbr,m8);
            },
            0x8f => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let bank = self.fetch_pba(bus,&mut pc);
                self.write_data_816(bus,self.regs.a,adr,bank,m8);
            },
            0x85 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                self.write_data_816(bus,self.regs.a,adr,0x00,m8);
            },
            0x92 => {
                let adr = self.mode_dp_indirect(bus,&mut pc,0,false);
                self.write_data_816(bus,self.regs.a,adr,self.regs.dbr,m8);
            },
            0x87 => {
                let (adr,bank) = self.mode_dp_indirect_long(bus,&mut pc,0,false);
                self.write_data_816(bus,self.regs.a,adr,bank,m8);
            },
            0x9d => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.x,x8,true);
                self.write_data_816(bus,self.regs.a,eff,bank,m8);
            },
            0x9f => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let bank = self.fetch_pba(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,bank,self.regs.x,x8,true);
                self.write_data_816(bus,self.regs.a,eff,bank,m8);
            },
            0x99 => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,true);
                self.write_data_816(bus,self.regs.a,eff,bank,m8);
            },
            0x95 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                self.write_data_816(bus,self.regs.a,adr,0x00,m8);
            },
            0x81 => {
                let ptr = self.mode_dp_indirect(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                self.write_data_816(bus,self.regs.a,ptr,self.regs.dbr,m8);
            },
            0x91 => {
                let adr = self.mode_dp_indirect(bus,&mut pc,0,false);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,true);
                self.write_data_816(bus,self.regs.a,eff,bank,m8);
            },
            0x97 => {
                let (adr,bank) = self.mode_dp_indirect_long(bus,&mut pc,0,false);
                let (eff,bank) = self.index_effective(bus,adr,bank,self.regs.y,x8,true);
                self.write_data_816(bus,self.regs.a,eff,bank,m8);
            },
            0x83 => {
                let adr = self.mode_stack_rel(bus,&mut pc);
                self.write_data_816(bus,self.regs.a,adr,0x00,m8);
            },
            0x93 => {
                let adr = self.mode_stack_rel_indirect(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.y,x8,true);
                self.write_data_816(bus,self.regs.a,eff,bank,m8);
            },

            0xdb => {
                self.cycle(bus,2);
                self.enabled = false;
            },

            //  STX / STY / STZ
            0x8e => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                self.write_data_816(bus,self.regs.x,adr,self.regs.dbr,x8);
            },
            0x86 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                self.write_data_816(bus,self.regs.x,adr,0x00,x8);
            },
            0x96 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.y,x8);
                self.cycle(bus,1);
                self.write_data_816(bus,self.regs.x,adr,0x00,x8);
            },
            0x8c => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                self.write_data_816(bus,self.regs.y,adr,self.regs.dbr,x8);
            },
            0x84 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                self.write_data_816(bus,self.regs.y,adr,0x00,x8);
            },
            0x94 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                self.write_data_816(bus,self.regs.y,adr,0x00,x8);
            },
            0x9c => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                self.write_data_816(bus,0,adr,self.regs.dbr,m8);
            },
            0x64 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                self.write_data_816(bus,0,adr,0x00,m8);
            },
            0x9e => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let (eff,bank) = self.index_effective(bus,adr,self.regs.dbr,self.regs.x,x8,true);
                self.write_data_816(bus,0,eff,bank,m8);
            },
            0x74 => {
                let adr = self.mode_dp(bus,&mut pc,self.regs.x,x8);
                self.cycle(bus,1);
                self.write_data_816(bus,0,adr,0x00,m8);
            },

            //  transfers
            0xaa => {
                let value = self.load_816(self.regs.a,x8);
                self.regs.x = if x8 { value & 0xff } else { value };
                self.cycle(bus,1);
            },
            0xa8 => {
                let value = self.load_816(self.regs.a,x8);
                self.regs.y = if x8 { value & 0xff } else { value };
                self.cycle(bus,1);
            },
            0x5b => {
                self.regs.d = self.regs.a;
                self.p_flags_n_z_data_16(self.regs.d);
                self.cycle(bus,1);
            },
            0x1b => {
                self.regs.s = if self.pins.emulation {
                    0x0100 | (self.regs.a & 0xff)
                } else {
                    self.regs.a
                };
                self.cycle(bus,1);
            },
            0x7b => {
                self.regs.a = self.regs.d;
                self.p_flags_n_z_data_16(self.regs.a);
                self.cycle(bus,1);
            },
            0x3b => {
                self.regs.a = self.regs.s;
                self.p_flags_n_z_data_16(self.regs.a);
                self.cycle(bus,1);
            },
            0xba => {
                let value = self.load_816(self.regs.s,x8);
                self.regs.x = if x8 { value & 0xff } else { value };
                self.cycle(bus,1);
            },
            0x8a => {
                let value = self.load_816(self.regs.x,m8);
                self.regs.a = if m8 { set16_lo(self.regs.a,value as u32) } else { value };
                self.cycle(bus,1);
            },
            0x9a => {
                self.regs.s = if self.pins.emulation {
                    0x0100 | (self.regs.x & 0xff)
                } else {
                    self.regs.x
                };
                self.cycle(bus,1);
            },
            0x9b => {
                let value = self.load_816(self.regs.x,x8);
                self.regs.y = if x8 { value & 0xff } else { value };
                self.cycle(bus,1);
            },
            0x98 => {
                let value = self.load_816(self.regs.y,m8);
                self.regs.a = if m8 { set16_lo(self.regs.a,value as u32) } else { value };
                self.cycle(bus,1);
            },
            0xbb => {
                let value = self.load_816(self.regs.y,x8);
                self.regs.x = if x8 { value & 0xff } else { value };
                self.cycle(bus,1);
            },

            //  TRB / TSB
            0x1c => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let mut value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_trb(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,self.regs.dbr,m8);
            },
            0x14 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let mut value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_trb(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,0x00,m8);
            },
            0x0c => {
                let adr = self.fetch_pba_16(bus,&mut pc);
                let mut value = self.read_data_816(bus,adr,self.regs.dbr,m8);
                self.alu_tsb(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,self.regs.dbr,m8);
            },
            0x04 => {
                let adr = self.mode_dp(bus,&mut pc,0,false);
                let mut value = self.read_data_816(bus,adr,0x00,m8);
                self.alu_tsb(&mut value,m8);
                self.cycle(bus,1);
                self.write_data_816(bus,value,adr,0x00,m8);
            },

            0xeb => {
                let value = self.regs.a;
                self.regs.a = ((value & 0xff) << 8) | ((value & 0xff00) >> 8);
                self.p_flags_n_z_data((self.regs.a & 0xff) as u8);
                self.cycle(bus,2);
            },
            0xfb => {
                let was_emulation = self.pins.emulation;
                self.pins.emulation = self.regs.p.contains(Status::C);
                if was_emulation != self.pins.emulation {
                    self.regs.p.insert(Status::M | Status::X);
                    if !was_emulation {
                        // dropping into emulation pins the stack to page 1
                        self.regs.s = 0x0100 | (self.regs.s & 0xff);
                    }
                    self.apply_m_x();
                }
                self.regs.p.set(Status::C,was_emulation);
                self.cycle(bus,1);
            },
            0x42 => {
                // WDM reserved; consume the signature byte
                let sig = self.fetch_pba(bus,&mut pc);
                log::debug!("wdm {:02X} treated as two-byte nop",sig);
            },
            0xcb => {
                self.cycle(bus,2);
                self.pins.ready_out = false;
            }
        }

        self.regs.pc = pc;

        #[cfg(feature = "opcode-trace")]
        {
            let instr = Instruction {
                opcode: self.regs.ir,
                pbr: opc_pbr,
                addr: opc_addr,
                operand: 0,
                bank: self.regs.dbr,
                opc_8: self.m8(),
                cycles_spent: (self.cycles_spent - cycles_before) as u32
            };
            bus.trace(&instr);
        }
        #[cfg(not(feature = "opcode-trace"))]
        {
            let _ = (opc_pbr,opc_addr,cycles_before);
        }
    }
}

#[cfg(test)]
mod tests;
