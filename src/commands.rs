//! # CLI command handlers
//!
//! Small front ends over the library: boot a ROM and step the machine,
//! describe a WOZ image, disassemble a blob.  Anything interactive
//! (video, sound, a debugger) belongs to a real host application.

use std::path::Path;

use clap::ArgMatches;
use log::info;

use crate::cpu::disasm;
use crate::machine::{DriveKind,Machine};
use crate::woz::{self,DiskType};
use crate::{DYNERR,STDRESULT};

#[derive(thiserror::Error,Debug)]
pub enum CommandError {
    #[error("bad command line input")]
    InvalidCommand,
    #[error("file could not be interpreted")]
    UnknownFormat
}

#[cfg(feature = "opcode-trace")]
struct LogTrace;

#[cfg(feature = "opcode-trace")]
impl crate::cpu::TraceSink for LogTrace {
    fn opcode(&mut self,instr: &crate::cpu::Instruction) {
        log::trace!("{:02X}/{:04X} {} ({} cycles)",
            instr.pbr,instr.addr,disasm::OPCODE_TABLE[instr.opcode as usize].name,
            instr.cycles_spent);
    }
}

/// `run` subcommand: boot and step until STP or the cycle limit
pub fn run(cmd: &ArgMatches) -> STDRESULT {
    let rom_path = cmd.get_one::<String>("rom").expect("rom path is required");
    let cycles: u64 = cmd.get_one::<String>("cycles").unwrap().parse()?;
    let banks: usize = cmd.get_one::<String>("banks").unwrap().parse()?;
    let rom = std::fs::read(rom_path)?;

    let mut machine = Machine::new(banks);
    machine.load_rom(&rom)?;

    if let Some(disk_path) = cmd.get_one::<String>("disk") {
        let bytes = std::fs::read(disk_path)?;
        let disk = woz::from_bytes(&bytes)?;
        let kind = match disk.disk_type {
            DiskType::D35 => DriveKind::D35Drive1,
            _ => DriveKind::D525Drive1
        };
        machine.insert_disk(kind,disk)?;
        info!("disk inserted into {:?}",kind);
    }

    #[cfg(feature = "opcode-trace")]
    if cmd.get_flag("trace") {
        machine.set_trace_sink(Some(Box::new(LogTrace)));
    }
    #[cfg(not(feature = "opcode-trace"))]
    if cmd.get_flag("trace") {
        log::error!("this build lacks the opcode-trace feature");
    }

    machine.power_on();
    machine.emulate_cycles(cycles);

    let tspec = &machine.board.tspec;
    let emulated_ns = tspec.ns_from_clocks(tspec.clocks_spent);
    println!("stopped at {:02X}/{:04X} after {} cpu cycles",
        machine.cpu.regs.pbr,machine.cpu.regs.pc,machine.cpu.cycles_spent);
    println!("emulated time {:.3} ms, {} clock units",
        emulated_ns as f64 / 1.0e6,tspec.clocks_spent);
    if machine.is_stopped() {
        println!("cpu stopped (STP)");
    }
    Ok(())
}

/// `info` subcommand: summarize a WOZ image
pub fn info(cmd: &ArgMatches) -> STDRESULT {
    let path = cmd.get_one::<String>("dimg").expect("dimg is required");
    let bytes = std::fs::read(Path::new(path))?;
    let disk = woz::from_bytes(&bytes)?;
    println!("disk type:     {}",match disk.disk_type {
        DiskType::D525 => "5.25 inch",
        DiskType::D35 => "3.5 inch",
        DiskType::None => "unknown"
    });
    println!("creator:       {}",String::from_utf8_lossy(&disk.creator).trim_end());
    println!("bit timing:    {} ns",disk.bit_timing_ns);
    println!("write protect: {}",disk.is_write_protected());
    println!("double sided:  {}",disk.is_double_sided());
    println!("tracks:        {}",disk.track_count);
    let mut mapped = 0;
    for qtr in 0..woz::QTR_TRACK_LIMIT {
        if disk.meta_track_map[qtr] != 0xff {
            mapped += 1;
        }
    }
    println!("quarter tracks mapped: {}",mapped);
    for track in 0..disk.track_count as usize {
        if disk.track_bits_count[track] > 0 {
            println!("  track {:3}: {:6} bits, {:5} bytes at +{}",
                track,disk.track_bits_count[track],disk.track_byte_count[track],
                disk.track_byte_offset[track]);
        }
    }
    if let Some(meta) = &disk.meta {
        println!("meta chunk ({} bytes): {}",meta.len(),hex::encode(&meta[..meta.len().min(64)]));
    }
    Ok(())
}

/// `dasm` subcommand: disassemble a raw binary
pub fn dasm(cmd: &ArgMatches) -> STDRESULT {
    let path = cmd.get_one::<String>("input").expect("input is required");
    let org = u16::from_str_radix(cmd.get_one::<String>("org").unwrap(),16)?;
    let short_regs = cmd.get_flag("mx");
    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        return Err(Box::new(CommandError::UnknownFormat) as DYNERR);
    }
    let mut offset = 0usize;
    while offset < bytes.len() {
        let addr = org.wrapping_add(offset as u16);
        let window = &bytes[offset..];
        let (text,size) = disasm::disassemble(window,addr,short_regs,short_regs);
        let used = &window[..size.min(window.len())];
        println!("{:04X}: {:<12} {}",addr,hex::encode_upper(used),text);
        offset += size;
    }
    Ok(())
}
