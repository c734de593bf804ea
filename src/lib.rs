//! # `gs816` main library
//!
//! This library emulates the core of the Apple IIGS: the 65C816 processor,
//! the FPI/Mega II memory mapping controller with its softswitches and
//! shadowing, and the IWM disk subsystem reading WOZ bit streams.
//!
//! ## Architecture
//!
//! The crate is layered bottom-up; higher layers depend only on lower ones:
//! * `clock` holds the shared 64-bit clock and the fast/slow step constants
//! * `mem` is the banked address space with its per-bank page maps
//! * `mmio` applies softswitch state to the page maps and dispatches the
//!   C0xx register file to the device shells (VGC, timer, RTC, ADB, SCC,
//!   sound GLU)
//! * `cpu` is the 65C816 interpreter, reaching memory only through a bus
//!   trait
//! * `iwm` is the disk controller with the 5.25 and 3.5 inch drive
//!   mechanics and the SmartPort bus
//! * `machine` ties the above into one steppable system
//!
//! The `Machine` owns all storage.  Hosts feed it input events through a
//! queue drained between steps, and read video/audio/drive state back
//! between steps; nothing inside the core is shared across threads.
//!
//! ## Emulation loop
//!
//! One call to `Machine::emulate` runs one instruction (or one interrupt
//! sequence), with every memory cycle advancing the clock by the fast or
//! the Mega II step as the access demands.  After the instruction the
//! device sync functions run and the IRQ line is resampled, so devices
//! always observe whole instructions.

pub mod clock;
pub mod mem;
pub mod mmio;
pub mod cpu;
pub mod iwm;
pub mod woz;
pub mod machine;
pub mod snapshot;
pub mod commands;

pub use machine::{Machine,DriveKind};

type DYNERR = Box<dyn std::error::Error>;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

/// Display binary to stdout in columns of hex and ascii
pub fn display_block(start_addr: u16,block: &[u8]) {
    let mut slice_start = 0;
    while slice_start < block.len() {
        let row_label = start_addr as usize + slice_start;
        let slice_end = (slice_start + 16).min(block.len());
        let slice = &block[slice_start..slice_end];
        let txt: String = slice.iter().map(|c| match *c {
            x if x < 32 => '.',
            x if x < 127 => x as char,
            _ => '.'
        }).collect();
        print!("{:04X} : ",row_label);
        for byte in slice {
            print!("{:02X} ",byte);
        }
        for _blank in slice_end..slice_start + 16 {
            print!("   ");
        }
        println!("| {}",txt);
        slice_start += 16;
    }
}
