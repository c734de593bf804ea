//! # Video Graphics Controller interface
//!
//! Pixel expansion is the host's job; the core tracks the mode switches,
//! the text/graphics scanline offset tables (also used for floating-bus
//! reads), the vertical/horizontal counters derived from the clock, and the
//! VBL/scanline interrupt lines.
//!
//! Counter layout follows the IIGS technotes: 65 Mega II cycles per
//! scanline (25 of horizontal blank then 40 of display), 262 lines per
//! NTSC field with the visible field in lines 0-199.

use bitflags::bitflags;

use super::irq;
use crate::clock::TimeSpec;

pub const TEXT_SCANLINE_COUNT: usize = 24;
pub const HGR_SCANLINE_COUNT: usize = 192;
pub const SHGR_SCANLINE_COUNT: usize = 200;

pub const SCANLINE_CYCLES: u64 = 65;
pub const SCANLINES_PER_FRAME: u64 = 262;
pub const HBLANK_CYCLES: u64 = 25;
/// first vertical counter value inside VBL
pub const VBL_START_LINE: u64 = 192;

bitflags! {
    #[derive(Clone,Copy,PartialEq,Eq,Debug,Default)]
    pub struct VgcMode: u32 {
        const GRAPHICS     = 0x0001;
        const MIXED        = 0x0002;
        const LORES        = 0x0004;
        const HIRES        = 0x0008;
        const SUPER_HIRES  = 0x0010;
        const COL80        = 0x0020;
        const ALTCHARSET   = 0x0040;
        const LANGUAGE     = 0x0080;
        const PAL          = 0x0100;
        const MONOCHROME   = 0x0200;
        const DISABLE_AN3  = 0x0400;
        const VBL_IRQ      = 0x0800;
    }
}

/// One scanline's base offset into the Mega II bank
#[derive(Clone,Copy,Default)]
pub struct Scanline {
    pub offset: u32,
    pub meta: u32
}

pub struct Vgc {
    pub mode_flags: VgcMode,
    pub text_fg_color: u8,
    pub text_bg_color: u8,
    pub text_language: u8,
    pub border_color: u8,
    pub scanline_irq_enable: bool,
    pub irq_line: u32,
    pub text_1_scanlines: [Scanline;TEXT_SCANLINE_COUNT],
    pub text_2_scanlines: [Scanline;TEXT_SCANLINE_COUNT],
    pub hgr_1_scanlines: [Scanline;HGR_SCANLINE_COUNT],
    pub hgr_2_scanlines: [Scanline;HGR_SCANLINE_COUNT],
    pub shgr_scanlines: [Scanline;SHGR_SCANLINE_COUNT],
    last_frame_cycle: u64,
    last_scanline: u64
}

/// text rows interleave in thirds with an 8-byte hole per 128-byte group
fn text_scanlines(base: u32) -> [Scanline;TEXT_SCANLINE_COUNT] {
    let mut lines = [Scanline::default();TEXT_SCANLINE_COUNT];
    let mut offset = base;
    for row in 0..8 {
        lines[row].offset = offset;
        lines[row + 8].offset = offset + 40;
        lines[row + 16].offset = offset + 80;
        offset += 128;
    }
    lines
}

/// hires is the text layout with eight 1 KiB sub-rows per text row
fn hgr_scanlines(base: u32) -> [Scanline;HGR_SCANLINE_COUNT] {
    let mut lines = [Scanline::default();HGR_SCANLINE_COUNT];
    let mut offset = base;
    for row in 0..8 {
        for inner in 0..8 {
            lines[row + inner * 8].offset = offset + inner as u32 * 1024;
            lines[row + 64 + inner * 8].offset = offset + 40 + inner as u32 * 1024;
            lines[row + 128 + inner * 8].offset = offset + 80 + inner as u32 * 1024;
        }
        offset += 128;
    }
    lines
}

impl Vgc {
    pub fn new() -> Self {
        let mut shgr_scanlines = [Scanline::default();SHGR_SCANLINE_COUNT];
        let mut offset = 0x2000;
        for line in shgr_scanlines.iter_mut() {
            line.offset = offset;
            offset += 160;
        }
        Self {
            mode_flags: VgcMode::empty(),
            text_fg_color: 15,
            text_bg_color: 6,
            text_language: 0,
            border_color: 0,
            scanline_irq_enable: false,
            irq_line: 0,
            text_1_scanlines: text_scanlines(0x400),
            text_2_scanlines: text_scanlines(0x800),
            hgr_1_scanlines: hgr_scanlines(0x2000),
            hgr_2_scanlines: hgr_scanlines(0x4000),
            shgr_scanlines,
            last_frame_cycle: 0,
            last_scanline: 0
        }
    }
    pub fn reset(&mut self) {
        self.mode_flags = VgcMode::empty();
        self.scanline_irq_enable = false;
        self.irq_line = 0;
        self.last_frame_cycle = 0;
        self.last_scanline = 0;
    }
    pub fn set_mode(&mut self,mode: VgcMode) {
        self.mode_flags.insert(mode);
    }
    pub fn clear_mode(&mut self,mode: VgcMode) {
        self.mode_flags.remove(mode);
    }
    pub fn is_mode(&self,mode: VgcMode) -> bool {
        self.mode_flags.contains(mode)
    }
    /// C02B region register
    pub fn set_region(&mut self,value: u8) {
        self.mode_flags.set(VgcMode::LANGUAGE,value & 0x08 != 0);
        self.mode_flags.set(VgcMode::PAL,value & 0x10 != 0);
        self.text_language = (value & 0xe0) >> 5;
    }
    pub fn get_region(&self) -> u8 {
        let mut result = 0;
        if self.is_mode(VgcMode::LANGUAGE) {
            result |= 0x08;
        }
        if self.is_mode(VgcMode::PAL) {
            result |= 0x10;
        }
        result | (self.text_language << 5)
    }
    /// Vertical and horizontal counters at the given machine time
    pub fn counters(&self,tspec: &TimeSpec) -> (u64,u64) {
        let frame_cycle = tspec.mega2_cycles() % (SCANLINE_CYCLES * SCANLINES_PER_FRAME);
        (frame_cycle / SCANLINE_CYCLES,frame_cycle % SCANLINE_CYCLES)
    }
    pub fn in_vbl(&self,tspec: &TimeSpec) -> bool {
        self.counters(tspec).0 >= VBL_START_LINE
    }
    /// C02E: high bits of the hardware vertical counter.  The hardware
    /// counter runs from 0xFA in the blanking area with visible line 0 at
    /// 0x100; the register exposes bits 1-8.
    pub fn vertical_count(&self,tspec: &TimeSpec) -> u8 {
        let (v,_) = self.counters(tspec);
        (((v + 0x100) >> 1) & 0xff) as u8
    }
    /// C02F: bit 7 = vertical counter bit 0, bits 0-6 = horizontal counter
    pub fn horizontal_count(&self,tspec: &TimeSpec) -> u8 {
        let (v,h) = self.counters(tspec);
        (((v & 1) << 7) | (h & 0x7f)) as u8
    }
    /// Advance the frame/scanline bookkeeping and fold interrupts
    pub fn sync(&mut self,tspec: &TimeSpec,mut irq_line: u32) -> u32 {
        let total_scanline = tspec.mega2_cycles() / SCANLINE_CYCLES;
        while self.last_scanline < total_scanline {
            self.last_scanline += 1;
            let line_in_frame = self.last_scanline % SCANLINES_PER_FRAME;
            if line_in_frame == VBL_START_LINE && self.is_mode(VgcMode::VBL_IRQ) {
                self.irq_line |= irq::VGC_VBL;
                irq_line |= irq::VGC_VBL;
            }
            if self.scanline_irq_enable && line_in_frame < VBL_START_LINE {
                self.irq_line |= irq::VGC_SCANLINE;
                irq_line |= irq::VGC_SCANLINE;
            }
        }
        self.last_frame_cycle = tspec.mega2_cycles();
        irq_line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{TimeSpec,CLOCKS_STEP_MEGA2};

    fn tspec_at_cycle(cycle: u64) -> TimeSpec {
        let mut tspec = TimeSpec::new();
        tspec.clocks_spent = cycle * CLOCKS_STEP_MEGA2 as u64;
        tspec
    }

    #[test]
    fn text_table_interleave() {
        let vgc = Vgc::new();
        assert_eq!(vgc.text_1_scanlines[0].offset,0x400);
        assert_eq!(vgc.text_1_scanlines[1].offset,0x480);
        assert_eq!(vgc.text_1_scanlines[8].offset,0x428);
        assert_eq!(vgc.text_1_scanlines[16].offset,0x450);
        assert_eq!(vgc.text_2_scanlines[0].offset,0x800);
    }

    #[test]
    fn hgr_table_interleave() {
        let vgc = Vgc::new();
        assert_eq!(vgc.hgr_1_scanlines[0].offset,0x2000);
        assert_eq!(vgc.hgr_1_scanlines[8].offset,0x2400);
        assert_eq!(vgc.hgr_1_scanlines[64].offset,0x2028);
        assert_eq!(vgc.hgr_2_scanlines[0].offset,0x4000);
    }

    #[test]
    fn vbl_irq_once_per_frame() {
        let mut vgc = Vgc::new();
        vgc.set_mode(VgcMode::VBL_IRQ);
        let tspec = tspec_at_cycle(SCANLINE_CYCLES * (VBL_START_LINE + 1));
        let line = vgc.sync(&tspec,0);
        assert_ne!(line & irq::VGC_VBL,0);
        assert!(vgc.in_vbl(&tspec));
        vgc.irq_line = 0;
        // later in the same frame nothing new fires
        let tspec = tspec_at_cycle(SCANLINE_CYCLES * (VBL_START_LINE + 5));
        let line = vgc.sync(&tspec,0);
        assert_eq!(line & irq::VGC_VBL,0);
    }
}
