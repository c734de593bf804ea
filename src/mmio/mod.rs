//! # Memory-mapped I/O controller
//!
//! Everything in the C000-C0FF page funnels through here: softswitch
//! toggles that rewrite the page maps, paired language-card selects,
//! device registers, and the card slot windows.  Reads with no backing
//! register return the floating bus byte, which is whatever the video
//! scan is fetching from the Mega II bank at that instant.

pub mod mmap;
pub mod vgc;
pub mod timer;
pub mod rtc;
pub mod adb;
pub mod scc;
pub mod audio;

use log::{debug,warn};

use crate::clock::{TimeSpec,MEGA2_CYCLES_PER_60TH};
use crate::iwm::{Iwm,DriveBay};
use crate::mem::{Memory,MemOp,MmioBus};
use mmap::Mmap;
use vgc::{Vgc,VgcMode};

/// Machine IRQ line bits, one group per device
pub mod irq {
    pub const TIMER_1SEC: u32 = 0x0000_0001;
    pub const TIMER_QSEC: u32 = 0x0000_0002;
    pub const TIMER_MASK: u32 = 0x0000_000f;
    pub const VGC_SCANLINE: u32 = 0x0000_0010;
    pub const VGC_VBL: u32 = 0x0000_0020;
    pub const VGC_MASK: u32 = 0x0000_00f0;
    pub const ADB_KEYB: u32 = 0x0000_0100;
    pub const ADB_MOUSE: u32 = 0x0000_0200;
    pub const ADB_DATA: u32 = 0x0000_0400;
    pub const ADB_MASK: u32 = 0x0000_0f00;
}

//  canonical C0xx register numbers (low byte of the I/O address)
pub const REG_KEYB_READ: u8 = 0x00;
pub const REG_ANYKEY_STROBE: u8 = 0x10;
pub const REG_LC_BANK_TEST: u8 = 0x11;
pub const REG_ROM_RAM_TEST: u8 = 0x12;
pub const REG_RAMRD_TEST: u8 = 0x13;
pub const REG_RAMWRT_TEST: u8 = 0x14;
pub const REG_READCXROM: u8 = 0x15;
pub const REG_RDALTZP_TEST: u8 = 0x16;
pub const REG_READC3ROM: u8 = 0x17;
pub const REG_COL80STORE_TEST: u8 = 0x18;
pub const REG_VBLBAR: u8 = 0x19;
pub const REG_TXT_TEST: u8 = 0x1a;
pub const REG_MIXED_TEST: u8 = 0x1b;
pub const REG_TXTPAGE2_TEST: u8 = 0x1c;
pub const REG_HIRES_TEST: u8 = 0x1d;
pub const REG_ALTCHARSET_TEST: u8 = 0x1e;
pub const REG_COL80_TEST: u8 = 0x1f;
pub const REG_CASSETTE_NOP: u8 = 0x20;
pub const REG_MONO: u8 = 0x21;
pub const REG_TEXT_COLOR: u8 = 0x22;
pub const REG_VGC_IRQ_BYTE: u8 = 0x23;
pub const REG_ADB_MOUSE_DATA: u8 = 0x24;
pub const REG_ADB_MODKEY: u8 = 0x25;
pub const REG_ADB_CMD_DATA: u8 = 0x26;
pub const REG_ADB_STATUS: u8 = 0x27;
pub const REG_NEWVIDEO: u8 = 0x29;
pub const REG_LANGSEL: u8 = 0x2b;
pub const REG_SLOTROMSEL: u8 = 0x2d;
pub const REG_VGC_VERTCNT: u8 = 0x2e;
pub const REG_VGC_HORIZCNT: u8 = 0x2f;
pub const REG_SPKR: u8 = 0x30;
pub const REG_DISK_INTERFACE: u8 = 0x31;
pub const REG_RTC_VGC_SCANINT: u8 = 0x32;
pub const REG_RTC_DATA: u8 = 0x33;
pub const REG_RTC_CTL: u8 = 0x34;
pub const REG_SHADOW: u8 = 0x35;
pub const REG_SPEED: u8 = 0x36;
pub const REG_SCC_B_CMD: u8 = 0x38;
pub const REG_SCC_A_CMD: u8 = 0x39;
pub const REG_SCC_B_DATA: u8 = 0x3a;
pub const REG_SCC_A_DATA: u8 = 0x3b;
pub const REG_AUDIO_CTL: u8 = 0x3c;
pub const REG_AUDIO_DATA: u8 = 0x3d;
pub const REG_AUDIO_ADRLO: u8 = 0x3e;
pub const REG_AUDIO_ADRHI: u8 = 0x3f;
pub const REG_MEGA2_INTEN: u8 = 0x41;
pub const REG_MEGA2_MOUSE_DX: u8 = 0x44;
pub const REG_MEGA2_MOUSE_DY: u8 = 0x45;
pub const REG_DIAG_INTTYPE: u8 = 0x46;
pub const REG_CLRVBLINT: u8 = 0x47;
pub const REG_EMULATOR: u8 = 0x4f;
pub const REG_TXTCLR: u8 = 0x50;
pub const REG_TXTSET: u8 = 0x51;
pub const REG_MIXCLR: u8 = 0x52;
pub const REG_MIXSET: u8 = 0x53;
pub const REG_TXTPAGE1: u8 = 0x54;
pub const REG_TXTPAGE2: u8 = 0x55;
pub const REG_LORES: u8 = 0x56;
pub const REG_HIRES: u8 = 0x57;
pub const REG_AN0_OFF: u8 = 0x58;
pub const REG_AN3_DBLRES_ON: u8 = 0x5e;
pub const REG_AN3_DBLRES_OFF: u8 = 0x5f;
pub const REG_SW0: u8 = 0x61;
pub const REG_SW1: u8 = 0x62;
pub const REG_SW2: u8 = 0x63;
pub const REG_PADDL0: u8 = 0x64;
pub const REG_PADDL3: u8 = 0x67;
pub const REG_STATEREG: u8 = 0x68;
pub const REG_PTRIG: u8 = 0x70;
pub const REG_LC2_RAM_WP: u8 = 0x80;
pub const REG_LC2_ROM_WE: u8 = 0x81;
pub const REG_LC2_ROM_WP: u8 = 0x82;
pub const REG_LC2_RAM_WE: u8 = 0x83;
pub const REG_LC1_RAM_WP: u8 = 0x88;
pub const REG_LC1_ROM_WE: u8 = 0x89;
pub const REG_LC1_ROM_WP: u8 = 0x8a;
pub const REG_LC1_RAM_WE: u8 = 0x8b;
pub const REG_IWM_PHASE0_LO: u8 = 0xe0;
pub const REG_IWM_Q7_HI: u8 = 0xef;

//  C036 speed register bits
pub const SPEED_FAST_ENABLED: u8 = 0x80;
pub const SPEED_POWERED_ON: u8 = 0x40;
pub const SPEED_DISK_MASK: u8 = 0x0f;

//  C029 new-video register bits
pub const NEWVIDEO_BANKLATCH_INHIBIT: u8 = 0x01;
pub const NEWVIDEO_LINEARIZE: u8 = 0x40;
pub const NEWVIDEO_SUPERHIRES: u8 = 0x80;

const EMULATOR_ID: u8 = 0x47;
const EMULATOR_VERSION: u8 = 0x03;

/// Peripheral card seam for the C1xx-C7FF windows.  No cards ship with the
/// core; hosts install implementations per slot.
pub trait Card {
    fn io_read(&mut self,addr: u8) -> u8;
    fn io_write(&mut self,addr: u8,data: u8);
    /// contents of the card's 256-byte Cn00 ROM window
    fn rom_byte(&mut self,offset: u8) -> u8;
    /// contents of the shared C800-CFFF expansion window
    fn expansion_rom_byte(&mut self,_offset: u16) -> u8 {
        0xff
    }
}

pub struct Mmio {
    pub mmap: Mmap,
    pub new_video: u8,
    pub speed: u8,
    pub irq_line: u32,
    pub vgc: Vgc,
    pub timer: timer::Timer,
    pub rtc: rtc::Rtc,
    pub adb: adb::Adb,
    pub scc: scc::Scc,
    pub audio: audio::Audio,
    pub iwm: Iwm,
    pub drives: DriveBay,
    pub card_slots: [Option<Box<dyn Card>>;7],
    pub card_expansion_slot: Option<usize>,
    mega2_cycles: u64,
    timer_60hz_us: u32,
    last_data_address: u32,
    emulator_detect: u8,
    ioreg_read_ctr: [u32;256],
    ioreg_write_ctr: [u32;256]
}

impl Mmio {
    pub fn new() -> Self {
        Self {
            mmap: Mmap::empty(),
            new_video: NEWVIDEO_BANKLATCH_INHIBIT,
            speed: SPEED_FAST_ENABLED | SPEED_POWERED_ON,
            irq_line: 0,
            vgc: Vgc::new(),
            timer: timer::Timer::new(),
            rtc: rtc::Rtc::new(0),
            adb: adb::Adb::new(),
            scc: scc::Scc::new(),
            audio: audio::Audio::new(),
            iwm: Iwm::new(),
            drives: DriveBay::new(),
            card_slots: Default::default(),
            card_expansion_slot: None,
            mega2_cycles: 0,
            timer_60hz_us: 0,
            last_data_address: u32::MAX,
            emulator_detect: 0,
            ioreg_read_ctr: [0;256],
            ioreg_write_ctr: [0;256]
        }
    }

    /// Power-on/reset initialization: restore the softswitch defaults and
    /// rebuild every page map from scratch.
    pub fn init(&mut self,mem: &mut Memory,tspec: &mut TimeSpec) {
        self.new_video = NEWVIDEO_BANKLATCH_INHIBIT;
        self.speed = SPEED_FAST_ENABLED | SPEED_POWERED_ON;
        self.irq_line = 0;
        self.last_data_address = u32::MAX;
        self.emulator_detect = 0;
        self.vgc.reset();
        self.timer.reset();
        self.rtc.reset();
        self.adb.reset();
        self.scc.reset();
        self.audio.reset();
        self.iwm.reset(tspec);
        self.drives.reset();
        self.mmap = mmap::rebuild(mem,Mmap::empty(),self.card_expansion_slot);
        self.mega2_cycles = tspec.mega2_cycles();
        tspec.clocks_step = tspec.clocks_step_fast;
    }

    fn remap(&mut self,mem: &mut Memory,new: Mmap) {
        if new != self.mmap {
            self.mmap = mmap::memory_map(mem,self.mmap,new,self.card_expansion_slot);
        }
    }

    fn set_mmap_bit(&mut self,mem: &mut Memory,bit: Mmap,on: bool) {
        let mut mmap = self.mmap;
        mmap.set(bit,on);
        self.remap(mem,mmap);
    }

    fn clear_irq(&mut self,mask: u32) {
        if mask & irq::VGC_MASK != 0 {
            self.vgc.irq_line &= !(mask & irq::VGC_MASK);
        }
        if mask & irq::TIMER_MASK != 0 {
            self.timer.irq_line &= !(mask & irq::TIMER_MASK);
        }
        if mask & irq::ADB_MASK != 0 {
            self.adb.clear_irq(mask);
        }
        self.irq_line &= !mask;
    }

    /// Per-instruction device sync, run after each CPU step.  Returns the
    /// current IRQ line level.
    pub fn sync(&mut self,tspec: &mut TimeSpec) -> u32 {
        let now = tspec.mega2_cycles();
        let delta = (now - self.mega2_cycles) as u32;
        self.mega2_cycles = now;
        self.timer_60hz_us += delta;

        self.irq_line = self.vgc.sync(tspec,self.irq_line);
        self.iwm.glu_sync(&mut self.drives,tspec);
        // the speed register's motor-detect bits gate the whole machine
        // down to the Mega II step while a matching drive spins
        self.iwm.speed_disk_gate(self.speed,tspec);

        while self.timer_60hz_us >= MEGA2_CYCLES_PER_60TH {
            self.irq_line = self.timer.sync(MEGA2_CYCLES_PER_60TH,self.irq_line);
            self.irq_line = self.adb.glu_sync(MEGA2_CYCLES_PER_60TH,self.irq_line);
            self.timer_60hz_us -= MEGA2_CYCLES_PER_60TH;
        }
        self.irq_line
    }

    /// Floating bus: the byte the video scan is currently fetching
    fn floating_bus(&self,mem: &Memory,tspec: &TimeSpec) -> u8 {
        let (v,h) = self.vgc.counters(tspec);
        if v >= vgc::HGR_SCANLINE_COUNT as u64 {
            return 0;
        }
        if h < vgc::HBLANK_CYCLES {
            return 0;
        }
        let h = (h - vgc::HBLANK_CYCLES) as u32;
        let hires = self.vgc.is_mode(VgcMode::HIRES)
            && !(self.vgc.is_mode(VgcMode::MIXED) && v >= 160);
        let offset = if hires {
            let lines = if self.mmap.contains(Mmap::TXTPAGE2) {
                &self.vgc.hgr_2_scanlines
            } else {
                &self.vgc.hgr_1_scanlines
            };
            lines[v as usize].offset
        } else {
            let lines = if self.mmap.contains(Mmap::TXTPAGE2)
                && !self.mmap.contains(Mmap::COL80STORE)
            {
                &self.vgc.text_2_scanlines
            } else {
                &self.vgc.text_1_scanlines
            };
            lines[(v >> 3) as usize].offset
        };
        mem.mega2_bank(0)[(offset + h.min(39)) as usize]
    }

    /// C08x language-card select matrix.  Odd addresses must be read twice
    /// in a row to arm RAM writes; the bank/rom selection itself happens on
    /// every access.
    fn rw_bank_select(&mut self,mem: &mut Memory,address: u16) {
        let mut flags = self.mmap;
        let double_read = self.last_data_address == address as u32;
        let ioreg = (address & 0xff) as u8 & 0x8b;  // fold the +4 mirrors
        match ioreg {
            REG_LC2_RAM_WP => {
                flags.insert(Mmap::RDLCRAM | Mmap::LCBANK2);
                if double_read {
                    flags.remove(Mmap::WRLCRAM);
                }
            },
            REG_LC2_ROM_WE => {
                flags.insert(Mmap::LCBANK2);
                flags.remove(Mmap::RDLCRAM);
                if double_read {
                    flags.insert(Mmap::WRLCRAM);
                }
            },
            REG_LC2_ROM_WP => {
                flags.remove(Mmap::RDLCRAM);
                flags.insert(Mmap::LCBANK2);
                if double_read {
                    flags.remove(Mmap::WRLCRAM);
                }
            },
            REG_LC2_RAM_WE => {
                flags.insert(Mmap::RDLCRAM | Mmap::LCBANK2);
                if double_read {
                    flags.insert(Mmap::WRLCRAM);
                }
            },
            REG_LC1_RAM_WP => {
                flags.remove(Mmap::LCBANK2);
                flags.insert(Mmap::RDLCRAM);
                if double_read {
                    flags.remove(Mmap::WRLCRAM);
                }
            },
            REG_LC1_ROM_WE => {
                flags.remove(Mmap::RDLCRAM | Mmap::LCBANK2);
                if double_read {
                    flags.insert(Mmap::WRLCRAM);
                }
            },
            REG_LC1_ROM_WP => {
                flags.remove(Mmap::LCBANK2 | Mmap::RDLCRAM);
                if double_read {
                    flags.remove(Mmap::WRLCRAM);
                }
            },
            REG_LC1_RAM_WE => {
                flags.insert(Mmap::RDLCRAM);
                flags.remove(Mmap::LCBANK2);
                if double_read {
                    flags.insert(Mmap::WRLCRAM);
                }
            },
            _ => {}
        }
        self.remap(mem,flags);
    }

    fn statereg(&self) -> u8 {
        let mut value = 0;
        if self.mmap.contains(Mmap::ALTZPLC) { value |= 0x80; }
        if self.mmap.contains(Mmap::TXTPAGE2) { value |= 0x40; }
        if self.mmap.contains(Mmap::RAMRD) { value |= 0x20; }
        if self.mmap.contains(Mmap::RAMWRT) { value |= 0x10; }
        if !self.mmap.contains(Mmap::RDLCRAM) { value |= 0x08; }
        if self.mmap.contains(Mmap::LCBANK2) { value |= 0x04; }
        if !self.mmap.contains(Mmap::CXROM) { value |= 0x01; }
        value
    }

    fn statereg_set(&mut self,mem: &mut Memory,value: u8) {
        let mut flags = self.mmap;
        flags.set(Mmap::ALTZPLC,value & 0x80 != 0);
        flags.set(Mmap::TXTPAGE2,value & 0x40 != 0);
        flags.set(Mmap::RAMRD,value & 0x20 != 0);
        flags.set(Mmap::RAMWRT,value & 0x10 != 0);
        flags.set(Mmap::RDLCRAM,value & 0x08 == 0);
        flags.set(Mmap::LCBANK2,value & 0x04 != 0);
        flags.set(Mmap::CXROM,value & 0x01 == 0);
        if value & 0x02 != 0 {
            warn!("mmio: c068 rombank bit set and ignored ({:02X})",value);
        }
        self.remap(mem,flags);
    }

    fn shadow_c035(&self) -> u8 {
        let mut value = 0;
        if self.mmap.contains(Mmap::NSHADOW_TXT1) { value |= 0x01; }
        if self.mmap.contains(Mmap::NSHADOW_HGR1) { value |= 0x02; }
        if self.mmap.contains(Mmap::NSHADOW_HGR2) { value |= 0x04; }
        if self.mmap.contains(Mmap::NSHADOW_SHGR) { value |= 0x08; }
        if self.mmap.contains(Mmap::NSHADOW_AUX) { value |= 0x10; }
        if self.mmap.contains(Mmap::NSHADOW_TXT2) { value |= 0x20; }
        if self.mmap.contains(Mmap::NIOLC) { value |= 0x40; }
        value
    }

    fn shadow_c035_set(&mut self,mem: &mut Memory,value: u8) {
        let mut flags = self.mmap;
        flags.set(Mmap::NSHADOW_TXT1,value & 0x01 != 0);
        flags.set(Mmap::NSHADOW_HGR1,value & 0x02 != 0);
        flags.set(Mmap::NSHADOW_HGR2,value & 0x04 != 0);
        flags.set(Mmap::NSHADOW_SHGR,value & 0x08 != 0);
        flags.set(Mmap::NSHADOW_AUX,value & 0x10 != 0);
        flags.set(Mmap::NSHADOW_TXT2,value & 0x20 != 0);
        flags.set(Mmap::NIOLC,value & 0x40 != 0);
        self.remap(mem,flags);
    }

    fn speed_c036_set(&mut self,tspec: &mut TimeSpec,value: u8) {
        let setflags = self.speed ^ value;
        if setflags & SPEED_FAST_ENABLED != 0 {
            if value & SPEED_FAST_ENABLED != 0 && !self.iwm.disk_motor_gated() {
                tspec.clocks_step = tspec.clocks_step_fast;
            } else {
                tspec.clocks_step = tspec.clocks_step_mega2;
            }
        }
        // bit 5 always reads 0
        self.speed = value & 0xdf;
        self.iwm.speed_disk_gate(self.speed,tspec);
    }

    fn newvideo_c029_set(&mut self,value: u8) {
        let setflags = self.new_video ^ value;
        if setflags & NEWVIDEO_BANKLATCH_INHIBIT != 0
            && value & NEWVIDEO_BANKLATCH_INHIBIT == 0
        {
            warn!("mmio: c029 bank latch enable is unimplemented");
        }
        if setflags & NEWVIDEO_SUPERHIRES != 0 {
            if value & NEWVIDEO_SUPERHIRES != 0 {
                self.vgc.set_mode(VgcMode::SUPER_HIRES);
            } else {
                self.vgc.clear_mode(VgcMode::SUPER_HIRES);
            }
            debug!("mmio: c029 super hires = {}",value & NEWVIDEO_SUPERHIRES != 0);
        }
        // bits 1-4 are unused
        self.new_video = value & !0x1e;
    }

    fn slotromsel(&self) -> u8 {
        let mut mask = 0;
        for slot in 1..8 {
            if slot == 3 {
                continue;
            }
            if self.mmap.contains(Mmap::slot_rom(slot)) {
                mask |= 1 << slot;
            }
        }
        mask
    }

    fn slotromsel_set(&mut self,mem: &mut Memory,value: u8) {
        let mut flags = self.mmap;
        for slot in 1..8 {
            if slot == 3 {
                continue;
            }
            flags.set(Mmap::slot_rom(slot),value & (1 << slot) != 0);
        }
        self.remap(mem,flags);
    }

    fn mega2_inten(&self) -> u8 {
        let mut value = 0;
        if self.timer.flags & timer::FLAG_QSEC_ENABLED != 0 { value |= 0x10; }
        if self.vgc.is_mode(VgcMode::VBL_IRQ) { value |= 0x08; }
        value
    }

    fn mega2_inten_set(&mut self,value: u8) {
        if value & 0xe0 != 0 {
            warn!("mmio: invalid inten set {:02X}",value);
        }
        if value & 0x10 != 0 {
            self.timer.flags |= timer::FLAG_QSEC_ENABLED;
        } else {
            self.timer.flags &= !timer::FLAG_QSEC_ENABLED;
            self.clear_irq(irq::TIMER_QSEC);
        }
        if value & 0x08 != 0 {
            self.vgc.set_mode(VgcMode::VBL_IRQ);
        } else {
            self.vgc.clear_mode(VgcMode::VBL_IRQ);
            self.clear_irq(irq::VGC_VBL);
        }
        if value & 0x07 != 0 {
            warn!("mmio: mega2 mouse interrupts not implemented ({:02X})",value);
        }
    }

    fn vgc_irq_c023(&self) -> u8 {
        let mut value = 0;
        if self.irq_line & (irq::VGC_SCANLINE | irq::TIMER_1SEC) != 0 {
            value |= 0x80;
            if self.irq_line & irq::TIMER_1SEC != 0 { value |= 0x40; }
            if self.irq_line & irq::VGC_SCANLINE != 0 { value |= 0x20; }
        }
        if self.timer.flags & timer::FLAG_1SEC_ENABLED != 0 { value |= 0x04; }
        if self.vgc.scanline_irq_enable { value |= 0x02; }
        value
    }

    fn vgc_irq_c023_set(&mut self,value: u8) {
        if value & 0x4 != 0 {
            self.timer.flags |= timer::FLAG_1SEC_ENABLED;
        } else {
            self.timer.flags &= !timer::FLAG_1SEC_ENABLED;
            self.clear_irq(irq::TIMER_1SEC);
        }
        self.vgc.scanline_irq_enable = value & 0x2 != 0;
    }

    fn inttype_c046(&self) -> u8 {
        let mut value = 0;
        if self.irq_line & irq::TIMER_QSEC != 0 { value |= 0x10; }
        if self.irq_line & irq::VGC_VBL != 0 { value |= 0x08; }
        value
    }

    /// Card slot window read (C100-C7FF ROM, C800-CFFF expansion)
    pub fn card_mem_read(&mut self,addr: u16) -> u8 {
        if addr == 0xcfff {
            // touching CFFF releases the expansion window
            self.card_expansion_slot = None;
            return 0xff;
        }
        if (0xc800..0xcfff).contains(&addr) {
            if let Some(slot) = self.card_expansion_slot {
                if let Some(card) = self.card_slots[slot - 1].as_mut() {
                    return card.expansion_rom_byte(addr - 0xc800);
                }
            }
            return 0xff;
        }
        let slot = ((addr >> 8) & 0x7) as usize;
        if slot >= 1 {
            self.card_expansion_slot = Some(slot);
            if let Some(card) = self.card_slots[slot - 1].as_mut() {
                return card.rom_byte((addr & 0xff) as u8);
            }
        }
        0xff
    }

    pub fn card_mem_write(&mut self,addr: u16,_data: u8) {
        debug!("mmio: write to card window {:04X} discarded",addr);
    }

    fn io_read_impl(&mut self,mem: &mut Memory,tspec: &mut TimeSpec,addr: u16,op: MemOp) -> (u8,bool) {
        let ioreg = (addr & 0xff) as u8;
        let is_noop = op == MemOp::Null;
        let mut mega2_access = true;
        let result = match ioreg {
            REG_KEYB_READ..=0x0f => self.adb.keyb_read(),
            REG_ANYKEY_STROBE => {
                if is_noop {
                    self.adb.keyb_read()
                } else {
                    self.adb.clear_key_strobe()
                }
            },
            REG_LC_BANK_TEST => bit7(self.mmap.contains(Mmap::LCBANK2)),
            REG_ROM_RAM_TEST => bit7(!self.mmap.contains(Mmap::RDLCRAM)),
            REG_RAMRD_TEST => bit7(self.mmap.contains(Mmap::RAMRD)),
            REG_RAMWRT_TEST => bit7(self.mmap.contains(Mmap::RAMWRT)),
            REG_READCXROM => bit7(!self.mmap.contains(Mmap::CXROM)),
            REG_RDALTZP_TEST => bit7(self.mmap.contains(Mmap::ALTZPLC)),
            REG_READC3ROM => bit7(self.mmap.contains(Mmap::C3ROM)),
            REG_COL80STORE_TEST => bit7(self.mmap.contains(Mmap::COL80STORE)),
            REG_VBLBAR => bit7(!self.vgc.in_vbl(tspec)),
            REG_TXT_TEST => bit7(!self.vgc.is_mode(VgcMode::GRAPHICS)),
            REG_MIXED_TEST => bit7(self.vgc.is_mode(VgcMode::MIXED)),
            REG_TXTPAGE2_TEST => bit7(self.mmap.contains(Mmap::TXTPAGE2)),
            REG_HIRES_TEST => bit7(self.vgc.is_mode(VgcMode::HIRES)),
            REG_ALTCHARSET_TEST => bit7(self.vgc.is_mode(VgcMode::ALTCHARSET)),
            REG_COL80_TEST => bit7(self.vgc.is_mode(VgcMode::COL80)),
            REG_CASSETTE_NOP => 0,
            REG_MONO => bit7(self.vgc.is_mode(VgcMode::MONOCHROME)),
            REG_TEXT_COLOR => (self.vgc.text_fg_color << 4) | self.vgc.text_bg_color,
            REG_VGC_IRQ_BYTE => self.vgc_irq_c023(),
            REG_ADB_MOUSE_DATA => {
                if is_noop { 0 } else { self.adb.mouse_data() }
            },
            REG_ADB_MODKEY => self.adb.modkeys(),
            REG_ADB_CMD_DATA => {
                if is_noop { 0 } else { self.adb.cmd_data_read() }
            },
            REG_ADB_STATUS => self.adb.status(),
            REG_NEWVIDEO => self.new_video,
            REG_LANGSEL => self.vgc.get_region(),
            REG_SLOTROMSEL => self.slotromsel(),
            REG_VGC_VERTCNT => self.vgc.vertical_count(tspec),
            REG_VGC_HORIZCNT => self.vgc.horizontal_count(tspec),
            REG_SPKR => {
                if !is_noop {
                    self.audio.speaker_toggle();
                }
                self.floating_bus(mem,tspec)
            },
            REG_DISK_INTERFACE => self.iwm.read_switch(&mut self.drives,tspec,ioreg,op),
            REG_RTC_VGC_SCANINT => self.vgc_irq_c023(),
            REG_RTC_DATA => self.rtc.data_c033,
            REG_RTC_CTL => {
                if !is_noop {
                    self.rtc.command(tspec,false);
                }
                self.rtc.ctl_c034 | (self.vgc.border_color & 0x0f)
            },
            REG_SHADOW => {
                mega2_access = false;
                self.shadow_c035()
            },
            REG_SPEED => {
                mega2_access = false;
                self.speed
            },
            REG_SCC_B_CMD => self.scc.read_cmd(0),
            REG_SCC_A_CMD => self.scc.read_cmd(1),
            REG_SCC_B_DATA => self.scc.read_data(0),
            REG_SCC_A_DATA => self.scc.read_data(1),
            REG_AUDIO_CTL => self.audio.read_ctl(),
            REG_AUDIO_DATA => {
                if is_noop { 0 } else { self.audio.read_data() }
            },
            REG_AUDIO_ADRLO => self.audio.addr_lo(),
            REG_AUDIO_ADRHI => self.audio.addr_hi(),
            REG_MEGA2_INTEN => self.mega2_inten(),
            REG_MEGA2_MOUSE_DX | REG_MEGA2_MOUSE_DY => 0,
            REG_DIAG_INTTYPE => self.inttype_c046(),
            REG_EMULATOR => {
                match self.emulator_detect {
                    1 => {
                        if !is_noop {
                            self.emulator_detect = 2;
                        }
                        EMULATOR_ID
                    },
                    2 => {
                        if !is_noop {
                            self.emulator_detect = 0;
                        }
                        EMULATOR_VERSION
                    },
                    _ => self.floating_bus(mem,tspec)
                }
            },
            REG_TXTCLR => {
                if !is_noop {
                    self.vgc.set_mode(VgcMode::GRAPHICS);
                }
                self.floating_bus(mem,tspec)
            },
            REG_TXTSET => {
                if !is_noop {
                    self.vgc.clear_mode(VgcMode::GRAPHICS);
                }
                self.floating_bus(mem,tspec)
            },
            REG_MIXCLR => {
                if !is_noop {
                    self.vgc.clear_mode(VgcMode::MIXED);
                }
                self.floating_bus(mem,tspec)
            },
            REG_MIXSET => {
                if !is_noop {
                    self.vgc.set_mode(VgcMode::MIXED);
                }
                self.floating_bus(mem,tspec)
            },
            REG_TXTPAGE1 => {
                if !is_noop {
                    self.set_mmap_bit(mem,Mmap::TXTPAGE2,false);
                }
                self.floating_bus(mem,tspec)
            },
            REG_TXTPAGE2 => {
                if !is_noop {
                    self.set_mmap_bit(mem,Mmap::TXTPAGE2,true);
                }
                self.floating_bus(mem,tspec)
            },
            REG_LORES => {
                if !is_noop {
                    self.vgc.set_mode(VgcMode::LORES);
                    self.vgc.clear_mode(VgcMode::HIRES);
                    self.set_mmap_bit(mem,Mmap::HIRES,false);
                }
                self.floating_bus(mem,tspec)
            },
            REG_HIRES => {
                if !is_noop {
                    self.vgc.set_mode(VgcMode::HIRES);
                    self.vgc.clear_mode(VgcMode::LORES);
                    self.set_mmap_bit(mem,Mmap::HIRES,true);
                }
                self.floating_bus(mem,tspec)
            },
            REG_AN0_OFF..=0x5d => self.floating_bus(mem,tspec),
            REG_AN3_DBLRES_ON => {
                if !is_noop {
                    self.vgc.clear_mode(VgcMode::DISABLE_AN3);
                }
                self.floating_bus(mem,tspec)
            },
            REG_AN3_DBLRES_OFF => {
                if !is_noop {
                    self.vgc.set_mode(VgcMode::DISABLE_AN3);
                }
                self.floating_bus(mem,tspec)
            },
            REG_SW0 => self.adb.switch(0),
            REG_SW1 => self.adb.switch(1),
            REG_SW2 => self.adb.switch(2),
            REG_PADDL0..=REG_PADDL3 => self.adb.paddle_axis(ioreg - REG_PADDL0),
            REG_STATEREG => {
                mega2_access = false;
                self.statereg()
            },
            REG_PTRIG => {
                if !is_noop {
                    self.adb.paddle_trigger();
                }
                self.floating_bus(mem,tspec)
            },
            // C071-C07F are readable interrupt ROM on the IIGS
            0x71..=0x7f => mem.fetch(0xff,0xc000 | addr & 0xff).0,
            0x80..=0x8f => {
                if !is_noop {
                    self.rw_bank_select(mem,addr);
                }
                self.floating_bus(mem,tspec)
            },
            0xe0..=0xef => self.iwm.read_switch(&mut self.drives,tspec,ioreg,op),
            _ => {
                if !is_noop {
                    self.ioreg_read_ctr[ioreg as usize] += 1;
                    if self.ioreg_read_ctr[ioreg as usize] == 1 {
                        warn!("mmio: unhandled io read {:04X}",addr);
                    }
                }
                self.floating_bus(mem,tspec)
            }
        };
        if !is_noop {
            self.last_data_address = addr as u32;
        }
        (result,mega2_access)
    }

    fn io_write_impl(&mut self,mem: &mut Memory,tspec: &mut TimeSpec,data: u8,addr: u16,op: MemOp) -> bool {
        let ioreg = (addr & 0xff) as u8;
        let is_noop = op == MemOp::Null;
        let mut mega2_access = true;
        match ioreg {
            REG_KEYB_READ => self.set_mmap_bit(mem,Mmap::COL80STORE,false),
            0x01 => self.set_mmap_bit(mem,Mmap::COL80STORE,true),
            0x02 => self.set_mmap_bit(mem,Mmap::RAMRD,false),
            0x03 => self.set_mmap_bit(mem,Mmap::RAMRD,true),
            0x04 => self.set_mmap_bit(mem,Mmap::RAMWRT,false),
            0x05 => self.set_mmap_bit(mem,Mmap::RAMWRT,true),
            0x06 => self.set_mmap_bit(mem,Mmap::CXROM,true),
            0x07 => self.set_mmap_bit(mem,Mmap::CXROM,false),
            0x08 => self.set_mmap_bit(mem,Mmap::ALTZPLC,false),
            0x09 => self.set_mmap_bit(mem,Mmap::ALTZPLC,true),
            0x0a => self.set_mmap_bit(mem,Mmap::C3ROM,true),
            0x0b => self.set_mmap_bit(mem,Mmap::C3ROM,false),
            0x0c => self.vgc.clear_mode(VgcMode::COL80),
            0x0d => self.vgc.set_mode(VgcMode::COL80),
            0x0e => self.vgc.clear_mode(VgcMode::ALTCHARSET),
            0x0f => self.vgc.set_mode(VgcMode::ALTCHARSET),
            REG_ANYKEY_STROBE => {
                self.adb.clear_key_strobe();
            },
            REG_MONO => {
                self.vgc.mode_flags.set(VgcMode::MONOCHROME,data & 0x80 != 0);
            },
            REG_TEXT_COLOR => {
                self.vgc.text_fg_color = (data >> 4) & 0xf;
                self.vgc.text_bg_color = data & 0xf;
            },
            REG_VGC_IRQ_BYTE => self.vgc_irq_c023_set(data),
            REG_ADB_CMD_DATA => self.adb.cmd_data_write(data),
            REG_ADB_STATUS => {
                debug!("mmio: c027 write {:02X} ignored",data);
            },
            REG_NEWVIDEO => self.newvideo_c029_set(data),
            REG_LANGSEL => self.vgc.set_region(data),
            REG_SLOTROMSEL => self.slotromsel_set(mem,data),
            REG_DISK_INTERFACE => {
                self.iwm.write_switch(&mut self.drives,tspec,ioreg,data);
            },
            REG_RTC_VGC_SCANINT => {
                if data & 0x40 == 0 {
                    self.clear_irq(irq::TIMER_1SEC);
                }
                if data & 0x20 == 0 {
                    self.clear_irq(irq::VGC_SCANLINE);
                }
            },
            REG_RTC_DATA => self.rtc.data_c033 = data,
            REG_RTC_CTL => {
                self.rtc.ctl_c034 = data & 0xe0 | (self.rtc.ctl_c034 & 0x1f);
                self.vgc.border_color = data & 0x0f;
                self.rtc.command(tspec,true);
            },
            REG_SHADOW => {
                self.shadow_c035_set(mem,data);
                mega2_access = false;
            },
            REG_SPEED => {
                self.speed_c036_set(tspec,data);
                mega2_access = false;
            },
            REG_SCC_B_CMD => self.scc.write_cmd(0,data),
            REG_SCC_A_CMD => self.scc.write_cmd(1,data),
            REG_SCC_B_DATA => self.scc.write_data(0,data),
            REG_SCC_A_DATA => self.scc.write_data(1,data),
            REG_AUDIO_CTL => self.audio.write_ctl(data),
            REG_AUDIO_DATA => self.audio.write_data(data),
            REG_AUDIO_ADRLO => self.audio.write_addr_lo(data),
            REG_AUDIO_ADRHI => self.audio.write_addr_hi(data),
            REG_MEGA2_INTEN => self.mega2_inten_set(data),
            REG_CLRVBLINT => self.clear_irq(irq::TIMER_QSEC | irq::VGC_VBL),
            REG_EMULATOR => self.emulator_detect = 1,
            REG_TXTCLR => self.vgc.set_mode(VgcMode::GRAPHICS),
            REG_TXTSET => self.vgc.clear_mode(VgcMode::GRAPHICS),
            REG_MIXCLR => self.vgc.clear_mode(VgcMode::MIXED),
            REG_MIXSET => self.vgc.set_mode(VgcMode::MIXED),
            REG_TXTPAGE1 => self.set_mmap_bit(mem,Mmap::TXTPAGE2,false),
            REG_TXTPAGE2 => self.set_mmap_bit(mem,Mmap::TXTPAGE2,true),
            REG_LORES => {
                self.vgc.set_mode(VgcMode::LORES);
                self.vgc.clear_mode(VgcMode::HIRES);
                self.set_mmap_bit(mem,Mmap::HIRES,false);
            },
            REG_HIRES => {
                self.vgc.set_mode(VgcMode::HIRES);
                self.vgc.clear_mode(VgcMode::LORES);
                self.set_mmap_bit(mem,Mmap::HIRES,true);
            },
            REG_AN0_OFF..=0x5d => {},
            REG_AN3_DBLRES_ON => self.vgc.clear_mode(VgcMode::DISABLE_AN3),
            REG_AN3_DBLRES_OFF => self.vgc.set_mode(VgcMode::DISABLE_AN3),
            REG_SW0..=REG_PADDL3 => {},
            REG_STATEREG => {
                self.statereg_set(mem,data);
                mega2_access = false;
            },
            REG_PTRIG..=0x7f => self.adb.paddle_trigger(),
            0x80..=0x8f => self.rw_bank_select(mem,addr),
            0xe0..=0xef => self.iwm.write_switch(&mut self.drives,tspec,ioreg,data),
            _ => {
                if !is_noop {
                    self.ioreg_write_ctr[ioreg as usize] += 1;
                    if self.ioreg_write_ctr[ioreg as usize] == 1 {
                        warn!("mmio: unhandled io write {:04X} = {:02X}",addr,data);
                    }
                }
            }
        }
        if !is_noop {
            self.last_data_address = addr as u32;
        }
        mega2_access
    }
}

fn bit7(cond: bool) -> u8 {
    if cond { 0x80 } else { 0x00 }
}

impl MmioBus for Mmio {
    fn mmio_read(&mut self,mem: &mut Memory,tspec: &mut TimeSpec,addr: u16,op: MemOp) -> (u8,bool) {
        self.io_read_impl(mem,tspec,addr,op)
    }
    fn mmio_write(&mut self,mem: &mut Memory,tspec: &mut TimeSpec,data: u8,addr: u16,op: MemOp) -> bool {
        self.io_write_impl(mem,tspec,data,addr,op)
    }
}
