//! # Softswitch state and page-map recomputation
//!
//! The whole memory-visible softswitch state lives in one 32-bit flag word.
//! Any change runs [`memory_map`], which XORs old against new and rewrites
//! only the page ranges the delta touches, in a fixed order: ALTZP first,
//! then the //e display overrides, then RAMRD/RAMWRT, then the shadow maps,
//! then the C0-CF I/O + slot region, and finally the language card.

use bitflags::bitflags;

use crate::mem::{Memory,PageEntry,PageFlags};

bitflags! {
    /// The MMC softswitch register
    #[derive(Clone,Copy,PartialEq,Eq,Debug,Default)]
    pub struct Mmap: u32 {
        const ALTZPLC      = 0x0000_0001;
        const RAMRD        = 0x0000_0002;
        const RAMWRT       = 0x0000_0004;
        const CXROM        = 0x0000_0008;
        const C3ROM        = 0x0000_0010;
        const RDLCRAM      = 0x0000_0020;
        const WRLCRAM      = 0x0000_0040;
        const LCBANK2      = 0x0000_0080;
        const TXTPAGE2     = 0x0000_0100;
        const HIRES        = 0x0000_0200;
        const COL80STORE   = 0x0000_0400;
        const C1ROM        = 0x0001_0000;
        const C2ROM        = 0x0002_0000;
        const C4ROM        = 0x0008_0000;
        const C5ROM        = 0x0010_0000;
        const C6ROM        = 0x0020_0000;
        const C7ROM        = 0x0040_0000;
        const NSHADOW_TXT1 = 0x0100_0000;
        const NSHADOW_TXT2 = 0x0200_0000;
        const NSHADOW_HGR1 = 0x0400_0000;
        const NSHADOW_HGR2 = 0x0800_0000;
        const NSHADOW_SHGR = 0x1000_0000;
        const NSHADOW_AUX  = 0x2000_0000;
        const NIOLC        = 0x8000_0000;
    }
}

impl Mmap {
    /// all language-card selection bits
    pub fn lc() -> Mmap {
        Mmap::RDLCRAM | Mmap::WRLCRAM | Mmap::LCBANK2
    }
    /// all shadow-inhibit bits
    pub fn nshadow() -> Mmap {
        Mmap::NSHADOW_TXT1 | Mmap::NSHADOW_TXT2 | Mmap::NSHADOW_HGR1
            | Mmap::NSHADOW_HGR2 | Mmap::NSHADOW_SHGR | Mmap::NSHADOW_AUX
    }
    /// internal/slot ROM selection bits
    pub fn crom() -> Mmap {
        Mmap::CXROM | Mmap::C3ROM | Mmap::C1ROM | Mmap::C2ROM
            | Mmap::C4ROM | Mmap::C5ROM | Mmap::C6ROM | Mmap::C7ROM
    }
    /// bits whose change forces the //e display region to remap
    pub fn oldvideo() -> Mmap {
        Mmap::COL80STORE | Mmap::TXTPAGE2 | Mmap::HIRES | Mmap::RAMRD | Mmap::RAMWRT
    }
    /// slot ROM bit for slots 1..=7 (slot 3 is governed by C3ROM)
    pub fn slot_rom(slot: usize) -> Mmap {
        match slot {
            1 => Mmap::C1ROM,
            2 => Mmap::C2ROM,
            4 => Mmap::C4ROM,
            5 => Mmap::C5ROM,
            6 => Mmap::C6ROM,
            7 => Mmap::C7ROM,
            _ => Mmap::empty()
        }
    }
}

fn aux_bank(cond: bool) -> u8 {
    if cond { 0x01 } else { 0x00 }
}

/// Rewrite the shadow maps for the inhibit bits that changed
fn shadow_map(mem: &mut Memory,old: Mmap,new: Mmap) {
    let delta = old ^ new;
    let inhibit_aux = new.contains(Mmap::NSHADOW_AUX);
    let inhibit_shgr = new.contains(Mmap::NSHADOW_SHGR);
    if delta.contains(Mmap::NSHADOW_TXT1) {
        let v = if new.contains(Mmap::NSHADOW_TXT1) { 0 } else { 1 };
        for page in 0x04..0x08 {
            mem.shadow_main[page] = v;
            mem.shadow_aux[page] = v;
        }
    }
    if delta.contains(Mmap::NSHADOW_TXT2) {
        let v = if new.contains(Mmap::NSHADOW_TXT2) { 0 } else { 1 };
        for page in 0x08..0x0c {
            mem.shadow_main[page] = v;
            mem.shadow_aux[page] = v;
        }
    }
    if delta.intersects(Mmap::NSHADOW_HGR1 | Mmap::NSHADOW_AUX | Mmap::NSHADOW_SHGR) {
        let v0 = if new.contains(Mmap::NSHADOW_HGR1) { 0 } else { 1 };
        for page in 0x20..0x40 {
            let mut v1 = if v0 != 0 && !inhibit_aux { 1 } else { 0 };
            if !inhibit_shgr {
                v1 = 1;
            }
            mem.shadow_main[page] = v0;
            mem.shadow_aux[page] = v1;
        }
    }
    if delta.intersects(Mmap::NSHADOW_HGR2 | Mmap::NSHADOW_AUX | Mmap::NSHADOW_SHGR) {
        let v0 = if new.contains(Mmap::NSHADOW_HGR2) { 0 } else { 1 };
        for page in 0x40..0x60 {
            let mut v1 = if v0 != 0 && !inhibit_aux { 1 } else { 0 };
            if !inhibit_shgr {
                v1 = 1;
            }
            mem.shadow_main[page] = v0;
            mem.shadow_aux[page] = v1;
        }
    }
    if delta.contains(Mmap::NSHADOW_SHGR) {
        let v1 = if inhibit_shgr { 0 } else { 1 };
        for page in 0x60..0xa0 {
            mem.shadow_aux[page] = v1;
        }
    }
}

/// Apply a new softswitch word, rewriting only what changed.  Returns the
/// word that should become the current register.  `card_exp_slot` is the
/// slot currently holding the C800-CFFF expansion window, if any.
pub fn memory_map(mem: &mut Memory,old: Mmap,new: Mmap,card_exp_slot: Option<usize>) -> Mmap {
    let mut delta = old ^ new;

    //  1. ALTZP moves zero page + stack of bank 00; the LC banks follow it
    if delta.contains(Mmap::ALTZPLC) {
        delta |= Mmap::lc();
        let bank = aux_bank(new.contains(Mmap::ALTZPLC));
        for page in 0x00..0x02 {
            mem.fpi_main.pages[page].bank_read = bank;
            mem.fpi_main.pages[page].bank_write = bank;
        }
    }

    //  2. display regions honor 80COLSTORE/TXTPAGE2/HIRES over RAMRD/RAMWRT
    if delta.intersects(Mmap::oldvideo()) {
        let rd = aux_bank(new.contains(Mmap::RAMRD));
        let wr = aux_bank(new.contains(Mmap::RAMWRT));
        if new.contains(Mmap::COL80STORE) {
            let pg2 = aux_bank(new.contains(Mmap::TXTPAGE2));
            for page in 0x04..0x08 {
                mem.fpi_main.pages[page].bank_read = pg2;
                mem.fpi_main.pages[page].bank_write = pg2;
            }
            for page in 0x20..0x40 {
                let b = if new.contains(Mmap::HIRES) { (pg2,pg2) } else { (rd,wr) };
                mem.fpi_main.pages[page].bank_read = b.0;
                mem.fpi_main.pages[page].bank_write = b.1;
            }
        } else {
            for page in 0x04..0x08 {
                mem.fpi_main.pages[page].bank_read = rd;
                mem.fpi_main.pages[page].bank_write = wr;
            }
            for page in 0x20..0x40 {
                mem.fpi_main.pages[page].bank_read = rd;
                mem.fpi_main.pages[page].bank_write = wr;
            }
        }
    }

    //  3. RAMRD/RAMWRT for the remaining main-memory pages
    if delta.intersects(Mmap::RAMRD | Mmap::RAMWRT) {
        delta |= Mmap::nshadow();
        let rd = aux_bank(new.contains(Mmap::RAMRD));
        let wr = aux_bank(new.contains(Mmap::RAMWRT));
        for page in (0x02..0x04).chain(0x08..0x20).chain(0x40..0xc0) {
            mem.fpi_main.pages[page].bank_read = rd;
            mem.fpi_main.pages[page].bank_write = wr;
        }
    }

    //  4. shadow maps
    if delta.intersects(Mmap::nshadow()) {
        shadow_map(mem,old & Mmap::nshadow(),new & Mmap::nshadow());
    }

    //  5. I/O page + slot ROM windows C0-CF
    if delta.intersects(Mmap::crom() | Mmap::NIOLC) {
        if delta.contains(Mmap::NIOLC) {
            delta |= Mmap::lc();
        }
        mem.fpi_main.pages[0xc0] = PageEntry::main_aux(0xc0,0x00);
        mem.fpi_aux.pages[0xc0] = PageEntry::main_aux(0xc0,0x01);
        if new.contains(Mmap::NIOLC) {
            // I/O and LC disabled in the FPI banks: plain fast RAM
            for page in 0xc1..0xd0 {
                mem.fpi_main.pages[page] = PageEntry::main_aux(page as u8,0x00);
                mem.fpi_aux.pages[page] = PageEntry::main_aux(page as u8,0x01);
            }
        } else {
            mem.fpi_main.pages[0xc0].flags.insert(PageFlags::IOADDR);
            mem.fpi_aux.pages[0xc0].flags.insert(PageFlags::IOADDR);
            for page in 0xc1..0xc8 {
                let slot = page - 0xc0;
                let intcx = if page == 0xc3 {
                    !new.contains(Mmap::C3ROM)
                } else {
                    !new.contains(Mmap::CXROM) || !new.contains(Mmap::slot_rom(slot))
                };
                for (map,bank) in [(0,0x00u8),(1,0x01u8)] {
                    let pm = if map == 0 { &mut mem.fpi_main } else { &mut mem.fpi_aux };
                    let mut entry = if intcx {
                        PageEntry::split(page as u8,0xff,bank)
                    } else {
                        let mut e = PageEntry::split(page as u8,0x00,0x00);
                        e.flags.insert(PageFlags::CARDMEM);
                        e
                    };
                    entry.flags.remove(PageFlags::WRITE_OK);
                    pm.pages[page] = entry;
                }
            }
            for page in 0xc8..0xd0 {
                let intcx = !new.contains(Mmap::CXROM) || card_exp_slot.is_none();
                for (map,bank) in [(0,0x00u8),(1,0x01u8)] {
                    let pm = if map == 0 { &mut mem.fpi_main } else { &mut mem.fpi_aux };
                    let mut entry = if intcx {
                        PageEntry::split(page as u8,0xff,bank)
                    } else {
                        let mut e = PageEntry::split(page as u8 - 0xc8,0xcc,0xcc);
                        e.flags.insert(PageFlags::CARDMEM);
                        e
                    };
                    entry.flags.remove(PageFlags::WRITE_OK);
                    pm.pages[page] = entry;
                }
            }
        }
        //  the Mega II banks ignore NIOLC but follow the ROM selects
        if delta.intersects(Mmap::crom()) {
            for page in 0xc1..0xd0 {
                let slot = page - 0xc0;
                let intcx = if page >= 0xc8 {
                    !new.contains(Mmap::CXROM) || card_exp_slot.is_none()
                } else if page == 0xc3 {
                    !new.contains(Mmap::C3ROM)
                } else {
                    !new.contains(Mmap::CXROM) || !new.contains(Mmap::slot_rom(slot))
                };
                for (map,bank) in [(0,0xe0u8),(1,0xe1u8)] {
                    let pm = if map == 0 { &mut mem.mega2_main } else { &mut mem.mega2_aux };
                    let mut entry = if intcx {
                        PageEntry::split(page as u8,0xff,bank)
                    } else if page >= 0xc8 {
                        let mut e = PageEntry::split(page as u8 - 0xc8,0xcc,0xcc);
                        e.flags.insert(PageFlags::CARDMEM);
                        e
                    } else {
                        let mut e = PageEntry::split(page as u8,0x00,0x00);
                        e.flags.insert(PageFlags::CARDMEM);
                        e
                    };
                    entry.flags.remove(PageFlags::WRITE_OK);
                    pm.pages[page] = entry;
                }
            }
        }
    }

    //  6. language card D0-FF
    if delta.intersects(Mmap::lc()) {
        let rom_read = !new.contains(Mmap::NIOLC) && !new.contains(Mmap::RDLCRAM);
        let b00 = aux_bank(new.contains(Mmap::ALTZPLC));
        for page in 0xd0..0x100 {
            let in_lc_window = page < 0xe0;
            //  bank 1 of the LC aliases D0-DF onto C0-CF
            let lc1_page = (0xc0 + (page - 0xd0)) as u8;
            let use_lc1 = in_lc_window && !new.contains(Mmap::LCBANK2);
            let fpi_page = if in_lc_window && !new.contains(Mmap::NIOLC) && use_lc1 {
                lc1_page
            } else {
                page as u8
            };
            let mega2_page = if use_lc1 { lc1_page } else { page as u8 };
            let writable = new.contains(Mmap::NIOLC) || new.contains(Mmap::WRLCRAM);

            for (map,bank) in [(0,b00),(1,0x01u8)] {
                let pm = if map == 0 { &mut mem.fpi_main } else { &mut mem.fpi_aux };
                let entry = &mut pm.pages[page];
                entry.read_page = fpi_page;
                entry.write_page = fpi_page;
                entry.bank_read = if rom_read { 0xff } else { bank };
                entry.bank_write = bank;
                entry.flags.remove(PageFlags::DIRECT);
                entry.flags.set(PageFlags::MAIN_AUX,!rom_read);
                entry.flags.set(PageFlags::WRITE_OK,writable);
            }
            for (map,_bank) in [(0,0xe0u8),(1,0xe1u8)] {
                let pm = if map == 0 { &mut mem.mega2_main } else { &mut mem.mega2_aux };
                let entry = &mut pm.pages[page];
                entry.read_page = mega2_page;
                entry.write_page = mega2_page;
                entry.flags.set(PageFlags::WRITE_OK,new.contains(Mmap::WRLCRAM) || new.contains(Mmap::NIOLC));
            }
        }
    }

    new
}

/// Full rebuild used at power-on and after snapshot restore: force every
/// region to recompute by walking through the all-zeros state.
pub fn rebuild(mem: &mut Memory,current: Mmap,card_exp_slot: Option<usize>) -> Mmap {
    memory_map(mem,Mmap::all(),Mmap::empty(),card_exp_slot);
    memory_map(mem,Mmap::empty(),current,card_exp_slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MapKind;

    #[test]
    fn default_map_shadows_video_pages() {
        let mut mem = Memory::new(2);
        rebuild(&mut mem,Mmap::empty(),None);
        for page in 0x04..0x08 {
            assert_eq!(mem.shadow_main[page],1,"txt1 page {:02X}",page);
        }
        for page in 0x20..0x40 {
            assert_eq!(mem.shadow_main[page],1,"hgr1 page {:02X}",page);
        }
        assert_eq!(mem.shadow_main[0x03],0);
        assert_eq!(mem.shadow_main[0xa0],0);
    }

    #[test]
    fn txt1_inhibit_clears_shadow() {
        let mut mem = Memory::new(2);
        let mut mmap = rebuild(&mut mem,Mmap::empty(),None);
        mmap = memory_map(&mut mem,mmap,mmap | Mmap::NSHADOW_TXT1,None);
        assert_eq!(mem.shadow_main[0x04],0);
        memory_map(&mut mem,mmap,mmap & !Mmap::NSHADOW_TXT1,None);
        assert_eq!(mem.shadow_main[0x04],1);
    }

    #[test]
    fn ramrd_redirects_reads_to_aux() {
        let mut mem = Memory::new(2);
        let mmap = rebuild(&mut mem,Mmap::empty(),None);
        assert_eq!(mem.page_entry(0x9000,0x00).bank_read,0x00);
        memory_map(&mut mem,mmap,mmap | Mmap::RAMRD,None);
        assert_eq!(mem.page_entry(0x9000,0x00).bank_read,0x01);
        assert_eq!(mem.page_entry(0x9000,0x00).bank_write,0x00);
    }

    #[test]
    fn lc_rom_and_ram_selection() {
        let mut mem = Memory::new(2);
        let mut mmap = rebuild(&mut mem,Mmap::empty(),None);
        // power-on state reads LC ROM, writes go nowhere
        let entry = mem.page_entry(0xd000,0x00);
        assert_eq!(entry.bank_read,0xff);
        assert!(!entry.flags.contains(PageFlags::WRITE_OK));
        // select RAM read + write, bank 2
        mmap = memory_map(&mut mem,mmap,
            mmap | Mmap::RDLCRAM | Mmap::WRLCRAM | Mmap::LCBANK2,None);
        let entry = mem.page_entry(0xd000,0x00);
        assert_eq!(entry.bank_read,0x00);
        assert_eq!(entry.read_page,0xd0);
        assert!(entry.flags.contains(PageFlags::WRITE_OK));
        // bank 1 aliases D0 onto C0
        memory_map(&mut mem,mmap,mmap & !Mmap::LCBANK2,None);
        let entry = mem.page_entry(0xd000,0x00);
        assert_eq!(entry.read_page,0xc0);
    }

    #[test]
    fn io_page_marks_ioaddr() {
        let mut mem = Memory::new(2);
        rebuild(&mut mem,Mmap::empty(),None);
        assert!(mem.page_entry(0xc000,0x00).flags.contains(PageFlags::IOADDR));
        assert!(mem.page_entry(0xc000,0x01).flags.contains(PageFlags::IOADDR));
        assert_eq!(mem.map_kind(0x00),MapKind::FpiMain);
    }

    #[test]
    fn altzp_moves_zero_page() {
        let mut mem = Memory::new(2);
        let mmap = rebuild(&mut mem,Mmap::empty(),None);
        assert_eq!(mem.page_entry(0x0000,0x00).bank_read,0x00);
        memory_map(&mut mem,mmap,mmap | Mmap::ALTZPLC,None);
        assert_eq!(mem.page_entry(0x0000,0x00).bank_read,0x01);
        assert_eq!(mem.page_entry(0x0100,0x00).bank_write,0x01);
        // aux bank map page 0 is untouched
        assert_eq!(mem.page_entry(0x0000,0x01).bank_read,0x01);
    }
}
