//! # Opcode descriptions and disassembly
//!
//! A 256-entry table mapping each opcode byte to its mnemonic and
//! addressing mode.  Execution dispatches straight off the raw opcode;
//! this table serves the disassembler, the trace sink and the CLI.

/// 65C816 addressing modes
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum AddrMode {
    None,
    Immediate,
    Absolute,
    AbsoluteLong,
    DirectPage,
    DirectPageIndirect,
    DirectPageIndirectLong,
    AbsoluteIdxX,
    AbsoluteLongIdxX,
    AbsoluteIdxY,
    DirectPageIdxX,
    DirectPageIdxY,
    DirectPageIdxXIndirect,
    DirectPageIndirectIdxY,
    DirectPageIndirectLongIdxY,
    MoveBlock,
    StackRelative,
    StackRelativeIndirectIdxY,
    PCRelative,
    PCRelativeLong,
    PCAbsolute,
    PCIndirect,
    PCIndirectIdxX,
    PCLong,
    PCLongIndirect,
    Operand
}

#[derive(Clone,Copy)]
pub struct OpcodeDesc {
    pub name: &'static str,
    pub mode: AddrMode
}

/// A decoded instruction for the trace sink and disassembler
#[derive(Clone,Copy)]
pub struct Instruction {
    pub opcode: u8,
    pub pbr: u8,
    pub addr: u16,
    pub operand: u16,
    pub bank: u8,
    pub opc_8: bool,
    pub cycles_spent: u32
}

impl Instruction {
    pub fn desc(&self) -> &'static OpcodeDesc {
        &OPCODE_TABLE[self.opcode as usize]
    }
}

use AddrMode::*;

macro_rules! opc {
    ($name: literal,$mode: expr) => {
        OpcodeDesc { name: $name,mode: $mode }
    };
}

pub static OPCODE_TABLE: [OpcodeDesc;256] = [
    /* 00 */ opc!("BRK",Operand),
    /* 01 */ opc!("ORA",DirectPageIdxXIndirect),
    /* 02 */ opc!("COP",Operand),
    /* 03 */ opc!("ORA",StackRelative),
    /* 04 */ opc!("TSB",DirectPage),
    /* 05 */ opc!("ORA",DirectPage),
    /* 06 */ opc!("ASL",DirectPage),
    /* 07 */ opc!("ORA",DirectPageIndirectLong),
    /* 08 */ opc!("PHP",None),
    /* 09 */ opc!("ORA",Immediate),
    /* 0A */ opc!("ASL",None),
    /* 0B */ opc!("PHD",None),
    /* 0C */ opc!("TSB",Absolute),
    /* 0D */ opc!("ORA",Absolute),
    /* 0E */ opc!("ASL",Absolute),
    /* 0F */ opc!("ORA",AbsoluteLong),
    /* 10 */ opc!("BPL",PCRelative),
    /* 11 */ opc!("ORA",DirectPageIndirectIdxY),
    /* 12 */ opc!("ORA",DirectPageIndirect),
    /* 13 */ opc!("ORA",StackRelativeIndirectIdxY),
    /* 14 */ opc!("TRB",DirectPage),
    /* 15 */ opc!("ORA",DirectPageIdxX),
    /* 16 */ opc!("ASL",DirectPageIdxX),
    /* 17 */ opc!("ORA",DirectPageIndirectLongIdxY),
    /* 18 */ opc!("CLC",None),
    /* 19 */ opc!("ORA",AbsoluteIdxY),
    /* 1A */ opc!("INC",None),
    /* 1B */ opc!("TCS",None),
    /* 1C */ opc!("TRB",Absolute),
    /* 1D */ opc!("ORA",AbsoluteIdxX),
    /* 1E */ opc!("ASL",AbsoluteIdxX),
    /* 1F */ opc!("ORA",AbsoluteLongIdxX),
    /* 20 */ opc!("JSR",PCAbsolute),
    /* 21 */ opc!("AND",DirectPageIdxXIndirect),
    /* 22 */ opc!("JSL",PCLong),
    /* 23 */ opc!("AND",StackRelative),
    /* 24 */ opc!("BIT",DirectPage),
    /* 25 */ opc!("AND",DirectPage),
    /* 26 */ opc!("ROL",DirectPage),
    /* 27 */ opc!("AND",DirectPageIndirectLong),
    /* 28 */ opc!("PLP",None),
    /* 29 */ opc!("AND",Immediate),
    /* 2A */ opc!("ROL",None),
    /* 2B */ opc!("PLD",None),
    /* 2C */ opc!("BIT",Absolute),
    /* 2D */ opc!("AND",Absolute),
    /* 2E */ opc!("ROL",Absolute),
    /* 2F */ opc!("AND",AbsoluteLong),
    /* 30 */ opc!("BMI",PCRelative),
    /* 31 */ opc!("AND",DirectPageIndirectIdxY),
    /* 32 */ opc!("AND",DirectPageIndirect),
    /* 33 */ opc!("AND",StackRelativeIndirectIdxY),
    /* 34 */ opc!("BIT",DirectPageIdxX),
    /* 35 */ opc!("AND",DirectPageIdxX),
    /* 36 */ opc!("ROL",DirectPageIdxX),
    /* 37 */ opc!("AND",DirectPageIndirectLongIdxY),
    /* 38 */ opc!("SEC",None),
    /* 39 */ opc!("AND",AbsoluteIdxY),
    /* 3A */ opc!("DEC",None),
    /* 3B */ opc!("TSC",None),
    /* 3C */ opc!("BIT",AbsoluteIdxX),
    /* 3D */ opc!("AND",AbsoluteIdxX),
    /* 3E */ opc!("ROL",AbsoluteIdxX),
    /* 3F */ opc!("AND",AbsoluteLongIdxX),
    /* 40 */ opc!("RTI",None),
    /* 41 */ opc!("EOR",DirectPageIdxXIndirect),
    /* 42 */ opc!("WDM",Operand),
    /* 43 */ opc!("EOR",StackRelative),
    /* 44 */ opc!("MVP",MoveBlock),
    /* 45 */ opc!("EOR",DirectPage),
    /* 46 */ opc!("LSR",DirectPage),
    /* 47 */ opc!("EOR",DirectPageIndirectLong),
    /* 48 */ opc!("PHA",None),
    /* 49 */ opc!("EOR",Immediate),
    /* 4A */ opc!("LSR",None),
    /* 4B */ opc!("PHK",None),
    /* 4C */ opc!("JMP",PCAbsolute),
    /* 4D */ opc!("EOR",Absolute),
    /* 4E */ opc!("LSR",Absolute),
    /* 4F */ opc!("EOR",AbsoluteLong),
    /* 50 */ opc!("BVC",PCRelative),
    /* 51 */ opc!("EOR",DirectPageIndirectIdxY),
    /* 52 */ opc!("EOR",DirectPageIndirect),
    /* 53 */ opc!("EOR",StackRelativeIndirectIdxY),
    /* 54 */ opc!("MVN",MoveBlock),
    /* 55 */ opc!("EOR",DirectPageIdxX),
    /* 56 */ opc!("LSR",DirectPageIdxX),
    /* 57 */ opc!("EOR",DirectPageIndirectLongIdxY),
    /* 58 */ opc!("CLI",None),
    /* 59 */ opc!("EOR",AbsoluteIdxY),
    /* 5A */ opc!("PHY",None),
    /* 5B */ opc!("TCD",None),
    /* 5C */ opc!("JMP",PCLong),
    /* 5D */ opc!("EOR",AbsoluteIdxX),
    /* 5E */ opc!("LSR",AbsoluteIdxX),
    /* 5F */ opc!("EOR",AbsoluteLongIdxX),
    /* 60 */ opc!("RTS",None),
    /* 61 */ opc!("ADC",DirectPageIdxXIndirect),
    /* 62 */ opc!("PER",PCRelativeLong),
    /* 63 */ opc!("ADC",StackRelative),
    /* 64 */ opc!("STZ",DirectPage),
    /* 65 */ opc!("ADC",DirectPage),
    /* 66 */ opc!("ROR",DirectPage),
    /* 67 */ opc!("ADC",DirectPageIndirectLong),
    /* 68 */ opc!("PLA",None),
    /* 69 */ opc!("ADC",Immediate),
    /* 6A */ opc!("ROR",None),
    /* 6B */ opc!("RTL",None),
    /* 6C */ opc!("JMP",PCIndirect),
    /* 6D */ opc!("ADC",Absolute),
    /* 6E */ opc!("ROR",Absolute),
    /* 6F */ opc!("ADC",AbsoluteLong),
    /* 70 */ opc!("BVS",PCRelative),
    /* 71 */ opc!("ADC",DirectPageIndirectIdxY),
    /* 72 */ opc!("ADC",DirectPageIndirect),
    /* 73 */ opc!("ADC",StackRelativeIndirectIdxY),
    /* 74 */ opc!("STZ",DirectPageIdxX),
    /* 75 */ opc!("ADC",DirectPageIdxX),
    /* 76 */ opc!("ROR",DirectPageIdxX),
    /* 77 */ opc!("ADC",DirectPageIndirectLongIdxY),
    /* 78 */ opc!("SEI",None),
    /* 79 */ opc!("ADC",AbsoluteIdxY),
    /* 7A */ opc!("PLY",None),
    /* 7B */ opc!("TDC",None),
    /* 7C */ opc!("JMP",PCIndirectIdxX),
    /* 7D */ opc!("ADC",AbsoluteIdxX),
    /* 7E */ opc!("ROR",AbsoluteIdxX),
    /* 7F */ opc!("ADC",AbsoluteLongIdxX),
    /* 80 */ opc!("BRA",PCRelative),
    /* 81 */ opc!("STA",DirectPageIdxXIndirect),
    /* 82 */ opc!("BRL",PCRelativeLong),
    /* 83 */ opc!("STA",StackRelative),
    /* 84 */ opc!("STY",DirectPage),
    /* 85 */ opc!("STA",DirectPage),
    /* 86 */ opc!("STX",DirectPage),
    /* 87 */ opc!("STA",DirectPageIndirectLong),
    /* 88 */ opc!("DEY",None),
    /* 89 */ opc!("BIT",Immediate),
    /* 8A */ opc!("TXA",None),
    /* 8B */ opc!("PHB",None),
    /* 8C */ opc!("STY",Absolute),
    /* 8D */ opc!("STA",Absolute),
    /* 8E */ opc!("STX",Absolute),
    /* 8F */ opc!("STA",AbsoluteLong),
    /* 90 */ opc!("BCC",PCRelative),
    /* 91 */ opc!("STA",DirectPageIndirectIdxY),
    /* 92 */ opc!("STA",DirectPageIndirect),
    /* 93 */ opc!("STA",StackRelativeIndirectIdxY),
    /* 94 */ opc!("STY",DirectPageIdxX),
    /* 95 */ opc!("STA",DirectPageIdxX),
    /* 96 */ opc!("STX",DirectPageIdxY),
    /* 97 */ opc!("STA",DirectPageIndirectLongIdxY),
    /* 98 */ opc!("TYA",None),
    /* 99 */ opc!("STA",AbsoluteIdxY),
    /* 9A */ opc!("TXS",None),
    /* 9B */ opc!("TXY",None),
    /* 9C */ opc!("STZ",Absolute),
    /* 9D */ opc!("STA",AbsoluteIdxX),
    /* 9E */ opc!("STZ",AbsoluteIdxX),
    /* 9F */ opc!("STA",AbsoluteLongIdxX),
    /* A0 */ opc!("LDY",Immediate),
    /* A1 */ opc!("LDA",DirectPageIdxXIndirect),
    /* A2 */ opc!("LDX",Immediate),
    /* A3 */ opc!("LDA",StackRelative),
    /* A4 */ opc!("LDY",DirectPage),
    /* A5 */ opc!("LDA",DirectPage),
    /* A6 */ opc!("LDX",DirectPage),
    /* A7 */ opc!("LDA",DirectPageIndirectLong),
    /* A8 */ opc!("TAY",None),
    /* A9 */ opc!("LDA",Immediate),
    /* AA */ opc!("TAX",None),
    /* AB */ opc!("PLB",None),
    /* AC */ opc!("LDY",Absolute),
    /* AD */ opc!("LDA",Absolute),
    /* AE */ opc!("LDX",Absolute),
    /* AF */ opc!("LDA",AbsoluteLong),
    /* B0 */ opc!("BCS",PCRelative),
    /* B1 */ opc!("LDA",DirectPageIndirectIdxY),
    /* B2 */ opc!("LDA",DirectPageIndirect),
    /* B3 */ opc!("LDA",StackRelativeIndirectIdxY),
    /* B4 */ opc!("LDY",DirectPageIdxX),
    /* B5 */ opc!("LDA",DirectPageIdxX),
    /* B6 */ opc!("LDX",DirectPageIdxY),
    /* B7 */ opc!("LDA",DirectPageIndirectLongIdxY),
    /* B8 */ opc!("CLV",None),
    /* B9 */ opc!("LDA",AbsoluteIdxY),
    /* BA */ opc!("TSX",None),
    /* BB */ opc!("TYX",None),
    /* BC */ opc!("LDY",AbsoluteIdxX),
    /* BD */ opc!("LDA",AbsoluteIdxX),
    /* BE */ opc!("LDX",AbsoluteIdxY),
    /* BF */ opc!("LDA",AbsoluteLongIdxX),
    /* C0 */ opc!("CPY",Immediate),
    /* C1 */ opc!("CMP",DirectPageIdxXIndirect),
    /* C2 */ opc!("REP",Immediate),
    /* C3 */ opc!("CMP",StackRelative),
    /* C4 */ opc!("CPY",DirectPage),
    /* C5 */ opc!("CMP",DirectPage),
    /* C6 */ opc!("DEC",DirectPage),
    /* C7 */ opc!("CMP",DirectPageIndirectLong),
    /* C8 */ opc!("INY",None),
    /* C9 */ opc!("CMP",Immediate),
    /* CA */ opc!("DEX",None),
    /* CB */ opc!("WAI",None),
    /* CC */ opc!("CPY",Absolute),
    /* CD */ opc!("CMP",Absolute),
    /* CE */ opc!("DEC",Absolute),
    /* CF */ opc!("CMP",AbsoluteLong),
    /* D0 */ opc!("BNE",PCRelative),
    /* D1 */ opc!("CMP",DirectPageIndirectIdxY),
    /* D2 */ opc!("CMP",DirectPageIndirect),
    /* D3 */ opc!("CMP",StackRelativeIndirectIdxY),
    /* D4 */ opc!("PEI",DirectPage),
    /* D5 */ opc!("CMP",DirectPageIdxX),
    /* D6 */ opc!("DEC",DirectPageIdxX),
    /* D7 */ opc!("CMP",DirectPageIndirectLongIdxY),
    /* D8 */ opc!("CLD",None),
    /* D9 */ opc!("CMP",AbsoluteIdxY),
    /* DA */ opc!("PHX",None),
    /* DB */ opc!("STP",None),
    /* DC */ opc!("JMP",PCLongIndirect),
    /* DD */ opc!("CMP",AbsoluteIdxX),
    /* DE */ opc!("DEC",AbsoluteIdxX),
    /* DF */ opc!("CMP",AbsoluteLongIdxX),
    /* E0 */ opc!("CPX",Immediate),
    /* E1 */ opc!("SBC",DirectPageIdxXIndirect),
    /* E2 */ opc!("SEP",Immediate),
    /* E3 */ opc!("SBC",StackRelative),
    /* E4 */ opc!("CPX",DirectPage),
    /* E5 */ opc!("SBC",DirectPage),
    /* E6 */ opc!("INC",DirectPage),
    /* E7 */ opc!("SBC",DirectPageIndirectLong),
    /* E8 */ opc!("INX",None),
    /* E9 */ opc!("SBC",Immediate),
    /* EA */ opc!("NOP",None),
    /* EB */ opc!("XBA",None),
    /* EC */ opc!("CPX",Absolute),
    /* ED */ opc!("SBC",Absolute),
    /* EE */ opc!("INC",Absolute),
    /* EF */ opc!("SBC",AbsoluteLong),
    /* F0 */ opc!("BEQ",PCRelative),
    /* F1 */ opc!("SBC",DirectPageIndirectIdxY),
    /* F2 */ opc!("SBC",DirectPageIndirect),
    /* F3 */ opc!("SBC",StackRelativeIndirectIdxY),
    /* F4 */ opc!("PEA",Absolute),
    /* F5 */ opc!("SBC",DirectPageIdxX),
    /* F6 */ opc!("INC",DirectPageIdxX),
    /* F7 */ opc!("SBC",DirectPageIndirectLongIdxY),
    /* F8 */ opc!("SED",None),
    /* F9 */ opc!("SBC",AbsoluteIdxY),
    /* FA */ opc!("PLX",None),
    /* FB */ opc!("XCE",None),
    /* FC */ opc!("JSR",PCIndirectIdxX),
    /* FD */ opc!("SBC",AbsoluteIdxX),
    /* FE */ opc!("INC",AbsoluteIdxX),
    /* FF */ opc!("SBC",AbsoluteLongIdxX)
];

/// Operand byte length for a mode at the given register widths
pub fn operand_size(mode: AddrMode,m8: bool,x8: bool,opcode: u8) -> usize {
    match mode {
        AddrMode::None => 0,
        AddrMode::Immediate => {
            // index ops follow X, REP/SEP are fixed one byte
            match opcode {
                0xc2 | 0xe2 => 1,
                0xa0 | 0xa2 | 0xc0 | 0xe0 => if x8 { 1 } else { 2 },
                _ => if m8 { 1 } else { 2 }
            }
        },
        AddrMode::Operand => 1,
        AddrMode::DirectPage | AddrMode::DirectPageIndirect
        | AddrMode::DirectPageIndirectLong | AddrMode::DirectPageIdxX
        | AddrMode::DirectPageIdxY | AddrMode::DirectPageIdxXIndirect
        | AddrMode::DirectPageIndirectIdxY | AddrMode::DirectPageIndirectLongIdxY
        | AddrMode::StackRelative | AddrMode::StackRelativeIndirectIdxY
        | AddrMode::PCRelative => 1,
        AddrMode::Absolute | AddrMode::AbsoluteIdxX | AddrMode::AbsoluteIdxY
        | AddrMode::MoveBlock | AddrMode::PCRelativeLong | AddrMode::PCAbsolute
        | AddrMode::PCIndirect | AddrMode::PCIndirectIdxX
        | AddrMode::PCLongIndirect => 2,
        AddrMode::AbsoluteLong | AddrMode::AbsoluteLongIdxX | AddrMode::PCLong => 3
    }
}

/// Render one instruction at `bytes[0..]`; returns the text and the number
/// of bytes consumed.
pub fn disassemble(bytes: &[u8],addr: u16,m8: bool,x8: bool) -> (String,usize) {
    let opcode = bytes[0];
    let desc = &OPCODE_TABLE[opcode as usize];
    let size = operand_size(desc.mode,m8,x8,opcode);
    let mut operand: u32 = 0;
    for idx in (0..size).rev() {
        operand = (operand << 8) | *bytes.get(1 + idx).unwrap_or(&0) as u32;
    }
    let text = match desc.mode {
        AddrMode::None => desc.name.to_string(),
        AddrMode::Immediate => match size {
            1 => format!("{} #${:02X}",desc.name,operand),
            _ => format!("{} #${:04X}",desc.name,operand)
        },
        AddrMode::Operand => format!("{} ${:02X}",desc.name,operand),
        AddrMode::Absolute | AddrMode::PCAbsolute => format!("{} ${:04X}",desc.name,operand),
        AddrMode::AbsoluteLong | AddrMode::PCLong => format!("{} ${:06X}",desc.name,operand),
        AddrMode::DirectPage => format!("{} ${:02X}",desc.name,operand),
        AddrMode::DirectPageIndirect => format!("{} (${:02X})",desc.name,operand),
        AddrMode::DirectPageIndirectLong => format!("{} [${:02X}]",desc.name,operand),
        AddrMode::AbsoluteIdxX => format!("{} ${:04X},X",desc.name,operand),
        AddrMode::AbsoluteLongIdxX => format!("{} ${:06X},X",desc.name,operand),
        AddrMode::AbsoluteIdxY => format!("{} ${:04X},Y",desc.name,operand),
        AddrMode::DirectPageIdxX => format!("{} ${:02X},X",desc.name,operand),
        AddrMode::DirectPageIdxY => format!("{} ${:02X},Y",desc.name,operand),
        AddrMode::DirectPageIdxXIndirect => format!("{} (${:02X},X)",desc.name,operand),
        AddrMode::DirectPageIndirectIdxY => format!("{} (${:02X}),Y",desc.name,operand),
        AddrMode::DirectPageIndirectLongIdxY => format!("{} [${:02X}],Y",desc.name,operand),
        AddrMode::MoveBlock => {
            // operand bytes are dest bank then source bank; assembler
            // convention lists source first
            format!("{} ${:02X},${:02X}",desc.name,(operand >> 8) & 0xff,operand & 0xff)
        },
        AddrMode::StackRelative => format!("{} ${:02X},S",desc.name,operand),
        AddrMode::StackRelativeIndirectIdxY => format!("{} (${:02X},S),Y",desc.name,operand),
        AddrMode::PCRelative => {
            let target = addr.wrapping_add(2).wrapping_add(operand as u8 as i8 as u16);
            format!("{} ${:04X}",desc.name,target)
        },
        AddrMode::PCRelativeLong => {
            let target = addr.wrapping_add(3).wrapping_add(operand as u16);
            format!("{} ${:04X}",desc.name,target)
        },
        AddrMode::PCIndirect => format!("{} (${:04X})",desc.name,operand),
        AddrMode::PCIndirectIdxX => format!("{} (${:04X},X)",desc.name,operand),
        AddrMode::PCLongIndirect => format!("{} [${:04X}]",desc.name,operand)
    };
    (text,1 + size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_every_opcode() {
        for (idx,desc) in OPCODE_TABLE.iter().enumerate() {
            assert!(!desc.name.is_empty(),"opcode {:02X} has no name",idx);
            assert_eq!(desc.name.len(),3);
        }
    }

    #[test]
    fn immediate_width_follows_flags() {
        // LDA #imm follows M, LDX #imm follows X, REP is fixed
        assert_eq!(operand_size(AddrMode::Immediate,true,true,0xa9),1);
        assert_eq!(operand_size(AddrMode::Immediate,false,true,0xa9),2);
        assert_eq!(operand_size(AddrMode::Immediate,false,true,0xa2),1);
        assert_eq!(operand_size(AddrMode::Immediate,false,false,0xa2),2);
        assert_eq!(operand_size(AddrMode::Immediate,false,false,0xc2),1);
    }

    #[test]
    fn disassembles_common_forms() {
        let (text,size) = disassemble(&[0xa9,0x34,0x12],0x2000,false,false);
        assert_eq!(text,"LDA #$1234");
        assert_eq!(size,3);
        let (text,size) = disassemble(&[0xd0,0xfe],0x2000,true,true);
        assert_eq!(text,"BNE $2000");
        assert_eq!(size,2);
        let (text,_) = disassemble(&[0x8f,0x00,0x04,0xe1],0x2000,true,true);
        assert_eq!(text,"STA $E10400");
        let (text,_) = disassemble(&[0x54,0x01,0x02],0x2000,true,true);
        assert_eq!(text,"MVN $02,$01");
    }
}
