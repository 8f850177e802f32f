//! Instruction decoding.
use std::fmt;

use crate::constants::Address;

/// Helpers for extracting operand fields from an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode(pub u16);

impl Opcode {
    #[inline(always)]
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }

    /// Instruction group in the highest nibble.
    #[inline(always)]
    pub fn op(&self) -> u8 {
        ((self.0 & 0xF000) >> 12) as u8
    }

    /// Register index VX.
    #[inline(always)]
    pub fn x(&self) -> u8 {
        ((self.0 & 0x0F00) >> 8) as u8
    }

    /// Register index VY.
    #[inline(always)]
    pub fn y(&self) -> u8 {
        ((self.0 & 0x00F0) >> 4) as u8
    }

    /// Lowest nibble.
    #[inline(always)]
    pub fn n(&self) -> u8 {
        (self.0 & 0x000F) as u8
    }

    /// Lowest byte.
    #[inline(always)]
    pub fn kk(&self) -> u8 {
        (self.0 & 0x00FF) as u8
    }

    /// 12-bit address.
    #[inline(always)]
    pub fn nnn(&self) -> Address {
        self.0 & 0x0FFF
    }
}

/// Decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    /// 0nnn (SYS addr)
    ///
    /// Jump to a machine code routine. Ignored by modern interpreters.
    Sys { nnn: Address },
    /// 00E0 (CLS)
    ClearScreen,
    /// 00EE (RET)
    Return,
    /// 1nnn (JP addr)
    Jump { nnn: Address },
    /// 2nnn (CALL addr)
    Call { nnn: Address },
    /// 3xkk (SE Vx, byte)
    SkipEqByte { x: u8, kk: u8 },
    /// 4xkk (SNE Vx, byte)
    SkipNotEqByte { x: u8, kk: u8 },
    /// 5xy0 (SE Vx, Vy)
    SkipEq { x: u8, y: u8 },
    /// 6xkk (LD Vx, byte)
    LoadByte { x: u8, kk: u8 },
    /// 7xkk (ADD Vx, byte)
    AddByte { x: u8, kk: u8 },
    /// 8xy0 (LD Vx, Vy)
    Load { x: u8, y: u8 },
    /// 8xy1 (OR Vx, Vy)
    Or { x: u8, y: u8 },
    /// 8xy2 (AND Vx, Vy)
    And { x: u8, y: u8 },
    /// 8xy3 (XOR Vx, Vy)
    Xor { x: u8, y: u8 },
    /// 8xy4 (ADD Vx, Vy)
    Add { x: u8, y: u8 },
    /// 8xy5 (SUB Vx, Vy)
    Sub { x: u8, y: u8 },
    /// 8xy6 (SHR Vx)
    ShiftRight { x: u8 },
    /// 8xy7 (SUBN Vx, Vy)
    SubN { x: u8, y: u8 },
    /// 8xyE (SHL Vx)
    ShiftLeft { x: u8 },
    /// 9xy0 (SNE Vx, Vy)
    SkipNotEq { x: u8, y: u8 },
    /// Annn (LD I, addr)
    LoadAddress { nnn: Address },
    /// Bnnn (JP V0, addr)
    JumpOffset { nnn: Address },
    /// Cxkk (RND Vx, byte)
    Random { x: u8, kk: u8 },
    /// Dxyn (DRW Vx, Vy, nibble)
    Draw { x: u8, y: u8, n: u8 },
    /// Ex9E (SKP Vx)
    SkipKey { x: u8 },
    /// ExA1 (SKNP Vx)
    SkipNotKey { x: u8 },
    /// Fx07 (LD Vx, DT)
    LoadDelay { x: u8 },
    /// Fx0A (LD Vx, K)
    WaitKey { x: u8 },
    /// Fx15 (LD DT, Vx)
    SetDelay { x: u8 },
    /// Fx18 (LD ST, Vx)
    SetSound { x: u8 },
    /// Fx1E (ADD I, Vx)
    AddAddress { x: u8 },
    /// Fx29 (LD F, Vx)
    LoadGlyph { x: u8 },
    /// Fx33 (LD B, Vx)
    StoreBcd { x: u8 },
    /// Fx55 (LD [I], Vx)
    StoreRegisters { x: u8 },
    /// Fx65 (LD Vx, [I])
    LoadRegisters { x: u8 },
    /// Encoding that isn't part of the instruction set.
    Unknown(u16),
}

impl Instr {
    pub fn decode(word: u16) -> Self {
        let code = Opcode(word);
        let (x, y, n, kk, nnn) = (code.x(), code.y(), code.n(), code.kk(), code.nnn());

        match code.op() {
            0x0 => match word {
                0x00E0 => Self::ClearScreen,
                0x00EE => Self::Return,
                _ => Self::Sys { nnn },
            },
            0x1 => Self::Jump { nnn },
            0x2 => Self::Call { nnn },
            0x3 => Self::SkipEqByte { x, kk },
            0x4 => Self::SkipNotEqByte { x, kk },
            0x5 if n == 0 => Self::SkipEq { x, y },
            0x6 => Self::LoadByte { x, kk },
            0x7 => Self::AddByte { x, kk },
            // Arithmetic instructions indentified by n
            0x8 => match n {
                0x0 => Self::Load { x, y },
                0x1 => Self::Or { x, y },
                0x2 => Self::And { x, y },
                0x3 => Self::Xor { x, y },
                0x4 => Self::Add { x, y },
                0x5 => Self::Sub { x, y },
                0x6 => Self::ShiftRight { x },
                0x7 => Self::SubN { x, y },
                0xE => Self::ShiftLeft { x },
                _ => Self::Unknown(word),
            },
            0x9 if n == 0 => Self::SkipNotEq { x, y },
            0xA => Self::LoadAddress { nnn },
            0xB => Self::JumpOffset { nnn },
            0xC => Self::Random { x, kk },
            0xD => Self::Draw { x, y, n },
            0xE => match kk {
                0x9E => Self::SkipKey { x },
                0xA1 => Self::SkipNotKey { x },
                _ => Self::Unknown(word),
            },
            // Miscellaneous instructions identified by kk
            0xF => match kk {
                0x07 => Self::LoadDelay { x },
                0x0A => Self::WaitKey { x },
                0x15 => Self::SetDelay { x },
                0x18 => Self::SetSound { x },
                0x1E => Self::AddAddress { x },
                0x29 => Self::LoadGlyph { x },
                0x33 => Self::StoreBcd { x },
                0x55 => Self::StoreRegisters { x },
                0x65 => Self::LoadRegisters { x },
                _ => Self::Unknown(word),
            },
            _ => Self::Unknown(word),
        }
    }
}

/// Assembly mnemonic.
impl fmt::Display for Instr {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Sys { nnn }            => write!(f, "SYS  {nnn:03X}"),
            Self::ClearScreen            => write!(f, "CLS"),
            Self::Return                 => write!(f, "RET"),
            Self::Jump { nnn }           => write!(f, "JP   {nnn:03X}"),
            Self::Call { nnn }           => write!(f, "CALL {nnn:03X}"),
            Self::SkipEqByte { x, kk }   => write!(f, "SE   V{x:X}, {kk:02X}"),
            Self::SkipNotEqByte { x, kk } => write!(f, "SNE  V{x:X}, {kk:02X}"),
            Self::SkipEq { x, y }        => write!(f, "SE   V{x:X}, V{y:X}"),
            Self::LoadByte { x, kk }     => write!(f, "LD   V{x:X}, {kk:02X}"),
            Self::AddByte { x, kk }      => write!(f, "ADD  V{x:X}, {kk:02X}"),
            Self::Load { x, y }          => write!(f, "LD   V{x:X}, V{y:X}"),
            Self::Or { x, y }            => write!(f, "OR   V{x:X}, V{y:X}"),
            Self::And { x, y }           => write!(f, "AND  V{x:X}, V{y:X}"),
            Self::Xor { x, y }           => write!(f, "XOR  V{x:X}, V{y:X}"),
            Self::Add { x, y }           => write!(f, "ADD  V{x:X}, V{y:X}"),
            Self::Sub { x, y }           => write!(f, "SUB  V{x:X}, V{y:X}"),
            Self::ShiftRight { x }       => write!(f, "SHR  V{x:X}"),
            Self::SubN { x, y }          => write!(f, "SUBN V{x:X}, V{y:X}"),
            Self::ShiftLeft { x }        => write!(f, "SHL  V{x:X}"),
            Self::SkipNotEq { x, y }     => write!(f, "SNE  V{x:X}, V{y:X}"),
            Self::LoadAddress { nnn }    => write!(f, "LD   I, {nnn:03X}"),
            Self::JumpOffset { nnn }     => write!(f, "JP   V0, {nnn:03X}"),
            Self::Random { x, kk }       => write!(f, "RND  V{x:X}, {kk:02X}"),
            Self::Draw { x, y, n }       => write!(f, "DRW  V{x:X}, V{y:X}, {n:X}"),
            Self::SkipKey { x }          => write!(f, "SKP  V{x:X}"),
            Self::SkipNotKey { x }       => write!(f, "SKNP V{x:X}"),
            Self::LoadDelay { x }        => write!(f, "LD   V{x:X}, DT"),
            Self::WaitKey { x }          => write!(f, "LD   V{x:X}, K"),
            Self::SetDelay { x }         => write!(f, "LD   DT, V{x:X}"),
            Self::SetSound { x }         => write!(f, "LD   ST, V{x:X}"),
            Self::AddAddress { x }       => write!(f, "ADD  I, V{x:X}"),
            Self::LoadGlyph { x }        => write!(f, "LD   F, V{x:X}"),
            Self::StoreBcd { x }         => write!(f, "LD   B, V{x:X}"),
            Self::StoreRegisters { x }   => write!(f, "LD   [I], V{x:X}"),
            Self::LoadRegisters { x }    => write!(f, "LD   V{x:X}, [I]"),
            Self::Unknown(word)          => write!(f, "DW   {word:04X}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_operand_fields() {
        let code = Opcode::from_bytes([0xD1, 0x2F]);
        assert_eq!(code.op(), 0xD);
        assert_eq!(code.x(), 0x1);
        assert_eq!(code.y(), 0x2);
        assert_eq!(code.n(), 0xF);
        assert_eq!(code.kk(), 0x2F);
        assert_eq!(code.nnn(), 0x12F);
    }

    /// Register operands must be small indices, not the raw masked bit pattern.
    #[test]
    fn test_register_indices_are_shifted() {
        assert_eq!(Instr::decode(0x6F42), Instr::LoadByte { x: 0xF, kk: 0x42 });
        assert_eq!(Instr::decode(0xDAB5), Instr::Draw { x: 0xA, y: 0xB, n: 5 });
    }

    #[test]
    fn test_decode_base_set() {
        assert_eq!(Instr::decode(0x00E0), Instr::ClearScreen);
        assert_eq!(Instr::decode(0x00EE), Instr::Return);
        assert_eq!(Instr::decode(0x1234), Instr::Jump { nnn: 0x234 });
        assert_eq!(Instr::decode(0x2FFF), Instr::Call { nnn: 0xFFF });
        assert_eq!(Instr::decode(0xA200), Instr::LoadAddress { nnn: 0x200 });
    }

    #[test]
    fn test_decode_unknown() {
        assert_eq!(Instr::decode(0x5121), Instr::Unknown(0x5121));
        assert_eq!(Instr::decode(0x8128), Instr::Unknown(0x8128));
        assert_eq!(Instr::decode(0xE1FF), Instr::Unknown(0xE1FF));
        assert_eq!(Instr::decode(0xF1FF), Instr::Unknown(0xF1FF));
        assert_eq!(Instr::decode(0x0123), Instr::Sys { nnn: 0x123 });
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(Instr::decode(0xD015).to_string(), "DRW  V0, V1, 5");
        assert_eq!(Instr::decode(0xF355).to_string(), "LD   [I], V3");
        assert_eq!(Instr::decode(0xFFFF).to_string(), "DW   FFFF");
    }
}
