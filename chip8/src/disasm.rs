//! Disassembler.
use std::fmt::{self, Write as FmtWrite};

use crate::{
    bytecode::{Instr, Opcode},
    constants::*,
};

/// Listing of a program's bytecode as it would be laid out in memory.
///
/// The disassembler is linear and doesn't separate code from data, so
/// sprite bytes show up as whatever instruction they happen to encode.
pub struct Disassembler<'a> {
    bytecode: &'a [u8],
    /// Address where the first byte would be loaded.
    origin: Address,
}

impl<'a> Disassembler<'a> {
    pub fn new(bytecode: &'a [u8]) -> Self {
        Self::with_origin(bytecode, MEM_START)
    }

    pub fn with_origin(bytecode: &'a [u8], origin: Address) -> Self {
        Self { bytecode, origin }
    }

    /// Iterate the instructions along with their addresses.
    pub fn instructions(&self) -> impl Iterator<Item = (usize, Opcode, Instr)> + '_ {
        self.bytecode
            .chunks_exact(2)
            .enumerate()
            .map(|(i, pair)| {
                let code = Opcode::from_bytes([pair[0], pair[1]]);
                (self.origin as usize + i * 2, code, Instr::decode(code.0))
            })
    }

    /// Write the whole listing to the given writer.
    pub fn disassemble<W: FmtWrite>(&self, w: &mut W) -> fmt::Result {
        for (addr, code, instr) in self.instructions() {
            writeln!(w, "{addr:04X}: {:04X}  {instr}", code.0)?;
        }

        // Instructions are always 2 bytes, a trailing byte can only be data.
        if let [.., last] = self.bytecode {
            if self.bytecode.len() % 2 == 1 {
                let addr = self.origin as usize + self.bytecode.len() - 1;
                writeln!(w, "{addr:04X}: {last:02X}    DB   {last:02X}")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    #[rustfmt::skip]
    fn test_listing() {
        let rom = [
            0x60, 0x00, // LD v0, 0
            0xA2, 0x06, // LD I, 206
            0xD0, 0x01, // DRW v0, v0, 1
            0xF0,
        ];

        let mut buf = String::new();
        Disassembler::new(&rom).disassemble(&mut buf).unwrap();

        let lines: Vec<&str> = buf.lines().collect();
        assert_eq!(lines, vec![
            "0200: 6000  LD   V0, 00",
            "0202: A206  LD   I, 206",
            "0204: D001  DRW  V0, V0, 1",
            "0206: F0    DB   F0",
        ]);
    }

    #[test]
    fn test_origin() {
        let dis = Disassembler::with_origin(&[0x00, 0xE0], 0x000);
        let (addr, _, instr) = dis.instructions().next().unwrap();
        assert_eq!(addr, 0);
        assert_eq!(instr, Instr::ClearScreen);
    }
}
