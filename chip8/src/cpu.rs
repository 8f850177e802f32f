//! Register file and call stack.
use std::fmt::{self, Write};

use crate::{
    constants::*,
    error::{Chip8Error, Chip8Result},
};

/// Core register state for a chip8 interpreter.
#[derive(Debug, Clone)]
pub struct Chip8Cpu {
    /// Program counter pointing to the current position in the bytecode.
    pub(crate) pc: usize,
    /// Stack pointer, the number of return addresses on the stack.
    ///
    /// Points one past the top entry, so zero means empty.
    pub(crate) sp: usize,
    /// General purpose registers for temporary values.
    ///
    /// Register 16 (VF) is used for either the carry flag or borrow switch depending on opcode.
    pub(crate) registers: [u8; REGISTER_COUNT],
    /// Pointer register used for temporarily storing an address. Since addresses are 12 bits, only the
    /// lowest (rightmost) bits are used.
    pub(crate) address: Address,
    /// Stack of return pointers used for jumping when a routine call finishes.
    pub(crate) stack: [Address; STACK_SIZE],
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        Self {
            pc: 0,
            sp: 0,
            registers: [0; REGISTER_COUNT],
            address: 0,
            stack: [0; STACK_SIZE],
        }
    }
}

impl Chip8Cpu {
    pub fn new() -> Self {
        Default::default()
    }

    /// Zero every register and point the program counter at the given address.
    pub(crate) fn reset(&mut self, pc: Address) {
        *self = Self::default();
        self.pc = pc as usize;
    }

    #[inline(always)]
    pub fn pc(&self) -> usize {
        self.pc
    }

    #[inline(always)]
    pub fn sp(&self) -> usize {
        self.sp
    }

    /// Address register I.
    #[inline(always)]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Value of register Vx. Only the lower nibble of the index is used.
    #[inline(always)]
    pub fn v(&self, index: u8) -> u8 {
        self.registers[index as usize & 0xF]
    }

    #[inline(always)]
    pub fn set_v(&mut self, index: u8, value: u8) {
        self.registers[index as usize & 0xF] = value;
    }

    #[inline(always)]
    pub(crate) fn set_flag(&mut self, flag: bool) {
        self.registers[FLAG_REGISTER] = flag as u8;
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.registers
    }

    /// Return addresses currently on the stack, bottom first.
    pub fn stack(&self) -> &[Address] {
        &self.stack[..self.sp]
    }

    /// Push a return address.
    ///
    /// Nothing is modified when the stack is full.
    pub fn push(&mut self, return_address: Address) -> Chip8Result<()> {
        if self.sp >= STACK_SIZE {
            return Err(Chip8Error::StackOverflow { pc: self.pc });
        }

        self.stack[self.sp] = return_address;
        self.sp += 1;

        Ok(())
    }

    /// Pop the most recent return address.
    ///
    /// Nothing is modified when the stack is empty.
    pub fn pop(&mut self) -> Chip8Result<Address> {
        if self.sp == 0 {
            return Err(Chip8Error::StackUnderflow { pc: self.pc });
        }

        self.sp -= 1;
        let return_address = self.stack[self.sp];
        self.stack[self.sp] = 0;

        Ok(return_address)
    }

    /// Human readable listing of the registers and stack.
    pub fn dump_registers(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        writeln!(buf, "PC: {:04X}  I: {:04X}  SP: {:X}", self.pc, self.address, self.sp)?;
        for (i, v) in self.registers.iter().enumerate() {
            write!(buf, "V{i:X}: {v:02X}")?;
            if i % 8 == 7 {
                writeln!(buf)?;
            } else {
                write!(buf, "  ")?;
            }
        }
        write!(buf, "stack:")?;
        for addr in self.stack() {
            write!(buf, " {addr:04X}")?;
        }

        Ok(buf)
    }
}
