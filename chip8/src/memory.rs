//! Main memory.
use crate::{
    constants::*,
    error::{Chip8Error, Chip8Result},
};

/// Flat, zero initialised RAM.
///
/// The size is chosen at construction and never changes. Every access
/// is bounds checked, so a stray address surfaces as an error instead
/// of a panic.
pub struct Memory {
    ram: Box<[u8]>,
}

impl Memory {
    /// Allocate zeroed memory of the given size.
    ///
    /// The size must cover at least the 12-bit address space.
    pub fn new(size: usize) -> Chip8Result<Self> {
        if size < MEM_SIZE {
            return Err(Chip8Error::InvalidConfig(format!(
                "RAM size must be at least {MEM_SIZE} bytes, got {size}"
            )));
        }

        Ok(Self {
            ram: vec![0; size].into_boxed_slice(),
        })
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.ram.len()
    }

    /// Erase the contents of memory.
    pub fn clear(&mut self) {
        self.ram.fill(0);
    }

    #[inline]
    pub fn read(&self, address: usize) -> Chip8Result<u8> {
        self.ram
            .get(address)
            .copied()
            .ok_or(Chip8Error::MemoryOutOfBounds {
                address,
                size: self.size(),
            })
    }

    #[inline]
    pub fn write(&mut self, address: usize, value: u8) -> Chip8Result<()> {
        let size = self.size();
        match self.ram.get_mut(address) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Chip8Error::MemoryOutOfBounds { address, size }),
        }
    }

    /// Borrow `len` bytes starting at `address`.
    pub fn slice(&self, address: usize, len: usize) -> Chip8Result<&[u8]> {
        let end = self.check_range(address, len)?;
        Ok(&self.ram[address..end])
    }

    /// Mutably borrow `len` bytes starting at `address`.
    pub fn slice_mut(&mut self, address: usize, len: usize) -> Chip8Result<&mut [u8]> {
        let end = self.check_range(address, len)?;
        Ok(&mut self.ram[address..end])
    }

    /// Fetch the big-endian instruction word at the program counter.
    pub fn fetch(&self, pc: usize) -> Chip8Result<u16> {
        match self.ram.get(pc..pc.saturating_add(2)) {
            Some(&[a, b]) => Ok(u16::from_be_bytes([a, b])),
            _ => Err(Chip8Error::ProgramCounterOutOfBounds {
                pc,
                size: self.size(),
            }),
        }
    }

    /// Copy a program into memory starting at the load address.
    ///
    /// Memory is left untouched when the program doesn't fit.
    pub fn load_program(&mut self, load_address: Address, bytecode: &[u8]) -> Chip8Result<()> {
        let start = load_address as usize;
        if start > self.size() {
            return Err(Chip8Error::MemoryOutOfBounds {
                address: start,
                size: self.size(),
            });
        }

        let capacity = self.size() - start;
        if bytecode.len() > capacity {
            return Err(Chip8Error::ProgramTooLarge {
                size: bytecode.len(),
                capacity,
            });
        }

        self.ram[start..start + bytecode.len()].copy_from_slice(bytecode);

        Ok(())
    }

    /// Copy the builtin font into low memory.
    pub fn load_font(&mut self) {
        let start = FONTSET_START as usize;
        self.ram[start..start + FONTSET.len()].copy_from_slice(&FONTSET);
    }

    fn check_range(&self, address: usize, len: usize) -> Chip8Result<usize> {
        match address.checked_add(len) {
            Some(end) if end <= self.size() => Ok(end),
            _ => Err(Chip8Error::MemoryOutOfBounds {
                address: address.saturating_add(len.saturating_sub(1)),
                size: self.size(),
            }),
        }
    }
}
