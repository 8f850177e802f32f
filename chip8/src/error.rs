//! Result and errors.
use std::fmt::{self, Display, Formatter};

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug)]
pub enum Chip8Error {
    /// Attempt to load a bytecode program that can't fit in memory.
    ProgramTooLarge { size: usize, capacity: usize },
    /// Program counter drifted past the end of memory.
    ProgramCounterOutOfBounds { pc: usize, size: usize },
    /// Subroutine call with a full call stack.
    StackOverflow { pc: usize },
    /// Return from subroutine with an empty call stack.
    StackUnderflow { pc: usize },
    /// Memory access, derived from the address register, that falls outside of RAM.
    MemoryOutOfBounds { address: usize, size: usize },
    /// VM configuration that can't be used to construct a machine.
    InvalidConfig(String),
    Io(std::io::Error),
    Fmt(fmt::Error),
}

impl Chip8Error {
    /// Whether the error is raised by the interpreter loop, as opposed to loading or setup.
    pub fn is_runtime(&self) -> bool {
        matches!(
            self,
            Self::ProgramCounterOutOfBounds { .. }
                | Self::StackOverflow { .. }
                | Self::StackUnderflow { .. }
                | Self::MemoryOutOfBounds { .. }
        )
    }
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProgramTooLarge { size, capacity } => write!(
                f,
                "program too large for VM memory: {size} bytes, {capacity} available"
            ),
            Self::ProgramCounterOutOfBounds { pc, size } => write!(
                f,
                "runtime error: program counter {pc:04X} out of bounds for {size} bytes of memory"
            ),
            Self::StackOverflow { pc } => write!(f, "runtime error: call stack overflow at {pc:04X}"),
            Self::StackUnderflow { pc } => {
                write!(f, "runtime error: call stack underflow at {pc:04X}")
            }
            Self::MemoryOutOfBounds { address, size } => write!(
                f,
                "runtime error: memory address {address:04X} out of bounds for {size} bytes of memory"
            ),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Fmt(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Chip8Error {}

impl From<fmt::Error> for Chip8Error {
    fn from(err: fmt::Error) -> Self {
        Chip8Error::Fmt(err)
    }
}

impl From<std::io::Error> for Chip8Error {
    fn from(err: std::io::Error) -> Self {
        Chip8Error::Io(err)
    }
}
