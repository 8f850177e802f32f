mod bytecode;
mod clock;
pub mod constants;
mod cpu;
mod disasm;
mod display;
mod driver;
mod error;
mod keypad;
mod memory;
mod timer;
mod vm;

pub use self::{
    bytecode::{Instr, Opcode},
    display::{DisplayMode, Framebuffer},
    keypad::{InvalidKeyCode, KeyCode, KeyLatch, Keys},
    vm::Hz,
};

/// Version of this implementation.
pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use super::{
        cpu::Chip8Cpu,
        disasm::Disassembler,
        driver::{Driver, Update},
        error::{Chip8Error, Chip8Result},
        memory::Memory,
        timer::TimerPair,
        vm::{Chip8Conf, Chip8Vm, Flow, StackPolicy},
    };
}
