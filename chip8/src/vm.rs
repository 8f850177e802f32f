//! Virtual machine.
use std::{
    fmt::{self, Write},
    time::Duration,
};

use log::{debug, error, info, trace, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    bytecode::Instr,
    constants::*,
    cpu::Chip8Cpu,
    display::{DisplayMode, Framebuffer},
    error::{Chip8Error, Chip8Result},
    keypad::{KeyCode, KeyLatch},
    memory::Memory,
    timer::TimerPair,
};

pub struct Chip8Vm {
    cpu: Chip8Cpu,
    memory: Memory,
    display: Framebuffer,
    timers: TimerPair,
    keys: KeyLatch,
    rng: StdRng,
    /// Interrupt for VM loop.
    trap: bool,
    conf: Chip8Conf,
}

impl Chip8Vm {
    pub fn new(conf: Chip8Conf) -> Chip8Result<Self> {
        let memory = Memory::new(conf.ram_size)?;
        if conf.load_address as usize >= conf.ram_size {
            return Err(Chip8Error::InvalidConfig(format!(
                "load address {:04X} is outside of {} bytes of RAM",
                conf.load_address, conf.ram_size
            )));
        }

        let mut cpu = Chip8Cpu::new();
        cpu.reset(conf.load_address);

        let rng = match conf.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Chip8Vm {
            cpu,
            memory,
            display: Framebuffer::new(conf.display_mode),
            timers: TimerPair::new(),
            keys: KeyLatch::new(),
            rng,
            trap: false,
            conf,
        })
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    /// Load a program into fresh memory and reset the machine for execution.
    ///
    /// The VM is left untouched if the program doesn't fit.
    pub fn load_program(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        // Start with clean memory to avoid leaking previous program.
        let mut memory = Memory::new(self.conf.ram_size)?;
        memory.load_font();
        memory.load_program(self.conf.load_address, bytecode)?;

        self.memory = memory;
        self.cpu.reset(self.conf.load_address);
        self.display.clear();
        self.timers = TimerPair::new();
        self.trap = false;

        info!(
            "loaded {} byte program at {:04X}",
            bytecode.len(),
            self.conf.load_address
        );

        Ok(())
    }

    pub fn cpu(&self) -> &Chip8Cpu {
        &self.cpu
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Read-only view of the framebuffer for presentation.
    pub fn display(&self) -> &Framebuffer {
        &self.display
    }

    pub fn timers(&self) -> &TimerPair {
        &self.timers
    }

    /// Polled by the audio collaborator. Non-zero means the tone should play.
    pub fn sound_timer(&self) -> u8 {
        self.timers.sound()
    }

    pub fn delay_timer(&self) -> u8 {
        self.timers.delay()
    }

    /// Handle to the keyboard input latch.
    ///
    /// Clone it to hand keyboard state over from another thread.
    pub fn keys(&self) -> &KeyLatch {
        &self.keys
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Flow {
    Ok,
    /// Program counter has jumped to a new address.
    ///
    /// This is useful for the caller to avoid being
    /// blocked on infinite or long running loops.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 1nnn (`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    /// The framebuffer was modified.
    Draw,
    /// The sound timer was set.
    Sound,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`), which stops
    /// execution until a key is pressed, and loads the key value into `Vx`.
    KeyWait,
    /// An interrupt was requested. No instruction was executed.
    Halted,
}

/// Handling of call stack faults.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StackPolicy {
    /// Stop the interpreter with an error.
    #[default]
    Halt,
    /// Log a warning and skip the offending `CALL` or `RET`.
    Ignore,
}

/// VM Configuration Parameters.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Chip8Conf {
    /// Size of RAM in bytes. Must cover the 12-bit address space.
    pub ram_size: usize,
    /// Address where programs are loaded, and where execution starts.
    pub load_address: Address,
    pub display_mode: DisplayMode,
    pub stack_policy: StackPolicy,
    /// Instruction rate used by the [`Driver`](crate::prelude::Driver).
    pub clock_frequency: Hz,
    /// Fixed seed for `RND`, for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for Chip8Conf {
    fn default() -> Self {
        Self {
            ram_size: MEM_SIZE,
            load_address: MEM_START,
            display_mode: DisplayMode::Standard,
            stack_policy: StackPolicy::Halt,
            clock_frequency: Hz(DEFAULT_CLOCK_FREQUENCY),
            rng_seed: None,
        }
    }
}

/// CPU clock frequency, in hertz (per second)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Hz(pub u64);

impl From<Hz> for Duration {
    fn from(freq: Hz) -> Self {
        if freq.0 == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(NANOS_IN_SECOND / freq.0)
        }
    }
}

/// Interpreter
impl Chip8Vm {
    /// Sets the keyboard key input state.
    pub fn set_key(&mut self, key: KeyCode, pressed: bool) {
        self.keys.set_key_state(key, pressed);
    }

    /// Clear the keyboard input state, setting all keys to up.
    pub fn clear_keys(&mut self) {
        self.keys.clear()
    }

    /// Request the interpreter to stop before the next instruction.
    pub fn interrupt(&mut self) {
        self.trap = true;
    }

    /// Clear a pending interrupt.
    pub fn resume(&mut self) {
        self.trap = false;
    }

    pub fn is_interrupted(&self) -> bool {
        self.trap
    }

    /// Count down the delay and sound timers.
    ///
    /// Must be called at 60 Hz by the driver, independent of the instruction rate.
    pub fn tick_timers(&mut self) {
        self.timers.tick();
    }

    /// Execute instructions until the count is reached, or an interrupt is requested.
    pub fn run_steps(&mut self, step_count: usize) -> Chip8Result<Flow> {
        let mut control_flow = Flow::Ok;

        for _ in 0..step_count {
            control_flow = self.step()?;
            if control_flow == Flow::Halted {
                break;
            }
        }

        Ok(control_flow)
    }

    /// Fetch, decode and execute exactly one instruction.
    ///
    /// An instruction that fails leaves the machine in the state it was
    /// before the instruction.
    pub fn step(&mut self) -> Chip8Result<Flow> {
        if self.trap {
            // Interrupt signal is set.
            return Ok(Flow::Halted);
        }

        let pc = self.cpu.pc;
        let word = match self.memory.fetch(pc) {
            Ok(word) => word,
            Err(err) => return Err(self.fatal(err)),
        };
        let instr = Instr::decode(word);
        trace!("{pc:04X}: {word:04X}  {instr}");

        match self.exec(instr, pc) {
            Ok(flow) => Ok(flow),
            Err(err @ (Chip8Error::StackOverflow { .. } | Chip8Error::StackUnderflow { .. }))
                if self.conf.stack_policy == StackPolicy::Ignore =>
            {
                warn!("{err}, instruction skipped");
                self.cpu.pc = pc + 2;
                Ok(Flow::Ok)
            }
            Err(err) => Err(self.fatal(err)),
        }
    }

    /// Report a fatal error through the diagnostics log.
    fn fatal(&self, err: Chip8Error) -> Chip8Error {
        error!("{err}");
        match self.dump_registers() {
            Ok(dump) => debug!("registers:\n{dump}"),
            Err(fmt_err) => debug!("failed to dump registers: {fmt_err}"),
        }
        err
    }

    fn exec(&mut self, instr: Instr, pc: usize) -> Chip8Result<Flow> {
        use Instr as I;

        let mut next = pc + 2;
        let mut control_flow = Flow::Ok;

        match instr {
            // 0nnn (SYS addr)
            //
            // Machine code routines of the original interpreter. Ignored.
            I::Sys { nnn } => {
                trace!("ignored SYS {nnn:03X}");
            }
            // 00E0 (CLS)
            //
            // Clear display
            I::ClearScreen => {
                self.display.clear();
                control_flow = Flow::Draw;
            }
            // 00EE (RET)
            //
            // Return from a subroutine.
            // Set the program counter to the value at the top of the stack.
            I::Return => {
                next = self.cpu.pop()? as usize;
                control_flow = Flow::Jump;
            }
            // 1nnn (JP addr)
            //
            // Jump to address.
            I::Jump { nnn } => {
                next = nnn as usize;
                control_flow = Flow::Jump;
            }
            // 2nnn (CALL addr)
            //
            // Call subroutine at nnn. The return address is the instruction
            // after the call.
            I::Call { nnn } => {
                self.cpu.push(next as Address)?;
                next = nnn as usize;
                control_flow = Flow::Jump;
            }
            // 3xkk (SE Vx, byte)
            //
            // Skip the next instruction if register VX equals value kk.
            I::SkipEqByte { x, kk } => {
                if self.cpu.v(x) == kk {
                    next += 2;
                }
            }
            // 4xkk (SNE Vx, byte)
            I::SkipNotEqByte { x, kk } => {
                if self.cpu.v(x) != kk {
                    next += 2;
                }
            }
            // 5xy0 (SE Vx, Vy)
            I::SkipEq { x, y } => {
                if self.cpu.v(x) == self.cpu.v(y) {
                    next += 2;
                }
            }
            // 6xkk (LD Vx, byte)
            //
            // Set register VX to value kk.
            I::LoadByte { x, kk } => {
                self.cpu.set_v(x, kk);
            }
            // 7xkk (ADD Vx, byte)
            //
            // Add value kk to register VX. Carry flag is not set.
            I::AddByte { x, kk } => {
                self.cpu.set_v(x, self.cpu.v(x).wrapping_add(kk));
            }
            I::Load { x, y } => self.cpu.set_v(x, self.cpu.v(y)),
            I::Or { x, y } => self.cpu.set_v(x, self.cpu.v(x) | self.cpu.v(y)),
            I::And { x, y } => self.cpu.set_v(x, self.cpu.v(x) & self.cpu.v(y)),
            I::Xor { x, y } => self.cpu.set_v(x, self.cpu.v(x) ^ self.cpu.v(y)),
            // 8xy4 (ADD Vx, Vy)
            //
            // VF is set to 1 on overflow, else 0.
            // The flag is written last, so it survives when VF is the destination.
            I::Add { x, y } => {
                let (result, carry) = self.cpu.v(x).overflowing_add(self.cpu.v(y));
                self.cpu.set_v(x, result);
                self.cpu.set_flag(carry);
            }
            // 8xy5 (SUB Vx, Vy)
            //
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            I::Sub { x, y } => {
                let (result, borrow) = self.cpu.v(x).overflowing_sub(self.cpu.v(y));
                self.cpu.set_v(x, result);
                self.cpu.set_flag(!borrow);
            }
            // 8xy6 (SHR Vx)
            //
            // VF is set to the bit shifted out.
            I::ShiftRight { x } => {
                let value = self.cpu.v(x);
                self.cpu.set_v(x, value >> 1);
                self.cpu.set_flag(value & 1 != 0);
            }
            // 8xy7 (SUBN Vx, Vy)
            //
            // Subtracts VX from VY, and stores the result in VX.
            I::SubN { x, y } => {
                let (result, borrow) = self.cpu.v(y).overflowing_sub(self.cpu.v(x));
                self.cpu.set_v(x, result);
                self.cpu.set_flag(!borrow);
            }
            // 8xyE (SHL Vx)
            I::ShiftLeft { x } => {
                let value = self.cpu.v(x);
                self.cpu.set_v(x, value << 1);
                self.cpu.set_flag(value & 0x80 != 0);
            }
            // 9xy0 (SNE Vx, Vy)
            I::SkipNotEq { x, y } => {
                if self.cpu.v(x) != self.cpu.v(y) {
                    next += 2;
                }
            }
            // Annn (LD I, addr)
            //
            // Set address register I to value nnn.
            I::LoadAddress { nnn } => {
                self.cpu.address = nnn;
            }
            // Bnnn (JP V0, addr)
            I::JumpOffset { nnn } => {
                next = nnn as usize + self.cpu.v(0) as usize;
                control_flow = Flow::Jump;
            }
            // Cxkk (RND Vx, byte)
            //
            // Set register VX to the result of bitwise AND between a random number and kk.
            I::Random { x, kk } => {
                let value: u8 = self.rng.gen();
                self.cpu.set_v(x, value & kk);
            }
            // Dxyn (DRW Vx, Vy, nibble)
            //
            // Draw sprite to the display buffer, at coordinate as per registers Vx and Vy.
            // Sprite is encoded as 8 pixels wide, n pixels high, stored in bits located in
            // memory pointed to by address register I.
            //
            // If the drawing operation erases existing pixels in the display buffer, register VF is set to
            // 1, and set to 0 if no display bits are unset. This is used for collision detection.
            I::Draw { x, y, n } => {
                let sprite = self.memory.slice(self.cpu.address as usize, n as usize)?;
                let is_erased = self.display.draw_sprite(self.cpu.v(x), self.cpu.v(y), sprite);
                self.cpu.set_flag(is_erased);
                control_flow = Flow::Draw;
            }
            // Ex9E (SKP Vx)
            I::SkipKey { x } => {
                if self.keys.snapshot().is_pressed(self.cpu.v(x)) {
                    next += 2;
                }
            }
            // ExA1 (SKNP Vx)
            I::SkipNotKey { x } => {
                if !self.keys.snapshot().is_pressed(self.cpu.v(x)) {
                    next += 2;
                }
            }
            // Fx07 (LD Vx, DT)
            I::LoadDelay { x } => {
                self.cpu.set_v(x, self.timers.delay());
            }
            // Fx0A (LD Vx, K)
            //
            // Wait for a key press, store the value of the key in Vx.
            // All execution stops until a key is pressed.
            I::WaitKey { x } => match self.keys.snapshot().first() {
                Some(key) => self.cpu.set_v(x, key.as_u8()),
                None => {
                    // keep the program counter in place to stall the machine
                    next = pc;
                    control_flow = Flow::KeyWait;
                }
            },
            // Fx15 (LD DT, Vx)
            I::SetDelay { x } => {
                self.timers.set_delay(self.cpu.v(x));
            }
            // Fx18 (LD ST, Vx)
            I::SetSound { x } => {
                self.timers.set_sound(self.cpu.v(x));
                control_flow = Flow::Sound;
            }
            // Fx1E (ADD I, Vx)
            I::AddAddress { x } => {
                self.cpu.address = self.cpu.address.wrapping_add(self.cpu.v(x) as u16);
            }
            // Fx29 (LD F, Vx)
            //
            // Set I = location of sprite for digit Vx.
            I::LoadGlyph { x } => {
                let digit = (self.cpu.v(x) & 0xF) as Address;
                self.cpu.address = FONTSET_START + digit * FONTSET_HEIGHT as Address;
            }
            // Fx33 (LD B, Vx)
            //
            // Store the binary-coded decimal representation of Vx
            // in the memory locations I, I+1, and I+2.
            I::StoreBcd { x } => {
                let value = self.cpu.v(x);
                let digits = self.memory.slice_mut(self.cpu.address as usize, 3)?;
                digits.copy_from_slice(&[value / 100, value / 10 % 10, value % 10]);
            }
            // Fx55 (LD [I], Vx)
            //
            // Store registers V0 through Vx in memory starting at location I.
            I::StoreRegisters { x } => {
                let count = x as usize + 1;
                let dest = self.memory.slice_mut(self.cpu.address as usize, count)?;
                dest.copy_from_slice(&self.cpu.registers[..count]);
            }
            // Fx65 (LD Vx, [I])
            //
            // Read registers V0 through Vx from memory starting at location I.
            I::LoadRegisters { x } => {
                let count = x as usize + 1;
                let src = self.memory.slice(self.cpu.address as usize, count)?;
                self.cpu.registers[..count].copy_from_slice(src);
            }
            // Unsupported operation.
            I::Unknown(word) => {
                warn!("unknown opcode {word:04X} at {pc:04X}, skipped");
            }
        }

        self.cpu.pc = next;

        Ok(control_flow)
    }
}

/// Troubleshooting
impl Chip8Vm {
    /// Returns the contents of the memory as a human readable string.
    pub fn dump_ram(&self, count: usize) -> Result<String, fmt::Error> {
        let start = self.conf.load_address as usize;
        let end = (start + count).min(self.memory.size());
        let mut buf = String::new();

        let mut i = start;
        while i + 1 < end {
            // Bounds were clamped above.
            let word = self.memory.fetch(i).map_err(|_| fmt::Error)?;
            writeln!(buf, "{i:04X}: {word:04X}")?;
            i += 2;
        }

        Ok(buf)
    }

    pub fn dump_display(&self) -> Result<String, fmt::Error> {
        self.display.dump()
    }

    pub fn dump_keys(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();
        let keys = self.keys.snapshot();

        if keys.any() {
            write!(buf, "keys: ")?;
            for i in 0..KEY_COUNT {
                if keys.is_pressed(i) {
                    write!(buf, "k{i:x}")?;
                }
            }
        }

        Ok(buf)
    }

    /// Registers, stack and both timers.
    pub fn dump_registers(&self) -> Result<String, fmt::Error> {
        let mut buf = self.cpu.dump_registers()?;
        write!(buf, "\nDT: {:02X}  ST: {:02X}", self.timers.delay(), self.timers.sound())?;
        Ok(buf)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn vm_with(program: &[u8]) -> Chip8Vm {
        let mut vm = Chip8Vm::new(Chip8Conf {
            rng_seed: Some(7),
            ..Chip8Conf::default()
        })
        .unwrap();
        vm.load_program(program).unwrap();
        vm
    }

    const START: usize = MEM_START as usize;

    #[test]
    fn test_clock_hz() {
        let interval: Duration = Hz(60).into();
        assert_eq!(interval.as_millis(), 16);
        assert_eq!(Duration::from(Hz(0)), Duration::ZERO);
    }

    #[test]
    fn test_invalid_config() {
        let conf = Chip8Conf {
            ram_size: 1024,
            ..Chip8Conf::default()
        };
        assert!(matches!(Chip8Vm::new(conf), Err(Chip8Error::InvalidConfig(_))));

        let conf = Chip8Conf {
            load_address: 0x1000,
            ..Chip8Conf::default()
        };
        assert!(matches!(Chip8Vm::new(conf), Err(Chip8Error::InvalidConfig(_))));
    }

    #[test]
    fn test_font_loaded() {
        let vm = vm_with(&[]);
        assert_eq!(vm.memory.slice(0, FONTSET.len()).unwrap(), &FONTSET[..]);
    }

    /// Fx0A (LD Vx, K)
    ///
    /// Wait for a keypress, then store the key value in Vx.
    /// The VM must stall while waiting, and signal the state to the outer executer.
    #[test]
    #[rustfmt::skip]
    fn test_key_wait() {
        let mut vm = vm_with(&[
            0xF1, 0x0A, // LD v1, K
            0x62, 0x42  // LD v2, 0x42  ; sentinal
        ]);

        // machine must stall
        for _ in 0..6 {
            assert_eq!(vm.step().unwrap(), Flow::KeyWait);
            assert_eq!(vm.cpu.pc, START);
        }

        // machine has yielded, waiting for any key to be pressed.
        vm.set_key(KeyCode::Key5, true);

        // machine will now advance
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, START + 2);
        assert_eq!(vm.cpu.registers[1], 0x05);

        // Ensure the machine is continuing
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, START + 4);
        assert_eq!(vm.cpu.registers[2], 0x42); // sentinal
    }

    /// The flag register must hold exactly 1 or 0.
    #[test]
    #[rustfmt::skip]
    fn test_flag_is_one_or_zero() {
        let mut vm = vm_with(&[
            0x60, 0xFF, // LD v0, FF
            0x61, 0x02, // LD v1, 02
            0x80, 0x14, // ADD v0, v1   ; carry
            0x80, 0x14, // ADD v0, v1   ; no carry
            0x6F, 0x7F, // LD vF, 7F
            0x8F, 0x0E, // SHL vF       ; no bit shifted out
        ]);
        vm.run_steps(3).unwrap();
        assert_eq!(vm.cpu.registers[0xF], 1);

        vm.step().unwrap();
        assert_eq!(vm.cpu.registers[0xF], 0);

        vm.run_steps(2).unwrap();
        assert_eq!(vm.cpu.registers[0xF], 0);
    }

    #[test]
    #[rustfmt::skip]
    fn test_draw_collision() {
        // Draw two pixels next to each other.
        // The zero bits of the second draw must not erase
        // the pixels of the first draw
        //
        // draw sprite 1
        // ____####, vf == 0
        //
        // draw sprite 2
        // ########, vf == 0
        let mut vm = vm_with(&[
            0xA2, 0x0E, // LD I, .sprite
            0x60, 0x04, // LD v0, 4
            0x61, 0x00, // LD v1, 0
            0xD0, 0x11, // DRW v0, v1, 1
            0x60, 0x00, // LD v0, 0
            0xD0, 0x11, // DRW v0, v1, 1
            0x12, 0x0C, // JP self
            0xF0,       // .sprite
        ]);

        vm.run_steps(6).unwrap();

        assert!(vm.display().pixel(4, 0)); // sprite 1
        assert!(vm.display().pixel(0, 0)); // sprite 2
        assert!(!vm.display().pixel(8, 0));
        assert_eq!(vm.cpu.registers[0xF], 0);
    }

    #[test]
    #[rustfmt::skip]
    fn test_arithmetic_flags() {
        let mut vm = vm_with(&[
            0x60, 0xFF, // LD v0, FF
            0x61, 0x02, // LD v1, 02
            0x80, 0x14, // ADD v0, v1
        ]);
        vm.run_steps(3).unwrap();
        assert_eq!(vm.cpu.v(0), 0x01);
        assert_eq!(vm.cpu.v(0xF), 1);

        let mut vm = vm_with(&[
            0x60, 0x01, // LD v0, 01
            0x61, 0x02, // LD v1, 02
            0x80, 0x15, // SUB v0, v1
        ]);
        vm.run_steps(3).unwrap();
        assert_eq!(vm.cpu.v(0), 0xFF);
        assert_eq!(vm.cpu.v(0xF), 0);

        let mut vm = vm_with(&[
            0x60, 0x01, // LD v0, 01
            0x61, 0x02, // LD v1, 02
            0x80, 0x17, // SUBN v0, v1
        ]);
        vm.run_steps(3).unwrap();
        assert_eq!(vm.cpu.v(0), 0x01);
        assert_eq!(vm.cpu.v(0xF), 1);

        let mut vm = vm_with(&[
            0x60, 0x81, // LD v0, 81
            0x80, 0x06, // SHR v0
            0x61, 0x81, // LD v1, 81
            0x81, 0x0E, // SHL v1
        ]);
        vm.run_steps(2).unwrap();
        assert_eq!(vm.cpu.v(0), 0x40);
        assert_eq!(vm.cpu.v(0xF), 1);
        vm.run_steps(2).unwrap();
        assert_eq!(vm.cpu.v(1), 0x02);
        assert_eq!(vm.cpu.v(0xF), 1);
    }

    #[test]
    #[rustfmt::skip]
    fn test_flag_register_as_destination() {
        let mut vm = vm_with(&[
            0x6F, 0xFF, // LD vF, FF
            0x61, 0x01, // LD v1, 01
            0x8F, 0x14, // ADD vF, v1
        ]);
        vm.run_steps(3).unwrap();
        assert_eq!(vm.cpu.v(0xF), 1);
    }

    #[test]
    #[rustfmt::skip]
    fn test_add_byte_wraps() {
        let mut vm = vm_with(&[
            0x63, 0xF0, // LD v3, F0
            0x73, 0x20, // ADD v3, 20
        ]);
        vm.run_steps(2).unwrap();
        assert_eq!(vm.cpu.v(3), ((0xF0 + 0x20) % 256) as u8);
        // ADD byte leaves the flag alone
        assert_eq!(vm.cpu.v(0xF), 0);
    }

    #[test]
    #[rustfmt::skip]
    fn test_skips() {
        let mut vm = vm_with(&[
            0x60, 0x05, // LD v0, 05
            0x30, 0x05, // SE v0, 05
            0x00, 0x00, //   skipped
            0x40, 0x05, // SNE v0, 05
            0x61, 0x05, // LD v1, 05
            0x50, 0x10, // SE v0, v1
            0x00, 0x00, //   skipped
            0x90, 0x10, // SNE v0, v1
            0x62, 0x01, // LD v2, 01
        ]);
        vm.run_steps(7).unwrap();
        assert_eq!(vm.cpu.pc, START + 18);
        assert_eq!(vm.cpu.v(2), 1);
    }

    #[test]
    #[rustfmt::skip]
    fn test_key_skips() {
        let mut vm = vm_with(&[
            0x60, 0x0A, // LD v0, 0A
            0xE0, 0x9E, // SKP v0
            0x00, 0x00, //   skipped
            0xE0, 0xA1, // SKNP v0
        ]);
        vm.set_key(KeyCode::KeyA, true);
        vm.run_steps(3).unwrap();
        assert_eq!(vm.cpu.pc, START + 8);

        vm.clear_keys();
        vm.cpu.pc = START + 6;
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, START + 10);
    }

    #[test]
    #[rustfmt::skip]
    fn test_timers_instructions() {
        let mut vm = vm_with(&[
            0x60, 0x03, // LD v0, 03
            0xF0, 0x15, // LD DT, v0
            0xF0, 0x18, // LD ST, v0
            0xF1, 0x07, // LD v1, DT
        ]);
        vm.run_steps(2).unwrap();
        assert_eq!(vm.step().unwrap(), Flow::Sound);
        assert_eq!(vm.sound_timer(), 3);

        // Timers never count down by executing instructions.
        vm.tick_timers();
        vm.step().unwrap();
        assert_eq!(vm.cpu.v(1), 2);
        assert_eq!(vm.delay_timer(), 2);
    }

    #[test]
    #[rustfmt::skip]
    fn test_bcd_and_register_transfer() {
        let mut vm = vm_with(&[
            0x60, 0xFE, // LD v0, 254
            0xA3, 0x00, // LD I, 300
            0xF0, 0x33, // LD B, v0
            0xF2, 0x65, // LD v2, [I]
            0xA3, 0x10, // LD I, 310
            0xF2, 0x55, // LD [I], v2
        ]);
        vm.run_steps(4).unwrap();
        assert_eq!(vm.memory.slice(0x300, 3).unwrap(), &[2, 5, 4]);
        assert_eq!(&vm.cpu.registers[..3], &[2, 5, 4]);

        vm.run_steps(2).unwrap();
        assert_eq!(vm.memory.slice(0x310, 3).unwrap(), &[2, 5, 4]);
    }

    #[test]
    #[rustfmt::skip]
    fn test_store_out_of_bounds_is_atomic() {
        let mut vm = vm_with(&[
            0xAF, 0xFE, // LD I, FFE
            0xF3, 0x55, // LD [I], v3
        ]);
        vm.step().unwrap();
        let err = vm.step().unwrap_err();
        assert!(matches!(err, Chip8Error::MemoryOutOfBounds { .. }));
        assert_eq!(vm.cpu.pc, START + 2);
        assert_eq!(vm.memory.read(0xFFE).unwrap(), 0);
    }

    #[test]
    #[rustfmt::skip]
    fn test_draw_out_of_bounds_is_atomic() {
        let mut vm = vm_with(&[
            0x6F, 0x07, // LD vF, 07
            0xAF, 0xFC, // LD I, FFC
            0xD0, 0x05, // DRW v0, v0, 5
        ]);
        vm.run_steps(2).unwrap();

        let err = vm.step().unwrap_err();
        assert!(matches!(err, Chip8Error::MemoryOutOfBounds { .. }));
        assert_eq!(vm.cpu.pc, START + 4);
        assert_eq!(vm.cpu.registers[0xF], 0x07);
        assert!(vm.display().pixels().iter().all(|px| !*px));
    }

    #[test]
    #[rustfmt::skip]
    fn test_bcd_out_of_bounds_is_atomic() {
        let mut vm = vm_with(&[
            0x60, 0xFF, // LD v0, FF
            0xAF, 0xFE, // LD I, FFE
            0xF0, 0x33, // LD B, v0
        ]);
        vm.run_steps(2).unwrap();

        let err = vm.step().unwrap_err();
        assert!(matches!(err, Chip8Error::MemoryOutOfBounds { .. }));
        assert_eq!(vm.cpu.pc, START + 4);
        assert_eq!(vm.memory.slice(0xFFE, 2).unwrap(), &[0, 0]);
    }

    #[test]
    #[rustfmt::skip]
    fn test_load_out_of_bounds_is_atomic() {
        let mut vm = vm_with(&[
            0x60, 0x11, // LD v0, 11
            0x61, 0x22, // LD v1, 22
            0xAF, 0xFF, // LD I, FFF
            0xF1, 0x65, // LD v1, [I]
        ]);
        vm.memory.write(0xFFF, 0xAB).unwrap();
        vm.run_steps(3).unwrap();

        let err = vm.step().unwrap_err();
        assert!(matches!(err, Chip8Error::MemoryOutOfBounds { .. }));
        assert_eq!(vm.cpu.pc, START + 6);
        assert_eq!(&vm.cpu.registers[..2], &[0x11, 0x22]);
    }

    #[test]
    #[rustfmt::skip]
    fn test_glyph_address() {
        let mut vm = vm_with(&[
            0x6E, 0x0B, // LD vE, 0B
            0xFE, 0x29, // LD F, vE
            0xF1, 0x1E, // ADD I, v1
        ]);
        vm.run_steps(2).unwrap();
        assert_eq!(vm.cpu.address, 0x0B * 5);
        assert_eq!(vm.memory.slice(vm.cpu.address as usize, 5).unwrap(), &FONTSET[55..60]);
    }

    #[test]
    #[rustfmt::skip]
    fn test_jump_offset_and_random() {
        let mut vm = vm_with(&[
            0x60, 0x04, // LD v0, 04
            0xB2, 0x04, // JP v0, 204
            0x00, 0x00, //
            0x00, 0x00, //
            0xC1, 0x0F, // RND v1, 0F
        ]);
        vm.step().unwrap();
        assert_eq!(vm.step().unwrap(), Flow::Jump);
        assert_eq!(vm.cpu.pc, START + 8);

        vm.step().unwrap();
        assert_eq!(vm.cpu.v(1) & 0xF0, 0);
    }

    #[test]
    fn test_unknown_opcode_is_noop() {
        let mut vm = vm_with(&[0xFF, 0xFF, 0x80, 0x1F]);
        let registers = vm.cpu.registers;

        assert_eq!(vm.step().unwrap(), Flow::Ok);
        assert_eq!(vm.step().unwrap(), Flow::Ok);
        assert_eq!(vm.cpu.pc, START + 4);
        assert_eq!(vm.cpu.registers, registers);
    }

    #[test]
    fn test_interrupt() {
        let mut vm = vm_with(&[0x60, 0x01]);
        vm.interrupt();
        assert_eq!(vm.step().unwrap(), Flow::Halted);
        assert_eq!(vm.cpu.pc, START);

        vm.resume();
        assert_eq!(vm.step().unwrap(), Flow::Ok);
        assert_eq!(vm.cpu.v(0), 1);
    }

    #[test]
    fn test_ignore_stack_faults() {
        let mut vm = Chip8Vm::new(Chip8Conf {
            stack_policy: StackPolicy::Ignore,
            ..Chip8Conf::default()
        })
        .unwrap();
        vm.load_program(&[0x00, 0xEE, 0x60, 0x01]).unwrap();

        assert_eq!(vm.step().unwrap(), Flow::Ok);
        assert_eq!(vm.cpu.pc, START + 2);
        assert_eq!(vm.cpu.sp, 0);
        vm.step().unwrap();
        assert_eq!(vm.cpu.v(0), 1);
    }

    #[test]
    fn test_dumps() {
        let mut vm = vm_with(&[0x60, 0x01, 0x12, 0x02]);
        assert_eq!(vm.dump_ram(4).unwrap(), "0200: 6001\n0202: 1202\n");

        vm.set_key(KeyCode::Key3, true);
        vm.set_key(KeyCode::KeyE, true);
        assert_eq!(vm.dump_keys().unwrap(), "keys: k3ke");

        vm.timers.set_delay(0x3C);
        vm.timers.set_sound(0x05);
        let dump = vm.dump_registers().unwrap();
        assert!(dump.starts_with("PC: 0200"));
        assert!(dump.ends_with("DT: 3C  ST: 05"));
    }
}
