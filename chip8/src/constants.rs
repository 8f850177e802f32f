//! Constant values of the Chip-8 architecture.

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 0x10; // 16

/// Index of register VF, which doubles as the carry, borrow and collision flag.
pub const FLAG_REGISTER: usize = 0xF;

/// The lower memory space was historically used for the interpreter itself,
/// but is now used for fonts.
pub const MEM_START: Address = 0x200; // 512

/// Smallest amount of RAM the VM accepts, being the full 12-bit address space.
pub const MEM_SIZE: usize = 0x1000; // 4096

/// Mask for the 12-bit address space.
pub const ADDRESS_MASK: u16 = 0x0FFF;

/// Levels of nesting allowed in the call stack.
pub const STACK_SIZE: usize = 0x10; // 16

/// Standard display resolution.
pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;

/// Extended (SUPER-CHIP) display resolution.
pub const EXTENDED_DISPLAY_WIDTH: usize = 128;
pub const EXTENDED_DISPLAY_HEIGHT: usize = 64;

/// Sprites are always 8 pixels wide, one byte per row.
pub const SPRITE_WIDTH: usize = 8;

/// Number of clock cycles in a second that delay timers count down.
pub const DELAY_FREQUENCY: u64 = 60;

/// Default instruction rate of the driver.
pub const DEFAULT_CLOCK_FREQUENCY: u64 = 500;

/// Number of nanoseconds in a second
#[doc(hidden)]
pub const NANOS_IN_SECOND: u64 = 1_000_000_000;

/// Number of keys ob the keyboard (0x0-0xF)
pub const KEY_COUNT: u8 = 16;

/// Location in memory where the builtin font is loaded.
pub const FONTSET_START: Address = 0x000;

/// Number of bytes (rows) in a single font glyph.
pub const FONTSET_HEIGHT: usize = 5;

/// Builtin hexadecimal font, glyphs `0` through `F`, each 4 pixels wide and 5 rows high.
#[rustfmt::skip]
pub const FONTSET: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Type for storing the 12-bit memory addresses.
pub type Address = u16;
