//! Keyboard input latch.
use std::sync::{
    atomic::{AtomicU16, Ordering},
    Arc,
};

use crate::constants::*;

/// Snapshot of the 16 key states. Pressed is a 1 bit, released is a 0 bit.
pub type KeyState = u16;

/// Latest-value-wins handoff of keyboard state.
///
/// The whole keypad is a single 16-bit word, so readers always observe a
/// complete snapshot. Clones share the same state, which lets an input
/// thread hold one handle while the VM holds another.
#[derive(Debug, Clone, Default)]
pub struct KeyLatch(Arc<AtomicU16>);

impl KeyLatch {
    pub fn new() -> Self {
        Default::default()
    }

    /// Set the state of a single key.
    pub fn set_key_state(&self, key: KeyCode, pressed: bool) {
        let mask = 1 << key.as_u8();
        if pressed {
            self.0.fetch_or(mask, Ordering::AcqRel);
        } else {
            self.0.fetch_and(!mask, Ordering::AcqRel);
        }
    }

    /// Replace the state of all keys at once.
    pub fn replace(&self, state: KeyState) {
        self.0.store(state, Ordering::Release);
    }

    /// Release all keys.
    pub fn clear(&self) {
        self.replace(0);
    }

    #[inline]
    pub fn snapshot(&self) -> Keys {
        Keys(self.0.load(Ordering::Acquire))
    }
}

/// Immutable copy of the keypad taken from a [`KeyLatch`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Keys(pub KeyState);

impl Keys {
    /// Whether the key with the given id is held down.
    ///
    /// Ids outside of the keypad are never pressed.
    #[inline]
    pub fn is_pressed(&self, key_id: u8) -> bool {
        key_id < KEY_COUNT && self.0 & (1 << key_id) != 0
    }

    /// Check whether any key is pressed down.
    #[inline(always)]
    pub fn any(&self) -> bool {
        self.0 != 0
    }

    /// Retrieve the value of the first key that is pressed down.
    #[inline]
    pub fn first(&self) -> Option<KeyCode> {
        if self.any() {
            KeyCode::try_from(self.0.trailing_zeros() as u8).ok()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8"))]
#[repr(u8)]
pub enum KeyCode {
    Key0 = 0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF = 0xF,
}

impl KeyCode {
    #[inline(always)]
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let key_id = self.as_u8();
        write!(f, "k{key_id:x}")
    }
}

impl From<KeyCode> for u8 {
    fn from(keycode: KeyCode) -> Self {
        keycode.as_u8()
    }
}

impl TryFrom<u8> for KeyCode {
    type Error = InvalidKeyCode;

    fn try_from(key_id: u8) -> Result<Self, Self::Error> {
        match key_id {
            0 => Ok(Self::Key0),
            1 => Ok(Self::Key1),
            2 => Ok(Self::Key2),
            3 => Ok(Self::Key3),
            4 => Ok(Self::Key4),
            5 => Ok(Self::Key5),
            6 => Ok(Self::Key6),
            7 => Ok(Self::Key7),
            8 => Ok(Self::Key8),
            9 => Ok(Self::Key9),
            10 => Ok(Self::KeyA),
            11 => Ok(Self::KeyB),
            12 => Ok(Self::KeyC),
            13 => Ok(Self::KeyD),
            14 => Ok(Self::KeyE),
            15 => Ok(Self::KeyF),
            _ => Err(InvalidKeyCode(key_id)),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidKeyCode(pub u8);

impl std::error::Error for InvalidKeyCode {}

impl std::fmt::Display for InvalidKeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "keycode must be in range 0 <= keycode < 16, got {}",
            self.0
        )
    }
}
