//! Delay and sound timers.

/// The pair of 8-bit countdown timers.
///
/// Both count down once per 60 Hz tick and stop at zero. Ticking is driven
/// by the caller's wall clock, never by the instruction stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimerPair {
    /// (DT) Delay timer that counts down to 0.
    delay: u8,
    /// (ST) Sound timer that counts down to 0. When it has a non-zero value, a beep is played.
    sound: u8,
}

impl TimerPair {
    pub fn new() -> Self {
        Default::default()
    }

    /// Count down both timers by one, stopping at zero.
    #[inline]
    pub fn tick(&mut self) {
        self.delay = self.delay.saturating_sub(1);
        self.sound = self.sound.saturating_sub(1);
    }

    #[inline(always)]
    pub fn delay(&self) -> u8 {
        self.delay
    }

    #[inline(always)]
    pub fn sound(&self) -> u8 {
        self.sound
    }

    #[inline(always)]
    pub fn set_delay(&mut self, value: u8) {
        self.delay = value;
    }

    #[inline(always)]
    pub fn set_sound(&mut self, value: u8) {
        self.sound = value;
    }

    /// The buzzer sounds while the sound timer is non-zero.
    #[inline(always)]
    pub fn is_buzzing(&self) -> bool {
        self.sound > 0
    }
}
