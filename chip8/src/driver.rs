//! Cycle pacing.
use std::time::{Duration, Instant};

use log::trace;

use crate::{
    clock::Clock,
    constants::*,
    error::Chip8Result,
    vm::{Chip8Vm, Flow},
};

/// Most instruction cycles executed by a single update.
const MAX_CYCLES_PER_UPDATE: u32 = 1024;

/// Most timer ticks applied by a single update, one second's worth.
const MAX_TICKS_PER_UPDATE: u32 = DELAY_FREQUENCY as u32;

/// Drives a VM at its configured instruction rate, while counting down
/// its timers at a fixed 60 Hz.
///
/// The driver never sleeps. The caller decides how to wait between
/// calls to [`Driver::update`], and pumps keyboard input into the VM's
/// [`KeyLatch`](crate::KeyLatch) in the meantime.
#[derive(Debug)]
pub struct Driver {
    cpu_clock: Clock,
    timer_clock: Clock,
}

/// Outcome of a single driver update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Update {
    /// Number of instructions executed.
    pub cycles: u32,
    /// Number of 60 Hz timer ticks applied.
    pub timer_ticks: u32,
    /// Control flow of the last executed instruction.
    pub flow: Flow,
    /// The framebuffer changed and should be presented.
    pub redraw: bool,
}

impl Driver {
    pub fn new(vm: &Chip8Vm, now: Instant) -> Self {
        Self {
            cpu_clock: Clock::new(
                vm.config().clock_frequency.into(),
                MAX_CYCLES_PER_UPDATE,
                now,
            ),
            timer_clock: Clock::new(
                Duration::from_nanos(NANOS_IN_SECOND / DELAY_FREQUENCY),
                MAX_TICKS_PER_UPDATE,
                now,
            ),
        }
    }

    /// Restart both clocks, for example after the VM was paused.
    pub fn reset(&mut self, now: Instant) {
        self.cpu_clock.reset(now);
        self.timer_clock.reset(now);
    }

    /// Run the instructions and timer ticks that fell due since the last update.
    ///
    /// Stops early when the VM halts or waits for a key. Timers keep
    /// counting down regardless of how many instructions ran.
    pub fn update(&mut self, vm: &mut Chip8Vm, now: Instant) -> Chip8Result<Update> {
        let timer_ticks = self.timer_clock.due(now);
        for _ in 0..timer_ticks {
            vm.tick_timers();
        }

        let mut update = Update {
            cycles: 0,
            timer_ticks,
            flow: Flow::Ok,
            redraw: false,
        };

        for _ in 0..self.cpu_clock.due(now) {
            update.flow = vm.step()?;

            match update.flow {
                Flow::Halted => break,
                Flow::KeyWait => {
                    update.cycles += 1;
                    break;
                }
                Flow::Draw => update.redraw = true,
                _ => {}
            }

            update.cycles += 1;
        }

        if update.cycles > 0 || update.timer_ticks > 0 {
            trace!(
                "update: {} cycles, {} timer ticks, {:?}",
                update.cycles,
                update.timer_ticks,
                update.flow
            );
        }

        Ok(update)
    }
}
