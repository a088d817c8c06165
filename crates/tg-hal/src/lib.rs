//! Hardware abstraction for the motion core (spec §6.5, §4.5).
//!
//! `tg-core` speaks only in [`tg_core::model::Segment`]s; this crate is the
//! layer that turns a segment into GPIO wiggles. The design mirrors the
//! pipelined, lock-free stepper controller this workspace has always used:
//! a `next_command` is prepared one step ahead of the timer interrupt so the
//! interrupt's critical path is nothing but register writes. Unlike a fixed
//! per-command interval scheduler, the accumulator here is a classical
//! Bresenham DDA over the whole segment's axis step counts, matching the
//! free-running-timer model the core was specified against.

#![cfg_attr(not(feature = "std"), no_std)]

use core::cell::RefCell;
use critical_section::Mutex;
use tg_core::axes::AXIS_COUNT;
use tg_core::model::Segment;

pub mod dda;
pub mod rtc;
pub mod switch;

pub use dda::{Dda, DdaOutcome};
pub use rtc::RtcHal;
pub use switch::{SwitchHal, SwitchState};

/// Emits a single step pulse and controls motor enable lines (spec §6.5).
pub trait StepperHal {
    /// Pulse `motor_index`'s step line, having already latched its
    /// direction line via [`StepperHal::set_direction`].
    fn step(&mut self, motor_index: usize);
    /// Sets the direction line for `motor_index` ahead of its next pulse.
    fn set_direction(&mut self, motor_index: usize, forward: bool);
    fn set_motor_enable(&mut self, motor_index: usize, on: bool);
}

/// Schedules the next DDA tick (spec §6.5 `timer.schedule_period`).
pub trait TimerHal {
    fn schedule_period(&mut self, ticks: u32);
    fn stop(&mut self);
}

/// A GPIO port that can be written atomically from within an interrupt,
/// analogous to STM32's BSRR register. `set_and_clear_atomic` lets the DDA
/// flip several step/direction lines in one indivisible write.
pub trait AtomicGpioPort {
    fn set_and_clear_atomic(&mut self, set_mask: u32, clear_mask: u32);
    fn write(&mut self, mask: u32);
}

/// Double-buffered hand-off of a prepared segment into the DDA, guarded by
/// a critical section the way `prep`/`exec` swap in `tg_core::runtime`.
pub struct SegmentSlot {
    inner: Mutex<RefCell<Option<Segment>>>,
}

impl SegmentSlot {
    pub const fn empty() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Called from main-loop context: load a freshly prepared segment,
    /// replacing whatever (if anything) was waiting.
    pub fn load(&self, segment: Segment) {
        critical_section::with(|cs| {
            *self.inner.borrow(cs).borrow_mut() = Some(segment);
        });
    }

    /// Called from the DDA's "load next" interrupt: atomically take the
    /// waiting segment, leaving the slot empty.
    pub fn take(&self) -> Option<Segment> {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().take())
    }

    pub fn is_empty(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().is_none())
    }
}

/// A step/direction pair for one motor, as produced by the DDA per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorPulse {
    pub motor_index: usize,
    pub forward: bool,
}

/// Heapless container of at most [`AXIS_COUNT`] pulses fired on one tick.
pub type PulseSet = heapless::Vec<MotorPulse, AXIS_COUNT>;
