//! Bresenham DDA stepper pipeline (spec §4.5).
//!
//! Each motor carries an accumulator. Every tick adds `|steps|` for that
//! motor into its accumulator; when the accumulator reaches `max_steps` (the
//! dominant axis's step count for the segment) it overflows, emits a step
//! pulse and is brought back below threshold by subtracting `max_steps`.
//! This is the classical "plot a line" DDA, run once per segment instead of
//! once per move the way the teacher's per-command interval scheduler did
//! it — the period between ticks is constant within a segment (the segment
//! was already quantised into a uniform tick rate by `tg_core::runtime`).
//!
//! The pipeline shape — prepare the next tick's work ahead of the interrupt
//! so the critical path is pure register writes — mirrors the workspace's
//! existing low-latency stepper controller.

use tg_core::axes::AXIS_COUNT;
use tg_core::model::Segment;

use crate::{AtomicGpioPort, MotorPulse, PulseSet, StepperHal, TimerHal};

/// What happened on one `tick` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-logging", derive(defmt::Format))]
pub enum DdaOutcome {
    /// At least one motor pulsed; the DDA is still mid-segment.
    Stepped,
    /// No motor reached threshold this tick (can happen on very shallow
    /// axes of a multi-axis move).
    Idle,
    /// This was the segment's last tick; the DDA is now empty and waiting
    /// for the next `load`.
    SegmentDone,
}

/// Per-motor Bresenham state plus the currently loaded segment.
pub struct Dda {
    accumulators: [u32; AXIS_COUNT],
    step_counts: [u32; AXIS_COUNT],
    directions: [bool; AXIS_COUNT],
    max_steps: u32,
    ticks_remaining: u32,
    period_ticks: u32,
    active: bool,
}

impl Dda {
    pub const fn new() -> Self {
        Self {
            accumulators: [0; AXIS_COUNT],
            step_counts: [0; AXIS_COUNT],
            directions: [true; AXIS_COUNT],
            max_steps: 0,
            ticks_remaining: 0,
            period_ticks: 0,
            active: false,
        }
    }

    /// Loads a freshly prepared segment. Direction lines are set here, once,
    /// before the first pulse of the segment — the steps themselves are
    /// emitted lazily as `tick` overflows each accumulator.
    pub fn load<H: StepperHal>(&mut self, segment: &Segment, hal: &mut H) {
        let mut max_steps: u32 = 0;
        for axis in 0..AXIS_COUNT {
            let raw = segment.steps[axis];
            let forward = raw >= 0;
            let count = raw.unsigned_abs();
            self.step_counts[axis] = count;
            self.accumulators[axis] = 0;
            self.directions[axis] = forward;
            hal.set_direction(axis, forward);
            if count > max_steps {
                max_steps = count;
            }
        }
        self.max_steps = max_steps.max(1);
        self.ticks_remaining = max_steps.max(1);
        self.period_ticks = segment.dda_period_ticks;
        self.active = max_steps > 0 || segment.segment_time > 0.0;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn period_ticks(&self) -> u32 {
        self.period_ticks
    }

    /// Advances the DDA by one tick, pulsing every motor whose accumulator
    /// overflows. Call from the high-priority stepper timer ISR (spec §5).
    pub fn tick<H: StepperHal>(&mut self, hal: &mut H) -> DdaOutcome {
        if !self.active {
            return DdaOutcome::SegmentDone;
        }

        let mut pulses: PulseSet = PulseSet::new();
        for axis in 0..AXIS_COUNT {
            if self.step_counts[axis] == 0 {
                continue;
            }
            self.accumulators[axis] += self.step_counts[axis];
            if self.accumulators[axis] >= self.max_steps {
                self.accumulators[axis] -= self.max_steps;
                hal.step(axis);
                let _ = pulses.push(MotorPulse {
                    motor_index: axis,
                    forward: self.directions[axis],
                });
            }
        }

        self.ticks_remaining = self.ticks_remaining.saturating_sub(1);
        if self.ticks_remaining == 0 {
            self.active = false;
            #[cfg(feature = "defmt-logging")]
            defmt::trace!("dda segment done, {} pulses this tick", pulses.len());
            return DdaOutcome::SegmentDone;
        }
        if pulses.is_empty() {
            DdaOutcome::Idle
        } else {
            DdaOutcome::Stepped
        }
    }
}

impl Default for Dda {
    fn default() -> Self {
        Self::new()
    }
}

/// A two-wire (step, direction) motor line pair on an [`AtomicGpioPort`],
/// the way the teacher's `StepperController` addressed all motors through
/// one port with per-bit masks.
pub struct PortStepperHal<'a, STEP, DIR> {
    step_port: &'a mut STEP,
    dir_port: &'a mut DIR,
    step_bit: [u32; AXIS_COUNT],
    dir_bit: [u32; AXIS_COUNT],
}

impl<'a, STEP, DIR> PortStepperHal<'a, STEP, DIR>
where
    STEP: AtomicGpioPort,
    DIR: AtomicGpioPort,
{
    pub fn new(
        step_port: &'a mut STEP,
        dir_port: &'a mut DIR,
        step_bit: [u32; AXIS_COUNT],
        dir_bit: [u32; AXIS_COUNT],
    ) -> Self {
        Self {
            step_port,
            dir_port,
            step_bit,
            dir_bit,
        }
    }
}

impl<'a, STEP, DIR> StepperHal for PortStepperHal<'a, STEP, DIR>
where
    STEP: AtomicGpioPort,
    DIR: AtomicGpioPort,
{
    fn step(&mut self, motor_index: usize) {
        let bit = self.step_bit[motor_index];
        self.step_port.set_and_clear_atomic(bit, bit);
    }

    fn set_direction(&mut self, motor_index: usize, forward: bool) {
        let bit = self.dir_bit[motor_index];
        if forward {
            self.dir_port.set_and_clear_atomic(bit, 0);
        } else {
            self.dir_port.set_and_clear_atomic(0, bit);
        }
    }

    fn set_motor_enable(&mut self, _motor_index: usize, _on: bool) {
        // Enable lines are wired per-board; left to the firmware layer's
        // config-driven GPIO map rather than hard-coded here.
    }
}

/// Drives a [`Dda`] from a [`TimerHal`] and a segment source, the way the
/// teacher's `StepperController::on_timer_interrupt` re-armed its own timer
/// from within the interrupt.
pub fn advance_and_reschedule<H, T>(dda: &mut Dda, hal: &mut H, timer: &mut T) -> DdaOutcome
where
    H: StepperHal,
    T: TimerHal,
{
    let outcome = dda.tick(hal);
    match outcome {
        DdaOutcome::SegmentDone => timer.stop(),
        _ => timer.schedule_period(dda.period_ticks()),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockStepper {
        pulses: heapless::Vec<(usize, bool), 16>,
        directions: [bool; AXIS_COUNT],
    }

    impl StepperHal for MockStepper {
        fn step(&mut self, motor_index: usize) {
            let _ = self.pulses.push((motor_index, self.directions[motor_index]));
        }
        fn set_direction(&mut self, motor_index: usize, forward: bool) {
            self.directions[motor_index] = forward;
        }
        fn set_motor_enable(&mut self, _motor_index: usize, _on: bool) {}
    }

    fn segment(steps: [i32; AXIS_COUNT]) -> Segment {
        Segment {
            segment_time: 0.01,
            segment_velocity: 10.0,
            segment_length: 1.0,
            steps,
            dda_period_ticks: 100,
            is_dwell: false,
        }
    }

    #[test]
    fn dominant_axis_steps_every_tick_minor_axis_steps_proportionally() {
        let mut dda = Dda::new();
        let mut hal = MockStepper::default();
        let mut seg = [0i32; AXIS_COUNT];
        seg[0] = 4;
        seg[1] = 2;
        dda.load(&segment(seg), &mut hal);

        let mut axis0_steps = 0;
        let mut axis1_steps = 0;
        loop {
            let mut tick_hal = MockStepper {
                pulses: heapless::Vec::new(),
                directions: hal.directions,
            };
            let outcome = dda.tick(&mut tick_hal);
            for &(axis, _) in tick_hal.pulses.iter() {
                if axis == 0 {
                    axis0_steps += 1;
                } else if axis == 1 {
                    axis1_steps += 1;
                }
            }
            if outcome == DdaOutcome::SegmentDone {
                break;
            }
        }
        assert_eq!(axis0_steps, 4);
        assert_eq!(axis1_steps, 2);
    }

    #[test]
    fn empty_segment_completes_immediately() {
        let mut dda = Dda::new();
        let mut hal = MockStepper::default();
        dda.load(&segment([0; AXIS_COUNT]), &mut hal);
        // A dwell (all-zero steps) still occupies exactly one tick's worth
        // of wall-clock time before reporting done.
        assert_eq!(dda.tick(&mut hal), DdaOutcome::SegmentDone);
    }
}
