//! A deterministic, in-memory implementation of every `tg-hal` trait.
//!
//! Stands in for the simulated MCU the workspace used to run over a Unix
//! socket: instead of a separate process exchanging JSON frames, `SimHal`
//! is a plain struct the test or scenario driver calls directly, so a
//! scenario's whole state is a single value that can be asserted on after
//! the run.

use tg_core::axes::AXIS_COUNT;
use tg_hal::switch::SwitchState;
use tg_hal::{RtcHal, SwitchHal, TimerHal};

/// One motor's pulse, as recorded by [`SimHal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RecordedPulse {
    pub motor_index: usize,
    pub forward: bool,
}

/// A fully in-memory stepper/switch/timer/clock simulation.
#[derive(Debug, Clone)]
pub struct SimHal {
    pub positions: [i64; AXIS_COUNT],
    pub enabled: [bool; AXIS_COUNT],
    directions: [bool; AXIS_COUNT],
    pub pulses: Vec<RecordedPulse>,
    /// Switch input state, indexable by `switch_state`'s `input_index`.
    pub switches: Vec<SwitchState>,
    pub scheduled_period_ticks: Option<u32>,
    pub timer_stopped: bool,
    tick_hz: u32,
    tick_count: u32,
}

impl SimHal {
    pub fn new(switch_count: usize, tick_hz: u32) -> Self {
        Self {
            positions: [0; AXIS_COUNT],
            enabled: [false; AXIS_COUNT],
            directions: [true; AXIS_COUNT],
            pulses: Vec::new(),
            switches: vec![SwitchState::Open; switch_count],
            scheduled_period_ticks: None,
            timer_stopped: true,
            tick_hz,
            tick_count: 0,
        }
    }

    /// Advances the simulated real-time clock by one tick, the way the
    /// real RTC's low-priority ISR would.
    pub fn advance_rtc(&mut self, ticks: u32) {
        self.tick_count = self.tick_count.wrapping_add(ticks);
    }

    pub fn trip_switch(&mut self, index: usize, closed: bool) {
        self.switches[index] = if closed {
            SwitchState::Closed
        } else {
            SwitchState::Open
        };
    }
}

impl tg_hal::StepperHal for SimHal {
    fn step(&mut self, motor_index: usize) {
        if self.directions[motor_index] {
            self.positions[motor_index] += 1;
        } else {
            self.positions[motor_index] -= 1;
        }
        self.pulses.push(RecordedPulse {
            motor_index,
            forward: self.directions[motor_index],
        });
    }

    fn set_direction(&mut self, motor_index: usize, forward: bool) {
        self.directions[motor_index] = forward;
    }

    fn set_motor_enable(&mut self, motor_index: usize, on: bool) {
        self.enabled[motor_index] = on;
    }
}

impl TimerHal for SimHal {
    fn schedule_period(&mut self, ticks: u32) {
        self.scheduled_period_ticks = Some(ticks);
        self.timer_stopped = false;
    }

    fn stop(&mut self) {
        self.timer_stopped = true;
    }
}

impl SwitchHal for SimHal {
    fn switch_state(&self, input_index: usize) -> SwitchState {
        self.switches
            .get(input_index)
            .copied()
            .unwrap_or(SwitchState::Disabled)
    }
}

impl RtcHal for SimHal {
    fn tick_hz(&self) -> u32 {
        self.tick_hz
    }

    fn tick_count(&self) -> u32 {
        self.tick_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_hal::StepperHal;

    #[test]
    fn stepping_updates_position_according_to_latched_direction() {
        let mut hal = SimHal::new(4, 1_000_000);
        hal.set_direction(0, true);
        hal.step(0);
        hal.set_direction(0, false);
        hal.step(0);
        assert_eq!(hal.positions[0], 0);
        assert_eq!(hal.pulses.len(), 2);
    }

    #[test]
    fn disabled_switch_index_reports_disabled_not_open() {
        let hal = SimHal::new(2, 1_000_000);
        assert_eq!(hal.switch_state(9), SwitchState::Disabled);
        assert_eq!(hal.switch_state(0), SwitchState::Open);
    }
}
