//! Limit-switch / probe input reading (spec §6.5 `switch_state`).
//!
//! Generalises the workspace's existing `Endstops<N, PIN>` driver — which
//! only ever reported a raw high/low — into the core's three-way
//! `{open, closed, disabled}` state, since a disabled input must be
//! distinguishable from "not tripped" for homing and soft-limit logic to
//! behave correctly.

use embedded_hal::digital::InputPin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    Open,
    Closed,
    Disabled,
}

/// Reads the state of a switch input (spec §6.5).
pub trait SwitchHal {
    fn switch_state(&self, input_index: usize) -> SwitchState;
}

/// A collection of digital limit-switch/probe pins, any of which can be
/// masked off via `enabled`.
pub struct Switches<const N: usize, PIN> {
    pins: [PIN; N],
    enabled: [bool; N],
    /// `true` if the physical pin reading high means "triggered".
    active_high: [bool; N],
}

impl<const N: usize, PIN, E> Switches<N, PIN>
where
    PIN: InputPin<Error = E>,
{
    pub fn new(pins: [PIN; N], active_high: [bool; N]) -> Self {
        Self {
            pins,
            enabled: [true; N],
            active_high,
        }
    }

    pub fn set_enabled(&mut self, index: usize, enabled: bool) {
        self.enabled[index] = enabled;
    }

    pub fn read_state(&mut self, index: usize) -> Result<SwitchState, E> {
        if !self.enabled[index] {
            return Ok(SwitchState::Disabled);
        }
        let high = self.pins[index].is_high()?;
        let triggered = high == self.active_high[index];
        Ok(if triggered {
            SwitchState::Closed
        } else {
            SwitchState::Open
        })
    }

    pub fn read_all(&mut self) -> Result<[SwitchState; N], E> {
        let mut states = [SwitchState::Open; N];
        for i in 0..N {
            states[i] = self.read_state(i)?;
        }
        Ok(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::pin::{Mock as PinMock, State, Transaction};

    #[test]
    fn disabled_input_reports_disabled_without_touching_the_pin() {
        let pin = PinMock::new(&[] as &[Transaction]);
        let mut switches = Switches::new([pin], [true]);
        switches.set_enabled(0, false);
        assert_eq!(switches.read_state(0).unwrap(), SwitchState::Disabled);
    }

    #[test]
    fn active_high_and_active_low_agree_on_triggered() {
        let high_pin = PinMock::new(&[Transaction::get(State::High)]);
        let mut active_high = Switches::new([high_pin], [true]);
        assert_eq!(active_high.read_state(0).unwrap(), SwitchState::Closed);

        let low_pin = PinMock::new(&[Transaction::get(State::Low)]);
        let mut active_low = Switches::new([low_pin], [false]);
        assert_eq!(active_low.read_state(0).unwrap(), SwitchState::Closed);
    }
}
