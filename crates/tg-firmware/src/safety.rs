//! Alarm supervisor: watches limit-switch inputs and the model's magic
//! guard words, independently of whatever the G-code stream is asking
//! the machine to do.
//!
//! Grounded on the teacher's `SafetyMonitor<'a, const N>` (an array of
//! per-axis monitors plus an idempotent `AtomicBool` emergency-stop flag
//! fed by a watchdog), but reworked for a watchdog-less host-context
//! supervisor: there, a missed `feed_watchdog()` call tripped the stop;
//! here, a limit switch closing outside a homing cycle or a magic-guard
//! mismatch does, via [`tg_core::canonical_machine::CanonicalMachine::raise_external`].

use core::sync::atomic::{AtomicBool, Ordering};

use tg_core::canonical_machine::{CanonicalMachine, CycleState};
use tg_core::error::{CoreError, Stat};
use tg_hal::switch::SwitchState;
use tg_hal::SwitchHal;

/// Watches up to `N` limit-switch inputs plus the model's integrity
/// guards, latching an emergency stop the first time either faults.
pub struct SafetyMonitor<const N: usize> {
    limit_inputs: [usize; N],
    tripped: AtomicBool,
}

impl<const N: usize> SafetyMonitor<N> {
    pub fn new(limit_inputs: [usize; N]) -> Self {
        Self {
            limit_inputs,
            tripped: AtomicBool::new(false),
        }
    }

    /// `true` the first time a fault is observed; stays `true` afterwards
    /// until the machine is hard-reset via [`CanonicalMachine::reset`].
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    /// Runs one supervisor pass: the integrity walk, then every
    /// configured limit input (skipped while a homing cycle owns them).
    /// Raises at most one fault per call, onto `cm`'s alarm state.
    pub fn poll<H: SwitchHal>(&self, cm: &mut CanonicalMachine, switches: &H) -> Stat {
        if self.tripped.load(Ordering::Acquire) {
            return Stat::Noop;
        }

        let stat = cm.check_integrity();
        if stat != Stat::Ok {
            self.latch();
            return stat;
        }

        if cm.cycle_state != CycleState::Homing {
            for &input in &self.limit_inputs {
                if switches.switch_state(input) == SwitchState::Closed {
                    self.latch();
                    return cm.raise_external(CoreError::LimitSwitchHit);
                }
            }
        }

        Stat::Noop
    }

    fn latch(&self) {
        self.tripped.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_core::axes::AxesConfig;

    struct FixedSwitches(Vec<SwitchState>);

    impl SwitchHal for FixedSwitches {
        fn switch_state(&self, input_index: usize) -> SwitchState {
            self.0.get(input_index).copied().unwrap_or(SwitchState::Disabled)
        }
    }

    #[test]
    fn an_open_limit_switch_does_not_trip_the_monitor() {
        let monitor = SafetyMonitor::new([0, 1]);
        let mut cm = CanonicalMachine::new(AxesConfig::default());
        cm.ready();
        let switches = FixedSwitches(vec![SwitchState::Open, SwitchState::Open]);
        assert_eq!(monitor.poll(&mut cm, &switches), Stat::Noop);
        assert!(!monitor.is_tripped());
    }

    #[test]
    fn a_closed_limit_switch_outside_homing_raises_and_latches() {
        let monitor = SafetyMonitor::new([0]);
        let mut cm = CanonicalMachine::new(AxesConfig::default());
        cm.ready();
        let switches = FixedSwitches(vec![SwitchState::Closed]);
        assert_eq!(
            monitor.poll(&mut cm, &switches),
            Stat::Err(CoreError::LimitSwitchHit)
        );
        assert!(monitor.is_tripped());
        assert!(cm.alarm.is_active());

        // Idempotent: a second poll does not re-raise.
        assert_eq!(monitor.poll(&mut cm, &switches), Stat::Noop);
    }

    #[test]
    fn a_closed_limit_switch_during_homing_is_ignored() {
        let monitor = SafetyMonitor::new([0]);
        let mut cm = CanonicalMachine::new(AxesConfig::default());
        cm.ready();
        cm.cycle_state = CycleState::Homing;
        let switches = FixedSwitches(vec![SwitchState::Closed]);
        assert_eq!(monitor.poll(&mut cm, &switches), Stat::Noop);
        assert!(!monitor.is_tripped());
    }
}
