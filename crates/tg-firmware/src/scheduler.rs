//! The cooperative super-loop (spec §5): a fixed task sequence, each task
//! run-to-completion and non-blocking, restarting from the top whenever a
//! task reports progress.
//!
//! Grounded on the teacher's `rtic_main`/`embassy_main` task-priority
//! wiring, but reworked from separate async tasks/interrupt handlers into
//! one `Scheduler::tick` a plain host loop calls directly —
//! the platform entry point (RTIC, embassy, or here, a `main.rs` `loop {}`)
//! is just whatever drives this method, never part of the logical model.

use tg_core::axes::AxesConfig;
use tg_core::canonical_machine::{CanonicalMachine, CycleState, HoldState};
use tg_core::error::{CoreError, Stat};
use tg_core::planner::Planner;
use tg_core::runtime::Runtime;
use tg_hal::dda::{Dda, DdaOutcome};
use tg_hal::switch::SwitchState;
use tg_hal::{RtcHal, StepperHal, SwitchHal, TimerHal};
use tg_proto::realtime::RealtimeCommand;
use tg_proto::status::{combined_state_code, StatusReport};

use crate::gcode_io;
use crate::safety::SafetyMonitor;

/// One pass over the fixed task sequence, owning every layer plus the
/// backing hardware.
pub struct Scheduler<H, const N: usize> {
    pub cm: CanonicalMachine,
    pub planner: Planner,
    pub runtime: Runtime,
    pub hal: H,
    pub safety: SafetyMonitor<N>,
    dda: Dda,
    steps_per_mm: [f64; tg_core::axes::AXIS_COUNT],
    segment_time_s: f64,
    last_segment_velocity: f64,
    probe_input: usize,
    /// `RtcHal` tick a dwell segment started waiting at, gating its
    /// completion off wall-clock time instead of the stepper DDA.
    dwell_start_tick: Option<u32>,
    dwell_ticks_needed: u32,
}

impl<H, const N: usize> Scheduler<H, N>
where
    H: StepperHal + TimerHal + SwitchHal + RtcHal,
{
    pub fn new(
        axes: AxesConfig,
        steps_per_mm: [f64; tg_core::axes::AXIS_COUNT],
        segment_time_s: f64,
        hal: H,
        limit_inputs: [usize; N],
        probe_input: usize,
    ) -> Self {
        let mut cm = CanonicalMachine::new(axes.clone());
        cm.ready();
        Self {
            cm,
            planner: Planner::new(axes),
            runtime: Runtime::new(steps_per_mm).with_segment_time(segment_time_s),
            hal,
            safety: SafetyMonitor::new(limit_inputs),
            dda: Dda::new(),
            steps_per_mm,
            segment_time_s,
            last_segment_velocity: 0.0,
            probe_input,
            dwell_start_tick: None,
            dwell_ticks_needed: 0,
        }
    }

    /// `!`/`~`/`%`/`^X`: acted on immediately, outside the task sequence,
    /// the way the real serial ISR would dispatch them ahead of the line
    /// buffer (spec §6.2).
    pub fn handle_realtime(&mut self, cmd: RealtimeCommand) {
        match cmd {
            RealtimeCommand::FeedHold => {
                self.cm.request_feed_hold();
                if self.cm.hold_state == HoldState::HoldRequested {
                    self.runtime.request_feed_hold();
                    self.cm.hold_state = HoldState::Held;
                }
            }
            RealtimeCommand::CycleStart => {
                if self.cm.hold_state == HoldState::Held {
                    self.runtime.clear_feed_hold();
                    self.cm.hold_state = HoldState::Off;
                } else {
                    self.cm.request_cycle_start();
                }
            }
            RealtimeCommand::QueueFlush => self.planner.flush_queued(),
            RealtimeCommand::Reset => {
                self.runtime = Runtime::new(self.steps_per_mm).with_segment_time(self.segment_time_s);
                self.dda = Dda::new();
                self.dwell_start_tick = None;
                self.cm.reset(&mut self.planner);
            }
        }
    }

    /// Runs the fixed task sequence once: safety supervisor, then stepper
    /// service, segment prep/block load, planner replan, and finally one
    /// incoming G-code line. Returns as soon as any task reports
    /// [`Stat::Ok`] or [`Stat::Err`]; the caller restarts the sequence
    /// from the top on its next call, exactly like the real super-loop.
    pub fn tick(&mut self, incoming_line: Option<&str>) -> Stat {
        let safety_stat = self.safety.poll(&mut self.cm, &self.hal);
        if matches!(safety_stat, Stat::Err(_)) {
            return safety_stat;
        }

        if let Some(start) = self.dwell_start_tick {
            let elapsed = self.hal.tick_count().wrapping_sub(start);
            if elapsed < self.dwell_ticks_needed {
                return Stat::Ok;
            }
            self.dwell_start_tick = None;
            return Stat::Ok;
        }

        if self.cm.cycle_state == CycleState::Probing {
            let switch_closed = self.hal.switch_state(self.probe_input) == SwitchState::Closed;
            let motion_active =
                self.runtime.is_busy() || self.dda.is_active() || !self.planner.is_empty();
            match self
                .cm
                .service_probe(switch_closed, motion_active, self.runtime.position(), &mut self.planner)
            {
                Stat::Noop | Stat::Eagain => {}
                other => return other,
            }
        }

        if self.dda.is_active() {
            return match self.dda.tick(&mut self.hal) {
                DdaOutcome::Stepped | DdaOutcome::SegmentDone => Stat::Ok,
                DdaOutcome::Idle => Stat::Noop,
            };
        }

        match self.runtime.prep_next_segment() {
            Stat::Ok => {
                if let Some(segment) = self.runtime.swap_prep_exec() {
                    if segment.is_dwell {
                        self.dwell_start_tick = Some(self.hal.tick_count());
                        self.dwell_ticks_needed =
                            (segment.segment_time * self.hal.tick_hz() as f64).round() as u32;
                        self.runtime.exec_consumed();
                        return Stat::Ok;
                    }
                    self.last_segment_velocity = segment.segment_velocity;
                    self.dda.load(&segment, &mut self.hal);
                    self.runtime.exec_consumed();
                    return Stat::Ok;
                }
                return Stat::Noop;
            }
            Stat::Err(e) => return Stat::Err(e),
            Stat::Eagain | Stat::Noop => {}
        }
        if !self.runtime.is_busy() {
            match self.runtime.load_next_block(&mut self.planner) {
                Stat::Ok => return Stat::Ok,
                Stat::Err(e) => return Stat::Err(e),
                Stat::Eagain | Stat::Noop => {}
            }
        }

        match self.planner.replan() {
            Stat::Ok => return Stat::Ok,
            Stat::Err(e) => return Stat::Err(e),
            Stat::Eagain | Stat::Noop => {}
        }

        if let Some(line) = incoming_line {
            return match gcode_io::parse_line(line) {
                Ok(Some((block_delete, input))) => {
                    if block_delete && self.cm.gmx.block_delete_switch {
                        Stat::Noop
                    } else {
                        self.cm.apply_block(&input, &mut self.planner)
                    }
                }
                Ok(None) => Stat::Noop,
                Err(_) => Stat::Err(CoreError::UnknownWord),
            };
        }

        Stat::Noop
    }

    /// `true` while homing owns the limit-switch inputs the safety
    /// supervisor would otherwise treat as faults.
    pub fn is_homing(&self) -> bool {
        self.cm.cycle_state == CycleState::Homing
    }

    /// Builds a status report snapshot (spec §6.4) from current state.
    pub fn status_report(&self) -> StatusReport {
        let machine_position = self.runtime.position();
        let mut work_position = machine_position;
        for axis in 0..tg_core::axes::AXIS_COUNT {
            work_position[axis] -= self.cm.gm.work_offset[axis];
            if self.cm.gmx.origin_offset_enable {
                work_position[axis] -= self.cm.gmx.origin_offset[axis];
            }
        }
        StatusReport {
            line_number: self.cm.gm.line_number,
            machine_position,
            work_position,
            velocity: self.last_segment_velocity,
            feed_rate: self.cm.gm.feed_rate,
            motion_mode: self.cm.gm.motion_mode,
            combined_state: combined_state_code(self.cm.combined_state()),
            coord_system: self.cm.gm.coord_system,
            units: self.cm.gm.units_mode,
            distance_mode: self.cm.gm.distance_mode,
            plane: self.cm.gm.select_plane,
            feed_rate_mode: self.cm.gm.feed_rate_mode,
            tool: self.cm.gm.tool,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_sim::SimHal;

    fn scheduler() -> Scheduler<SimHal, 1> {
        Scheduler::new(
            AxesConfig::default(),
            [100.0; tg_core::axes::AXIS_COUNT],
            tg_core::runtime::DEFAULT_SEGMENT_TIME_S,
            SimHal::new(2, 1_000_000),
            [0],
            1,
        )
    }

    fn run_to_noop(sched: &mut Scheduler<SimHal, 1>, line: Option<&str>) {
        loop {
            match sched.tick(line) {
                Stat::Ok => continue,
                _ => break,
            }
        }
    }

    #[test]
    fn a_feed_move_line_eventually_steps_the_dominant_axis() {
        let mut sched = scheduler();
        run_to_noop(&mut sched, Some("G1 X10 F600"));
        assert_eq!(sched.cm.gm.motion_mode, tg_core::model::MotionMode::Feed);
        run_to_noop(&mut sched, None);
        assert_eq!(sched.hal.positions[tg_core::axes::X], 1000);
    }

    #[test]
    fn a_tripped_limit_switch_raises_an_alarm() {
        let mut sched = scheduler();
        sched.hal.trip_switch(0, true);
        let stat = sched.tick(None);
        assert_eq!(stat, Stat::Err(CoreError::LimitSwitchHit));
        assert!(sched.cm.alarm.is_active());
    }

    #[test]
    fn reset_flushes_the_planner_and_clears_the_alarm() {
        let mut sched = scheduler();
        sched.hal.trip_switch(0, true);
        let _ = sched.tick(None);
        assert!(sched.cm.alarm.is_active());
        sched.handle_realtime(RealtimeCommand::Reset);
        assert!(!sched.cm.alarm.is_active());
    }

    #[test]
    fn a_dwell_blocks_ticks_until_rtc_time_elapses() {
        let mut sched = scheduler();
        let _ = sched.tick(Some("G4 P1.0"));
        for _ in 0..10 {
            if sched.dwell_start_tick.is_some() {
                break;
            }
            let _ = sched.tick(None);
        }
        assert!(sched.dwell_start_tick.is_some());

        sched.hal.advance_rtc(999_999);
        assert_eq!(sched.tick(None), Stat::Ok);
        assert!(sched.dwell_start_tick.is_some());

        sched.hal.advance_rtc(1);
        assert_eq!(sched.tick(None), Stat::Ok);
        assert!(sched.dwell_start_tick.is_none());
    }

    #[test]
    fn a_probe_move_completes_on_switch_contact() {
        let mut sched = scheduler();
        let _ = sched.tick(Some("G38.2 X10 F100"));
        assert_eq!(sched.cm.cycle_state, CycleState::Probing);

        sched.hal.trip_switch(1, true);
        let stat = run_until_probe_settles(&mut sched);
        assert_eq!(stat, Stat::Ok);
        assert_eq!(sched.cm.cycle_state, CycleState::Off);
    }

    #[test]
    fn a_probe_move_without_contact_raises_probe_failed() {
        let mut sched = scheduler();
        let _ = sched.tick(Some("G38.2 X1 F100"));
        assert_eq!(sched.cm.cycle_state, CycleState::Probing);

        let stat = run_until_probe_settles(&mut sched);
        assert_eq!(stat, Stat::Err(CoreError::ProbeFailed));
        assert!(sched.cm.alarm.is_active());
    }

    /// Ticks until the probe cycle resolves (contact or travel exhausted),
    /// ignoring the transient `Ok`/`Noop` churn of ordinary segment prep.
    fn run_until_probe_settles(sched: &mut Scheduler<SimHal, 1>) -> Stat {
        let mut last = Stat::Noop;
        for _ in 0..10_000 {
            last = sched.tick(None);
            if matches!(last, Stat::Err(_)) || sched.cm.cycle_state != CycleState::Probing {
                return last;
            }
        }
        last
    }
}
