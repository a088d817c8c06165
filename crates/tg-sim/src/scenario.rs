//! Drives a [`CanonicalMachine`]/[`Planner`]/[`Runtime`]/[`Dda`] stack
//! against a [`SimHal`], recording every hardware-facing call into a
//! [`TraceLog`]. Where the workspace's old harness spawned a host process
//! and an MCU process and shuttled JSON frames between them, a scenario
//! here is one synchronous call per G-code block plus a drain loop — the
//! controller's single-threaded cooperative model (spec §5) means there is
//! no concurrency to simulate away.

use tg_core::axes::AxesConfig;
use tg_core::canonical_machine::CanonicalMachine;
use tg_core::error::Stat;
use tg_core::model::GCodeInput;
use tg_core::planner::Planner;
use tg_core::runtime::Runtime;
use tg_hal::dda::{Dda, DdaOutcome};

use crate::hal::SimHal;
use crate::trace::{TraceContent, TraceDirection, TraceLog};

/// End-to-end scenario state: one of each layer, wired together exactly as
/// `tg-firmware`'s scheduler would, but driven from a test rather than a
/// super-loop.
pub struct ScenarioRunner {
    pub cm: CanonicalMachine,
    pub planner: Planner,
    pub runtime: Runtime,
    pub hal: SimHal,
    dda: Dda,
    pub trace: TraceLog,
}

impl ScenarioRunner {
    pub fn new(axes: AxesConfig, steps_per_mm: [f64; tg_core::axes::AXIS_COUNT]) -> Self {
        let mut cm = CanonicalMachine::new(axes.clone());
        cm.ready();
        Self {
            cm,
            planner: Planner::new(axes),
            runtime: Runtime::new(steps_per_mm),
            hal: SimHal::new(8, 1_000_000),
            dda: Dda::new(),
            trace: TraceLog::new(),
        }
    }

    /// Applies one parsed G-code block to the canonical machine.
    pub fn apply(&mut self, input: &GCodeInput) -> Stat {
        self.cm.apply_block(input, &mut self.planner)
    }

    /// Runs the planner's replan pass once (main-loop task 3).
    pub fn replan(&mut self) {
        self.planner.replan();
    }

    /// Drains every queued block all the way through the DDA, stepping the
    /// trace log as it goes. Intended for scenario tests where the point
    /// is the final machine state, not interleaving with new input.
    pub fn run_to_completion(&mut self) {
        loop {
            if !self.runtime.is_busy() {
                match self.runtime.load_next_block(&mut self.planner) {
                    Stat::Ok | Stat::Noop => {}
                    Stat::Eagain | Stat::Err(_) => {
                        if !self.runtime.is_busy() {
                            break;
                        }
                    }
                }
            }

            match self.runtime.prep_next_segment() {
                Stat::Ok => {
                    if let Some(segment) = self.runtime.swap_prep_exec() {
                        self.trace.record(
                            TraceDirection::CoreToHal,
                            TraceContent::SegmentLoaded {
                                dda_period_ticks: segment.dda_period_ticks,
                            },
                        );
                        self.dda.load(&segment, &mut self.hal);
                        self.run_dda_to_completion();
                        self.runtime.exec_consumed();
                    }
                }
                Stat::Noop => {
                    if !self.runtime.is_busy() && self.planner.is_empty() {
                        break;
                    }
                }
                Stat::Eagain | Stat::Err(_) => break,
            }
        }
    }

    fn run_dda_to_completion(&mut self) {
        loop {
            match self.dda.tick(&mut self.hal) {
                DdaOutcome::Stepped | DdaOutcome::Idle => {}
                DdaOutcome::SegmentDone => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_core::axes::X;
    use tg_core::model::MotionWord;

    fn input(word: MotionWord, x: f64, feed: Option<f64>) -> GCodeInput {
        let mut gi = GCodeInput::default();
        gi.motion_word = Some(word);
        gi.axis_words[X] = Some(x);
        gi.feed_rate = feed;
        gi
    }

    #[test]
    fn a_single_feed_move_steps_the_dominant_axis_exactly_to_target() {
        let axes = AxesConfig::default();
        let mut runner = ScenarioRunner::new(axes, [100.0; tg_core::axes::AXIS_COUNT]);
        assert_eq!(
            runner.apply(&input(MotionWord::G1, 10.0, Some(600.0))),
            Stat::Ok
        );
        runner.replan();
        runner.run_to_completion();

        assert_eq!(runner.hal.positions[X], 1000);
        assert_eq!(runner.cm.gmx.position[X], 10.0);
    }
}
