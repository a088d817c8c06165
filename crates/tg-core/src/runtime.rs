//! Real-time segment executor (spec §4.4).
//!
//! Grounded on the teacher's `generate_steps`/`get_velocity_and_accel`
//! (piecewise S-curve velocity sampled at each step, Bresenham-style
//! per-axis step accumulation) but reworked from "one step command per
//! motor step" into fixed-duration *segments* covering many steps each,
//! with the per-axis step count for a segment derived from cumulative
//! rounding of the canonical position rather than the teacher's live
//! error accumulator (spec §4.4 step 2's "cumulative rounding" rule is
//! exact; a per-step Bresenham accumulator is delegated to the DDA in
//! `tg-hal`, which only ever sees whole-segment step counts).

use crate::axes::AXIS_COUNT;
use crate::error::Stat;
use crate::model::{MoveBlock, MoveType, Segment};
use crate::planner::Planner;

/// Nominal segment duration (spec §3.4: "nominal 1-10 ms").
pub const DEFAULT_SEGMENT_TIME_S: f64 = 0.005;

#[cfg(feature = "std")]
fn sqrt(x: f64) -> f64 {
    x.sqrt()
}
#[cfg(not(feature = "std"))]
fn sqrt(x: f64) -> f64 {
    libm::sqrt(x)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Head,
    Body,
    Tail,
    Finalize,
    /// A G4 dwell's one synthetic segment: no geometry, `RtcHal`-timed
    /// rather than S-curve velocity sampled.
    Dwell,
}

struct ActiveBlock {
    block: MoveBlock,
    phase: Phase,
    /// Canonical distance travelled along `unit_vector` so far, used both
    /// to know how much is left for `Finalize` and to derive per-axis
    /// step counts by cumulative rounding.
    distance_done: f64,
    /// Last rounded step count per axis, so each segment's step delta is
    /// `round(new) - round(last)` (spec §4.4 step 2).
    last_rounded_steps: [i64; AXIS_COUNT],
    segment_in_phase: u32,
    segments_in_phase: u32,
    segment_time_in_phase: f64,
    /// `(t_half, a_mid, v_mid)` cached once per phase; irrelevant for
    /// `Body`.
    ramp: RampShape,
    /// Instantaneous velocity at the moment a feed-hold was requested,
    /// used to reshape the tail (spec §5's ordering guarantee).
    hold_reshape: Option<HoldReshape>,
}

#[derive(Clone, Copy)]
struct RampShape {
    t_half: f64,
    a_mid: f64,
    v_mid: f64,
    v_entry: f64,
    v_exit: f64,
}

#[derive(Clone, Copy)]
struct HoldReshape {
    velocity_at_hold: f64,
    decel_jerk: f64,
}

pub struct Runtime {
    active: Option<ActiveBlock>,
    position: [f64; AXIS_COUNT],
    steps_per_mm: [f64; AXIS_COUNT],
    nominal_segment_time: f64,
    /// Free-running timer rate the DDA period is expressed in; owned by
    /// the runtime so `tg-hal` only ever consumes whole ticks.
    timer_tick_hz: f64,
    /// Double-buffered handoff to the stepper ISR (spec §5): `prep` is
    /// written here, `exec` is what the "load" interrupt swaps out.
    prep: Option<Segment>,
    exec: Option<Segment>,
    feed_hold_requested: bool,
}

impl Runtime {
    pub fn new(steps_per_mm: [f64; AXIS_COUNT]) -> Self {
        Self {
            active: None,
            position: [0.0; AXIS_COUNT],
            steps_per_mm,
            nominal_segment_time: DEFAULT_SEGMENT_TIME_S,
            timer_tick_hz: 1_000_000.0,
            prep: None,
            exec: None,
            feed_hold_requested: false,
        }
    }

    pub fn with_segment_time(mut self, seconds: f64) -> Self {
        self.nominal_segment_time = seconds;
        self
    }

    pub fn with_timer_tick_hz(mut self, hz: f64) -> Self {
        self.timer_tick_hz = hz;
        self
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// Main-loop task (1): pop a freshly planned block from the planner
    /// if the runtime is idle. `Eagain` if the planner has nothing ready.
    pub fn load_next_block(&mut self, planner: &mut Planner) -> Stat {
        if self.active.is_some() {
            return Stat::Noop;
        }
        let Some(block) = planner.pop_for_runtime() else {
            return Stat::Eagain;
        };
        if block.is_null() {
            return Stat::Noop;
        }
        self.active = Some(self.start_block(block));
        Stat::Ok
    }

    fn start_block(&self, block: MoveBlock) -> ActiveBlock {
        let phase = if block.move_type == MoveType::Dwell {
            Phase::Dwell
        } else if block.head_length > f64::EPSILON {
            Phase::Head
        } else if block.body_length > f64::EPSILON {
            Phase::Body
        } else if block.tail_length > f64::EPSILON {
            Phase::Tail
        } else {
            Phase::Finalize
        };
        let mut active = ActiveBlock {
            block,
            phase,
            distance_done: 0.0,
            last_rounded_steps: round_steps(&self.position, &self.steps_per_mm),
            segment_in_phase: 0,
            segments_in_phase: 0,
            segment_time_in_phase: self.nominal_segment_time,
            ramp: RampShape {
                t_half: 0.0,
                a_mid: 0.0,
                v_mid: 0.0,
                v_entry: 0.0,
                v_exit: 0.0,
            },
            hold_reshape: None,
        };
        self.setup_phase(&mut active);
        active
    }

    fn setup_phase(&self, active: &mut ActiveBlock) {
        if active.phase == Phase::Dwell {
            active.segments_in_phase = 1;
            active.segment_in_phase = 0;
            active.segment_time_in_phase = active.block.gcode.parameter;
            return;
        }
        let b = &active.block;
        let (length, v_entry, v_exit) = match active.phase {
            Phase::Head => (b.head_length, b.entry_velocity, b.cruise_velocity),
            Phase::Body => (b.body_length, b.cruise_velocity, b.cruise_velocity),
            Phase::Tail => (b.tail_length, b.cruise_velocity, b.exit_velocity),
            Phase::Finalize => (0.0, b.exit_velocity, b.exit_velocity),
            Phase::Dwell => unreachable!("handled above"),
        };
        let avg_v = 0.5 * (v_entry + v_exit);
        let phase_time = if avg_v > f64::EPSILON {
            length / avg_v
        } else {
            0.0
        };
        let segments = core::cmp::max(1, round_to_u32(phase_time / self.nominal_segment_time));
        active.segments_in_phase = if length > f64::EPSILON { segments } else { 0 };
        active.segment_in_phase = 0;
        active.segment_time_in_phase = if active.segments_in_phase > 0 {
            phase_time / active.segments_in_phase as f64
        } else {
            0.0
        };

        let dv = (v_exit - v_entry).abs();
        let t_half = if b.jerk > 0.0 && dv > f64::EPSILON {
            sqrt(dv / b.jerk)
        } else {
            0.0
        };
        active.ramp = RampShape {
            t_half,
            a_mid: b.jerk * t_half,
            v_mid: if v_exit >= v_entry {
                v_entry + 0.5 * b.jerk * t_half * t_half
            } else {
                v_entry - 0.5 * b.jerk * t_half * t_half
            },
            v_entry,
            v_exit,
        };
    }

    /// Evaluate the S-curve velocity at phase-local time `tau` (spec
    /// §4.4 step 2's piecewise formula).
    fn velocity_at(&self, active: &ActiveBlock, tau: f64) -> f64 {
        let r = &active.ramp;
        match active.phase {
            Phase::Dwell => 0.0,
            Phase::Body => r.v_entry,
            Phase::Finalize => r.v_exit,
            Phase::Head | Phase::Tail => {
                let rising = r.v_exit >= r.v_entry;
                let sign = if rising { 1.0 } else { -1.0 };
                if tau < r.t_half {
                    r.v_entry + sign * 0.5 * active.block.jerk * tau * tau
                } else {
                    let dt = tau - r.t_half;
                    r.v_mid + sign * r.a_mid * dt - sign * 0.5 * active.block.jerk * dt * dt
                }
            }
        }
    }

    /// Main-loop task (2): prepare the next segment into `prep`. Returns
    /// `Noop` once the active block (including its finalisation segment)
    /// is fully consumed.
    pub fn prep_next_segment(&mut self) -> Stat {
        if self.prep.is_some() {
            // Previous segment hasn't been picked up by the "load" swap
            // yet; nothing to do until the stepper drains it.
            return Stat::Noop;
        }
        let Some(active) = self.active.as_mut() else {
            return Stat::Eagain;
        };

        if active.phase == Phase::Dwell {
            if active.segment_in_phase > 0 {
                self.active = None;
                return Stat::Ok;
            }
            active.segment_in_phase = 1;
            self.prep = Some(Segment {
                segment_time: active.block.gcode.parameter,
                segment_velocity: 0.0,
                segment_length: 0.0,
                steps: [0; AXIS_COUNT],
                dda_period_ticks: 0,
                is_dwell: true,
            });
            return Stat::Ok;
        }

        if active.phase == Phase::Finalize {
            let remaining = active.block.length - active.distance_done;
            if remaining <= 1e-9 {
                self.position = active.block.target;
                self.active = None;
                return Stat::Ok;
            }
            let segment = self.build_segment(remaining, active.ramp.v_exit);
            active.distance_done = active.block.length;
            self.position = active.block.target;
            self.prep = Some(segment);
            self.active = None;
            return Stat::Ok;
        }

        if active.segment_in_phase >= active.segments_in_phase {
            self.advance_phase(active);
            return Stat::Noop;
        }

        let tau = (active.segment_in_phase as f64 + 0.5) * active.segment_time_in_phase;
        let v = self.velocity_at(active, tau);
        let segment_length = v * active.segment_time_in_phase;
        active.segment_in_phase += 1;
        active.distance_done += segment_length;

        let segment = self.build_segment_for_active(active, segment_length, v);
        self.prep = Some(segment);
        Stat::Ok
    }

    fn advance_phase(&mut self, active: &mut ActiveBlock) {
        active.phase = match active.phase {
            Phase::Head => Phase::Body,
            Phase::Body => Phase::Tail,
            Phase::Tail => Phase::Finalize,
            Phase::Finalize => Phase::Finalize,
            Phase::Dwell => Phase::Finalize,
        };
        if active.phase != Phase::Finalize {
            self.setup_phase(active);
        }
    }

    fn build_segment_for_active(&mut self, active: &mut ActiveBlock, length: f64, velocity: f64) -> Segment {
        let unit = active.block.unit_vector;
        let mut new_pos = self.position;
        for axis in 0..AXIS_COUNT {
            new_pos[axis] += unit[axis] * length;
        }
        let new_rounded = round_steps(&new_pos, &self.steps_per_mm);
        let mut steps = [0_i32; AXIS_COUNT];
        let mut max_steps = 0_u32;
        for axis in 0..AXIS_COUNT {
            let d = new_rounded[axis] - active.last_rounded_steps[axis];
            steps[axis] = d as i32;
            max_steps = max_steps.max(d.unsigned_abs() as u32);
        }
        active.last_rounded_steps = new_rounded;
        self.position = new_pos;

        Segment {
            segment_time: active.segment_time_in_phase,
            segment_velocity: velocity,
            segment_length: length,
            steps,
            dda_period_ticks: dda_period(active.segment_time_in_phase, max_steps, self.timer_tick_hz),
            is_dwell: false,
        }
    }

    fn build_segment(&mut self, length: f64, velocity: f64) -> Segment {
        let Some(active) = self.active.as_mut() else {
            return Segment::default();
        };
        self.build_segment_for_active(active, length, velocity)
    }

    /// The "load next" software interrupt of spec §4.5: an indivisible
    /// swap of `prep` into `exec`. Called from the stepper's segment-
    /// exhaustion callback.
    pub fn swap_prep_exec(&mut self) -> Option<Segment> {
        if self.exec.is_some() {
            return None;
        }
        self.exec = self.prep.take();
        self.exec
    }

    pub fn exec_consumed(&mut self) {
        self.exec = None;
    }

    /// `!` feed-hold (spec §5): reshape the current block's tail from the
    /// instantaneous velocity down to zero within the block, rather than
    /// waiting for the next block boundary.
    pub fn request_feed_hold(&mut self) {
        self.feed_hold_requested = true;
        if let Some(active) = self.active.as_mut() {
            if active.hold_reshape.is_none() {
                let tau = (active.segment_in_phase as f64) * active.segment_time_in_phase;
                let v_now = self.velocity_at(active, tau);
                active.hold_reshape = Some(HoldReshape {
                    velocity_at_hold: v_now,
                    decel_jerk: active.block.jerk,
                });
                active.phase = Phase::Tail;
                active.block.exit_velocity = 0.0;
                active.block.cruise_velocity = v_now;
                active.segment_in_phase = 0;
                self.setup_phase(active);
            }
        }
    }

    pub fn is_hold_requested(&self) -> bool {
        self.feed_hold_requested
    }

    pub fn clear_feed_hold(&mut self) {
        self.feed_hold_requested = false;
    }

    pub fn position(&self) -> [f64; AXIS_COUNT] {
        self.position
    }
}

fn round_steps(position: &[f64; AXIS_COUNT], steps_per_mm: &[f64; AXIS_COUNT]) -> [i64; AXIS_COUNT] {
    let mut out = [0_i64; AXIS_COUNT];
    for axis in 0..AXIS_COUNT {
        out[axis] = round_to_i64(position[axis] * steps_per_mm[axis]);
    }
    out
}

fn round_to_i64(x: f64) -> i64 {
    if x >= 0.0 {
        (x + 0.5) as i64
    } else {
        (x - 0.5) as i64
    }
}

fn round_to_u32(x: f64) -> u32 {
    if x <= 0.0 {
        0
    } else {
        (x + 0.5) as u32
    }
}

fn dda_period(segment_time: f64, max_steps: u32, timer_tick_hz: f64) -> u32 {
    if max_steps == 0 {
        return 0;
    }
    let ticks = segment_time * timer_tick_hz / max_steps as f64;
    if ticks < 1.0 {
        1
    } else {
        ticks as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MoveType;

    fn trapezoid_block() -> MoveBlock {
        let mut b = MoveBlock::default();
        b.length = 10.0;
        b.unit_vector = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        b.target = [10.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        b.gcode.feed_rate = 600.0; // 10 mm/s
        b.move_type = MoveType::Aline;
        b
    }

    #[test]
    fn step_conservation_across_all_segments() {
        let mut rt = Runtime::new([100.0; AXIS_COUNT]).with_segment_time(0.01);
        let mut axes = crate::axes::AxesConfig::default();
        axes.axes[crate::axes::X].feedrate_max = 10_000.0;
        let mut planner = Planner::new(axes);
        planner.enqueue(trapezoid_block());
        planner.replan();
        assert_eq!(rt.load_next_block(&mut planner), Stat::Ok);

        let mut total_x_steps: i64 = 0;
        loop {
            match rt.prep_next_segment() {
                Stat::Ok => {
                    if let Some(seg) = rt.swap_prep_exec() {
                        total_x_steps += seg.steps[crate::axes::X] as i64;
                        rt.exec_consumed();
                    }
                }
                Stat::Noop if rt.active.is_none() => break,
                Stat::Noop => continue,
                _ => break,
            }
        }
        assert_eq!(total_x_steps, 1000); // 10 mm * 100 steps/mm
        assert_eq!(rt.position()[crate::axes::X], 10.0);
    }
}
