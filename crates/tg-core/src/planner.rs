//! Look-ahead jerk-limited trajectory planner (spec §4.3).
//!
//! Grounded on the teacher's `MotionPlanner` (junction-deviation lookahead
//! over a small queue, `recalculate_timing`'s trapezoid/triangle split,
//! `get_velocity_and_accel`'s piecewise S-curve) generalised from a
//! fixed 2-deep lookahead `Deque` to a full ring-buffer backward/forward
//! pass over every block between `plan` and `write` (spec §4.3.1/§4.3.4/
//! §4.3.5), and from a single jerk-time split to the closed-form ramp
//! length used for head/body/tail assignment (spec §4.3.6).

use crate::axes::{AxesConfig, AXIS_COUNT};
use crate::error::Stat;
use crate::model::{MoveBlock, MoveState, MoveType, PathControl, PlanHint};
use crate::ring::{MoveRing, RingIndex};
use heapless::Vec as HVec;

/// Below this, a move is geometrically indistinguishable from zero and is
/// silently dropped (spec §8 boundary behaviour).
pub const MIN_LINE_LENGTH: f64 = 0.0001;

pub const PLANNER_CAPACITY: usize = crate::ring::DEFAULT_RING_CAPACITY;

#[cfg(feature = "std")]
fn cbrt(x: f64) -> f64 {
    x.cbrt()
}
#[cfg(not(feature = "std"))]
fn cbrt(x: f64) -> f64 {
    libm::cbrt(x)
}

#[cfg(feature = "std")]
fn sqrt(x: f64) -> f64 {
    x.sqrt()
}
#[cfg(not(feature = "std"))]
fn sqrt(x: f64) -> f64 {
    libm::sqrt(x)
}

#[cfg(feature = "std")]
fn powf(x: f64, y: f64) -> f64 {
    x.powf(y)
}
#[cfg(not(feature = "std"))]
fn powf(x: f64, y: f64) -> f64 {
    libm::pow(x, y)
}

/// `ℓ(v1, v2) = |v2 - v1| * sqrt(|v2 - v1| / jerk)` (spec §4.3.6): the
/// distance covered by a symmetric jerk-limited ramp between two
/// velocities.
fn ramp_length(v1: f64, v2: f64, jerk: f64) -> f64 {
    let dv = (v2 - v1).abs();
    if dv < f64::EPSILON || jerk <= 0.0 {
        return 0.0;
    }
    dv * sqrt(dv / jerk)
}

/// `a_max = cbrt(jerk * length)` (spec §4.3.4): an estimate of the peak
/// achievable acceleration over a move of this length, used by the
/// backward/forward passes before the exact head/tail solve.
fn max_achievable_accel(jerk: f64, length: f64) -> f64 {
    if jerk <= 0.0 || length <= 0.0 {
        return 0.0;
    }
    cbrt(jerk * length)
}

/// Largest velocity step reachable by a jerk-limited ramp over `length`,
/// i.e. the inverse of [`ramp_length`] solved for `dv`.
fn max_dv_over_length(length: f64, jerk: f64) -> f64 {
    if jerk <= 0.0 || length <= 0.0 {
        return 0.0;
    }
    powf(length * sqrt(jerk), 2.0 / 3.0)
}

pub struct Planner {
    ring: MoveRing<PLANNER_CAPACITY>,
    axes: AxesConfig,
    /// Centripetal-acceleration constant used by the junction-velocity
    /// formula (spec §4.3.3). Not given a canonical value by the spec;
    /// chosen here as a config knob rather than hard-coded.
    pub junction_acceleration: f64,
    /// Exit velocity frozen into the last block handed to the runtime,
    /// i.e. the boundary condition for the next backward pass.
    boundary_exit_velocity: f64,
}

impl Planner {
    pub fn new(axes: AxesConfig) -> Self {
        Self {
            ring: MoveRing::new(),
            axes,
            junction_acceleration: 2_000_000.0,
            boundary_exit_velocity: 0.0,
        }
    }

    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Submit a geometrically-complete block (CM has already resolved
    /// target/unit_vector/length). Performs §4.3.2 per-block preparation
    /// and pushes it onto the ring; `Eagain` if the ring is full.
    pub fn enqueue(&mut self, mut block: MoveBlock) -> Stat {
        if block.move_type != MoveType::Dwell && block.length < MIN_LINE_LENGTH {
            return Stat::Noop;
        }
        self.prepare_block(&mut block);
        match self.ring.push(block) {
            Some(_) => Stat::Ok,
            None => Stat::Eagain,
        }
    }

    /// §4.3.2: minimum time, move time, cruise ceiling, and cached jerk.
    fn prepare_block(&self, block: &mut MoveBlock) {
        let mut minimum_time = 0.0_f64;
        let mut jerk = f64::INFINITY;
        for axis in 0..AXIS_COUNT {
            let delta = block.unit_vector[axis] * block.length;
            if delta.abs() < f64::EPSILON {
                continue;
            }
            let cfg = self.axes.axis(axis);
            let axis_time = delta.abs() / cfg.feedrate_max;
            if axis_time > minimum_time {
                minimum_time = axis_time;
            }
            if cfg.jerk_max < jerk {
                jerk = cfg.jerk_max;
            }
        }
        if !jerk.is_finite() {
            jerk = self.axes.axis(0).jerk_max;
        }

        let feed_rate = block.gcode.feed_rate.max(f64::EPSILON);
        let move_time = (block.length / feed_rate).max(minimum_time);
        block.gcode.minimum_time = minimum_time;
        block.gcode.move_time = move_time;

        let cruise_vmax = if move_time > f64::EPSILON {
            block.length / move_time
        } else {
            0.0
        };
        block.cruise_vmax = cruise_vmax;
        block.entry_vmax = cruise_vmax;
        block.exit_vmax = cruise_vmax;
        block.cruise_velocity = cruise_vmax;
        block.entry_velocity = 0.0;
        block.exit_velocity = 0.0;
        block.jerk = jerk;
        block.recip_jerk = if jerk > 0.0 { 1.0 / jerk } else { 0.0 };
        block.cbrt_jerk = cbrt(jerk);
        block.move_state = MoveState::Queued;
        if block.move_type == MoveType::Null {
            block.move_type = MoveType::Aline;
        }
    }

    /// Junction velocity between two consecutive blocks (spec §4.3.3),
    /// already clamped by cruise ceilings and junction aggression, and
    /// downgraded per the path-control rule of the *arriving* block
    /// (spec §4.3.7).
    fn junction_velocity(&self, prev: &MoveBlock, next: &MoveBlock) -> f64 {
        let max_v = prev.cruise_vmax.min(next.cruise_vmax);

        match next.gcode.path_control {
            PathControl::ExactStop => return 0.0,
            _ => {}
        }

        let mut cos_theta = 0.0;
        for axis in 0..AXIS_COUNT {
            cos_theta += prev.unit_vector[axis] * next.unit_vector[axis];
        }
        let cos_theta = cos_theta.clamp(-1.0, 1.0);

        let raw = if cos_theta > 1.0 - 1e-6 {
            // Colinear: no cornering constraint, use the cruise ceiling.
            max_v
        } else if cos_theta < -1.0 + 1e-6 {
            // Full reversal: junction must be zero.
            0.0
        } else {
            let sin_half = sqrt(((1.0 - cos_theta) / 2.0).max(0.0));
            let denom = (1.0 - sin_half).max(1e-9);
            let dominant_axis = dominant_axis_of(prev);
            let junction_dev = self.axes.axis(dominant_axis).junction_dev;
            sqrt(self.junction_acceleration * junction_dev * sin_half / denom)
        };

        let mut v = raw.min(max_v);
        v = v.min(self.axes.junction_aggression * max_v);

        if next.gcode.path_control == PathControl::ExactPath && raw > 0.707 * max_v {
            return 0.0;
        }
        v
    }

    /// Run the backward then forward look-ahead passes and the
    /// head/body/tail solve over every block in the replannable window
    /// (spec §4.3.4-§4.3.8). Called once per main-loop iteration (task 3,
    /// spec §5); `Noop` if nothing is queued for replanning.
    pub fn replan(&mut self) -> Stat {
        let indices: HVec<RingIndex, PLANNER_CAPACITY> =
            self.ring.planned_window().map(|(idx, _)| idx).collect();
        if indices.is_empty() {
            return Stat::Noop;
        }
        let n = indices.len();

        let mut entry = HVec::<f64, PLANNER_CAPACITY>::new();
        let mut exit = HVec::<f64, PLANNER_CAPACITY>::new();
        let mut junctions = HVec::<f64, PLANNER_CAPACITY>::new();
        for _ in 0..n {
            let _ = entry.push(0.0);
            let _ = exit.push(0.0);
        }

        for i in 1..n {
            let prev = self.ring.get(indices[i - 1]);
            let next = self.ring.get(indices[i]);
            let _ = junctions.push(self.junction_velocity(prev, next));
        }
        // Continuity with whatever block the runtime is already chewing
        // through: its exit velocity, clamped to what the first window
        // block can actually sustain.
        let boundary_junction = self
            .boundary_exit_velocity
            .min(self.ring.get(indices[0]).cruise_vmax);

        // Backward pass (§4.3.4): newest block's exit is 0 until a
        // following block arrives; walk back to `plan`.
        exit[n - 1] = 0.0;
        for i in (0..n).rev() {
            let block = self.ring.get(indices[i]);
            let a_max = max_achievable_accel(block.jerk, block.length);
            let junction_with_prev = if i == 0 { boundary_junction } else { junctions[i - 1] };
            if i != n - 1 {
                exit[i] = entry[i + 1];
            }
            entry[i] = junction_with_prev.min(sqrt(exit[i] * exit[i] + 2.0 * a_max * block.length));
        }

        // Forward pass (§4.3.5): downgrade exit/next-entry where the
        // forward limit is tighter than what the backward pass allowed.
        for i in 0..n {
            let block = self.ring.get(indices[i]);
            let a_max = max_achievable_accel(block.jerk, block.length);
            let forward_limit = sqrt(entry[i] * entry[i] + 2.0 * a_max * block.length);
            if forward_limit < exit[i] {
                exit[i] = forward_limit;
                if i + 1 < n {
                    entry[i + 1] = entry[i + 1].min(forward_limit);
                }
            }
        }

        // Head/body/tail assignment (§4.3.6), with a bounded number of
        // backward-propagation retries for the "dropping entry" case.
        for _round in 0..3 {
            let mut dropped_any = false;
            for i in 0..n {
                let idx = indices[i];
                let jerk = self.ring.get(idx).jerk;
                let length = self.ring.get(idx).length;
                let e = entry[i];
                let x = exit[i];
                match assign_profile(e, x, length, jerk) {
                    ProfileResult::Fit { cruise, head, body, tail, hint } => {
                        let block = self.ring.get_mut(idx);
                        block.entry_velocity = e;
                        block.exit_velocity = x;
                        block.cruise_velocity = cruise;
                        block.head_length = head;
                        block.body_length = body;
                        block.tail_length = tail;
                        block.hint = hint;
                    }
                    ProfileResult::DropEntry { new_entry } => {
                        entry[i] = new_entry;
                        if i > 0 {
                            exit[i - 1] = exit[i - 1].min(new_entry);
                            dropped_any = true;
                        }
                        let block = self.ring.get_mut(idx);
                        block.entry_velocity = new_entry;
                        block.exit_velocity = x;
                        block.cruise_velocity = new_entry.max(x);
                        block.head_length = 0.0;
                        block.tail_length = length;
                        block.body_length = 0.0;
                        block.hint = PlanHint::DroppingEntry;
                    }
                }
            }
            if !dropped_any {
                break;
            }
        }

        for i in 0..n {
            let block = self.ring.get_mut(indices[i]);
            block.move_state = MoveState::Planned;
        }
        if let Some(&last) = indices.last() {
            self.ring.advance_plan_to(RingIndex(
                (last.0 + 1) % PLANNER_CAPACITY,
            ));
        }
        Stat::Ok
    }

    /// Hand the next planned block to the runtime, recording its exit
    /// velocity as the boundary condition for the next backward pass.
    pub fn pop_for_runtime(&mut self) -> Option<MoveBlock> {
        let idx = self.ring.take_run()?;
        let block = *self.ring.get(idx);
        self.boundary_exit_velocity = block.exit_velocity;
        Some(block)
    }

    /// `%` queue-flush real-time command (spec §6.2): drop every block
    /// not yet claimed by the runtime.
    pub fn flush_queued(&mut self) {
        self.ring.flush_queued();
        self.boundary_exit_velocity = 0.0;
    }

    pub fn axes(&self) -> &AxesConfig {
        &self.axes
    }

    pub fn axes_mut(&mut self) -> &mut AxesConfig {
        &mut self.axes
    }
}

fn dominant_axis_of(block: &MoveBlock) -> usize {
    let mut best = 0;
    let mut best_mag = 0.0_f64;
    for axis in 0..AXIS_COUNT {
        let mag = block.unit_vector[axis].abs();
        if mag > best_mag {
            best_mag = mag;
            best = axis;
        }
    }
    best
}

enum ProfileResult {
    Fit {
        cruise: f64,
        head: f64,
        body: f64,
        tail: f64,
        hint: PlanHint,
    },
    DropEntry {
        new_entry: f64,
    },
}

/// §4.3.6: solve for head/body/tail given a fixed entry/exit pair. Reduces
/// the cruise velocity by bisection when the full-speed ramps don't fit;
/// reports `DropEntry` when even the minimal (zero-cruise-margin) ramp
/// still overruns the block length.
fn assign_profile(entry: f64, exit: f64, length: f64, jerk: f64) -> ProfileResult {
    let floor = entry.max(exit);
    let head0 = ramp_length(entry, floor, jerk);
    let tail0 = ramp_length(floor, exit, jerk);
    if head0 + tail0 > length + 1e-9 {
        let max_dv = max_dv_over_length(length, jerk);
        let new_entry = (exit + max_dv).min(entry);
        return ProfileResult::DropEntry { new_entry };
    }

    // Try the unreduced ceiling first (fast path: ordinary trapezoid).
    // Callers pass entry/exit only; the cruise ceiling itself is folded
    // into `floor..=some upper bound` via bisection below, starting from
    // a generous upper bound derived from the block's own ramp capacity.
    let mut lo = floor;
    let mut hi = floor + max_dv_over_length(length, jerk).max(1.0);
    for _ in 0..40 {
        let mid = 0.5 * (lo + hi);
        let h = ramp_length(entry, mid, jerk);
        let t = ramp_length(mid, exit, jerk);
        if h + t > length {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    let cruise = lo;
    let head = ramp_length(entry, cruise, jerk);
    let tail = ramp_length(cruise, exit, jerk);
    let body = (length - head - tail).max(0.0);

    let hint = if body > f64::EPSILON {
        PlanHint::Trapezoid
    } else if entry <= cruise && exit <= cruise {
        PlanHint::Triangle
    } else if exit >= entry {
        PlanHint::PureAccel
    } else {
        PlanHint::PureDecel
    };

    ProfileResult::Fit {
        cruise,
        head,
        body,
        tail,
        hint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GCodeState;

    fn straight_block(length: f64, dir: [f64; AXIS_COUNT], feed_rate: f64) -> MoveBlock {
        let mut b = MoveBlock::default();
        b.length = length;
        b.unit_vector = dir;
        b.gcode = GCodeState {
            feed_rate,
            ..GCodeState::default()
        };
        b.move_type = MoveType::Aline;
        b
    }

    #[test]
    fn colinear_junction_uses_cruise_ceiling() {
        let axes = AxesConfig::default();
        let mut p = Planner::new(axes);
        let dir = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(p.enqueue(straight_block(10.0, dir, 600.0)), Stat::Ok);
        assert_eq!(p.enqueue(straight_block(10.0, dir, 300.0)), Stat::Ok);
        p.replan();
        let window: HVec<RingIndex, PLANNER_CAPACITY> =
            p.ring.planned_window().map(|(i, _)| i).collect();
        let first = p.ring.get(window[0]);
        // Junction is colinear, so exit of block 1 is clamped by the
        // slower of the two cruise ceilings (block 2's 5 mm/s).
        assert!(first.exit_velocity <= 300.0 / 60.0 + 1e-6);
    }

    #[test]
    fn head_body_tail_sum_matches_length() {
        let axes = AxesConfig::default();
        let mut p = Planner::new(axes);
        let dir = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        p.enqueue(straight_block(50.0, dir, 3000.0));
        p.replan();
        let window: HVec<RingIndex, PLANNER_CAPACITY> =
            p.ring.planned_window().map(|(i, _)| i).collect();
        let b = p.ring.get(window[0]);
        let sum = b.head_length + b.body_length + b.tail_length;
        assert!((sum - b.length).abs() < 1e-6);
        assert!(b.entry_velocity <= b.cruise_velocity + 1e-9);
        assert!(b.exit_velocity <= b.cruise_velocity + 1e-9);
    }

    #[test]
    fn reversal_junction_is_zero() {
        let axes = AxesConfig::default();
        let mut p = Planner::new(axes);
        assert_eq!(
            p.enqueue(straight_block(10.0, [1.0, 0.0, 0.0, 0.0, 0.0, 0.0], 600.0)),
            Stat::Ok
        );
        assert_eq!(
            p.enqueue(straight_block(10.0, [-1.0, 0.0, 0.0, 0.0, 0.0, 0.0], 600.0)),
            Stat::Ok
        );
        p.replan();
        let window: HVec<RingIndex, PLANNER_CAPACITY> =
            p.ring.planned_window().map(|(i, _)| i).collect();
        let first = p.ring.get(window[0]);
        assert!(first.exit_velocity.abs() < 1e-6);
    }

    #[test]
    fn tiny_middle_block_triggers_triangle_profile() {
        // Scenario 3 of spec §8: a short move sandwiched between two fast
        // moves should show a reduced cruise (triangular) profile.
        let axes = AxesConfig::default();
        let mut p = Planner::new(axes);
        let dir = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        p.enqueue(straight_block(100.0, dir, 3000.0));
        p.enqueue(straight_block(0.1, dir, 3000.0));
        p.enqueue(straight_block(100.0, dir, 3000.0));
        p.replan();
        let window: HVec<RingIndex, PLANNER_CAPACITY> =
            p.ring.planned_window().map(|(i, _)| i).collect();
        let middle = p.ring.get(window[1]);
        assert!(middle.cruise_velocity < middle.cruise_vmax + 1e-6);
        assert!(middle.body_length.abs() < 1e-6);
    }
}
