//! Arc decomposition (spec §4.2), ported from the Marlin/Klipper
//! `plan_arc` algorithm: resolve a circle centre from IJK offsets or a
//! radius word, then walk it in fixed angular increments, emitting one
//! straight-line target per increment.
//!
//! Re-modelled per spec §9 as an iterator owned by the canonical machine
//! rather than a flag stashed in the move block: [`ArcGenerator`] holds
//! just enough state (current angle, remaining segments) to resume across
//! scheduler ticks, and yields one segment target at a time.

use crate::error::CoreError;
use crate::model::Plane;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcDirection {
    Clockwise,
    CounterClockwise,
}

/// Everything the CM knows about a `G2`/`G3` call once IJK/R resolution is
/// done, handed to [`ArcGenerator::new`].
#[derive(Debug, Clone, Copy)]
pub struct ArcSpec {
    pub plane: Plane,
    pub direction: ArcDirection,
    /// Endpoint in the two in-plane axes plus the helical (through-plane)
    /// axis, all in canonical mm, current position first.
    pub start: [f64; 3],
    pub end: [f64; 3],
    /// Centre offset from `start`, in-plane (I/J, I/K or J/K depending on
    /// `plane`). Already resolved from radius form if the block used `R`.
    pub offset: (f64, f64),
    pub feed_rate: f64,
    pub chordal_tolerance: f64,
    pub min_segment_length: f64,
}

impl ArcSpec {
    /// Resolve `R`-form into an IJK-equivalent offset (spec §4.2 step 2).
    /// Negative radius means "take the long way round" (travel > 180 deg).
    pub fn offset_from_radius(
        start_alpha: f64,
        start_beta: f64,
        end_alpha: f64,
        end_beta: f64,
        radius: f64,
        direction: ArcDirection,
    ) -> Option<(f64, f64)> {
        let dx = end_alpha - start_alpha;
        let dy = end_beta - start_beta;
        let chord_sq = dx * dx + dy * dy;
        if chord_sq <= f64::EPSILON {
            return None;
        }
        let half_chord = libm_sqrt(chord_sq) / 2.0;
        let r_abs = radius.abs();
        if half_chord > r_abs {
            return None;
        }
        let mid_to_center = libm_sqrt(r_abs * r_abs - half_chord * half_chord);
        let mid_x = (start_alpha + end_alpha) / 2.0;
        let mid_y = (start_beta + end_beta) / 2.0;
        // Perpendicular to the chord, unit length.
        let perp_x = -dy / (2.0 * half_chord);
        let perp_y = dx / (2.0 * half_chord);

        let sign = match (radius >= 0.0, direction) {
            (true, ArcDirection::Clockwise) => -1.0,
            (true, ArcDirection::CounterClockwise) => 1.0,
            (false, ArcDirection::Clockwise) => 1.0,
            (false, ArcDirection::CounterClockwise) => -1.0,
        };

        let center_x = mid_x + sign * perp_x * mid_to_center;
        let center_y = mid_y + sign * perp_y * mid_to_center;
        Some((center_x - start_alpha, center_y - start_beta))
    }
}

/// Iterator/generator object (spec §9) yielding successive straight-line
/// targets that approximate the arc. Exhausts after the final segment,
/// which always lands exactly on `spec.end`.
pub struct ArcGenerator {
    spec: ArcSpec,
    center_alpha: f64,
    center_beta: f64,
    angular_travel: f64,
    linear_travel: f64,
    theta_per_segment: f64,
    linear_per_segment: f64,
    segments_total: u32,
    segment_index: u32,
}

impl ArcGenerator {
    pub fn new(spec: ArcSpec) -> Result<Self, CoreError> {
        let r_p = -spec.offset.0;
        let r_q = -spec.offset.1;
        let center_alpha = spec.start[0] - r_p;
        let center_beta = spec.start[1] - r_q;
        let rt_alpha = spec.end[0] - center_alpha;
        let rt_beta = spec.end[1] - center_beta;

        let mut angular_travel = (r_p * rt_beta - r_q * rt_alpha).atan2(r_p * rt_alpha + r_q * rt_beta);
        if angular_travel < 0.0 {
            angular_travel += 2.0 * core::f64::consts::PI;
        }
        if spec.direction == ArcDirection::Clockwise {
            angular_travel -= 2.0 * core::f64::consts::PI;
        }
        if angular_travel == 0.0 && spec.start[0] == spec.end[0] && spec.start[1] == spec.end[1] {
            angular_travel = 2.0 * core::f64::consts::PI;
        }

        let linear_travel = spec.end[2] - spec.start[2];
        let radius = libm_hypot(r_p, r_q);
        if radius <= f64::EPSILON {
            return Err(CoreError::ArcSpecificationError);
        }
        let flat_mm = radius * angular_travel;
        let length = if linear_travel != 0.0 {
            libm_hypot(flat_mm, linear_travel)
        } else {
            flat_mm.abs()
        };

        let chord_len = chord_length_for(spec.chordal_tolerance, radius);
        let seg_len = if chord_len > spec.min_segment_length {
            chord_len
        } else {
            spec.min_segment_length
        };
        if seg_len < spec.min_segment_length || length < spec.min_segment_length {
            return Err(CoreError::ArcSpecificationError);
        }

        let segments_total = ((length / seg_len).floor() as u32).max(1);

        Ok(Self {
            spec,
            center_alpha,
            center_beta,
            angular_travel,
            linear_travel,
            theta_per_segment: angular_travel / segments_total as f64,
            linear_per_segment: linear_travel / segments_total as f64,
            segments_total,
            segment_index: 0,
        })
    }

    pub fn segments_total(&self) -> u32 {
        self.segments_total
    }

    pub fn feed_rate(&self) -> f64 {
        self.spec.feed_rate
    }

    /// Advance by one segment, returning the next straight-line target in
    /// the arc's two in-plane axes plus helical axis, or `None` once the
    /// arc is exhausted.
    pub fn next_target(&mut self) -> Option<[f64; 3]> {
        if self.segment_index >= self.segments_total {
            return None;
        }
        self.segment_index += 1;
        if self.segment_index == self.segments_total {
            return Some(self.spec.end);
        }
        let i = self.segment_index as f64;
        let dist_helical = i * self.linear_per_segment;
        let theta = i * self.theta_per_segment;
        let cos_t = theta.cos();
        let sin_t = theta.sin();
        let r_p = -self.spec.offset.0 * cos_t + self.spec.offset.1 * sin_t;
        let r_q = -self.spec.offset.0 * sin_t - self.spec.offset.1 * cos_t;
        Some([
            self.center_alpha + r_p,
            self.center_beta + r_q,
            self.spec.start[2] + dist_helical,
        ])
    }

    /// `true` once [`Self::next_target`] has yielded its final segment.
    pub fn is_exhausted(&self) -> bool {
        self.segment_index >= self.segments_total
    }

    pub fn angular_travel(&self) -> f64 {
        self.angular_travel
    }
}

/// Segment length bound by chordal-deviation tolerance (spec §4.2 step 4):
/// `2 * sqrt(2*r*tol - tol^2)`, the chord of a circular segment whose sagitta
/// is `tol`.
fn chord_length_for(chordal_tolerance: f64, radius: f64) -> f64 {
    if radius <= chordal_tolerance {
        return radius.max(0.0);
    }
    2.0 * libm_sqrt(2.0 * radius * chordal_tolerance - chordal_tolerance * chordal_tolerance)
}

#[cfg(feature = "std")]
fn libm_sqrt(x: f64) -> f64 {
    x.sqrt()
}
#[cfg(not(feature = "std"))]
fn libm_sqrt(x: f64) -> f64 {
    libm::sqrt(x)
}

#[cfg(feature = "std")]
fn libm_hypot(x: f64, y: f64) -> f64 {
    x.hypot(y)
}
#[cfg(not(feature = "std"))]
fn libm_hypot(x: f64, y: f64) -> f64 {
    libm::hypot(x, y)
}
