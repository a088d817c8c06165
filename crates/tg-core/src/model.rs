//! The canonical G-code state record and the planner's move-block /
//! segment types (spec §3.2-3.5).
//!
//! `GCodeState` is carried from the canonical machine into planner blocks
//! and finally into the runtime, unchanged in shape at every layer (the
//! "triply-shadowed" state of spec §9, re-modelled here as move-blocks
//! owning their `GCodeState` *by value* rather than three separately
//! mutated copies of one global struct).

use crate::axes::AXIS_COUNT;
use crate::units::UnitsMode;

pub const MAGIC_START: u32 = 0x4841_4E44;
pub const MAGIC_END: u32 = 0x444E_4148;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum MotionMode {
    #[default]
    Rapid,
    Feed,
    CwArc,
    CcwArc,
    Cancel,
    Probe,
    Canned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum FeedRateMode {
    #[default]
    UnitsPerMinute,
    InverseTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum Plane {
    #[default]
    Xy,
    Xz,
    Yz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum PathControl {
    ExactStop,
    ExactPath,
    #[default]
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum DistanceMode {
    #[default]
    Absolute,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum CoordSystem {
    Machine,
    #[default]
    G54,
    G55,
    G56,
    G57,
    G58,
    G59,
}

/// `Machine` plus the six selectable work coordinate systems (spec §4.1).
pub const NUM_COORD_SYSTEMS: usize = 7;

impl CoordSystem {
    /// Index into a `[_; NUM_COORD_SYSTEMS]` offset table.
    pub const fn index(self) -> usize {
        match self {
            CoordSystem::Machine => 0,
            CoordSystem::G54 => 1,
            CoordSystem::G55 => 2,
            CoordSystem::G56 => 3,
            CoordSystem::G57 => 4,
            CoordSystem::G58 => 5,
            CoordSystem::G59 => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum SpindleMode {
    #[default]
    Off,
    Cw,
    Ccw,
}

/// The canonical record carried from the model into planner blocks and
/// finally into the runtime (spec §3.2).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct GCodeState {
    pub line_number: u32,
    pub motion_mode: MotionMode,
    pub target: [f64; AXIS_COUNT],
    pub work_offset: [f64; AXIS_COUNT],
    pub feed_rate: f64,
    pub spindle_speed: f64,
    /// The `P` word: dwell time, coord-select or G10 L-value depending on
    /// context.
    pub parameter: f64,
    /// Optimal move time at the commanded feed rate.
    pub move_time: f64,
    /// Jerk-limited floor on move time (the per-axis feedrate-max bound).
    pub minimum_time: f64,

    pub feed_rate_mode: FeedRateMode,
    pub select_plane: Plane,
    pub units_mode: UnitsMode,
    pub path_control: PathControl,
    pub distance_mode: DistanceMode,
    pub arc_distance_mode: DistanceMode,
    pub absolute_override: bool,
    pub coord_system: CoordSystem,
    pub tool: u8,
    pub tool_select: u8,
    pub mist_coolant: bool,
    pub flood_coolant: bool,
    pub spindle_mode: SpindleMode,
}

impl Default for GCodeState {
    fn default() -> Self {
        Self {
            line_number: 0,
            motion_mode: MotionMode::default(),
            target: [0.0; AXIS_COUNT],
            work_offset: [0.0; AXIS_COUNT],
            feed_rate: 0.0,
            spindle_speed: 0.0,
            parameter: 0.0,
            move_time: 0.0,
            minimum_time: 0.0,
            feed_rate_mode: FeedRateMode::default(),
            select_plane: Plane::default(),
            units_mode: UnitsMode::default(),
            path_control: PathControl::default(),
            distance_mode: DistanceMode::default(),
            arc_distance_mode: DistanceMode::default(),
            absolute_override: false,
            coord_system: CoordSystem::default(),
            tool: 0,
            tool_select: 0,
            mist_coolant: false,
            flood_coolant: false,
            spindle_mode: SpindleMode::default(),
        }
    }
}

/// Model-only extensions to [`GCodeState`] (spec §3.2): canonical position,
/// G92 origin offsets, stored G28/G30 positions, overrides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GCodeStateExtended {
    magic_start: u32,
    pub position: [f64; AXIS_COUNT],
    pub origin_offset: [f64; AXIS_COUNT],
    pub origin_offset_enable: bool,
    pub g28_position: [f64; AXIS_COUNT],
    pub g30_position: [f64; AXIS_COUNT],
    /// Canonical position latched at the moment a G38.2 probe switch trips.
    pub probe_position: [f64; AXIS_COUNT],
    pub feed_rate_override_factor: f64,
    pub feed_rate_override_enable: bool,
    pub traverse_override_factor: f64,
    pub traverse_override_enable: bool,
    pub spindle_override_factor: f64,
    pub spindle_override_enable: bool,
    pub block_delete_switch: bool,
    magic_end: u32,
}

impl Default for GCodeStateExtended {
    fn default() -> Self {
        Self {
            magic_start: MAGIC_START,
            position: [0.0; AXIS_COUNT],
            origin_offset: [0.0; AXIS_COUNT],
            origin_offset_enable: false,
            g28_position: [0.0; AXIS_COUNT],
            g30_position: [0.0; AXIS_COUNT],
            probe_position: [0.0; AXIS_COUNT],
            feed_rate_override_factor: 1.0,
            feed_rate_override_enable: false,
            traverse_override_factor: 1.0,
            traverse_override_enable: false,
            spindle_override_factor: 1.0,
            spindle_override_enable: false,
            block_delete_switch: false,
            magic_end: MAGIC_END,
        }
    }
}

impl GCodeStateExtended {
    /// Walk the guard words; `Err` means memory corruption (spec §3.5).
    pub fn check_integrity(&self) -> Result<(), crate::error::CoreError> {
        if self.magic_start != MAGIC_START || self.magic_end != MAGIC_END {
            Err(crate::error::CoreError::MemoryCorruption)
        } else {
            Ok(())
        }
    }
}

/// A freshly-parsed G-code block plus a parallel bool mask of which fields
/// were present (spec §3.2). The CM applies only the flagged fields, in the
/// strict order of spec §4.1.
#[derive(Debug, Clone, Copy, Default)]
pub struct GCodeInput {
    pub line_number: Option<u32>,
    pub motion_word: Option<MotionWord>,
    pub axis_words: [Option<f64>; AXIS_COUNT],
    pub feed_rate: Option<f64>,
    pub feed_rate_mode: Option<FeedRateMode>,
    pub spindle_speed: Option<f64>,
    pub spindle_mode: Option<SpindleMode>,
    pub tool_select: Option<u8>,
    pub tool_change: bool,
    pub mist_coolant: Option<bool>,
    pub flood_coolant: Option<bool>,
    pub dwell_seconds: Option<f64>,
    pub select_plane: Option<Plane>,
    pub units_mode: Option<UnitsMode>,
    pub coord_system: Option<CoordSystem>,
    pub absolute_override: bool,
    pub path_control: Option<PathControl>,
    pub distance_mode: Option<DistanceMode>,
    pub arc_distance_mode: Option<DistanceMode>,
    pub go_to_g28: bool,
    pub go_to_g30: bool,
    pub store_g28: bool,
    pub store_g30: bool,
    /// G10 L2/L20 coordinate offset write: target system, `true` if `L20`
    /// (offset derived from current position) rather than `L2` (offset
    /// given directly), and the per-axis values present on the line.
    pub coord_offset_write: Option<(CoordSystem, bool, [Option<f64>; AXIS_COUNT])>,
    pub origin_offset_set: Option<[Option<f64>; AXIS_COUNT]>,
    pub origin_offset_suspend: bool,
    pub origin_offset_resume: bool,
    pub origin_offset_reset: bool,
    pub arc_offset: [Option<f64>; 3], // I, J, K
    pub arc_radius: Option<f64>,
    pub program_flow: Option<ProgramFlow>,
    pub block_delete_requested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionWord {
    G0,
    G1,
    G2,
    G3,
    G38_2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramFlow {
    OptionalStop,
    Stop,
    End,
    RewindStop,
}

/// One slot of the planner ring, or conceptually one planned move (spec
/// §3.3). Carries a full copy of the `GCodeState` that produced it, so each
/// layer sees a consistent modal snapshot regardless of replanning
/// elsewhere in the ring.
#[derive(Debug, Clone, Copy)]
pub struct MoveBlock {
    pub gcode: GCodeState,

    pub length: f64,
    pub unit_vector: [f64; AXIS_COUNT],
    pub target: [f64; AXIS_COUNT],

    pub entry_velocity: f64,
    pub cruise_velocity: f64,
    pub exit_velocity: f64,
    pub entry_vmax: f64,
    pub cruise_vmax: f64,
    pub exit_vmax: f64,
    pub braking_velocity: f64,

    pub head_length: f64,
    pub body_length: f64,
    pub tail_length: f64,

    pub jerk: f64,
    pub recip_jerk: f64,
    pub cbrt_jerk: f64,

    pub move_type: MoveType,
    pub move_state: MoveState,
    /// Cache of the last planning outcome, consulted to short-circuit
    /// replanning of blocks whose neighbourhood hasn't changed.
    pub hint: PlanHint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveType {
    #[default]
    Null,
    Aline,
    ArcSegment,
    Dwell,
    Command,
    Tool,
    Spindle,
    Stop,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveState {
    #[default]
    New,
    Queued,
    Planned,
    Running,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanHint {
    #[default]
    None,
    Trapezoid,
    Triangle,
    PureAccel,
    PureDecel,
    DroppingEntry,
}

impl Default for MoveBlock {
    fn default() -> Self {
        Self {
            gcode: GCodeState::default(),
            length: 0.0,
            unit_vector: [0.0; AXIS_COUNT],
            target: [0.0; AXIS_COUNT],
            entry_velocity: 0.0,
            cruise_velocity: 0.0,
            exit_velocity: 0.0,
            entry_vmax: 0.0,
            cruise_vmax: 0.0,
            exit_vmax: 0.0,
            braking_velocity: 0.0,
            head_length: 0.0,
            body_length: 0.0,
            tail_length: 0.0,
            jerk: 0.0,
            recip_jerk: 0.0,
            cbrt_jerk: 0.0,
            move_type: MoveType::Null,
            move_state: MoveState::New,
            hint: PlanHint::None,
        }
    }
}

impl MoveBlock {
    /// `true` once geometric degeneracy (spec §4.3.8) has reduced the
    /// block to a no-op the runtime should skip. A dwell has no geometry
    /// at all and is exempted from the zero-length check.
    pub fn is_null(&self) -> bool {
        self.move_type == MoveType::Null
            || (self.move_type != MoveType::Dwell && self.length < crate::planner::MIN_LINE_LENGTH)
    }
}

/// The runtime's unit of work: constant-acceleration over `segment_time`
/// (spec §3.4).
#[derive(Debug, Clone, Copy, Default)]
pub struct Segment {
    pub segment_time: f64,
    pub segment_velocity: f64,
    pub segment_length: f64,
    pub steps: [i32; AXIS_COUNT],
    /// DDA period in timer ticks, derived from `segment_time` and the
    /// largest per-axis step count in this segment.
    pub dda_period_ticks: u32,
    /// `true` for a G4 dwell's synthetic segment: no steps, `segment_time`
    /// is wall-clock seconds to wait rather than a DDA-timed move. The
    /// scheduler gates these off `RtcHal` instead of the stepper DDA.
    pub is_dwell: bool,
}
