//! Status report (spec §6.4) and the combined-state code table (spec §6.3).

use tg_core::axes::AXIS_COUNT;
use tg_core::canonical_machine::CombinedState;
use tg_core::model::{CoordSystem, DistanceMode, FeedRateMode, MotionMode, Plane};
use tg_core::units::UnitsMode;

/// Maps a [`CombinedState`] onto the fixed `0..13` wire code the UI
/// contract (spec §6.3) promises never to renumber.
pub const fn combined_state_code(state: CombinedState) -> u8 {
    match state {
        CombinedState::Initializing => 0,
        CombinedState::Ready => 1,
        CombinedState::Alarm => 2,
        CombinedState::ProgramStop => 3,
        CombinedState::ProgramEnd => 4,
        CombinedState::Run => 5,
        CombinedState::Hold => 6,
        CombinedState::Probe => 7,
        CombinedState::Cycle => 8,
        CombinedState::Homing => 9,
        CombinedState::Jog => 10,
        CombinedState::Interlock => 11,
        CombinedState::Shutdown => 12,
        CombinedState::Panic => 13,
    }
}

/// The structured record emitted on demand or at configured intervals
/// (spec §6.4).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusReport {
    pub line_number: u32,
    pub machine_position: [f64; AXIS_COUNT],
    pub work_position: [f64; AXIS_COUNT],
    pub velocity: f64,
    pub feed_rate: f64,
    pub motion_mode: MotionMode,
    pub combined_state: u8,
    pub coord_system: CoordSystem,
    pub units: UnitsMode,
    pub distance_mode: DistanceMode,
    pub plane: Plane,
    pub feed_rate_mode: FeedRateMode,
    pub tool: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_state_codes_cover_the_full_zero_to_thirteen_range() {
        let codes = [
            combined_state_code(CombinedState::Initializing),
            combined_state_code(CombinedState::Ready),
            combined_state_code(CombinedState::Alarm),
            combined_state_code(CombinedState::ProgramStop),
            combined_state_code(CombinedState::ProgramEnd),
            combined_state_code(CombinedState::Run),
            combined_state_code(CombinedState::Hold),
            combined_state_code(CombinedState::Probe),
            combined_state_code(CombinedState::Cycle),
            combined_state_code(CombinedState::Homing),
            combined_state_code(CombinedState::Jog),
            combined_state_code(CombinedState::Interlock),
            combined_state_code(CombinedState::Shutdown),
            combined_state_code(CombinedState::Panic),
        ];
        for (i, &code) in codes.iter().enumerate() {
            assert_eq!(code, i as u8);
        }
    }
}
