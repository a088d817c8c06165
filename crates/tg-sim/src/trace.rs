//! Golden-trace recording, in the spirit of the workspace's earlier
//! host/MCU trace log but synchronous and free of wall-clock timestamps
//! (a scenario run must produce byte-identical JSON on every run for CI
//! diffing to be useful).

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum TraceDirection {
    CoreToHal,
    HalToCore,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum TraceContent {
    Step { motor_index: usize, forward: bool },
    DirectionSet { motor_index: usize, forward: bool },
    SwitchRead { input_index: usize, triggered: bool },
    SegmentLoaded { dda_period_ticks: u32 },
    RealtimeCommand(&'static str),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    /// A monotonically increasing simulation step counter, standing in for
    /// the wall-clock timestamp a real trace would carry.
    pub sequence: u64,
    pub direction: TraceDirection,
    pub content: TraceContent,
}

/// An ordered, append-only trace of a scenario run.
#[derive(Default, Debug, Clone)]
pub struct TraceLog {
    entries: Vec<TraceEntry>,
    next_sequence: u64,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, direction: TraceDirection, content: TraceContent) {
        self.entries.push(TraceEntry {
            sequence: self.next_sequence,
            direction,
            content,
        });
        self.next_sequence += 1;
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_are_assigned_in_recording_order() {
        let mut log = TraceLog::new();
        log.record(
            TraceDirection::CoreToHal,
            TraceContent::Step {
                motor_index: 0,
                forward: true,
            },
        );
        log.record(
            TraceDirection::CoreToHal,
            TraceContent::Step {
                motor_index: 1,
                forward: false,
            },
        );
        assert_eq!(log.entries()[0].sequence, 0);
        assert_eq!(log.entries()[1].sequence, 1);
    }

    #[test]
    fn json_round_trip_preserves_entries() {
        let mut log = TraceLog::new();
        log.record(
            TraceDirection::HalToCore,
            TraceContent::SwitchRead {
                input_index: 2,
                triggered: true,
            },
        );
        let json = log.to_json().unwrap();
        let restored: Vec<TraceEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, log.entries());
    }
}
