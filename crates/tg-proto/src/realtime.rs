//! Single-character real-time commands (spec §6.2).
//!
//! These bytes are stripped out of the serial stream *ahead of* the line
//! buffer: a `!` embedded mid-line still takes effect immediately rather
//! than waiting for the line it interrupts to finish arriving. [`scan`] is
//! the zero-copy, streaming split the rest of the interface (the line
//! buffer) is built around, the same shape as this workspace's other
//! streaming byte-stream scanners.

/// One of the four real-time commands the controller recognises outside of
/// the G-code line grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealtimeCommand {
    /// `!` — request a feed hold; Runtime decelerates the current block to
    /// zero.
    FeedHold,
    /// `~` — resume from hold, or release a program stop.
    CycleStart,
    /// `%` — drop all queued but not-yet-running blocks.
    QueueFlush,
    /// `^X` (0x18) — reset the CM, flush the planner, reset the steppers.
    Reset,
}

const FEED_HOLD: u8 = b'!';
const CYCLE_START: u8 = b'~';
const QUEUE_FLUSH: u8 = b'%';
const RESET: u8 = 0x18;

impl RealtimeCommand {
    /// Classifies a single byte, if it is one of the four real-time
    /// command characters.
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            FEED_HOLD => Some(RealtimeCommand::FeedHold),
            CYCLE_START => Some(RealtimeCommand::CycleStart),
            QUEUE_FLUSH => Some(RealtimeCommand::QueueFlush),
            RESET => Some(RealtimeCommand::Reset),
            _ => None,
        }
    }
}

/// The result of scanning one buffer for real-time commands: the bytes that
/// belong to the line buffer, with every real-time command byte removed and
/// reported separately in arrival order.
pub struct ScanResult<'a, const N: usize> {
    pub line_bytes: &'a [u8],
    pub commands: heapless::Vec<RealtimeCommand, N>,
}

/// Scans `input` for real-time command bytes, splitting them out so the
/// caller can feed the remaining bytes to the line parser undisturbed.
///
/// `N` bounds how many real-time commands can be reported from a single
/// scan; in practice a serial RX buffer rarely carries more than one or two
/// before the main loop drains them, but an ISR cannot block waiting for
/// the caller, so the cap has to be a compile-time constant.
pub fn scan<const N: usize>(input: &[u8], scratch: &mut [u8]) -> ScanResult<'_, N> {
    let mut commands: heapless::Vec<RealtimeCommand, N> = heapless::Vec::new();
    let mut out_len = 0usize;
    for &b in input {
        match RealtimeCommand::from_byte(b) {
            Some(cmd) => {
                let _ = commands.push(cmd);
            }
            None => {
                if out_len < scratch.len() {
                    scratch[out_len] = b;
                    out_len += 1;
                }
            }
        }
    }
    ScanResult {
        line_bytes: &scratch[..out_len],
        commands,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_time_bytes_are_stripped_mid_line() {
        let input = b"G1 X10!F500\n";
        let mut scratch = [0u8; 32];
        let result: ScanResult<4> = scan(input, &mut scratch);
        assert_eq!(result.line_bytes, b"G1 X10F500\n");
        assert_eq!(result.commands.as_slice(), &[RealtimeCommand::FeedHold]);
    }

    #[test]
    fn reset_byte_is_recognised_among_ordinary_bytes() {
        assert_eq!(RealtimeCommand::from_byte(0x18), Some(RealtimeCommand::Reset));
        assert_eq!(RealtimeCommand::from_byte(b'G'), None);
    }

    #[test]
    fn multiple_commands_preserve_arrival_order() {
        let input = b"!~%";
        let mut scratch = [0u8; 8];
        let result: ScanResult<4> = scan(input, &mut scratch);
        assert!(result.line_bytes.is_empty());
        assert_eq!(
            result.commands.as_slice(),
            &[
                RealtimeCommand::FeedHold,
                RealtimeCommand::CycleStart,
                RealtimeCommand::QueueFlush
            ]
        );
    }
}
