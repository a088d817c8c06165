//! Wire-facing error/alarm codes for the console (spec §7).
//!
//! [`tg_core::error::CoreError`] is the structured type the core hands
//! back internally; this is the small numeric code that goes out over the
//! serial line alongside the one-line human-readable message, in the
//! tradition of TinyG's status-code table.

use tg_core::error::{Alarm, CoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolError {
    pub code: u16,
    pub message: &'static str,
}

/// Looks up the wire code and one-line message for a [`CoreError`].
pub const fn protocol_error(err: CoreError) -> ProtocolError {
    match err {
        CoreError::UnknownWord => ProtocolError {
            code: 2,
            message: "unrecognised G/M word",
        },
        CoreError::ValueOutOfRange => ProtocolError {
            code: 7,
            message: "value out of range",
        },
        CoreError::InverseTimeFeedInvalid => ProtocolError {
            code: 14,
            message: "inverse-time feed requires a nonzero F word",
        },
        CoreError::ZeroLengthMove => ProtocolError {
            code: 15,
            message: "move collapsed to zero length",
        },
        CoreError::ArcSpecificationError => ProtocolError {
            code: 16,
            message: "arc centre/radius specification invalid",
        },
        CoreError::SoftLimitExceeded => ProtocolError {
            code: 17,
            message: "target outside soft-limited travel",
        },
        CoreError::MissingAxisWord => ProtocolError {
            code: 18,
            message: "required axis word missing",
        },
        CoreError::MemoryCorruption => ProtocolError {
            code: 19,
            message: "magic guard word mismatch",
        },
        CoreError::RingInvariantViolated => ProtocolError {
            code: 20,
            message: "planner ring invariant violated",
        },
        CoreError::LimitSwitchHit => ProtocolError {
            code: 2, // matches TinyG's ALARM_LIMIT_SWITCH_HIT numbering
            message: "limit switch hit outside homing",
        },
        CoreError::ProbeFailed => ProtocolError {
            code: 3,
            message: "probe failed to find contact",
        },
        CoreError::StallDetected => ProtocolError {
            code: 8,
            message: "stepper stall / loss of position",
        },
        CoreError::Shutdown => ProtocolError {
            code: 1,
            message: "external e-stop or interlock",
        },
    }
}

/// `true` if `alarm` should be surfaced to the console as an `alarm`-class
/// message rather than a recoverable one-liner.
pub const fn is_alarm_class(alarm: Alarm) -> bool {
    matches!(alarm, Alarm::Alarm(_) | Alarm::Panic(_) | Alarm::Shutdown)
}
