//! Error and status taxonomy for the motion core.
//!
//! Every entry point in [`crate::canonical_machine`], [`crate::planner`] and
//! [`crate::runtime`] returns a [`Stat`]. `Eagain` is a scheduling hint, not
//! an error: callers in the main loop restart their task sequence from the
//! top when they see it. Anything else funnels into a one-line message plus
//! a structured [`CoreError`] for the console; fatal conditions additionally
//! raise an [`Alarm`].

/// The `{ok, eagain, noop, error}` discriminant every main-loop task returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    /// The task made progress and completed.
    Ok,
    /// The task could not make progress right now (ring full/empty); the
    /// scheduler should restart its task sequence, not treat this as failure.
    Eagain,
    /// The task had nothing to do.
    Noop,
    /// The task failed; see the carried [`CoreError`].
    Err(CoreError),
}

/// Input/semantic/runtime error taxonomy (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    // --- Input errors: report, discard block, continue. ---
    /// An unrecognised G/M word or word combination.
    UnknownWord,
    /// A numeric value fell outside its legal range.
    ValueOutOfRange,
    /// `G93` (inverse time feed) specified with no feed rate or zero length.
    InverseTimeFeedInvalid,

    // --- Semantic errors: report, discard block, continue. ---
    /// The move collapsed to zero length after offset resolution.
    ZeroLengthMove,
    /// `G2`/`G3` geometry was degenerate (e.g. centre equals an endpoint).
    ArcSpecificationError,
    /// A target fell outside a soft-limited axis's travel envelope.
    SoftLimitExceeded,
    /// A required axis word was missing for the active motion mode.
    MissingAxisWord,

    // --- Runtime assertions: panic, halt steppers, require hard reset. ---
    /// A magic guard word did not match its expected constant.
    MemoryCorruption,
    /// The planner ring's `write -> plan -> run -> write` invariant broke.
    RingInvariantViolated,

    // --- Alarm conditions: halt motion, preserve state for inspection. ---
    /// A limit switch tripped outside of a homing cycle.
    LimitSwitchHit,
    /// A probe cycle failed to find a contact within its travel.
    ProbeFailed,
    /// A stepper stall or loss-of-position was detected.
    StallDetected,

    // --- Shutdown: immediate stop, full state dump. ---
    /// An external e-stop or interlock input tripped.
    Shutdown,
}

impl CoreError {
    /// `true` for errors that only require discarding the offending block.
    pub const fn is_recoverable(self) -> bool {
        matches!(
            self,
            CoreError::UnknownWord
                | CoreError::ValueOutOfRange
                | CoreError::InverseTimeFeedInvalid
                | CoreError::ZeroLengthMove
                | CoreError::ArcSpecificationError
                | CoreError::SoftLimitExceeded
                | CoreError::MissingAxisWord
        )
    }

    /// `true` for errors that must freeze motion state for operator review
    /// but do not require a hard reset (the *alarm* class of spec §7).
    pub const fn is_alarm(self) -> bool {
        matches!(
            self,
            CoreError::LimitSwitchHit | CoreError::ProbeFailed | CoreError::StallDetected
        )
    }

    /// `true` for errors that require a hard reset before anything else can
    /// run (the *runtime assertion* class of spec §7).
    pub const fn is_panic(self) -> bool {
        matches!(
            self,
            CoreError::MemoryCorruption | CoreError::RingInvariantViolated
        )
    }
}

/// The machine-wide alarm state. Distinct from [`CoreError`]: an `Alarm` is
/// a sticky condition the combined-state machine (spec §6.3) observes,
/// whereas a `CoreError` is the one-shot return value that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alarm {
    #[default]
    None,
    /// Recoverable: `clear` returns the machine to `ready`.
    Soft(CoreError),
    /// Motion halted, state preserved for inspection; requires `clear`.
    Alarm(CoreError),
    /// Stepper halted immediately; requires a hard reset.
    Panic(CoreError),
    /// External e-stop/interlock; full state was dumped.
    Shutdown,
}

impl Alarm {
    pub const fn is_active(self) -> bool {
        !matches!(self, Alarm::None)
    }

    /// Classify a [`CoreError`] into the alarm state it should raise, or
    /// `None` if the error is merely recoverable-per-block.
    pub fn classify(err: CoreError) -> Option<Alarm> {
        if err.is_panic() {
            Some(Alarm::Panic(err))
        } else if err.is_alarm() {
            Some(Alarm::Alarm(err))
        } else {
            None
        }
    }
}
