//! Real-time clock tick source (spec §6.5 `rtc_tick_hz`).
//!
//! Used by `tg-firmware`'s scheduler to drive G4 dwell timing and status
//! report intervals without any layer above this one touching a hardware
//! timer peripheral directly.

pub trait RtcHal {
    /// The frequency, in Hz, at which [`RtcHal::tick_count`] advances.
    fn tick_hz(&self) -> u32;
    /// A free-running tick counter; wraps silently, callers diff it.
    fn tick_count(&self) -> u32;
}
