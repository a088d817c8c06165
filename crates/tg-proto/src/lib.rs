#![deny(clippy::all)]
#![cfg_attr(not(feature = "std"), no_std)]

//! # Motion Controller External Interfaces
//!
//! The ASCII-facing half of the controller (spec §6): the single-character
//! real-time command scanner that rides ahead of the line buffer, the
//! combined-state code table exposed to UIs, the status report shape, and
//! the G-code word vocabulary the line parser is allowed to see.
//!
//! ## Key Components
//!
//! - **[`realtime`]**: A zero-copy scanner that pulls `!`/`~`/`%`/`^X` out of
//!   a raw byte stream before it ever reaches the line buffer.
//! - **[`status`]**: [`status::StatusReport`], the structured record emitted
//!   on demand or at configured intervals (spec §6.4).
//! - **[`words`]**: The fixed set of G-code letters the line parser accepts
//!   (spec §6.1).
//! - **[`error`]**: Protocol-level error/alarm codes for the console, in the
//!   tradition of TinyG's wire-level status codes.

pub mod error;
pub mod realtime;
pub mod status;
pub mod words;

pub use error::ProtocolError;
pub use realtime::RealtimeCommand;
pub use status::StatusReport;
