//! # Motion Control Core
//!
//! The canonical-machine, look-ahead planner and segment-executor layers of
//! a multi-axis CNC motion controller (`no_std`-friendly, usable on both
//! host and MCU).
//!
//! Data flows `canonical_machine` -> `arc` -> `planner` -> `runtime`; the
//! runtime hands fully-quantised [`model::Segment`]s to a stepper DDA that
//! lives in the `tg-hal` crate. None of the layers here know about real
//! hardware: they speak to the outside world only through the small set of
//! callback points described in [`error::Stat`] and the HAL traits defined
//! downstream.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
use libm as _;

pub mod axes;
pub mod arc;
pub mod canonical_machine;
pub mod error;
pub mod model;
pub mod planner;
pub mod ring;
pub mod runtime;
pub mod units;

pub use axes::{AxisConfig, AxisIndex, AxisMode, AXIS_COUNT};
pub use canonical_machine::CanonicalMachine;
pub use error::{Alarm, CoreError, Stat};
pub use model::{GCodeState, MoveBlock, Segment};
pub use planner::Planner;
pub use runtime::Runtime;
