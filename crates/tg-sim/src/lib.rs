//! # In-Process Simulation Harness
//!
//! A deterministic simulation environment for the motion controller's
//! hardware abstraction layer, used for CI and scenario testing without
//! physical hardware. Earlier revisions of this workspace drove the
//! simulated MCU over a Unix socket with `tokio`; the controller here has
//! no asynchronous I/O anywhere in its design (spec §5's super-loop is
//! single-threaded and cooperative), so the harness drives `tg-hal`'s
//! traits with direct, synchronous calls instead — one simulated tick is
//! one function call, which is what makes the traces reproducible byte
//! for byte across runs.
//!
//! The two primary components are [`hal::SimHal`], which implements every
//! `tg-hal` trait against in-memory state, and [`trace`], which records a
//! JSON-serialisable log of every pulse, switch read and segment load for
//! golden-trace comparison in CI.

pub mod hal;
pub mod scenario;
pub mod trace;

pub use hal::SimHal;
pub use scenario::ScenarioRunner;
pub use trace::{TraceContent, TraceDirection, TraceEntry, TraceLog};
