//! Event fan-out to live connections.

pub mod engine;
pub mod gate;

pub use engine::FanoutEngine;
pub use gate::{GateOutcome, ReorderGate, Skip};
