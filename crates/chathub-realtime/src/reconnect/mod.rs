//! Client reconnection protocol as an explicit state machine.

pub mod clock;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use state::{ConnectionState, FailReason, ReconnectAction, ReconnectMachine, backoff_delay};
