//! Wire protocol between gateway and clients.

pub mod envelope;
pub mod types;

pub use envelope::EventEnvelope;
pub use types::{ClientMessage, Handshake, ServerFrame, ServerMessage};
