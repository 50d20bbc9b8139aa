//! Persistent and derived domain models.

pub mod chat;
pub mod presence;
pub mod session;

pub use chat::ChatRecord;
pub use presence::{PresenceState, PresenceStatus};
pub use session::Session;
