//! Shared value types.

pub mod id;
pub mod role;
pub mod session_limit;

pub use id::{ChatId, ConnectionId, MessageId, SessionId, TenantId, UserId};
pub use role::UserRole;
pub use session_limit::SessionLimit;
