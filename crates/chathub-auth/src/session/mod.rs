//! Session lifecycle management.

pub mod cache;
pub mod limiter;
pub mod manager;
pub mod retry;

pub use cache::SessionActiveCache;
pub use limiter::SessionLimiter;
pub use manager::{IssueRequest, IssuedSession, SessionManager, TokenPair};
pub use retry::RetryPolicy;
