//! # chathub-auth
//!
//! Session lifecycle for ChatHub.
//!
//! ## Modules
//!
//! - `jwt`: signed short-lived access tokens
//! - `token`: opaque refresh token generation and hashing
//! - `session`: issue, refresh with single-use rotation, revoke, sweep,
//!   and access validation backed by a short-TTL session-active cache

pub mod jwt;
pub mod session;
pub mod token;

pub use jwt::{AccessToken, Claims, JwtDecoder, JwtEncoder};
pub use session::{IssueRequest, IssuedSession, SessionLimiter, SessionManager, TokenPair};
