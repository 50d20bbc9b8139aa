//! # chathub-api
//!
//! HTTP API layer for ChatHub built on Axum.
//!
//! Serves the session endpoints (refresh, logout, device list), the health
//! probe, and the `/ws` upgrade that hands sockets to the real-time
//! connection driver.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
