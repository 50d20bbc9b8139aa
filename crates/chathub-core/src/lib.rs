//! # chathub-core
//!
//! Core crate for ChatHub. Contains the unified error system, configuration
//! schemas, typed identifiers, the session and presence models, the tenant
//! context, domain events, and the collaborator traits implemented by the
//! storage layer.
//!
//! This crate has **no** internal dependencies on other ChatHub crates.

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod models;
pub mod result;
pub mod traits;
pub mod types;

pub use context::TenantContext;
pub use error::{AppError, ErrorKind};
pub use result::AppResult;
