//! # chathub-database
//!
//! Implementations of the `chathub-core` collaborator traits.
//!
//! Two backends are provided: an in-memory one (the default, and what every
//! test runs against) and a PostgreSQL one built on `sqlx`. Both honour the
//! same atomicity contract for session creation and refresh rotation.

pub mod connection;
pub mod error;
pub mod memory;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use memory::{MemoryChatDirectory, MemoryCredentialStore, MemoryEventLog};
pub use migration::run_migrations;
pub use repositories::{PgChatDirectory, PgCredentialStore, PgEventLog};
