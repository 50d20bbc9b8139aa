//! Core traits defined in `chathub-core` and implemented by other crates.

pub mod chat_directory;
pub mod credential_store;
pub mod event_log;
pub mod session_listener;

pub use chat_directory::ChatDirectory;
pub use credential_store::{CredentialStore, RotationOutcome};
pub use event_log::EventLog;
pub use session_listener::SessionRevocationListener;
