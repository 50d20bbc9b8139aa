//! PostgreSQL implementations of the collaborator traits.

pub mod chat;
pub mod sequence;
pub mod session;

pub use chat::PgChatDirectory;
pub use sequence::PgEventLog;
pub use session::PgCredentialStore;
