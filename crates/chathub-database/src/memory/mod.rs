//! Process-local implementations of the collaborator traits.

pub mod chat;
pub mod sequence;
pub mod session;

pub use chat::MemoryChatDirectory;
pub use sequence::MemoryEventLog;
pub use session::MemoryCredentialStore;
