//! Connection lifecycle: handles, queues, the registry, and the driver.

pub mod close;
pub mod driver;
pub mod handle;
pub mod queue;
pub mod registry;
pub mod transport;

pub use close::CloseReason;
pub use driver::ConnectionDriver;
pub use handle::ConnectionHandle;
pub use queue::{OutboundItem, OutboundQueue, PushOutcome};
pub use registry::ConnectionRegistry;
pub use transport::WireFrame;
