//! Command publishing seam
//!
//! The coordinator emits commands to the worker fleet fire-and-forget; no
//! acknowledgement is awaited and delivery is the transport's concern. The
//! trait keeps the store/API logic independent of the concrete channel.

use crate::error::Result;
use crate::events::Command;

pub use ::async_trait::async_trait;

/// Outbound command channel to the worker fleet
#[async_trait]
pub trait CommandPublisher: Send + Sync {
    /// Emit a command; success means handed to the channel, not delivered
    async fn publish(&self, command: Command) -> Result<()>;
}

/// In-memory publisher for testing
pub mod memory;

pub use memory::MemoryBus;
