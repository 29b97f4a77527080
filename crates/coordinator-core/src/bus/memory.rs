//! In-memory command publisher for testing

use super::{async_trait, CommandPublisher};
use crate::error::Result;
use crate::events::Command;

use tokio::sync::Mutex;

/// Records every published command so tests can assert on the outbound flow
#[derive(Default)]
pub struct MemoryBus {
    published: Mutex<Vec<Command>>,
}

impl MemoryBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// All commands published so far, in order
    pub async fn published(&self) -> Vec<Command> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl CommandPublisher for MemoryBus {
    async fn publish(&self, command: Command) -> Result<()> {
        self.published.lock().await.push(command);
        Ok(())
    }
}
