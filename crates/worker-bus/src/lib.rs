//! Worker Bus
//!
//! Fans commands out from the coordinator to every attached worker
//! connection. Published commands are also kept in a TTL-bounded history so
//! a worker that attaches moments after a command was emitted can still
//! pick it up.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use coordinator_core::bus::{async_trait, CommandPublisher};
use coordinator_core::events::Command;
use coordinator_core::{Error, Result};

/// A command as it went out on the bus
#[derive(Debug, Clone)]
pub struct PublishedCommand {
    /// Monotonic publish sequence number
    pub seq: u64,
    /// The command itself
    pub command: Command,
    /// Publish timestamp
    pub published_at: DateTime<Utc>,
    /// When the history entry stops being replayed
    pub expires_at: DateTime<Utc>,
}

/// Encode a command as a wire frame for worker connections
pub fn encode_frame(command: &Command) -> Result<String> {
    serde_json::to_string(command).map_err(|e| Error::Bus(e.to_string()))
}

/// Broadcast bus with a replay history for late subscribers
pub struct ChannelBus {
    tx: broadcast::Sender<Command>,
    history: DashMap<u64, PublishedCommand>,
    seq: AtomicU64,
    ttl_seconds: i64,
}

impl ChannelBus {
    /// Create a bus with the given subscriber-channel capacity and history TTL
    pub fn new(capacity: usize, ttl_seconds: i64) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            history: DashMap::new(),
            seq: AtomicU64::new(0),
            ttl_seconds,
        }
    }

    /// Attach a live subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<Command> {
        self.tx.subscribe()
    }

    /// Unexpired history in publish order
    pub fn recent(&self) -> Vec<PublishedCommand> {
        let now = Utc::now();
        let mut commands: Vec<PublishedCommand> = self
            .history
            .iter()
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value().clone())
            .collect();
        commands.sort_by_key(|c| c.seq);
        commands
    }

    /// Drop expired history entries
    pub fn cleanup(&self) {
        let now = Utc::now();
        let before = self.history.len();
        self.history.retain(|_, c| c.expires_at > now);

        let dropped = before - self.history.len();
        if dropped > 0 {
            debug!(dropped, "Bus: expired command history");
        }
    }

    /// Number of currently attached subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChannelBus {
    fn default() -> Self {
        Self::new(100, 3600)
    }
}

#[async_trait]
impl CommandPublisher for ChannelBus {
    async fn publish(&self, command: Command) -> Result<()> {
        let now = Utc::now();
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);

        self.history.insert(
            seq,
            PublishedCommand {
                seq,
                command: command.clone(),
                published_at: now,
                expires_at: now + Duration::seconds(self.ttl_seconds),
            },
        );

        // No attached workers is fine: the command stays in history and the
        // next subscriber replays it.
        let receivers = self.tx.send(command).unwrap_or(0);
        debug!(seq, receivers, "Bus: command published");
        Ok(())
    }
}
