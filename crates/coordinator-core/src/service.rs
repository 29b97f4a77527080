//! Session API operations and event ingestion
//!
//! [`Coordinator`] is the single seam both entry surfaces go through: HTTP
//! handlers call the synchronous operations, the transport layer feeds
//! worker reports into [`Coordinator::on_event`]. Neither path ever waits
//! for the worker fleet; commands are published fire-and-forget.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, warn};

use crate::bus::CommandPublisher;
use crate::error::{Error, Result};
use crate::events::{Command, WorkerEvent};
use crate::store::SessionStore;
use crate::types::{KeygenSession, ParticipantIndex, SigningSession, User};
use crate::{
    DEFAULT_PARTICIPANTS_COUNT, DEFAULT_PARTICIPANTS_THRESHOLD, DEFAULT_PARTICIPANT_INDEX,
};

/// Settings handed to workers in outbound commands
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Relay address workers use to reach each other
    pub relay_address: String,
    /// Signing deadline in seconds; also sets a session's `expires_at`
    pub sign_timeout_seconds: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            relay_address: "http://127.0.0.1:8080".into(),
            sign_timeout_seconds: 120,
        }
    }
}

/// The session coordinator
pub struct Coordinator {
    store: Arc<SessionStore>,
    publisher: Arc<dyn CommandPublisher>,
    config: CoordinatorConfig,
}

impl Coordinator {
    /// Create a coordinator over a store and an outbound command channel
    pub fn new(
        store: Arc<SessionStore>,
        publisher: Arc<dyn CommandPublisher>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            config,
        }
    }

    /// The underlying store, for read-only inspection
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Register a user, assigning an id if the caller supplied none
    pub fn create_user(
        &self,
        email: String,
        telegram_id: Option<String>,
        user_id: Option<String>,
    ) -> User {
        let user = User::new(email, telegram_id, user_id);
        self.store.insert_user(user.clone());
        debug!(user_id = %user.id, "User created");
        user
    }

    /// Look up a user by id
    pub fn get_user(&self, id: &str) -> Result<User> {
        self.store.get_user(id)
    }

    /// Update a user's email
    pub fn update_user(&self, id: &str, email: String) -> Result<User> {
        self.store.update_user(id, |user| user.email = email)
    }

    /// Create a key-generation session for a user and dispatch `keygen_join`
    pub async fn create_key_session(
        &self,
        user_id: &str,
        participants_count: Option<u16>,
        participant_index: Option<ParticipantIndex>,
        participants_threshold: Option<u16>,
    ) -> Result<User> {
        // Presence check up front so nothing is built for a phantom user
        self.store.get_user(user_id)?;

        let session = KeygenSession::new(
            user_id,
            participant_index.unwrap_or(DEFAULT_PARTICIPANT_INDEX),
            participants_count.unwrap_or(DEFAULT_PARTICIPANTS_COUNT),
            participants_threshold.unwrap_or(DEFAULT_PARTICIPANTS_THRESHOLD),
        )?;

        let key_id = session.id.clone();
        let command = Command::KeygenJoin {
            user_id: session.user_id.clone(),
            room_id: session.room_id.clone(),
            key_id: key_id.clone(),
            participant_index: session.participant_index,
            participants_count: session.participants_count,
            participants_threshold: session.participants_threshold,
            relay_address: self.config.relay_address.clone(),
        };

        self.store.insert_key(session);
        let user = self
            .store
            .update_user(user_id, |user| user.public_keys.push(key_id))?;

        self.dispatch(command).await;
        Ok(user)
    }

    /// Remove a key-generation session; workers are not notified
    pub fn delete_key_session(&self, user_id: &str, key_id: &str) -> Result<User> {
        let user = self.store.get_user(user_id)?;
        if !user.public_keys.iter().any(|id| id == key_id) {
            return Err(Error::KeyNotFound(key_id.to_string()));
        }

        self.store.remove_key(key_id)?;
        self.store
            .update_user(user_id, |user| user.public_keys.retain(|id| id != key_id))
    }

    /// Look up a key-generation session by id
    pub fn get_key_session(&self, id: &str) -> Result<KeygenSession> {
        self.store.get_key(id)
    }

    /// Create a signing session under a key and dispatch `sign_approve`
    pub async fn create_signing_session(
        &self,
        key_id: &str,
        room_id: Option<String>,
        data: Option<String>,
        metadata: Option<serde_json::Value>,
        participant_indexes: Vec<ParticipantIndex>,
    ) -> Result<KeygenSession> {
        let key = self.store.get_key(key_id)?;

        for &index in &participant_indexes {
            if index >= key.participants_count {
                return Err(Error::InvalidParticipant {
                    index,
                    bound: key.participants_count,
                });
            }
        }

        let expires_at = Utc::now() + Duration::seconds(self.config.sign_timeout_seconds as i64);
        let session = SigningSession::new(
            room_id,
            data.unwrap_or_default(),
            metadata.unwrap_or_else(|| serde_json::json!({})),
            participant_indexes.clone(),
            expires_at,
        );

        let command = Command::SignApprove {
            user_id: key.user_id.clone(),
            room_id: session.id.clone(),
            key_id: key.id.clone(),
            data: session.data.clone(),
            participants_indexes: participant_indexes,
            relay_address: self.config.relay_address.clone(),
            timeout_seconds: self.config.sign_timeout_seconds,
        };

        self.store.insert_room(&key.id, session)?;
        self.dispatch(command).await;

        self.store.get_key(key_id)
    }

    /// Apply one worker progress report to the session it addresses
    ///
    /// Callers log and drop the error; a bad event must never stop the
    /// ingestion loop.
    pub fn on_event(&self, event: WorkerEvent) -> Result<()> {
        match event {
            WorkerEvent::KeygenStatus {
                room_id,
                status,
                public_key,
                active_indexes,
            } => {
                self.store.update_by_room(&room_id, |session| {
                    session.apply_keygen_status(status, public_key, active_indexes)
                })?;
                debug!(room_id = %room_id, status = %status, "Applied keygen status");
            }
            WorkerEvent::SignStatus {
                room_id,
                status,
                result,
                active_indexes,
            } => {
                self.store.update_room(&room_id, |session| {
                    session.apply_sign_status(status, result, active_indexes)
                })?;
                debug!(room_id = %room_id, status = %status, "Applied sign status");
            }
        }
        Ok(())
    }

    /// Parse and apply a raw JSON progress report
    pub fn on_raw_event(&self, payload: &[u8]) -> Result<()> {
        let event: WorkerEvent = serde_json::from_slice(payload)?;
        self.on_event(event)
    }

    async fn dispatch(&self, command: Command) {
        let action = command.action();
        let room_id = command.room_id().to_string();

        // Fire-and-forget: delivery is the transport's concern, the session
        // was already stored, so the request still succeeds.
        match self.publisher.publish(command).await {
            Ok(()) => debug!(action, room_id = %room_id, "Command published"),
            Err(err) => warn!(action, room_id = %room_id, error = %err, "Failed to publish command"),
        }
    }
}
