//! Core entity types for the coordinator

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A participant's fixed position within a session's quorum
pub type ParticipantIndex = u16;

/// Lifecycle status shared by key-generation and signing sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created by a client request, no worker progress yet
    Created,
    /// Workers reported activity
    Started,
    /// Workers produced the result
    Finished,
    /// Workers reported a protocol failure
    Error,
    /// An external supervisor marked the session expired
    Timeout,
}

impl SessionStatus {
    /// Terminal statuses admit no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Finished | SessionStatus::Error | SessionStatus::Timeout
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Created => "created",
            SessionStatus::Started => "started",
            SessionStatus::Finished => "finished",
            SessionStatus::Error => "error",
            SessionStatus::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// A registered account that owns key-generation sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: String,
    /// Contact email
    pub email: String,
    /// Optional external contact handle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_id: Option<String>,
    /// Ids of owned key-generation sessions, in creation order
    pub public_keys: Vec<String>,
}

impl User {
    /// Create a new user, assigning an id if the caller supplied none
    pub fn new(email: String, telegram_id: Option<String>, id: Option<String>) -> Self {
        Self {
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            email,
            telegram_id,
            public_keys: Vec::new(),
        }
    }
}

/// Coordination record for participants jointly deriving one shared public key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeygenSession {
    /// Unique identifier
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Coordination channel id handed to workers, distinct from `id`
    pub room_id: String,
    /// Derived shared public key, present iff status is `finished`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// This user's position among the participants
    pub participant_index: ParticipantIndex,
    /// Total expected participants
    pub participants_count: u16,
    /// Minimum confirmations required for validity
    pub participants_threshold: u16,
    /// Participant indices that reported active or complete
    pub participants_confirmations: BTreeSet<ParticipantIndex>,
    /// Lifecycle status
    pub status: SessionStatus,
    /// Signing sessions produced under this key, by id
    pub rooms: BTreeMap<String, SigningSession>,
}

impl KeygenSession {
    /// Create a session in `created` status, validating the quorum parameters
    pub fn new(
        user_id: impl Into<String>,
        participant_index: ParticipantIndex,
        participants_count: u16,
        participants_threshold: u16,
    ) -> Result<Self> {
        if participants_count == 0 {
            return Err(Error::InvalidConfig(
                "participants_count must be at least 1".into(),
            ));
        }
        if participants_threshold == 0 {
            return Err(Error::InvalidConfig(
                "participants_threshold must be at least 1".into(),
            ));
        }
        if participants_threshold > participants_count {
            return Err(Error::InvalidConfig(
                "participants_threshold cannot exceed participants_count".into(),
            ));
        }
        if participant_index >= participants_count {
            return Err(Error::InvalidParticipant {
                index: participant_index,
                bound: participants_count,
            });
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            room_id: Uuid::new_v4().to_string(),
            public_key: None,
            participant_index,
            participants_count,
            participants_threshold,
            participants_confirmations: BTreeSet::new(),
            status: SessionStatus::Created,
            rooms: BTreeMap::new(),
        })
    }

    /// Whether enough participants confirmed for the result to be valid
    pub fn threshold_met(&self) -> bool {
        self.participants_confirmations.len() >= usize::from(self.participants_threshold)
    }
}

/// Coordination record for one signature request under an existing shared key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningSession {
    /// Unique identifier, doubles as the worker-side room id
    pub id: String,
    /// Payload to sign
    pub data: String,
    /// Opaque caller-supplied metadata
    pub metadata: serde_json::Value,
    /// Participants asked to produce this signature
    pub participant_indexes: Vec<ParticipantIndex>,
    /// Advisory deadline; enforcement is external
    pub expires_at: DateTime<Utc>,
    /// Produced signature, present iff status is `finished`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Lifecycle status
    pub status: SessionStatus,
    /// Participant indices that confirmed
    pub participants_confirmations: BTreeSet<ParticipantIndex>,
}

impl SigningSession {
    /// Create a session in `created` status
    pub fn new(
        room_id: Option<String>,
        data: String,
        metadata: serde_json::Value,
        participant_indexes: Vec<ParticipantIndex>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: room_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            data,
            metadata,
            participant_indexes,
            expires_at,
            result: None,
            status: SessionStatus::Created,
            participants_confirmations: BTreeSet::new(),
        }
    }
}
