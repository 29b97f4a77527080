//! Wire types for the command and event channels
//!
//! Commands flow coordinator -> worker fleet, events flow back. Both are
//! JSON objects tagged by an `action` field so either side can route on it
//! without knowing the full schema.

use serde::{Deserialize, Serialize};

use crate::types::{ParticipantIndex, SessionStatus};

/// Outbound command to the worker fleet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Ask a worker to join a key-generation ceremony
    KeygenJoin {
        user_id: String,
        room_id: String,
        key_id: String,
        participant_index: ParticipantIndex,
        participants_count: u16,
        participants_threshold: u16,
        relay_address: String,
    },
    /// Ask workers to approve and run a signing ceremony
    SignApprove {
        user_id: String,
        room_id: String,
        key_id: String,
        data: String,
        participants_indexes: Vec<ParticipantIndex>,
        relay_address: String,
        timeout_seconds: u64,
    },
}

impl Command {
    /// The coordination channel this command targets
    pub fn room_id(&self) -> &str {
        match self {
            Command::KeygenJoin { room_id, .. } => room_id,
            Command::SignApprove { room_id, .. } => room_id,
        }
    }

    /// The action tag as it appears on the wire
    pub fn action(&self) -> &'static str {
        match self {
            Command::KeygenJoin { .. } => "keygen_join",
            Command::SignApprove { .. } => "sign_approve",
        }
    }
}

/// Inbound progress report from the worker fleet
///
/// Workers may attach fields this coordinator does not track; unknown fields
/// are ignored. A missing `active_indexes` leaves confirmations unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// Progress of a key-generation ceremony, addressed by its room id
    KeygenStatus {
        room_id: String,
        status: SessionStatus,
        #[serde(default)]
        public_key: Option<String>,
        #[serde(default)]
        active_indexes: Option<Vec<ParticipantIndex>>,
    },
    /// Progress of a signing ceremony, addressed by the signing session id
    SignStatus {
        room_id: String,
        status: SessionStatus,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        active_indexes: Option<Vec<ParticipantIndex>>,
    },
}

impl WorkerEvent {
    /// The room the report refers to
    pub fn room_id(&self) -> &str {
        match self {
            WorkerEvent::KeygenStatus { room_id, .. } => room_id,
            WorkerEvent::SignStatus { room_id, .. } => room_id,
        }
    }

    /// The reported status
    pub fn status(&self) -> SessionStatus {
        match self {
            WorkerEvent::KeygenStatus { status, .. } => *status,
            WorkerEvent::SignStatus { status, .. } => *status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_wire_format() {
        let cmd = Command::KeygenJoin {
            user_id: "u1".into(),
            room_id: "r1".into(),
            key_id: "k1".into(),
            participant_index: 1,
            participants_count: 2,
            participants_threshold: 1,
            relay_address: "http://127.0.0.1:8080".into(),
        };

        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["action"], "keygen_join");
        assert_eq!(value["room_id"], "r1");
        assert_eq!(value["participants_count"], 2);
    }

    #[test]
    fn event_parses_with_extra_and_missing_fields() {
        // Worker fleets attach user_id; it must not break parsing
        let raw = r#"{
            "action": "keygen_status",
            "user_id": "u1",
            "room_id": "r1",
            "status": "started",
            "active_indexes": [0, 1]
        }"#;

        let event: WorkerEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.room_id(), "r1");
        assert_eq!(event.status(), SessionStatus::Started);

        // result and active_indexes are optional
        let raw = r#"{"action": "sign_status", "room_id": "s1", "status": "error"}"#;
        let event: WorkerEvent = serde_json::from_str(raw).unwrap();
        match event {
            WorkerEvent::SignStatus {
                result,
                active_indexes,
                ..
            } => {
                assert!(result.is_none());
                assert!(active_indexes.is_none());
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn event_rejects_unknown_action() {
        let raw = r#"{"action": "keygen_cancel", "room_id": "r1", "status": "error"}"#;
        assert!(serde_json::from_str::<WorkerEvent>(raw).is_err());
    }
}
