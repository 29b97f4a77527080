//! Coordinator Client
//!
//! Client library for the session coordinator's JSON API. Worker-side
//! tooling also uses it to deliver progress reports over plain HTTP via
//! [`CoordinatorClient::push_event`].

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

use coordinator_core::{KeygenSession, ParticipantIndex, User, WorkerEvent};

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Invalid response: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// HTTP client for the coordinator API
pub struct CoordinatorClient {
    client: Client,
    url: String,
    timeout: Duration,
}

impl CoordinatorClient {
    /// Create a client for the coordinator at `url`
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a user
    #[instrument(skip(self))]
    pub async fn sign_up(
        &self,
        email: &str,
        telegram_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<User> {
        let response = self
            .client
            .post(format!("{}/api/sign_up", self.url))
            .json(&SignUpRequest {
                email,
                telegram_id,
                user_id,
            })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        handle(response).await
    }

    /// Fetch a user by id
    #[instrument(skip(self))]
    pub async fn user(&self, id: &str) -> Result<User> {
        let response = self
            .client
            .get(format!("{}/api/user", self.url))
            .query(&[("id", id)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        handle(response).await
    }

    /// Update a user's email
    #[instrument(skip(self))]
    pub async fn update_user(&self, id: &str, email: &str) -> Result<User> {
        let response = self
            .client
            .put(format!("{}/api/user", self.url))
            .json(&UpdateUserRequest { id, email })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        handle(response).await
    }

    /// Create a key-generation session for a user
    #[instrument(skip(self))]
    pub async fn create_key_session(
        &self,
        user_id: &str,
        participants_count: Option<u16>,
        participant_index: Option<ParticipantIndex>,
        participants_threshold: Option<u16>,
    ) -> Result<User> {
        let response = self
            .client
            .post(format!("{}/api/public_keys", self.url))
            .json(&CreateKeyRequest {
                user_id,
                participants_count,
                participant_index,
                participants_threshold,
            })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        handle(response).await
    }

    /// Remove a key-generation session
    #[instrument(skip(self))]
    pub async fn delete_key_session(&self, user_id: &str, public_key_id: &str) -> Result<User> {
        let response = self
            .client
            .delete(format!("{}/api/public_keys", self.url))
            .json(&DeleteKeyRequest {
                user_id,
                public_key_id,
            })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        handle(response).await
    }

    /// Fetch a key-generation session by id
    #[instrument(skip(self))]
    pub async fn key_session(&self, id: &str) -> Result<KeygenSession> {
        let response = self
            .client
            .get(format!("{}/api/key", self.url))
            .query(&[("id", id)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        handle(response).await
    }

    /// Create a signing session under a key
    #[instrument(skip(self, metadata))]
    pub async fn create_signing_session(
        &self,
        public_key_id: &str,
        room_id: Option<&str>,
        data: Option<&str>,
        metadata: Option<serde_json::Value>,
        participant_indexes: &[ParticipantIndex],
    ) -> Result<KeygenSession> {
        let response = self
            .client
            .post(format!("{}/api/sign", self.url))
            .json(&SignRequest {
                public_key_id,
                room_id,
                data,
                metadata,
                participant_indexes,
            })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        handle(response).await
    }

    /// Deliver a worker progress report over plain HTTP
    #[instrument(skip(self, event))]
    pub async fn push_event(&self, event: &WorkerEvent) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/v1/event", self.url))
            .json(event)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: error_message(response).await,
            });
        }

        debug!(room_id = event.room_id(), "Event delivered");
        Ok(())
    }
}

async fn handle<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(error_message(response).await));
    }
    if !status.is_success() {
        return Err(ClientError::Api {
            status: status.as_u16(),
            message: error_message(response).await,
        });
    }

    response
        .json()
        .await
        .map_err(|e| ClientError::Decode(e.to_string()))
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    match response.json::<serde_json::Value>().await {
        Ok(body) => body
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or(status.as_str())
            .to_string(),
        Err(_) => status.to_string(),
    }
}

#[derive(Debug, Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    telegram_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct UpdateUserRequest<'a> {
    id: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateKeyRequest<'a> {
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    participants_count: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    participant_index: Option<ParticipantIndex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    participants_threshold: Option<u16>,
}

#[derive(Debug, Serialize)]
struct DeleteKeyRequest<'a> {
    user_id: &'a str,
    public_key_id: &'a str,
}

#[derive(Debug, Serialize)]
struct SignRequest<'a> {
    public_key_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    room_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<serde_json::Value>,
    participant_indexes: &'a [ParticipantIndex],
}
