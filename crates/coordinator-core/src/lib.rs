//! # Coordinator Core
//!
//! Session state machine and store for a threshold-signing coordinator.
//!
//! This crate holds everything that must stay correct when client requests
//! and worker progress reports race each other:
//!
//! - Key-generation and signing session entities
//! - The status state machine (every transition in one place)
//! - The concurrent session store with room-id indexes
//! - The [`service::Coordinator`] exposing the session API operations and
//!   the event-ingestion entry point
//!
//! It deliberately contains no HTTP and no transport; those live in the
//! service crate behind the [`bus::CommandPublisher`] seam.
//!
//! ## Example
//!
//! ```rust,ignore
//! use coordinator_core::service::{Coordinator, CoordinatorConfig};
//!
//! let coordinator = Coordinator::new(store, publisher, CoordinatorConfig::default());
//! let user = coordinator.create_user("ops@example.com".into(), None, None);
//! let user = coordinator.create_key_session(&user.id, Some(3), Some(1), Some(2)).await?;
//! ```

pub mod bus;
pub mod error;
pub mod events;
pub mod machine;
pub mod service;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use events::{Command, WorkerEvent};
pub use store::SessionStore;
pub use types::{KeygenSession, ParticipantIndex, SessionStatus, SigningSession, User};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Smallest meaningful group: two participants
pub const DEFAULT_PARTICIPANTS_COUNT: u16 = 2;

/// The coordinator-side participant slot
pub const DEFAULT_PARTICIPANT_INDEX: ParticipantIndex = 1;

/// One confirmation is enough unless the caller asks for more
pub const DEFAULT_PARTICIPANTS_THRESHOLD: u16 = 1;
