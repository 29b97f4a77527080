//! Session status state machine
//!
//! Every status and confirmation mutation funnels through this module so the
//! lifecycle invariants live in one place. Valid paths:
//!
//! ```text
//! created -> started -> {finished | error | timeout}
//! created -> {finished | error | timeout}
//! ```
//!
//! Terminal statuses absorb: any event against a finished, errored or
//! timed-out session is rejected, which also makes re-delivery of a terminal
//! event a no-op for the caller that logs and drops the error.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::types::{KeygenSession, ParticipantIndex, SessionStatus, SigningSession};

/// Compute the next status for a reported one, rejecting invalid moves
pub fn transition(current: SessionStatus, reported: SessionStatus) -> Result<SessionStatus> {
    if current.is_terminal() {
        return Err(Error::InvalidTransition {
            from: current,
            reported,
        });
    }

    match reported {
        // A `created` report only refreshes confirmations while the session
        // has not started; after that it is a stale replay.
        SessionStatus::Created => {
            if current == SessionStatus::Created {
                Ok(SessionStatus::Created)
            } else {
                Err(Error::InvalidTransition {
                    from: current,
                    reported,
                })
            }
        }
        // Idempotent: started -> started is a no-op re-application
        SessionStatus::Started => Ok(SessionStatus::Started),
        SessionStatus::Finished | SessionStatus::Error | SessionStatus::Timeout => Ok(reported),
    }
}

fn check_bounded(
    indexes: &[ParticipantIndex],
    bound: u16,
) -> Result<BTreeSet<ParticipantIndex>> {
    let mut set = BTreeSet::new();
    for &index in indexes {
        if index >= bound {
            return Err(Error::InvalidParticipant { index, bound });
        }
        set.insert(index);
    }
    Ok(set)
}

fn check_subset(
    indexes: &[ParticipantIndex],
    allowed: &[ParticipantIndex],
) -> Result<BTreeSet<ParticipantIndex>> {
    let mut set = BTreeSet::new();
    for &index in indexes {
        if !allowed.contains(&index) {
            return Err(Error::UnknownParticipant(index));
        }
        set.insert(index);
    }
    Ok(set)
}

impl KeygenSession {
    /// Apply a `keygen_status` report, mutating only if the whole event is valid
    pub fn apply_keygen_status(
        &mut self,
        reported: SessionStatus,
        public_key: Option<String>,
        active_indexes: Option<Vec<ParticipantIndex>>,
    ) -> Result<()> {
        let next = transition(self.status, reported)?;

        let confirmations = match active_indexes {
            Some(indexes) => Some(check_bounded(&indexes, self.participants_count)?),
            None => None,
        };

        if reported == SessionStatus::Finished {
            self.public_key = Some(public_key.ok_or_else(|| {
                Error::MalformedEvent("finished keygen_status without public_key".into())
            })?);
        }

        self.status = next;
        if let Some(set) = confirmations {
            self.participants_confirmations = set;
        }

        Ok(())
    }
}

impl SigningSession {
    /// Apply a `sign_status` report, mutating only if the whole event is valid
    pub fn apply_sign_status(
        &mut self,
        reported: SessionStatus,
        result: Option<String>,
        active_indexes: Option<Vec<ParticipantIndex>>,
    ) -> Result<()> {
        let next = transition(self.status, reported)?;

        let confirmations = match active_indexes {
            Some(indexes) => Some(check_subset(&indexes, &self.participant_indexes)?),
            None => None,
        };

        if reported == SessionStatus::Finished {
            self.result = Some(result.ok_or_else(|| {
                Error::MalformedEvent("finished sign_status without result".into())
            })?);
        }

        self.status = next;
        if let Some(set) = confirmations {
            self.participants_confirmations = set;
        }

        Ok(())
    }
}
