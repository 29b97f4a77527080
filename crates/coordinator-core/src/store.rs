//! In-memory session store
//!
//! Users and key-generation sessions are held in [`DashMap`]s keyed by id;
//! signing sessions live inside their owning key session's `rooms` map, so
//! the "resolve owner then mutate nested session" path runs entirely under
//! the owner's entry lock and cannot race a concurrent delete.
//!
//! Two secondary indexes keep event ingestion O(1): keygen room id -> key
//! session id, and signing session id -> owning key session id.

use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::types::{KeygenSession, SigningSession, User};

/// Concurrency-safe repository for users and sessions
pub struct SessionStore {
    users: DashMap<String, User>,
    keys: DashMap<String, KeygenSession>,
    /// Keygen room id -> key session id
    rooms: DashMap<String, String>,
    /// Signing session id -> owning key session id
    signing_rooms: DashMap<String, String>,
}

impl SessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            keys: DashMap::new(),
            rooms: DashMap::new(),
            signing_rooms: DashMap::new(),
        }
    }

    /// Store a user
    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    /// Get a user by id
    pub fn get_user(&self, id: &str) -> Result<User> {
        self.users
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::UserNotFound(id.to_string()))
    }

    /// Mutate a user under its entry lock, returning the updated copy
    pub fn update_user<F>(&self, id: &str, f: F) -> Result<User>
    where
        F: FnOnce(&mut User),
    {
        let mut entry = self
            .users
            .get_mut(id)
            .ok_or_else(|| Error::UserNotFound(id.to_string()))?;
        f(entry.value_mut());
        Ok(entry.value().clone())
    }

    /// Store a key-generation session and index its room
    pub fn insert_key(&self, session: KeygenSession) {
        self.rooms
            .insert(session.room_id.clone(), session.id.clone());
        for room_id in session.rooms.keys() {
            self.signing_rooms.insert(room_id.clone(), session.id.clone());
        }
        self.keys.insert(session.id.clone(), session);
    }

    /// Get a key-generation session by id
    pub fn get_key(&self, id: &str) -> Result<KeygenSession> {
        self.keys
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::KeyNotFound(id.to_string()))
    }

    /// Remove a key-generation session and all of its index entries
    pub fn remove_key(&self, id: &str) -> Result<KeygenSession> {
        let (_, session) = self
            .keys
            .remove(id)
            .ok_or_else(|| Error::KeyNotFound(id.to_string()))?;

        self.rooms.remove(&session.room_id);
        for room_id in session.rooms.keys() {
            self.signing_rooms.remove(room_id);
        }

        Ok(session)
    }

    /// Mutate a key-generation session under its entry lock
    pub fn update_key<F, R>(&self, id: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut KeygenSession) -> Result<R>,
    {
        let mut entry = self
            .keys
            .get_mut(id)
            .ok_or_else(|| Error::KeyNotFound(id.to_string()))?;
        f(entry.value_mut())
    }

    /// Find the key-generation session coordinated through `room_id`
    pub fn find_by_room(&self, room_id: &str) -> Result<KeygenSession> {
        let key_id = self.key_id_for_room(room_id)?;
        self.keys
            .get(&key_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::RoomNotFound(room_id.to_string()))
    }

    /// Mutate the key-generation session coordinated through `room_id`
    pub fn update_by_room<F, R>(&self, room_id: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut KeygenSession) -> Result<R>,
    {
        let key_id = self.key_id_for_room(room_id)?;
        let mut entry = self
            .keys
            .get_mut(&key_id)
            .ok_or_else(|| Error::RoomNotFound(room_id.to_string()))?;
        f(entry.value_mut())
    }

    /// Find the key-generation session owning the signing session `signing_id`
    pub fn find_owning_session(&self, signing_id: &str) -> Result<KeygenSession> {
        let key_id = self.key_id_for_signing_room(signing_id)?;
        self.keys
            .get(&key_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::SigningSessionNotFound(signing_id.to_string()))
    }

    /// Attach a signing session to its owning key session and index it
    pub fn insert_room(&self, key_id: &str, room: SigningSession) -> Result<()> {
        let mut entry = self
            .keys
            .get_mut(key_id)
            .ok_or_else(|| Error::KeyNotFound(key_id.to_string()))?;

        let room_id = room.id.clone();
        entry.value_mut().rooms.insert(room_id.clone(), room);
        self.signing_rooms.insert(room_id, key_id.to_string());
        Ok(())
    }

    /// Mutate a signing session under its owning key session's entry lock
    pub fn update_room<F, R>(&self, signing_id: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut SigningSession) -> Result<R>,
    {
        let key_id = self.key_id_for_signing_room(signing_id)?;
        let mut entry = self
            .keys
            .get_mut(&key_id)
            .ok_or_else(|| Error::SigningSessionNotFound(signing_id.to_string()))?;
        let room = entry
            .value_mut()
            .rooms
            .get_mut(signing_id)
            .ok_or_else(|| Error::SigningSessionNotFound(signing_id.to_string()))?;
        f(room)
    }

    fn key_id_for_room(&self, room_id: &str) -> Result<String> {
        self.rooms
            .get(room_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::RoomNotFound(room_id.to_string()))
    }

    fn key_id_for_signing_room(&self, signing_id: &str) -> Result<String> {
        self.signing_rooms
            .get(signing_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::SigningSessionNotFound(signing_id.to_string()))
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn store_with_key() -> (SessionStore, KeygenSession) {
        let store = SessionStore::new();
        let user = User::new("a@b.c".into(), None, None);
        let session = KeygenSession::new(&user.id, 1, 3, 2).unwrap();
        store.insert_user(user);
        store.insert_key(session.clone());
        (store, session)
    }

    #[test]
    fn create_then_get_round_trip() {
        let (store, session) = store_with_key();

        let fetched = store.get_key(&session.id).unwrap();
        assert_eq!(fetched.status, crate::types::SessionStatus::Created);
        assert!(fetched.participants_confirmations.is_empty());
        assert!(fetched.public_key.is_none());
    }

    #[test]
    fn find_by_room_resolves_and_delete_clears_index() {
        let (store, session) = store_with_key();

        assert_eq!(store.find_by_room(&session.room_id).unwrap().id, session.id);

        store.remove_key(&session.id).unwrap();
        assert!(matches!(
            store.find_by_room(&session.room_id),
            Err(Error::RoomNotFound(_))
        ));
    }

    #[test]
    fn delete_missing_key_is_not_found_and_double_delete_is_safe() {
        let (store, session) = store_with_key();

        assert!(matches!(
            store.remove_key("missing"),
            Err(Error::KeyNotFound(_))
        ));

        store.remove_key(&session.id).unwrap();
        assert!(matches!(
            store.remove_key(&session.id),
            Err(Error::KeyNotFound(_))
        ));
    }

    #[test]
    fn signing_room_index_tracks_owner() {
        let (store, session) = store_with_key();
        let room = SigningSession::new(
            None,
            "payload".into(),
            serde_json::json!({}),
            vec![0, 1],
            Utc::now(),
        );
        let room_id = room.id.clone();

        store.insert_room(&session.id, room).unwrap();
        assert_eq!(store.find_owning_session(&room_id).unwrap().id, session.id);

        store
            .update_room(&room_id, |r| {
                r.data = "other".into();
                Ok(())
            })
            .unwrap();
        let owner = store.find_owning_session(&room_id).unwrap();
        assert_eq!(owner.rooms[&room_id].data, "other");

        // Removing the key session orphans the room index as well
        store.remove_key(&session.id).unwrap();
        assert!(matches!(
            store.find_owning_session(&room_id),
            Err(Error::SigningSessionNotFound(_))
        ));
    }
}
