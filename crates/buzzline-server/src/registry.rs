use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use buzzline_core::code;
use buzzline_core::error::RoomError;
use buzzline_core::room::{Room, SHARE_CODE_TTL_MS};
use buzzline_core::time::now_ms;

use crate::connections::ConnectionSet;

/// One room plus its live connections. The two locks are independent;
/// nothing holds both across I/O. Lock order is registry, then room, then
/// connections — never the reverse.
pub struct RoomEntry {
    pub room: Mutex<Room>,
    pub connections: Mutex<ConnectionSet>,
}

/// Owns every room and arbitrates lookup by code. The outer map lock is
/// separate from the per-room locks, so operations against different rooms
/// run in parallel.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<RoomEntry>>>,
}

/// Projection of one room for the public room list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListing {
    pub code: String,
    pub created_at: u64,
    pub player_count: usize,
    pub question_active: bool,
    pub host_online: bool,
    pub share_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_expires_at: Option<u64>,
}

/// A successful share-code claim: everything a second device needs to act
/// as the host.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareClaim {
    pub code: String,
    pub host_secret: String,
    pub expires_at: u64,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room with a fresh unique code and host secret. Categories
    /// are preloaded by the caller (best-effort; None on provider failure).
    pub async fn create(
        &self,
        categories: Option<BTreeMap<String, Vec<String>>>,
    ) -> (String, String) {
        let host_secret = code::generate_token();
        let mut rooms = self.rooms.write().await;
        let room_code = loop {
            let candidate = code::generate_room_code();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        let mut room = Room::new(room_code.clone(), host_secret.clone(), now_ms());
        room.categories = categories;
        rooms.insert(
            room_code.clone(),
            Arc::new(RoomEntry {
                room: Mutex::new(room),
                connections: Mutex::new(ConnectionSet::new()),
            }),
        );
        tracing::info!(room = %room_code, "Room created");
        (room_code, host_secret)
    }

    /// Case-insensitive lookup.
    pub async fn get(&self, room_code: &str) -> Result<Arc<RoomEntry>, RoomError> {
        let key = code::normalize_room_code(room_code);
        self.rooms
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or(RoomError::RoomNotFound)
    }

    pub async fn remove(&self, room_code: &str) -> Option<Arc<RoomEntry>> {
        let key = code::normalize_room_code(room_code);
        let removed = self.rooms.write().await.remove(&key);
        if removed.is_some() {
            tracing::info!(room = %key, "Room removed");
        }
        removed
    }

    /// Drop the room iff it has neither players nor connections. Returns
    /// whether it was removed.
    pub async fn remove_if_empty(&self, room_code: &str) -> bool {
        let key = code::normalize_room_code(room_code);
        let mut rooms = self.rooms.write().await;
        let Some(entry) = rooms.get(&key) else {
            return false;
        };
        let has_players = entry.room.lock().await.has_players();
        let has_connections = !entry.connections.lock().await.is_empty();
        if has_players || has_connections {
            return false;
        }
        rooms.remove(&key);
        tracing::info!(room = %key, "Removed empty room");
        true
    }

    /// Public room list, newest first. Applies lazy share expiry as a side
    /// effect of the scan.
    pub async fn list(&self) -> Vec<RoomListing> {
        let now = now_ms();
        let rooms = self.rooms.read().await;
        let mut listings = Vec::with_capacity(rooms.len());
        for entry in rooms.values() {
            let mut room = entry.room.lock().await;
            room.clear_expired_share(now);
            let host_online = entry.connections.lock().await.has_host();
            listings.push(RoomListing {
                code: room.code.clone(),
                created_at: room.created_at,
                player_count: room.players.len(),
                question_active: room.question_active,
                host_online,
                share_active: room.share_active(now),
                share_expires_at: room.share_code_expires_at,
            });
        }
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listings
    }

    /// Room, player, and connection counts for the health endpoint.
    pub async fn stats(&self) -> (usize, usize, usize) {
        let rooms = self.rooms.read().await;
        let mut players = 0;
        let mut connections = 0;
        for entry in rooms.values() {
            players += entry.room.lock().await.players.len();
            connections += entry.connections.lock().await.len();
        }
        (rooms.len(), players, connections)
    }

    /// Issue a share code for a room, unique across the whole registry.
    /// Holding the registry write lock serializes issuance, so two rooms can
    /// never draw the same digits.
    pub async fn issue_share(&self, room_code: &str, now: u64) -> Result<(String, u64), RoomError> {
        let key = code::normalize_room_code(room_code);
        let rooms = self.rooms.write().await;
        let Some(target) = rooms.get(&key).cloned() else {
            return Err(RoomError::RoomNotFound);
        };

        let mut in_use = HashSet::new();
        for (entry_key, entry) in rooms.iter() {
            let mut room = entry.room.lock().await;
            room.clear_expired_share(now);
            if entry_key != &key
                && let Some(share_code) = &room.share_code
            {
                in_use.insert(share_code.clone());
            }
        }

        let share_code = loop {
            let candidate = code::generate_share_code();
            if !in_use.contains(&candidate) {
                break candidate;
            }
        };
        target
            .room
            .lock()
            .await
            .set_share_code(share_code.clone(), now);
        tracing::info!(room = %key, "Share code issued");
        Ok((share_code, now + SHARE_CODE_TTL_MS))
    }

    /// Resolve a share code to its room, expiring stale codes as the scan
    /// goes.
    pub async fn claim_share(&self, input: &str, now: u64) -> Result<ShareClaim, RoomError> {
        let input = input.trim();
        if !code::is_valid_share_code(input) {
            return Err(RoomError::InvalidShareCode);
        }
        let rooms = self.rooms.read().await;
        for entry in rooms.values() {
            let mut room = entry.room.lock().await;
            room.clear_expired_share(now);
            if room.share_code.as_deref() == Some(input)
                && let Some(expires_at) = room.share_code_expires_at
            {
                return Ok(ShareClaim {
                    code: room.code.clone(),
                    host_secret: room.host_secret.clone(),
                    expires_at,
                });
            }
        }
        Err(RoomError::ShareCodeNotFound)
    }
}
