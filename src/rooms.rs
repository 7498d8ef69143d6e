/// Chat room directory: room id to type and membership.
/// Rooms are only ever added; requests for a room that already exists return the original.
use crate::error::{Result, ServerError};
use crate::models::ChatRoom;
use crate::store::LogStore;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

/// Outcome of a create request.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomCreation {
    Created(ChatRoom),
    /// A room with the same id, or the same type and members, was already known.
    Existing(ChatRoom),
}

impl RoomCreation {
    pub fn room(&self) -> &ChatRoom {
        match self {
            RoomCreation::Created(room) | RoomCreation::Existing(room) => room,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, RoomCreation::Created(_))
    }
}

pub struct ChatRoomDirectory {
    rooms: RwLock<HashMap<String, ChatRoom>>,
    store: LogStore<ChatRoom>,
}

impl ChatRoomDirectory {
    /// Replay the rooms log. The first record for an id wins.
    pub fn load(store: LogStore<ChatRoom>) -> Result<Self> {
        let mut rooms = HashMap::new();
        for room in store.read_all()? {
            if rooms.contains_key(&room.id) {
                log::warn!("Ignoring duplicate chat room record {}", room.id);
                continue;
            }
            rooms.insert(room.id.clone(), room);
        }
        log::info!(
            "Loaded {} chat room(s) from {}",
            rooms.len(),
            store.path().display()
        );

        Ok(ChatRoomDirectory {
            rooms: RwLock::new(rooms),
            store,
        })
    }

    /// Create `room` on behalf of `creator`, or return the room that already covers it.
    pub async fn create(&self, room: ChatRoom, creator: &str) -> Result<RoomCreation> {
        room.validate(creator).map_err(ServerError::InvalidRoom)?;

        let mut rooms = self.rooms.write().await;
        if let Some(existing) = rooms.get(&room.id) {
            if existing.same_membership(&room) {
                return Ok(RoomCreation::Existing(existing.clone()));
            }
            return Err(ServerError::InvalidRoom(format!(
                "chat room id {} is already in use",
                room.id
            )));
        }
        if let Some(existing) = rooms.values().find(|r| r.same_membership(&room)) {
            log::debug!(
                "Chat room {} requested by {} duplicates {}",
                room.id,
                creator,
                existing.id
            );
            return Ok(RoomCreation::Existing(existing.clone()));
        }

        let record = room.to_record();
        self.store.append(&record).await?;
        rooms.insert(record.id.clone(), record.clone());
        log::info!(
            "{} created {:?} chat room {} with {} member(s)",
            creator,
            record.chat_type,
            record.id,
            record.users.len()
        );
        Ok(RoomCreation::Created(record))
    }

    pub async fn members_of(&self, id: &str) -> Option<BTreeSet<String>> {
        self.rooms
            .read()
            .await
            .get(id)
            .map(|room| room.users.iter().cloned().collect())
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }
}
