/// Routing engine: decides which live sessions receive a copy of an inbound packet.
/// Delivery is best-effort; nothing is queued for users who are offline.
use crate::error::{Result, ServerError};
use crate::models::{ChatRoom, Message};
use crate::protocol::Packet;
use crate::rooms::{ChatRoomDirectory, RoomCreation};
use crate::sessions::SessionRegistry;
use crate::store::LogStore;

pub struct Router<'a> {
    sessions: &'a SessionRegistry,
    rooms: &'a ChatRoomDirectory,
    history: &'a LogStore<Message>,
}

impl<'a> Router<'a> {
    pub fn new(
        sessions: &'a SessionRegistry,
        rooms: &'a ChatRoomDirectory,
        history: &'a LogStore<Message>,
    ) -> Self {
        Router {
            sessions,
            rooms,
            history,
        }
    }

    /// Forward `message` from `sender` to the other online members of its room.
    ///
    /// Returns the number of sessions the message was queued to. Unknown rooms,
    /// spoofed senders and non-members yield `UnknownRoute`, which callers drop.
    pub async fn route_message(&self, sender: &str, message: Message) -> Result<usize> {
        if message.sent_by != sender {
            log::warn!("{} sent a message signed by {}", sender, message.sent_by);
            return Err(ServerError::UnknownRoute(format!(
                "{} tried to send a message as {}",
                sender, message.sent_by
            )));
        }

        let room_id = message.chat_room_id.clone();
        let members = self.rooms.members_of(&room_id).await.ok_or_else(|| {
            ServerError::UnknownRoute(format!("chat room {} not found", room_id))
        })?;
        if !members.contains(sender) {
            log::warn!("{} is not a member of chat room {}", sender, room_id);
            return Err(ServerError::UnknownRoute(format!(
                "{} is not a member of chat room {}",
                sender, room_id
            )));
        }

        if let Err(e) = self.history.append(&message).await {
            log::error!("Failed to record message in {}: {}", room_id, e);
        }

        let delivered = self
            .sessions
            .send_to(&members, sender, &Packet::message(message))
            .await;
        log::debug!(
            "Message from {} in {} delivered to {} session(s)",
            sender,
            room_id,
            delivered
        );
        Ok(delivered)
    }

    /// Create (or find) a room for `creator` and announce it.
    ///
    /// The creator always gets the canonical room back. Other online members
    /// are told only when the room is new.
    pub async fn route_create_chat(&self, creator: &str, room: ChatRoom) -> Result<RoomCreation> {
        let outcome = self.rooms.create(room, creator).await?;
        let notice = Packet::create_chat(creator, outcome.room().clone());

        if let Some(handle) = self.sessions.lookup(creator).await {
            handle.send(&notice);
        }
        if outcome.is_new() {
            let delivered = self
                .sessions
                .send_to(&outcome.room().users, creator, &notice)
                .await;
            log::debug!(
                "Chat room {} announced to {} other member(s)",
                outcome.room().id,
                delivered
            );
        }
        Ok(outcome)
    }
}
