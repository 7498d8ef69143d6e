/// Session registry: who is online and how to reach them.
/// A single lock guards the map and every presence notification, so a session
/// never sees presence events before its own login completes.
use crate::error::AuthError;
use crate::protocol::{encode, Packet};
use std::collections::HashMap;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Send side of one connection's outbound queue.
/// The connection's writer task drains the queue, so lines never interleave.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    id: Uuid,
    tx: UnboundedSender<String>,
}

impl SessionHandle {
    pub fn new(tx: UnboundedSender<String>) -> Self {
        SessionHandle {
            id: Uuid::new_v4(),
            tx,
        }
    }

    /// A handle plus the receiver its writer task should drain.
    pub fn channel() -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        (SessionHandle::new(tx), rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue an already encoded line. Returns false if the connection is gone.
    pub fn send_line(&self, line: String) -> bool {
        self.tx.send(line).is_ok()
    }

    pub fn send(&self, packet: &Packet) -> bool {
        match encode(packet) {
            Ok(line) => self.send_line(line),
            Err(e) => {
                log::error!("Failed to encode {} packet: {}", packet.kind(), e);
                false
            }
        }
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `username` with `handle`.
    ///
    /// The new session is sent `welcome` followed by one NEW_USER per user
    /// already online; every other session is sent NEW_USER for `username`.
    pub async fn register(
        &self,
        username: &str,
        handle: SessionHandle,
        welcome: &Packet,
    ) -> Result<(), AuthError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(username) {
            return Err(AuthError::AlreadyOnline);
        }

        handle.send(welcome);
        let mut roster: Vec<&String> = sessions.keys().collect();
        roster.sort();
        for peer in roster {
            handle.send(&Packet::new_user(peer));
        }

        broadcast(&sessions, &Packet::new_user(username));
        sessions.insert(username.to_string(), handle);
        log::info!("User {} is online ({} online)", username, sessions.len());
        Ok(())
    }

    /// Remove `username` if it is still bound to `session_id`, then tell everyone else.
    pub async fn unregister(&self, username: &str, session_id: Uuid) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(username) {
            Some(handle) if handle.id() == session_id => {}
            _ => return false,
        }

        sessions.remove(username);
        broadcast(&sessions, &Packet::logout(username));
        log::info!("User {} went offline ({} online)", username, sessions.len());
        true
    }

    pub async fn lookup(&self, username: &str) -> Option<SessionHandle> {
        self.sessions.lock().await.get(username).cloned()
    }

    /// Queue `packet` to every online user in `recipients` except `exclude`.
    /// Returns how many sessions it was queued to.
    pub async fn send_to<'a, I>(&self, recipients: I, exclude: &str, packet: &Packet) -> usize
    where
        I: IntoIterator<Item = &'a String>,
    {
        let line = match encode(packet) {
            Ok(line) => line,
            Err(e) => {
                log::error!("Failed to encode {} packet: {}", packet.kind(), e);
                return 0;
            }
        };

        let sessions = self.sessions.lock().await;
        let mut delivered = 0;
        for username in recipients {
            if username == exclude {
                continue;
            }
            if let Some(handle) = sessions.get(username) {
                if handle.send_line(line.clone()) {
                    delivered += 1;
                }
            }
        }
        delivered
    }
}

fn broadcast(sessions: &HashMap<String, SessionHandle>, packet: &Packet) {
    let line = match encode(packet) {
        Ok(line) => line,
        Err(e) => {
            log::error!("Failed to encode {} packet: {}", packet.kind(), e);
            return;
        }
    };
    for handle in sessions.values() {
        handle.send_line(line.clone());
    }
}
