/// Data models shared by the wire protocol and the durable log store.
/// Represents users, chat rooms, and chat/file messages.
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Hash a password for storage, salted with the username.
pub fn hash_password(username: &str, password: &str) -> String {
    let digest = Sha256::digest(format!("{}:{}", username, password).as_bytes());
    hex::encode(digest)
}

/// A registered account, as persisted in the users log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub password_hash: String,
}

impl User {
    pub fn from_credentials(credentials: &Credentials) -> Self {
        User {
            username: credentials.username.clone(),
            password_hash: hash_password(&credentials.username, &credentials.password),
        }
    }

    pub fn verify(&self, password: &str) -> bool {
        self.password_hash == hash_password(&self.username, password)
    }
}

/// Username and plaintext password carried by LOGIN and REGISTER.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Packets are logged at debug level, keep the password out of it.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A bare username, used by presence and room-creation packets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRef {
    pub username: String,
}

impl UserRef {
    pub fn new(username: impl Into<String>) -> Self {
        UserRef {
            username: username.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatType {
    Private,
    Group,
}

/// A chat room. Identity is the `id` alone; membership never changes after creation.
///
/// Members keep the order the creator listed them in, so a room relays back
/// exactly as it was received.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: String,
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    pub users: Vec<String>,
    /// Client-local bookkeeping, never owned by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<i64>,
}

impl ChatRoom {
    pub fn new<I, S>(id: impl Into<String>, chat_type: ChatType, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ChatRoom {
            id: id.into(),
            chat_type,
            users: users.into_iter().map(Into::into).collect(),
            unread_count: None,
        }
    }

    pub fn private(id: impl Into<String>, first: &str, second: &str) -> Self {
        ChatRoom::new(id, ChatType::Private, [first, second])
    }

    pub fn group<I, S>(id: impl Into<String>, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ChatRoom::new(id, ChatType::Group, users)
    }

    pub fn has_member(&self, username: &str) -> bool {
        self.users.iter().any(|u| u == username)
    }

    /// Distinct member names, in sorted order.
    pub fn member_set(&self) -> BTreeSet<&str> {
        self.users.iter().map(String::as_str).collect()
    }

    /// Same kind of room over exactly the same participants, in any order.
    pub fn same_membership(&self, other: &ChatRoom) -> bool {
        self.chat_type == other.chat_type && self.member_set() == other.member_set()
    }

    /// Check the structural rules for a room requested by `creator`.
    pub fn validate(&self, creator: &str) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("chat room id is empty".to_string());
        }
        if self.users.iter().any(|u| u.is_empty()) {
            return Err(format!("chat room {} has an empty member name", self.id));
        }
        if self.member_set().len() != self.users.len() {
            return Err(format!("chat room {} lists a member twice", self.id));
        }
        match self.chat_type {
            ChatType::Private if self.users.len() != 2 => {
                return Err(format!(
                    "private chat room {} must have exactly two members, got {}",
                    self.id,
                    self.users.len()
                ));
            }
            ChatType::Group if self.users.len() < 2 => {
                return Err(format!(
                    "group chat room {} needs at least two members",
                    self.id
                ));
            }
            _ => {}
        }
        if !self.has_member(creator) {
            return Err(format!(
                "creator {} is not a member of chat room {}",
                creator, self.id
            ));
        }
        Ok(())
    }

    /// The form written to the rooms log: unread count is never persisted.
    pub fn to_record(&self) -> ChatRoom {
        ChatRoom {
            unread_count: None,
            ..self.clone()
        }
    }
}

impl PartialEq for ChatRoom {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ChatRoom {}

impl Hash for ChatRoom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Text,
    File,
}

/// A chat or file message. File contents travel base64-encoded in `data`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub chat_room_id: String,
    pub timestamp: i64,
    pub sent_by: String,
    pub data: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl Message {
    pub fn text(chat_room_id: &str, sent_by: &str, data: &str) -> Self {
        Message {
            chat_room_id: chat_room_id.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            sent_by: sent_by.to_string(),
            data: data.to_string(),
            message_type: MessageType::Text,
            file_name: None,
        }
    }

    pub fn file(chat_room_id: &str, sent_by: &str, file_name: &str, contents: &[u8]) -> Self {
        Message {
            chat_room_id: chat_room_id.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            sent_by: sent_by.to_string(),
            data: STANDARD.encode(contents),
            message_type: MessageType::File,
            file_name: Some(file_name.to_string()),
        }
    }

    /// Decoded file contents, `None` for text messages or undecodable payloads.
    pub fn file_contents(&self) -> Option<Vec<u8>> {
        match self.message_type {
            MessageType::File => STANDARD.decode(&self.data).ok(),
            MessageType::Text => None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match (self.message_type, &self.file_name) {
            (MessageType::Text, Some(_)) => {
                Err("text message must not carry a fileName".to_string())
            }
            (MessageType::File, None) => Err("file message is missing its fileName".to_string()),
            (MessageType::File, Some(name)) if name.is_empty() => {
                Err("file message has an empty fileName".to_string())
            }
            (MessageType::File, Some(_)) => STANDARD
                .decode(&self.data)
                .map(|_| ())
                .map_err(|e| format!("file payload is not valid base64: {}", e)),
            (MessageType::Text, None) => Ok(()),
        }
    }
}
