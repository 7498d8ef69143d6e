/// Packet definitions for client/server communication.
/// Each wire `type` is its own variant carrying exactly the fields it needs.
use crate::error::AuthError;
use crate::models::{ChatRoom, Credentials, Message, UserRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Packet {
    Register {
        user: Credentials,
    },
    RegisterSuccess {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        info: Option<String>,
    },
    RegisterFailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        info: Option<String>,
    },
    Login {
        user: Credentials,
    },
    LoginSuccess {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        info: Option<String>,
    },
    LoginFailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        info: Option<String>,
    },
    NewUser {
        user: UserRef,
    },
    Logout {
        user: UserRef,
    },
    CreateChat {
        user: UserRef,
        #[serde(rename = "chatRoom")]
        chat_room: ChatRoom,
    },
    Message {
        message: Message,
    },
}

impl Packet {
    pub fn register(username: &str, password: &str) -> Self {
        Packet::Register {
            user: Credentials::new(username, password),
        }
    }

    pub fn login(username: &str, password: &str) -> Self {
        Packet::Login {
            user: Credentials::new(username, password),
        }
    }

    pub fn register_success() -> Self {
        Packet::RegisterSuccess { info: None }
    }

    pub fn register_failed(reason: &AuthError) -> Self {
        Packet::RegisterFailed {
            info: Some(reason.to_string()),
        }
    }

    pub fn login_success() -> Self {
        Packet::LoginSuccess { info: None }
    }

    pub fn login_failed(reason: &AuthError) -> Self {
        Packet::LoginFailed {
            info: Some(reason.to_string()),
        }
    }

    pub fn new_user(username: &str) -> Self {
        Packet::NewUser {
            user: UserRef::new(username),
        }
    }

    pub fn logout(username: &str) -> Self {
        Packet::Logout {
            user: UserRef::new(username),
        }
    }

    pub fn create_chat(creator: &str, chat_room: ChatRoom) -> Self {
        Packet::CreateChat {
            user: UserRef::new(creator),
            chat_room,
        }
    }

    pub fn message(message: Message) -> Self {
        Packet::Message { message }
    }

    /// Wire name of the packet type, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Register { .. } => "REGISTER",
            Packet::RegisterSuccess { .. } => "REGISTER_SUCCESS",
            Packet::RegisterFailed { .. } => "REGISTER_FAILED",
            Packet::Login { .. } => "LOGIN",
            Packet::LoginSuccess { .. } => "LOGIN_SUCCESS",
            Packet::LoginFailed { .. } => "LOGIN_FAILED",
            Packet::NewUser { .. } => "NEW_USER",
            Packet::Logout { .. } => "LOGOUT",
            Packet::CreateChat { .. } => "CREATE_CHAT",
            Packet::Message { .. } => "MESSAGE",
        }
    }

    /// Variant-level checks that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Packet::Message { message } => message.validate(),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatType, MessageType};

    #[test]
    fn test_login_wire_format() {
        let json = serde_json::to_value(Packet::login("alice", "secret1")).unwrap();
        assert_eq!(json["type"], "LOGIN");
        assert_eq!(json["user"]["username"], "alice");
        assert_eq!(json["user"]["password"], "secret1");
    }

    #[test]
    fn test_outcome_packets_omit_missing_info() {
        let json = serde_json::to_string(&Packet::login_success()).unwrap();
        assert_eq!(json, r#"{"type":"LOGIN_SUCCESS"}"#);

        let json = serde_json::to_string(&Packet::register_failed(&AuthError::UsernameTaken)).unwrap();
        assert_eq!(json, r#"{"type":"REGISTER_FAILED","info":"Username Already Exist"}"#);
    }

    #[test]
    fn test_create_chat_wire_format() {
        let room = ChatRoom::private("r1", "alice", "bob");
        let json = serde_json::to_value(Packet::create_chat("alice", room)).unwrap();
        assert_eq!(json["type"], "CREATE_CHAT");
        assert_eq!(json["user"]["username"], "alice");
        assert_eq!(json["chatRoom"]["id"], "r1");
        assert_eq!(json["chatRoom"]["type"], "PRIVATE");
    }

    #[test]
    fn test_message_wire_format() {
        let json = r#"{"type":"MESSAGE","message":{"chatRoomId":"r1","timestamp":1700000000000,"sentBy":"alice","data":"aGk=","type":"FILE","fileName":"hi.txt"}}"#;
        let packet: Packet = serde_json::from_str(json).unwrap();
        match packet {
            Packet::Message { message } => {
                assert_eq!(message.message_type, MessageType::File);
                assert_eq!(message.file_name.as_deref(), Some("hi.txt"));
                assert_eq!(message.file_contents().unwrap(), b"hi".to_vec());
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_missing_variant_field_is_rejected() {
        assert!(serde_json::from_str::<Packet>(r#"{"type":"LOGIN"}"#).is_err());
        assert!(serde_json::from_str::<Packet>(r#"{"type":"CREATE_CHAT","user":{"username":"a"}}"#).is_err());
        assert!(serde_json::from_str::<Packet>(r#"{"type":"SHOUT"}"#).is_err());
    }

    #[test]
    fn test_kind_matches_wire_tag() {
        let packets = vec![
            Packet::register("a", "b"),
            Packet::login_failed(&AuthError::BadCredentials),
            Packet::new_user("a"),
            Packet::logout("a"),
            Packet::create_chat("a", ChatRoom::new("r", ChatType::Group, ["a", "b"])),
            Packet::message(Message::text("r", "a", "hi")),
        ];
        for packet in packets {
            let json = serde_json::to_value(&packet).unwrap();
            assert_eq!(json["type"], packet.kind());
        }
    }
}
