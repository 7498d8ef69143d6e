/// Error types for the chat relay server.
/// Only `MalformedPacket` and `Transport` end a connection; nothing here is process-fatal.

use std::io;
use thiserror::Error;

/// Reasons a LOGIN or REGISTER request is rejected.
/// The display text is sent back to the requester in the `info` field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Username or Password not Correct")]
    BadCredentials,

    #[error("User Already Login")]
    AlreadyOnline,

    #[error("Username Already Exist")]
    UsernameTaken,

    #[error("Username must not be empty")]
    EmptyUsername,

    #[error("Password must not be empty")]
    EmptyPassword,

    #[error("Connection already authenticated")]
    AlreadyAuthenticated,

    #[error("Registration could not be saved")]
    Unavailable,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthError),

    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    #[error("Unknown route: {0}")]
    UnknownRoute(String),

    #[error("Invalid chat room: {0}")]
    InvalidRoom(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),
}

impl ServerError {
    /// Whether the connection that produced this error must be closed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ServerError::MalformedPacket(_) | ServerError::Transport(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
