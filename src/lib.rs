//! Chat relay server library.
//! Session registry, chat room directory, packet routing and durable logs
//! behind a line-delimited JSON protocol over TCP.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod protocol;
pub mod rooms;
pub mod server;
pub mod sessions;
pub mod store;

pub use error::{AuthError, Result, ServerError};
pub use protocol::Packet;
pub use server::{ChatServer, ServerState};
