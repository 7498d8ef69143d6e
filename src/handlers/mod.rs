/// Connection handling and packet routing
/// Provides the per-connection loop and the fan-out logic it dispatches to

pub mod connection;
pub mod routing;

pub use connection::{handle_connection, serve};
pub use routing::Router;
