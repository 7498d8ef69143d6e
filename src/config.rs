/// Configuration management for the chat relay server.
/// Handles command-line argument parsing and config structure.
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "Chat Relay Server")]
#[command(about = "Multi-user chat server: sessions, chat rooms and message relay", long_about = None)]
pub struct Config {
    /// Address to listen on (default: 127.0.0.1)
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port (default: 2345)
    #[arg(long, default_value = "2345")]
    pub port: u16,

    /// Directory holding the user, chat room and message logs
    #[arg(long, default_value = "chatting/server")]
    pub data_dir: PathBuf,

    /// PID file path (optional) - write server PID to this file on startup
    #[arg(long)]
    pub pidfile: Option<PathBuf>,
}

impl Config {
    /// Parse command-line arguments into Config
    pub fn from_args() -> Self {
        Config::parse()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
