#![allow(dead_code)]

/// Common test utilities and helpers for integration tests
/// Provides a running server in a temp directory and a line-protocol test client

use chat_relay_server::protocol::{read_packet, write_packet};
use chat_relay_server::server::{spawn_test_server, ServerState};
use chat_relay_server::Packet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Test context holding a live server and its data directory
pub struct TestContext {
    pub addr: SocketAddr,
    pub state: Arc<ServerState>,
    pub task: JoinHandle<()>,
    pub temp_dir: TempDir,
}

impl TestContext {
    pub async fn start() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self::start_in(temp_dir).await
    }

    /// Start a server over an existing data directory
    pub async fn start_in(temp_dir: TempDir) -> Self {
        let (addr, state, task) = spawn_test_server(temp_dir.path())
            .await
            .expect("Failed to start server");
        TestContext {
            addr,
            state,
            task,
            temp_dir,
        }
    }

    /// Stop the accept loop and hand back the data directory
    pub fn stop(self) -> TempDir {
        self.task.abort();
        self.temp_dir
    }

    pub async fn connect(&self) -> TestClient {
        TestClient::connect(self.addr).await
    }

    /// Connect, register and log in `username`, consuming the login reply
    pub async fn login(&self, username: &str, password: &str) -> TestClient {
        let mut client = self.connect().await;
        client.send(&Packet::register(username, password)).await;
        assert_eq!(client.recv().await, Packet::register_success());
        client.send(&Packet::login(username, password)).await;
        assert_eq!(client.recv().await, Packet::login_success());
        client
    }
}

pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr)
            .await
            .expect("Failed to connect to server");
        let (reader, writer) = stream.into_split();
        TestClient {
            reader: BufReader::new(reader),
            writer,
        }
    }

    pub async fn send(&mut self, packet: &Packet) {
        write_packet(&mut self.writer, packet)
            .await
            .expect("Failed to send packet");
    }

    pub async fn send_raw(&mut self, line: &str) {
        use tokio::io::AsyncWriteExt;
        self.writer
            .write_all(line.as_bytes())
            .await
            .expect("Failed to send raw line");
    }

    pub async fn recv(&mut self) -> Packet {
        self.try_recv(Duration::from_secs(5))
            .await
            .expect("timed out waiting for packet")
    }

    /// Next packet within `wait`, or None on timeout or closed stream
    pub async fn try_recv(&mut self, wait: Duration) -> Option<Packet> {
        match timeout(wait, read_packet(&mut self.reader)).await {
            Ok(result) => result.expect("server sent a malformed packet"),
            Err(_) => None,
        }
    }

    /// Assert nothing arrives for a short while
    pub async fn assert_silent(&mut self) {
        let next = self.try_recv(Duration::from_millis(150)).await;
        assert!(next.is_none(), "unexpected packet: {:?}", next);
    }

    /// Wait until the server closes the stream
    pub async fn expect_closed(&mut self) {
        let next = timeout(Duration::from_secs(5), read_packet(&mut self.reader))
            .await
            .expect("timed out waiting for close");
        assert!(matches!(next, Ok(None) | Err(_)), "expected close, got {:?}", next);
    }
}
