/// TCP server factory and shared server state.
/// Provides the accept loop used by the main binary and a helper that
/// starts a server on a random port for tests.
use crate::error::Result;
use crate::handlers::{handle_connection, Router};
use crate::models::Message;
use crate::rooms::ChatRoomDirectory;
use crate::sessions::SessionRegistry;
use crate::store::{Accounts, LogStore, Stores};
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Everything a connection handler needs, owned by one server instance.
pub struct ServerState {
    pub accounts: Accounts,
    pub sessions: SessionRegistry,
    pub rooms: ChatRoomDirectory,
    history: LogStore<Message>,
}

impl ServerState {
    /// Open (or create) the logs under `data_dir` and replay them.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let stores = Stores::open(data_dir)?;
        Ok(ServerState::new(
            Accounts::load(stores.users)?,
            ChatRoomDirectory::load(stores.rooms)?,
            stores.messages,
        ))
    }

    /// Assemble state from already opened parts, with nobody online.
    pub fn new(accounts: Accounts, rooms: ChatRoomDirectory, history: LogStore<Message>) -> Self {
        ServerState {
            accounts,
            sessions: SessionRegistry::new(),
            rooms,
            history,
        }
    }

    pub fn router(&self) -> Router<'_> {
        Router::new(&self.sessions, &self.rooms, &self.history)
    }
}

pub struct ChatServer {
    listener: TcpListener,
    state: Arc<ServerState>,
}

impl ChatServer {
    /// Bind the listener. Use port 0 to get a random free port.
    pub async fn bind(bind_addr: &str, state: Arc<ServerState>) -> io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(ChatServer { listener, state })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever, one task per connection.
    /// A failed accept is logged and the loop carries on.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    log::debug!("Accepted connection from {}", peer);
                    tokio::spawn(handle_connection(stream, self.state.clone()));
                }
                Err(e) => {
                    log::error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}

/// Start a server on 127.0.0.1 with a random port, storing its logs in `data_dir`.
///
/// # Returns
/// The bound address, the shared state, and the task running the accept loop.
///
/// # Example
/// ```ignore
/// let dir = tempfile::TempDir::new()?;
/// let (addr, state, _task) = server::spawn_test_server(dir.path()).await?;
/// let stream = tokio::net::TcpStream::connect(addr).await?;
/// ```
pub async fn spawn_test_server(
    data_dir: &Path,
) -> Result<(SocketAddr, Arc<ServerState>, JoinHandle<()>)> {
    let state = Arc::new(ServerState::open(data_dir)?);
    let server = ChatServer::bind("127.0.0.1:0", state.clone()).await?;
    let addr = server.local_addr()?;
    let task = tokio::spawn(server.run());
    Ok((addr, state, task))
}
