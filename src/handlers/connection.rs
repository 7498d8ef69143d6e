/// Per-connection handler.
/// Runs the login handshake, then the read-decode-dispatch loop, and cleans up on disconnect.
use crate::error::{AuthError, ServerError};
use crate::models::{ChatRoom, Credentials, Message, UserRef};
use crate::protocol::{read_packet, Packet};
use crate::server::ServerState;
use crate::sessions::SessionHandle;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;

/// Whether the read loop keeps going after a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// Serve one accepted TCP connection until it closes.
pub async fn handle_connection(stream: TcpStream, state: Arc<ServerState>) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown peer".to_string());
    if let Err(e) = stream.set_nodelay(true) {
        log::debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
    }

    let (reader, writer) = stream.into_split();
    serve(reader, writer, peer, state).await;
}

/// Serve a connection over any byte stream pair.
pub async fn serve<R, W>(reader: R, writer: W, peer: String, state: Arc<ServerState>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    log::info!("Connection opened: {}", peer);
    let (handle, rx) = SessionHandle::channel();
    let mut write_task = tokio::spawn(write_loop(writer, rx, peer.clone()));
    let mut writer_finished = false;

    let mut connection = Connection {
        peer,
        handle,
        state,
        username: None,
    };
    let mut reader = BufReader::new(reader);

    loop {
        tokio::select! {
            result = read_packet(&mut reader) => match result {
                Ok(Some(packet)) => {
                    if connection.dispatch(packet).await == Flow::Close {
                        break;
                    }
                }
                Ok(None) => {
                    log::info!("{} disconnected", connection.label());
                    break;
                }
                Err(e) if e.is_fatal() => {
                    log::warn!("Closing connection to {}: {}", connection.label(), e);
                    break;
                }
                Err(e) => log::warn!("Skipping input from {}: {}", connection.label(), e),
            },
            _ = &mut write_task, if !writer_finished => {
                writer_finished = true;
                log::info!("Write side of {} closed", connection.label());
                break;
            }
        }
    }

    connection.close().await;
    let peer = connection.peer.clone();
    drop(connection);
    if !writer_finished {
        // Pending lines are flushed once every handle to the queue is gone.
        let _ = write_task.await;
    }
    log::info!("Connection closed: {}", peer);
}

/// Drain one connection's outbound queue into its socket.
async fn write_loop<W>(mut writer: W, mut rx: UnboundedReceiver<String>, peer: String)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        let result = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = result {
            log::warn!("Write to {} failed: {}", peer, e);
            return;
        }
    }
    let _ = writer.shutdown().await;
}

struct Connection {
    peer: String,
    handle: SessionHandle,
    state: Arc<ServerState>,
    username: Option<String>,
}

impl Connection {
    fn label(&self) -> String {
        match &self.username {
            Some(username) => format!("{} ({})", username, self.peer),
            None => self.peer.clone(),
        }
    }

    async fn dispatch(&mut self, packet: Packet) -> Flow {
        log::debug!("Received {} from {}", packet.kind(), self.label());
        let username = self.username.clone();

        match (username, packet) {
            (None, Packet::Register { user }) => self.register(user).await,
            (None, Packet::Login { user }) => self.login(user).await,
            (None, other) => {
                log::warn!(
                    "Ignoring {} from unauthenticated {}",
                    other.kind(),
                    self.peer
                );
            }
            (Some(_), Packet::Register { .. }) => {
                self.reply(&Packet::register_failed(&AuthError::AlreadyAuthenticated));
            }
            (Some(_), Packet::Login { .. }) => {
                self.reply(&Packet::login_failed(&AuthError::AlreadyAuthenticated));
            }
            (Some(username), Packet::Message { message }) => {
                self.forward_message(&username, message).await;
            }
            (Some(username), Packet::CreateChat { user, chat_room }) => {
                self.create_chat(&username, user, chat_room).await;
            }
            (Some(username), Packet::Logout { user }) if user.username == username => {
                log::info!("{} logged out", self.label());
                return Flow::Close;
            }
            (Some(_), other) => {
                log::warn!("Ignoring {} from {}", other.kind(), self.label());
            }
        }
        Flow::Continue
    }

    async fn register(&mut self, credentials: Credentials) {
        match self.state.accounts.register(&credentials).await {
            Ok(_) => self.reply(&Packet::register_success()),
            Err(ServerError::Authentication(reason)) => {
                log::info!(
                    "Registration of {:?} from {} rejected: {}",
                    credentials.username,
                    self.peer,
                    reason
                );
                self.reply(&Packet::register_failed(&reason));
            }
            Err(e) => {
                log::error!("Registration of {:?} failed: {}", credentials.username, e);
                self.reply(&Packet::register_failed(&AuthError::Unavailable));
            }
        }
    }

    async fn login(&mut self, credentials: Credentials) {
        if let Err(reason) = self.state.accounts.verify(&credentials).await {
            log::info!(
                "Login of {:?} from {} rejected: {}",
                credentials.username,
                self.peer,
                reason
            );
            self.reply(&Packet::login_failed(&reason));
            return;
        }

        let admitted = self
            .state
            .sessions
            .register(
                &credentials.username,
                self.handle.clone(),
                &Packet::login_success(),
            )
            .await;
        match admitted {
            Ok(()) => {
                self.username = Some(credentials.username);
                log::info!("{} logged in", self.label());
            }
            Err(reason) => {
                log::info!(
                    "Login of {:?} from {} rejected: {}",
                    credentials.username,
                    self.peer,
                    reason
                );
                self.reply(&Packet::login_failed(&reason));
            }
        }
    }

    async fn forward_message(&self, username: &str, message: Message) {
        match self.state.router().route_message(username, message).await {
            Ok(_) => {}
            Err(ServerError::UnknownRoute(reason)) => {
                log::debug!("Dropped message from {}: {}", self.label(), reason);
            }
            Err(e) => log::error!("Failed to route message from {}: {}", self.label(), e),
        }
    }

    async fn create_chat(&self, username: &str, creator: UserRef, room: ChatRoom) {
        if creator.username != username {
            log::warn!(
                "{} tried to create chat room {} as {}",
                self.label(),
                room.id,
                creator.username
            );
            return;
        }

        match self.state.router().route_create_chat(username, room).await {
            Ok(_) => {}
            Err(ServerError::InvalidRoom(reason)) => {
                log::warn!("Rejected chat room from {}: {}", self.label(), reason);
            }
            Err(e) => log::error!("Failed to create chat room for {}: {}", self.label(), e),
        }
    }

    fn reply(&self, packet: &Packet) {
        if !self.handle.send(packet) {
            log::debug!("Dropped {} for closed {}", packet.kind(), self.label());
        }
    }

    /// Leave the session registry if this connection was logged in.
    async fn close(&mut self) {
        if let Some(username) = self.username.take() {
            self.state
                .sessions
                .unregister(&username, self.handle.id())
                .await;
        }
    }
}
