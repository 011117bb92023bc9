//! Live chat channel: one WebSocket per open conversation.
//!
//! A single background task owns the socket. It forwards outbound frames
//! queued by [`LiveConnection::send`] and reports inbound traffic as
//! [`LiveEvent`]s. The task never reconnects: once the socket closes or
//! errors, the connection stays down.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use placement_shared::{ChatFrame, ConnectionState, ConversationId};

use crate::error::{ClientError, Result};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `close` waits for the close handshake before aborting the task.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Inbound traffic on a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    /// Raw text frame, parsed by the receiver.
    Frame(String),
    /// The server closed the socket.
    Closed,
    /// Transport failure; the socket is gone.
    Error(String),
}

/// Owning handle to an open live socket.
///
/// Dropping the handle aborts the socket task, so a connection can never
/// outlive the session that opened it.
pub struct LiveConnection {
    conversation: ConversationId,
    outbound: mpsc::Sender<String>,
    state: watch::Receiver<ConnectionState>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl LiveConnection {
    /// Perform the WebSocket handshake and spawn the socket task. Inbound
    /// events are delivered on `events`.
    pub async fn connect(
        url: &Url,
        conversation: ConversationId,
        events: mpsc::Sender<LiveEvent>,
        buffer: usize,
    ) -> Result<Self> {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        debug!(url = %url, "Opening live channel");
        let (socket, _response) = connect_async(url.as_str()).await?;
        state_tx.send_replace(ConnectionState::Connected);
        info!(conversation = %conversation, "Live channel connected");

        let (outbound_tx, outbound_rx) = mpsc::channel(buffer.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(run_socket(
            socket,
            conversation.clone(),
            outbound_rx,
            shutdown_rx,
            events,
            state_tx,
        ));

        Ok(Self {
            conversation,
            outbound: outbound_tx,
            state: state_rx,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Queue a frame for delivery. Fails without blocking when the socket is
    /// down or the outbound queue is full.
    pub fn send(&self, frame: &ChatFrame) -> Result<()> {
        if !self.is_open() {
            return Err(ClientError::NotConnected);
        }
        let json = frame.to_json()?;
        self.outbound
            .try_send(json)
            .map_err(|_| ClientError::NotConnected)
    }

    /// Send a close frame and wait (briefly) for the socket task to finish.
    pub async fn close(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err() {
                warn!(conversation = %self.conversation, "Live channel close timed out, aborting");
                task.abort();
            }
        }
        debug!(conversation = %self.conversation, "Live channel released");
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_socket(
    mut socket: Socket,
    conversation: ConversationId,
    mut outbound: mpsc::Receiver<String>,
    mut shutdown: oneshot::Receiver<()>,
    events: mpsc::Sender<LiveEvent>,
    state: watch::Sender<ConnectionState>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let _ = socket.close(None).await;
                state.send_replace(ConnectionState::Disconnected);
                debug!(conversation = %conversation, "Live channel closed locally");
                return;
            }
            Some(text) = outbound.recv() => {
                if let Err(e) = socket.send(WsMessage::Text(text)).await {
                    warn!(conversation = %conversation, error = %e, "Live send failed");
                    state.send_replace(ConnectionState::Disconnected);
                    let _ = events.send(LiveEvent::Error(e.to_string())).await;
                    return;
                }
            }
            inbound = socket.next() => match inbound {
                Some(Ok(WsMessage::Text(text))) => {
                    if events.send(LiveEvent::Frame(text)).await.is_err() {
                        // Receiver gone: the session was torn down.
                        let _ = socket.close(None).await;
                        state.send_replace(ConnectionState::Disconnected);
                        return;
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!(conversation = %conversation, "Live channel closed by server");
                    state.send_replace(ConnectionState::Disconnected);
                    let _ = events.send(LiveEvent::Closed).await;
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(conversation = %conversation, error = %e, "Live channel error");
                    state.send_replace(ConnectionState::Disconnected);
                    let _ = events.send(LiveEvent::Error(e.to_string())).await;
                    return;
                }
            },
        }
    }
}
