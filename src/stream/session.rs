use super::registry::{SessionCommand, StreamHandle, StreamId, StreamRegistry};
use crate::errors::BinanceError;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle of one streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

/// Consumer side of a session: the dispatcher hands one of these to each
/// session task, which feeds it the open event, every inbound frame in
/// arrival order, and any failure.
pub(crate) trait StreamSink: Send + Sync + 'static {
    fn opened(&self, id: &StreamId);
    fn frame(&self, id: &StreamId, raw: &str);
    fn failed(&self, id: &StreamId, err: BinanceError);
}

/// One streaming connection, driven by its own spawned task.
///
/// The task owns the socket outright. It registers the session's handle on
/// a successful handshake, pumps frames into the sink, and deregisters when
/// the connection ends for any reason. A restart command tears the socket
/// down and connects a fresh one under the same id.
pub(crate) struct StreamSession {
    id: StreamId,
    url: String,
    registry: Arc<StreamRegistry>,
    sink: Arc<dyn StreamSink>,
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    state: SessionState,
}

impl StreamSession {
    pub(crate) fn new(
        id: StreamId,
        url: String,
        registry: Arc<StreamRegistry>,
        sink: Arc<dyn StreamSink>,
    ) -> Self {
        let (command_tx, commands) = mpsc::unbounded_channel();
        Self {
            id,
            url,
            registry,
            sink,
            command_tx,
            commands,
            state: SessionState::Connecting,
        }
    }

    // Sole mutation point for the session state.
    fn transition(&mut self, next: SessionState) {
        debug!(stream = %self.id, from = ?self.state, to = ?next, "session state change");
        self.state = next;
    }

    pub(crate) async fn run(mut self) {
        loop {
            match connect_async(&self.url).await {
                Ok((socket, _)) => {
                    self.transition(SessionState::Open);
                    self.registry.register(
                        self.id.clone(),
                        StreamHandle::new(self.command_tx.clone()),
                    );
                    // Removal rides a drop guard so a panicking caller
                    // handler still deregisters the id.
                    let _guard = RemoveOnDrop {
                        registry: Arc::clone(&self.registry),
                        id: self.id.clone(),
                    };
                    self.sink.opened(&self.id);

                    let resume = self.pump(socket).await;
                    self.transition(SessionState::Closed);
                    if !resume {
                        return;
                    }
                    self.transition(SessionState::Connecting);
                    debug!(stream = %self.id, "reconnecting with a fresh transport");
                }
                Err(e) => {
                    self.sink.failed(
                        &self.id,
                        BinanceError::Transport(format!(
                            "Failed to connect to {}: {}",
                            self.url, e
                        )),
                    );
                    self.transition(SessionState::Closed);
                    return;
                }
            }
        }
    }

    /// Read frames and commands until the connection ends; returns whether
    /// the session should reconnect under the same id.
    async fn pump(&mut self, socket: WsStream) -> bool {
        let (mut write, mut read) = socket.split();
        let id = self.id.clone();
        let sink = Arc::clone(&self.sink);

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let restart = matches!(command, Some(SessionCommand::Restart));
                    let _ = write.send(Message::Close(None)).await;
                    return restart;
                }
                message = read.next() => match message {
                    Some(Ok(Message::Text(text))) => sink.frame(&id, &text),
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => sink.frame(&id, &text),
                        Err(e) => sink.failed(
                            &id,
                            BinanceError::Decode(format!("Non-UTF8 binary frame: {}", e)),
                        ),
                    },
                    Some(Ok(Message::Ping(payload))) => {
                        // Pong replies are required to keep the stream alive.
                        if write.send(Message::Pong(payload)).await.is_err() {
                            return false;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return false,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        sink.failed(
                            &id,
                            BinanceError::Transport(format!("WebSocket error: {}", e)),
                        );
                        return false;
                    }
                },
            }
        }
    }
}

struct RemoveOnDrop {
    registry: Arc<StreamRegistry>,
    id: StreamId,
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}
