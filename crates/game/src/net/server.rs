use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{broadcast, mpsc};

use crate::session::{
    NetworkEvent, PlayerId, SessionError, SessionId, SessionService, SharedSessionService,
};

use super::framing::{read_frame, write_frame};
use super::protocol::{ClientFrame, ProtocolError, RequestBody, ResponseBody, ServerFrame};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_connections: usize,
    pub event_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_connections: 256,
            event_buffer: 64,
        }
    }
}

/// TCP front end for a [`SessionService`]. Each connection is one
/// participant: it signs in once, then creates, joins and leaves sessions.
pub struct SessionServer {
    listener: TcpListener,
    service: SharedSessionService,
    config: ServerConfig,
    connections: Arc<AtomicUsize>,
}

#[derive(Debug, Default)]
struct Peer {
    player_id: Option<PlayerId>,
    session_id: Option<SessionId>,
}

impl SessionServer {
    pub async fn bind(addr: impl ToSocketAddrs, config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            service: SessionService::shared(),
            config,
            connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn service(&self) -> SharedSessionService {
        Arc::clone(&self.service)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Accepts connections until the listener fails.
    pub async fn run(self) -> io::Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;

            if self.connections.load(Ordering::SeqCst) >= self.config.max_connections {
                log::warn!("Connection denied to {}: server full", addr);
                drop(stream);
                continue;
            }

            self.connections.fetch_add(1, Ordering::SeqCst);
            log::info!("Connection from {}", addr);

            let service = Arc::clone(&self.service);
            let connections = Arc::clone(&self.connections);
            let event_buffer = self.config.event_buffer;
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, service, event_buffer).await {
                    log::warn!("Connection {} closed with error: {}", addr, e);
                } else {
                    log::info!("Connection {} closed", addr);
                }
                connections.fetch_sub(1, Ordering::SeqCst);
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    service: SharedSessionService,
    event_buffer: usize,
) -> Result<(), ProtocolError> {
    stream.set_nodelay(true)?;
    let (reader, mut writer) = stream.into_split();

    // Frames are read on their own task so the select below only waits on
    // cancel-safe channel receives.
    let (frames_tx, mut frames_rx) = mpsc::channel(16);
    let reader_task = tokio::spawn(forward_frames(reader, frames_tx));

    let (events_tx, mut events_rx) = broadcast::channel(event_buffer);
    let mut peer = Peer::default();

    let result = loop {
        tokio::select! {
            frame = frames_rx.recv() => {
                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => break Err(e),
                    None => break Ok(()),
                };
                let body = handle_request(&service, &mut peer, &events_tx, frame.body).await;
                let response = ServerFrame::response(frame.request_id, body);
                if let Err(e) = send(&mut writer, response).await {
                    break Err(e);
                }
            }
            event = events_rx.recv() => {
                match event {
                    Ok(event) => {
                        if let Err(e) = send(&mut writer, ServerFrame::event(event)).await {
                            break Err(e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("Dropped {} session events for a slow client", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break Ok(()),
                }
            }
        }
    };

    reader_task.abort();
    release_peer(&service, &peer).await;
    result
}

async fn send(writer: &mut OwnedWriteHalf, frame: ServerFrame) -> Result<(), ProtocolError> {
    let bytes = frame.serialize()?;
    write_frame(writer, &bytes).await
}

async fn forward_frames(
    mut reader: OwnedReadHalf,
    frames: mpsc::Sender<Result<ClientFrame, ProtocolError>>,
) {
    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(Some(bytes)) => ClientFrame::deserialize(&bytes),
            Ok(None) => return,
            Err(e) => Err(e),
        };
        let failed = frame.is_err();
        if frames.send(frame).await.is_err() || failed {
            return;
        }
    }
}

async fn handle_request(
    service: &SharedSessionService,
    peer: &mut Peer,
    events: &broadcast::Sender<NetworkEvent>,
    body: RequestBody,
) -> ResponseBody {
    match process_request(service, peer, events, body).await {
        Ok(body) => body,
        Err(e) => {
            log::debug!("Request rejected: {}", e);
            ResponseBody::Error {
                message: e.to_string(),
            }
        }
    }
}

async fn process_request(
    service: &SharedSessionService,
    peer: &mut Peer,
    events: &broadcast::Sender<NetworkEvent>,
    body: RequestBody,
) -> Result<ResponseBody, SessionError> {
    match body {
        RequestBody::SignIn {
            installation_id,
            profile,
        } => {
            let player_id = service
                .lock()
                .await
                .sign_in_anonymously(installation_id, &profile)?;
            peer.player_id = Some(player_id);
            Ok(ResponseBody::SignedIn { player_id })
        }
        RequestBody::CreateOrJoin { config } => {
            let player_id = peer.player_id.ok_or(SessionError::NotSignedIn)?;
            let joined = service
                .lock()
                .await
                .create_or_join(player_id, config, events.clone())?;
            peer.session_id = Some(joined.session_id);
            Ok(ResponseBody::Joined(joined))
        }
        RequestBody::Leave { session_id } => {
            let player_id = peer.player_id.ok_or(SessionError::NotSignedIn)?;
            service.lock().await.leave(session_id, player_id)?;
            if peer.session_id == Some(session_id) {
                peer.session_id = None;
            }
            Ok(ResponseBody::Left)
        }
    }
}

async fn release_peer(service: &SharedSessionService, peer: &Peer) {
    if let (Some(player_id), Some(session_id)) = (peer.player_id, peer.session_id) {
        if let Err(e) = service.lock().await.leave(session_id, player_id) {
            log::debug!("Cleanup for player {} skipped: {}", player_id, e);
        }
    }
}
