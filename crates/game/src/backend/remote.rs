use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{self, broadcast, oneshot};
use tokio::task::JoinHandle;

use crate::net::{
    ClientFrame, RequestBody, ResponseBody, ServerFrame, ServerMessage, read_frame, write_frame,
};
use crate::session::{
    AuthState, EventSink, JoinedSession, NetworkEvent, PlayerId, SessionConfig, SessionError,
    SessionId,
};

use super::{EVENT_CHANNEL_CAPACITY, SessionBackend, generate_installation_id};

type PendingRequests = Arc<Mutex<HashMap<u32, oneshot::Sender<ResponseBody>>>>;

struct Link {
    writer: OwnedWriteHalf,
    reader: JoinHandle<()>,
}

impl Drop for Link {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Backend that talks to a session server over TCP.
///
/// The connection is opened on the first request and reopened if it drops,
/// so an unreachable server surfaces as an ordinary request error.
pub struct RemoteBackend {
    server_addr: SocketAddr,
    installation_id: u64,
    auth: Mutex<AuthState>,
    link: sync::Mutex<Option<Link>>,
    pending: PendingRequests,
    next_request_id: AtomicU32,
    events: EventSink,
}

impl RemoteBackend {
    pub fn new(server_addr: SocketAddr) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            server_addr,
            installation_id: generate_installation_id(),
            auth: Mutex::new(AuthState::new()),
            link: sync::Mutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_request_id: AtomicU32::new(1),
            events,
        }
    }

    pub fn with_installation_id(mut self, installation_id: u64) -> Self {
        self.installation_id = installation_id;
        self
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.auth().player_id()
    }

    fn auth(&self) -> MutexGuard<'_, AuthState> {
        self.auth.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn open_link(&self) -> Result<Link, SessionError> {
        let stream = TcpStream::connect(self.server_addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();

        log::info!("Connected to session server {}", self.server_addr);

        // Sign-in state lives on the server connection.
        self.auth().sign_out();

        let reader = tokio::spawn(read_loop(
            reader,
            Arc::clone(&self.pending),
            self.events.clone(),
        ));
        Ok(Link { writer, reader })
    }

    async fn request(&self, body: RequestBody) -> Result<ResponseBody, SessionError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let bytes = ClientFrame::new(request_id, body).serialize()?;

        let (tx, rx) = oneshot::channel();
        lock_pending(&self.pending).insert(request_id, tx);

        if let Err(e) = self.send(&bytes).await {
            lock_pending(&self.pending).remove(&request_id);
            return Err(e);
        }

        match rx.await.map_err(|_| SessionError::Disconnected)? {
            ResponseBody::Error { message } => Err(SessionError::Rejected(message)),
            body => Ok(body),
        }
    }

    async fn send(&self, bytes: &[u8]) -> Result<(), SessionError> {
        let mut link = self.link.lock().await;

        if link.as_ref().is_none_or(|l| l.reader.is_finished()) {
            *link = Some(self.open_link().await?);
        }

        let Some(active) = link.as_mut() else {
            return Err(SessionError::Disconnected);
        };
        if let Err(e) = write_frame(&mut active.writer, bytes).await {
            *link = None;
            return Err(e.into());
        }
        Ok(())
    }
}

fn lock_pending(
    pending: &PendingRequests,
) -> MutexGuard<'_, HashMap<u32, oneshot::Sender<ResponseBody>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn read_loop(mut reader: OwnedReadHalf, pending: PendingRequests, events: EventSink) {
    loop {
        let bytes = match read_frame(&mut reader).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                log::info!("Session server closed the connection");
                break;
            }
            Err(e) => {
                log::warn!("Session server connection failed: {}", e);
                break;
            }
        };

        let frame = match ServerFrame::deserialize(&bytes) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Dropping session server connection: {}", e);
                break;
            }
        };

        match frame.message {
            ServerMessage::Response { request_id, body } => {
                match lock_pending(&pending).remove(&request_id) {
                    Some(waiter) => {
                        let _ = waiter.send(body);
                    }
                    None => log::warn!("Response for unknown request {}", request_id),
                }
            }
            ServerMessage::Event(event) => {
                log::debug!("Session event {:?}", event);
                // No subscribers just means nobody is listening yet.
                let _ = events.send(event);
            }
        }
    }

    // Dropping the waiters fails every in-flight request with Disconnected.
    lock_pending(&pending).clear();
}

impl SessionBackend for RemoteBackend {
    fn switch_profile(&self, profile: &str) -> Result<(), SessionError> {
        self.auth().switch_profile(profile)
    }

    async fn sign_in_anonymously(&self) -> Result<PlayerId, SessionError> {
        let profile = self.auth().profile().to_string();
        let body = RequestBody::SignIn {
            installation_id: self.installation_id,
            profile,
        };

        match self.request(body).await? {
            ResponseBody::SignedIn { player_id } => {
                self.auth().complete_sign_in(player_id);
                Ok(player_id)
            }
            _ => Err(SessionError::UnexpectedResponse),
        }
    }

    async fn create_or_join_session(
        &self,
        config: SessionConfig,
    ) -> Result<JoinedSession, SessionError> {
        match self.request(RequestBody::CreateOrJoin { config }).await? {
            ResponseBody::Joined(joined) => Ok(joined),
            _ => Err(SessionError::UnexpectedResponse),
        }
    }

    async fn leave_session(&self, session_id: SessionId) -> Result<(), SessionError> {
        match self.request(RequestBody::Leave { session_id }).await? {
            ResponseBody::Left => Ok(()),
            _ => Err(SessionError::UnexpectedResponse),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<NetworkEvent> {
        self.events.subscribe()
    }
}
