//! Connection state machine: signs a profile in and creates or joins a named
//! session, holding at most one session at a time.

mod handle;

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::backend::SessionBackend;
use crate::session::{ClientId, DEFAULT_MAX_PLAYERS, NetworkEvent, SessionConfig, SessionError};

pub use handle::SessionHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        }
    }
}

/// Published to every [`ConnectionManager::subscribe`] receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    StateChanged(ConnectionState),
    /// The local participant finished connecting and may spawn its entities.
    LocalClientConnected { client_id: ClientId },
    /// The local participant became the session owner.
    LocalOwnerPromoted { client_id: ClientId },
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("profile name must not be empty")]
    EmptyProfile,
    #[error("session name must not be empty")]
    EmptySessionName,
    #[error("a connection attempt is already in progress")]
    AlreadyConnecting,
    #[error("already connected to session '{0}'")]
    AlreadyConnected(String),
    #[error(transparent)]
    Session(#[from] SessionError),
}

pub struct ConnectionManager<B: SessionBackend> {
    backend: Arc<B>,
    state: ConnectionState,
    session: Option<SessionHandle>,
    max_players: u32,
    network_events: broadcast::Receiver<NetworkEvent>,
    subscribers: Vec<mpsc::UnboundedSender<ConnectionEvent>>,
}

impl<B: SessionBackend> ConnectionManager<B> {
    pub fn new(backend: B) -> Self {
        Self::with_shared_backend(Arc::new(backend))
    }

    pub fn with_shared_backend(backend: Arc<B>) -> Self {
        let network_events = backend.subscribe();
        Self {
            backend,
            state: ConnectionState::Disconnected,
            session: None,
            max_players: DEFAULT_MAX_PLAYERS,
            network_events,
            subscribers: Vec::new(),
        }
    }

    pub fn with_max_players(mut self, max_players: u32) -> Self {
        self.max_players = max_players;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ConnectionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Signs in with `profile_name` and creates or joins `session_name`.
    ///
    /// Any backend failure returns the manager to `Disconnected` with no
    /// session held. Calls made while connecting or connected are rejected
    /// without touching the state.
    pub async fn connect(
        &mut self,
        profile_name: &str,
        session_name: &str,
    ) -> Result<SessionHandle, ConnectionError> {
        match self.state {
            ConnectionState::Connecting => return Err(ConnectionError::AlreadyConnecting),
            ConnectionState::Connected => {
                let name = self
                    .session
                    .as_ref()
                    .map(|s| s.name().to_string())
                    .unwrap_or_default();
                return Err(ConnectionError::AlreadyConnected(name));
            }
            ConnectionState::Disconnected => {}
        }
        if profile_name.is_empty() {
            return Err(ConnectionError::EmptyProfile);
        }
        if session_name.is_empty() {
            return Err(ConnectionError::EmptySessionName);
        }

        self.set_state(ConnectionState::Connecting);

        match self.create_or_join(profile_name, session_name).await {
            Ok(handle) => {
                log::info!(
                    "Joined session '{}' as client {} ({}/{} players)",
                    handle.name(),
                    handle.local_client_id(),
                    handle.player_count(),
                    handle.max_players()
                );
                self.session = Some(handle.clone());
                self.set_state(ConnectionState::Connected);
                Ok(handle)
            }
            Err(e) => {
                log::error!("Failed to create or join session '{}': {}", session_name, e);
                self.session = None;
                self.set_state(ConnectionState::Disconnected);
                Err(e.into())
            }
        }
    }

    async fn create_or_join(
        &self,
        profile_name: &str,
        session_name: &str,
    ) -> Result<SessionHandle, SessionError> {
        self.backend.switch_profile(profile_name)?;
        let player_id = self.backend.sign_in_anonymously().await?;
        log::debug!("Signed in as player {} (profile '{}')", player_id, profile_name);

        let config = SessionConfig::new(session_name)
            .with_max_players(self.max_players)
            .with_distributed_authority();
        let joined = self.backend.create_or_join_session(config).await?;

        Ok(SessionHandle::from(joined))
    }

    /// Drains pending backend notifications and dispatches the ones that
    /// belong to the held session. Returns how many were handled.
    pub fn poll_network_events(&mut self) -> usize {
        let mut handled = 0;
        loop {
            match self.network_events.try_recv() {
                Ok(event) => {
                    if self.handle_network_event(event) {
                        handled += 1;
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    log::warn!("Missed {} session notifications", skipped);
                }
                Err(_) => break,
            }
        }
        handled
    }

    pub fn handle_network_event(&mut self, event: NetworkEvent) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if event.session_id() != session.session_id() {
            return false;
        }

        let local = session.local_client_id();
        match event {
            NetworkEvent::ClientConnected { client_id, .. } => {
                if client_id == local {
                    log::info!("Client-{} is connected and can spawn entities.", client_id);
                    self.publish(ConnectionEvent::LocalClientConnected { client_id });
                } else {
                    session.member_joined();
                    log::debug!("Client-{} joined the session", client_id);
                }
            }
            NetworkEvent::ClientDisconnected { client_id, .. } => {
                if client_id != local {
                    session.member_left();
                }
                log::debug!("Client-{} left the session", client_id);
            }
            NetworkEvent::SessionOwnerPromoted { client_id, .. } => {
                session.set_owner(client_id);
                if client_id == local {
                    log::info!("Client-{} is the session owner!", client_id);
                    self.publish(ConnectionEvent::LocalOwnerPromoted { client_id });
                }
            }
        }
        true
    }

    /// Releases the held session and issues the leave request on a detached
    /// task. Completion is best effort; nothing waits on the returned handle
    /// unless the caller does.
    pub fn leave(&mut self) -> Option<JoinHandle<()>> {
        let session = self.session.take()?;
        self.set_state(ConnectionState::Disconnected);
        self.spawn_leave(session)
    }

    fn spawn_leave(&self, session: SessionHandle) -> Option<JoinHandle<()>> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                log::warn!(
                    "No async runtime available, session '{}' not left",
                    session.name()
                );
                return None;
            }
        };

        let backend = Arc::clone(&self.backend);
        Some(runtime.spawn(async move {
            match backend.leave_session(session.session_id()).await {
                Ok(()) => log::info!("Left session '{}'", session.name()),
                Err(e) => log::warn!("Leaving session '{}' failed: {}", session.name(), e),
            }
        }))
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        log::debug!("Connection state {} -> {}", self.state.as_str(), state.as_str());
        self.state = state;
        self.publish(ConnectionEvent::StateChanged(state));
    }

    fn publish(&mut self, event: ConnectionEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }
}

impl<B: SessionBackend> Drop for ConnectionManager<B> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            let _ = self.spawn_leave(session);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use crate::session::SessionService;

    fn manager() -> ConnectionManager<LocalBackend> {
        ConnectionManager::new(LocalBackend::new(SessionService::shared()))
    }

    #[tokio::test]
    async fn test_empty_names_rejected_without_transition() {
        let mut manager = manager();
        let mut events = manager.subscribe();

        assert!(matches!(
            manager.connect("", "arena").await,
            Err(ConnectionError::EmptyProfile)
        ));
        assert!(matches!(
            manager.connect("alice", "").await,
            Err(ConnectionError::EmptySessionName)
        ));

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_second_connect_rejected_while_connected() {
        let mut manager = manager();
        let first = manager.connect("alice", "arena").await.unwrap();

        let second = manager.connect("alice", "other").await;

        assert!(matches!(second, Err(ConnectionError::AlreadyConnected(name)) if name == "arena"));
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.session(), Some(&first));
    }

    #[tokio::test]
    async fn test_events_for_other_sessions_ignored() {
        let mut manager = manager();
        let mut events = manager.subscribe();
        let handle = manager.connect("alice", "arena").await.unwrap();
        while events.try_recv().is_ok() {}

        let handled = manager.handle_network_event(NetworkEvent::ClientConnected {
            session_id: handle.session_id() + 1,
            client_id: handle.local_client_id(),
        });

        assert!(!handled);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_state_names() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::Connecting.as_str(), "Connecting");
    }
}
