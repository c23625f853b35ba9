use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use crate::session::{
    AuthState, EventSink, JoinedSession, NetworkEvent, PlayerId, SessionConfig, SessionError,
    SessionId, SharedSessionService,
};

use super::{EVENT_CHANNEL_CAPACITY, SessionBackend, generate_installation_id};

/// In-process backend: talks straight to a shared [`SessionService`].
/// Each instance acts as one installation with its own profile and sign-in.
///
/// [`SessionService`]: crate::session::SessionService
pub struct LocalBackend {
    service: SharedSessionService,
    installation_id: u64,
    auth: Mutex<AuthState>,
    events: EventSink,
}

impl LocalBackend {
    pub fn new(service: SharedSessionService) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            service,
            installation_id: generate_installation_id(),
            auth: Mutex::new(AuthState::new()),
            events,
        }
    }

    pub fn with_installation_id(mut self, installation_id: u64) -> Self {
        self.installation_id = installation_id;
        self
    }

    pub fn service(&self) -> &SharedSessionService {
        &self.service
    }

    pub fn installation_id(&self) -> u64 {
        self.installation_id
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.auth().player_id()
    }

    fn auth(&self) -> MutexGuard<'_, AuthState> {
        self.auth.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionBackend for LocalBackend {
    fn switch_profile(&self, profile: &str) -> Result<(), SessionError> {
        self.auth().switch_profile(profile)
    }

    async fn sign_in_anonymously(&self) -> Result<PlayerId, SessionError> {
        let profile = self.auth().profile().to_string();
        let player_id = self
            .service
            .lock()
            .await
            .sign_in_anonymously(self.installation_id, &profile)?;
        self.auth().complete_sign_in(player_id);
        Ok(player_id)
    }

    async fn create_or_join_session(
        &self,
        config: SessionConfig,
    ) -> Result<JoinedSession, SessionError> {
        let player_id = self.player_id().ok_or(SessionError::NotSignedIn)?;
        self.service
            .lock()
            .await
            .create_or_join(player_id, config, self.events.clone())
    }

    async fn leave_session(&self, session_id: SessionId) -> Result<(), SessionError> {
        let player_id = self.player_id().ok_or(SessionError::NotSignedIn)?;
        self.service.lock().await.leave(session_id, player_id)?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<NetworkEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::session::SessionService;

    #[tokio::test]
    async fn test_join_requires_sign_in() {
        let backend = LocalBackend::new(SessionService::shared());

        let result = backend
            .create_or_join_session(SessionConfig::new("arena"))
            .await;

        assert!(matches!(result, Err(SessionError::NotSignedIn)));
    }

    #[tokio::test]
    async fn test_two_installations_share_a_session() {
        let service = SessionService::shared();
        let alice = LocalBackend::new(Arc::clone(&service)).with_installation_id(1);
        let bob = LocalBackend::new(Arc::clone(&service)).with_installation_id(2);

        alice.switch_profile("alice").unwrap();
        bob.switch_profile("bob").unwrap();
        alice.sign_in_anonymously().await.unwrap();
        bob.sign_in_anonymously().await.unwrap();

        let a = alice
            .create_or_join_session(SessionConfig::new("arena"))
            .await
            .unwrap();
        let b = bob
            .create_or_join_session(SessionConfig::new("arena"))
            .await
            .unwrap();

        assert_eq!(a.session_id, b.session_id);
        assert_eq!(service.lock().await.session_count(), 1);

        alice.leave_session(a.session_id).await.unwrap();
        bob.leave_session(b.session_id).await.unwrap();
        assert_eq!(service.lock().await.session_count(), 0);
    }
}
