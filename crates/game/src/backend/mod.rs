mod local;
mod remote;

use std::future::Future;

use tokio::sync::broadcast;

use crate::session::{JoinedSession, NetworkEvent, PlayerId, SessionConfig, SessionError, SessionId};

pub use local::LocalBackend;
pub use remote::RemoteBackend;

pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Authentication and session calls the connection manager drives.
///
/// Implementations are shared behind an `Arc` and the leave future is run on
/// a detached task, so every future has to be `Send`.
pub trait SessionBackend: Send + Sync + 'static {
    fn switch_profile(&self, profile: &str) -> Result<(), SessionError>;

    fn sign_in_anonymously(&self) -> impl Future<Output = Result<PlayerId, SessionError>> + Send;

    /// Joins the session named in `config`, creating it if it does not exist.
    fn create_or_join_session(
        &self,
        config: SessionConfig,
    ) -> impl Future<Output = Result<JoinedSession, SessionError>> + Send;

    fn leave_session(
        &self,
        session_id: SessionId,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Notifications for sessions this participant has joined.
    fn subscribe(&self) -> broadcast::Receiver<NetworkEvent>;
}

/// Random per-process installation id, standing in for a device id.
pub fn generate_installation_id() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let state = RandomState::new();
    let mut hasher = state.build_hasher();
    hasher.write_u128(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default(),
    );
    hasher.finish()
}
