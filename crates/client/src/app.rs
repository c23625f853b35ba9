use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use cubesync::{
    ConnectionError, ConnectionEvent, ConnectionManager, ConnectionState, SessionBackend,
    SessionHandle,
};

use crate::game::Scene;
use crate::net::ClientConfig;
use crate::tui::{ConnectForm, FormAction};

type ConnectOutcome<B> = (
    ConnectionManager<B>,
    Result<SessionHandle, ConnectionError>,
);

pub struct App<B: SessionBackend> {
    runtime: Handle,
    /// `None` while a connect attempt owns the manager.
    manager: Option<ConnectionManager<B>>,
    pending: Option<oneshot::Receiver<ConnectOutcome<B>>>,
    /// Leave asked for before the connect task handed the manager back.
    leave_queued: bool,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    state: ConnectionState,
    form: ConnectForm,
    scene: Scene,
    status: Option<String>,
    should_quit: bool,
}

impl<B: SessionBackend> App<B> {
    pub fn new(runtime: Handle, backend: B, config: &ClientConfig) -> Self {
        let mut manager = ConnectionManager::new(backend).with_max_players(config.max_players);
        let events = manager.subscribe();

        Self {
            runtime,
            manager: Some(manager),
            pending: None,
            leave_queued: false,
            events,
            state: ConnectionState::Disconnected,
            form: ConnectForm::new(config.profile.as_str(), config.session.as_str()),
            scene: Scene::new(config.motion, config.tick_rate),
            status: None,
            should_quit: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn form(&self) -> &ConnectForm {
        &self.form
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.manager.as_ref().and_then(|manager| manager.session())
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Starts a create-or-join with the form's names. The manager moves into
    /// the task and comes back through `pending` when the attempt settles.
    pub fn submit(&mut self) {
        if !self.form.submit_enabled(self.state) {
            return;
        }
        let Some(mut manager) = self.manager.take() else {
            return;
        };

        let profile = self.form.profile().to_string();
        let session = self.form.session().to_string();
        let (tx, rx) = oneshot::channel();

        self.runtime.spawn(async move {
            let result = manager.connect(&profile, &session).await;
            let _ = tx.send((manager, result));
        });

        self.pending = Some(rx);
        self.state = ConnectionState::Connecting;
        self.status = None;
    }

    /// Collects a finished connect attempt, dispatches backend notifications
    /// and advances the scene.
    pub fn update(&mut self, delta: f32, now: Instant) {
        self.collect_connect_outcome();

        if let Some(manager) = self.manager.as_mut() {
            manager.poll_network_events();
        }

        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
        }

        self.scene.update(delta, now);
    }

    fn collect_connect_outcome(&mut self) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };

        match pending.try_recv() {
            Ok((manager, result)) => {
                if let Err(e) = result {
                    log::warn!("Connect attempt failed: {}", e);
                }
                self.manager = Some(manager);
                self.pending = None;
                if std::mem::take(&mut self.leave_queued) {
                    self.leave();
                }
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
            Err(oneshot::error::TryRecvError::Closed) => {
                log::error!("Connect task ended without a result");
                self.pending = None;
                self.should_quit = true;
            }
        }
    }

    fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::StateChanged(state) => {
                self.state = state;
                if state == ConnectionState::Disconnected {
                    self.scene.despawn();
                }
            }
            ConnectionEvent::LocalClientConnected { client_id } => {
                self.scene.spawn_local_cube(client_id);
                self.status = Some(format!("Client-{} is connected", client_id));
            }
            ConnectionEvent::LocalOwnerPromoted { client_id } => {
                self.status = Some(format!("Client-{} is the session owner", client_id));
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        if self.state == ConnectionState::Connected {
            self.handle_scene_key(key, now);
            return;
        }

        if key.kind == KeyEventKind::Release {
            return;
        }
        match self.form.handle_key(key.code, self.state) {
            FormAction::None => {}
            FormAction::Submit => self.submit(),
            FormAction::Quit => self.should_quit = true,
        }
    }

    fn handle_scene_key(&mut self, key: KeyEvent, now: Instant) {
        if key.kind == KeyEventKind::Release {
            self.scene.input_mut().key_released(key.code);
            return;
        }

        match key.code {
            KeyCode::Esc => self.leave(),
            KeyCode::Char('q') => self.should_quit = true,
            code => {
                self.scene.input_mut().key_pressed(code, now);
            }
        }
    }

    pub fn leave(&mut self) {
        match self.manager.as_mut() {
            Some(manager) => {
                let _ = manager.leave();
            }
            None if self.pending.is_some() => self.leave_queued = true,
            None => {}
        }
    }

    /// Leaves any held session and returns the leave task so the caller can
    /// give it a moment to reach the backend.
    pub fn shutdown(mut self) -> Option<JoinHandle<()>> {
        self.pending = None;
        self.manager.take().and_then(|mut manager| manager.leave())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use cubesync::{LocalBackend, SessionService};

    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    async fn settle<B: SessionBackend>(
        app: &mut App<B>,
        done: impl Fn(&App<B>) -> bool,
    ) -> bool {
        for _ in 0..200 {
            app.update(0.0, Instant::now());
            if done(app) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    fn config(profile: &str, session: &str) -> ClientConfig {
        ClientConfig {
            profile: profile.into(),
            session: session.into(),
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn submit_connects_and_spawns_owned_cube() {
        let backend = LocalBackend::new(SessionService::shared());
        let mut app = App::new(Handle::current(), backend, &config("alice", "arena"));

        app.handle_key(press(KeyCode::Enter), Instant::now());
        assert_eq!(app.state(), ConnectionState::Connecting);
        assert!(!app.form().submit_enabled(app.state()));

        assert!(settle(&mut app, |app| app.scene().cube().is_some()).await);
        assert_eq!(app.state(), ConnectionState::Connected);
        assert!(!app.form().is_visible(app.state()));

        let cube = app.scene().cube().unwrap();
        assert!(cube.flags.is_spawned() && cube.flags.has_authority());
        assert_eq!(cube.owner, app.session().unwrap().local_client_id());

        app.handle_key(press(KeyCode::Esc), Instant::now());
        assert!(settle(&mut app, |app| app.state() == ConnectionState::Disconnected).await);
        assert!(app.scene().cube().is_none());
        assert!(app.form().submit_enabled(app.state()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn leave_before_manager_returns_is_not_lost() {
        let service = SessionService::shared();
        let backend = LocalBackend::new(Arc::clone(&service));
        let mut app = App::new(Handle::current(), backend, &config("alice", "arena"));

        app.submit();
        app.leave();

        assert!(
            settle(&mut app, |app| {
                app.session().is_none() && app.state() == ConnectionState::Disconnected
            })
            .await
        );
        assert!(app.scene().cube().is_none());

        let mut remaining = 1;
        for _ in 0..100 {
            remaining = service.lock().await.session_count();
            if remaining == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(remaining, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_form_does_not_submit() {
        let backend = LocalBackend::new(SessionService::shared());
        let mut app = App::new(Handle::current(), backend, &config("alice", ""));

        app.handle_key(press(KeyCode::Enter), Instant::now());
        app.update(0.0, Instant::now());

        assert_eq!(app.state(), ConnectionState::Disconnected);
        assert!(app.session().is_none());
    }
}
