use std::collections::HashMap;

use super::{PlayerId, SessionError};

pub const DEFAULT_PROFILE: &str = "default";
pub const MAX_PROFILE_LEN: usize = 30;

/// Profile names are limited to ASCII letters, digits, `-` and `_`.
pub fn validate_profile(name: &str) -> Result<(), SessionError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_PROFILE_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(SessionError::InvalidProfile(name.to_string()))
    }
}

/// Client-side credential state: the active profile and, once signed in, the
/// player id the backend issued for it.
#[derive(Debug, Clone)]
pub struct AuthState {
    profile: String,
    player_id: Option<PlayerId>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            profile: String::from(DEFAULT_PROFILE),
            player_id: None,
        }
    }
}

impl AuthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    pub fn is_signed_in(&self) -> bool {
        self.player_id.is_some()
    }

    pub fn switch_profile(&mut self, name: &str) -> Result<(), SessionError> {
        validate_profile(name)?;

        if self.profile == name {
            return Ok(());
        }
        if self.is_signed_in() {
            return Err(SessionError::AlreadySignedIn(self.profile.clone()));
        }

        log::debug!("Switched profile to '{}'", name);
        self.profile = name.to_string();
        Ok(())
    }

    pub fn complete_sign_in(&mut self, player_id: PlayerId) {
        self.player_id = Some(player_id);
    }

    pub fn sign_out(&mut self) {
        self.player_id = None;
    }
}

/// Backend-side directory handing out anonymous player ids. An installation
/// signing in with the same profile always gets the same id back.
#[derive(Debug)]
pub struct PlayerDirectory {
    players: HashMap<(u64, String), PlayerId>,
    next_player_id: PlayerId,
}

impl Default for PlayerDirectory {
    fn default() -> Self {
        Self {
            players: HashMap::new(),
            next_player_id: 1,
        }
    }
}

impl PlayerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in_anonymously(
        &mut self,
        installation_id: u64,
        profile: &str,
    ) -> Result<PlayerId, SessionError> {
        validate_profile(profile)?;

        let key = (installation_id, profile.to_string());
        if let Some(&player_id) = self.players.get(&key) {
            return Ok(player_id);
        }

        let player_id = self.next_player_id;
        self.next_player_id += 1;
        self.players.insert(key, player_id);

        log::info!(
            "Signed in new anonymous player {} (profile '{}')",
            player_id,
            profile
        );
        Ok(player_id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_validation() {
        assert!(validate_profile("player_1").is_ok());
        assert!(validate_profile("a-b").is_ok());
        assert!(validate_profile("").is_err());
        assert!(validate_profile("has space").is_err());
        assert!(validate_profile(&"x".repeat(MAX_PROFILE_LEN + 1)).is_err());
    }

    #[test]
    fn test_switch_profile_while_signed_in() {
        let mut auth = AuthState::new();
        assert_eq!(auth.profile(), DEFAULT_PROFILE);

        auth.switch_profile("alice").unwrap();
        auth.complete_sign_in(7);

        assert!(auth.switch_profile("alice").is_ok());
        assert!(matches!(
            auth.switch_profile("bob"),
            Err(SessionError::AlreadySignedIn(_))
        ));

        auth.sign_out();
        assert!(auth.switch_profile("bob").is_ok());
        assert_eq!(auth.profile(), "bob");
    }

    #[test]
    fn test_player_ids_stable_per_installation_and_profile() {
        let mut directory = PlayerDirectory::new();

        let a = directory.sign_in_anonymously(1, "alice").unwrap();
        let again = directory.sign_in_anonymously(1, "alice").unwrap();
        let other_profile = directory.sign_in_anonymously(1, "bob").unwrap();
        let other_install = directory.sign_in_anonymously(2, "alice").unwrap();

        assert_eq!(a, again);
        assert_ne!(a, other_profile);
        assert_ne!(a, other_install);
        assert_eq!(directory.len(), 3);
    }
}
