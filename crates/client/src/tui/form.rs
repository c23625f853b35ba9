use crossterm::event::KeyCode;

use cubesync::ConnectionState;

const MAX_FIELD_LEN: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Profile,
    Session,
    Submit,
}

impl Field {
    fn next(self) -> Self {
        match self {
            Field::Profile => Field::Session,
            Field::Session => Field::Submit,
            Field::Submit => Field::Profile,
        }
    }

    fn prev(self) -> Self {
        match self {
            Field::Profile => Field::Submit,
            Field::Session => Field::Profile,
            Field::Submit => Field::Session,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    None,
    Submit,
    Quit,
}

/// Profile / session form shown until the session is joined.
#[derive(Debug, Clone)]
pub struct ConnectForm {
    profile: String,
    session: String,
    focus: Field,
}

impl ConnectForm {
    pub fn new(profile: impl Into<String>, session: impl Into<String>) -> Self {
        let mut profile: String = profile.into();
        let mut session: String = session.into();
        truncate_chars(&mut profile);
        truncate_chars(&mut session);

        let focus = if profile.is_empty() {
            Field::Profile
        } else if session.is_empty() {
            Field::Session
        } else {
            Field::Submit
        };

        Self {
            profile,
            session,
            focus,
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn focus(&self) -> Field {
        self.focus
    }

    pub fn submit_enabled(&self, state: ConnectionState) -> bool {
        !self.profile.is_empty() && !self.session.is_empty() && state != ConnectionState::Connecting
    }

    pub fn is_editable(&self, state: ConnectionState) -> bool {
        state != ConnectionState::Connecting
    }

    pub fn is_visible(&self, state: ConnectionState) -> bool {
        state != ConnectionState::Connected
    }

    pub fn handle_key(&mut self, code: KeyCode, state: ConnectionState) -> FormAction {
        match code {
            KeyCode::Esc => FormAction::Quit,
            KeyCode::Tab | KeyCode::Down => {
                self.focus = self.focus.next();
                FormAction::None
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.focus = self.focus.prev();
                FormAction::None
            }
            KeyCode::Enter => {
                if self.submit_enabled(state) {
                    FormAction::Submit
                } else {
                    if self.focus != Field::Submit {
                        self.focus = self.focus.next();
                    }
                    FormAction::None
                }
            }
            KeyCode::Backspace if self.is_editable(state) => {
                if let Some(field) = self.focused_text() {
                    field.pop();
                }
                FormAction::None
            }
            KeyCode::Char(c) if self.is_editable(state) && !c.is_control() => {
                if let Some(field) = self.focused_text() {
                    if field.chars().count() < MAX_FIELD_LEN {
                        field.push(c);
                    }
                }
                FormAction::None
            }
            _ => FormAction::None,
        }
    }

    fn focused_text(&mut self) -> Option<&mut String> {
        match self.focus {
            Field::Profile => Some(&mut self.profile),
            Field::Session => Some(&mut self.session),
            Field::Submit => None,
        }
    }
}

fn truncate_chars(text: &mut String) {
    if let Some((index, _)) = text.char_indices().nth(MAX_FIELD_LEN) {
        text.truncate(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_text(form: &mut ConnectForm, text: &str) {
        for c in text.chars() {
            form.handle_key(KeyCode::Char(c), ConnectionState::Disconnected);
        }
    }

    #[test]
    fn submit_disabled_until_both_fields_filled() {
        let mut form = ConnectForm::new("", "");
        assert!(!form.submit_enabled(ConnectionState::Disconnected));

        type_text(&mut form, "alice");
        assert!(!form.submit_enabled(ConnectionState::Disconnected));

        form.handle_key(KeyCode::Tab, ConnectionState::Disconnected);
        type_text(&mut form, "arena");
        assert!(form.submit_enabled(ConnectionState::Disconnected));

        assert_eq!(form.profile(), "alice");
        assert_eq!(form.session(), "arena");
    }

    #[test]
    fn submit_disabled_while_connecting() {
        let mut form = ConnectForm::new("alice", "arena");
        assert!(form.submit_enabled(ConnectionState::Disconnected));
        assert!(!form.submit_enabled(ConnectionState::Connecting));
        assert_eq!(
            form.handle_key(KeyCode::Enter, ConnectionState::Connecting),
            FormAction::None
        );
        assert_eq!(
            form.handle_key(KeyCode::Enter, ConnectionState::Disconnected),
            FormAction::Submit
        );
    }

    #[test]
    fn fields_read_only_while_connecting() {
        let mut form = ConnectForm::new("alice", "");
        assert_eq!(form.focus(), Field::Session);

        form.handle_key(KeyCode::Char('x'), ConnectionState::Connecting);
        form.handle_key(KeyCode::BackTab, ConnectionState::Connecting);
        form.handle_key(KeyCode::Backspace, ConnectionState::Connecting);

        assert_eq!(form.profile(), "alice");
        assert_eq!(form.session(), "");
    }

    #[test]
    fn enter_on_incomplete_form_advances_focus() {
        let mut form = ConnectForm::new("", "");
        type_text(&mut form, "bob");
        assert_eq!(
            form.handle_key(KeyCode::Enter, ConnectionState::Disconnected),
            FormAction::None
        );
        assert_eq!(form.focus(), Field::Session);
    }

    #[test]
    fn hidden_once_connected() {
        let form = ConnectForm::new("alice", "arena");
        assert!(form.is_visible(ConnectionState::Disconnected));
        assert!(form.is_visible(ConnectionState::Connecting));
        assert!(!form.is_visible(ConnectionState::Connected));
    }

    #[test]
    fn input_capped_at_thirty_chars() {
        let mut form = ConnectForm::new("", "");
        type_text(&mut form, &"x".repeat(40));
        assert_eq!(form.profile().len(), MAX_FIELD_LEN);
    }
}
