use uuid::Uuid;
use vaxbook_core::Role;

use crate::error::{BookingError, BookingResult};

/// Who, if anyone, a session is acting as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggedInPatient(String),
    LoggedInCaregiver(String),
}

/// One interactive session. Owned by the front end and passed by reference
/// into every engine operation; never shared between sessions.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::LoggedOut,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The current username and role, if logged in.
    pub fn current(&self) -> Option<(&str, Role)> {
        match &self.state {
            SessionState::LoggedOut => None,
            SessionState::LoggedInPatient(name) => Some((name.as_str(), Role::Patient)),
            SessionState::LoggedInCaregiver(name) => Some((name.as_str(), Role::Caregiver)),
        }
    }

    pub fn ensure_logged_out(&self) -> BookingResult<()> {
        match self.current() {
            None => Ok(()),
            Some((name, _)) => Err(BookingError::AlreadyLoggedIn(name.to_string())),
        }
    }

    /// Transition: LoggedOut → LoggedIn{role}
    pub fn login(&mut self, role: Role, username: &str) -> BookingResult<()> {
        self.ensure_logged_out()?;

        self.state = match role {
            Role::Patient => SessionState::LoggedInPatient(username.to_string()),
            Role::Caregiver => SessionState::LoggedInCaregiver(username.to_string()),
        };
        Ok(())
    }

    /// Transition: LoggedIn{role} → LoggedOut. Returns who was logged out.
    pub fn logout(&mut self) -> BookingResult<String> {
        match std::mem::replace(&mut self.state, SessionState::LoggedOut) {
            SessionState::LoggedOut => Err(BookingError::NotLoggedIn),
            SessionState::LoggedInPatient(name) | SessionState::LoggedInCaregiver(name) => Ok(name),
        }
    }

    pub fn require_logged_in(&self) -> BookingResult<(&str, Role)> {
        self.current().ok_or(BookingError::Unauthorized)
    }

    /// The current username, provided the session holds `required`.
    pub fn require_role(&self, required: Role) -> BookingResult<&str> {
        let (name, actual) = self.require_logged_in()?;
        if actual != required {
            return Err(BookingError::WrongRole { required, actual });
        }
        Ok(name)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
