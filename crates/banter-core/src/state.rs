//! Controller state.

use tokio::time::Instant;

use crate::types::{DeliveryStatus, Message, SessionSummary, User};

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unauthenticated,
    /// Logged in, welcome screen, no conversation selected.
    NoSession,
    ActiveSession,
    /// A chat request is in flight. Nested under `ActiveSession`.
    Sending,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Unauthenticated => write!(f, "unauthenticated"),
            Phase::NoSession => write!(f, "no_session"),
            Phase::ActiveSession => write!(f, "active_session"),
            Phase::Sending => write!(f, "sending"),
        }
    }
}

/// Everything the controller owns for the lifetime of a login.
#[derive(Debug)]
pub struct ControllerState {
    pub user: Option<User>,
    /// Weak reference to a server session; the server may have deleted it.
    pub current_session_id: Option<String>,
    pub history: Vec<Message>,
    pub sessions: Vec<SessionSummary>,
    pub is_typing: bool,
    pub is_first_message: bool,
    /// Token of the chat request currently in flight.
    pub in_flight: Option<u64>,
    /// When a pending auth expiry turns into a logout.
    pub auth_expires_at: Option<Instant>,
    active: bool,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerState {
    pub fn new() -> Self {
        Self {
            user: None,
            current_session_id: None,
            history: Vec::new(),
            sessions: Vec::new(),
            is_typing: false,
            is_first_message: true,
            in_flight: None,
            auth_expires_at: None,
            active: false,
        }
    }

    /// Drops everything, back to a logged-out state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn phase(&self) -> Phase {
        if self.user.is_none() {
            Phase::Unauthenticated
        } else if !self.active {
            Phase::NoSession
        } else if self.is_typing {
            Phase::Sending
        } else {
            Phase::ActiveSession
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Enters `ActiveSession` on `session_id` with the given history.
    pub fn activate(&mut self, session_id: impl Into<String>, history: Vec<Message>) {
        self.current_session_id = Some(session_id.into());
        self.history = history;
        self.active = true;
    }

    /// Leaves the current conversation for the welcome screen.
    pub fn deactivate(&mut self) {
        self.current_session_id = None;
        self.history.clear();
        self.active = false;
        self.is_first_message = true;
    }

    pub fn is_current(&self, session_id: &str) -> bool {
        self.current_session_id.as_deref() == Some(session_id)
    }

    pub fn set_status(&mut self, message_id: &str, status: DeliveryStatus) {
        if let Some(msg) = self.history.iter_mut().find(|m| m.id == message_id) {
            msg.status = status;
        }
    }

    pub fn remove_session(&mut self, session_id: &str) {
        self.sessions.retain(|s| s.id != session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_follows_state() {
        let mut state = ControllerState::new();
        assert_eq!(state.phase(), Phase::Unauthenticated);

        state.user = Some(User::new("admin01"));
        assert_eq!(state.phase(), Phase::NoSession);

        state.activate("s1", Vec::new());
        assert_eq!(state.phase(), Phase::ActiveSession);

        state.is_typing = true;
        assert_eq!(state.phase(), Phase::Sending);

        state.is_typing = false;
        state.deactivate();
        assert_eq!(state.phase(), Phase::NoSession);
        assert!(state.current_session_id.is_none());
    }

    #[test]
    fn test_reset_discards_everything() {
        let mut state = ControllerState::new();
        state.user = Some(User::new("admin01"));
        state.activate("s1", vec![Message::user("hi")]);
        state.sessions.push(SessionSummary::new("s1", "hi"));
        state.in_flight = Some(3);

        state.reset();
        assert_eq!(state.phase(), Phase::Unauthenticated);
        assert!(state.history.is_empty());
        assert!(state.sessions.is_empty());
        assert!(state.in_flight.is_none());
    }

    #[test]
    fn test_set_status_targets_one_message() {
        let mut state = ControllerState::new();
        let first = Message::pending_user("a");
        let second = Message::pending_user("b");
        let second_id = second.id.clone();
        state.activate("s1", vec![first, second]);

        state.set_status(&second_id, DeliveryStatus::Failed);
        assert!(state.history[0].is_pending());
        assert!(state.history[1].is_failed());
    }
}
