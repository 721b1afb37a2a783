//! User actions, one variant per controller operation.

use crate::controller::SendOutcome;
use crate::types::Credentials;

#[derive(Debug, Clone)]
pub enum Command {
    CheckAuth,
    Login(Credentials),
    Logout,
    NewChat,
    Send(String),
    Switch(String),
    Delete(String),
    RefreshSessions,
    CancelSend,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::CheckAuth => "check_auth",
            Command::Login(_) => "login",
            Command::Logout => "logout",
            Command::NewChat => "new_chat",
            Command::Send(_) => "send",
            Command::Switch(_) => "switch",
            Command::Delete(_) => "delete",
            Command::RefreshSessions => "refresh_sessions",
            Command::CancelSend => "cancel_send",
        }
    }
}

/// What a dispatched command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Authenticated(bool),
    SessionCreated(String),
    Send(SendOutcome),
    Cancelled(bool),
}
