//! Line input for `banter chat`.

use banter_core::Command;

pub const HELP: &str = "\
/new            start a new chat
/sessions       list chats
/switch <id>    open a chat
/delete <id>    delete a chat
/logout         log out and leave
/quit           leave
anything else is sent as a message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    Empty,
    Message(String),
    New,
    Sessions,
    Switch(String),
    Delete(String),
    Logout,
    Quit,
    Help,
    /// Slash command that is unknown or missing its argument.
    Invalid(String),
}

impl ReplInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Message(line.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match (name, arg) {
            ("new", _) => Self::New,
            ("sessions", _) => Self::Sessions,
            ("switch", id) if !id.is_empty() => Self::Switch(id.to_string()),
            ("delete", id) if !id.is_empty() => Self::Delete(id.to_string()),
            ("logout", _) => Self::Logout,
            ("quit" | "exit", _) => Self::Quit,
            ("help", _) => Self::Help,
            _ => Self::Invalid(line.to_string()),
        }
    }

    /// The controller command this input runs, if any.
    pub fn command(&self) -> Option<Command> {
        match self {
            Self::Message(text) => Some(Command::Send(text.clone())),
            Self::New => Some(Command::NewChat),
            Self::Sessions => Some(Command::RefreshSessions),
            Self::Switch(id) => Some(Command::Switch(id.clone())),
            Self::Delete(id) => Some(Command::Delete(id.clone())),
            Self::Logout => Some(Command::Logout),
            Self::Empty | Self::Quit | Self::Help | Self::Invalid(_) => None,
        }
    }
}
