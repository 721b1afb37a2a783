//! JSON bodies exchanged with the chat backend.

use banter_core::{Message, Role, SessionSummary, User};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

/// Reply to `GET /api/user` and `POST /api/login`.
#[derive(Debug, Deserialize)]
pub(crate) struct UserResponse {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub user: Option<WireUser>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireUser {
    pub username: String,
}

impl From<WireUser> for User {
    fn from(user: WireUser) -> Self {
        User::new(user.username)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionsResponse {
    pub sessions: Vec<WireSession>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireSession {
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<WireSession> for SessionSummary {
    fn from(session: WireSession) -> Self {
        SessionSummary {
            id: session.id,
            title: session.title,
            created_at: session
                .created_at
                .or(session.updated_at)
                .unwrap_or_else(Utc::now),
            updated_at: session.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateSessionRequest<'a> {
    pub title: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateSessionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryResponse {
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<WireMessage> for Message {
    fn from(message: WireMessage) -> Self {
        let converted = match message.role {
            Role::User => Message::user(message.content),
            Role::Assistant => Message::assistant(message.content),
        };
        match message.timestamp {
            Some(timestamp) => converted.with_timestamp(timestamp),
            None => converted,
        }
    }
}

/// `{success, error?}` acknowledgement.
#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of a failed request.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// RFC 3339, or a naive ISO 8601 value (`datetime.isoformat()` without an
/// offset) read as UTC. `null` is `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    parse_timestamp(&raw)
        .map(Some)
        .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw)))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}
