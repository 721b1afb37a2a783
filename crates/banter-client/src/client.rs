use std::time::Duration;

use async_trait::async_trait;
use banter_config::Config;
use banter_core::{
    AuthStatus, ChatReply, ChatRequest, Credentials, Message, SessionSummary, Transport,
    TransportError, TransportResult, User,
};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::wire::{
    CreateSessionRequest, CreateSessionResponse, ErrorBody, HistoryResponse, LoginRequest,
    SessionsResponse, StatusResponse, UserResponse,
};

/// [`Transport`] over the backend's JSON API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> TransportResult<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> TransportResult<Self> {
        Self::new(&config.server.base_url, config.client.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request_error(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if error.is_decode() {
            TransportError::Decode(error.to_string())
        } else {
            TransportError::Network(error.to_string())
        }
    }

    /// Maps the status line, then decodes a 2xx body as `T`.
    async fn decode<T: DeserializeOwned>(&self, response: Response) -> TransportResult<T> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(TransportError::AuthExpired);
        }

        let body = response.bytes().await.map_err(|e| self.request_error(e))?;
        if !status.is_success() {
            return Err(rejection(status, &body));
        }

        serde_json::from_slice(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// Like [`decode`](Self::decode) for `{success, error?}` acknowledgements.
    async fn acknowledge(&self, response: Response) -> TransportResult<()> {
        let ack: StatusResponse = self.decode(response).await?;
        if ack.success {
            Ok(())
        } else {
            Err(TransportError::rejected(
                ack.error.unwrap_or_else(|| "Request failed".to_string()),
            ))
        }
    }
}

/// Builds `Rejected` from a non-2xx response, preferring the body's `error`.
fn rejection(status: StatusCode, body: &[u8]) -> TransportError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
    TransportError::rejected_with_status(status.as_u16(), message)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn check_auth(&self) -> TransportResult<AuthStatus> {
        debug!("GET /api/user");
        let response = self
            .client
            .get(self.url("/api/user"))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        // a bare 401 here just means nobody is logged in
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(AuthStatus::Anonymous);
        }

        let reply: UserResponse = self.decode(response).await?;
        Ok(match (reply.authenticated, reply.user) {
            (true, Some(user)) => AuthStatus::Authenticated(user.into()),
            _ => AuthStatus::Anonymous,
        })
    }

    async fn login(&self, credentials: &Credentials) -> TransportResult<User> {
        debug!("POST /api/login as {}", credentials.username);
        let response = self
            .client
            .post(self.url("/api/login"))
            .json(&LoginRequest {
                username: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        // a 401 from login is a wrong password, not an expired session
        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.request_error(e))?;
        let reply = match serde_json::from_slice::<UserResponse>(&body) {
            Ok(reply) => reply,
            Err(_) if !status.is_success() => return Err(rejection(status, &body)),
            Err(e) => return Err(TransportError::Decode(e.to_string())),
        };

        match (reply.authenticated, reply.user) {
            (true, Some(user)) if status.is_success() => Ok(user.into()),
            _ => {
                let message = reply.error.unwrap_or_else(|| "Login failed".to_string());
                Err(TransportError::rejected_with_status(status.as_u16(), message))
            }
        }
    }

    async fn logout(&self) -> TransportResult<()> {
        debug!("POST /api/logout");
        let response = self
            .client
            .post(self.url("/api/logout"))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            warn!("Logout returned {}", status);
            Err(TransportError::rejected_with_status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Logout failed"),
            ))
        }
    }

    async fn list_sessions(&self) -> TransportResult<Vec<SessionSummary>> {
        debug!("GET /api/chat/sessions");
        let response = self
            .client
            .get(self.url("/api/chat/sessions"))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let reply: SessionsResponse = self.decode(response).await?;
        Ok(reply.sessions.into_iter().map(Into::into).collect())
    }

    async fn create_session(&self, title: &str) -> TransportResult<String> {
        debug!("POST /api/chat/sessions title={:?}", title);
        let response = self
            .client
            .post(self.url("/api/chat/sessions"))
            .json(&CreateSessionRequest { title })
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let reply: CreateSessionResponse = self.decode(response).await?;
        match (reply.success, reply.session_id) {
            (true, Some(id)) => Ok(id),
            (true, None) => Err(TransportError::Decode(
                "create session reply has no session_id".to_string(),
            )),
            (false, _) => Err(TransportError::rejected(
                reply
                    .error
                    .unwrap_or_else(|| "Failed to create session".to_string()),
            )),
        }
    }

    async fn session_history(&self, session_id: &str) -> TransportResult<Vec<Message>> {
        debug!("[{}] GET history", session_id);
        let response = self
            .client
            .get(self.url(&format!("/api/chat/sessions/{}/history", session_id)))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let reply: HistoryResponse = self.decode(response).await?;
        Ok(reply.messages.into_iter().map(Into::into).collect())
    }

    async fn delete_session(&self, session_id: &str) -> TransportResult<()> {
        debug!("[{}] DELETE session", session_id);
        let response = self
            .client
            .delete(self.url(&format!("/api/chat/sessions/{}", session_id)))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        self.acknowledge(response).await
    }

    async fn send_chat(&self, request: &ChatRequest) -> TransportResult<ChatReply> {
        debug!(
            "[{}] POST /api/chat ({} chars)",
            request.session_id,
            request.message.len()
        );
        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(request)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        self.decode(response).await
    }
}
