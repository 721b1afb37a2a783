//! # Session Controller
//!
//! 客户端聊天会话状态机。
//!
//! 负责：
//! - 登录状态与欢迎界面、对话界面之间的切换
//! - 乐观插入用户消息，并在服务器确认后修正
//! - 单请求互斥（`is_typing`）以及过期回复的丢弃
//! - 401 之后延迟登出

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::command::{Command, Outcome};
use crate::error::{ControllerError, ControllerResult, TransportError, TransportResult, ValidationError};
use crate::presenter::{ConfirmGate, Presenter};
use crate::state::{ControllerState, Phase};
use crate::transport::Transport;
use crate::types::{
    AuthStatus, ChatReply, ChatRequest, Credentials, DeliveryStatus, Message, NotificationKind, Screen,
    SessionSummary, User,
};

const DELETE_PROMPT: &str = "Are you sure you want to delete this chat?";

/// 控制器配置
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// 单次聊天请求的超时
    pub request_timeout: Duration,
    /// 401 之后切换到登录界面前的延迟
    pub auth_expiry_delay: Duration,
    /// 新会话的默认标题
    pub new_chat_title: String,
    /// 每次成功交换后是否用服务器历史替换本地历史
    pub reconcile_history: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            auth_expiry_delay: Duration::from_millis(2000),
            new_chat_title: "New Chat".to_string(),
            reconcile_history: true,
        }
    }
}

impl ControllerConfig {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_auth_expiry_delay(mut self, delay: Duration) -> Self {
        self.auth_expiry_delay = delay;
        self
    }

    pub fn with_new_chat_title(mut self, title: impl Into<String>) -> Self {
        self.new_chat_title = title.into();
        self
    }

    pub fn with_reconcile_history(mut self, enabled: bool) -> Self {
        self.reconcile_history = enabled;
        self
    }
}

/// An accepted send, tagged with the request token and the session it was
/// issued against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTicket {
    token: u64,
    session_id: String,
    message: String,
    message_id: String,
}

impl SendTicket {
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn request(&self) -> ChatRequest {
        ChatRequest {
            message: self.message.clone(),
            session_id: self.session_id.clone(),
        }
    }
}

/// Result of a send that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Assistant reply appended.
    Replied,
    /// Another send was in flight; nothing happened.
    Ignored,
    /// The reply arrived for a session or request that is no longer current.
    Discarded,
}

/// Runs the network half of a send, bounded by `timeout`.
///
/// Kept free of the controller so a UI can run it on a spawned task and feed
/// the result back through [`SessionController::complete_send`].
pub async fn dispatch_send(
    transport: &dyn Transport,
    ticket: &SendTicket,
    timeout: Duration,
) -> TransportResult<ChatReply> {
    let request = ticket.request();
    match tokio::time::timeout(timeout, transport.send_chat(&request)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(timeout)),
    }
}

/// 会话控制器
pub struct SessionController<P: Presenter> {
    transport: Arc<dyn Transport>,
    presenter: P,
    config: ControllerConfig,
    state: ControllerState,
    next_token: u64,
}

impl<P: Presenter> SessionController<P> {
    pub fn new(transport: Arc<dyn Transport>, presenter: P, config: ControllerConfig) -> Self {
        Self {
            transport,
            presenter,
            config,
            state: ControllerState::new(),
            next_token: 1,
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn history(&self) -> &[Message] {
        &self.state.history
    }

    pub fn sessions(&self) -> &[SessionSummary] {
        &self.state.sessions
    }

    pub fn current_session_id(&self) -> Option<&str> {
        self.state.current_session_id.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.state.user.as_ref()
    }

    pub fn is_typing(&self) -> bool {
        self.state.is_typing
    }

    pub fn is_auth_expiring(&self) -> bool {
        self.state.auth_expires_at.is_some()
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// Runs one command through its named operation.
    pub async fn dispatch(
        &mut self,
        command: Command,
        gate: &mut dyn ConfirmGate,
    ) -> ControllerResult<Outcome> {
        debug!("dispatch {}", command.name());
        match command {
            Command::CheckAuth => self.check_auth().await.map(Outcome::Authenticated),
            Command::Login(credentials) => self.login(credentials).await.map(|_| Outcome::Done),
            Command::Logout => {
                self.logout().await;
                Ok(Outcome::Done)
            }
            Command::NewChat => self.start_new_chat().await.map(Outcome::SessionCreated),
            Command::Send(text) => self.send_message(&text).await.map(Outcome::Send),
            Command::Switch(id) => self.switch_session(&id).await.map(|_| Outcome::Done),
            Command::Delete(id) => self.delete_session(&id, gate).await.map(|_| Outcome::Done),
            Command::RefreshSessions => self.refresh_sessions().await.map(|_| Outcome::Done),
            Command::CancelSend => Ok(Outcome::Cancelled(self.cancel_send())),
        }
    }

    /// 启动时检查登录状态
    pub async fn check_auth(&mut self) -> ControllerResult<bool> {
        match self.transport.check_auth().await {
            Ok(AuthStatus::Authenticated(user)) => {
                self.enter_authenticated(user).await;
                Ok(true)
            }
            Ok(AuthStatus::Anonymous) => {
                self.presenter.show_screen(Screen::Login);
                Ok(false)
            }
            Err(e) => {
                warn!("Authentication check failed: {}", e);
                self.presenter.show_screen(Screen::Login);
                Err(e.into())
            }
        }
    }

    pub async fn login(&mut self, credentials: Credentials) -> ControllerResult<()> {
        if credentials.username.trim().is_empty() || credentials.password.is_empty() {
            return Err(ValidationError::MissingCredentials.into());
        }

        match self.transport.login(&credentials).await {
            Ok(user) => {
                info!("Logged in as {}", user.username);
                self.state.reset();
                self.enter_authenticated(user).await;
                self.notify("Login successful!", NotificationKind::Success);
                Ok(())
            }
            Err(e) => {
                let text = match &e {
                    TransportError::Rejected { message, .. } if !message.is_empty() => {
                        message.clone()
                    }
                    TransportError::Network(_) | TransportError::Timeout(_) => {
                        "Network error. Please try again.".to_string()
                    }
                    _ => "Login failed".to_string(),
                };
                warn!("Login failed: {}", e);
                self.notify(&text, NotificationKind::Error);
                Err(e.into())
            }
        }
    }

    /// 登出，无论服务器是否成功都清空本地状态
    pub async fn logout(&mut self) {
        if let Err(e) = self.transport.logout().await {
            debug!("Logout request failed, continuing locally: {}", e);
        }
        self.teardown();
        self.notify("Logged out successfully", NotificationKind::Success);
    }

    pub async fn refresh_sessions(&mut self) -> ControllerResult<()> {
        self.ensure_ready()?;
        match self.transport.list_sessions().await {
            Ok(sessions) => {
                self.state.sessions = sessions;
                self.render_sessions();
                Ok(())
            }
            Err(e) => {
                warn!("Failed to load chat sessions: {}", e);
                self.handle_transport_error(&e, "Failed to load chat history");
                Err(e.into())
            }
        }
    }

    /// 开始新对话，返回新会话 id
    pub async fn start_new_chat(&mut self) -> ControllerResult<String> {
        self.ensure_ready()?;

        if self.state.current_session_id.is_some() {
            self.leave_session();
        }
        self.presenter.show_screen(Screen::Welcome);

        match self.transport.create_session(&self.config.new_chat_title).await {
            Ok(session_id) => {
                info!("[{}] Created session", session_id);
                self.state.activate(session_id.clone(), Vec::new());
                self.state.is_first_message = true;
                self.sync_sessions().await;
                self.notify("New chat created", NotificationKind::Success);
                Ok(session_id)
            }
            Err(e) => {
                warn!("Failed to create new chat: {}", e);
                self.handle_transport_error(&e, "Failed to create new chat");
                Err(e.into())
            }
        }
    }

    /// 切换到已有会话，完整替换本地历史
    pub async fn switch_session(&mut self, session_id: &str) -> ControllerResult<()> {
        self.ensure_ready()?;

        match self.transport.session_history(session_id).await {
            Ok(messages) => {
                debug!("[{}] Loaded {} messages", session_id, messages.len());
                self.release_in_flight();
                self.state.activate(session_id, messages);
                self.state.is_first_message = false;
                self.presenter.render_history(&self.state.history);
                self.presenter.show_suggestions(&[]);
                self.render_sessions();
                self.presenter.show_screen(Screen::Chat);
                Ok(())
            }
            Err(e) => {
                warn!("[{}] Failed to load chat session: {}", session_id, e);
                self.handle_transport_error(&e, "Failed to load chat session");
                Err(e.into())
            }
        }
    }

    pub async fn delete_session(
        &mut self,
        session_id: &str,
        gate: &mut dyn ConfirmGate,
    ) -> ControllerResult<()> {
        self.ensure_ready()?;

        if !gate.confirm(DELETE_PROMPT) {
            debug!("[{}] Delete declined", session_id);
            return Err(ValidationError::NotConfirmed.into());
        }

        match self.transport.delete_session(session_id).await {
            Ok(()) => {
                info!("[{}] Deleted session", session_id);
                self.state.remove_session(session_id);
                if self.state.is_current(session_id) {
                    self.leave_session();
                    self.presenter.show_screen(Screen::Welcome);
                }
                self.render_sessions();
                self.sync_sessions().await;
                self.notify("Chat deleted", NotificationKind::Success);
                Ok(())
            }
            Err(e) => {
                warn!("[{}] Failed to delete session: {}", session_id, e);
                self.handle_transport_error(&e, "Failed to delete chat");
                Err(e.into())
            }
        }
    }

    /// Sends `text` and waits for the reply.
    pub async fn send_message(&mut self, text: &str) -> ControllerResult<SendOutcome> {
        let Some(ticket) = self.begin_send(text).await? else {
            return Ok(SendOutcome::Ignored);
        };
        let result = dispatch_send(self.transport.as_ref(), &ticket, self.config.request_timeout).await;
        self.complete_send(ticket, result).await
    }

    /// Local half of a send: validation, session creation if needed and the
    /// optimistic user message. `Ok(None)` means another send is in flight.
    pub async fn begin_send(&mut self, text: &str) -> ControllerResult<Option<SendTicket>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        self.ensure_ready()?;

        if self.state.is_typing {
            debug!("Send ignored, a request is already in flight");
            return Ok(None);
        }

        let session_id = match self.state.current_session_id.clone() {
            Some(id) => id,
            None => self.start_new_chat().await?,
        };

        let message = Message::pending_user(text);
        let message_id = message.id.clone();

        if self.state.is_first_message {
            self.state.is_first_message = false;
            self.presenter.show_screen(Screen::Chat);
        }
        self.presenter.render_message(&message);
        self.state.history.push(message);

        let token = self.next_token;
        self.next_token += 1;
        self.state.is_typing = true;
        self.state.in_flight = Some(token);
        self.presenter.show_typing_indicator();

        debug!("[{}] Sending request #{}", session_id, token);
        Ok(Some(SendTicket {
            token,
            session_id,
            message: text.to_string(),
            message_id,
        }))
    }

    /// Applies the result of a send started with [`begin_send`](Self::begin_send).
    pub async fn complete_send(
        &mut self,
        ticket: SendTicket,
        result: TransportResult<ChatReply>,
    ) -> ControllerResult<SendOutcome> {
        if self.state.in_flight != Some(ticket.token) {
            debug!("Discarding reply for stale request #{}", ticket.token);
            return Ok(SendOutcome::Discarded);
        }

        self.state.in_flight = None;
        self.state.is_typing = false;
        self.presenter.hide_typing_indicator();

        if !self.state.is_current(&ticket.session_id) {
            debug!(
                "[{}] Discarding reply #{}, session is no longer active",
                ticket.session_id, ticket.token
            );
            return Ok(SendOutcome::Discarded);
        }

        match result {
            Ok(reply) => {
                self.state.set_status(&ticket.message_id, DeliveryStatus::Delivered);
                let suggestions: Vec<String> = reply.follow_up.iter().cloned().collect();
                let message = Message::assistant(reply.response).with_follow_up(reply.follow_up);
                self.state.history.push(message);
                self.presenter.render_history(&self.state.history);
                self.presenter.show_suggestions(&suggestions);

                self.reconcile(&ticket.session_id).await;
                Ok(SendOutcome::Replied)
            }
            Err(e) => {
                warn!("[{}] Send #{} failed: {}", ticket.session_id, ticket.token, e);
                self.state.set_status(&ticket.message_id, DeliveryStatus::Failed);
                self.state.history.push(Message::assistant_error(e.chat_reply_text()));
                self.presenter.render_history(&self.state.history);

                let notice = match e {
                    TransportError::Network(_) => "Network error occurred",
                    TransportError::Timeout(_) => "Request timed out",
                    _ => "Failed to send message",
                };
                self.handle_transport_error(&e, notice);
                Err(e.into())
            }
        }
    }

    /// Abandons the in-flight send. Returns `false` if nothing was in flight.
    pub fn cancel_send(&mut self) -> bool {
        let Some(token) = self.state.in_flight.take() else {
            return false;
        };
        debug!("Cancelled request #{}", token);

        self.state.is_typing = false;
        self.presenter.hide_typing_indicator();
        for message in self.state.history.iter_mut().filter(|m| m.is_pending()) {
            message.status = DeliveryStatus::Failed;
        }
        self.presenter.render_history(&self.state.history);
        self.notify("Request cancelled", NotificationKind::Info);
        true
    }

    /// Applies time-based transitions. Returns `true` if the controller just
    /// logged out because of an expired login.
    pub fn tick(&mut self) -> bool {
        match self.state.auth_expires_at {
            Some(deadline) if Instant::now() >= deadline => {
                info!("Login expired, returning to login screen");
                self.teardown();
                true
            }
            _ => false,
        }
    }

    /// Waits for a pending auth expiry to take effect.
    pub async fn settle(&mut self) {
        if let Some(deadline) = self.state.auth_expires_at {
            tokio::time::sleep_until(deadline).await;
            self.tick();
        }
    }

    async fn enter_authenticated(&mut self, user: User) {
        self.presenter.set_user(Some(&user));
        self.state.user = Some(user);
        self.state.deactivate();
        self.presenter.clear_messages();
        self.presenter.show_screen(Screen::Welcome);
        // failures are already surfaced as a notification
        let _ = self.refresh_sessions().await;
    }

    /// Server is the source of truth after a confirmed exchange.
    async fn reconcile(&mut self, session_id: &str) {
        self.sync_sessions().await;

        if !self.config.reconcile_history {
            return;
        }
        match self.transport.session_history(session_id).await {
            Ok(messages) => {
                if !self.state.is_current(session_id) || self.state.is_typing {
                    return;
                }
                let confirmed = self
                    .state
                    .history
                    .iter()
                    .filter(|m| m.status == DeliveryStatus::Delivered && !m.is_error)
                    .count();
                if messages.len() < confirmed {
                    warn!(
                        "[{}] Server history has {} messages, {} confirmed locally; keeping local copy",
                        session_id,
                        messages.len(),
                        confirmed
                    );
                    return;
                }
                let follow_up = self.state.history.last().and_then(|m| m.follow_up.clone());
                self.state.history = keep_local_failures(&self.state.history, messages);
                if let Some(last) = self.state.history.last_mut() {
                    if last.follow_up.is_none() {
                        last.follow_up = follow_up;
                    }
                }
                self.presenter.render_history(&self.state.history);
            }
            Err(e) => warn!("[{}] History reconciliation failed: {}", session_id, e),
        }
    }

    /// Refreshes the session list without surfacing failures.
    async fn sync_sessions(&mut self) {
        match self.transport.list_sessions().await {
            Ok(sessions) => {
                self.state.sessions = sessions;
                self.render_sessions();
            }
            Err(e) => warn!("Session list refresh failed: {}", e),
        }
    }

    fn render_sessions(&mut self) {
        self.presenter
            .render_session_list(&self.state.sessions, self.state.current_session_id.as_deref());
    }

    /// Frees the send mutex when leaving the session a request was issued
    /// against. The late reply no longer matches the token and is discarded.
    fn release_in_flight(&mut self) {
        if let Some(token) = self.state.in_flight.take() {
            debug!("Abandoned request #{} on session change", token);
            self.state.is_typing = false;
            self.presenter.hide_typing_indicator();
        }
    }

    fn leave_session(&mut self) {
        self.release_in_flight();
        self.state.deactivate();
        self.presenter.clear_messages();
        self.presenter.show_suggestions(&[]);
    }

    fn teardown(&mut self) {
        self.state.reset();
        self.presenter.hide_typing_indicator();
        self.presenter.clear_messages();
        self.presenter.show_suggestions(&[]);
        self.presenter.render_session_list(&[], None);
        self.presenter.set_user(None);
        self.presenter.show_screen(Screen::Login);
    }

    fn ensure_ready(&self) -> ControllerResult<()> {
        if self.state.auth_expires_at.is_some() {
            return Err(ControllerError::AuthExpiring);
        }
        if !self.state.is_authenticated() {
            return Err(ControllerError::NotAuthenticated);
        }
        Ok(())
    }

    fn handle_transport_error(&mut self, error: &TransportError, notice: &str) {
        if error.is_auth_expired() {
            self.schedule_auth_expiry();
        } else {
            self.notify(notice, NotificationKind::Error);
        }
    }

    fn schedule_auth_expiry(&mut self) {
        if self.state.auth_expires_at.is_some() || !self.state.is_authenticated() {
            return;
        }
        warn!(
            "Authentication expired, logging out in {:?}",
            self.config.auth_expiry_delay
        );
        self.state.auth_expires_at = Some(Instant::now() + self.config.auth_expiry_delay);
        self.notify("Please login again", NotificationKind::Error);
    }

    fn notify(&mut self, text: &str, kind: NotificationKind) {
        self.presenter.show_notification(text, kind);
    }
}

/// Merges server history with the failed user messages and local error replies
/// the server never saw. Each local entry goes back after the same number of
/// confirmed messages it followed locally.
fn keep_local_failures(local: &[Message], server: Vec<Message>) -> Vec<Message> {
    let mut confirmed = 0;
    let mut kept = Vec::new();
    for message in local {
        if message.is_failed() || message.is_error {
            kept.push((confirmed, message.clone()));
        } else if message.status == DeliveryStatus::Delivered {
            confirmed += 1;
        }
    }
    if kept.is_empty() {
        return server;
    }

    let mut kept = kept.into_iter().peekable();
    let mut merged = Vec::with_capacity(server.len() + kept.len());
    for (index, message) in server.into_iter().enumerate() {
        while let Some((_, local)) = kept.next_if(|(anchor, _)| *anchor <= index) {
            merged.push(local);
        }
        merged.push(message);
    }
    merged.extend(kept.map(|(_, local)| local));
    merged
}
