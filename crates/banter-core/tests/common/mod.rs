#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use banter_core::{
    AuthStatus, ChatReply, ChatRequest, ControllerConfig, Credentials, Message, NotificationKind,
    Presenter, Screen, SessionController, SessionSummary, Transport, TransportError,
    TransportResult, User,
};

pub const PASSWORD: &str = "secret";

#[derive(Default)]
struct ServerState {
    user: Option<User>,
    sessions: Vec<SessionSummary>,
    histories: HashMap<String, Vec<Message>>,
    next_id: u32,
    replies: VecDeque<TransportResult<ChatReply>>,
    failures: HashMap<&'static str, TransportError>,
    chat_delay: Option<Duration>,
}

/// In-memory backend that behaves like the real chat server.
#[derive(Default)]
pub struct MockTransport {
    server: Mutex<ServerState>,
    calls: Mutex<Vec<&'static str>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Starts with `username` already logged in.
    pub fn authenticated(username: &str) -> Arc<Self> {
        let transport = Self::default();
        transport.server.lock().user = Some(User::new(username));
        Arc::new(transport)
    }

    pub fn seed_session(&self, title: &str, messages: Vec<Message>) -> String {
        let mut server = self.server.lock();
        server.next_id += 1;
        let id = format!("seed-{}", server.next_id);
        server.sessions.push(SessionSummary::new(&id, title));
        server.histories.insert(id.clone(), messages);
        id
    }

    pub fn queue_reply(&self, reply: TransportResult<ChatReply>) {
        self.server.lock().replies.push_back(reply);
    }

    /// The next call to `op` fails with `error`.
    pub fn fail_next(&self, op: &'static str, error: TransportError) {
        self.server.lock().failures.insert(op, error);
    }

    pub fn delay_chat(&self, delay: Duration) {
        self.server.lock().chat_delay = Some(delay);
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == op).count()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.server.lock().sessions.iter().map(|s| s.id.clone()).collect()
    }

    fn enter(&self, op: &'static str) -> TransportResult<()> {
        self.calls.lock().push(op);
        match self.server.lock().failures.remove(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn check_auth(&self) -> TransportResult<AuthStatus> {
        self.enter("check_auth")?;
        Ok(match self.server.lock().user.clone() {
            Some(user) => AuthStatus::Authenticated(user),
            None => AuthStatus::Anonymous,
        })
    }

    async fn login(&self, credentials: &Credentials) -> TransportResult<User> {
        self.enter("login")?;
        if credentials.password != PASSWORD {
            return Err(TransportError::rejected_with_status(
                401,
                "Invalid username or password",
            ));
        }
        let user = User::new(&credentials.username);
        self.server.lock().user = Some(user.clone());
        Ok(user)
    }

    async fn logout(&self) -> TransportResult<()> {
        self.enter("logout")?;
        self.server.lock().user = None;
        Ok(())
    }

    async fn list_sessions(&self) -> TransportResult<Vec<SessionSummary>> {
        self.enter("list_sessions")?;
        Ok(self.server.lock().sessions.clone())
    }

    async fn create_session(&self, title: &str) -> TransportResult<String> {
        self.enter("create_session")?;
        let mut server = self.server.lock();
        server.next_id += 1;
        let id = format!("session-{}", server.next_id);
        server.sessions.push(SessionSummary::new(&id, title));
        server.histories.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn session_history(&self, session_id: &str) -> TransportResult<Vec<Message>> {
        self.enter("session_history")?;
        self.server
            .lock()
            .histories
            .get(session_id)
            .cloned()
            .ok_or_else(|| TransportError::rejected_with_status(404, "Session not found"))
    }

    async fn delete_session(&self, session_id: &str) -> TransportResult<()> {
        self.enter("delete_session")?;
        let mut server = self.server.lock();
        if server.histories.remove(session_id).is_none() {
            return Err(TransportError::rejected_with_status(404, "Session not found"));
        }
        server.sessions.retain(|s| s.id != session_id);
        Ok(())
    }

    async fn send_chat(&self, request: &ChatRequest) -> TransportResult<ChatReply> {
        self.enter("send_chat")?;
        let delay = self.server.lock().chat_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut server = self.server.lock();
        let reply = server
            .replies
            .pop_front()
            .unwrap_or_else(|| Ok(ChatReply::new(format!("echo: {}", request.message))))?;

        if let Some(summary) = server.sessions.iter_mut().find(|s| s.id == request.session_id) {
            if summary.title == "New Chat" {
                summary.title = request.message.split_whitespace().take(4).collect::<Vec<_>>().join(" ");
            }
        }
        let history = server.histories.entry(request.session_id.clone()).or_default();
        history.push(Message::user(&request.message));
        history.push(Message::assistant(&reply.response));
        Ok(reply)
    }
}

/// Presenter that keeps what it was told to show.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub messages: Vec<Message>,
    pub sessions: Vec<SessionSummary>,
    pub active_id: Option<String>,
    pub typing: bool,
    pub notifications: Vec<(String, NotificationKind)>,
    pub screens: Vec<Screen>,
    pub user: Option<User>,
    pub suggestions: Vec<String>,
}

impl RecordingPresenter {
    pub fn screen(&self) -> Option<Screen> {
        self.screens.last().copied()
    }

    pub fn last_notification(&self) -> Option<&str> {
        self.notifications.last().map(|(text, _)| text.as_str())
    }

    pub fn notified(&self, text: &str) -> bool {
        self.notifications.iter().any(|(t, _)| t == text)
    }
}

impl Presenter for RecordingPresenter {
    fn render_message(&mut self, message: &Message) {
        self.messages.push(message.clone());
    }

    fn render_history(&mut self, messages: &[Message]) {
        self.messages = messages.to_vec();
    }

    fn clear_messages(&mut self) {
        self.messages.clear();
    }

    fn render_session_list(&mut self, sessions: &[SessionSummary], active_id: Option<&str>) {
        self.sessions = sessions.to_vec();
        self.active_id = active_id.map(str::to_string);
    }

    fn show_typing_indicator(&mut self) {
        self.typing = true;
    }

    fn hide_typing_indicator(&mut self) {
        self.typing = false;
    }

    fn show_notification(&mut self, text: &str, kind: NotificationKind) {
        self.notifications.push((text.to_string(), kind));
    }

    fn show_screen(&mut self, screen: Screen) {
        self.screens.push(screen);
    }

    fn set_user(&mut self, user: Option<&User>) {
        self.user = user.cloned();
    }

    fn show_suggestions(&mut self, suggestions: &[String]) {
        self.suggestions = suggestions.to_vec();
    }
}

pub type TestController = SessionController<RecordingPresenter>;

pub fn controller(transport: &Arc<MockTransport>) -> TestController {
    controller_with(transport, ControllerConfig::default())
}

pub fn controller_with(transport: &Arc<MockTransport>, config: ControllerConfig) -> TestController {
    let transport: Arc<dyn Transport> = transport.clone();
    SessionController::new(transport, RecordingPresenter::default(), config)
}

/// A controller that is already logged in.
pub async fn logged_in(transport: &Arc<MockTransport>) -> TestController {
    let mut controller = controller(transport);
    controller
        .login(Credentials::new("admin01", PASSWORD))
        .await
        .expect("login");
    controller
}
