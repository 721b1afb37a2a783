use std::sync::Arc;
use std::time::{Duration, Instant};

use banter_core::{
    dispatch_send, ChatReply, ControllerConfig, Credentials, NotificationKind, Presenter, Screen,
    SendOutcome, SendTicket, SessionController, Transport, TransportResult,
};
use banter_observability::create_request_span;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, Instrument};

use crate::view::ChatView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Input,
    Sidebar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Username,
    Password,
}

#[derive(Debug)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub field: LoginField,
}

impl LoginForm {
    fn new() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            field: LoginField::Username,
        }
    }

    fn active_mut(&mut self) -> &mut String {
        match self.field {
            LoginField::Username => &mut self.username,
            LoginField::Password => &mut self.password,
        }
    }

    fn toggle(&mut self) {
        self.field = match self.field {
            LoginField::Username => LoginField::Password,
            LoginField::Password => LoginField::Username,
        };
    }
}

/// Session waiting for a yes/no in the delete modal.
#[derive(Debug, Clone)]
pub struct PendingDelete {
    pub session_id: String,
    pub title: String,
}

type SendResult = (SendTicket, TransportResult<ChatReply>);

pub struct App {
    controller: SessionController<ChatView>,
    pub input: String,
    pub focus: Focus,
    pub login: LoginForm,
    pub selected: usize,
    pub pending_delete: Option<PendingDelete>,
    pub scroll_offset: u16,
    reply_tx: UnboundedSender<SendResult>,
    reply_rx: UnboundedReceiver<SendResult>,
}

impl App {
    pub fn new(
        transport: Arc<dyn Transport>,
        config: ControllerConfig,
        notification_ttl: Duration,
    ) -> Self {
        let (reply_tx, reply_rx) = unbounded_channel();
        Self {
            controller: SessionController::new(transport, ChatView::new(notification_ttl), config),
            input: String::new(),
            focus: Focus::Input,
            login: LoginForm::new(),
            selected: 0,
            pending_delete: None,
            scroll_offset: 0,
            reply_tx,
            reply_rx,
        }
    }

    pub fn view(&self) -> &ChatView {
        self.controller.presenter()
    }

    pub fn is_typing(&self) -> bool {
        self.controller.is_typing()
    }

    pub fn username(&self) -> Option<&str> {
        self.controller.user().map(|u| u.username.as_str())
    }

    /// Restores an existing login, otherwise leaves the login screen up.
    pub async fn start(&mut self) {
        if let Err(e) = self.controller.check_auth().await {
            debug!("Startup auth check failed: {}", e);
        }
        self.sync_selection();
    }

    /// Returns `true` when the user asked to quit.
    pub async fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }

        if self.pending_delete.is_some() {
            self.handle_modal_key(key).await;
            return false;
        }

        match self.view().screen {
            Screen::Login => self.handle_login_key(key).await,
            Screen::Welcome | Screen::Chat => {
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    self.handle_control_key(key.code).await;
                } else {
                    match self.focus {
                        Focus::Input => self.handle_input_key(key.code).await,
                        Focus::Sidebar => self.handle_sidebar_key(key.code).await,
                    }
                }
            }
        }
        false
    }

    async fn handle_login_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(c) => self.login.active_mut().push(c),
            KeyCode::Backspace => {
                self.login.active_mut().pop();
            }
            KeyCode::Tab | KeyCode::Up | KeyCode::Down => self.login.toggle(),
            KeyCode::Enter => {
                if self.login.field == LoginField::Username && self.login.password.is_empty() {
                    self.login.field = LoginField::Password;
                } else {
                    self.submit_login().await;
                }
            }
            _ => {}
        }
    }

    async fn submit_login(&mut self) {
        let credentials = Credentials::new(self.login.username.trim(), self.login.password.clone());
        match self.controller.login(credentials).await {
            Ok(()) => {
                self.login = LoginForm::new();
                self.focus = Focus::Input;
                self.sync_selection();
            }
            Err(e) if e.is_validation() => {
                self.controller
                    .presenter_mut()
                    .show_notification("Please enter username and password", NotificationKind::Error);
            }
            Err(e) => {
                debug!("Login failed: {}", e);
                self.login.password.clear();
            }
        }
    }

    async fn handle_control_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('n') => {
                if let Err(e) = self.controller.start_new_chat().await {
                    debug!("New chat failed: {}", e);
                }
                self.focus = Focus::Input;
                self.scroll_offset = 0;
                self.sync_selection();
            }
            KeyCode::Char('s') => {
                self.controller.cancel_send();
            }
            KeyCode::Char('o') => {
                self.controller.logout().await;
                self.reset_local_state();
            }
            KeyCode::Char('f') => {
                if let Some(suggestion) = self.view().suggestions.first().cloned() {
                    self.input = suggestion;
                    self.focus = Focus::Input;
                }
            }
            _ => {}
        }
    }

    async fn handle_input_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Enter => self.send_input().await,
            KeyCode::Char(c) => self.input.push(c),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Tab => {
                if !self.view().sessions.is_empty() {
                    self.focus = Focus::Sidebar;
                    self.sync_selection();
                }
            }
            KeyCode::Up => self.scroll_offset = self.scroll_offset.saturating_add(1),
            KeyCode::Down => self.scroll_offset = self.scroll_offset.saturating_sub(1),
            KeyCode::PageUp => self.scroll_offset = self.scroll_offset.saturating_add(10),
            KeyCode::PageDown => self.scroll_offset = self.scroll_offset.saturating_sub(10),
            _ => {}
        }
    }

    async fn handle_sidebar_key(&mut self, code: KeyCode) {
        let count = self.view().sessions.len();
        match code {
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down if count > 0 => self.selected = (self.selected + 1).min(count - 1),
            KeyCode::Enter => {
                if let Some(id) = self.selected_session_id() {
                    if let Err(e) = self.controller.switch_session(&id).await {
                        debug!("[{}] Switch failed: {}", id, e);
                    }
                    self.focus = Focus::Input;
                    self.scroll_offset = 0;
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(session) = self.view().sessions.get(self.selected) {
                    self.pending_delete = Some(PendingDelete {
                        session_id: session.id.clone(),
                        title: session.title.clone(),
                    });
                }
            }
            KeyCode::Tab | KeyCode::Esc => self.focus = Focus::Input,
            _ => {}
        }
    }

    async fn handle_modal_key(&mut self, key: KeyEvent) {
        let confirmed = match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => true,
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => false,
            _ => return,
        };
        let Some(pending) = self.pending_delete.take() else {
            return;
        };
        if !confirmed {
            return;
        }

        if let Err(e) = self
            .controller
            .delete_session(&pending.session_id, &mut true)
            .await
        {
            debug!("[{}] Delete failed: {}", pending.session_id, e);
        }
        if self.view().sessions.is_empty() {
            self.focus = Focus::Input;
        }
        self.sync_selection();
    }

    /// Starts a send. The request runs on its own task so the UI keeps
    /// drawing; the reply comes back through [`process_replies`](Self::process_replies).
    async fn send_input(&mut self) {
        let text = std::mem::take(&mut self.input);
        match self.controller.begin_send(&text).await {
            Ok(Some(ticket)) => {
                self.scroll_offset = 0;
                self.sync_selection();
                self.spawn_send(ticket);
            }
            Ok(None) => self.input = text,
            Err(e) => {
                debug!("Send not started: {}", e);
                if !e.is_validation() {
                    self.input = text;
                }
            }
        }
    }

    fn spawn_send(&self, ticket: SendTicket) {
        let transport = self.controller.transport();
        let timeout = self.controller.config().request_timeout;
        let tx = self.reply_tx.clone();
        let span = create_request_span(ticket.token());

        tokio::spawn(
            async move {
                let result = dispatch_send(transport.as_ref(), &ticket, timeout).await;
                if tx.send((ticket, result)).is_err() {
                    debug!("Reply dropped, the app has shut down");
                }
            }
            .instrument(span),
        );
    }

    /// Applies every reply that has arrived since the last call.
    pub async fn process_replies(&mut self) {
        while let Ok(reply) = self.reply_rx.try_recv() {
            self.apply_reply(reply).await;
        }
    }

    async fn apply_reply(&mut self, (ticket, result): SendResult) {
        match self.controller.complete_send(ticket, result).await {
            Ok(SendOutcome::Discarded) => debug!("Stale reply discarded"),
            Ok(_) => self.scroll_offset = 0,
            Err(e) => debug!("Send failed: {}", e),
        }
        self.sync_selection();
    }

    pub fn on_tick(&mut self) {
        if self.controller.tick() {
            self.reset_local_state();
        }
        self.controller
            .presenter_mut()
            .expire_notification(Instant::now());
    }

    fn reset_local_state(&mut self) {
        self.input.clear();
        self.login = LoginForm::new();
        self.focus = Focus::Input;
        self.selected = 0;
        self.pending_delete = None;
        self.scroll_offset = 0;
    }

    fn selected_session_id(&self) -> Option<String> {
        self.view().sessions.get(self.selected).map(|s| s.id.clone())
    }

    /// Keeps the sidebar cursor on the active session, or in range.
    fn sync_selection(&mut self) {
        let view = self.view();
        let active = view.active_id.as_deref().and_then(|id| view.session_index(id));
        let count = view.sessions.len();
        self.selected = match active {
            Some(index) if self.focus == Focus::Input => index,
            _ => self.selected.min(count.saturating_sub(1)),
        };
    }
}
