use std::time::{Duration, Instant};

use banter_core::{Message, NotificationKind, Presenter, Screen, SessionSummary, User};

#[derive(Debug, Clone)]
pub struct Notification {
    pub text: String,
    pub kind: NotificationKind,
    pub shown_at: Instant,
}

/// Everything the controller asked to show. `ui::draw` renders from this.
#[derive(Debug)]
pub struct ChatView {
    pub screen: Screen,
    pub messages: Vec<Message>,
    pub sessions: Vec<SessionSummary>,
    pub active_id: Option<String>,
    pub typing: bool,
    pub notification: Option<Notification>,
    pub user: Option<User>,
    pub suggestions: Vec<String>,
    notification_ttl: Duration,
}

impl ChatView {
    pub fn new(notification_ttl: Duration) -> Self {
        Self {
            screen: Screen::Login,
            messages: Vec::new(),
            sessions: Vec::new(),
            active_id: None,
            typing: false,
            notification: None,
            user: None,
            suggestions: Vec::new(),
            notification_ttl,
        }
    }

    /// Drops the notification once its ttl has passed. Returns `true` if one
    /// was removed.
    pub fn expire_notification(&mut self, now: Instant) -> bool {
        let expired = self
            .notification
            .as_ref()
            .is_some_and(|n| now.duration_since(n.shown_at) >= self.notification_ttl);
        if expired {
            self.notification = None;
        }
        expired
    }

    pub fn session_index(&self, session_id: &str) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == session_id)
    }
}

impl Presenter for ChatView {
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
        self.notification = Some(Notification {
            text: text.to_string(),
            kind,
            shown_at: Instant::now(),
        });
    }

    fn show_screen(&mut self, screen: Screen) {
        self.screen = screen;
    }

    fn set_user(&mut self, user: Option<&User>) {
        self.user = user.cloned();
    }

    fn show_suggestions(&mut self, suggestions: &[String]) {
        self.suggestions = suggestions.to_vec();
    }
}
