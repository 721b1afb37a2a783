//! 终端输出
//!
//! `Printer` 实现 `Presenter`：通知和输入中提示立即打印，消息与会话列表由命令
//! 处理函数在操作完成后打印。

use banter_core::{
    format_relative_time, Message, NotificationKind, Presenter, Role, Screen, SessionSummary, User,
};
use chrono::{DateTime, Utc};
use colored::Colorize;

#[derive(Debug, Default)]
pub struct Printer {
    /// 输入中提示（REPL 中为 true）
    show_typing: bool,
    screen: Option<Screen>,
    user: Option<User>,
    suggestions: Vec<String>,
}

impl Printer {
    pub fn new(show_typing: bool) -> Self {
        Self {
            show_typing,
            ..Self::default()
        }
    }

    pub fn screen(&self) -> Option<Screen> {
        self.screen
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }
}

impl Presenter for Printer {
    // the user already sees what they typed
    fn render_message(&mut self, _message: &Message) {}

    fn render_history(&mut self, _messages: &[Message]) {}

    fn clear_messages(&mut self) {}

    fn render_session_list(&mut self, _sessions: &[SessionSummary], _active_id: Option<&str>) {}

    fn show_typing_indicator(&mut self) {
        if self.show_typing {
            println!("{}", "Assistant is typing...".dimmed());
        }
    }

    fn hide_typing_indicator(&mut self) {}

    fn show_notification(&mut self, text: &str, kind: NotificationKind) {
        eprintln!("{}", format_notification(text, kind));
    }

    fn show_screen(&mut self, screen: Screen) {
        self.screen = Some(screen);
    }

    fn set_user(&mut self, user: Option<&User>) {
        self.user = user.cloned();
    }

    fn show_suggestions(&mut self, suggestions: &[String]) {
        self.suggestions = suggestions.to_vec();
    }
}

pub fn format_notification(text: &str, kind: NotificationKind) -> String {
    match kind {
        NotificationKind::Success => format!("✅ {}", text).green().to_string(),
        NotificationKind::Error => format!("❌ {}", text).red().to_string(),
        NotificationKind::Info => format!("ℹ️  {}", text).cyan().to_string(),
    }
}

pub fn format_message(message: &Message) -> String {
    let marker = if message.is_failed() {
        format!(" {}", "(not sent)".red())
    } else if message.is_pending() {
        format!(" {}", "(sending)".dimmed())
    } else {
        String::new()
    };

    match message.role {
        Role::User => format!("{} {}{}", "You:".cyan().bold(), message.content, marker),
        Role::Assistant if message.is_error => {
            format!("{} {}", "Assistant:".green().bold(), message.content.red())
        }
        Role::Assistant => format!("{} {}", "Assistant:".green().bold(), message.content),
    }
}

pub fn format_session_line(
    session: &SessionSummary,
    active: bool,
    now: DateTime<Utc>,
) -> String {
    let when = format_relative_time(session.last_activity(), now);
    let line = format!("{:<38} {:<32} {}", session.id, session.title, when.dimmed());
    if active {
        format!("{} {}", "*".yellow().bold(), line.bold())
    } else {
        format!("  {}", line)
    }
}

pub fn print_history(messages: &[Message]) {
    if messages.is_empty() {
        println!("{}", "No messages yet".dimmed());
        return;
    }
    for message in messages {
        println!("{}", format_message(message));
    }
}

pub fn print_sessions(sessions: &[SessionSummary], active_id: Option<&str>) {
    if sessions.is_empty() {
        println!("{}", "No chats yet".dimmed());
        return;
    }
    println!("{}", "💬 Chats:".cyan().bold());
    let now = Utc::now();
    for session in sessions {
        let active = active_id == Some(session.id.as_str());
        println!("{}", format_session_line(session, active, now));
    }
}

pub fn print_suggestions(suggestions: &[String]) {
    for suggestion in suggestions {
        println!("{}", format!("💡 {}", suggestion).yellow());
    }
}
