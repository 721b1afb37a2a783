use chrono::Utc;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use banter_core::{format_relative_time, Message, NotificationKind, Role, Screen};

use crate::app::{App, Focus, LoginField};

const SIDEBAR_WIDTH: u16 = 32;

pub fn draw(f: &mut Frame, app: &App) {
    match app.view().screen {
        Screen::Login => draw_login(f, app),
        Screen::Welcome | Screen::Chat => draw_main(f, app),
    }

    if app.pending_delete.is_some() {
        draw_delete_modal(f, app);
    }
}

fn draw_login(f: &mut Frame, app: &App) {
    let area = centered_rect(50, 11, f.size());
    f.render_widget(Clear, area);

    let field_style = |field: LoginField| {
        if app.login.field == field {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        }
    };
    let cursor = |field: LoginField| if app.login.field == field { "▌" } else { "" };

    let masked = "•".repeat(app.login.password.chars().count());
    let mut lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Username: ", field_style(LoginField::Username)),
            Span::raw(app.login.username.as_str()),
            Span::styled(cursor(LoginField::Username), Style::default().fg(Color::Green)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Password: ", field_style(LoginField::Password)),
            Span::raw(masked),
            Span::styled(cursor(LoginField::Password), Style::default().fg(Color::Green)),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "  [Tab] Switch field  [Enter] Login  [Ctrl+C] Quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    if let Some(line) = notification_line(app) {
        lines.push(Line::from(""));
        lines.push(line);
    }

    let form = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Banter - Login ")
            .border_style(Style::default().fg(Color::Blue)),
    );
    f.render_widget(form, area);
}

fn draw_main(f: &mut Frame, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
        .split(f.size());

    draw_sidebar(f, app, columns[0]);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(5),    // Messages
            Constraint::Length(1), // Suggestions
            Constraint::Length(3), // Input
            Constraint::Length(1), // Status bar
        ])
        .split(columns[1]);

    draw_header(f, app, rows[0]);
    match app.view().screen {
        Screen::Chat => draw_messages(f, app, rows[1]),
        _ => draw_welcome(f, rows[1]),
    }
    draw_suggestions(f, app, rows[2]);
    draw_input(f, app, rows[3]);
    draw_status_bar(f, app, rows[4]);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(
            " Banter",
            Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan),
        ),
        Span::styled("  |  ", Style::default().fg(Color::Gray)),
        Span::styled(
            app.username().unwrap_or("-").to_string(),
            Style::default().fg(Color::Green),
        ),
    ];
    if let Some(line) = notification_line(app) {
        spans.push(Span::styled("  |  ", Style::default().fg(Color::Gray)));
        spans.extend(line.spans);
    }

    let header = Paragraph::new(Line::from(spans))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .alignment(Alignment::Left);

    f.render_widget(header, area);
}

fn notification_line(app: &App) -> Option<Line<'static>> {
    let notification = app.view().notification.as_ref()?;
    let (icon, color) = match notification.kind {
        NotificationKind::Success => ("✓ ", Color::Green),
        NotificationKind::Error => ("✗ ", Color::Red),
        NotificationKind::Info => ("ℹ ", Color::Yellow),
    };
    Some(Line::from(Span::styled(
        format!("{}{}", icon, notification.text),
        Style::default().fg(color),
    )))
}

fn draw_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let view = app.view();
    let now = Utc::now();
    let title_width = SIDEBAR_WIDTH.saturating_sub(4) as usize;

    let items: Vec<ListItem> = view
        .sessions
        .iter()
        .map(|session| {
            let active = view.active_id.as_deref() == Some(session.id.as_str());
            let style = if active {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Text::from(vec![
                Line::from(Span::styled(truncate(&session.title, title_width), style)),
                Line::from(Span::styled(
                    format!("  {}", format_relative_time(session.last_activity(), now)),
                    Style::default().fg(Color::DarkGray),
                )),
            ]))
        })
        .collect();

    let border = if app.focus == Focus::Sidebar {
        Color::Yellow
    } else {
        Color::Blue
    };
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Chats ")
                .border_style(Style::default().fg(border)),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = ListState::default();
    if app.focus == Focus::Sidebar && !view.sessions.is_empty() {
        state.select(Some(app.selected));
    }
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_welcome(f: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            "How can I help you today?",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Type a question below and press Enter.",
            Style::default().fg(Color::Gray),
        )),
    ];
    let welcome = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        );
    f.render_widget(welcome, area);
}

fn draw_messages(f: &mut Frame, app: &App, area: Rect) {
    let view = app.view();
    let mut lines: Vec<Line> = view.messages.iter().flat_map(format_message).collect();

    if view.typing {
        lines.push(Line::from(Span::styled(
            "Assistant is typing...",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        )));
    }

    // scroll_offset counts lines up from the bottom
    let visible = area.height.saturating_sub(2);
    let total = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    let bottom = total.saturating_sub(visible);
    let scroll = bottom.saturating_sub(app.scroll_offset);

    let messages = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Messages ")
                .border_style(Style::default().fg(Color::Blue)),
        )
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));

    f.render_widget(messages, area);
}

fn format_message(msg: &Message) -> Vec<Line<'_>> {
    let (prefix, mut style) = match msg.role {
        Role::User => ("You: ", Style::default().fg(Color::Cyan)),
        Role::Assistant => ("Assistant: ", Style::default().fg(Color::Green)),
    };
    if msg.is_error {
        style = Style::default().fg(Color::Red);
    }

    let mut first = vec![
        Span::styled(prefix, style.add_modifier(Modifier::BOLD)),
        Span::styled(msg.content.as_str(), style),
    ];
    if msg.is_pending() {
        first.push(Span::styled(" …", Style::default().fg(Color::DarkGray)));
    } else if msg.is_failed() {
        first.push(Span::styled(" (not delivered)", Style::default().fg(Color::Red)));
    }

    vec![
        Line::from(first),
        Line::from(Span::styled(
            format!("   └─ {}", msg.timestamp.format("%H:%M:%S")),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
        Line::from(""),
    ]
}

fn draw_suggestions(f: &mut Frame, app: &App, area: Rect) {
    let line = match app.view().suggestions.first() {
        Some(suggestion) => Line::from(vec![
            Span::styled(" Suggested: ", Style::default().fg(Color::DarkGray)),
            Span::styled(suggestion.as_str(), Style::default().fg(Color::Magenta)),
            Span::styled("  [Ctrl+F] use", Style::default().fg(Color::DarkGray)),
        ]),
        None => Line::from(""),
    };
    f.render_widget(Paragraph::new(line), area);
}

fn draw_input(f: &mut Frame, app: &App, area: Rect) {
    let input_text = if app.is_typing() {
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Yellow)),
            Span::styled(app.input.as_str(), Style::default().fg(Color::White)),
            Span::styled(
                "  waiting for reply, Ctrl+S to cancel",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
            ),
        ])
    } else if app.input.is_empty() {
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Green)),
            Span::styled(
                "Type a message and press Enter to send...",
                Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
            ),
        ])
    } else {
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Green)),
            Span::styled(app.input.as_str(), Style::default().fg(Color::White)),
            Span::styled("▌", Style::default().fg(Color::Green)),
        ])
    };

    let border = if app.focus == Focus::Input {
        Color::Yellow
    } else {
        Color::Blue
    };
    let input = Paragraph::new(input_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Input ")
                .border_style(Style::default().fg(border)),
        )
        .wrap(Wrap { trim: true });

    f.render_widget(input, area);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let help_text = match (app.focus, app.is_typing()) {
        (Focus::Sidebar, _) => "[↑↓] Select  [Enter] Open  [d] Delete  [Tab] Back",
        (Focus::Input, true) => "[Ctrl+S] Cancel  [Tab] Chats  [Ctrl+C] Quit",
        (Focus::Input, false) => {
            "[Enter] Send  [Ctrl+N] New  [Tab] Chats  [Ctrl+O] Logout  [Ctrl+C] Quit"
        }
    };

    let status_bar = Paragraph::new(help_text)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::REVERSED));

    f.render_widget(status_bar, area);
}

fn draw_delete_modal(f: &mut Frame, app: &App) {
    let Some(pending) = &app.pending_delete else {
        return;
    };
    let area = centered_rect(50, 7, f.size());
    f.render_widget(Clear, area);

    let text = vec![
        Line::from("Are you sure you want to delete this chat?"),
        Line::from(Span::styled(
            truncate(&pending.title, area.width.saturating_sub(4) as usize),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "[y] Delete  [n] Cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let modal = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Delete chat ")
                .border_style(Style::default().fg(Color::Red)),
        );
    f.render_widget(modal, area);
}

/// Cuts `text` to `width` terminal columns, marking the cut with `…`.
fn truncate(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
