//! # Presenter
//!
//! 控制器调用的渲染接口，以及删除确认门。

use crate::types::{Message, NotificationKind, Screen, SessionSummary, User};

/// 渲染接口，由 UI 层实现
pub trait Presenter {
    /// 追加一条消息
    fn render_message(&mut self, message: &Message);

    /// 整体替换消息列表（切换会话、状态修正后）
    fn render_history(&mut self, messages: &[Message]);

    fn clear_messages(&mut self);

    /// 渲染侧边栏会话列表，`active_id` 为当前会话
    fn render_session_list(&mut self, sessions: &[SessionSummary], active_id: Option<&str>);

    fn show_typing_indicator(&mut self);

    fn hide_typing_indicator(&mut self);

    fn show_notification(&mut self, text: &str, kind: NotificationKind);

    fn show_screen(&mut self, screen: Screen);

    /// 显示当前用户，登出时为 `None`
    fn set_user(&mut self, user: Option<&User>);

    /// 显示后续问题建议
    fn show_suggestions(&mut self, _suggestions: &[String]) {}
}

/// 删除前的确认门
pub trait ConfirmGate {
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// 答案已经由模态框收集好
impl ConfirmGate for bool {
    fn confirm(&mut self, _prompt: &str) -> bool {
        *self
    }
}

impl<F> ConfirmGate for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}
