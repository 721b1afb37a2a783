//! # Transport Trait
//!
//! 控制器与后端之间的 RPC 接口。控制器只依赖这个 trait，不直接做网络请求。

use async_trait::async_trait;

use crate::error::TransportResult;
use crate::types::{AuthStatus, ChatReply, ChatRequest, Credentials, Message, SessionSummary, User};

/// 后端 RPC 接口
///
/// 任何一个调用返回 401 时，实现必须返回 [`TransportError::AuthExpired`]。
/// 例外是 `login`：401 表示用户名或密码错误，应返回 `Rejected`。
///
/// [`TransportError::AuthExpired`]: crate::error::TransportError::AuthExpired
#[async_trait]
pub trait Transport: Send + Sync {
    /// 检查当前是否已登录
    async fn check_auth(&self) -> TransportResult<AuthStatus>;

    /// 登录
    async fn login(&self, credentials: &Credentials) -> TransportResult<User>;

    /// 登出
    async fn logout(&self) -> TransportResult<()>;

    /// 列出当前用户的会话
    async fn list_sessions(&self) -> TransportResult<Vec<SessionSummary>>;

    /// 创建会话，返回服务器分配的 id
    async fn create_session(&self, title: &str) -> TransportResult<String>;

    /// 获取会话的完整消息历史
    async fn session_history(&self, session_id: &str) -> TransportResult<Vec<Message>>;

    /// 删除会话
    async fn delete_session(&self, session_id: &str) -> TransportResult<()>;

    /// 发送聊天消息
    async fn send_chat(&self, request: &ChatRequest) -> TransportResult<ChatReply>;
}
