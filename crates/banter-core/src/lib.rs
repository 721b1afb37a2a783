//! # Banter Core
//!
//! 客户端聊天会话控制器。
//!
//! 控制器只依赖两个接口：
//!
//! - [`Transport`]：与后端的 RPC（登录、会话列表、历史、发送消息）
//! - [`Presenter`]：界面渲染（消息、会话列表、输入中提示、通知、屏幕切换）
//!
//! 本身不包含任何网络或渲染逻辑。
//!
//! ## 状态机
//!
//! ```text
//! Unauthenticated ──login──▶ NoSession ──new chat / switch──▶ ActiveSession
//!        ▲                       ▲                               │  ▲
//!        │                       └──── delete current ───────────┘  │
//!        │                                                    send  │ reply
//!        └──── logout / 401 (after delay) ─── any                   ▼  │
//!                                                                 Sending
//! ```
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use banter_core::{ControllerConfig, Credentials, SessionController};
//! # async fn run(transport: Arc<dyn banter_core::Transport>, presenter: impl banter_core::Presenter) {
//! let mut controller = SessionController::new(transport, presenter, ControllerConfig::default());
//! if !controller.check_auth().await.unwrap_or(false) {
//!     controller.login(Credentials::new("admin01", "secret")).await.ok();
//! }
//! controller.send_message("How many plants are in Gujarat?").await.ok();
//! # }
//! ```

pub mod command;
pub mod controller;
pub mod error;
pub mod presenter;
pub mod state;
pub mod time;
pub mod transport;
pub mod types;

pub use command::{Command, Outcome};
pub use controller::{dispatch_send, ControllerConfig, SendOutcome, SendTicket, SessionController};
pub use error::{
    ControllerError, ControllerResult, TransportError, TransportResult, ValidationError,
};
pub use presenter::{ConfirmGate, Presenter};
pub use state::{ControllerState, Phase};
pub use time::format_relative_time;
pub use transport::Transport;
pub use types::{
    AuthStatus, ChatReply, ChatRequest, Credentials, DeliveryStatus, Message, NotificationKind,
    Role, Screen, SessionSummary, User,
};

/// 版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
