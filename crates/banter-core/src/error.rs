//! # Error Types
//!
//! 传输层与控制器的错误类型。

use std::time::Duration;

use thiserror::Error;

/// 传输层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// 请求未能到达服务器（连接失败、DNS 等）
    #[error("network error: {0}")]
    Network(String),

    /// HTTP 401，登录已过期
    #[error("authentication expired")]
    AuthExpired,

    /// 服务器拒绝请求（非 2xx，或 body 中带 error 字段）
    #[error("server rejected request: {message}")]
    Rejected { status: Option<u16>, message: String },

    /// 请求超时
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// 响应无法解析
    #[error("invalid response: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            status: None,
            message: message.into(),
        }
    }

    pub fn rejected_with_status(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired)
    }

    /// Message shown in the chat history when a send fails.
    ///
    /// Never exposes the raw error.
    pub fn chat_reply_text(&self) -> &'static str {
        match self {
            Self::AuthExpired => "Authentication expired. Please login again.",
            Self::Network(_) => "Network error. Please check your connection and try again.",
            Self::Timeout(_) => "The request timed out. Please try again.",
            Self::Rejected { .. } | Self::Decode(_) => {
                "Sorry, I encountered an error. Please try again."
            }
        }
    }
}

/// 传输层结果类型
pub type TransportResult<T> = Result<T, TransportError>;

/// 输入校验失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("username and password are required")]
    MissingCredentials,

    #[error("deletion was not confirmed")]
    NotConfirmed,
}

/// 控制器错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("not logged in")]
    NotAuthenticated,

    /// 登录过期后等待切换回登录界面期间的操作
    #[error("authentication expired, logging out")]
    AuthExpiring,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ControllerError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// 控制器结果类型
pub type ControllerResult<T> = Result<T, ControllerError>;
