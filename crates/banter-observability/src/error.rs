//! 观测性错误类型

/// 观测性错误类型
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ObservabilityError {
    /// 配置错误
    #[error("Configuration error: {message}")]
    Config {
        /// 错误描述
        message: String,
    },

    /// 日志错误
    #[error("Logging error: {message}")]
    Logging {
        /// 错误描述
        message: String,
    },

    /// 初始化错误（例如全局 subscriber 已经设置）
    #[error("Initialization error: {message}")]
    Init {
        /// 错误描述
        message: String,
    },

    /// IO 错误
    #[error("IO error: {message}")]
    Io {
        /// 错误描述
        message: String,
    },
}

impl ObservabilityError {
    /// 创建配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 创建日志错误
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }

    /// 创建初始化错误
    pub fn init(message: impl Into<String>) -> Self {
        Self::Init {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ObservabilityError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ObservabilityError>;
