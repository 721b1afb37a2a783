//! Banter Observability
//!
//! 基于 tracing 的日志初始化：过滤器、输出格式、日志文件以及 span 辅助函数。

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::LoggingConfig;
pub use error::{ObservabilityError, Result};
pub use logging::{create_request_span, create_session_span, LogManager};
