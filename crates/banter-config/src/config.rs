use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 主配置结构体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            server: ServerConfig::default(),
            client: ClientConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// 按 `section.key` 读取配置值
    pub fn get_value(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["version"] => Some(self.version.clone()),
            ["server", "base_url"] => Some(self.server.base_url.clone()),
            ["client", "request_timeout_secs"] => Some(self.client.request_timeout_secs.to_string()),
            ["client", "auth_expiry_delay_ms"] => Some(self.client.auth_expiry_delay_ms.to_string()),
            ["client", "notification_ttl_secs"] => {
                Some(self.client.notification_ttl_secs.to_string())
            }
            ["client", "new_chat_title"] => Some(self.client.new_chat_title.clone()),
            ["client", "reconcile_history"] => Some(self.client.reconcile_history.to_string()),
            ["logging", "level"] => Some(self.logging.level.to_string()),
            ["logging", "file"] => self.logging.file.clone(),
            ["logging", "json_format"] => Some(self.logging.json_format.to_string()),
            _ => None,
        }
    }

    /// 设置配置值
    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["server", "base_url"] => {
                self.server.base_url = value.trim_end_matches('/').to_string();
            }
            ["client", "request_timeout_secs"] => {
                self.client.request_timeout_secs = parse_number(value)?;
            }
            ["client", "auth_expiry_delay_ms"] => {
                self.client.auth_expiry_delay_ms = parse_number(value)?;
            }
            ["client", "notification_ttl_secs"] => {
                self.client.notification_ttl_secs = parse_number(value)?;
            }
            ["client", "new_chat_title"] => {
                self.client.new_chat_title = value.to_string();
            }
            ["client", "reconcile_history"] => {
                self.client.reconcile_history = value.parse().map_err(|_| {
                    ConfigError::Validation(format!("Invalid boolean: {}", value))
                })?;
            }
            ["logging", "level"] => {
                self.logging.level = value.parse()?;
            }
            ["logging", "file"] => {
                self.logging.file = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            ["logging", "json_format"] => {
                self.logging.json_format = value.parse().map_err(|_| {
                    ConfigError::Validation(format!("Invalid boolean: {}", value))
                })?;
            }
            _ => return Err(ConfigError::KeyNotFound(key.to_string())),
        }
        Ok(())
    }

    /// 所有可通过 `get_value` / `set_value` 访问的键
    pub fn keys() -> &'static [&'static str] {
        &[
            "server.base_url",
            "client.request_timeout_secs",
            "client.auth_expiry_delay_ms",
            "client.notification_ttl_secs",
            "client.new_chat_title",
            "client.reconcile_history",
            "logging.level",
            "logging.file",
            "logging.json_format",
        ]
    }
}

fn parse_number(value: &str) -> ConfigResult<u64> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid number: {}", value)))
}

/// 后端服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// 聊天后端地址 (e.g., "http://127.0.0.1:5000")
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
        }
    }
}

/// 客户端行为配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 401 之后返回登录界面前的延迟（毫秒）
    pub auth_expiry_delay_ms: u64,
    /// 通知显示时长（秒）
    pub notification_ttl_secs: u64,
    /// 新会话的默认标题
    pub new_chat_title: String,
    /// 每次成功交换后是否从服务器重新拉取历史
    pub reconcile_history: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            auth_expiry_delay_ms: 2000,
            notification_ttl_secs: 3,
            new_chat_title: "New Chat".to_string(),
            reconcile_history: true,
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn auth_expiry_delay(&self) -> Duration {
        Duration::from_millis(self.auth_expiry_delay_ms)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_secs(self.notification_ttl_secs)
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Validation(format!("Invalid log level: {}", s))),
        }
    }
}

/// Logging 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// 日志文件路径，支持 `~/`
    pub file: Option<String>,
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: Some("~/.banter/logs/banter.log".to_string()),
            json_format: false,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
