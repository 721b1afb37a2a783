//! 日志配置
//!
//! 可以直接构造，也可以从 `banter-config` 的 `logging` 段转换。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// 日志级别或 EnvFilter 表达式（trace, debug, info, warn, error）
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否使用 JSON 格式
    #[serde(default)]
    pub json_format: bool,

    /// 日志文件路径；为空时输出到 stderr
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// 模块级别的日志配置
    #[serde(default)]
    pub module_levels: HashMap<String, String>,

    /// 是否启用 ANSI 颜色（写文件时总是关闭）
    #[serde(default = "default_true")]
    pub ansi_colors: bool,

    /// 是否包含目标（target）
    #[serde(default = "default_true")]
    pub include_target: bool,

    /// 是否包含行号
    #[serde(default)]
    pub include_line_number: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
            module_levels: HashMap::new(),
            ansi_colors: true,
            include_target: true,
            include_line_number: false,
        }
    }
}

impl LoggingConfig {
    /// 从应用配置转换；`RUST_LOG` 优先于配置文件中的级别
    pub fn from_app_config(config: &banter_config::LoggingConfig) -> Self {
        let level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.level.to_string());
        Self {
            level,
            json_format: config.json_format,
            file_path: config.file.as_deref().and_then(banter_config::expand_tilde),
            ..Self::default()
        }
    }

    /// 设置日志级别
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// 设置是否使用 JSON 格式
    pub fn with_json_format(mut self, json: bool) -> Self {
        self.json_format = json;
        self
    }

    /// 设置日志文件路径
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// 添加模块特定的日志级别
    pub fn with_module_level(mut self, module: impl Into<String>, level: impl Into<String>) -> Self {
        self.module_levels.insert(module.into(), level.into());
        self
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
