pub mod config;
pub mod manager;

pub use config::{
    ClientConfig, Config, ConfigError, ConfigResult, LogLevel, LoggingConfig, ServerConfig,
};
pub use manager::ConfigManager;

use std::path::PathBuf;

/// 获取 Banter 配置目录路径
pub fn banter_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".banter"))
}

/// 获取默认配置文件路径
pub fn default_config_path() -> Option<PathBuf> {
    banter_dir().map(|dir| dir.join("config.json"))
}

/// 获取默认日志文件路径
pub fn default_log_path() -> Option<PathBuf> {
    banter_dir().map(|dir| dir.join("logs").join("banter.log"))
}

/// 初始化 Banter 目录结构
pub async fn init_banter_dirs() -> ConfigResult<()> {
    if let Some(banter) = banter_dir() {
        tokio::fs::create_dir_all(&banter).await?;
        tokio::fs::create_dir_all(banter.join("logs")).await?;
    }
    Ok(())
}

/// 展开路径中的 ~ 为用户主目录
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}
