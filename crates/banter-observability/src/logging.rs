//! 结构化日志模块
//!
//! 提供基于 tracing 的结构化日志功能。终端界面独占 stdout/stderr，
//! 因此配置了 `file_path` 时日志只写文件。

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::writer::BoxMakeWriter,
    layer::SubscriberExt,
    reload::{self, Handle},
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::LoggingConfig;
use crate::error::{ObservabilityError, Result};

/// 日志级别重新加载句柄类型
type ReloadHandle = Handle<EnvFilter, Registry>;

/// 日志管理器
///
/// 持有文件写入线程的 guard，drop 时会把缓冲区刷到文件。
#[derive(Debug)]
pub struct LogManager {
    /// 配置
    config: LoggingConfig,

    /// 过滤器重新加载句柄
    reload_handle: Option<ReloadHandle>,

    /// 非阻塞文件写入的 guard
    _guard: Option<WorkerGuard>,
}

impl LogManager {
    /// 创建日志管理器并安装全局 subscriber
    pub fn new(config: &LoggingConfig) -> Result<Self> {
        let mut manager = Self {
            config: config.clone(),
            reload_handle: None,
            _guard: None,
        };

        manager.init()?;

        Ok(manager)
    }

    fn init(&mut self) -> Result<()> {
        let filter = build_filter(&self.config)?;
        let (filter, reload_handle) = reload::Layer::new(filter);

        let (writer, ansi) = match &self.config.file_path {
            Some(path) => {
                let directory = path
                    .parent()
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .ok_or_else(|| {
                        ObservabilityError::config(format!("Invalid log file path: {:?}", path))
                    })?;
                let file_name = path.file_name().ok_or_else(|| {
                    ObservabilityError::config(format!("Invalid log file path: {:?}", path))
                })?;
                std::fs::create_dir_all(directory)?;

                let appender = tracing_appender::rolling::never(directory, file_name);
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                self._guard = Some(guard);
                (BoxMakeWriter::new(non_blocking), false)
            }
            None => (BoxMakeWriter::new(std::io::stderr), self.config.ansi_colors),
        };

        let registry = tracing_subscriber::registry().with(filter);

        let result = if self.config.json_format {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(self.config.include_target)
                .with_line_number(self.config.include_line_number)
                .with_ansi(false)
                .with_writer(writer);

            registry.with(layer).try_init()
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_target(self.config.include_target)
                .with_line_number(self.config.include_line_number)
                .with_ansi(ansi)
                .with_writer(writer);

            registry.with(layer).try_init()
        };
        result.map_err(|e| ObservabilityError::init(e.to_string()))?;

        self.reload_handle = Some(reload_handle);

        tracing::info!(
            target: "banter_observability",
            "Log manager initialized with level: {}",
            self.config.level
        );

        Ok(())
    }

    /// 动态更新日志级别
    pub fn update_level(&mut self, level: &str) -> Result<()> {
        let new_filter = EnvFilter::try_new(level)
            .map_err(|e| ObservabilityError::logging(format!("Invalid log level: {}", e)))?;

        let Some(handle) = &self.reload_handle else {
            return Err(ObservabilityError::logging("Log manager not initialized"));
        };
        handle
            .modify(|filter| *filter = new_filter)
            .map_err(|e| ObservabilityError::logging(format!("Failed to update log level: {}", e)))?;

        self.config.level = level.to_string();

        tracing::info!(
            target: "banter_observability",
            "Log level updated to: {}",
            level
        );

        Ok(())
    }

    /// 获取当前配置
    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }
}

/// 构建环境过滤器
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| ObservabilityError::logging(format!("Invalid log level: {}", e)))?;

    for (module, level) in &config.module_levels {
        filter = filter.add_directive(
            format!("{}={}", module, level)
                .parse()
                .map_err(|e| ObservabilityError::logging(format!("Invalid directive: {}", e)))?,
        );
    }

    Ok(filter)
}

/// 创建一次聊天请求的 span
pub fn create_request_span(token: u64) -> tracing::Span {
    tracing::info_span!("request", token = token)
}

/// 创建带有会话上下文的 span
pub fn create_session_span(session_id: &str) -> tracing::Span {
    tracing::info_span!("session", session_id = %session_id)
}
