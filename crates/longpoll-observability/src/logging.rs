//! 结构化日志模块
//!
//! 提供基于 tracing 的结构化日志功能。

use std::sync::Arc;

use longpoll_config::{expand_tilde, LoggingConfig};
use parking_lot::RwLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::writer::BoxMakeWriter,
    layer::SubscriberExt,
    reload::{self, Handle},
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::error::{ObservabilityError, Result};

/// 日志级别重新加载句柄类型
type ReloadHandle = Handle<EnvFilter, Registry>;

/// 日志管理器
pub struct LogManager {
    /// 配置
    config: LoggingConfig,

    /// 过滤器重新加载句柄
    reload_handle: Option<Arc<RwLock<ReloadHandle>>>,

    /// 文件输出的后台写入线程，丢弃时刷新
    file_guard: Option<WorkerGuard>,

    /// 是否已安装为全局 subscriber
    installed: bool,
}

impl LogManager {
    /// 创建新的日志管理器
    pub async fn new(config: &LoggingConfig) -> Result<Self> {
        let mut manager = Self {
            config: config.clone(),
            reload_handle: None,
            file_guard: None,
            installed: false,
        };

        manager.init()?;

        Ok(manager)
    }

    /// 初始化日志系统
    fn init(&mut self) -> Result<()> {
        // 构建环境过滤器
        let filter = build_filter(self.config.level.as_str(), &self.config)?;
        let (filter, reload_handle) = reload::Layer::new(filter);

        // 选择输出目标
        let (writer, ansi) = match &self.config.file {
            Some(file) => {
                let path = expand_tilde(file)
                    .ok_or_else(|| ObservabilityError::config(format!("Invalid log path: {}", file)))?;
                let file_name = path
                    .file_name()
                    .ok_or_else(|| ObservabilityError::config(format!("Invalid log path: {}", file)))?
                    .to_owned();
                let dir = match path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                    _ => std::path::PathBuf::from("."),
                };
                std::fs::create_dir_all(&dir)?;

                let appender = tracing_appender::rolling::never(dir, file_name);
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                self.file_guard = Some(guard);
                (BoxMakeWriter::new(non_blocking), false)
            }
            None => (BoxMakeWriter::new(std::io::stderr), true),
        };

        // 创建基础注册表
        let registry = tracing_subscriber::registry().with(filter);

        // 添加输出层
        let result = if self.config.json_format {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_writer(writer)
                .with_ansi(false);

            registry.with(layer).try_init()
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(writer)
                .with_ansi(ansi);

            registry.with(layer).try_init()
        };

        // 已有全局 subscriber 时保留原有配置
        match result {
            Ok(()) => {
                self.reload_handle = Some(Arc::new(RwLock::new(reload_handle)));
                self.installed = true;
                tracing::info!(
                    target: "longpoll_observability",
                    "Log manager initialized with level: {}",
                    self.config.level
                );
            }
            Err(e) => {
                tracing::debug!(
                    target: "longpoll_observability",
                    "Global subscriber already set, keeping it: {}",
                    e
                );
            }
        }

        Ok(())
    }

    /// 是否已安装为全局 subscriber
    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// 动态更新日志级别
    pub async fn update_level(&mut self, level: &str) -> Result<()> {
        let parsed: longpoll_config::LogLevel = level
            .parse()
            .map_err(|e| ObservabilityError::logging(format!("Invalid log level: {}", e)))?;
        let new_filter = build_filter(parsed.as_str(), &self.config)?;

        if let Some(ref handle) = self.reload_handle {
            handle
                .write()
                .modify(|filter| {
                    *filter = new_filter;
                })
                .map_err(|e| {
                    ObservabilityError::logging(format!("Failed to update log level: {}", e))
                })?;

            self.config.level = parsed;

            tracing::info!(
                target: "longpoll_observability",
                "Log level updated to: {}",
                parsed
            );

            Ok(())
        } else {
            Err(ObservabilityError::logging("Log manager not initialized"))
        }
    }

    /// 获取当前配置
    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    /// 关闭日志管理器，刷新文件输出
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!(
            target: "longpoll_observability",
            "Log manager shutting down"
        );
        self.file_guard.take();
        Ok(())
    }
}

impl std::fmt::Debug for LogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogManager")
            .field("config", &self.config)
            .field("installed", &self.installed)
            .field("file_output", &self.file_guard.is_some())
            .finish()
    }
}

/// 构建环境过滤器，模块级别覆盖全局级别
fn build_filter(level: &str, config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(level)
        .map_err(|e| ObservabilityError::logging(format!("Invalid log level: {}", e)))?;

    // 添加模块级别的过滤器
    for (module, module_level) in &config.module_levels {
        filter = filter.add_directive(
            format!("{}={}", module, module_level)
                .parse()
                .map_err(|e| ObservabilityError::logging(format!("Invalid directive: {}", e)))?,
        );
    }

    Ok(filter)
}

/// 创建一次 long poll 运行的 span
pub fn create_poll_span(group_id: i64) -> tracing::Span {
    tracing::info_span!("longpoll", group_id = group_id)
}

/// 创建单个事件分发的 span
pub fn create_event_span(event_type: &str, ts: &str) -> tracing::Span {
    tracing::debug_span!("event", event_type = %event_type, ts = %ts)
}
