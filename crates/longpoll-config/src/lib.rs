pub mod config;
pub mod manager;

pub use config::{
    ApiConfig, Config, ConfigError, ConfigResult, LogLevel, LoggingConfig, LongpollConfig,
};
pub use manager::ConfigManager;

use std::path::PathBuf;

/// 获取 longpoll 配置目录路径
pub fn longpoll_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".longpoll"))
}

/// 获取默认配置文件路径
pub fn default_config_path() -> Option<PathBuf> {
    longpoll_dir().map(|dir| dir.join("config.json"))
}

/// 获取默认日志文件路径
pub fn default_log_path() -> Option<PathBuf> {
    longpoll_dir().map(|dir| dir.join("logs").join("longpoll.log"))
}

/// 展开路径中的 ~ 为用户主目录
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir().map(|home| home.join(rest))
    } else {
        Some(PathBuf::from(path))
    }
}
