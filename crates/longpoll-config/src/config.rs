use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 主配置结构体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub longpoll: LongpollConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            api: ApiConfig::default(),
            longpoll: LongpollConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// 获取配置值的快捷方法
    pub fn get_value(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["version"] => Some(self.version.clone()),
            ["api", "base_url"] => Some(self.api.base_url.clone()),
            ["api", "version"] => Some(self.api.version.clone()),
            ["api", "access_token"] => self.api.access_token.clone(),
            ["longpoll", "group_id"] => self.longpoll.group_id.map(|id| id.to_string()),
            ["longpoll", "wait_seconds"] => Some(self.longpoll.wait_seconds.to_string()),
            ["logging", "level"] => Some(self.logging.level.as_str().to_string()),
            ["logging", "json_format"] => Some(self.logging.json_format.to_string()),
            ["logging", "file"] => self.logging.file.clone(),
            _ => None,
        }
    }

    /// 设置配置值
    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["api", "base_url"] => {
                self.api.base_url = value.to_string();
            }
            ["api", "version"] => {
                self.api.version = value.to_string();
            }
            ["api", "access_token"] => {
                self.api.access_token = Some(value.to_string());
            }
            ["longpoll", "group_id"] => {
                self.longpoll.group_id = Some(value.parse().map_err(|_| {
                    ConfigError::Validation(format!("Invalid group id: {}", value))
                })?);
            }
            ["longpoll", "wait_seconds"] => {
                self.longpoll.wait_seconds = value.parse().map_err(|_| {
                    ConfigError::Validation(format!("Invalid number: {}", value))
                })?;
            }
            ["logging", "level"] => {
                self.logging.level = value.parse()?;
            }
            ["logging", "json_format"] => {
                self.logging.json_format = value.parse().map_err(|_| {
                    ConfigError::Validation(format!("Invalid boolean: {}", value))
                })?;
            }
            ["logging", "file"] => {
                self.logging.file = Some(value.to_string());
            }
            _ => return Err(ConfigError::KeyNotFound(key.to_string())),
        }
        Ok(())
    }

    /// 隐藏 access token 后的副本，用于展示
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.api.access_token.is_some() {
            config.api.access_token = Some("***".to_string());
        }
        config
    }
}

/// API 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    pub version: String,
    /// 社区 access token，支持 `${VAR}` 环境变量展开
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.vk.com".to_string(),
            version: "5.199".to_string(),
            access_token: None,
        }
    }
}

/// Long poll 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LongpollConfig {
    /// 为空时根据 access token 自动解析社区 ID
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default = "default_wait_seconds")]
    pub wait_seconds: u32,
}

fn default_wait_seconds() -> u32 {
    25
}

impl Default for LongpollConfig {
    fn default() -> Self {
        Self {
            group_id: None,
            wait_seconds: default_wait_seconds(),
        }
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
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
            "trace" => Ok(LogLevel::Trace),
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
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// 是否使用 JSON 格式
    #[serde(default)]
    pub json_format: bool,
    /// 日志文件路径，为空时输出到 stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// 模块级别的日志配置
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub module_levels: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            json_format: false,
            file: None,
            module_levels: HashMap::new(),
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
