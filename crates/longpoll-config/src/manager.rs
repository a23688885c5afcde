use crate::config::{Config, ConfigError, ConfigResult};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// `${VAR}` 或 `${VAR:-default}`
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

/// 配置管理器
///
/// 同时保存两份配置：磁盘上的原始文档（保留 `${VAR}` 占位符）和展开后的运行时配置。
/// `save` 与 `update` 只会写回原始文档，环境变量中的值不会落盘。
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
    /// 未展开的原始文档
    raw: Arc<RwLock<Config>>,
    /// 展开环境变量后的配置
    config: Arc<RwLock<Config>>,
}

impl ConfigManager {
    /// 加载配置文件，不存在时写入默认配置
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let raw = if path.exists() {
            info!("Loading config from {:?}", path);
            let content = tokio::fs::read_to_string(path).await?;
            serde_json::from_str(&content)?
        } else {
            info!("Config file not found, creating default config at {:?}", path);
            let default_config = Config::default();
            // 确保父目录存在
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let content = serde_json::to_string_pretty(&default_config)?;
            tokio::fs::write(path, &content).await?;
            default_config
        };

        let config = Self::resolve(&raw)?;

        Ok(Self {
            path: path.to_path_buf(),
            raw: Arc::new(RwLock::new(raw)),
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// 从默认位置加载配置
    pub async fn load_default() -> ConfigResult<Self> {
        let config_path = Self::default_config_path()?;
        Self::load(&config_path).await
    }

    /// 获取默认配置路径 (~/.longpoll/config.json)
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        crate::default_config_path()
            .ok_or_else(|| ConfigError::InvalidPath("Could not find home directory".to_string()))
    }

    /// 创建一个新的配置管理器
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            path,
            raw: Arc::new(RwLock::new(config.clone())),
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// 获取展开后配置的只读引用
    pub fn get(&self) -> Arc<RwLock<Config>> {
        Arc::clone(&self.config)
    }

    /// 获取展开后配置的副本
    pub async fn snapshot(&self) -> Config {
        self.config.read().await.clone()
    }

    /// 获取原始文档的副本，占位符保持原样
    pub async fn raw_snapshot(&self) -> Config {
        self.raw.read().await.clone()
    }

    /// 保存原始文档到文件
    pub async fn save(&self) -> ConfigResult<()> {
        let raw = self.raw.read().await;
        let content = serde_json::to_string_pretty(&*raw)?;
        drop(raw);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, content).await?;
        info!("Config saved to {:?}", self.path);
        Ok(())
    }

    /// 在原始文档上修改配置，验证展开结果后保存
    pub async fn update<F>(&self, f: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config) -> ConfigResult<()>,
    {
        let mut raw = self.raw.write().await;
        let mut updated = raw.clone();
        f(&mut updated)?;
        let resolved = Self::resolve(&updated)?;

        *raw = updated;
        *self.config.write().await = resolved;
        drop(raw);
        self.save().await
    }

    /// 展开原始文档中的环境变量并验证
    fn resolve(raw: &Config) -> ConfigResult<Config> {
        let mut value = serde_json::to_value(raw)?;
        Self::expand_env_vars(&mut value)?;
        let config: Config = serde_json::from_value(value)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// 验证配置
    pub fn validate(config: &Config) -> ConfigResult<()> {
        // 服务端最长等待 90 秒
        if config.longpoll.wait_seconds == 0 || config.longpoll.wait_seconds > 90 {
            return Err(ConfigError::Validation(format!(
                "longpoll.wait_seconds must be between 1 and 90, got {}",
                config.longpoll.wait_seconds
            )));
        }

        if let Some(group_id) = config.longpoll.group_id {
            if group_id <= 0 {
                return Err(ConfigError::Validation(format!(
                    "longpoll.group_id must be positive, got {}",
                    group_id
                )));
            }
        }

        if config.api.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "api.base_url cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// 展开所有字符串值中的 ${VAR} 或 ${VAR:-default}
    fn expand_env_vars(value: &mut Value) -> ConfigResult<()> {
        match value {
            Value::String(s) => {
                *s = Self::expand_str(s)?;
            }
            Value::Array(items) => {
                for item in items {
                    Self::expand_env_vars(item)?;
                }
            }
            Value::Object(map) => {
                for item in map.values_mut() {
                    Self::expand_env_vars(item)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn expand_str(content: &str) -> ConfigResult<String> {
        let mut missing = None;

        let expanded = ENV_VAR_PATTERN.replace_all(content, |cap: &Captures| {
            let var_expr = &cap[1];

            // 处理 ${VAR:-default} 语法
            let (var_name, default_value) = match var_expr.split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (var_expr, None),
            };

            match std::env::var(var_name) {
                Ok(val) => val,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    None => {
                        missing.get_or_insert_with(|| var_name.to_string());
                        String::new()
                    }
                },
            }
        });

        match missing {
            Some(var_name) => Err(ConfigError::EnvVarNotFound(var_name)),
            None => Ok(expanded.into_owned()),
        }
    }

    /// 获取配置文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }
}
