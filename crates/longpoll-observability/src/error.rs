//! 观测性错误类型

/// 观测性错误类型
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ObservabilityError {
    /// 配置错误
    #[error("Configuration error: {message}")]
    Config {
        message: String,
    },

    /// 日志错误
    #[error("Logging error: {message}")]
    Logging {
        message: String,
    },

    /// IO 错误
    #[error("IO error: {message}")]
    Io {
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
}

impl From<std::io::Error> for ObservabilityError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            message: e.to_string(),
        }
    }
}

/// 观测性结果类型
pub type Result<T> = std::result::Result<T, ObservabilityError>;
