//! Long poll 观测性基础设施
//!
//! 基于 tracing 的结构化日志初始化与运行时日志级别调整。

pub mod error;
pub mod logging;

pub use error::{ObservabilityError, Result};
pub use logging::{create_event_span, create_poll_span, LogManager};
