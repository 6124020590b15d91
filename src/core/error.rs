//! Bot 错误类型与恢复动作
//!
//! 与 BackoffPolicy 配合：根据 BotError 决定退避多久重试，或直接终止进程。

use std::time::Duration;

use thiserror::Error;

/// 运行过程中可能出现的错误（平台限流、网络抖动、图片处理失败、游标持久化失败等）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BotError {
    /// 平台限流（HTTP 429）；retry_after 来自 x-rate-limit-reset 头
    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Transient error: {0}")]
    Transient(String),

    /// 平台永久拒绝（非 429 的 4xx，如推文已删除、重复内容）
    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Image acquisition failed: {0}")]
    Acquisition(String),

    #[error("Transform failed: {0}")]
    Transform(String),

    #[error("Cursor persistence failed: {0}")]
    Persistence(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl BotError {
    /// 致命错误：进程必须停止
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::Persistence(_) | BotError::ConfigError(_))
    }

    /// 平台侧可重试错误（限流或网络抖动）
    pub fn is_retryable(&self) -> bool {
        matches!(self, BotError::RateLimited { .. } | BotError::Transient(_))
    }
}

/// 恢复策略根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 休眠指定时长后重新进入 Fetching
    Backoff(Duration),
    /// 终止主循环
    Abort,
}
