//! 错误恢复策略
//!
//! 根据 BotError 类型返回 RecoveryAction，供主循环决定是退避重试还是终止。

use std::time::Duration;

use crate::config::SupervisorSection;
use crate::core::{BotError, RecoveryAction};

/// 退避策略：将错误映射为休眠时长（限流用长退避，其它可恢复错误用短退避）
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    rate_limit_backoff: Duration,
    transient_backoff: Duration,
}

impl BackoffPolicy {
    /// rate_limit_backoff 用于限流，transient_backoff 用于其余可恢复错误
    pub fn new(rate_limit_backoff: Duration, transient_backoff: Duration) -> Self {
        Self {
            rate_limit_backoff,
            transient_backoff,
        }
    }

    /// 从 [supervisor] 段的退避秒数构建
    pub fn from_config(cfg: &SupervisorSection) -> Self {
        Self::new(
            Duration::from_secs(cfg.rate_limit_backoff_secs),
            Duration::from_secs(cfg.transient_backoff_secs),
        )
    }

    /// 根据错误类型返回建议的恢复动作
    pub fn handle(&self, err: &BotError) -> RecoveryAction {
        match err {
            BotError::RateLimited { retry_after } => {
                let wait = retry_after
                    .map(|d| d.max(self.rate_limit_backoff))
                    .unwrap_or(self.rate_limit_backoff);
                RecoveryAction::Backoff(wait)
            }
            BotError::Persistence(_) | BotError::ConfigError(_) => RecoveryAction::Abort,
            // 单条提及的失败本应在 Dispatcher 内吸收；漏到这里时按网络抖动处理
            BotError::Transient(_)
            | BotError::Rejected(_)
            | BotError::Acquisition(_)
            | BotError::Transform(_) => RecoveryAction::Backoff(self.transient_backoff),
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(900), Duration::from_secs(60))
    }
}
