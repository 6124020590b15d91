//! 优雅关闭
//!
//! Ctrl+C / SIGTERM 触发 CancellationToken，主循环在休眠或两轮之间退出。
//! 游标每次推进都已落盘，退出时无需额外 flush。

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

/// 关闭信号管理器：持有取消 token，并记录第一次触发关闭的原因
#[derive(Clone, Default)]
pub struct ShutdownManager {
    /// 交给主循环观察的取消 token
    shutdown_token: CancellationToken,
    /// 首个关闭原因；后续重复触发不覆盖
    reason: Arc<Mutex<Option<ShutdownReason>>>,
}

/// 关闭原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C
    UserInitiated,
    /// SIGTERM
    Signal,
    /// 主循环因不可恢复的错误退出
    FatalError(String),
}

impl ShutdownManager {
    /// 创建新的关闭管理器
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取关闭 token（主循环在休眠与两轮之间检查）
    pub fn token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// 触发关闭；只保留第一次的原因
    pub fn shutdown(&self, reason: ShutdownReason) {
        {
            let mut slot = self.reason.lock().unwrap_or_else(|e| e.into_inner());
            if slot.is_none() {
                *slot = Some(reason);
            }
        }
        self.shutdown_token.cancel();
    }

    /// 已触发关闭时返回原因
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 安装系统信号处理器 (Ctrl+C, SIGTERM)
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                tracing::info!("Received Ctrl+C, stopping after the current step...");
                manager.shutdown(ShutdownReason::UserInitiated);
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    tracing::info!("Received SIGTERM, stopping after the current step...");
                    manager.shutdown(ShutdownReason::Signal);
                }
            });
        }
    }
}

/// 安装信号处理器后运行主循环；主循环自行观察 token。
/// 返回时记录关闭原因：信号触发的为 Ctrl+C / SIGTERM，出错退出的为 FatalError。
pub async fn run_until_shutdown<F, Fut, T, E>(manager: Arc<ShutdownManager>, app: F) -> Result<T, E>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    manager.install_signal_handlers();
    let result = app(manager.token()).await;
    if let Err(e) = &result {
        manager.shutdown(ShutdownReason::FatalError(e.to_string()));
    }
    match manager.reason() {
        Some(ShutdownReason::FatalError(msg)) => tracing::error!("Supervisor stopped: {}", msg),
        Some(reason) => tracing::info!(?reason, "Supervisor stopped cleanly"),
        None => tracing::info!("Supervisor returned without a shutdown request"),
    }
    result
}
