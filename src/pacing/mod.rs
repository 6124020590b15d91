//! 响应节流：保证任意两次发推之间至少间隔 MIN_INTERVAL（由平台速率限制推得）
//!
//! 两态状态机：Idle（尚未发送过）与 Paced(上次发送时间)。进程级状态，只由 Dispatcher 在发送前后修改。

use std::time::{Duration, Instant};

use crate::core::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacerState {
    Idle,
    Paced(Instant),
}

#[derive(Debug, Clone)]
pub struct ResponsePacer {
    min_interval: Duration,
    state: PacerState,
}

impl ResponsePacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            state: PacerState::Idle,
        }
    }

    /// 当前节流状态：尚未发推为 Idle，否则为最近一次发推时刻
    pub fn state(&self) -> PacerState {
        self.state
    }

    /// 发送前调用：距上次发送不足 min_interval 时休眠补足，然后进入 Paced(now)
    pub async fn wait_gate(&mut self, clock: &dyn Clock) {
        if let PacerState::Paced(last) = self.state {
            let elapsed = clock.now().saturating_duration_since(last);
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::info!("Waiting {:.1}s before next response", wait.as_secs_f64());
                clock.sleep(wait).await;
            }
        }
        self.state = PacerState::Paced(clock.now());
    }

    /// 发送后调用：记录实际发送完成时间
    pub fn record_send(&mut self, clock: &dyn Clock) {
        self.state = PacerState::Paced(clock.now());
    }
}
