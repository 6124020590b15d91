//! 时钟抽象：单调时间、本地墙上时间、休眠
//!
//! 主循环、节流器和退避都经由 Clock 取时间与休眠，测试中用 ManualClock 推进虚拟时间而不真正等待。

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};

#[async_trait]
pub trait Clock: Send + Sync {
    /// 单调时间（用于节流间隔计算）
    fn now(&self) -> Instant;

    /// 本地墙上时间（用于空闲调度的时间窗口判断）
    fn local_time(&self) -> NaiveDateTime;

    async fn sleep(&self, duration: Duration);
}

/// 真实时钟：tokio 休眠 + 系统本地时间
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn local_time(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// 手动时钟（测试用）：sleep 立即返回并推进虚拟时间，同时记录每次休眠时长
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    wall_origin: NaiveDateTime,
    inner: Mutex<ManualState>,
}

#[derive(Debug, Default)]
struct ManualState {
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new(wall_origin: NaiveDateTime) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin,
            inner: Mutex::new(ManualState::default()),
        }
    }

    /// 模拟外部耗时（如网络请求），不计入 sleeps
    pub fn advance(&self, duration: Duration) {
        let mut state = self.lock();
        state.elapsed += duration;
    }

    /// 自创建以来经过的虚拟时长
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }

    /// 迄今为止所有 sleep 调用的时长（按调用顺序）
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        // 锁中毒只可能来自测试里 panic 的线程，沿用内部数据即可
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.lock().elapsed
    }

    fn local_time(&self) -> NaiveDateTime {
        let elapsed = self.lock().elapsed;
        let offset = chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        self.wall_origin + offset
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.lock();
        state.elapsed += duration;
        state.sleeps.push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_manual_clock_sleep_advances_time() {
        let clock = ManualClock::new(noon());
        let start = clock.now();
        clock.sleep(Duration::from_secs(30)).await;
        assert_eq!(clock.now() - start, Duration::from_secs(30));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(30)]);
    }

    #[tokio::test]
    async fn test_manual_clock_wall_time_follows_elapsed() {
        let clock = ManualClock::new(noon());
        clock.advance(Duration::from_secs(3600));
        assert_eq!(clock.local_time(), noon() + chrono::Duration::hours(1));
        assert!(clock.sleeps().is_empty());
    }
}
