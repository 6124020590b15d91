//! 空闲调度：收件箱为空时，判断当前是否落在主动发推的时间窗口内
//!
//! 纯函数、无副作用；实际发推由主循环执行。

use chrono::{NaiveDateTime, Timelike};

use crate::config::ScheduleSection;
use crate::core::BotError;

#[derive(Debug, Clone)]
pub struct IdleScheduler {
    enabled: bool,
    hour: u32,
    minute: u32,
}

impl IdleScheduler {
    /// 每天 hour:minute 这一分钟内允许主动发推
    pub fn new(hour: u32, minute: u32) -> Self {
        Self {
            enabled: true,
            hour,
            minute,
        }
    }

    /// 永不主动发推
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            hour: 0,
            minute: 0,
        }
    }

    /// 从 [schedule] 段构建；启用时 hour 必须在 0..=23、minute 在 0..=59
    pub fn from_config(cfg: &ScheduleSection) -> Result<Self, BotError> {
        if !cfg.enabled {
            return Ok(Self::disabled());
        }
        if cfg.hour > 23 || cfg.minute > 59 {
            return Err(BotError::ConfigError(format!(
                "schedule window {}:{:02} is not a valid time of day",
                cfg.hour, cfg.minute
            )));
        }
        Ok(Self::new(cfg.hour, cfg.minute))
    }

    /// 仅当本地时间的时、分与配置的窗口完全一致时返回 true
    pub fn should_post_unsolicited(&self, now: NaiveDateTime) -> bool {
        self.enabled && now.hour() == self.hour && now.minute() == self.minute
    }
}

impl Default for IdleScheduler {
    fn default() -> Self {
        Self::new(13, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_inside_window() {
        let scheduler = IdleScheduler::default();
        assert!(scheduler.should_post_unsolicited(at(13, 0, 0)));
        assert!(scheduler.should_post_unsolicited(at(13, 0, 59)));
    }

    #[test]
    fn test_outside_window() {
        let scheduler = IdleScheduler::default();
        assert!(!scheduler.should_post_unsolicited(at(13, 1, 0)));
        assert!(!scheduler.should_post_unsolicited(at(12, 59, 59)));
        assert!(!scheduler.should_post_unsolicited(at(1, 0, 0)));
    }

    #[test]
    fn test_from_config_rejects_out_of_range_window() {
        let bad_hour = ScheduleSection {
            enabled: true,
            hour: 24,
            minute: 0,
        };
        assert!(matches!(
            IdleScheduler::from_config(&bad_hour),
            Err(BotError::ConfigError(_))
        ));
        let bad_minute = ScheduleSection {
            enabled: true,
            hour: 13,
            minute: 60,
        };
        assert!(IdleScheduler::from_config(&bad_minute).is_err());
    }

    #[test]
    fn test_from_config_disabled_ignores_window() {
        let cfg = ScheduleSection {
            enabled: false,
            hour: 99,
            minute: 99,
        };
        let scheduler = IdleScheduler::from_config(&cfg).unwrap();
        assert!(!scheduler.should_post_unsolicited(at(13, 0, 0)));
    }

    #[test]
    fn test_from_config_valid_window() {
        let cfg = ScheduleSection {
            enabled: true,
            hour: 9,
            minute: 30,
        };
        let scheduler = IdleScheduler::from_config(&cfg).unwrap();
        assert!(scheduler.should_post_unsolicited(at(9, 30, 5)));
    }

    #[test]
    fn test_disabled_never_posts() {
        let scheduler = IdleScheduler::disabled();
        assert!(!scheduler.should_post_unsolicited(at(0, 0, 0)));
        assert!(!scheduler.should_post_unsolicited(at(13, 0, 0)));
    }
}
