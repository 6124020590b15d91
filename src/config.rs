//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MONDRIAN__*` 覆盖（双下划线表示嵌套，如 `MONDRIAN__PACING__MIN_INTERVAL_SECS=40`）。
//! 推特凭据未在配置中给出时，回退到 CONSUMER_KEY / CONSUMER_SECRET / ACCESS_TOKEN / ACCESS_TOKEN_SECRET。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::BotError;
use crate::platform::OAuthCredentials;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub twitter: TwitterSection,
    pub pacing: PacingSection,
    pub supervisor: SupervisorSection,
    pub schedule: ScheduleSection,
    pub pipeline: PipelineSection,
    pub replies: RepliesSection,
}

/// [app] 段：游标文件、临时目录、流水线输出目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub cursor_path: PathBuf,
    pub scratch_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            cursor_path: PathBuf::from("latest_id.txt"),
            scratch_dir: PathBuf::from("scratch"),
            output_dir: PathBuf::from("output"),
        }
    }
}

/// [twitter] 段：搜索条件、接口地址、分页与凭据
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TwitterSection {
    pub query: String,
    pub api_base: String,
    pub upload_base: String,
    /// 单轮最多拉取的提及数
    pub max_results: usize,
    /// 每页条数（接口限制 10..=100）
    pub page_size: usize,
    pub request_timeout_secs: u64,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub access_token: Option<String>,
    pub access_token_secret: Option<String>,
}

impl Default for TwitterSection {
    fn default() -> Self {
        Self {
            query: "@PietMondrianAI".to_string(),
            api_base: "https://api.twitter.com/2".to_string(),
            upload_base: "https://upload.twitter.com/1.1".to_string(),
            max_results: 1000,
            page_size: 100,
            request_timeout_secs: 30,
            consumer_key: None,
            consumer_secret: None,
            access_token: None,
            access_token_secret: None,
        }
    }
}

impl TwitterSection {
    /// 组装 OAuth 凭据；任一缺失即为配置错误
    pub fn credentials(&self) -> Result<OAuthCredentials, BotError> {
        let mut missing = Vec::new();
        let mut pick = |value: &Option<String>, env: &'static str| -> String {
            let resolved = value
                .clone()
                .filter(|v| !v.is_empty())
                .or_else(|| std::env::var(env).ok().filter(|v| !v.is_empty()));
            resolved.unwrap_or_else(|| {
                missing.push(env);
                String::new()
            })
        };
        let credentials = OAuthCredentials {
            consumer_key: pick(&self.consumer_key, "CONSUMER_KEY"),
            consumer_secret: pick(&self.consumer_secret, "CONSUMER_SECRET"),
            access_token: pick(&self.access_token, "ACCESS_TOKEN"),
            access_token_secret: pick(&self.access_token_secret, "ACCESS_TOKEN_SECRET"),
        };
        if missing.is_empty() {
            Ok(credentials)
        } else {
            Err(BotError::ConfigError(format!(
                "missing Twitter credentials: {}",
                missing.join(", ")
            )))
        }
    }
}

/// [pacing] 段：两次发推的最小间隔（秒），由平台每日发推上限推得
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingSection {
    pub min_interval_secs: u64,
}

impl Default for PacingSection {
    fn default() -> Self {
        Self {
            min_interval_secs: 36,
        }
    }
}

/// [supervisor] 段：休眠间隔、积压阈值、退避时长
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorSection {
    /// 本轮待响应数低于 drain_threshold 时，休眠该秒数再拉取
    pub rest_interval_secs: u64,
    pub drain_threshold: usize,
    pub rate_limit_backoff_secs: u64,
    pub transient_backoff_secs: u64,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            rest_interval_secs: 60,
            drain_threshold: 2,
            rate_limit_backoff_secs: 900,
            transient_backoff_secs: 60,
        }
    }
}

/// [schedule] 段：主动发推的本地时间窗口（精确到分钟）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleSection {
    pub enabled: bool,
    pub hour: u32,
    pub minute: u32,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            enabled: true,
            hour: 13,
            minute: 0,
        }
    }
}

/// [pipeline] 段：外部转换程序
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            program: "mondrianify".to_string(),
            args: Vec::new(),
            timeout_secs: 300,
        }
    }
}

/// [replies] 段：回复文案（不含开头的 @用户名）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RepliesSection {
    pub introduction: String,
    pub error_notice: String,
}

impl Default for RepliesSection {
    fn default() -> Self {
        Self {
            introduction: "Hello! Reply with an image and I'll paint it for you 🎨😁".to_string(),
            error_notice: "Hm, looks like I'm having trouble with this one 😕 I work best on images \
                           with clearly-defined objects. Maybe alter the image slightly and try again? \
                           I may also be down because of a larger issue, but hopefully that's not the case."
                .to_string(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 MONDRIAN__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MONDRIAN__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MONDRIAN")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.pacing.min_interval_secs, 36);
        assert_eq!(cfg.supervisor.rest_interval_secs, 60);
        assert_eq!(cfg.supervisor.drain_threshold, 2);
        assert_eq!(cfg.supervisor.rate_limit_backoff_secs, 900);
        assert_eq!(cfg.twitter.max_results, 1000);
        assert_eq!((cfg.schedule.hour, cfg.schedule.minute), (13, 0));
        assert_eq!(cfg.app.cursor_path, PathBuf::from("latest_id.txt"));
    }

    #[test]
    fn test_load_from_explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.toml");
        std::fs::write(
            &path,
            r#"
[pacing]
min_interval_secs = 45

[schedule]
hour = 9
minute = 30

[twitter]
query = "@SomeOtherBot"
"#,
        )
        .unwrap();
        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.pacing.min_interval_secs, 45);
        assert_eq!((cfg.schedule.hour, cfg.schedule.minute), (9, 30));
        assert!(cfg.schedule.enabled);
        assert_eq!(cfg.twitter.query, "@SomeOtherBot");
        assert_eq!(cfg.twitter.page_size, 100);
    }

    #[test]
    fn test_credentials_from_config() {
        let twitter = TwitterSection {
            consumer_key: Some("ck".into()),
            consumer_secret: Some("cs".into()),
            access_token: Some("at".into()),
            access_token_secret: Some("ats".into()),
            ..TwitterSection::default()
        };
        let creds = twitter.credentials().unwrap();
        assert_eq!(creds.consumer_key, "ck");
        assert_eq!(creds.access_token_secret, "ats");
    }

    #[test]
    fn test_empty_credential_counts_as_missing() {
        let twitter = TwitterSection {
            consumer_key: Some(String::new()),
            consumer_secret: Some("cs".into()),
            access_token: Some("at".into()),
            access_token_secret: Some("ats".into()),
            ..TwitterSection::default()
        };
        // CONSUMER_KEY 可能在测试环境中存在，只在它缺失时断言报错
        if std::env::var("CONSUMER_KEY").map(|v| v.is_empty()).unwrap_or(true) {
            let err = twitter.credentials().unwrap_err();
            assert!(matches!(err, BotError::ConfigError(ref msg) if msg.contains("CONSUMER_KEY")));
        }
    }
}
