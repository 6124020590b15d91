//! Mondrian Bot
//!
//! 入口：初始化日志、加载配置、装配推特客户端与转换流水线，运行主循环直到收到关闭信号。
//! 用法：`mondrian-bot [config.toml]`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mondrian_bot::{
    config::load_config,
    core::{shutdown::run_until_shutdown, BackoffPolicy, ShutdownManager, Supervisor, SupervisorSettings, SystemClock},
    dispatch::{ReplyTemplates, ResponseDispatcher},
    media::HttpImageAcquirer,
    observability,
    pacing::ResponsePacer,
    pipeline::CommandPipeline,
    platform::TwitterClient,
    schedule::IdleScheduler,
    store::{CursorStore, FileSlot},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;

    std::fs::create_dir_all(&cfg.app.scratch_dir).context("Failed to create scratch dir")?;
    std::fs::create_dir_all(&cfg.app.output_dir).context("Failed to create output dir")?;

    let credentials = cfg.twitter.credentials()?;
    let twitter = Arc::new(TwitterClient::new(&cfg.twitter, credentials)?);
    let acquirer = Arc::new(HttpImageAcquirer::new(
        cfg.app.scratch_dir.clone(),
        cfg.twitter.request_timeout_secs,
    )?);
    let pipeline = Arc::new(CommandPipeline::from_config(&cfg.pipeline, &cfg.app.output_dir));
    let scheduler = IdleScheduler::from_config(&cfg.schedule)?;
    let cursor_slot = FileSlot::new(&cfg.app.cursor_path);
    tracing::info!(cursor_file = %cursor_slot.path().display(), "Using cursor file");
    let clock = Arc::new(SystemClock);

    let dispatcher = ResponseDispatcher::new(
        twitter.clone(),
        twitter.clone(),
        acquirer,
        pipeline,
        clock.clone(),
        ReplyTemplates::from_config(&cfg.replies),
    );
    let mut supervisor = Supervisor::new(
        twitter,
        dispatcher,
        CursorStore::new(cursor_slot),
        ResponsePacer::new(Duration::from_secs(cfg.pacing.min_interval_secs)),
        clock,
        SupervisorSettings::from_config(&cfg),
    )
    .with_scheduler(scheduler)
    .with_backoff(BackoffPolicy::from_config(&cfg.supervisor));

    tracing::info!(query = %cfg.twitter.query, "Starting mention responder");
    let shutdown = Arc::new(ShutdownManager::new());
    run_until_shutdown(shutdown, |token| async move { supervisor.run(token).await })
        .await
        .context("Supervisor stopped on an unrecoverable error")?;

    Ok(())
}
