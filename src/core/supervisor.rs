//! 主循环：Fetching → Classifying → Acting → Resting，永续运行
//!
//! - 首次运行（无游标）只记录最新一条提及的 id，不回复历史积压
//! - 待响应提及按 id 升序（从旧到新）逐条分发，保证同一用户的多条提及按发送顺序得到回复
//! - 收件箱为空时询问 IdleScheduler 是否主动发推
//! - 出错时由 BackoffPolicy 决定退避时长；游标持久化失败直接终止

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::{BackoffPolicy, BotError, Clock, CycleReport, LoopPhase, RecoveryAction};
use crate::dispatch::{ResponseDispatcher, ResponseOutcome};
use crate::mention::{classify, MentionId};
use crate::pacing::ResponsePacer;
use crate::platform::InboxFetcher;
use crate::schedule::IdleScheduler;
use crate::store::CursorStore;

/// 主循环参数
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub query: String,
    pub max_results: usize,
    pub rest_interval: Duration,
    /// 本轮待响应数低于该值时休眠 rest_interval；否则立即进入下一轮以尽快消化积压
    pub drain_threshold: usize,
}

impl SupervisorSettings {
    /// 从 [twitter] 与 [supervisor] 段取值
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            query: cfg.twitter.query.clone(),
            max_results: cfg.twitter.max_results,
            rest_interval: Duration::from_secs(cfg.supervisor.rest_interval_secs),
            drain_threshold: cfg.supervisor.drain_threshold,
        }
    }
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

pub struct Supervisor {
    fetcher: Arc<dyn InboxFetcher>,
    dispatcher: ResponseDispatcher,
    scheduler: IdleScheduler,
    cursor: CursorStore,
    pacer: ResponsePacer,
    backoff: BackoffPolicy,
    clock: Arc<dyn Clock>,
    settings: SupervisorSettings,
    phase: LoopPhase,
    last_unsolicited: Option<NaiveDate>,
}

impl Supervisor {
    /// 组装主循环；调度器与退避策略取默认值，可用 with_* 替换
    pub fn new(
        fetcher: Arc<dyn InboxFetcher>,
        dispatcher: ResponseDispatcher,
        cursor: CursorStore,
        pacer: ResponsePacer,
        clock: Arc<dyn Clock>,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            fetcher,
            dispatcher,
            scheduler: IdleScheduler::default(),
            cursor,
            pacer,
            backoff: BackoffPolicy::default(),
            clock,
            settings,
            phase: LoopPhase::Fetching,
            last_unsolicited: None,
        }
    }

    /// 替换空闲调度器（默认 13:00）
    pub fn with_scheduler(mut self, scheduler: IdleScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// 替换退避策略（默认 900s / 60s）
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// 当前所处阶段；出错时记录在日志里以定位失败的环节
    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    /// 当前游标（已完整处理的最大提及 id）
    pub fn cursor(&self) -> Option<MentionId> {
        self.cursor.current()
    }

    /// 读取持久化的游标，决定是续跑还是进入 bootstrap 模式
    pub async fn resume(&mut self) -> Result<Option<MentionId>, BotError> {
        let cursor = self.cursor.load().await?;
        match cursor {
            Some(id) => tracing::info!(cursor = %id, "Resuming from stored cursor"),
            None => tracing::info!("No stored cursor, first cycle will only record the latest mention"),
        }
        Ok(cursor)
    }

    /// 永续运行，直到收到关闭信号（Ok）或遇到致命错误（Err）
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), BotError> {
        self.resume().await?;
        let clock = self.clock.clone();

        loop {
            if shutdown.is_cancelled() {
                tracing::info!("Shutdown requested, leaving supervisor loop");
                return Ok(());
            }

            let Some(pause) = self.step().await? else {
                continue;
            };

            tokio::select! {
                _ = clock.sleep(pause) => {}
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested while resting");
                    return Ok(());
                }
            }
        }
    }

    /// 执行一轮并返回接下来应休眠的时长（None 表示立即进入下一轮）
    pub async fn step(&mut self) -> Result<Option<Duration>, BotError> {
        match self.run_cycle().await {
            Ok(report) => {
                self.phase = LoopPhase::Resting;
                if report.actionable < self.settings.drain_threshold {
                    Ok(Some(self.settings.rest_interval))
                } else {
                    Ok(None)
                }
            }
            Err(e) => {
                let failed_in = self.phase;
                match self.backoff.handle(&e) {
                    RecoveryAction::Backoff(wait) => {
                        self.phase = LoopPhase::Resting;
                        if e.is_retryable() {
                            tracing::warn!(phase = ?failed_in, "Cycle failed ({}), backing off for {}s", e, wait.as_secs());
                        } else {
                            tracing::error!(phase = ?failed_in, "Unexpected error reached supervisor ({}), backing off for {}s", e, wait.as_secs());
                        }
                        Ok(Some(wait))
                    }
                    RecoveryAction::Abort => {
                        tracing::error!(phase = ?failed_in, "Unrecoverable error, stopping: {}", e);
                        Err(e)
                    }
                }
            }
        }
    }

    /// 单轮：拉取 → 分类 → 响应（或空闲调度）
    pub async fn run_cycle(&mut self) -> Result<CycleReport, BotError> {
        self.phase = LoopPhase::Fetching;
        let Some(since) = self.cursor.current() else {
            return self.bootstrap().await;
        };

        let batch = match self
            .fetcher
            .search(&self.settings.query, Some(since), self.settings.max_results)
            .await
        {
            Ok(batch) => batch,
            // 游标超出搜索窗口（如停机超过 7 天）时平台会拒绝 since_id，重新以最新提及为基准
            Err(BotError::Rejected(reason)) => {
                tracing::warn!(cursor = %since, "Search rejected ({}), re-basing cursor on the latest mention", reason);
                return self.bootstrap().await;
            }
            Err(e) => return Err(e),
        };
        tracing::info!("There are {} tweets in the inbox", batch.len());
        let newest = batch.iter().map(|m| m.id).max();
        let mut report = CycleReport {
            fetched: batch.len(),
            ..CycleReport::default()
        };

        self.phase = LoopPhase::Classifying;
        let mut actionable = classify(batch);
        actionable.retain(|(m, _)| m.id > since);
        actionable.sort_by_key(|(m, _)| m.id);
        report.actionable = actionable.len();
        tracing::info!("There are {} tweets to respond to", report.actionable);

        self.phase = LoopPhase::Acting;
        if actionable.is_empty() {
            report.unsolicited = self.maybe_post_unsolicited().await?;
        }
        for (mention, category) in &actionable {
            let outcome = self
                .dispatcher
                .dispatch(mention, *category, &mut self.pacer, &mut self.cursor)
                .await?;
            report.responses.push((mention.id, outcome));
        }

        // 被忽略的提及同样视为已处理，避免下一轮重复拉取
        if let Some(newest) = newest {
            self.cursor.advance(newest).await?;
        }

        tracing::info!(
            fetched = report.fetched,
            responded = report.responses.len(),
            failed = report.failed_count(),
            "Cycle complete"
        );
        Ok(report)
    }

    /// 首次运行：只取最新一条提及作为游标，不回复
    async fn bootstrap(&mut self) -> Result<CycleReport, BotError> {
        let latest = self.fetcher.search(&self.settings.query, None, 1).await?;
        let report = CycleReport {
            fetched: latest.len(),
            bootstrap: true,
            ..CycleReport::default()
        };
        match latest.iter().map(|m| m.id).max() {
            Some(id) => {
                self.cursor.advance(id).await?;
                tracing::info!(cursor = %id, "Collected latest tweet. Will not respond.");
            }
            None => tracing::info!("Inbox is empty, cursor stays unset"),
        }
        Ok(report)
    }

    /// 同一天内至多主动发推一次
    async fn maybe_post_unsolicited(&mut self) -> Result<Option<ResponseOutcome>, BotError> {
        let now = self.clock.local_time();
        if !self.scheduler.should_post_unsolicited(now) || self.last_unsolicited == Some(now.date()) {
            return Ok(None);
        }
        tracing::info!("Inbox idle inside posting window, sending unsolicited post");
        let outcome = self.dispatcher.post_unsolicited(&mut self.pacer).await?;
        self.last_unsolicited = Some(now.date());
        Ok(Some(outcome))
    }
}
