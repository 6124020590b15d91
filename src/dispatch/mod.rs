//! 响应分发：对单条提及执行 获取图片 → 转换 → 上传 → 回复
//!
//! 单条提及的失败（下载、转换、上传）在这里被吸收，改为回复固定的致歉文案，绝不中断整批处理。
//! 每次发推前经过节流闸门，发推后记录时间；提及触发的回复完成后推进游标，主动发推不动游标。

pub mod templates;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::core::{BotError, Clock};
use crate::media::ImageAcquirer;
use crate::mention::{Mention, MentionId, ResponseCategory};
use crate::pacing::ResponsePacer;
use crate::pipeline::{TransformMode, TransformPipeline};
use crate::platform::{MediaHandle, MediaUploader, StatusPoster};
use crate::store::CursorStore;

pub use templates::ReplyTemplates;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ResponseKind {
    Introduction,
    Transform,
    ErrorNotice,
    Unsolicited,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ResponseOutcome {
    Sent { kind: ResponseKind, status_id: String },
    /// 未能发出（平台永久拒绝、主动发推的转换失败等）
    Failed(String),
}

impl ResponseOutcome {
    /// 已发出的回复类型；Failed 为 None
    pub fn kind(&self) -> Option<ResponseKind> {
        match self {
            ResponseOutcome::Sent { kind, .. } => Some(*kind),
            ResponseOutcome::Failed(_) => None,
        }
    }
}

pub struct ResponseDispatcher {
    uploader: Arc<dyn MediaUploader>,
    poster: Arc<dyn StatusPoster>,
    acquirer: Arc<dyn ImageAcquirer>,
    pipeline: Arc<dyn TransformPipeline>,
    clock: Arc<dyn Clock>,
    templates: ReplyTemplates,
}

impl ResponseDispatcher {
    /// 组装分发器；uploader / poster 通常是同一个平台客户端
    pub fn new(
        uploader: Arc<dyn MediaUploader>,
        poster: Arc<dyn StatusPoster>,
        acquirer: Arc<dyn ImageAcquirer>,
        pipeline: Arc<dyn TransformPipeline>,
        clock: Arc<dyn Clock>,
        templates: ReplyTemplates,
    ) -> Self {
        Self {
            uploader,
            poster,
            acquirer,
            pipeline,
            clock,
            templates,
        }
    }

    /// 响应一条提及并推进游标。
    ///
    /// 返回 Err 只有两类：发推时的 RateLimited / Transient（游标未动，主循环退避后重试），
    /// 以及游标写盘失败（致命）。
    pub async fn dispatch(
        &self,
        mention: &Mention,
        category: ResponseCategory,
        pacer: &mut ResponsePacer,
        cursor: &mut CursorStore,
    ) -> Result<ResponseOutcome, BotError> {
        let reply_to = Some(mention.id);
        let outcome = match category {
            ResponseCategory::Introduction => {
                let text = self.templates.introduction(&mention.author_handle);
                self.send(pacer, ResponseKind::Introduction, &text, &[], reply_to)
                    .await?
            }
            ResponseCategory::TransformRequest => match self.prepare_transform_reply(mention).await {
                Ok(media) => {
                    let text = self.templates.transform(&mention.author_handle);
                    self.send(pacer, ResponseKind::Transform, &text, &media, reply_to)
                        .await?
                }
                Err(e) => {
                    tracing::warn!(mention = %mention.id, "Transform reply failed, sending error notice: {}", e);
                    let text = self.templates.error_notice(&mention.author_handle);
                    self.send(pacer, ResponseKind::ErrorNotice, &text, &[], reply_to)
                        .await?
                }
            },
            ResponseCategory::Ignored => {
                return Ok(ResponseOutcome::Failed(format!(
                    "mention {} is not actionable",
                    mention.id
                )));
            }
        };

        cursor.advance(mention.id).await?;
        Ok(outcome)
    }

    /// 空闲时主动发推：流水线自选图片，作为顶层推文发出，不涉及游标
    pub async fn post_unsolicited(&self, pacer: &mut ResponsePacer) -> Result<ResponseOutcome, BotError> {
        match self.transform_and_upload(&TransformMode::Unsolicited).await {
            Ok(media) => {
                self.send(pacer, ResponseKind::Unsolicited, "", &media, None)
                    .await
            }
            Err(e) => {
                tracing::warn!("Unsolicited post skipped: {}", e);
                Ok(ResponseOutcome::Failed(e.to_string()))
            }
        }
    }

    async fn prepare_transform_reply(&self, mention: &Mention) -> Result<Vec<MediaHandle>, BotError> {
        let media = mention
            .first_transformable_media()
            .ok_or_else(|| BotError::Acquisition("mention has no png/jpeg media".to_string()))?;
        let source: PathBuf = self.acquirer.fetch_to_local(&media.url).await?;
        let result = self
            .transform_and_upload(&TransformMode::Reply {
                source: source.clone(),
            })
            .await;
        self.acquirer.release(&source).await;
        result
    }

    async fn transform_and_upload(&self, mode: &TransformMode) -> Result<Vec<MediaHandle>, BotError> {
        let artifacts = self.pipeline.transform(mode).await?;
        let mut handles = Vec::with_capacity(artifacts.len());
        for path in &artifacts {
            handles.push(self.uploader.upload(path).await?);
        }
        Ok(handles)
    }

    /// 节流闸门 → 发推 → 记录发送时间
    async fn send(
        &self,
        pacer: &mut ResponsePacer,
        kind: ResponseKind,
        text: &str,
        media: &[MediaHandle],
        in_reply_to: Option<MentionId>,
    ) -> Result<ResponseOutcome, BotError> {
        pacer.wait_gate(self.clock.as_ref()).await;
        let result = self.poster.post(text, media, in_reply_to).await;
        pacer.record_send(self.clock.as_ref());

        match result {
            Ok(status_id) => {
                tracing::info!(?kind, status_id = %status_id, "Sent tweet");
                Ok(ResponseOutcome::Sent { kind, status_id })
            }
            Err(BotError::Rejected(reason)) => {
                tracing::warn!(?kind, "Tweet rejected by platform: {}", reason);
                Ok(ResponseOutcome::Failed(reason))
            }
            Err(e) => Err(e),
        }
    }
}
