//! 提及（Mention）数据模型与分类
//!
//! Mention 在一轮轮询中创建、处理后丢弃；MentionId 单调可比较，作为游标的取值。

pub mod classifier;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use classifier::{classify, ResponseCategory};

/// 提及 id（平台分配，随时间单调递增）
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MentionId(pub u64);

impl fmt::Display for MentionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MentionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(MentionId)
    }
}

/// 媒体类型：只区分可处理的 png / jpeg 与其它
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Png,
    Jpeg,
    Other,
}

impl MediaKind {
    /// 按 URL 扩展名判断（忽略大小写与查询串）
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
        if path.ends_with(".png") {
            MediaKind::Png
        } else if path.ends_with(".jpg") || path.ends_with(".jpeg") {
            MediaKind::Jpeg
        } else {
            MediaKind::Other
        }
    }

    pub fn is_transformable(self) -> bool {
        matches!(self, MediaKind::Png | MediaKind::Jpeg)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    pub kind: MediaKind,
}

impl MediaItem {
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let kind = MediaKind::from_url(&url);
        Self { url, kind }
    }
}

/// 一条提及
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub id: MentionId,
    pub author_handle: String,
    pub in_reply_to_id: Option<MentionId>,
    pub media: Vec<MediaItem>,
}

impl Mention {
    pub fn new(id: u64, author_handle: impl Into<String>) -> Self {
        Self {
            id: MentionId(id),
            author_handle: author_handle.into(),
            in_reply_to_id: None,
            media: Vec::new(),
        }
    }

    /// 追加一个媒体，类型由 URL 扩展名推断
    pub fn with_media(mut self, url: impl Into<String>) -> Self {
        self.media.push(MediaItem::from_url(url));
        self
    }

    pub fn in_reply_to(mut self, id: u64) -> Self {
        self.in_reply_to_id = Some(MentionId(id));
        self
    }

    /// 是否是对其它推文的回复
    pub fn is_reply(&self) -> bool {
        self.in_reply_to_id.is_some()
    }

    /// 第一个可处理（png / jpeg）的媒体
    pub fn first_transformable_media(&self) -> Option<&MediaItem> {
        self.media.iter().find(|m| m.kind.is_transformable())
    }
}
