//! 平台接口：收件箱搜索、媒体上传、发推
//!
//! 主循环只依赖这三个 trait；TwitterClient 是真实实现，MockPlatform 用于测试。

pub mod mock;
pub mod oauth;
pub mod twitter;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use crate::core::BotError;
use crate::mention::{Mention, MentionId};

pub use mock::{MockPlatform, PostRecord};
pub use oauth::OAuthCredentials;
pub use twitter::TwitterClient;

/// 单条推文最多附带的媒体数
pub const MAX_MEDIA_PER_POST: usize = 4;

/// 上传后的媒体句柄（平台 media_id）
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MediaHandle(pub String);

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 收件箱：拉取 since_id 之后的所有提及，按从新到旧排列
#[async_trait]
pub trait InboxFetcher: Send + Sync {
    async fn search(
        &self,
        query: &str,
        since_id: Option<MentionId>,
        max_results: usize,
    ) -> Result<Vec<Mention>, BotError>;
}

#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<MediaHandle, BotError>;
}

#[async_trait]
pub trait StatusPoster: Send + Sync {
    /// 发布一条推文，返回新推文 id
    async fn post(
        &self,
        text: &str,
        media: &[MediaHandle],
        in_reply_to: Option<MentionId>,
    ) -> Result<String, BotError>;
}
