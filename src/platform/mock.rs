//! Mock 平台（用于测试，无需网络）
//!
//! 按脚本依次返回搜索结果，记录每次搜索参数、上传与发推；可注入上传 / 发推失败。

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::BotError;
use crate::mention::{Mention, MentionId};
use crate::platform::{InboxFetcher, MediaHandle, MediaUploader, StatusPoster};

/// 一次发推的记录
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostRecord {
    pub text: String,
    pub media: Vec<MediaHandle>,
    pub in_reply_to: Option<MentionId>,
}

#[derive(Debug, Default)]
struct MockState {
    search_script: VecDeque<Result<Vec<Mention>, BotError>>,
    searches: Vec<(Option<MentionId>, usize)>,
    uploads: Vec<PathBuf>,
    upload_failures: VecDeque<BotError>,
    post_failures: VecDeque<BotError>,
    posts: Vec<PostRecord>,
}

/// 脚本耗尽后搜索返回空收件箱
#[derive(Debug, Default)]
pub struct MockPlatform {
    state: Mutex<MockState>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一次搜索的返回（按从新到旧给出）
    pub fn push_search(&self, result: Result<Vec<Mention>, BotError>) {
        self.lock().search_script.push_back(result);
    }

    pub fn fail_next_upload(&self, err: BotError) {
        self.lock().upload_failures.push_back(err);
    }

    pub fn fail_next_post(&self, err: BotError) {
        self.lock().post_failures.push_back(err);
    }

    /// 每次搜索的 (since_id, max_results)
    pub fn searches(&self) -> Vec<(Option<MentionId>, usize)> {
        self.lock().searches.clone()
    }

    /// 已上传的文件路径（按上传顺序）
    pub fn uploads(&self) -> Vec<PathBuf> {
        self.lock().uploads.clone()
    }

    /// 已发出的推文（按发送顺序）
    pub fn posts(&self) -> Vec<PostRecord> {
        self.lock().posts.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl InboxFetcher for MockPlatform {
    async fn search(
        &self,
        _query: &str,
        since_id: Option<MentionId>,
        max_results: usize,
    ) -> Result<Vec<Mention>, BotError> {
        let mut state = self.lock();
        state.searches.push((since_id, max_results));
        let mut batch = state.search_script.pop_front().unwrap_or(Ok(Vec::new()))?;
        batch.truncate(max_results);
        Ok(batch)
    }
}

#[async_trait]
impl MediaUploader for MockPlatform {
    async fn upload(&self, path: &Path) -> Result<MediaHandle, BotError> {
        let mut state = self.lock();
        if let Some(err) = state.upload_failures.pop_front() {
            return Err(err);
        }
        state.uploads.push(path.to_path_buf());
        Ok(MediaHandle(format!("media-{}", state.uploads.len())))
    }
}

#[async_trait]
impl StatusPoster for MockPlatform {
    async fn post(
        &self,
        text: &str,
        media: &[MediaHandle],
        in_reply_to: Option<MentionId>,
    ) -> Result<String, BotError> {
        let mut state = self.lock();
        if let Some(err) = state.post_failures.pop_front() {
            return Err(err);
        }
        state.posts.push(PostRecord {
            text: text.to_string(),
            media: media.to_vec(),
            in_reply_to,
        });
        Ok(format!("status-{}", state.posts.len()))
    }
}
