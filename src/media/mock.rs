//! Mock 图片获取（用于测试）：不下载，直接返回固定路径或注入的错误

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::BotError;
use crate::media::ImageAcquirer;

#[derive(Debug, Default)]
pub struct MockAcquirer {
    fail_with: Mutex<Option<BotError>>,
    fetched: Mutex<Vec<String>>,
    released: Mutex<Vec<PathBuf>>,
}

impl MockAcquirer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的每次获取都返回该错误
    pub fn fail_with(&self, err: BotError) {
        *self.fail_with.lock().unwrap_or_else(|e| e.into_inner()) = Some(err);
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn released(&self) -> Vec<PathBuf> {
        self.released.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ImageAcquirer for MockAcquirer {
    async fn fetch_to_local(&self, url: &str) -> Result<PathBuf, BotError> {
        if let Some(err) = self.fail_with.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(err);
        }
        let mut fetched = self.fetched.lock().unwrap_or_else(|e| e.into_inner());
        fetched.push(url.to_string());
        Ok(PathBuf::from(format!("scratch/mock-{}.jpg", fetched.len())))
    }

    async fn release(&self, path: &Path) {
        self.released
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.to_path_buf());
    }
}
